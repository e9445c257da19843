//! Normalized key identifiers
//!
//! A `KeySymbol` names a physical key independently of any OS
//! virtual-key numbering: either the printable character the key
//! produces ("a", "/", " ") or a snake_case name for the rest
//! ("esc", "f1", "shift_r"). Timelines store these strings; the
//! engine translates them to native keys at the injector boundary.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized key symbol: {0:?}")]
pub struct ParseKeyError(pub String);

/// A single key, decoupled from OS virtual-key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySymbol {
    /// A printable character.
    Char(char),
    /// A named non-printable key.
    Named(NamedKey),
}

impl KeySymbol {
    /// Modifier-class keys, the only ones usable in an abort chord.
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            KeySymbol::Named(
                NamedKey::Shift
                    | NamedKey::ShiftR
                    | NamedKey::Ctrl
                    | NamedKey::CtrlR
                    | NamedKey::Alt
                    | NamedKey::AltR
                    | NamedKey::Meta
                    | NamedKey::MetaR
            )
        )
    }
}

impl fmt::Display for KeySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySymbol::Char(c) => write!(f, "{c}"),
            KeySymbol::Named(named) => f.write_str(named.name()),
        }
    }
}

impl FromStr for KeySymbol {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(KeySymbol::Char(c));
        }
        NamedKey::from_name(s)
            .map(KeySymbol::Named)
            .ok_or_else(|| ParseKeyError(s.to_string()))
    }
}

impl From<NamedKey> for KeySymbol {
    fn from(named: NamedKey) -> Self {
        KeySymbol::Named(named)
    }
}

impl From<char> for KeySymbol {
    fn from(c: char) -> Self {
        KeySymbol::Char(c)
    }
}

impl Serialize for KeySymbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeySymbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Non-printable keys, with the wire names used in persisted timelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Esc,
    Enter,
    Tab,
    Backspace,
    Space,
    CapsLock,
    Pause,
    PageUp,
    PageDown,
    End,
    Home,
    Left,
    Up,
    Right,
    Down,
    PrintScreen,
    Insert,
    Delete,
    Shift,
    ShiftR,
    Ctrl,
    CtrlR,
    Alt,
    AltR,
    Meta,
    MetaR,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl NamedKey {
    /// Every named key, in wire-name order.
    pub const ALL: [NamedKey; 38] = [
        NamedKey::Esc,
        NamedKey::Enter,
        NamedKey::Tab,
        NamedKey::Backspace,
        NamedKey::Space,
        NamedKey::CapsLock,
        NamedKey::Pause,
        NamedKey::PageUp,
        NamedKey::PageDown,
        NamedKey::End,
        NamedKey::Home,
        NamedKey::Left,
        NamedKey::Up,
        NamedKey::Right,
        NamedKey::Down,
        NamedKey::PrintScreen,
        NamedKey::Insert,
        NamedKey::Delete,
        NamedKey::Shift,
        NamedKey::ShiftR,
        NamedKey::Ctrl,
        NamedKey::CtrlR,
        NamedKey::Alt,
        NamedKey::AltR,
        NamedKey::Meta,
        NamedKey::MetaR,
        NamedKey::F1,
        NamedKey::F2,
        NamedKey::F3,
        NamedKey::F4,
        NamedKey::F5,
        NamedKey::F6,
        NamedKey::F7,
        NamedKey::F8,
        NamedKey::F9,
        NamedKey::F10,
        NamedKey::F11,
        NamedKey::F12,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NamedKey::Esc => "esc",
            NamedKey::Enter => "enter",
            NamedKey::Tab => "tab",
            NamedKey::Backspace => "backspace",
            NamedKey::Space => "space",
            NamedKey::CapsLock => "caps_lock",
            NamedKey::Pause => "pause",
            NamedKey::PageUp => "page_up",
            NamedKey::PageDown => "page_down",
            NamedKey::End => "end",
            NamedKey::Home => "home",
            NamedKey::Left => "left",
            NamedKey::Up => "up",
            NamedKey::Right => "right",
            NamedKey::Down => "down",
            NamedKey::PrintScreen => "print_screen",
            NamedKey::Insert => "insert",
            NamedKey::Delete => "delete",
            NamedKey::Shift => "shift",
            NamedKey::ShiftR => "shift_r",
            NamedKey::Ctrl => "ctrl",
            NamedKey::CtrlR => "ctrl_r",
            NamedKey::Alt => "alt",
            NamedKey::AltR => "alt_r",
            NamedKey::Meta => "meta",
            NamedKey::MetaR => "meta_r",
            NamedKey::F1 => "f1",
            NamedKey::F2 => "f2",
            NamedKey::F3 => "f3",
            NamedKey::F4 => "f4",
            NamedKey::F5 => "f5",
            NamedKey::F6 => "f6",
            NamedKey::F7 => "f7",
            NamedKey::F8 => "f8",
            NamedKey::F9 => "f9",
            NamedKey::F10 => "f10",
            NamedKey::F11 => "f11",
            NamedKey::F12 => "f12",
        }
    }

    pub fn from_name(name: &str) -> Option<NamedKey> {
        Some(match name {
            "esc" => NamedKey::Esc,
            "enter" => NamedKey::Enter,
            "tab" => NamedKey::Tab,
            "backspace" => NamedKey::Backspace,
            "space" => NamedKey::Space,
            "caps_lock" => NamedKey::CapsLock,
            "pause" => NamedKey::Pause,
            "page_up" => NamedKey::PageUp,
            "page_down" => NamedKey::PageDown,
            "end" => NamedKey::End,
            "home" => NamedKey::Home,
            "left" => NamedKey::Left,
            "up" => NamedKey::Up,
            "right" => NamedKey::Right,
            "down" => NamedKey::Down,
            "print_screen" => NamedKey::PrintScreen,
            "insert" => NamedKey::Insert,
            "delete" => NamedKey::Delete,
            "shift" => NamedKey::Shift,
            "shift_r" => NamedKey::ShiftR,
            "ctrl" => NamedKey::Ctrl,
            "ctrl_r" => NamedKey::CtrlR,
            "alt" => NamedKey::Alt,
            "alt_r" => NamedKey::AltR,
            "meta" => NamedKey::Meta,
            "meta_r" => NamedKey::MetaR,
            "f1" => NamedKey::F1,
            "f2" => NamedKey::F2,
            "f3" => NamedKey::F3,
            "f4" => NamedKey::F4,
            "f5" => NamedKey::F5,
            "f6" => NamedKey::F6,
            "f7" => NamedKey::F7,
            "f8" => NamedKey::F8,
            "f9" => NamedKey::F9,
            "f10" => NamedKey::F10,
            "f11" => NamedKey::F11,
            "f12" => NamedKey::F12,
            _ => return None,
        })
    }
}
