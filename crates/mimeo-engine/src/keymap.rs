//! Translation between normalized key symbols and the OS input layer
//!
//! The only place that knows about native key identities. Capture maps
//! the hook's key to a symbol deterministically (US layout for the
//! printable block), so a press and its release always produce the
//! same symbol. Injection maps back, treating shifted punctuation as
//! its base key; recorded modifier presses supply the shift state.

use mimeo_core::events::MouseButton;
use mimeo_core::keys::{KeySymbol, NamedKey};
use rdev::{Button, Key};

pub fn button_from_rdev(button: Button) -> Option<MouseButton> {
    match button {
        Button::Left => Some(MouseButton::Left),
        Button::Right => Some(MouseButton::Right),
        _ => None,
    }
}

pub fn button_to_rdev(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
    }
}

/// Native key for a symbol, if one exists. Uppercase letters resolve
/// to their base key; symbols with no physical key on a US layout
/// resolve to `None` and surface as injection errors upstream.
pub fn symbol_to_rdev(symbol: &KeySymbol) -> Option<Key> {
    match symbol {
        KeySymbol::Named(named) => Some(named_to_rdev(*named)),
        KeySymbol::Char(c) => char_to_rdev(*c),
    }
}

/// Symbol for a native key. `None` for keys the timeline format does
/// not model (media keys, lock keys, unknown codes); those events pass
/// through the hook unrecorded.
pub fn symbol_from_rdev(key: Key) -> Option<KeySymbol> {
    let named = match key {
        Key::Escape => NamedKey::Esc,
        Key::Return => NamedKey::Enter,
        Key::Tab => NamedKey::Tab,
        Key::Backspace => NamedKey::Backspace,
        Key::CapsLock => NamedKey::CapsLock,
        Key::Pause => NamedKey::Pause,
        Key::PageUp => NamedKey::PageUp,
        Key::PageDown => NamedKey::PageDown,
        Key::End => NamedKey::End,
        Key::Home => NamedKey::Home,
        Key::LeftArrow => NamedKey::Left,
        Key::UpArrow => NamedKey::Up,
        Key::RightArrow => NamedKey::Right,
        Key::DownArrow => NamedKey::Down,
        Key::PrintScreen => NamedKey::PrintScreen,
        Key::Insert => NamedKey::Insert,
        Key::Delete => NamedKey::Delete,
        Key::ShiftLeft => NamedKey::Shift,
        Key::ShiftRight => NamedKey::ShiftR,
        Key::ControlLeft => NamedKey::Ctrl,
        Key::ControlRight => NamedKey::CtrlR,
        Key::Alt => NamedKey::Alt,
        Key::AltGr => NamedKey::AltR,
        Key::MetaLeft => NamedKey::Meta,
        Key::MetaRight => NamedKey::MetaR,
        Key::F1 => NamedKey::F1,
        Key::F2 => NamedKey::F2,
        Key::F3 => NamedKey::F3,
        Key::F4 => NamedKey::F4,
        Key::F5 => NamedKey::F5,
        Key::F6 => NamedKey::F6,
        Key::F7 => NamedKey::F7,
        Key::F8 => NamedKey::F8,
        Key::F9 => NamedKey::F9,
        Key::F10 => NamedKey::F10,
        Key::F11 => NamedKey::F11,
        Key::F12 => NamedKey::F12,
        Key::KpReturn => NamedKey::Enter,
        Key::KpDelete => NamedKey::Delete,
        other => return char_from_rdev(other).map(KeySymbol::Char),
    };
    Some(KeySymbol::Named(named))
}

fn named_to_rdev(named: NamedKey) -> Key {
    match named {
        NamedKey::Esc => Key::Escape,
        NamedKey::Enter => Key::Return,
        NamedKey::Tab => Key::Tab,
        NamedKey::Backspace => Key::Backspace,
        NamedKey::Space => Key::Space,
        NamedKey::CapsLock => Key::CapsLock,
        NamedKey::Pause => Key::Pause,
        NamedKey::PageUp => Key::PageUp,
        NamedKey::PageDown => Key::PageDown,
        NamedKey::End => Key::End,
        NamedKey::Home => Key::Home,
        NamedKey::Left => Key::LeftArrow,
        NamedKey::Up => Key::UpArrow,
        NamedKey::Right => Key::RightArrow,
        NamedKey::Down => Key::DownArrow,
        NamedKey::PrintScreen => Key::PrintScreen,
        NamedKey::Insert => Key::Insert,
        NamedKey::Delete => Key::Delete,
        NamedKey::Shift => Key::ShiftLeft,
        NamedKey::ShiftR => Key::ShiftRight,
        NamedKey::Ctrl => Key::ControlLeft,
        NamedKey::CtrlR => Key::ControlRight,
        NamedKey::Alt => Key::Alt,
        NamedKey::AltR => Key::AltGr,
        NamedKey::Meta => Key::MetaLeft,
        NamedKey::MetaR => Key::MetaRight,
        NamedKey::F1 => Key::F1,
        NamedKey::F2 => Key::F2,
        NamedKey::F3 => Key::F3,
        NamedKey::F4 => Key::F4,
        NamedKey::F5 => Key::F5,
        NamedKey::F6 => Key::F6,
        NamedKey::F7 => Key::F7,
        NamedKey::F8 => Key::F8,
        NamedKey::F9 => Key::F9,
        NamedKey::F10 => Key::F10,
        NamedKey::F11 => Key::F11,
        NamedKey::F12 => Key::F12,
    }
}

fn char_from_rdev(key: Key) -> Option<char> {
    Some(match key {
        Key::KeyA => 'a',
        Key::KeyB => 'b',
        Key::KeyC => 'c',
        Key::KeyD => 'd',
        Key::KeyE => 'e',
        Key::KeyF => 'f',
        Key::KeyG => 'g',
        Key::KeyH => 'h',
        Key::KeyI => 'i',
        Key::KeyJ => 'j',
        Key::KeyK => 'k',
        Key::KeyL => 'l',
        Key::KeyM => 'm',
        Key::KeyN => 'n',
        Key::KeyO => 'o',
        Key::KeyP => 'p',
        Key::KeyQ => 'q',
        Key::KeyR => 'r',
        Key::KeyS => 's',
        Key::KeyT => 't',
        Key::KeyU => 'u',
        Key::KeyV => 'v',
        Key::KeyW => 'w',
        Key::KeyX => 'x',
        Key::KeyY => 'y',
        Key::KeyZ => 'z',
        Key::Num0 | Key::Kp0 => '0',
        Key::Num1 | Key::Kp1 => '1',
        Key::Num2 | Key::Kp2 => '2',
        Key::Num3 | Key::Kp3 => '3',
        Key::Num4 | Key::Kp4 => '4',
        Key::Num5 | Key::Kp5 => '5',
        Key::Num6 | Key::Kp6 => '6',
        Key::Num7 | Key::Kp7 => '7',
        Key::Num8 | Key::Kp8 => '8',
        Key::Num9 | Key::Kp9 => '9',
        Key::Space => ' ',
        Key::Minus | Key::KpMinus => '-',
        Key::Equal => '=',
        Key::LeftBracket => '[',
        Key::RightBracket => ']',
        Key::BackSlash => '\\',
        Key::SemiColon => ';',
        Key::Quote => '\'',
        Key::BackQuote => '`',
        Key::Comma => ',',
        Key::Dot => '.',
        Key::Slash | Key::KpDivide => '/',
        Key::KpPlus => '+',
        Key::KpMultiply => '*',
        _ => return None,
    })
}

fn char_to_rdev(c: char) -> Option<Key> {
    let c = if c.is_ascii_uppercase() {
        c.to_ascii_lowercase()
    } else {
        c
    };
    Some(match c {
        'a' => Key::KeyA,
        'b' => Key::KeyB,
        'c' => Key::KeyC,
        'd' => Key::KeyD,
        'e' => Key::KeyE,
        'f' => Key::KeyF,
        'g' => Key::KeyG,
        'h' => Key::KeyH,
        'i' => Key::KeyI,
        'j' => Key::KeyJ,
        'k' => Key::KeyK,
        'l' => Key::KeyL,
        'm' => Key::KeyM,
        'n' => Key::KeyN,
        'o' => Key::KeyO,
        'p' => Key::KeyP,
        'q' => Key::KeyQ,
        'r' => Key::KeyR,
        's' => Key::KeyS,
        't' => Key::KeyT,
        'u' => Key::KeyU,
        'v' => Key::KeyV,
        'w' => Key::KeyW,
        'x' => Key::KeyX,
        'y' => Key::KeyY,
        'z' => Key::KeyZ,
        '0' | ')' => Key::Num0,
        '1' | '!' => Key::Num1,
        '2' | '@' => Key::Num2,
        '3' | '#' => Key::Num3,
        '4' | '$' => Key::Num4,
        '5' | '%' => Key::Num5,
        '6' | '^' => Key::Num6,
        '7' | '&' => Key::Num7,
        '8' | '*' => Key::Num8,
        '9' | '(' => Key::Num9,
        ' ' => Key::Space,
        '\n' => Key::Return,
        '\t' => Key::Tab,
        '-' | '_' => Key::Minus,
        '=' | '+' => Key::Equal,
        '[' | '{' => Key::LeftBracket,
        ']' | '}' => Key::RightBracket,
        '\\' | '|' => Key::BackSlash,
        ';' | ':' => Key::SemiColon,
        '\'' | '"' => Key::Quote,
        '`' | '~' => Key::BackQuote,
        ',' | '<' => Key::Comma,
        '.' | '>' => Key::Dot,
        '/' | '?' => Key::Slash,
        _ => return None,
    })
}
