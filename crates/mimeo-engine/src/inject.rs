//! Synthetic input injection
//!
//! `Injector` is the seam between the player and the OS: the real
//! implementation posts events through rdev, tests substitute a
//! recording mock. Every real injection is bracketed with the
//! dispatcher's injection marker so the hook can tell our own output
//! apart from genuine user input.

use mimeo_core::events::MouseButton;
use mimeo_core::keys::KeySymbol;
use mimeo_core::{Error, Result};

use crate::hook::Dispatcher;
use crate::keymap;

/// Applies synthetic input events.
pub trait Injector: Send {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<()>;
    fn scroll(&mut self, dx: i32, dy: i32) -> Result<()>;
    fn key(&mut self, key: KeySymbol, pressed: bool) -> Result<()>;
}

/// Injector backed by the OS synthetic-input API.
pub struct RdevInjector {
    dispatcher: Dispatcher,
}

impl RdevInjector {
    /// Injects against the process-global hook dispatcher.
    pub fn new() -> Self {
        Self::with_dispatcher(Dispatcher::global().clone())
    }

    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    fn simulate(&self, event_type: rdev::EventType, what: &str) -> Result<()> {
        let _mark = self.dispatcher.begin_injection();
        rdev::simulate(&event_type).map_err(|e| Error::Injection {
            what: what.to_string(),
            reason: format!("{e:?}"),
        })
    }
}

impl Default for RdevInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl Injector for RdevInjector {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.simulate(
            rdev::EventType::MouseMove {
                x: x as f64,
                y: y as f64,
            },
            "pointer move",
        )
    }

    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<()> {
        let native = keymap::button_to_rdev(button);
        let event_type = if pressed {
            rdev::EventType::ButtonPress(native)
        } else {
            rdev::EventType::ButtonRelease(native)
        };
        self.simulate(event_type, "mouse button")
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.simulate(
            rdev::EventType::Wheel {
                delta_x: dx as i64,
                delta_y: dy as i64,
            },
            "scroll",
        )
    }

    fn key(&mut self, key: KeySymbol, pressed: bool) -> Result<()> {
        let native = keymap::symbol_to_rdev(&key).ok_or_else(|| Error::Injection {
            what: format!("key {key}"),
            reason: "no native mapping for this symbol".into(),
        })?;
        let event_type = if pressed {
            rdev::EventType::KeyPress(native)
        } else {
            rdev::EventType::KeyRelease(native)
        };
        self.simulate(event_type, &format!("key {key}"))
    }
}
