//! Process-global input hook fan-out
//!
//! The OS allows one low-level hook per device class per logical owner,
//! so a single rdev grab thread feeds a `Dispatcher` that fans events
//! out to the subscribers that actually exist at runtime: at most one
//! capture tap (the recorder) and any number of guard matchers
//! (stop keys, abort chords). Guards decide suppression before the
//! event is forwarded anywhere, which keeps "a consumed stop key is
//! never also recorded" in one place.
//!
//! Tests drive a detached dispatcher through [`Dispatcher::dispatch`]
//! directly; only [`Dispatcher::global`] ever talks to the OS.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{error, trace, warn};

use mimeo_core::events::EventKind;
use mimeo_core::{Error, Result};

use crate::guard::{EventMatcher, GuardController, GuardId};
use crate::keymap;

/// Capacity of the channel between the hook callback and the
/// recorder's consumer thread.
const TAP_CAPACITY: usize = 10_000;

/// How long a failed grab installation gets to report before we assume
/// the hook is up. rdev blocks forever on success.
const HOOK_STARTUP_GRACE: Duration = Duration::from_millis(250);

/// Injected events can be delivered by the OS slightly after the
/// simulate call returns; events arriving within this window of an
/// injection are still treated as synthetic.
const INJECTION_LINGER: Duration = Duration::from_millis(10);

static GLOBAL: Lazy<Dispatcher> = Lazy::new(Dispatcher::os_backed);

/// A normalized event as observed by the hook.
#[derive(Debug, Clone)]
pub struct HookEvent {
    /// Monotonic arrival time, stamped in the hook callback.
    pub at: Instant,
    pub kind: EventKind,
    /// True when the event was produced by our own injector.
    pub synthetic: bool,
}

/// What the OS callback should do with the raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Pass the event through to the foreground application.
    Forward,
    /// Consume it; a guard matched.
    Suppress,
}

#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<DispatchState>,
}

struct DispatchState {
    guards: GuardController,
    owners: Mutex<Owners>,
    injecting: AtomicUsize,
    last_injection: Mutex<Option<Instant>>,
    pointer: Mutex<(i32, i32)>,
    os_hook: Mutex<bool>,
    os_backed: bool,
}

struct Owners {
    capture: Option<Sender<HookEvent>>,
    players: usize,
}

impl Dispatcher {
    /// A detached dispatcher that never touches the OS. Events are fed
    /// through [`Dispatcher::dispatch`] by the embedder (or a test).
    pub fn new() -> Self {
        Self::build(false)
    }

    fn os_backed() -> Self {
        Self::build(true)
    }

    fn build(os_backed: bool) -> Self {
        Self {
            state: Arc::new(DispatchState {
                guards: GuardController::new(),
                owners: Mutex::new(Owners {
                    capture: None,
                    players: 0,
                }),
                injecting: AtomicUsize::new(0),
                last_injection: Mutex::new(None),
                pointer: Mutex::new((0, 0)),
                os_hook: Mutex::new(false),
                os_backed,
            }),
        }
    }

    /// The process-wide dispatcher backed by the real OS hook. The
    /// hook thread is installed lazily by [`Dispatcher::ensure_hook`].
    pub fn global() -> &'static Dispatcher {
        &GLOBAL
    }

    /// Installs the OS hook thread if this dispatcher is OS-backed and
    /// it is not already running. Fails with [`Error::HookInstall`]
    /// when the OS denies the hook; nothing is left installed in that
    /// case and a later call may retry.
    pub fn ensure_hook(&self) -> Result<()> {
        if !self.state.os_backed {
            return Ok(());
        }
        let mut running = self.state.os_hook.lock();
        if *running {
            return Ok(());
        }
        spawn_grab_thread(self.state.clone())?;
        *running = true;
        Ok(())
    }

    /// Claims the single capture tap. At most one may exist at a time;
    /// a second request fails with [`Error::HookInstall`], and capture
    /// is refused outright while playback is running.
    pub fn subscribe_capture(&self) -> Result<CaptureTap> {
        let mut owners = self.state.owners.lock();
        if owners.capture.is_some() {
            return Err(Error::HookInstall {
                reason: "the capture tap is already owned by this process".into(),
            });
        }
        if owners.players > 0 {
            return Err(Error::AlreadyActive("playback"));
        }
        let (tx, rx) = bounded(TAP_CAPACITY);
        owners.capture = Some(tx);
        Ok(CaptureTap {
            rx,
            state: self.state.clone(),
        })
    }

    /// Registers a playback owner. Refused while a recording holds the
    /// capture tap; multiple concurrent players are allowed.
    pub fn begin_playback(&self) -> Result<PlaybackSlot> {
        let mut owners = self.state.owners.lock();
        if owners.capture.is_some() {
            return Err(Error::AlreadyActive("recording"));
        }
        owners.players += 1;
        Ok(PlaybackSlot {
            state: self.state.clone(),
        })
    }

    /// Marks the calling thread as generating synthetic input until the
    /// returned guard drops. Events observed in that window (plus a
    /// short linger) are flagged synthetic and ignored by guards.
    pub fn begin_injection(&self) -> InjectionMark {
        self.state.injecting.fetch_add(1, Ordering::SeqCst);
        InjectionMark {
            state: self.state.clone(),
        }
    }

    pub fn register_guard(
        &self,
        matcher: impl EventMatcher + 'static,
        on_match: impl FnOnce() + Send + 'static,
    ) -> GuardId {
        self.state.guards.register(matcher, on_match)
    }

    pub fn unregister_guard(&self, id: GuardId) {
        self.state.guards.unregister(id);
    }

    /// Runs one event through guards and the capture tap, returning the
    /// suppression verdict. Called from the OS hook callback, or
    /// directly when embedding a detached dispatcher.
    pub fn dispatch(&self, kind: EventKind) -> Verdict {
        self.state.dispatch(kind)
    }

    pub fn is_capture_held(&self) -> bool {
        self.state.owners.lock().capture.is_some()
    }

    pub fn playback_count(&self) -> usize {
        self.state.owners.lock().players
    }

    /// Last pointer position observed by the hook.
    pub fn pointer(&self) -> (i32, i32) {
        *self.state.pointer.lock()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchState {
    fn dispatch(&self, kind: EventKind) -> Verdict {
        if let EventKind::Move { x, y } = kind {
            *self.pointer.lock() = (x, y);
        }

        let event = HookEvent {
            at: Instant::now(),
            kind,
            synthetic: self.is_synthetic(),
        };

        if self.guards.observe(&event) {
            return Verdict::Suppress;
        }

        let owners = self.owners.lock();
        if let Some(tx) = owners.capture.as_ref() {
            match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("capture tap full, dropping event"),
                Err(TrySendError::Disconnected(_)) => trace!("capture tap consumer gone"),
            }
        }
        Verdict::Forward
    }

    fn is_synthetic(&self) -> bool {
        if self.injecting.load(Ordering::SeqCst) > 0 {
            return true;
        }
        self.last_injection
            .lock()
            .is_some_and(|at| at.elapsed() < INJECTION_LINGER)
    }

    fn release_capture(&self) {
        self.owners.lock().capture = None;
    }
}

/// The exclusive capture subscription held by a recording session.
/// Dropping it releases the tap; releasing twice is harmless.
pub struct CaptureTap {
    rx: Receiver<HookEvent>,
    state: Arc<DispatchState>,
}

impl CaptureTap {
    pub fn receiver(&self) -> &Receiver<HookEvent> {
        &self.rx
    }
}

impl Drop for CaptureTap {
    fn drop(&mut self) {
        self.state.release_capture();
    }
}

/// Releases the playback owner slot on drop.
pub struct PlaybackSlot {
    state: Arc<DispatchState>,
}

impl Drop for PlaybackSlot {
    fn drop(&mut self) {
        let mut owners = self.state.owners.lock();
        owners.players = owners.players.saturating_sub(1);
    }
}

/// Active-injection marker; see [`Dispatcher::begin_injection`].
pub struct InjectionMark {
    state: Arc<DispatchState>,
}

impl Drop for InjectionMark {
    fn drop(&mut self) {
        *self.state.last_injection.lock() = Some(Instant::now());
        self.state.injecting.fetch_sub(1, Ordering::SeqCst);
    }
}

fn spawn_grab_thread(state: Arc<DispatchState>) -> Result<()> {
    let (failed_tx, failed_rx) = bounded::<String>(1);
    let grab_state = state;

    thread::Builder::new()
        .name("mimeo-hook".into())
        .spawn(move || {
            let cb_state = grab_state.clone();
            let outcome = rdev::grab(move |event: rdev::Event| {
                let pointer = *cb_state.pointer.lock();
                match translate(&event.event_type, pointer) {
                    Some(kind) => match cb_state.dispatch(kind) {
                        Verdict::Suppress => None,
                        Verdict::Forward => Some(event),
                    },
                    // untranslatable events pass through untouched
                    None => Some(event),
                }
            });
            if let Err(e) = outcome {
                error!("global input hook exited: {e:?}");
                let _ = failed_tx.send(format!("{e:?}"));
            }
        })
        .map_err(|e| Error::HookInstall {
            reason: e.to_string(),
        })?;

    // rdev::grab blocks for the life of the process once installed;
    // give a denied installation a moment to fail fast.
    match failed_rx.recv_timeout(HOOK_STARTUP_GRACE) {
        Ok(reason) => Err(Error::HookInstall { reason }),
        Err(_) => Ok(()),
    }
}

/// Normalizes a raw OS event. Button and wheel events carry no
/// position of their own, so the dispatcher's last known pointer
/// position is attached here.
pub(crate) fn translate(event_type: &rdev::EventType, pointer: (i32, i32)) -> Option<EventKind> {
    use rdev::EventType;

    match event_type {
        EventType::MouseMove { x, y } => Some(EventKind::Move {
            x: x.round() as i32,
            y: y.round() as i32,
        }),
        EventType::ButtonPress(button) => {
            keymap::button_from_rdev(*button).map(|button| EventKind::Click {
                x: pointer.0,
                y: pointer.1,
                button,
                pressed: true,
            })
        }
        EventType::ButtonRelease(button) => {
            keymap::button_from_rdev(*button).map(|button| EventKind::Click {
                x: pointer.0,
                y: pointer.1,
                button,
                pressed: false,
            })
        }
        EventType::Wheel { delta_x, delta_y } => Some(EventKind::Scroll {
            x: pointer.0,
            y: pointer.1,
            dx: *delta_x as i32,
            dy: *delta_y as i32,
        }),
        EventType::KeyPress(key) => {
            keymap::symbol_from_rdev(*key).map(|key| EventKind::KeyPress { key })
        }
        EventType::KeyRelease(key) => {
            keymap::symbol_from_rdev(*key).map(|key| EventKind::KeyRelease { key })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::KeyPressMatcher;
    use mimeo_core::events::MouseButton;
    use mimeo_core::keys::{KeySymbol, NamedKey};
    use std::sync::atomic::AtomicBool;

    fn key_press(key: KeySymbol) -> EventKind {
        EventKind::KeyPress { key }
    }

    #[test]
    fn capture_tap_is_exclusive_until_released() {
        let dispatcher = Dispatcher::new();
        let tap = dispatcher.subscribe_capture().unwrap();
        assert!(matches!(
            dispatcher.subscribe_capture(),
            Err(Error::HookInstall { .. })
        ));
        drop(tap);
        assert!(dispatcher.subscribe_capture().is_ok());
    }

    #[test]
    fn capture_and_playback_exclude_each_other() {
        let dispatcher = Dispatcher::new();

        let slot = dispatcher.begin_playback().unwrap();
        let second = dispatcher.begin_playback().unwrap();
        assert!(matches!(
            dispatcher.subscribe_capture(),
            Err(Error::AlreadyActive("playback"))
        ));
        drop(slot);
        drop(second);

        let tap = dispatcher.subscribe_capture().unwrap();
        assert!(matches!(
            dispatcher.begin_playback(),
            Err(Error::AlreadyActive("recording"))
        ));
        drop(tap);
        assert!(dispatcher.begin_playback().is_ok());
    }

    #[test]
    fn dispatched_events_reach_the_capture_tap() {
        let dispatcher = Dispatcher::new();
        let tap = dispatcher.subscribe_capture().unwrap();

        assert_eq!(
            dispatcher.dispatch(EventKind::Move { x: 4, y: 5 }),
            Verdict::Forward
        );
        let event = tap.receiver().try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Move { x: 4, y: 5 });
        assert!(!event.synthetic);
    }

    #[test]
    fn guard_matches_suppress_before_capture() {
        let dispatcher = Dispatcher::new();
        let tap = dispatcher.subscribe_capture().unwrap();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        dispatcher.register_guard(
            KeyPressMatcher::new(KeySymbol::Named(NamedKey::Esc)),
            move || flag.store(true, Ordering::SeqCst),
        );

        let verdict = dispatcher.dispatch(key_press(KeySymbol::Named(NamedKey::Esc)));
        assert_eq!(verdict, Verdict::Suppress);
        assert!(fired.load(Ordering::SeqCst));
        assert!(tap.receiver().try_recv().is_err());
    }

    #[test]
    fn injection_marks_events_synthetic() {
        let dispatcher = Dispatcher::new();
        let tap = dispatcher.subscribe_capture().unwrap();

        let mark = dispatcher.begin_injection();
        dispatcher.dispatch(EventKind::Move { x: 1, y: 1 });
        drop(mark);

        let event = tap.receiver().try_recv().unwrap();
        assert!(event.synthetic);

        // the linger window also covers events that trail the mark
        dispatcher.dispatch(EventKind::Move { x: 2, y: 2 });
        assert!(tap.receiver().try_recv().unwrap().synthetic);

        std::thread::sleep(INJECTION_LINGER + Duration::from_millis(5));
        dispatcher.dispatch(EventKind::Move { x: 3, y: 3 });
        assert!(!tap.receiver().try_recv().unwrap().synthetic);
    }

    #[test]
    fn translate_attaches_pointer_position_to_clicks_and_scrolls() {
        let pointer = (120, 340);
        assert_eq!(
            translate(&rdev::EventType::ButtonPress(rdev::Button::Left), pointer),
            Some(EventKind::Click {
                x: 120,
                y: 340,
                button: MouseButton::Left,
                pressed: true,
            })
        );
        assert_eq!(
            translate(
                &rdev::EventType::Wheel {
                    delta_x: 0,
                    delta_y: -2
                },
                pointer
            ),
            Some(EventKind::Scroll {
                x: 120,
                y: 340,
                dx: 0,
                dy: -2,
            })
        );
        // unsupported buttons pass through untranslated
        assert_eq!(
            translate(
                &rdev::EventType::ButtonPress(rdev::Button::Middle),
                pointer
            ),
            None
        );
    }

    #[test]
    fn dispatch_tracks_pointer_for_subsequent_clicks() {
        let dispatcher = Dispatcher::new();
        let tap = dispatcher.subscribe_capture().unwrap();

        dispatcher.dispatch(EventKind::Move { x: 55, y: 66 });
        assert_eq!(dispatcher.pointer(), (55, 66));

        let kind = translate(
            &rdev::EventType::ButtonPress(rdev::Button::Right),
            dispatcher.pointer(),
        )
        .unwrap();
        dispatcher.dispatch(kind);

        let _move = tap.receiver().try_recv().unwrap();
        let click = tap.receiver().try_recv().unwrap();
        assert_eq!(
            click.kind,
            EventKind::Click {
                x: 55,
                y: 66,
                button: MouseButton::Right,
                pressed: true,
            }
        );
    }
}
