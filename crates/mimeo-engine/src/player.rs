//! Timed replay
//!
//! Replay runs on its own thread and never blocks the hook or the
//! caller. Within one pass, event `i` is applied no earlier than
//! `pass_start + (t[i] - t[0]) / speed`; scheduling against absolute
//! deadlines keeps delay error from accumulating across dense
//! timelines, and a computed zero delay stays zero. The wait is
//! preemptible: the abort chord flips an atomic flag from the hook
//! thread and the replay loop notices within one sleep quantum.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{info, warn};

use mimeo_core::events::{EventKind, Timeline};
use mimeo_core::keys::{KeySymbol, NamedKey};
use mimeo_core::{Error, Result};

use crate::guard::ChordMatcher;
use crate::hook::Dispatcher;
use crate::inject::Injector;

/// Upper bound on one preemptible sleep slice; cancellation latency is
/// bounded by this, not by the remaining timeline.
const SLEEP_QUANTUM: Duration = Duration::from_millis(10);

/// Two modifier-class-adjacent keys held together abort playback.
pub const DEFAULT_ABORT_CHORD: (KeySymbol, KeySymbol) = (
    KeySymbol::Named(NamedKey::Ctrl),
    KeySymbol::Named(NamedKey::Esc),
);

#[derive(Debug, Clone, Copy)]
pub struct PlayOptions {
    /// Full passes over the timeline, at least 1.
    pub repeat: u32,
    /// Time divisor: 2.0 halves every delay.
    pub speed: f64,
    /// Multiplier applied to x, y, dx, dy before injection.
    pub scale: f64,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            repeat: 1,
            speed: 1.0,
            scale: 1.0,
        }
    }
}

impl PlayOptions {
    fn validate(&self) -> Result<()> {
        if self.repeat == 0 {
            return Err(Error::InvalidOption("repeat must be at least 1"));
        }
        if !(self.speed > 0.0) {
            return Err(Error::InvalidOption("speed must be greater than zero"));
        }
        if !(self.scale > 0.0) {
            return Err(Error::InvalidOption("scale must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Finished,
    Interrupted,
}

struct PlayerInner {
    dispatcher: Dispatcher,
    injector: Mutex<Option<Box<dyn Injector>>>,
    playing: AtomicBool,
    chord: Mutex<(KeySymbol, KeySymbol)>,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
}

/// Replays timelines through an injector. One replay at a time per
/// player; independent players may run concurrently, each with its own
/// guard and injector (and no shared pressed-key state - overlapping
/// macros can leave keys stuck, a documented limitation).
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    pub fn new(injector: impl Injector + 'static) -> Self {
        Self::with_dispatcher(Dispatcher::global().clone(), injector)
    }

    pub fn with_dispatcher(dispatcher: Dispatcher, injector: impl Injector + 'static) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            inner: Arc::new(PlayerInner {
                dispatcher,
                injector: Mutex::new(Some(Box::new(injector))),
                playing: AtomicBool::new(false),
                chord: Mutex::new(DEFAULT_ABORT_CHORD),
                events_tx,
                events_rx,
            }),
        }
    }

    /// Replaces the abort chord. Takes effect for the next `play`.
    pub fn set_abort_chord(&self, first: KeySymbol, second: KeySymbol) {
        *self.inner.chord.lock() = (first, second);
    }

    /// Playback notifications: exactly one `Finished` or `Interrupted`
    /// per accepted `play`.
    pub fn events(&self) -> &Receiver<PlayerEvent> {
        &self.events_rx
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::SeqCst)
    }

    /// Starts an asynchronous replay. Returns as soon as the replay
    /// thread is launched; rejects overlapping plays on this instance
    /// with [`Error::AlreadyPlaying`] and leaves the in-flight replay
    /// untouched.
    pub fn play(&self, timeline: Timeline, opts: PlayOptions) -> Result<()> {
        opts.validate()?;

        let inner = self.inner.clone();
        if inner.playing.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyPlaying);
        }

        let slot = match inner.dispatcher.begin_playback() {
            Ok(slot) => slot,
            Err(e) => {
                inner.playing.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        if let Err(e) = inner.dispatcher.ensure_hook() {
            drop(slot);
            inner.playing.store(false, Ordering::SeqCst);
            return Err(e);
        }
        let mut injector = match inner.injector.lock().take() {
            Some(injector) => injector,
            None => {
                drop(slot);
                inner.playing.store(false, Ordering::SeqCst);
                return Err(Error::AlreadyPlaying);
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let chord = *inner.chord.lock();
        let guard = {
            let stop = stop.clone();
            inner
                .dispatcher
                .register_guard(ChordMatcher::new(chord.0, chord.1), move || {
                    stop.store(true, Ordering::SeqCst);
                })
        };

        info!(
            "replaying {} events x{} at {}x speed, scale {}",
            timeline.len(),
            opts.repeat,
            opts.speed,
            opts.scale
        );

        let thread_inner = inner.clone();
        thread::spawn(move || {
            let interrupted = run_passes(&timeline, opts, injector.as_mut(), &stop);

            thread_inner.dispatcher.unregister_guard(guard);
            drop(slot);
            *thread_inner.injector.lock() = Some(injector);
            thread_inner.playing.store(false, Ordering::SeqCst);

            let event = if interrupted {
                PlayerEvent::Interrupted
            } else {
                PlayerEvent::Finished
            };
            let _ = thread_inner.events_tx.send(event);
        });

        Ok(())
    }
}

fn run_passes(
    timeline: &Timeline,
    opts: PlayOptions,
    injector: &mut dyn Injector,
    stop: &AtomicBool,
) -> bool {
    // keys currently held down by our own injection; cleared on exit,
    // never auto-released
    let mut pressed: HashSet<KeySymbol> = HashSet::new();
    let mut interrupted = false;

    'passes: for _ in 0..opts.repeat {
        if stop.load(Ordering::SeqCst) {
            interrupted = true;
            break;
        }
        let events = timeline.events();
        let Some(first) = events.first() else {
            continue;
        };
        let base_t = first.t;
        let pass_start = Instant::now();

        for event in events {
            let offset = Duration::from_secs_f64(((event.t - base_t) / opts.speed).max(0.0));
            if !wait_until(pass_start + offset, stop) {
                interrupted = true;
                break 'passes;
            }
            if let Err(e) = apply(injector, &event.kind, opts.scale, &mut pressed) {
                warn!("skipping event: {e}");
            }
        }
    }

    if interrupted && !pressed.is_empty() {
        warn!(
            "interrupted with {} injected key(s) still down (not auto-released)",
            pressed.len()
        );
    }
    pressed.clear();
    interrupted
}

/// Sleeps until `deadline` in preemptible slices. Returns false when
/// the stop flag was raised first.
fn wait_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SLEEP_QUANTUM));
    }
}

fn apply(
    injector: &mut dyn Injector,
    kind: &EventKind,
    scale: f64,
    pressed: &mut HashSet<KeySymbol>,
) -> Result<()> {
    match kind {
        EventKind::Move { x, y } => injector.move_to(scaled(*x, scale), scaled(*y, scale)),
        EventKind::Click {
            x,
            y,
            button,
            pressed: down,
        } => {
            injector.move_to(scaled(*x, scale), scaled(*y, scale))?;
            injector.button(*button, *down)
        }
        EventKind::Scroll { dx, dy, .. } => {
            injector.scroll(scaled(*dx, scale), scaled(*dy, scale))
        }
        EventKind::KeyPress { key } => {
            injector.key(*key, true)?;
            pressed.insert(*key);
            Ok(())
        }
        EventKind::KeyRelease { key } => {
            injector.key(*key, false)?;
            pressed.remove(key);
            Ok(())
        }
    }
}

fn scaled(v: i32, scale: f64) -> i32 {
    (f64::from(v) * scale).round() as i32
}
