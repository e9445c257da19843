//! Capture sessions
//!
//! A recording owns the dispatcher's exclusive capture tap for its
//! lifetime. The session clock is zeroed at `begin`, every arriving
//! event is appended with its offset from that zero, and the session
//! ends when the configured stop key fires its guard - the stop key
//! itself is consumed by the guard and never reaches the timeline.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use mimeo_core::events::Timeline;
use mimeo_core::keys::KeySymbol;
use mimeo_core::{Error, Result};

use crate::guard::KeyPressMatcher;
use crate::hook::{Dispatcher, HookEvent};

/// How often the consumer re-checks the stop flag while the tap is
/// quiet. Bounds teardown latency, not event latency.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(u64);

#[derive(Debug, Clone)]
pub enum RecorderEvent {
    Started { session: SessionId },
    Stopped { session: SessionId, timeline: Timeline },
}

struct ActiveSession {
    id: SessionId,
    /// When the stop condition landed; doubles as the cutoff past
    /// which queued events are no longer part of the session.
    stop_at: Arc<Mutex<Option<Instant>>>,
    done: Arc<AtomicBool>,
    count: Arc<AtomicUsize>,
    started: Instant,
    join: Option<JoinHandle<Timeline>>,
}

/// Drives capture sessions. One per process is the intended shape; the
/// dispatcher's capture tap enforces it even across instances.
pub struct Recorder {
    dispatcher: Dispatcher,
    events_tx: Sender<RecorderEvent>,
    events_rx: Receiver<RecorderEvent>,
    active: Mutex<Option<ActiveSession>>,
    next_session: AtomicU64,
}

impl Recorder {
    pub fn new() -> Self {
        Self::with_dispatcher(Dispatcher::global().clone())
    }

    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            dispatcher,
            events_tx,
            events_rx,
            active: Mutex::new(None),
            next_session: AtomicU64::new(1),
        }
    }

    /// Session notifications: `Started` on begin, `Stopped` with the
    /// finished timeline when the stop key (or `end`) terminates it.
    pub fn events(&self) -> &Receiver<RecorderEvent> {
        &self.events_rx
    }

    /// Starts capturing. Fails with [`Error::AlreadyActive`] while a
    /// session is live or playback is running, and with
    /// [`Error::HookInstall`] when the hook cannot be installed; no
    /// partial state is left behind in either case.
    pub fn begin(&self, stop_key: KeySymbol) -> Result<SessionId> {
        let mut active = self.active.lock();
        if let Some(session) = active.as_ref() {
            if !session.done.load(Ordering::SeqCst) {
                return Err(Error::AlreadyActive("recording"));
            }
        }
        // reap a session that ended via its stop key
        if let Some(mut finished) = active.take() {
            if let Some(join) = finished.join.take() {
                let _ = join.join();
            }
        }

        self.dispatcher.ensure_hook()?;

        let started = Instant::now();
        let tap = self.dispatcher.subscribe_capture()?;

        let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        let stop_at: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        let done = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));

        let guard = {
            let stop_at = stop_at.clone();
            self.dispatcher
                .register_guard(KeyPressMatcher::new(stop_key), move || {
                    let mut stop_at = stop_at.lock();
                    if stop_at.is_none() {
                        *stop_at = Some(Instant::now());
                    }
                })
        };

        let join = {
            let dispatcher = self.dispatcher.clone();
            let events_tx = self.events_tx.clone();
            let stop_at = stop_at.clone();
            let done = done.clone();
            let count = count.clone();
            thread::spawn(move || {
                let mut timeline = Timeline::new();
                let record = |timeline: &mut Timeline, event: HookEvent| {
                    if event.synthetic {
                        return;
                    }
                    // events past the stop moment (e.g. the stop key's
                    // own release) are not part of the session
                    if stop_at.lock().is_some_and(|cutoff| event.at > cutoff) {
                        return;
                    }
                    let t = event.at.saturating_duration_since(started).as_secs_f64();
                    timeline.push(t, event.kind);
                    count.store(timeline.len(), Ordering::SeqCst);
                };

                loop {
                    if stop_at.lock().is_some() {
                        break;
                    }
                    match tap.receiver().recv_timeout(DRAIN_TIMEOUT) {
                        Ok(event) => record(&mut timeline, event),
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                // drain what was already queued when the stop landed
                while let Ok(event) = tap.receiver().try_recv() {
                    record(&mut timeline, event);
                }

                dispatcher.unregister_guard(guard);
                drop(tap);
                done.store(true, Ordering::SeqCst);
                debug!("recording finished with {} events", timeline.len());
                let _ = events_tx.send(RecorderEvent::Stopped {
                    session: id,
                    timeline: timeline.clone(),
                });
                timeline
            })
        };

        *active = Some(ActiveSession {
            id,
            stop_at,
            done,
            count,
            started,
            join: Some(join),
        });

        info!("recording started, stop key: {stop_key}");
        let _ = self.events_tx.send(RecorderEvent::Started { session: id });
        Ok(id)
    }

    /// Stops the current session and returns its timeline. With no
    /// active session this is a no-op returning an empty timeline.
    pub fn end(&self) -> Timeline {
        let mut active = self.active.lock();
        match active.take() {
            Some(mut session) => {
                {
                    let mut stop_at = session.stop_at.lock();
                    if stop_at.is_none() {
                        *stop_at = Some(Instant::now());
                    }
                }
                match session.join.take() {
                    Some(join) => join.join().unwrap_or_default(),
                    None => Timeline::new(),
                }
            }
            None => Timeline::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|session| !session.done.load(Ordering::SeqCst))
    }

    pub fn current_session(&self) -> Option<SessionId> {
        let active = self.active.lock();
        active
            .as_ref()
            .filter(|session| !session.done.load(Ordering::SeqCst))
            .map(|session| session.id)
    }

    /// Events captured so far in the live session.
    pub fn event_count(&self) -> usize {
        self.active
            .lock()
            .as_ref()
            .map_or(0, |session| session.count.load(Ordering::SeqCst))
    }

    /// Time since the live session's clock zero.
    pub fn elapsed(&self) -> Duration {
        let active = self.active.lock();
        match active.as_ref() {
            Some(session) if !session.done.load(Ordering::SeqCst) => session.started.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimeo_core::events::EventKind;
    use mimeo_core::keys::NamedKey;

    const ESC: KeySymbol = KeySymbol::Named(NamedKey::Esc);

    fn press(key: KeySymbol) -> EventKind {
        EventKind::KeyPress { key }
    }

    fn release(key: KeySymbol) -> EventKind {
        EventKind::KeyRelease { key }
    }

    fn wait_for_stop(recorder: &Recorder) -> Timeline {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            match recorder.events().recv_timeout(Duration::from_millis(100)) {
                Ok(RecorderEvent::Stopped { timeline, .. }) => return timeline,
                Ok(RecorderEvent::Started { .. }) => {}
                Err(_) if Instant::now() > deadline => panic!("recorder never stopped"),
                Err(_) => {}
            }
        }
    }

    #[test]
    fn records_events_until_the_stop_key_and_excludes_it() {
        let dispatcher = Dispatcher::new();
        let recorder = Recorder::with_dispatcher(dispatcher.clone());
        recorder.begin(ESC).unwrap();
        assert!(recorder.is_recording());

        dispatcher.dispatch(EventKind::Move { x: 1, y: 2 });
        dispatcher.dispatch(press(KeySymbol::Char('a')));
        dispatcher.dispatch(release(KeySymbol::Char('a')));
        dispatcher.dispatch(press(ESC));

        let timeline = wait_for_stop(&recorder);
        assert_eq!(timeline.len(), 3);
        for event in &timeline {
            assert_ne!(event.kind, press(ESC), "stop key must not be recorded");
        }
        assert!(!recorder.is_recording());
    }

    #[test]
    fn timestamps_are_relative_and_monotonic() {
        let dispatcher = Dispatcher::new();
        let recorder = Recorder::with_dispatcher(dispatcher.clone());
        recorder.begin(ESC).unwrap();

        dispatcher.dispatch(EventKind::Move { x: 0, y: 0 });
        thread::sleep(Duration::from_millis(30));
        dispatcher.dispatch(EventKind::Move { x: 1, y: 1 });
        dispatcher.dispatch(press(ESC));

        let timeline = wait_for_stop(&recorder);
        let events = timeline.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].t < 0.5, "first event should be near clock zero");
        assert!(events[1].t >= events[0].t + 0.025);
        for pair in events.windows(2) {
            assert!(pair[0].t <= pair[1].t);
        }
    }

    #[test]
    fn end_with_no_session_returns_an_empty_timeline() {
        let recorder = Recorder::with_dispatcher(Dispatcher::new());
        assert!(recorder.end().is_empty());
        assert_eq!(recorder.event_count(), 0);
        assert_eq!(recorder.elapsed(), Duration::ZERO);
    }

    #[test]
    fn end_stops_a_live_session_and_returns_its_events() {
        let dispatcher = Dispatcher::new();
        let recorder = Recorder::with_dispatcher(dispatcher.clone());
        recorder.begin(ESC).unwrap();

        dispatcher.dispatch(EventKind::Move { x: 7, y: 7 });
        // give the consumer a moment to drain
        thread::sleep(Duration::from_millis(50));
        assert_eq!(recorder.event_count(), 1);

        let timeline = recorder.end();
        assert_eq!(timeline.len(), 1);
        assert!(!recorder.is_recording());
        // capture tap is free again
        assert!(dispatcher.subscribe_capture().is_ok());
    }

    #[test]
    fn second_begin_while_recording_is_rejected() {
        let dispatcher = Dispatcher::new();
        let recorder = Recorder::with_dispatcher(dispatcher.clone());
        recorder.begin(ESC).unwrap();
        assert!(matches!(
            recorder.begin(ESC),
            Err(Error::AlreadyActive("recording"))
        ));
        recorder.end();
    }

    #[test]
    fn begin_after_stop_key_termination_reaps_and_restarts() {
        let dispatcher = Dispatcher::new();
        let recorder = Recorder::with_dispatcher(dispatcher.clone());
        recorder.begin(ESC).unwrap();
        dispatcher.dispatch(press(ESC));
        wait_for_stop(&recorder);

        let session = recorder.begin(ESC).unwrap();
        assert!(recorder.is_recording());
        assert_eq!(recorder.current_session(), Some(session));
        recorder.end();
    }

    #[test]
    fn synthetic_events_are_not_recorded() {
        let dispatcher = Dispatcher::new();
        let recorder = Recorder::with_dispatcher(dispatcher.clone());
        recorder.begin(ESC).unwrap();

        {
            let _mark = dispatcher.begin_injection();
            dispatcher.dispatch(EventKind::Move { x: 9, y: 9 });
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(recorder.event_count(), 0);
        assert!(recorder.end().is_empty());
    }
}
