//! Playback clock.
//!
//! A worker thread advances the playhead by `1 / target_fps` per tick and
//! hands each time to a [`TickHandler`]. The clock is best-effort real
//! time: each tick sleeps what is left of the frame budget and drift is
//! never compensated.
//!
//! Pausing ends the worker thread; resuming spawns a fresh one at the
//! preserved time. Every worker run owns its own [`CancellationToken`], so
//! a thread that outlives a stop can never touch the state of a later run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use subcraft_common::clock::FramePacer;
use subcraft_common::error::{SubcraftError, SubcraftResult};

/// Upper bound on how long `stop` and `pause` wait for the worker.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

// Longest single sleep, so a cancelled worker notices promptly even at
// very low frame rates.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClockState {
    Stopped,
    Playing,
    Paused,
}

/// Snapshot of the playhead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackState {
    pub current_time: f64,
    pub state: ClockState,
    pub target_fps: f64,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.state == ClockState::Playing
    }
}

/// Cooperative stop signal, checked once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Work performed on every playback tick.
pub trait TickHandler: Send + Sync {
    /// End of the timeline being played, in seconds.
    fn duration(&self) -> f64;

    /// Produce and publish whatever belongs to `time`. Runs on the
    /// playback thread and must not panic out; failures are handled
    /// inside.
    ///
    /// `token` belongs to the run making the call. Once it is cancelled the
    /// run has been stopped, possibly while this tick was rendering, and
    /// nothing more may be published or cached.
    fn on_tick(&self, time: f64, token: &CancellationToken);
}

struct LoopRun {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives a [`TickHandler`] from a dedicated thread.
pub struct PlaybackClock {
    shared: Arc<Mutex<PlaybackState>>,
    run: Mutex<Option<LoopRun>>,
    handler: Mutex<Option<Arc<dyn TickHandler>>>,
    join_timeout: Duration,
}

impl PlaybackClock {
    pub fn new(target_fps: f64) -> Self {
        Self {
            shared: Arc::new(Mutex::new(PlaybackState {
                current_time: 0.0,
                state: ClockState::Stopped,
                target_fps,
            })),
            run: Mutex::new(None),
            handler: Mutex::new(None),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn snapshot(&self) -> PlaybackState {
        *self.shared.lock()
    }

    pub fn state(&self) -> ClockState {
        self.shared.lock().state
    }

    pub fn current_time(&self) -> f64 {
        self.shared.lock().current_time
    }

    pub fn target_fps(&self) -> f64 {
        self.shared.lock().target_fps
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock().is_playing()
    }

    /// Change the tick rate. A running loop picks it up on its next tick.
    pub fn set_target_fps(&self, fps: f64) -> SubcraftResult<()> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(SubcraftError::validation(format!(
                "target fps must be positive, got {fps}"
            )));
        }
        self.shared.lock().target_fps = fps;
        Ok(())
    }

    /// Move the playhead. A running loop continues from here on its next
    /// tick.
    pub fn seek(&self, time: f64) {
        self.shared.lock().current_time = time.max(0.0);
    }

    /// Start playing `handler` from `from` seconds, replacing any loop that
    /// is already running.
    pub fn start(&self, handler: Arc<dyn TickHandler>, from: f64) -> SubcraftResult<()> {
        self.halt_loop();

        let duration = handler.duration().max(0.0);
        {
            let mut shared = self.shared.lock();
            shared.current_time = from.max(0.0).min(duration);
            shared.state = ClockState::Playing;
        }
        *self.handler.lock() = Some(Arc::clone(&handler));

        self.spawn_loop(handler)?;
        tracing::info!(from, duration, "Playback started");
        Ok(())
    }

    /// Pause a playing clock, keeping the current time. Returns whether the
    /// clock was playing.
    pub fn pause(&self) -> bool {
        let run = self.run.lock().take();
        {
            let mut shared = self.shared.lock();
            if shared.state != ClockState::Playing {
                drop(shared);
                self.restore_run(run);
                return false;
            }
            shared.state = ClockState::Paused;
            if let Some(run) = &run {
                run.token.cancel();
            }
        }
        if let Some(run) = run {
            self.join_run(run);
        }
        tracing::info!(time = self.current_time(), "Playback paused");
        true
    }

    /// Resume a paused clock at the preserved time. Returns whether a new
    /// loop was started.
    pub fn resume(&self) -> SubcraftResult<bool> {
        if self.state() != ClockState::Paused {
            return Ok(false);
        }
        let Some(handler) = self.handler.lock().clone() else {
            return Ok(false);
        };

        self.halt_loop();
        self.shared.lock().state = ClockState::Playing;
        self.spawn_loop(handler)?;
        tracing::info!(time = self.current_time(), "Playback resumed");
        Ok(true)
    }

    /// Stop the loop, waiting at most the join timeout, and rewind to 0.
    pub fn stop(&self) {
        let was = self.state();
        self.halt_loop();
        {
            let mut shared = self.shared.lock();
            shared.state = ClockState::Stopped;
            shared.current_time = 0.0;
        }
        self.handler.lock().take();
        if was != ClockState::Stopped {
            tracing::info!("Playback stopped");
        }
    }

    fn restore_run(&self, run: Option<LoopRun>) {
        if let Some(run) = run {
            let mut slot = self.run.lock();
            if slot.is_none() {
                *slot = Some(run);
            }
        }
    }

    /// Cancel and join the current loop, if any.
    fn halt_loop(&self) {
        let run = self.run.lock().take();
        if let Some(run) = run {
            // Hold the state lock so the worker cannot advance after
            // observing a live token.
            {
                let _shared = self.shared.lock();
                run.token.cancel();
            }
            self.join_run(run);
        }
    }

    fn join_run(&self, run: LoopRun) {
        if run.handle.thread().id() == thread::current().id() {
            // Called from an observer on the playback thread; the loop
            // exits on its own once the tick returns.
            return;
        }

        let deadline = Instant::now() + self.join_timeout;
        while !run.handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    timeout_ms = self.join_timeout.as_millis() as u64,
                    "Playback thread did not stop in time; detaching it"
                );
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        if run.handle.join().is_err() {
            tracing::error!("Playback thread panicked");
        }
    }

    fn spawn_loop(&self, handler: Arc<dyn TickHandler>) -> SubcraftResult<()> {
        let token = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let loop_token = token.clone();

        let spawned = thread::Builder::new()
            .name("subcraft-playback".into())
            .spawn(move || run_loop(shared, handler, loop_token));

        match spawned {
            Ok(handle) => {
                *self.run.lock() = Some(LoopRun { token, handle });
                Ok(())
            }
            Err(e) => {
                self.shared.lock().state = ClockState::Stopped;
                Err(e.into())
            }
        }
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        self.halt_loop();
    }
}

fn run_loop(
    shared: Arc<Mutex<PlaybackState>>,
    handler: Arc<dyn TickHandler>,
    token: CancellationToken,
) {
    let mut pacer = FramePacer::new(shared.lock().target_fps);

    loop {
        pacer.begin_frame();

        let (time, fps) = {
            let state = shared.lock();
            if token.is_cancelled() || state.state != ClockState::Playing {
                return;
            }
            (state.current_time, state.target_fps)
        };

        let duration = handler.duration();
        if time >= duration {
            let mut state = shared.lock();
            if !token.is_cancelled() {
                state.state = ClockState::Stopped;
                tracing::info!(time, "Playback reached the end");
            }
            return;
        }

        pacer.set_fps(fps);
        handler.on_tick(time, &token);

        {
            let mut state = shared.lock();
            if token.is_cancelled() {
                return;
            }
            // A seek during the tick wins over the scheduled advance.
            if state.current_time == time {
                state.current_time = (time + 1.0 / fps).min(duration);
            }
        }

        loop {
            let remaining = pacer.remaining();
            if remaining.is_zero() || token.is_cancelled() {
                break;
            }
            thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        duration: f64,
        ticks: Mutex<Vec<f64>>,
    }

    impl Recorder {
        fn new(duration: f64) -> Arc<Self> {
            Arc::new(Self {
                duration,
                ticks: Mutex::new(Vec::new()),
            })
        }

        fn ticks(&self) -> Vec<f64> {
            self.ticks.lock().clone()
        }
    }

    impl TickHandler for Recorder {
        fn duration(&self) -> f64 {
            self.duration
        }

        fn on_tick(&self, time: f64, _token: &CancellationToken) {
            self.ticks.lock().push(time);
        }
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_runs_to_natural_end() {
        let clock = PlaybackClock::new(100.0);
        let recorder = Recorder::new(0.5);
        clock.start(recorder.clone(), 0.45).unwrap();

        assert!(wait_until(Duration::from_secs(2), || !clock.is_playing()));
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.current_time(), 0.5);

        let ticks = recorder.ticks();
        assert!(!ticks.is_empty());
        assert!(ticks.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_pause_preserves_time_and_resume_continues() {
        let clock = PlaybackClock::new(50.0);
        let recorder = Recorder::new(60.0);
        clock.start(recorder.clone(), 0.0).unwrap();
        assert!(wait_until(Duration::from_secs(2), || recorder.ticks().len() >= 3));

        assert!(clock.pause());
        assert_eq!(clock.state(), ClockState::Paused);
        let paused_at = clock.current_time();
        let ticks_at_pause = recorder.ticks().len();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(clock.current_time(), paused_at);
        assert_eq!(recorder.ticks().len(), ticks_at_pause);
        assert!(!clock.pause());

        assert!(clock.resume().unwrap());
        assert!(wait_until(Duration::from_secs(2), || recorder.ticks().len() > ticks_at_pause));
        assert_eq!(recorder.ticks()[ticks_at_pause], paused_at);

        clock.stop();
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.current_time(), 0.0);
        assert!(!clock.resume().unwrap());
    }

    #[test]
    fn test_seek_while_playing() {
        let clock = PlaybackClock::new(50.0);
        let recorder = Recorder::new(60.0);
        clock.start(recorder.clone(), 0.0).unwrap();
        assert!(wait_until(Duration::from_secs(2), || !recorder.ticks().is_empty()));

        clock.seek(30.0);
        assert!(wait_until(Duration::from_secs(2), || {
            recorder.ticks().iter().any(|t| *t >= 30.0)
        }));
        clock.stop();
    }

    #[test]
    fn test_stop_from_tick_does_not_deadlock() {
        struct Stopper {
            clock: Mutex<Option<Arc<PlaybackClock>>>,
        }

        impl TickHandler for Stopper {
            fn duration(&self) -> f64 {
                10.0
            }

            fn on_tick(&self, _time: f64, _token: &CancellationToken) {
                if let Some(clock) = self.clock.lock().take() {
                    clock.stop();
                }
            }
        }

        let clock = Arc::new(PlaybackClock::new(100.0));
        let stopper = Arc::new(Stopper {
            clock: Mutex::new(Some(clock.clone())),
        });
        clock.start(stopper, 0.0).unwrap();

        assert!(wait_until(Duration::from_secs(2), || clock.state() == ClockState::Stopped));
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn test_start_clamps_and_rejects_bad_fps() {
        let clock = PlaybackClock::new(20.0);
        let recorder = Recorder::new(1.0);
        clock.start(recorder, 5.0).unwrap();
        assert!(wait_until(Duration::from_secs(2), || !clock.is_playing()));
        assert_eq!(clock.current_time(), 1.0);

        assert!(clock.set_target_fps(0.0).is_err());
        assert!(clock.set_target_fps(f64::INFINITY).is_err());
        clock.set_target_fps(24.0).unwrap();
        assert_eq!(clock.target_fps(), 24.0);
    }

    #[test]
    fn test_detached_tick_sees_cancelled_token() {
        struct Slow {
            seen: Mutex<Vec<bool>>,
        }

        impl TickHandler for Slow {
            fn duration(&self) -> f64 {
                10.0
            }

            fn on_tick(&self, _time: f64, token: &CancellationToken) {
                thread::sleep(Duration::from_millis(200));
                self.seen.lock().push(token.is_cancelled());
            }
        }

        let clock = PlaybackClock::new(50.0).with_join_timeout(Duration::from_millis(20));
        let slow = Arc::new(Slow {
            seen: Mutex::new(Vec::new()),
        });
        clock.start(slow.clone(), 0.0).unwrap();
        thread::sleep(Duration::from_millis(50));

        let stopped = Instant::now();
        clock.stop();
        assert!(stopped.elapsed() < Duration::from_millis(150));
        assert_eq!(clock.current_time(), 0.0);

        assert!(wait_until(Duration::from_secs(2), || !slow.seen.lock().is_empty()));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(*slow.seen.lock(), vec![true]);
    }

    #[test]
    fn test_token_cancellation() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
