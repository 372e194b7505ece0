//! Periodic pipeline worker with bounded auto-recovery.
//!
//! A [`PipelineWorker`] owns one background thread that repeatedly calls
//! [`Pipeline::capture`] then [`Pipeline::process`], paces itself to the
//! configured [`CycleInterval`], and restarts the pipeline after a failure
//! as long as recovery attempts remain.
//!
//! State is kept in one mutex guarded block:
//! - `Stopped`: no thread is associated with the worker
//! - `Running(run)`: a thread is driving cycles
//! - `Recovering(run)`: a thread is sleeping before an automatic restart
//!
//! A run is identified by the token handed to its thread at spawn time.
//! `stop()` replaces the state with `Stopped`; the old thread notices on its
//! next check and exits without reporting anything. The hooks mutex is held
//! for the whole of a cycle and the token is checked under it, so once
//! `stop()` returns and the caller has acquired the hooks mutex, no cycle can
//! start on that thread again.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::CycleInterval;
use crate::event::EventCallback;
use crate::{StreamError, StreamEvent};

/// The per-cycle work driven by a [`PipelineWorker`].
///
/// Hooks always run on the worker thread, one at a time, in the order
/// `capture`, `process`. Returning an error ends the current run; returning
/// [`StreamError::Cancelled`] ends it without counting as a failure.
pub trait Pipeline: Send + 'static {
    /// Pulls one slice of raw input.
    fn capture(&mut self) -> Result<(), StreamError>;

    /// Moves available output downstream.
    fn process(&mut self) -> Result<(), StreamError>;

    /// Called after the back-off delay, before a restarted run's first cycle.
    ///
    /// Default implementation keeps existing resources.
    fn recover(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

/// Externally visible worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// No thread associated.
    Stopped,
    /// Cycles are running.
    Running,
    /// Waiting out the retry period before a restart.
    Recovering,
}

struct Run {
    token: u64,
    cancelled: bool,
    pending_error: Option<Arc<StreamError>>,
}

impl Run {
    fn new(token: u64) -> Self {
        Self {
            token,
            cancelled: false,
            pending_error: None,
        }
    }
}

enum State {
    Stopped,
    Running(Run),
    Recovering(Run),
}

struct Control {
    state: State,
    next_token: u64,
    interval: CycleInterval,
    retry_period: Duration,
    attempts_remaining: u32,
    last_error: Option<Arc<StreamError>>,
    cycle_count: u64,
    run_count: u64,
    event_callback: Option<EventCallback>,
}

impl Control {
    /// The run owned by `token`, whether or not it was cancelled.
    fn owned_run(&mut self, token: u64) -> Option<&mut Run> {
        match &mut self.state {
            State::Running(run) | State::Recovering(run) if run.token == token => Some(run),
            _ => None,
        }
    }

    /// `true` while `token` may keep running cycles.
    fn is_current(&self, token: u64) -> bool {
        matches!(&self.state, State::Running(run) if run.token == token && !run.cancelled)
    }

    /// `true` while `token` is waiting out its back-off.
    fn is_backing_off(&self, token: u64) -> bool {
        matches!(&self.state, State::Recovering(run) if run.token == token)
    }
}

/// State shared by the worker, its thread and any [`WorkerHandle`].
struct ControlBlock {
    name: String,
    control: Mutex<Control>,
    signal: Condvar,
}

impl ControlBlock {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock()
    }

    fn stop(&self) {
        let mut control = self.lock();
        control.attempts_remaining = 0;
        if !matches!(control.state, State::Stopped) {
            control.state = State::Stopped;
            tracing::info!(worker = %self.name, "stop requested");
        }
        self.signal.notify_all();
    }

    fn stop_with_error(&self, error: StreamError) {
        let mut control = self.lock();
        match &mut control.state {
            State::Running(run) => {
                tracing::debug!(worker = %self.name, error = %error, "stop requested with error");
                run.pending_error = Some(Arc::new(error));
                run.cancelled = true;
                self.signal.notify_all();
            }
            // The failed run was already reported; the restart is not a run yet.
            State::Recovering(_) => {
                tracing::debug!(worker = %self.name, error = %error, "stop_with_error ignored, recovering");
            }
            State::Stopped => {
                tracing::debug!(worker = %self.name, error = %error, "stop_with_error ignored, not running");
            }
        }
    }

    fn emit(&self, event: StreamEvent) {
        let callback = self.lock().event_callback.clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }
}

/// How a run's cycle loop ended.
enum Outcome {
    /// Single-shot cycle completed.
    Finished,
    /// Stopped, cancelled or disassociated.
    Interrupted,
    /// A hook failed.
    Failed(StreamError),
}

/// What the thread does after the recovery decision.
enum Settle {
    Exit,
    Retry(Duration),
}


/// The thread-side half of a worker.
struct Runner<P> {
    block: Arc<ControlBlock>,
    pipeline: Arc<Mutex<P>>,
}

impl<P: Pipeline> Runner<P> {
    fn run(&self, token: u64) {
        let mut restarting = false;

        loop {
            let Some(run) = self.begin_run(token) else {
                return;
            };
            tracing::info!(worker = %self.block.name, run, "pipeline started");
            self.block.emit(StreamEvent::WorkerStarted {
                worker: self.block.name.clone(),
                run,
            });

            let prepared = if restarting {
                self.recover_pipeline(token)
            } else {
                Ok(())
            };
            let outcome = match prepared {
                Ok(()) => self.run_cycles(token),
                Err(outcome) => outcome,
            };

            let cycles = self.block.lock().cycle_count.saturating_sub(1);
            tracing::info!(worker = %self.block.name, cycles, "stopped after {} cycles", cycles);
            self.block.emit(StreamEvent::WorkerStopped {
                worker: self.block.name.clone(),
                cycles,
            });

            let failure = match outcome {
                Outcome::Failed(error) => Some(Arc::new(error)),
                Outcome::Finished | Outcome::Interrupted => None,
            };

            match self.settle(token, failure) {
                Settle::Exit => return,
                Settle::Retry(delay) => {
                    if !self.back_off(token, delay) {
                        return;
                    }
                }
            }
            restarting = true;
        }
    }

    fn begin_run(&self, token: u64) -> Option<u64> {
        let mut control = self.block.lock();
        // A run cancelled with an error still has to reach settle().
        control.owned_run(token)?;
        control.run_count += 1;
        control.cycle_count = 1;
        Some(control.run_count)
    }

    fn recover_pipeline(&self, token: u64) -> Result<(), Outcome> {
        let mut pipeline = self.pipeline.lock();
        if !self.block.lock().is_current(token) {
            return Err(Outcome::Interrupted);
        }
        match pipeline.recover() {
            Ok(()) => Ok(()),
            Err(error) if error.is_cancelled() => Err(Outcome::Interrupted),
            Err(error) => Err(Outcome::Failed(error)),
        }
    }

    fn run_cycles(&self, token: u64) -> Outcome {
        let mut cycle_start = Instant::now();

        loop {
            {
                let mut pipeline = self.pipeline.lock();
                if !self.block.lock().is_current(token) {
                    return Outcome::Interrupted;
                }
                let result = pipeline.capture().and_then(|()| pipeline.process());
                match result {
                    Ok(()) => {}
                    Err(error) if error.is_cancelled() => return Outcome::Interrupted,
                    Err(error) => return Outcome::Failed(error),
                }
            }

            let mut control = self.block.lock();
            if !control.is_current(token) {
                return Outcome::Interrupted;
            }
            control.cycle_count += 1;

            let Some(period) = control.interval.period() else {
                return Outcome::Finished;
            };
            let remaining = period.saturating_sub(cycle_start.elapsed());
            if remaining.is_zero() {
                drop(control);
                thread::yield_now();
            } else {
                self.block
                    .signal
                    .wait_while_for(&mut control, |c| c.is_current(token), remaining);
            }
            cycle_start = Instant::now();
        }
    }

    /// The single recovery decision point for a finished run.
    fn settle(&self, token: u64, failure: Option<Arc<StreamError>>) -> Settle {
        let mut control = self.block.lock();
        let Some(run) = control.owned_run(token) else {
            // Disassociated by stop(); the run's outcome is discarded.
            return Settle::Exit;
        };
        let error = run.pending_error.take().or(failure);

        let error = match error {
            Some(error) if !error.is_cancelled() => error,
            _ => {
                drop(control);
                self.finish(token);
                return Settle::Exit;
            }
        };

        control.last_error = Some(Arc::clone(&error));
        let name = &self.block.name;

        if error.is_retryable() && control.attempts_remaining > 0 {
            let delay = control.retry_period;
            control.state = State::Recovering(Run::new(token));
            drop(control);

            tracing::error!(worker = %name, error = %error, "pipeline failed");
            tracing::info!(worker = %name, "recovering in {} ms", delay.as_millis());
            self.block.emit(StreamEvent::PipelineError {
                worker: name.clone(),
                error,
                recovery_delay: delay,
            });
            Settle::Retry(delay)
        } else {
            control.attempts_remaining = 0;
            drop(control);

            tracing::error!(worker = %name, error = %error, "pipeline failed, not recovering");
            self.block.emit(StreamEvent::PipelineError {
                worker: name.clone(),
                error,
                recovery_delay: Duration::ZERO,
            });
            self.finish(token);
            Settle::Exit
        }
    }

    /// Sleeps out the retry period. Returns `false` if stopped meanwhile.
    fn back_off(&self, token: u64, delay: Duration) -> bool {
        let mut control = self.block.lock();
        self.block
            .signal
            .wait_while_for(&mut control, |c| c.is_backing_off(token), delay);

        if !control.is_backing_off(token) {
            return false;
        }
        control.attempts_remaining = control.attempts_remaining.saturating_sub(1);
        control.state = State::Running(Run::new(token));
        control.last_error = None;
        true
    }

    /// Moves the worker to `Stopped` if `token` still owns it.
    fn finish(&self, token: u64) {
        let mut control = self.block.lock();
        if control.owned_run(token).is_some() {
            control.state = State::Stopped;
            self.block.signal.notify_all();
        }
    }
}

/// A cheap, clonable handle for stopping a worker from another thread.
#[derive(Clone)]
pub struct WorkerHandle {
    block: Arc<ControlBlock>,
}

impl WorkerHandle {
    /// See [`PipelineWorker::stop`].
    pub fn stop(&self) {
        self.block.stop();
    }

    /// See [`PipelineWorker::stop_with_error`].
    pub fn stop_with_error(&self, error: StreamError) {
        self.block.stop_with_error(error);
    }

    /// Returns the worker's name.
    pub fn name(&self) -> &str {
        &self.block.name
    }
}

/// Drives a [`Pipeline`] on a dedicated thread.
///
/// # Example
///
/// ```
/// use stream_channel::{CycleInterval, Pipeline, PipelineWorker, StreamError};
/// use std::time::Duration;
///
/// struct Counter(u32);
///
/// impl Pipeline for Counter {
///     fn capture(&mut self) -> Result<(), StreamError> {
///         Ok(())
///     }
///
///     fn process(&mut self) -> Result<(), StreamError> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// let worker = PipelineWorker::new("counter", Counter(0))
///     .with_interval(CycleInterval::SingleShot);
/// worker.start()?;
/// assert!(worker.wait_until_stopped(Duration::from_secs(5)));
/// assert_eq!(worker.with_pipeline(|p| p.0), 1);
/// # Ok::<(), StreamError>(())
/// ```
pub struct PipelineWorker<P> {
    runner: Runner<P>,
}

impl<P: Pipeline> PipelineWorker<P> {
    /// Creates a stopped worker.
    ///
    /// Defaults: immediate interval, 5 second retry period, no retries.
    pub fn new(name: impl Into<String>, pipeline: P) -> Self {
        let control = Control {
            state: State::Stopped,
            next_token: 1,
            interval: CycleInterval::Immediate,
            retry_period: Duration::from_secs(5),
            attempts_remaining: 0,
            last_error: None,
            cycle_count: 0,
            run_count: 0,
            event_callback: None,
        };
        Self {
            runner: Runner {
                block: Arc::new(ControlBlock {
                    name: name.into(),
                    control: Mutex::new(control),
                    signal: Condvar::new(),
                }),
                pipeline: Arc::new(Mutex::new(pipeline)),
            },
        }
    }

    /// Sets the cycle interval.
    #[must_use]
    pub fn with_interval(self, interval: CycleInterval) -> Self {
        self.set_interval(interval);
        self
    }

    /// Sets the callback that receives lifecycle and failure events.
    #[must_use]
    pub fn with_event_callback(self, callback: EventCallback) -> Self {
        self.set_event_callback(callback);
        self
    }

    /// Replaces the event callback. Events already being delivered still
    /// go to the previous one.
    pub fn set_event_callback(&self, callback: EventCallback) {
        self.block().lock().event_callback = Some(callback);
    }

    /// Changes the cycle interval. Takes effect at the next pacing step.
    pub fn set_interval(&self, interval: CycleInterval) {
        self.block().lock().interval = interval;
        self.block().signal.notify_all();
    }

    /// Starts the worker thread if it is not already running.
    ///
    /// Returns immediately. Calling this while running or recovering is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ThreadSpawn`] if the OS refuses to create the
    /// thread.
    pub fn start(&self) -> Result<(), StreamError> {
        let block = self.block();
        let mut control = block.lock();
        if !matches!(control.state, State::Stopped) {
            tracing::debug!(worker = %block.name, "start ignored, already running");
            return Ok(());
        }

        let token = control.next_token;
        control.next_token += 1;

        let runner = Runner {
            block: Arc::clone(&self.runner.block),
            pipeline: Arc::clone(&self.runner.pipeline),
        };
        thread::Builder::new()
            .name(format!("{}-worker", block.name))
            .spawn(move || runner.run(token))
            .map_err(StreamError::ThreadSpawn)?;

        control.state = State::Running(Run::new(token));
        control.last_error = None;
        Ok(())
    }

    /// Sets the recovery policy, then starts the worker.
    ///
    /// While running this only replaces the policy for future failures.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn start_with_recovery(&self, retry_period: Duration, attempts: u32) -> Result<(), StreamError> {
        {
            let mut control = self.block().lock();
            control.retry_period = retry_period;
            control.attempts_remaining = attempts;
        }
        self.start()
    }

    /// Stops the worker without an error.
    ///
    /// Clears remaining recovery attempts and wakes any pacing or back-off
    /// sleep. Does not wait for the thread: a cycle already in progress
    /// completes and its result is discarded.
    pub fn stop(&self) {
        self.block().stop();
    }

    /// Ends the current run as if a hook had failed with `error`.
    ///
    /// The recovery policy applies: the worker restarts if `error` is
    /// retryable and attempts remain, otherwise it stops. Ignored while
    /// stopped or recovering, since no run is in progress then.
    pub fn stop_with_error(&self, error: StreamError) {
        self.block().stop_with_error(error);
    }

    /// Returns a handle that can stop this worker from other threads.
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            block: Arc::clone(&self.runner.block),
        }
    }

    /// Runs `f` with exclusive access to the pipeline.
    ///
    /// Blocks until any in-progress cycle finishes.
    pub fn with_pipeline<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut pipeline = self.runner.pipeline.lock();
        f(&mut pipeline)
    }

    /// Returns the worker's name.
    pub fn name(&self) -> &str {
        &self.block().name
    }

    /// Returns the current state.
    pub fn status(&self) -> WorkerStatus {
        match self.block().lock().state {
            State::Stopped => WorkerStatus::Stopped,
            State::Running(_) => WorkerStatus::Running,
            State::Recovering(_) => WorkerStatus::Recovering,
        }
    }

    /// Returns `true` while a thread is associated, including during recovery.
    pub fn is_running(&self) -> bool {
        self.status() != WorkerStatus::Stopped
    }

    /// The error that ended the most recent failed run, if any.
    ///
    /// Cleared when the worker starts or restarts.
    pub fn last_error(&self) -> Option<Arc<StreamError>> {
        self.block().lock().last_error.clone()
    }

    /// Index of the cycle the current run is on, starting at 1.
    pub fn cycle_count(&self) -> u64 {
        self.block().lock().cycle_count
    }

    /// Number of runs started, including automatic restarts.
    pub fn run_count(&self) -> u64 {
        self.block().lock().run_count
    }

    /// Recovery attempts left before a failure becomes terminal.
    pub fn attempts_remaining(&self) -> u32 {
        self.block().lock().attempts_remaining
    }

    /// Blocks until the worker is stopped or `timeout` elapses.
    ///
    /// Returns `true` if the worker is stopped. When a run ends on its own,
    /// its final events have been delivered by the time this returns.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let block = self.block();
        let mut control = block.lock();
        block.signal.wait_while_for(
            &mut control,
            |c| !matches!(c.state, State::Stopped),
            timeout,
        );
        matches!(control.state, State::Stopped)
    }

    fn block(&self) -> &ControlBlock {
        &self.runner.block
    }
}

impl<P> Drop for PipelineWorker<P> {
    fn drop(&mut self) {
        self.runner.block.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_callback;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    /// Pipeline whose `process` fails for the first `failures` calls.
    struct Scripted {
        captures: Arc<AtomicU64>,
        processes: Arc<AtomicU64>,
        recovers: Arc<AtomicU32>,
        failures: u32,
        error: fn() -> StreamError,
        starts: Arc<Mutex<Vec<Instant>>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                captures: Arc::new(AtomicU64::new(0)),
                processes: Arc::new(AtomicU64::new(0)),
                recovers: Arc::new(AtomicU32::new(0)),
                failures: 0,
                error: || StreamError::capture("device dropped"),
                starts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(failures: u32) -> Self {
            Self {
                failures,
                ..Self::new()
            }
        }
    }

    impl Pipeline for Scripted {
        fn capture(&mut self) -> Result<(), StreamError> {
            self.starts.lock().push(Instant::now());
            self.captures.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn process(&mut self) -> Result<(), StreamError> {
            self.processes.fetch_add(1, Ordering::SeqCst);
            if self.failures > 0 {
                self.failures -= 1;
                return Err((self.error)());
            }
            Ok(())
        }

        fn recover(&mut self) -> Result<(), StreamError> {
            self.recovers.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn collect_events() -> (EventCallback, Arc<Mutex<Vec<StreamEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (event_callback(move |e| sink.lock().push(e)), events)
    }

    fn error_delays(events: &Mutex<Vec<StreamEvent>>) -> Vec<Duration> {
        events
            .lock()
            .iter()
            .filter_map(|e| match e {
                StreamEvent::PipelineError { recovery_delay, .. } => Some(*recovery_delay),
                _ => None,
            })
            .collect()
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    const LONG: Duration = Duration::from_secs(5);

    #[test]
    fn test_single_shot_runs_exactly_one_cycle() {
        let pipeline = Scripted::new();
        let processes = Arc::clone(&pipeline.processes);
        let worker = PipelineWorker::new("single", pipeline).with_interval(CycleInterval::SingleShot);

        worker.start().unwrap();
        assert!(worker.wait_until_stopped(LONG));

        assert_eq!(processes.load(Ordering::SeqCst), 1);
        assert!(worker.last_error().is_none());
        assert_eq!(worker.run_count(), 1);
        assert_eq!(worker.status(), WorkerStatus::Stopped);
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let worker = PipelineWorker::new("idempotent", Scripted::new())
            .with_interval(CycleInterval::Every(Duration::from_millis(5)));

        worker.start().unwrap();
        worker.start().unwrap();
        worker.start().unwrap();
        assert!(wait_for(LONG, || worker.cycle_count() > 3));

        assert_eq!(worker.run_count(), 1);
        worker.stop();
    }

    #[test]
    fn test_immediate_interval_runs_back_to_back() {
        let pipeline = Scripted::new();
        let processes = Arc::clone(&pipeline.processes);
        let worker = PipelineWorker::new("busy", pipeline);

        worker.start().unwrap();
        assert!(wait_for(LONG, || processes.load(Ordering::SeqCst) > 100));
        worker.stop();
        assert!(worker.wait_until_stopped(LONG));
    }

    #[test]
    fn test_pacing_spaces_cycle_starts() {
        let pipeline = Scripted::new();
        let starts = Arc::clone(&pipeline.starts);
        let worker = PipelineWorker::new("paced", pipeline)
            .with_interval(CycleInterval::Every(Duration::from_millis(30)));

        worker.start().unwrap();
        assert!(wait_for(LONG, || starts.lock().len() >= 5));
        worker.stop();

        let starts = starts.lock();
        for pair in starts.windows(2) {
            let spacing = pair[1] - pair[0];
            assert!(spacing >= Duration::from_millis(28), "spacing {spacing:?}");
        }
    }

    #[test]
    fn test_stop_interrupts_pacing_sleep() {
        let (callback, events) = collect_events();
        let pipeline = Scripted::new();
        let processes = Arc::clone(&pipeline.processes);
        let worker = PipelineWorker::new("sleepy", pipeline)
            .with_interval(CycleInterval::Every(Duration::from_secs(60)))
            .with_event_callback(callback);

        worker.start().unwrap();
        assert!(wait_for(LONG, || processes.load(Ordering::SeqCst) == 1));

        let stopped_at = Instant::now();
        worker.stop();
        assert!(worker.wait_until_stopped(Duration::ZERO));

        let exited = wait_for(LONG, || {
            events
                .lock()
                .iter()
                .any(|e| matches!(e, StreamEvent::WorkerStopped { .. }))
        });
        assert!(exited);
        assert!(stopped_at.elapsed() < Duration::from_secs(1));
        assert!(worker.last_error().is_none());
        assert!(error_delays(&events).is_empty());
    }

    #[test]
    fn test_attempts_bound_error_notifications() {
        let (callback, events) = collect_events();
        let pipeline = Scripted::failing(u32::MAX);
        let recovers = Arc::clone(&pipeline.recovers);
        let worker = PipelineWorker::new("flaky", pipeline).with_event_callback(callback);

        worker
            .start_with_recovery(Duration::from_millis(20), 3)
            .unwrap();
        assert!(wait_for(LONG, || error_delays(&events).len() == 4));
        assert!(worker.wait_until_stopped(LONG));

        let delays = error_delays(&events);
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(20),
                Duration::from_millis(20),
                Duration::from_millis(20),
                Duration::ZERO
            ]
        );
        assert_eq!(worker.run_count(), 4);
        assert_eq!(recovers.load(Ordering::SeqCst), 3);
        assert_eq!(worker.attempts_remaining(), 0);
        assert!(worker.last_error().is_some());
    }

    #[test]
    fn test_attempts_count_failures_not_successes() {
        let (callback, events) = collect_events();
        // Fails on runs 1-3, would succeed on run 4
        let worker =
            PipelineWorker::new("exhausted", Scripted::failing(3)).with_event_callback(callback);

        worker
            .start_with_recovery(Duration::from_millis(100), 2)
            .unwrap();
        assert!(worker.wait_until_stopped(LONG));
        // The final notification is delivered before the worker reports stopped
        let delays = error_delays(&events);

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::ZERO
            ]
        );
        assert_eq!(worker.run_count(), 3);
        assert_eq!(worker.status(), WorkerStatus::Stopped);
    }

    #[test]
    fn test_recovered_run_keeps_going() {
        let (callback, events) = collect_events();
        let pipeline = Scripted::failing(1);
        let processes = Arc::clone(&pipeline.processes);
        let worker = PipelineWorker::new("recovers", pipeline).with_event_callback(callback);

        worker
            .start_with_recovery(Duration::from_millis(10), 1)
            .unwrap();
        assert!(wait_for(LONG, || processes.load(Ordering::SeqCst) > 20));

        assert_eq!(worker.status(), WorkerStatus::Running);
        assert_eq!(worker.run_count(), 2);
        assert!(worker.last_error().is_none());
        assert_eq!(error_delays(&events), vec![Duration::from_millis(10)]);
        worker.stop();
    }

    #[test]
    fn test_configuration_error_is_never_retried() {
        let (callback, events) = collect_events();
        let mut pipeline = Scripted::failing(1);
        pipeline.error = || StreamError::configuration("unsupported codec");
        let worker = PipelineWorker::new("fatal", pipeline).with_event_callback(callback);

        worker
            .start_with_recovery(Duration::from_millis(10), 5)
            .unwrap();
        assert!(worker.wait_until_stopped(LONG));

        assert_eq!(error_delays(&events), vec![Duration::ZERO]);
        assert_eq!(worker.run_count(), 1);
    }

    #[test]
    fn test_cancelled_hook_stops_without_notification() {
        let (callback, events) = collect_events();
        let mut pipeline = Scripted::failing(1);
        pipeline.error = || StreamError::Cancelled;
        let worker = PipelineWorker::new("cancelled", pipeline).with_event_callback(callback);

        worker
            .start_with_recovery(Duration::from_millis(10), 5)
            .unwrap();
        assert!(worker.wait_until_stopped(LONG));

        assert!(error_delays(&events).is_empty());
        assert!(worker.last_error().is_none());
    }

    #[test]
    fn test_stop_with_error_applies_recovery_policy() {
        let (callback, events) = collect_events();
        let worker = PipelineWorker::new("external", Scripted::new())
            .with_interval(CycleInterval::Every(Duration::from_secs(60)))
            .with_event_callback(callback);

        worker
            .start_with_recovery(Duration::from_millis(10), 1)
            .unwrap();
        assert!(wait_for(LONG, || worker.cycle_count() == 2));

        worker.handle().stop_with_error(StreamError::capture("lost device"));
        assert!(wait_for(LONG, || worker.run_count() == 2));

        assert_eq!(error_delays(&events), vec![Duration::from_millis(10)]);
        assert_eq!(worker.status(), WorkerStatus::Running);

        worker.handle().stop_with_error(StreamError::capture("lost device again"));
        assert!(worker.wait_until_stopped(LONG));
        assert_eq!(
            error_delays(&events),
            vec![Duration::from_millis(10), Duration::ZERO]
        );
        assert!(worker.last_error().unwrap().to_string().contains("again"));
    }

    #[test]
    fn test_stop_during_back_off_cancels_restart() {
        let (callback, events) = collect_events();
        let pipeline = Scripted::failing(1);
        let recovers = Arc::clone(&pipeline.recovers);
        let worker = PipelineWorker::new("backoff", pipeline).with_event_callback(callback);

        worker.start_with_recovery(Duration::from_secs(60), 3).unwrap();
        assert!(wait_for(LONG, || worker.status() == WorkerStatus::Recovering));

        worker.stop();
        assert!(worker.wait_until_stopped(Duration::ZERO));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(worker.run_count(), 1);
        assert_eq!(recovers.load(Ordering::SeqCst), 0);
        assert_eq!(error_delays(&events), vec![Duration::from_secs(60)]);
        assert_eq!(worker.attempts_remaining(), 0);
    }

    #[test]
    fn test_stop_with_error_during_back_off_is_ignored() {
        let (callback, events) = collect_events();
        let pipeline = Scripted::failing(1);
        let processes = Arc::clone(&pipeline.processes);
        let worker = PipelineWorker::new("backoff-error", pipeline).with_event_callback(callback);

        worker
            .start_with_recovery(Duration::from_millis(300), 1)
            .unwrap();
        assert!(wait_for(LONG, || worker.status() == WorkerStatus::Recovering));

        for _ in 0..5 {
            worker.stop_with_error(StreamError::capture("still unplugged"));
        }
        assert_eq!(worker.status(), WorkerStatus::Recovering);
        assert_eq!(worker.attempts_remaining(), 1);

        // The restart still happens on schedule and the restarted run succeeds
        assert!(wait_for(LONG, || worker.run_count() == 2));
        assert!(wait_for(LONG, || processes.load(Ordering::SeqCst) > 3));
        assert_eq!(worker.status(), WorkerStatus::Running);
        assert_eq!(error_delays(&events), vec![Duration::from_millis(300)]);
        assert!(worker.last_error().is_none());
        worker.stop();
    }

    #[test]
    fn test_concurrent_start_spawns_one_run() {
        for round in 0..20 {
            let worker = Arc::new(
                PipelineWorker::new(format!("race-{round}"), Scripted::new())
                    .with_interval(CycleInterval::Every(Duration::from_millis(5))),
            );
            let barrier = Arc::new(std::sync::Barrier::new(8));

            let racers: Vec<_> = (0..8)
                .map(|_| {
                    let worker = Arc::clone(&worker);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        worker.start().unwrap();
                    })
                })
                .collect();
            for racer in racers {
                racer.join().unwrap();
            }

            assert!(wait_for(LONG, || worker.cycle_count() > 2));
            assert_eq!(worker.run_count(), 1);
            worker.stop();
            assert!(worker.wait_until_stopped(LONG));
        }
    }

    #[test]
    fn test_restart_after_terminal_failure() {
        let pipeline = Scripted::failing(1);
        let processes = Arc::clone(&pipeline.processes);
        let worker = PipelineWorker::new("restartable", pipeline);

        worker.start().unwrap();
        assert!(worker.wait_until_stopped(LONG));
        assert!(worker.last_error().is_some());

        worker.start().unwrap();
        assert!(worker.last_error().is_none());
        assert!(wait_for(LONG, || processes.load(Ordering::SeqCst) > 5));
        worker.stop();
    }

    #[test]
    fn test_no_cycle_after_stop_and_pipeline_lock() {
        let pipeline = Scripted::new();
        let captures = Arc::clone(&pipeline.captures);
        let worker = PipelineWorker::new("fenced", pipeline);

        worker.start().unwrap();
        assert!(wait_for(LONG, || captures.load(Ordering::SeqCst) > 10));

        worker.stop();
        let seen = worker.with_pipeline(|p| p.captures.load(Ordering::SeqCst));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(captures.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_drop_stops_worker() {
        let (callback, events) = collect_events();
        let worker = PipelineWorker::new("dropped", Scripted::new())
            .with_interval(CycleInterval::Every(Duration::from_secs(60)))
            .with_event_callback(callback);
        worker.start().unwrap();
        assert!(wait_for(LONG, || worker.cycle_count() == 2));
        drop(worker);

        assert!(wait_for(LONG, || {
            events
                .lock()
                .iter()
                .any(|e| matches!(e, StreamEvent::WorkerStopped { .. }))
        }));
    }
}
