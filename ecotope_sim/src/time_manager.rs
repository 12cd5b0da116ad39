// Periodic callback scheduler on a dedicated thread.
//
// `TimeManager` runs its registered callbacks once per "unit time" on a
// background thread until it is stopped or a callback returns
// `ControlFlow::Break`. The thread sleeps on a condition variable, so
// `stop()` and `set_unit_time()` wake it immediately instead of waiting out
// the period. A cycle in progress always runs to completion: `stop()` sets
// the flag, notifies, and joins.
//
// Refusals (no unit time configured, already running) are logged and
// returned as `SchedulerError`; no thread is spawned in either case.
//
// Callbacks must not call `stop()` on the manager that runs them (the join
// would wait on its own thread). Returning `ControlFlow::Break` is the way
// for a callback to end the loop.

use crate::error::SchedulerError;
use std::ops::ControlFlow;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A callback run once per cycle.
pub type TickCallback = Box<dyn FnMut() -> ControlFlow<()> + Send>;

#[derive(Debug, Default)]
struct State {
    unit_time: Option<Duration>,
    stop_requested: bool,
    running: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    wake: Condvar,
    callbacks: Mutex<Vec<TickCallback>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct TimeManager {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl TimeManager {
    pub fn new(unit_time: Option<Duration>) -> Self {
        let shared = Arc::new(Shared::default());
        shared.state().unit_time = unit_time;
        Self {
            shared,
            thread: None,
        }
    }

    /// Change the period. Takes effect for the cycle currently being waited
    /// on if the thread is running.
    pub fn set_unit_time(&self, unit_time: Duration) {
        self.shared.state().unit_time = Some(unit_time);
        self.shared.wake.notify_all();
    }

    pub fn unit_time(&self) -> Option<Duration> {
        self.shared.state().unit_time
    }

    /// Add a callback. Callbacks run in registration order.
    pub fn register(&self, callback: TickCallback) {
        self.shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().running
    }

    /// Spawn the scheduler thread.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        {
            let mut state = self.shared.state();
            if state.running {
                tracing::warn!("scheduler start refused: already running");
                return Err(SchedulerError::AlreadyRunning);
            }
            if state.unit_time.is_none() {
                tracing::warn!("scheduler start refused: no unit time set");
                return Err(SchedulerError::UnitTimeNotSet);
            }
            state.stop_requested = false;
            state.running = true;
        }
        // A previous loop that ended on its own still needs joining.
        self.join_thread();

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("ecotope-scheduler".into())
            .spawn(move || run_loop(&shared));
        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.state().running = false;
                Err(SchedulerError::Spawn(e))
            }
        }
    }

    /// Signal the thread and wait for it. No-op if not running.
    pub fn stop(&mut self) {
        self.shared.state().stop_requested = true;
        self.shared.wake.notify_all();
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("scheduler thread panicked");
            }
        }
    }
}

impl Drop for TimeManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clears the running flag when the loop exits, including by panic.
struct RunningGuard<'a>(&'a Shared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.state().running = false;
    }
}

fn run_loop(shared: &Shared) {
    let _running = RunningGuard(shared);
    loop {
        if !wait_for_next_cycle(shared) {
            break;
        }
        let mut flow = ControlFlow::Continue(());
        {
            let mut callbacks = shared
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for callback in callbacks.iter_mut() {
                if callback().is_break() {
                    flow = ControlFlow::Break(());
                }
            }
        }
        if flow.is_break() {
            tracing::debug!("scheduler loop ended by callback");
            break;
        }
    }
}

/// Sleep one unit time. Returns false if a stop was requested meanwhile.
fn wait_for_next_cycle(shared: &Shared) -> bool {
    let cycle_start = Instant::now();
    let mut state = shared.state();
    loop {
        if state.stop_requested {
            return false;
        }
        let Some(unit) = state.unit_time else {
            return false;
        };
        let elapsed = cycle_start.elapsed();
        if elapsed >= unit {
            return true;
        }
        state = shared
            .wake
            .wait_timeout(state, unit - elapsed)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}
