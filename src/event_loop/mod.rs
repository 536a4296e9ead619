//! Event Loop Implementation
//!
//! Promises never run handlers themselves: every reaction is handed to a
//! [`TaskQueue`] as a zero-argument [`Task`]. This module defines that
//! capability and provides [`EventLoop`], a deterministic implementation
//! with a FIFO microtask queue and virtual-time timers.
//!
//! Nothing runs until the owner drives the loop (`run_microtasks` or
//! `run_until_idle`), so tests observe exactly what was scheduled when.

use crate::config::RuntimeConfig;
use crate::runtime::{Promise, Runtime, SettledOutcome};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;
use tracing::trace;

/// A unit of deferred work
pub struct Task {
    callback: Box<dyn FnOnce()>,
}

impl Task {
    /// Creates a new Task from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the task.
    pub fn run(self) {
        (self.callback)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

/// The scheduling capability promises are built on.
///
/// Implementations must run a submitted task strictly after the current
/// synchronous call stack unwinds, and must run tasks from one submitter in
/// submission order.
pub trait TaskQueue {
    /// Submit a task to run later
    fn submit(&self, task: Task);
}

/// A task scheduled on the virtual clock (timers)
struct Macrotask {
    id: u64,
    task: Task,
    fire_at: u64,
}

/// Result of running the event loop to completion via `run_until_idle()`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Total number of microtasks that were dequeued and processed
    pub microtasks_processed: usize,
    /// Total number of macrotasks that were dequeued and processed
    pub macrotasks_processed: usize,
    /// Number of full event loop iterations (each iteration = drain microtasks + one macrotask)
    pub iterations: usize,
    /// The virtual time when the event loop finished
    pub final_time: u64,
}

/// Runtime statistics for the event loop
#[derive(Clone, Debug, Default)]
pub struct EventLoopStats {
    /// Total microtasks processed across all ticks
    pub total_microtasks: u64,
    /// Total macrotasks processed across all ticks
    pub total_macrotasks: u64,
    /// Total number of event loop ticks
    pub total_ticks: u64,
    /// Maximum microtasks drained in a single tick
    pub max_microtasks_per_tick: u64,
    /// Longest tick duration in milliseconds (wall-clock)
    pub longest_tick_ms: u64,
    /// Total timers scheduled
    pub total_timers_scheduled: u64,
}

struct LoopState {
    /// Microtask queue (high priority - runs between macrotasks)
    microtask_queue: VecDeque<Task>,
    /// Macrotask queue (timers)
    macrotask_queue: Vec<Macrotask>,
    /// Current virtual time in milliseconds
    virtual_time: u64,
    /// Next timer ID
    next_timer_id: u64,
    /// Maximum microtasks to drain per tick (starvation protection)
    max_microtasks_per_tick: usize,
    /// Runtime statistics
    stats: EventLoopStats,
}

/// The event loop manages task queues and execution order.
///
/// All methods take `&self`: tasks submit further tasks while the loop is
/// running them, so the queues live behind a `RefCell` whose borrow is
/// released before any task body executes.
pub struct EventLoop {
    state: RefCell<LoopState>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue for EventLoop {
    fn submit(&self, task: Task) {
        self.state.borrow_mut().microtask_queue.push_back(task);
    }
}

impl EventLoop {
    /// Create a new event loop
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    /// Create an event loop using the microtask budget from `config`
    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            state: RefCell::new(LoopState {
                microtask_queue: VecDeque::new(),
                macrotask_queue: Vec::new(),
                virtual_time: 0,
                next_timer_id: 1,
                max_microtasks_per_tick: config.max_microtasks_per_tick,
                stats: EventLoopStats::default(),
            }),
        }
    }

    /// Get current virtual time
    pub fn current_time(&self) -> u64 {
        self.state.borrow().virtual_time
    }

    /// Advance virtual time
    pub fn advance_time(&self, ms: u64) {
        self.state.borrow_mut().virtual_time += ms;
    }

    /// Schedule a task `delay` virtual milliseconds from now
    pub fn set_timeout(&self, delay: u64, task: Task) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_timer_id;
        state.next_timer_id += 1;
        let fire_at = state.virtual_time + delay;
        state.macrotask_queue.push(Macrotask { id, task, fire_at });
        state.stats.total_timers_scheduled += 1;
        trace!(timer = id, fire_at, "timer scheduled");
        id
    }

    /// Cancel a timer by ID. Returns whether the timer was still pending.
    pub fn clear_timeout(&self, id: u64) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.macrotask_queue.len();
        state.macrotask_queue.retain(|t| t.id != id);
        state.macrotask_queue.len() != before
    }

    /// Check if there are pending microtasks
    pub fn has_pending_microtasks(&self) -> bool {
        !self.state.borrow().microtask_queue.is_empty()
    }

    /// Check if there are pending macrotasks
    pub fn has_pending_macrotasks(&self) -> bool {
        !self.state.borrow().macrotask_queue.is_empty()
    }

    /// Check if the event loop has any pending work
    pub fn has_pending_work(&self) -> bool {
        self.has_pending_microtasks() || self.has_pending_macrotasks()
    }

    /// Number of queued microtasks
    pub fn pending_microtasks(&self) -> usize {
        self.state.borrow().microtask_queue.len()
    }

    /// Settle a fresh promise with `outcome` after `delay` virtual milliseconds
    pub fn delayed(&self, runtime: &Runtime, delay: u64, outcome: SettledOutcome) -> Promise {
        Promise::new(runtime, |resolvers| {
            let resolvers = resolvers.clone();
            self.set_timeout(delay, Task::new(move || resolvers.settle(outcome)));
            Ok(())
        })
    }

    /// Run queued microtasks, including ones queued while draining, up to
    /// the per-tick budget. Returns how many ran.
    pub fn run_microtasks(&self) -> usize {
        let budget = self.state.borrow().max_microtasks_per_tick;
        let mut count: usize = 0;

        while count < budget {
            let next = self.state.borrow_mut().microtask_queue.pop_front();
            let Some(task) = next else { break };
            task.run();
            count += 1;
        }

        let mut state = self.state.borrow_mut();
        state.stats.total_microtasks += count as u64;
        if (count as u64) > state.stats.max_microtasks_per_tick {
            state.stats.max_microtasks_per_tick = count as u64;
        }
        count
    }

    /// Remove the earliest timer due at the current virtual time, or, when
    /// none is due, advance the clock to the next timer and take that one.
    fn next_macrotask(&self) -> Option<Macrotask> {
        let mut state = self.state.borrow_mut();
        // min_by_key keeps the first of equal deadlines, so timers with the
        // same deadline fire in scheduling order
        let (index, fire_at) = state
            .macrotask_queue
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| t.fire_at)
            .map(|(i, t)| (i, t.fire_at))?;

        if fire_at > state.virtual_time {
            state.virtual_time = fire_at;
        }
        Some(state.macrotask_queue.remove(index))
    }

    /// Run the event loop to completion following the standard algorithm:
    ///   1. Drain microtasks
    ///   2. Execute the next timer, advancing virtual time if needed
    ///   3. Repeat from step 1
    ///   4. Stop when no microtasks and no macrotasks remain
    ///
    /// Returns a `RunResult` with statistics about what was processed.
    pub fn run_until_idle(&self) -> RunResult {
        let mut result = RunResult::default();

        loop {
            let tick_start = Instant::now();

            result.microtasks_processed += self.run_microtasks();

            let macrotask = self.next_macrotask();
            let ran_macrotask = macrotask.is_some();
            if let Some(macrotask) = macrotask {
                trace!(timer = macrotask.id, "timer fired");
                macrotask.task.run();
                result.macrotasks_processed += 1;
            }

            {
                let mut state = self.state.borrow_mut();
                let tick_elapsed = tick_start.elapsed().as_millis() as u64;
                if tick_elapsed > state.stats.longest_tick_ms {
                    state.stats.longest_tick_ms = tick_elapsed;
                }
                state.stats.total_ticks += 1;
                if ran_macrotask {
                    state.stats.total_macrotasks += 1;
                }
            }

            if !ran_macrotask && !self.has_pending_microtasks() {
                break;
            }
            result.iterations += 1;
        }

        result.final_time = self.current_time();
        result
    }

    /// Set the maximum number of microtasks to drain per tick (starvation protection).
    pub fn set_microtask_budget(&self, limit: usize) {
        self.state.borrow_mut().max_microtasks_per_tick = limit;
    }

    /// Get the current microtask budget limit.
    pub fn microtask_budget(&self) -> usize {
        self.state.borrow().max_microtasks_per_tick
    }

    /// Get a snapshot of the current event loop statistics.
    pub fn stats(&self) -> EventLoopStats {
        self.state.borrow().stats.clone()
    }

    /// Reset all event loop statistics to zero.
    pub fn reset_stats(&self) {
        self.state.borrow_mut().stats = EventLoopStats::default();
    }

    /// Drop all pending work
    pub fn clear(&self) {
        // Take the queues first so task destructors run without the borrow held
        let (microtasks, macrotasks) = {
            let mut state = self.state.borrow_mut();
            (
                std::mem::take(&mut state.microtask_queue),
                std::mem::take(&mut state.macrotask_queue),
            )
        };
        drop(microtasks);
        drop(macrotasks);
    }
}
