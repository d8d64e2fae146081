#![forbid(unsafe_code)]

//! Scheduling capability for deferred passes.
//!
//! A [`Registry`](crate::Registry) never assumes a host event loop. It asks
//! its [`Scheduler`] to run a task "at the next opportunity" and keeps the
//! returned [`TaskHandle`] so it can cancel the request when an immediate pass
//! supersedes it.
//!
//! Two implementations ship with the crate:
//!
//! - [`ManualScheduler`]: a FIFO the host drains explicitly. The default.
//! - [`TimerScheduler`]: tasks become due after a fixed delay, measured with
//!   `web_time::Instant` so the same code runs on native and wasm hosts.
//!
//! # Invariants
//!
//! 1. A cancelled task never runs.
//! 2. Tasks run in scheduling order (for the timer, in due order, ties by
//!    scheduling order).
//! 3. No internal borrow is held while a task runs, so tasks may schedule or
//!    cancel other tasks.
//! 4. A drain only runs tasks that were queued when it began. Tasks queued
//!    by those tasks wait for the next drain, one pass per opportunity.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use web_time::{Duration, Instant};

/// Identifies one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

pub type Task = Box<dyn FnOnce()>;

/// "Schedule once, get a cancellable handle."
pub trait Scheduler {
    fn schedule_once(&self, task: Task) -> TaskHandle;

    /// Cancel a task. Unknown or already-run handles are ignored.
    fn cancel(&self, handle: TaskHandle);

    /// Run whatever is ready now and return how many tasks ran. Schedulers
    /// driven by a host event loop keep the default.
    fn run_ready(&self) -> usize {
        0
    }
}

// ─── ManualScheduler ─────────────────────────────────────────────────────────

#[derive(Default)]
struct ManualState {
    next_id: u64,
    queue: VecDeque<(TaskHandle, Task)>,
}

/// FIFO scheduler drained by [`run_pending`](Self::run_pending).
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the tasks queued before this call. Tasks they queue stay pending
    /// until the next call. Returns the number run.
    pub fn run_pending(&self) -> usize {
        let last = self.state.borrow().next_id;
        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                match state.queue.front() {
                    Some((handle, _)) if handle.0 <= last => state.queue.pop_front(),
                    _ => None,
                }
            };
            let Some((_, task)) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, task: Task) -> TaskHandle {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let handle = TaskHandle(state.next_id);
        state.queue.push_back((handle, task));
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        self.state.borrow_mut().queue.retain(|(h, _)| *h != handle);
    }

    fn run_ready(&self) -> usize {
        self.run_pending()
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

// ─── TimerScheduler ──────────────────────────────────────────────────────────

struct TimedTask {
    handle: TaskHandle,
    due: Instant,
    task: Task,
}

struct TimerState {
    next_id: u64,
    tasks: Vec<TimedTask>,
}

/// Deferred-timer scheduler: each task becomes due `delay` after it was
/// scheduled. The host calls [`poll`](Self::poll) from its loop.
#[derive(Clone)]
pub struct TimerScheduler {
    delay: Duration,
    state: Rc<RefCell<TimerState>>,
}

impl Default for TimerScheduler {
    /// One 60 Hz frame.
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl TimerScheduler {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Rc::new(RefCell::new(TimerState {
                next_id: 0,
                tasks: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn poll(&self) -> usize {
        self.poll_at(Instant::now())
    }

    /// Run every task due at or before `now`, earliest first. Tasks scheduled
    /// while polling wait for the next poll.
    pub fn poll_at(&self, now: Instant) -> usize {
        let last = self.state.borrow().next_id;
        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let earliest = state
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= now && t.handle.0 <= last)
                    .min_by_key(|(_, t)| (t.due, t.handle.0))
                    .map(|(i, _)| i);
                earliest.map(|i| state.tasks.remove(i))
            };
            let Some(timed) = next else {
                return ran;
            };
            (timed.task)();
            ran += 1;
        }
    }

    /// When the earliest pending task becomes due.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.state.borrow().tasks.iter().map(|t| t.due).min()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().tasks.len()
    }
}

impl Scheduler for TimerScheduler {
    fn schedule_once(&self, task: Task) -> TaskHandle {
        let due = Instant::now() + self.delay;
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let handle = TaskHandle(state.next_id);
        state.tasks.push(TimedTask { handle, due, task });
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        self.state.borrow_mut().tasks.retain(|t| t.handle != handle);
    }

    fn run_ready(&self) -> usize {
        self.poll()
    }
}

impl fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("delay", &self.delay)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> Task) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (hits, move || {
            let h = Rc::clone(&h);
            Box::new(move || h.set(h.get() + 1)) as Task
        })
    }

    #[test]
    fn manual_runs_in_order_and_skips_cancelled() {
        let sched = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let log = Rc::clone(&log);
            let handle = sched.schedule_once(Box::new(move || log.borrow_mut().push(n)));
            if n == 1 {
                sched.cancel(handle);
            }
        }
        assert_eq!(sched.pending(), 2);
        assert_eq!(sched.run_pending(), 2);
        assert_eq!(*log.borrow(), vec![0, 2]);
    }

    #[test]
    fn manual_defers_tasks_queued_while_draining() {
        let sched = ManualScheduler::new();
        let (hits, task) = counter();
        let inner = sched.clone();
        let follow_up = task();
        sched.schedule_once(Box::new(move || {
            inner.schedule_once(follow_up);
        }));
        assert_eq!(sched.run_pending(), 1);
        assert_eq!(hits.get(), 0);
        assert_eq!(sched.pending(), 1);

        assert_eq!(sched.run_pending(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn timer_defers_tasks_scheduled_while_polling() {
        let sched = TimerScheduler::new(Duration::ZERO);
        let (hits, task) = counter();
        let inner = sched.clone();
        let follow_up = task();
        sched.schedule_once(Box::new(move || {
            inner.schedule_once(follow_up);
        }));
        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(sched.poll_at(later), 1);
        assert_eq!(hits.get(), 0);
        assert_eq!(sched.pending(), 1);

        assert_eq!(sched.poll_at(later), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn timer_runs_only_due_tasks() {
        let sched = TimerScheduler::new(Duration::from_millis(10));
        let (hits, task) = counter();
        let start = Instant::now();
        sched.schedule_once(task());
        let cancelled = sched.schedule_once(task());
        sched.cancel(cancelled);

        assert_eq!(sched.poll_at(start), 0);
        assert!(sched.next_due().is_some());
        assert_eq!(sched.poll_at(start + Duration::from_secs(1)), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(sched.pending(), 0);
    }
}
