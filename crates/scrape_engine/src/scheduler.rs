//! Timer abstraction shared by the job store and the polling client.
//!
//! [`TokioScheduler`] runs tasks on the tokio timer wheel. [`ManualScheduler`]
//! keeps a virtual clock that only moves when [`ManualScheduler::advance`] is
//! called, so lifecycles spanning seconds run instantly in tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Cancels the timer it was returned for. Clones share the same timer.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub trait Scheduler: Send + Sync {
    /// Runs `task` once after `delay`, unless cancelled first. The task may
    /// block.
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Runs `task` every `interval`, first after one full interval.
    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TimerHandle;
}

#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Binds to the runtime of the calling task.
    ///
    /// # Panics
    /// When called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle {
        let handle = TimerHandle::default();
        let timer = handle.clone();
        self.runtime.spawn(async move {
            sleep(delay).await;
            if !timer.is_cancelled() {
                // One-shot tasks may touch the filesystem.
                let _ = tokio::task::spawn_blocking(task).await;
            }
        });
        handle
    }

    fn schedule_repeating(&self, interval: Duration, mut task: RepeatingTask) -> TimerHandle {
        let interval = interval.max(Duration::from_millis(1));
        let handle = TimerHandle::default();
        let timer = handle.clone();
        self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if timer.is_cancelled() {
                    break;
                }
                task();
            }
        });
        handle
    }
}

enum Scheduled {
    Once(Task),
    Repeating {
        interval: Duration,
        task: RepeatingTask,
    },
}

struct Entry {
    scheduled: Scheduled,
    handle: TimerHandle,
}

#[derive(Default)]
struct VirtualClock {
    now: Duration,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), Entry>,
}

impl VirtualClock {
    fn push(&mut self, due: Duration, entry: Entry) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((due, seq), entry);
    }

    fn pop_due(&mut self, target: Duration) -> Option<(Duration, Entry)> {
        let key = *self.queue.keys().next()?;
        if key.0 > target {
            return None;
        }
        let entry = self.queue.remove(&key)?;
        self.now = key.0;
        Some((key.0, entry))
    }
}

/// Deterministic scheduler driven by an explicit virtual clock.
///
/// Tasks run on the thread calling [`advance`](Self::advance), outside the
/// internal lock, so a task may schedule further timers.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<VirtualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since construction.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of armed timers that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .queue
            .values()
            .filter(|entry| !entry.handle.is_cancelled())
            .count()
    }

    /// Moves the clock forward by `by`, firing every timer that falls due, in
    /// due order. Returns the number of task invocations.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut fired = 0;

        loop {
            let next = self.lock().pop_due(target);
            let Some((due, entry)) = next else {
                break;
            };
            if entry.handle.is_cancelled() {
                continue;
            }
            match entry.scheduled {
                Scheduled::Once(task) => {
                    task();
                    fired += 1;
                }
                Scheduled::Repeating { interval, mut task } => {
                    task();
                    fired += 1;
                    if !entry.handle.is_cancelled() {
                        self.lock().push(
                            due + interval,
                            Entry {
                                scheduled: Scheduled::Repeating { interval, task },
                                handle: entry.handle,
                            },
                        );
                    }
                }
            }
        }

        self.lock().now = target;
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VirtualClock> {
        // Tasks run outside the lock; a poisoned clock is still consistent.
        self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn schedule(&self, delay: Duration, scheduled: Scheduled) -> TimerHandle {
        let handle = TimerHandle::default();
        let mut clock = self.lock();
        let due = clock.now + delay;
        clock.push(
            due,
            Entry {
                scheduled,
                handle: handle.clone(),
            },
        );
        handle
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> TimerHandle {
        self.schedule(delay, Scheduled::Once(task))
    }

    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TimerHandle {
        // A zero interval would spin `advance` forever.
        let interval = interval.max(Duration::from_millis(1));
        self.schedule(interval, Scheduled::Repeating { interval, task })
    }
}
