//! # Dedicated-thread cooperative event loop.
//!
//! [`EventLoopScheduler`] owns one worker thread and a min-heap of timer
//! entries ordered by deadline, with a sequence number as tie-break so
//! same-deadline jobs (in particular immediate jobs) keep submission order.
//! The worker sleeps on a condvar until the earliest deadline or a new
//! submission, pops due entries, and runs them on its own thread.
//!
//! ## Rules
//! - All jobs run on the single loop thread: a cooperative, single-threaded
//!   delivery context with no tokio dependency.
//! - Cancelled entries are skipped when they come due (they stay in the heap
//!   until then; memory, not callbacks, is what lingers).
//! - Periodic entries re-arm themselves at `deadline + period`, so drift
//!   does not accumulate from job run time.
//! - Dropping the scheduler shuts the loop down and joins the thread;
//!   entries still pending are discarded.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::{Job, Scheduler, TickJob};

enum EntryKind {
    Once { job: Job },
    Periodic { period: Duration, tick: u64, job: TickJob },
}

struct Entry {
    at: Instant,
    seq: u64,
    cancel: CancellationToken,
    kind: EntryKind,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

// Reversed so BinaryHeap pops the earliest (deadline, seq) first.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct LoopState {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<LoopState>,
    wake: Condvar,
}

/// Single-threaded timer loop on a dedicated worker thread.
pub struct EventLoopScheduler {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Default for EventLoopScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoopScheduler {
    /// Spawns the loop thread and returns the scheduler handle.
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(LoopState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("flowcast-event-loop".into())
            .spawn(move || run_loop(&worker_shared))
            .expect("failed to spawn event loop thread");
        Self {
            shared,
            worker: Some(worker),
        }
    }

    fn push(&self, at: Instant, cancel: CancellationToken, kind: EntryKind) {
        let mut st = self.shared.state.lock().expect("event loop lock");
        if st.shutdown {
            tracing::debug!("timer entry dropped: event loop shut down");
            return;
        }
        let seq = st.next_seq;
        st.next_seq += 1;
        st.heap.push(Entry {
            at,
            seq,
            cancel,
            kind,
        });
        drop(st);
        self.shared.wake.notify_one();
    }
}

impl Scheduler for EventLoopScheduler {
    fn schedule(&self, job: Job) {
        self.push(
            Instant::now(),
            CancellationToken::new(),
            EntryKind::Once { job },
        );
    }

    fn schedule_after(&self, delay: Duration, cancel: &CancellationToken, job: Job) {
        self.push(
            Instant::now() + delay,
            cancel.clone(),
            EntryKind::Once { job },
        );
    }

    fn schedule_periodic(&self, period: Duration, cancel: &CancellationToken, job: TickJob) {
        self.push(
            Instant::now() + period,
            cancel.clone(),
            EntryKind::Periodic {
                period,
                tick: 0,
                job,
            },
        );
    }
}

impl Drop for EventLoopScheduler {
    fn drop(&mut self) {
        {
            let mut st = self.shared.state.lock().expect("event loop lock");
            st.shutdown = true;
            st.heap.clear();
        }
        self.wake_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl EventLoopScheduler {
    fn wake_all(&self) {
        self.shared.wake.notify_all();
    }
}

fn run_loop(shared: &Shared) {
    let mut st = shared.state.lock().expect("event loop lock");
    loop {
        if st.shutdown {
            return;
        }
        let now = Instant::now();
        let next_deadline = st.heap.peek().map(|head| head.at);
        let due = match next_deadline {
            None => {
                st = shared.wake.wait(st).expect("event loop lock");
                continue;
            }
            Some(at) if at > now => {
                let (guard, _) = shared
                    .wake
                    .wait_timeout(st, at - now)
                    .expect("event loop lock");
                st = guard;
                continue;
            }
            Some(_) => st.heap.pop().expect("peeked entry"),
        };

        // Run outside the lock so jobs may schedule more work.
        drop(st);
        if !due.cancel.is_cancelled() {
            match due.kind {
                EntryKind::Once { job } => job(),
                EntryKind::Periodic {
                    period,
                    tick,
                    mut job,
                } => {
                    job(tick);
                    let mut guard = shared.state.lock().expect("event loop lock");
                    if !guard.shutdown {
                        let seq = guard.next_seq;
                        guard.next_seq += 1;
                        guard.heap.push(Entry {
                            at: due.at + period,
                            seq,
                            cancel: due.cancel,
                            kind: EntryKind::Periodic {
                                period,
                                tick: tick + 1,
                                job,
                            },
                        });
                    }
                    st = guard;
                    continue;
                }
            }
        }
        st = shared.state.lock().expect("event loop lock");
    }
}
