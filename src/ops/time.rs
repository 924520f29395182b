//! # Time-aware stages.
//!
//! Everything here is wired through the [`Scheduler`](crate::Scheduler)
//! abstraction and is agnostic to which implementation drives it. Pending
//! timers are armed on child tokens of the subscription, so cancelling the
//! subscription releases them transitively.
//!
//! ## Rules
//! - `debounce`: only the latest value of a quiet window is emitted, one
//!   window after the last arrival; a terminal signal beats any pending
//!   timer and drops the pending value.
//! - `throttle`: the first value of an idle stretch is emitted immediately
//!   and opens a window; per window at most one more emission happens, at
//!   the window's close.
//! - `delay`: values and the terminal signal are shifted by a fixed
//!   duration, order preserved.
//! - `timeout`: the quiet-window clock restarts on every value; expiry
//!   fails the flow and cancels the upstream.
//! - `measure_interval`: replaces each value with the `Duration` since the
//!   previous one (or since subscribe for the first).

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::core::{Flow, Sink};
use crate::error::FlowError;
use crate::scheduler::SchedulerRef;

struct DebounceState<T> {
    pending: Option<T>,
    timer: Option<CancellationToken>,
    epoch: u64,
}

struct ThrottleState<T> {
    window_open: bool,
    first: Option<T>,
    latest: Option<T>,
    epoch: u64,
}

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Suppresses a value until no further value arrives within `quiet`;
    /// only the latest pending value of a burst is emitted.
    pub fn debounce(&self, quiet: Duration, scheduler: &SchedulerRef) -> Flow<T, E> {
        let upstream = self.clone();
        let scheduler = SchedulerRef::clone(scheduler);
        Flow::from_attach(move |down: Sink<T, E>| {
            let state = Arc::new(Mutex::new(DebounceState::<T> {
                pending: None,
                timer: None,
                epoch: 0,
            }));

            let on_value = {
                let state = Arc::clone(&state);
                let scheduler = SchedulerRef::clone(&scheduler);
                let down = down.clone();
                move |v| {
                    let (epoch, timer) = {
                        let mut st = state.lock().expect("debounce state");
                        st.pending = Some(v);
                        st.epoch += 1;
                        if let Some(old) = st.timer.take() {
                            old.cancel();
                        }
                        let timer = down.token().child_token();
                        st.timer = Some(timer.clone());
                        (st.epoch, timer)
                    };
                    let job_state = Arc::clone(&state);
                    let job_down = down.clone();
                    scheduler.schedule_after(
                        quiet,
                        &timer,
                        Box::new(move || {
                            let settled = {
                                let mut st = job_state.lock().expect("debounce state");
                                if st.epoch != epoch {
                                    return;
                                }
                                st.timer = None;
                                st.pending.take()
                            };
                            if let Some(v) = settled {
                                job_down.value(v);
                            }
                        }),
                    );
                }
            };

            let terminal_state = Arc::clone(&state);
            upstream.attach(Sink::new(
                down.token().clone(),
                on_value,
                move |c| {
                    // Terminal beats the pending timer: the held value is
                    // dropped, never delivered post-completion.
                    let timer = {
                        let mut st = terminal_state.lock().expect("debounce state");
                        st.epoch += 1;
                        st.pending = None;
                        st.timer.take()
                    };
                    if let Some(timer) = timer {
                        timer.cancel();
                    }
                    down.terminate(c);
                },
            ));
        })
    }

    /// At most one emission per `interval`.
    ///
    /// The first value after an idle stretch is emitted immediately and
    /// opens a window. With `use_latest` the window's close emits the most
    /// recent value observed during it; otherwise the first one.
    pub fn throttle(
        &self,
        interval: Duration,
        use_latest: bool,
        scheduler: &SchedulerRef,
    ) -> Flow<T, E> {
        let upstream = self.clone();
        let scheduler = SchedulerRef::clone(scheduler);
        Flow::from_attach(move |down: Sink<T, E>| {
            let state = Arc::new(Mutex::new(ThrottleState::<T> {
                window_open: false,
                first: None,
                latest: None,
                epoch: 0,
            }));

            let on_value = {
                let state = Arc::clone(&state);
                let scheduler = SchedulerRef::clone(&scheduler);
                let down = down.clone();
                move |v| {
                    let lead = {
                        let mut st = state.lock().expect("throttle state");
                        if st.window_open {
                            if st.first.is_none() {
                                st.first = Some(v);
                                st.latest = None;
                            } else {
                                st.latest = Some(v);
                            }
                            None
                        } else {
                            st.window_open = true;
                            Some(v)
                        }
                    };
                    if let Some(v) = lead {
                        down.value(v);
                        close_window_later(&state, &scheduler, interval, use_latest, &down);
                    }
                }
            };

            let terminal_state = Arc::clone(&state);
            upstream.attach(Sink::new(
                down.token().clone(),
                on_value,
                move |c| {
                    let mut st = terminal_state.lock().expect("throttle state");
                    st.epoch += 1;
                    st.first = None;
                    st.latest = None;
                    drop(st);
                    down.terminate(c);
                },
            ));
        })
    }

    /// Shifts every value (and the terminal signal) by `delay`.
    pub fn delay(&self, delay: Duration, scheduler: &SchedulerRef) -> Flow<T, E> {
        let upstream = self.clone();
        let scheduler = SchedulerRef::clone(scheduler);
        Flow::from_attach(move |down: Sink<T, E>| {
            // All pending deliveries share one queue; jobs pop the front, so
            // equal delays cannot reorder values.
            let queue: Arc<Mutex<VecDeque<T>>> = Arc::new(Mutex::new(VecDeque::new()));

            let on_value = {
                let queue = Arc::clone(&queue);
                let scheduler = SchedulerRef::clone(&scheduler);
                let down = down.clone();
                move |v| {
                    queue.lock().expect("delay queue").push_back(v);
                    let job_queue = Arc::clone(&queue);
                    let job_down = down.clone();
                    let token = job_down.token().clone();
                    scheduler.schedule_after(
                        delay,
                        &token,
                        Box::new(move || {
                            let v = job_queue.lock().expect("delay queue").pop_front();
                            if let Some(v) = v {
                                job_down.value(v);
                            }
                        }),
                    );
                }
            };

            let term_sched = SchedulerRef::clone(&scheduler);
            upstream.attach(Sink::new(
                down.token().clone(),
                on_value,
                move |c| {
                    let token = down.token().clone();
                    term_sched.schedule_after(
                        delay,
                        &token,
                        Box::new(move || down.terminate(c)),
                    );
                },
            ));
        })
    }

    /// Fails with an error from `make_err` when no signal arrives within
    /// `window` of the previous one (or of subscribe), cancelling the
    /// upstream.
    pub fn timeout_or<F>(
        &self,
        window: Duration,
        scheduler: &SchedulerRef,
        make_err: F,
    ) -> Flow<T, E>
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let scheduler = SchedulerRef::clone(scheduler);
        let make_err = Arc::new(make_err);
        Flow::from_attach(move |down: Sink<T, E>| {
            let up_guard = down.token().child_token();
            let clock: Arc<Mutex<(u64, Option<CancellationToken>)>> =
                Arc::new(Mutex::new((0, None)));

            let arm = {
                let clock = Arc::clone(&clock);
                let scheduler = SchedulerRef::clone(&scheduler);
                let down = down.clone();
                let make_err = Arc::clone(&make_err);
                let up_guard = up_guard.clone();
                Arc::new(move || {
                    let (epoch, timer) = {
                        let mut clock = clock.lock().expect("timeout clock");
                        clock.0 += 1;
                        if let Some(old) = clock.1.take() {
                            old.cancel();
                        }
                        let timer = down.token().child_token();
                        clock.1 = Some(timer.clone());
                        (clock.0, timer)
                    };
                    let job_clock = Arc::clone(&clock);
                    let job_down = down.clone();
                    let job_err = Arc::clone(&make_err);
                    let job_guard = up_guard.clone();
                    scheduler.schedule_after(
                        window,
                        &timer,
                        Box::new(move || {
                            {
                                let mut clock = job_clock.lock().expect("timeout clock");
                                if clock.0 != epoch {
                                    return;
                                }
                                clock.1 = None;
                            }
                            job_down.fail(job_err());
                            job_guard.cancel();
                        }),
                    );
                })
            };
            arm();

            let on_value = {
                let arm = Arc::clone(&arm);
                let down = down.clone();
                move |v| {
                    down.value(v);
                    arm();
                }
            };

            let terminal_clock = Arc::clone(&clock);
            upstream.attach(Sink::new(
                up_guard,
                on_value,
                move |c| {
                    let timer = {
                        let mut clock = terminal_clock.lock().expect("timeout clock");
                        clock.0 += 1;
                        clock.1.take()
                    };
                    if let Some(timer) = timer {
                        timer.cancel();
                    }
                    down.terminate(c);
                },
            ));
        })
    }

    /// [`timeout_or`](Flow::timeout_or) with the crate's own
    /// [`FlowError::Timeout`].
    pub fn timeout(&self, window: Duration, scheduler: &SchedulerRef) -> Flow<T, E>
    where
        E: From<FlowError>,
    {
        self.timeout_or(window, scheduler, move || {
            E::from(FlowError::Timeout { elapsed: window })
        })
    }

    /// Replaces each value with the time elapsed since the previous one
    /// (since subscribe for the first).
    pub fn measure_interval(&self) -> Flow<Duration, E> {
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<Duration, E>| {
            let mark = Arc::new(Mutex::new(Instant::now()));
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |_v| {
                    let stride = {
                        let mut mark = mark.lock().expect("interval mark");
                        let now = Instant::now();
                        let prev = mem::replace(&mut *mark, now);
                        now.duration_since(prev)
                    };
                    fwd.value(stride);
                },
                move |c| down.terminate(c),
            ));
        })
    }
}

/// Schedules the close of a throttle window; emits the recorded value (if
/// any) and immediately opens the next window when one was recorded.
fn close_window_later<T, E>(
    state: &Arc<Mutex<ThrottleState<T>>>,
    scheduler: &SchedulerRef,
    interval: Duration,
    use_latest: bool,
    down: &Sink<T, E>,
) where
    T: Send + 'static,
    E: Send + 'static,
{
    let epoch = {
        let mut st = state.lock().expect("throttle state");
        st.epoch += 1;
        st.epoch
    };
    let job_state = Arc::clone(state);
    let job_sched = SchedulerRef::clone(scheduler);
    let job_down = down.clone();
    scheduler.schedule_after(
        interval,
        down.token(),
        Box::new(move || {
            let emit = {
                let mut st = job_state.lock().expect("throttle state");
                if st.epoch != epoch {
                    return;
                }
                let recorded = if use_latest {
                    st.latest.take().or_else(|| st.first.take())
                } else {
                    st.first.take()
                };
                st.latest = None;
                st.first = None;
                match recorded {
                    Some(v) => {
                        // Something queued: emit and keep the cadence going.
                        st.window_open = true;
                        Some(v)
                    }
                    None => {
                        st.window_open = false;
                        None
                    }
                }
            };
            if let Some(v) = emit {
                job_down.value(v);
                close_window_later(&job_state, &job_sched, interval, use_latest, &job_down);
            }
        }),
    );
}
