//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! Handle-returning wrappers around `std::thread`, backed by blocking
//! threads instead of an async runtime: one event-loop thread plus
//! short-lived worker threads synchronized through a `Mutex`/`Condvar`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A handle to a thread spawned by [`Task::spawn`]. Dropping the handle
/// requests cancellation unless [`Task::detach`] was called; the caller must
/// still check its own cancellation flag to actually stop, since
/// `std::thread` has no preemption point of its own.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: Option<JoinHandle<T>>,
    cancel: Arc<AtomicBool>,
    detached: bool,
}

impl<T: Send + 'static> Task<T> {
    /// Spawns `f` on a new thread. `f` is handed a [`CancelToken`] it should
    /// poll to know when to stop.
    pub fn spawn<F>(f: F) -> Task<T>
    where
        F: FnOnce(CancelToken) -> T + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let token = CancelToken(Arc::clone(&cancel));
        let join_handle = thread::spawn(move || f(token));
        Task {
            join_handle: Some(join_handle),
            cancel,
            detached: false,
        }
    }

    /// Detaches the task: dropping the handle no longer requests
    /// cancellation.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    /// Blocks until the thread finishes and returns its result.
    pub fn join(mut self) -> thread::Result<T> {
        self.join_handle.take().unwrap().join()
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if !self.detached {
            self.cancel.store(true, Ordering::Release);
        }
    }
}

/// Polled by a [`Task`]'s body to learn that cancellation was requested.
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A handle for a single-shot timer created by [`TimeoutTask::new`].
/// Dropping the handle cancels the timer. [`TimeoutTask::reset`] rearms it
/// with a new duration without recreating the underlying thread.
#[derive(Debug)]
pub struct TimeoutTask {
    control: mpsc::Sender<TimerMsg>,
    _task: Task<()>,
}

/// A handle for a periodic timer created by [`IntervalTask::new`].
#[derive(Debug)]
pub struct IntervalTask {
    control: mpsc::Sender<TimerMsg>,
    _task: Task<()>,
}

#[derive(Debug)]
enum TimerMsg {
    Reset(Duration),
    Stop,
}

impl TimeoutTask {
    /// Spawns a single-shot timer that calls `callback` after `duration`
    /// unless reset or dropped first.
    pub fn new<F>(duration: Duration, callback: F) -> TimeoutTask
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let task = Task::spawn(move |cancel| {
            let mut duration = duration;
            loop {
                match rx.recv_timeout(duration) {
                    Ok(TimerMsg::Reset(new_duration)) => {
                        duration = new_duration;
                        continue;
                    }
                    Ok(TimerMsg::Stop) => return,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if !cancel.is_cancelled() {
                            callback();
                        }
                        return;
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => return,
                }
            }
        });
        TimeoutTask {
            control: tx,
            _task: task,
        }
    }

    /// Rearms the timer with a new duration, restarting the countdown.
    pub fn reset(&self, duration: Duration) {
        let _ = self.control.send(TimerMsg::Reset(duration));
    }
}

impl Drop for TimeoutTask {
    fn drop(&mut self) {
        let _ = self.control.send(TimerMsg::Stop);
    }
}

impl IntervalTask {
    /// Spawns a timer that calls `callback` every `period` until dropped.
    pub fn new<F>(period: Duration, callback: F) -> IntervalTask
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let task = Task::spawn(move |cancel| {
            let mut period = period;
            loop {
                match rx.recv_timeout(period) {
                    Ok(TimerMsg::Reset(new_period)) => {
                        period = new_period;
                        continue;
                    }
                    Ok(TimerMsg::Stop) => return,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if cancel.is_cancelled() {
                            return;
                        }
                        callback();
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => return,
                }
            }
        });
        IntervalTask {
            control: tx,
            _task: task,
        }
    }

    pub fn reset(&self, period: Duration) {
        let _ = self.control.send(TimerMsg::Reset(period));
    }
}

impl Drop for IntervalTask {
    fn drop(&mut self) {
        let _ = self.control.send(TimerMsg::Stop);
    }
}

/// A condition variable paired with the boolean it guards, used by
/// `enroll(.., wait_for_completion)` callers to block until an enrollment
/// worker signals a terminal state.
#[derive(Debug, Default)]
pub struct Latch {
    inner: Mutex<bool>,
    condvar: std::sync::Condvar,
}

impl Latch {
    pub fn new() -> Latch {
        Latch {
            inner: Mutex::new(false),
            condvar: std::sync::Condvar::new(),
        }
    }

    /// Blocks the caller until [`Latch::signal`] is called, or `timeout`
    /// elapses. Returns whether the latch was signalled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.inner.lock().unwrap();
        let (guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |signalled| !*signalled)
            .unwrap();
        *guard
    }

    pub fn signal(&self) {
        let mut guard = self.inner.lock().unwrap();
        *guard = true;
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[test]
    fn timeout_fires_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter2 = Arc::clone(&counter);
        let timer = TimeoutTask::new(Duration::from_millis(20), move || {
            counter2.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(80));
        drop(timer);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timeout_cancelled_by_drop_does_not_fire() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter2 = Arc::clone(&counter);
        let timer = TimeoutTask::new(Duration::from_millis(100), move || {
            counter2.fetch_add(1, Ordering::SeqCst);
        });
        drop(timer);
        thread::sleep(Duration::from_millis(150));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn latch_wakes_waiter() {
        let latch = Arc::new(Latch::new());
        let latch2 = Arc::clone(&latch);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            latch2.signal();
        });
        assert!(latch.wait(Duration::from_secs(1)));
    }

    #[test]
    fn latch_times_out() {
        let latch = Latch::new();
        assert!(!latch.wait(Duration::from_millis(20)));
    }
}
