//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! Worker hand-off: the event loop passes incoming CDAP messages to the
//! worker via a bounded queue with a condition variable rather than
//! calling the worker inline. A small transient pool of enrollment
//! workers, one per in-progress enrollment, drains its own bounded queue
//! while the event-loop thread holds the RIB mutex only for the instant it
//! takes to enqueue.
//!
//! The handle owns a join handle and drop cancels, the same shape as the
//! task handles elsewhere in this workspace, but the payload channel is a
//! bounded `std::sync::mpsc` rather than an async channel, since the
//! scheduling model here is one OS thread per worker instead of an async
//! runtime.

use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::thread::JoinHandle;
use std::time::Duration;

use rina_cdap::CdapMessage;

use crate::collections::NeighborId;

/// Depth of a worker's inbound queue before the event-loop thread starts
/// blocking on enqueue.
pub const WORKER_QUEUE_DEPTH: usize = 16;

pub enum WorkerMsg {
    Cdap(CdapMessage),
    /// The enrollment worker's per-neighbor timer fired.
    Timeout,
    Shutdown,
}

/// Handle held by the event-loop thread for a running enrollment worker.
pub struct WorkerHandle {
    pub neighbor_id: NeighborId,
    tx: SyncSender<WorkerMsg>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns a worker thread running `body`, which receives messages off
    /// its own bounded queue until it sees [`WorkerMsg::Shutdown`] or its
    /// peer hangs up.
    pub fn spawn<F>(neighbor_id: NeighborId, body: F) -> WorkerHandle
    where
        F: FnOnce(mpsc::Receiver<WorkerMsg>) + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(WORKER_QUEUE_DEPTH);
        let join = std::thread::Builder::new()
            .name(format!("rina-enroll-{neighbor_id}"))
            .spawn(move || body(rx))
            .expect("failed to spawn enrollment worker thread");
        WorkerHandle {
            neighbor_id,
            tx,
            join: Some(join),
        }
    }

    /// Enqueues a message for the worker, blocking if its queue is full.
    pub fn send(&self, msg: WorkerMsg) -> Result<(), mpsc::SendError<WorkerMsg>> {
        self.tx.send(msg)
    }

    /// Whether the worker thread has already returned, so the periodic
    /// sweep knows it is safe to drop this handle without blocking.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerMsg::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Blocks the calling worker thread for up to `timeout` waiting on its
/// inbound queue, distinguishing a delivered message from a plain timeout
/// the way `enroll_tmr_start`'s callback would.
pub fn recv_with_timeout(
    rx: &mpsc::Receiver<WorkerMsg>,
    timeout: Duration,
) -> Option<WorkerMsg> {
    match rx.recv_timeout(timeout) {
        Ok(msg) => Some(msg),
        Err(RecvTimeoutError::Timeout) => Some(WorkerMsg::Timeout),
        Err(RecvTimeoutError::Disconnected) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rina_cdap::CdapOpcode;
    use rina_utils::name::IpcpName;
    use std::sync::{Arc, Mutex};

    #[test]
    fn worker_receives_enqueued_messages() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        let handle = WorkerHandle::spawn(1, move |rx| {
            while let Ok(msg) = rx.recv() {
                match msg {
                    WorkerMsg::Cdap(_) => received2.lock().unwrap().push("cdap"),
                    WorkerMsg::Timeout => received2.lock().unwrap().push("timeout"),
                    WorkerMsg::Shutdown => break,
                }
            }
        });

        let name = IpcpName::new("a", "1", "", "");
        let msg = CdapMessage::new(CdapOpcode::MConnect, name.clone(), name);
        handle.send(WorkerMsg::Cdap(msg)).unwrap();
        drop(handle);

        assert_eq!(*received.lock().unwrap(), vec!["cdap"]);
    }

    #[test]
    fn is_finished_reflects_thread_exit() {
        let handle = WorkerHandle::spawn(1, |rx| {
            let _ = rx.recv();
        });
        handle.send(WorkerMsg::Shutdown).unwrap();
        // Give the thread a moment to actually return after draining Shutdown.
        for _ in 0..100 {
            if handle.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished());
    }

    #[test]
    fn recv_with_timeout_distinguishes_expiry_from_hangup() {
        let (tx, rx) = mpsc::sync_channel::<WorkerMsg>(1);
        assert!(matches!(
            recv_with_timeout(&rx, Duration::from_millis(10)),
            Some(WorkerMsg::Timeout)
        ));
        drop(tx);
        assert!(recv_with_timeout(&rx, Duration::from_millis(10)).is_none());
    }
}
