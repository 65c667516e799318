//! Single-slot deferred callback
//!
//! Each state machine owns exactly one of these: at most one scheduled
//! wake-up exists at a time, and scheduling a new one cancels whatever is
//! still pending. Work that has already started is never aborted; only the
//! not-yet-fired timer is. This is what makes backoff retries safe to
//! re-schedule from any transition without leaking timers.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

struct Scheduled {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

impl Scheduled {
    fn cancel_if_pending(self) {
        if !self.started.load(Ordering::SeqCst) {
            self.handle.abort();
        }
    }
}

pub(crate) struct Callback {
    slot: Mutex<Option<Scheduled>>,
}

impl Callback {
    pub fn new() -> Self {
        Callback {
            slot: Mutex::new(None),
        }
    }

    /// Run `work` after `delay`, cancelling any previously scheduled work
    /// that has not started yet.
    pub fn once<F>(&self, delay: Duration, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            flag.store(true, Ordering::SeqCst);
            work.await;
        });
        let previous = self
            .slot
            .lock()
            .expect("callback slot lock poisoned")
            .replace(Scheduled { handle, started });
        if let Some(previous) = previous {
            previous.cancel_if_pending();
        }
    }

    /// Run `work` as soon as the scheduler allows, cancelling pending work.
    pub fn immediate<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.once(Duration::ZERO, work);
    }

    /// Cancel any scheduled work that has not started yet.
    pub fn cancel(&self) {
        if let Some(scheduled) = self
            .slot
            .lock()
            .expect("callback slot lock poisoned")
            .take()
        {
            scheduled.cancel_if_pending();
        }
    }
}

impl Drop for Callback {
    fn drop(&mut self) {
        self.cancel();
    }
}
