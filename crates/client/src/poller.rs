//! Cancellable periodic re-requests

use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// At most one running task; starting again replaces it
pub struct Poller {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: Mutex::new(None),
        }
    }

    /// Run `task` now and then every `period` until stopped or replaced
    pub fn start<F>(&self, period: Duration, mut task: F)
    where
        F: FnMut() + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(poller = self.name, "No runtime; polling disabled");
            return;
        };
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                task();
            }
        });

        if let Some(previous) = self.handle.lock().replace(handle) {
            previous.abort();
        }
        tracing::debug!(poller = self.name, ?period, "Polling started");
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
            tracing::debug!(poller = self.name, "Polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().as_ref().map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}
