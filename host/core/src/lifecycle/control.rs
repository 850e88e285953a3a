//! Deferred lifecycle requests
//!
//! Hooks cannot stop or swap their own app (that would join the worker they
//! are running on). They post a request here instead; the control task runs
//! it on a blocking thread after the requested delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::manager::AppManager;

/// Lifecycle request posted by an app or the host
#[derive(Clone, Debug, PartialEq)]
pub enum ControlRequest {
    /// `AppManager::swap(from, to, hz)`
    Swap {
        /// App to replace
        from: String,
        /// App to run
        to: String,
        /// Tick rate for `to`
        hz: f64,
        /// Wait before executing
        delay: Duration,
    },
    /// `AppManager::reload(name, hz)`
    Reload {
        /// App to reload
        name: String,
        /// Tick rate if it is restarted
        hz: f64,
        /// Wait before executing
        delay: Duration,
    },
}

impl ControlRequest {
    fn delay(&self) -> Duration {
        match self {
            Self::Swap { delay, .. } | Self::Reload { delay, .. } => *delay,
        }
    }
}

/// Sender side of the control channel
#[derive(Clone, Debug)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlRequest>,
}

impl ControlHandle {
    /// Create a handle and the receiver for [`run`]
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControlRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post a request; returns false if the control task is gone
    pub fn send(&self, request: ControlRequest) -> bool {
        match self.tx.send(request) {
            Ok(()) => true,
            Err(e) => {
                warn!(request = ?e.0, "Control task is not running, request dropped");
                false
            }
        }
    }

    /// Swap `from` for `to` after `delay`
    pub fn swap(&self, from: &str, to: &str, hz: f64, delay: Duration) -> bool {
        self.send(ControlRequest::Swap {
            from: from.to_string(),
            to: to.to_string(),
            hz,
            delay,
        })
    }

    /// Reload `name` after `delay`
    pub fn reload(&self, name: &str, hz: f64, delay: Duration) -> bool {
        self.send(ControlRequest::Reload {
            name: name.to_string(),
            hz,
            delay,
        })
    }
}

/// Execute control requests until every [`ControlHandle`] is dropped
pub async fn run(manager: Arc<AppManager>, mut rx: mpsc::UnboundedReceiver<ControlRequest>) {
    info!("Lifecycle control task started");
    while let Some(request) = rx.recv().await {
        debug!(request = ?request, "Control request received");
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            tokio::time::sleep(request.delay()).await;
            let outcome = tokio::task::spawn_blocking(move || execute(&manager, request)).await;
            if let Err(e) = outcome {
                warn!(error = %e, "Control request task failed");
            }
        });
    }
    info!("Lifecycle control task stopped");
}

fn execute(manager: &AppManager, request: ControlRequest) {
    let result = match &request {
        ControlRequest::Swap { from, to, hz, .. } => manager.swap(from, to, *hz),
        ControlRequest::Reload { name, hz, .. } => manager.reload(name, *hz),
    };
    match result {
        Ok(()) => debug!(request = ?request, "Control request done"),
        Err(e) => warn!(request = ?request, error = %e, "Control request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_after_receiver_dropped() {
        let (handle, rx) = ControlHandle::channel();
        assert!(handle.swap("a", "b", 20.0, Duration::ZERO));
        drop(rx);
        assert!(!handle.reload("a", 20.0, Duration::ZERO));
    }

    #[test]
    fn test_requests_keep_their_fields() {
        let (handle, mut rx) = ControlHandle::channel();
        handle.swap("launcher", "clock", 20.0, Duration::from_millis(250));
        assert_eq!(
            rx.try_recv().unwrap(),
            ControlRequest::Swap {
                from: "launcher".to_string(),
                to: "clock".to_string(),
                hz: 20.0,
                delay: Duration::from_millis(250),
            }
        );
    }
}
