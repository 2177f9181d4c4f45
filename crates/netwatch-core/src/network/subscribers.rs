//! Status-change subscribers.
//!
//! Subscribers are plain closures. Each notification runs every subscriber on
//! its own tokio task inside a panic boundary, so a panicking or slow
//! subscriber affects neither the monitor nor its siblings.

use crate::network::status::ConnectivityStatus;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::error;

/// A status transition delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: ConnectivityStatus,
    pub current: ConnectivityStatus,
    pub at: DateTime<Utc>,
}

/// Subscriber callback.
pub type StatusCallback = Arc<dyn Fn(StatusChange) + Send + Sync>;

/// Ordered list of subscribers.
#[derive(Default, Clone)]
pub struct StatusSubscriberRegistry {
    callbacks: Vec<StatusCallback>,
}

impl StatusSubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber. No dedup, no priority.
    pub fn add<F>(&mut self, callback: F)
    where
        F: Fn(StatusChange) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Spawn one supervised task per subscriber, in registration order.
    ///
    /// Must be called from within a tokio runtime. The returned handles never
    /// resolve to a panic error; panics are caught and logged inside the task.
    pub fn dispatch(&self, change: StatusChange) -> Vec<JoinHandle<()>> {
        self.callbacks
            .iter()
            .enumerate()
            .map(|(index, callback)| {
                let callback = Arc::clone(callback);
                tokio::spawn(async move {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(change)));
                    if let Err(payload) = outcome {
                        error!(
                            "Status subscriber {} panicked on {} -> {}: {}",
                            index,
                            change.previous,
                            change.current,
                            panic_message(payload.as_ref())
                        );
                    }
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for StatusSubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSubscriberRegistry")
            .field("subscribers", &self.callbacks.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}
