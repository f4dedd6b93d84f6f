pub mod store;

use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use mockall::automock;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use store::PropertyStore;
use tracing::{debug, info};

/// Message delivery
#[automock]
pub trait MessageSink: Send + Sync {
    fn send(&self, message: &str) -> Result<()>;
}

/// Sink that only writes the message to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn send(&self, message: &str) -> Result<()> {
        info!(message, "notification");
        Ok(())
    }
}

/// Delivers at most one message per category per interval.
///
/// The read-check-write of a category's last-sent time runs under that
/// category's lock, so concurrent callers on one category send once.
pub struct ThrottledNotifier<S, M> {
    store: S,
    sink: M,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: PropertyStore, M: MessageSink> ThrottledNotifier<S, M> {
    pub fn new(store: S, sink: M) -> Self {
        Self {
            store,
            sink,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns whether the message went out.
    pub fn send_timed(&self, message: &str, category: &str, interval: Duration) -> Result<bool> {
        self.send_timed_at(message, category, interval, Utc::now())
    }

    pub fn send_timed_at(
        &self,
        message: &str,
        category: &str,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let lock = self.category_lock(category)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::Store(format!("lock for '{category}' poisoned")))?;

        let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
        if let Some(last) = self.store.get(category)? {
            if now.signed_duration_since(last.updated_at) <= interval {
                debug!(category, last_sent = %last.updated_at, "notification throttled");
                return Ok(false);
            }
        }

        self.sink.send(message)?;
        self.store.set(category, message, now)?;
        Ok(true)
    }

    fn category_lock(&self, category: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::Store("category lock table poisoned".to_string()))?;
        Ok(locks.entry(category.to_string()).or_default().clone())
    }
}
