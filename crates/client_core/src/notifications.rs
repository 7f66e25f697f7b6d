use std::{collections::HashMap, sync::Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::ReminderId;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info};

/// A local alert to fire once at `fire_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub reminder_id: ReminderId,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}

/// Schedules local alerts. One outstanding schedule per reminder id:
/// scheduling an id again supersedes the earlier schedule.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn schedule(&self, request: NotificationRequest) -> Result<()>;
    async fn cancel(&self, reminder_id: ReminderId) -> Result<()>;
    async fn cancel_all(&self) -> Result<()>;
}

pub struct MissingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for MissingNotificationDispatcher {
    async fn schedule(&self, _request: NotificationRequest) -> Result<()> {
        Err(anyhow!("notification dispatcher is unavailable"))
    }

    async fn cancel(&self, _reminder_id: ReminderId) -> Result<()> {
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        Ok(())
    }
}

/// In-process dispatcher: one tokio task per reminder sleeps until the fire
/// time and then publishes the request to subscribers.
pub struct TimerNotificationDispatcher {
    pending: Mutex<HashMap<ReminderId, JoinHandle<()>>>,
    fired: broadcast::Sender<NotificationRequest>,
}

impl TimerNotificationDispatcher {
    pub fn new() -> Self {
        let (fired, _) = broadcast::channel(64);
        Self {
            pending: Mutex::new(HashMap::new()),
            fired,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationRequest> {
        self.fired.subscribe()
    }

    /// Ids with a schedule that has not fired yet.
    pub fn pending_ids(&self) -> Vec<ReminderId> {
        let Ok(pending) = self.pending.lock() else {
            return Vec::new();
        };
        let mut ids: Vec<ReminderId> = pending
            .iter()
            .filter(|(_, task)| !task.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    fn pending(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ReminderId, JoinHandle<()>>>> {
        self.pending
            .lock()
            .map_err(|_| anyhow!("notification schedule table is poisoned"))
    }
}

impl Default for TimerNotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerNotificationDispatcher {
    fn drop(&mut self) {
        if let Ok(pending) = self.pending.get_mut() {
            for (_, task) in pending.drain() {
                task.abort();
            }
        }
    }
}

#[async_trait]
impl NotificationDispatcher for TimerNotificationDispatcher {
    async fn schedule(&self, request: NotificationRequest) -> Result<()> {
        let mut pending = self.pending()?;
        if let Some(previous) = pending.remove(&request.reminder_id) {
            previous.abort();
        }

        let Ok(delay) = (request.fire_at - Utc::now()).to_std() else {
            debug!(
                "notifications: fire time already passed reminder={} fire_at={}",
                request.reminder_id, request.fire_at
            );
            return Ok(());
        };

        let reminder_id = request.reminder_id;
        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("notifications: firing reminder={}", request.reminder_id);
            let _ = fired.send(request);
        });
        pending.retain(|_, task| !task.is_finished());
        pending.insert(reminder_id, task);
        info!("notifications: scheduled reminder={reminder_id} in={delay:?}");
        Ok(())
    }

    async fn cancel(&self, reminder_id: ReminderId) -> Result<()> {
        if let Some(task) = self.pending()?.remove(&reminder_id) {
            task.abort();
            info!("notifications: cancelled reminder={reminder_id}");
        }
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        let mut pending = self.pending()?;
        let count = pending.len();
        for (_, task) in pending.drain() {
            task.abort();
        }
        info!("notifications: cancelled all count={count}");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
