use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use shared::domain::{AttachmentHandle, Reminder, ReminderId};
use storage::{FsMediaStore, MediaStore, ReminderRepository, Storage};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod bucketing;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod notifications;
pub mod profile;

pub use bucketing::{DayGroup, DayLabel, DayProgress};
pub use error::{ProfileError, StoreError};
pub use interpreter::{CommandInterpreter, InterpreterSettings};
pub use notifications::{
    MissingNotificationDispatcher, NotificationDispatcher, NotificationRequest,
    TimerNotificationDispatcher,
};
pub use profile::UserProfile;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Upper bound for a single persistence write.
    pub persistence_timeout: Duration,
    /// Total write attempts per mutation, including the first.
    pub persistence_attempts: u32,
    /// Heading of every fired notification; the body is the reminder title.
    pub notification_title: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        config::Settings::default().store()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    Persistence,
    Notification,
    Media,
}

/// Change feed for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added(Reminder),
    Deleted(ReminderId),
    Toggled(Reminder),
    Updated(Reminder),
    Cleared,
    CommandNotUnderstood { input: String },
    /// A collaborator failed. The in-memory change still stands.
    Warning { kind: WarningKind, message: String },
}

/// Collaborators handed to [`ReminderStore::open`].
pub struct StoreDependencies {
    pub repository: Arc<dyn ReminderRepository>,
    pub media: Arc<dyn MediaStore>,
    pub notifications: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
}

impl StoreDependencies {
    pub fn new(repository: Arc<dyn ReminderRepository>, media: Arc<dyn MediaStore>) -> Self {
        Self {
            repository,
            media,
            notifications: Arc::new(MissingNotificationDispatcher),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Owns the reminder collection and keeps the collaborators in step with it.
///
/// Mutations take the collection lock for their whole duration, so they run
/// one at a time and each finishes its persistence and notification calls
/// before the next starts. Collaborator failures are logged and published as
/// [`StoreEvent::Warning`]; they never undo the in-memory change.
pub struct ReminderStore {
    repository: Arc<dyn ReminderRepository>,
    media: Arc<dyn MediaStore>,
    notifications: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    interpreter: CommandInterpreter,
    settings: StoreSettings,
    reminders: Mutex<Vec<Reminder>>,
    events: broadcast::Sender<StoreEvent>,
    load_warning: Option<String>,
    /// Load failure not yet published; handed to the first subscriber.
    unreported_load_warning: std::sync::Mutex<Option<String>>,
}

impl ReminderStore {
    /// Builds the store and loads the saved collection. A failed load starts
    /// from an empty collection.
    pub async fn open(
        dependencies: StoreDependencies,
        interpreter: CommandInterpreter,
        settings: StoreSettings,
    ) -> Self {
        let (reminders, load_warning) = match dependencies.repository.load().await {
            Ok(reminders) => (reminders, None),
            Err(err) => {
                let message = format!("failed to load saved reminders, starting empty: {err:#}");
                warn!("reminders: {message}");
                (Vec::new(), Some(message))
            }
        };
        info!("reminders: opened count={}", reminders.len());

        let (events, _) = broadcast::channel(256);
        Self {
            repository: dependencies.repository,
            media: dependencies.media,
            notifications: dependencies.notifications,
            clock: dependencies.clock,
            interpreter,
            settings,
            reminders: Mutex::new(reminders),
            events,
            unreported_load_warning: std::sync::Mutex::new(load_warning.clone()),
            load_warning,
        }
    }

    /// Wires the SQLite repository, the media directory and a timer
    /// dispatcher from `settings`.
    pub async fn open_with_settings(
        settings: &config::Settings,
    ) -> Result<(Self, Arc<TimerNotificationDispatcher>)> {
        let database_url = settings.normalized_database_url()?;
        let repository = Storage::new(&database_url)
            .await
            .with_context(|| format!("failed to open reminder storage at '{database_url}'"))?;
        let dispatcher = Arc::new(TimerNotificationDispatcher::new());
        let dependencies = StoreDependencies::new(
            Arc::new(repository),
            Arc::new(FsMediaStore::new(&settings.media_dir)),
        )
        .with_notifications(dispatcher.clone());

        let store = Self::open(
            dependencies,
            CommandInterpreter::new(settings.interpreter()),
            settings.store(),
        )
        .await;
        Ok((store, dispatcher))
    }

    /// The first subscriber also receives a [`StoreEvent::Warning`] for a
    /// load failure at [`ReminderStore::open`].
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        let receiver = self.events.subscribe();
        let unreported = self
            .unreported_load_warning
            .lock()
            .ok()
            .and_then(|mut pending| pending.take());
        if let Some(message) = unreported {
            self.emit(StoreEvent::Warning {
                kind: WarningKind::Persistence,
                message,
            });
        }
        receiver
    }

    /// Why the saved collection could not be loaded, if it could not. The
    /// next mutation overwrites what is stored.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.interpreter
    }

    /// Voice/text path. `None` means the command was not understood; that is
    /// also published as [`StoreEvent::CommandNotUnderstood`].
    pub fn interpret(&self, raw: &str) -> Option<Reminder> {
        let draft = self.interpreter.interpret(raw, &self.clock.now());
        if draft.is_none() {
            info!("reminders: command not understood input={raw:?}");
            self.emit(StoreEvent::CommandNotUnderstood {
                input: raw.to_string(),
            });
        }
        draft
    }

    /// Interprets `raw` and adds the draft when there is one.
    pub async fn submit_command(&self, raw: &str) -> Result<Option<Reminder>, StoreError> {
        let Some(draft) = self.interpret(raw) else {
            return Ok(None);
        };
        self.add(draft.clone()).await?;
        Ok(Some(draft))
    }

    /// Typed entry: a new reminder created now.
    pub async fn create(
        &self,
        title: &str,
        reminder_at: Option<DateTime<Utc>>,
    ) -> Result<Reminder, StoreError> {
        let now = self.clock.now().with_timezone(&Utc);
        let reminder = Reminder::new(title.trim(), now)?.with_reminder_at(reminder_at);
        self.add(reminder.clone()).await?;
        Ok(reminder)
    }

    pub async fn add(&self, reminder: Reminder) -> Result<(), StoreError> {
        let mut reminders = self.reminders.lock().await;
        if reminders.iter().any(|r| r.id() == reminder.id()) {
            return Err(StoreError::Duplicate(reminder.id()));
        }

        reminders.insert(0, reminder.clone());
        self.persist(&reminders).await;
        if reminder.reminder_at().is_some() {
            self.schedule_notification(&reminder).await;
        }

        info!("reminders: added id={} title={:?}", reminder.id(), reminder.title());
        self.emit(StoreEvent::Added(reminder));
        Ok(())
    }

    /// Releases the attachment, removes the reminder and cancels its alert.
    pub async fn delete(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        let mut reminders = self.reminders.lock().await;
        let index = position_of(&reminders, id)?;

        if let Some(handle) = reminders[index].attachment() {
            self.release_attachment(id, handle).await;
        }
        let removed = reminders.remove(index);
        self.persist(&reminders).await;
        self.cancel_notification(id).await;

        info!("reminders: deleted id={id} title={:?}", removed.title());
        self.emit(StoreEvent::Deleted(id));
        Ok(removed)
    }

    pub async fn toggle_done(&self, id: ReminderId) -> Result<Reminder, StoreError> {
        let now = self.clock.now().with_timezone(&Utc);
        let mut reminders = self.reminders.lock().await;
        let index = position_of(&reminders, id)?;

        let done = reminders[index].toggle_done(now);
        let toggled = reminders[index].clone();
        self.persist(&reminders).await;

        info!("reminders: toggled id={id} done={done}");
        self.emit(StoreEvent::Toggled(toggled.clone()));
        Ok(toggled)
    }

    /// Replaces every mutable field of the stored reminder with the same id.
    /// `id` and `created_at` of the stored reminder are kept.
    pub async fn update(&self, reminder: Reminder) -> Result<Reminder, StoreError> {
        let mut reminders = self.reminders.lock().await;
        let index = position_of(&reminders, reminder.id())?;

        let updated = reminder.with_identity_of(&reminders[index]);
        reminders[index] = updated.clone();
        self.persist(&reminders).await;
        if updated.reminder_at().is_some() {
            self.schedule_notification(&updated).await;
        } else {
            self.cancel_notification(updated.id()).await;
        }

        info!("reminders: updated id={}", updated.id());
        self.emit(StoreEvent::Updated(updated.clone()));
        Ok(updated)
    }

    pub async fn delete_all(&self) {
        let mut reminders = self.reminders.lock().await;
        let count = reminders.len();
        reminders.clear();

        let repository = self.repository.clone();
        self.with_persistence("clear", || {
            let repository = repository.clone();
            async move { repository.clear().await }
        })
        .await;
        if let Err(err) = self.notifications.cancel_all().await {
            self.report(
                WarningKind::Notification,
                format!("failed to cancel all notifications: {err:#}"),
            );
        }

        info!("reminders: deleted all count={count}");
        self.emit(StoreEvent::Cleared);
    }

    /// Stores `bytes` in the media store and points the reminder at it. A
    /// previous attachment is released.
    pub async fn attach_image(&self, id: ReminderId, bytes: &[u8]) -> Result<Reminder, StoreError> {
        let mut reminders = self.reminders.lock().await;
        let index = position_of(&reminders, id)?;

        let handle = self
            .media
            .store(bytes)
            .await
            .map_err(|source| StoreError::Media {
                reminder_id: id,
                source,
            })?;
        if let Some(previous) = reminders[index].replace_attachment(Some(handle)) {
            self.release_attachment(id, &previous).await;
        }
        let updated = reminders[index].clone();
        self.persist(&reminders).await;

        info!("reminders: attached image id={id}");
        self.emit(StoreEvent::Updated(updated.clone()));
        Ok(updated)
    }

    /// Image bytes of the reminder's attachment. Any failure reads as no
    /// attachment.
    pub async fn load_attachment(&self, id: ReminderId) -> Option<Vec<u8>> {
        let handle = self
            .reminders
            .lock()
            .await
            .iter()
            .find(|r| r.id() == id)
            .and_then(|r| r.attachment().cloned())?;

        match self.media.fetch(&handle).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                self.report(
                    WarningKind::Media,
                    format!("failed to load attachment {handle} of reminder {id}: {err:#}"),
                );
                None
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<Reminder> {
        self.reminders.lock().await.clone()
    }

    pub async fn get(&self, id: ReminderId) -> Option<Reminder> {
        self.reminders
            .lock()
            .await
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    pub async fn grouped_by_day(&self) -> Vec<DayGroup> {
        let now = self.clock.now();
        bucketing::grouped_by_day(&self.reminders.lock().await, &now.timezone())
    }

    pub async fn today(&self) -> Vec<Reminder> {
        bucketing::due_today(&self.reminders.lock().await, &self.clock.now())
    }

    pub async fn overdue(&self) -> Vec<Reminder> {
        bucketing::overdue(&self.reminders.lock().await, &self.clock.now())
    }

    pub async fn reminders_on(&self, day: NaiveDate) -> Vec<Reminder> {
        let now = self.clock.now();
        bucketing::on_day(&self.reminders.lock().await, day, &now.timezone())
    }

    pub async fn pending_count(&self) -> usize {
        self.reminders
            .lock()
            .await
            .iter()
            .filter(|r| !r.is_done())
            .count()
    }

    pub async fn completed_count(&self) -> usize {
        self.reminders
            .lock()
            .await
            .iter()
            .filter(|r| r.is_done())
            .count()
    }

    pub async fn today_pending_count(&self) -> usize {
        self.today().await.iter().filter(|r| !r.is_done()).count()
    }

    async fn persist(&self, reminders: &[Reminder]) {
        let repository = self.repository.clone();
        self.with_persistence("save", || {
            let repository = repository.clone();
            async move { repository.save(reminders).await }
        })
        .await;
    }

    /// Runs a persistence call under the configured timeout, retrying up to
    /// the configured attempt count, and reports the last failure.
    async fn with_persistence<F, Fut>(&self, operation: &str, call: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let attempts = self.settings.persistence_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.persistence_timeout, call()).await {
                Ok(Ok(())) => return,
                Ok(Err(err)) => last_error = format!("{err:#}"),
                Err(_) => {
                    last_error = format!("timed out after {:?}", self.settings.persistence_timeout)
                }
            }
            warn!(attempt, attempts, "reminders: persistence {operation} failed: {last_error}");
        }
        self.report(
            WarningKind::Persistence,
            format!("persistence {operation} failed: {last_error}"),
        );
    }

    async fn schedule_notification(&self, reminder: &Reminder) {
        let Some(fire_at) = reminder.reminder_at() else {
            return;
        };
        let request = NotificationRequest {
            reminder_id: reminder.id(),
            title: self.settings.notification_title.clone(),
            body: reminder.title().to_string(),
            fire_at,
        };
        if let Err(err) = self.notifications.schedule(request).await {
            self.report(
                WarningKind::Notification,
                format!("failed to schedule notification for {}: {err:#}", reminder.id()),
            );
        }
    }

    async fn cancel_notification(&self, id: ReminderId) {
        if let Err(err) = self.notifications.cancel(id).await {
            self.report(
                WarningKind::Notification,
                format!("failed to cancel notification for {id}: {err:#}"),
            );
        }
    }

    async fn release_attachment(&self, id: ReminderId, handle: &AttachmentHandle) {
        if let Err(err) = self.media.delete(handle).await {
            self.report(
                WarningKind::Media,
                format!("failed to delete attachment {handle} of reminder {id}: {err:#}"),
            );
        }
    }

    fn report(&self, kind: WarningKind, message: String) {
        warn!("reminders: {message}");
        self.emit(StoreEvent::Warning { kind, message });
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

fn position_of(reminders: &[Reminder], id: ReminderId) -> Result<usize, StoreError> {
    reminders
        .iter()
        .position(|r| r.id() == id)
        .ok_or(StoreError::NotFound(id))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
