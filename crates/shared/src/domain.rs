use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorCode, ValidationError};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_newtype!(ReminderId);

/// Opaque key into the media store. Only the media store interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentHandle(pub String);

impl AttachmentHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttachmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reminder note.
///
/// Fields are private so that the two model invariants hold for every value
/// that exists: the title is never empty, and `completed_at` is present
/// exactly when the reminder is done. Decoding goes through the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReminderRecord", into = "ReminderRecord")]
pub struct Reminder {
    id: ReminderId,
    title: String,
    is_done: bool,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    reminder_at: Option<DateTime<Utc>>,
    attachment: Option<AttachmentHandle>,
}

impl Reminder {
    pub fn new(
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: ReminderId::new(),
            title: validated_title(title.into())?,
            is_done: false,
            created_at,
            completed_at: None,
            reminder_at: None,
            attachment: None,
        })
    }

    pub fn with_reminder_at(mut self, reminder_at: Option<DateTime<Utc>>) -> Self {
        self.reminder_at = reminder_at;
        self
    }

    pub fn with_attachment(mut self, attachment: Option<AttachmentHandle>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Marks the reminder done or not done as of `now`.
    pub fn with_done(mut self, done: bool, now: DateTime<Utc>) -> Self {
        self.set_done(done, now);
        self
    }

    pub fn id(&self) -> ReminderId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_done(&self) -> bool {
        self.is_done
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn reminder_at(&self) -> Option<DateTime<Utc>> {
        self.reminder_at
    }

    pub fn attachment(&self) -> Option<&AttachmentHandle> {
        self.attachment.as_ref()
    }

    /// Sets the done flag. `completed_at` only changes on an actual transition:
    /// false to true stamps `now`, true to false clears it.
    pub fn set_done(&mut self, done: bool, now: DateTime<Utc>) {
        if done == self.is_done {
            return;
        }
        self.is_done = done;
        self.completed_at = done.then_some(now);
    }

    /// Flips the done flag and returns the new value.
    pub fn toggle_done(&mut self, now: DateTime<Utc>) -> bool {
        self.set_done(!self.is_done, now);
        self.is_done
    }

    /// Replaces the attachment handle and hands back the previous one so the
    /// caller can release it.
    pub fn replace_attachment(
        &mut self,
        attachment: Option<AttachmentHandle>,
    ) -> Option<AttachmentHandle> {
        std::mem::replace(&mut self.attachment, attachment)
    }

    /// Returns `self` carrying the identity (`id` and `created_at`) of
    /// `original`. Every other field is kept from `self`.
    pub fn with_identity_of(mut self, original: &Reminder) -> Self {
        self.id = original.id;
        self.created_at = original.created_at;
        self
    }

    /// The instant that decides which calendar day the reminder belongs to:
    /// the completion time once done, the creation time otherwise.
    pub fn bucket_instant(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }

    pub fn bucket_day<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.bucket_instant().with_timezone(tz).date_naive()
    }
}

fn validated_title(title: String) -> Result<String, ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::empty_title());
    }
    Ok(title)
}

/// Stored shape of a [`Reminder`]. Field names are part of the persisted
/// format and must stay stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub id: ReminderId,
    pub title: String,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachment: Option<AttachmentHandle>,
}

impl TryFrom<ReminderRecord> for Reminder {
    type Error = ValidationError;

    fn try_from(record: ReminderRecord) -> Result<Self, Self::Error> {
        if record.is_done != record.completed_at.is_some() {
            return Err(ValidationError::new(
                ErrorCode::CompletionMismatch,
                format!(
                    "reminder {} has is_done={} but completed_at is {}",
                    record.id,
                    record.is_done,
                    if record.completed_at.is_some() { "set" } else { "missing" }
                ),
            ));
        }

        Ok(Self {
            id: record.id,
            title: validated_title(record.title)?,
            is_done: record.is_done,
            created_at: record.created_at,
            completed_at: record.completed_at,
            reminder_at: record.reminder_at,
            attachment: record.attachment,
        })
    }
}

impl From<Reminder> for ReminderRecord {
    fn from(reminder: Reminder) -> Self {
        Self {
            id: reminder.id,
            title: reminder.title,
            is_done: reminder.is_done,
            created_at: reminder.created_at,
            completed_at: reminder.completed_at,
            reminder_at: reminder.reminder_at,
            attachment: reminder.attachment,
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
