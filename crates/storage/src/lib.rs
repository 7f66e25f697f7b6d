use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::info;

use shared::domain::{AttachmentHandle, Reminder};

mod media;

pub use media::FsMediaStore;

/// Key of the single record that holds the whole reminder collection.
pub const REMINDERS_RECORD_KEY: &str = "saved_reminders";

/// Version written into the persisted envelope. Bump together with a
/// decoding path for the previous version whenever the stored shape changes.
pub const REMINDERS_FORMAT_VERSION: u32 = 1;

/// Key of the record holding the user's name. No record means first launch.
pub const USER_NAME_RECORD_KEY: &str = "user_name";

/// Whole-collection persistence for reminders.
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    async fn save(&self, reminders: &[Reminder]) -> Result<()>;
    async fn load(&self) -> Result<Vec<Reminder>>;
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn load_user_name(&self) -> Result<Option<String>>;
    async fn save_user_name(&self, name: &str) -> Result<()>;
    async fn clear_user_name(&self) -> Result<()>;
}

/// Blob storage for reminder image attachments.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, bytes: &[u8]) -> Result<AttachmentHandle>;
    async fn fetch(&self, handle: &AttachmentHandle) -> Result<Vec<u8>>;
    async fn delete(&self, handle: &AttachmentHandle) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct ReminderEnvelopeRef<'a> {
    version: u32,
    reminders: &'a [Reminder],
}

#[derive(Debug, Deserialize)]
struct ReminderEnvelope {
    version: u32,
    reminders: Vec<Reminder>,
}

pub fn encode_reminders(reminders: &[Reminder]) -> Result<String> {
    serde_json::to_string_pretty(&ReminderEnvelopeRef {
        version: REMINDERS_FORMAT_VERSION,
        reminders,
    })
    .context("failed to encode reminders")
}

pub fn decode_reminders(payload: &str) -> Result<Vec<Reminder>> {
    let envelope: ReminderEnvelope =
        serde_json::from_str(payload).context("failed to decode reminders")?;
    if envelope.version != REMINDERS_FORMAT_VERSION {
        bail!(
            "unsupported reminders format version {} (expected {})",
            envelope.version,
            REMINDERS_FORMAT_VERSION
        );
    }
    Ok(envelope.reminders)
}

/// SQLite-backed key-value store. Reminders are kept as one JSON record.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool_options = if is_memory_url(database_url) {
            // every connection to :memory: is its own database
            SqlitePoolOptions::new().max_connections(1)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn put_record(&self, key: &str, payload: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO app_records (key, payload, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(payload)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write record '{key}'"))?;
        Ok(())
    }

    pub async fn get_record(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT payload FROM app_records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read record '{key}'"))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn remove_record(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM app_records WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove record '{key}'"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ReminderRepository for Storage {
    async fn save(&self, reminders: &[Reminder]) -> Result<()> {
        let payload = encode_reminders(reminders)?;
        self.put_record(REMINDERS_RECORD_KEY, &payload).await?;
        info!("storage: saved reminders count={}", reminders.len());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Reminder>> {
        let Some(payload) = self.get_record(REMINDERS_RECORD_KEY).await? else {
            info!("storage: no saved reminders");
            return Ok(Vec::new());
        };
        let reminders = decode_reminders(&payload)?;
        info!("storage: loaded reminders count={}", reminders.len());
        Ok(reminders)
    }

    async fn clear(&self) -> Result<()> {
        let removed = self.remove_record(REMINDERS_RECORD_KEY).await?;
        info!("storage: cleared reminders removed={removed}");
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for Storage {
    async fn load_user_name(&self) -> Result<Option<String>> {
        self.get_record(USER_NAME_RECORD_KEY).await
    }

    async fn save_user_name(&self, name: &str) -> Result<()> {
        self.put_record(USER_NAME_RECORD_KEY, name).await?;
        info!("storage: saved user name");
        Ok(())
    }

    async fn clear_user_name(&self) -> Result<()> {
        let removed = self.remove_record(USER_NAME_RECORD_KEY).await?;
        info!("storage: cleared user name removed={removed}");
        Ok(())
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

/// Filesystem path behind a `sqlite:` url, if it names a file.
pub fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

/// Turns a plain file path into a `sqlite://` url; urls pass through.
pub fn normalize_database_url(raw_database_url: &str) -> Result<String> {
    let raw_database_url = raw_database_url.trim();
    if raw_database_url.is_empty() {
        return Err(anyhow!("database url must not be empty"));
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return Ok(raw_database_url.to_string());
    }

    Ok(format!("sqlite://{}", raw_database_url.replace('\\', "/")))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
