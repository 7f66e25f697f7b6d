use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use chrono::NaiveTime;
use serde::Deserialize;
use tracing::warn;

use crate::{interpreter::InterpreterSettings, StoreSettings};

pub const SETTINGS_FILE: &str = "reminders.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub media_dir: String,
    pub persistence_timeout_ms: u64,
    pub persistence_attempts: u32,
    pub morning_hour: u32,
    pub evening_hour: u32,
    pub notification_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/reminders.db".into(),
            media_dir: "./data/media".into(),
            persistence_timeout_ms: 2_000,
            persistence_attempts: 1,
            morning_hour: 9,
            evening_hour: 18,
            notification_title: "Hatırlatma".into(),
        }
    }
}

/// Every key optional; a partial file only overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    database_url: Option<String>,
    media_dir: Option<String>,
    persistence_timeout_ms: Option<u64>,
    persistence_attempts: Option<u32>,
    morning_hour: Option<u32>,
    evening_hour: Option<u32>,
    notification_title: Option<String>,
}

impl Settings {
    pub fn interpreter(&self) -> InterpreterSettings {
        let defaults = InterpreterSettings::default();
        InterpreterSettings {
            morning: on_the_hour(self.morning_hour).unwrap_or(defaults.morning),
            evening: on_the_hour(self.evening_hour).unwrap_or(defaults.evening),
        }
    }

    /// `database_url` as a `sqlite:` url; a plain file path is accepted.
    pub fn normalized_database_url(&self) -> anyhow::Result<String> {
        storage::normalize_database_url(&self.database_url)
    }

    pub fn store(&self) -> StoreSettings {
        StoreSettings {
            persistence_timeout: Duration::from_millis(self.persistence_timeout_ms.max(1)),
            persistence_attempts: self.persistence_attempts.max(1),
            notification_title: self.notification_title.clone(),
        }
    }

    fn apply_file(&mut self, file: SettingsFile) {
        if let Some(v) = file.database_url {
            self.database_url = v;
        }
        if let Some(v) = file.media_dir {
            self.media_dir = v;
        }
        if let Some(v) = file.persistence_timeout_ms {
            self.persistence_timeout_ms = v;
        }
        if let Some(v) = file.persistence_attempts {
            self.persistence_attempts = v;
        }
        if let Some(v) = file.morning_hour {
            self.morning_hour = v;
        }
        if let Some(v) = file.evening_hour {
            self.evening_hour = v;
        }
        if let Some(v) = file.notification_title {
            self.notification_title = v;
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("REMINDERS_DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = var("APP__DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = var("APP__MEDIA_DIR") {
            self.media_dir = v;
        }
        if let Some(v) = var("APP__PERSISTENCE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.persistence_timeout_ms = v;
        }
        if let Some(v) = var("APP__PERSISTENCE_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.persistence_attempts = v;
        }
        if let Some(v) = var("APP__MORNING_HOUR").and_then(|v| v.parse().ok()) {
            self.morning_hour = v;
        }
        if let Some(v) = var("APP__EVENING_HOUR").and_then(|v| v.parse().ok()) {
            self.evening_hour = v;
        }
        if let Some(v) = var("APP__NOTIFICATION_TITLE") {
            self.notification_title = v;
        }
    }

    fn sanitize(mut self) -> Self {
        let defaults = Self::default();
        if on_the_hour(self.morning_hour).is_none() {
            warn!("config: morning_hour={} out of range, using default", self.morning_hour);
            self.morning_hour = defaults.morning_hour;
        }
        if on_the_hour(self.evening_hour).is_none() {
            warn!("config: evening_hour={} out of range, using default", self.evening_hour);
            self.evening_hour = defaults.evening_hour;
        }
        self.persistence_attempts = self.persistence_attempts.max(1);
        self
    }
}

/// Settings from `reminders.toml` in the working directory, then the
/// environment.
pub fn load_settings() -> Settings {
    load_settings_from(SETTINGS_FILE)
}

pub fn load_settings_from(path: impl AsRef<Path>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path.as_ref()) {
        match parse_settings_file(&raw) {
            Ok(file) => settings.apply_file(file),
            Err(err) => warn!(
                "config: ignoring unreadable settings file path={}: {err:#}",
                path.as_ref().display()
            ),
        }
    }

    settings.apply_env(|key| std::env::var(key).ok());
    settings.sanitize()
}

fn parse_settings_file(raw: &str) -> anyhow::Result<SettingsFile> {
    toml::from_str::<SettingsFile>(raw).context("invalid settings toml")
}

fn on_the_hour(hour: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour, 0, 0)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
