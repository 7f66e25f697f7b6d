use super::*;
use std::collections::HashMap;

fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::default();
    assert_eq!(settings.persistence_timeout_ms, 2_000);
    assert_eq!(settings.persistence_attempts, 1);
    assert_eq!(settings.morning_hour, 9);
    assert_eq!(settings.evening_hour, 18);
    assert_eq!(settings.notification_title, "Hatırlatma");
}

#[test]
fn unreadable_file_is_ignored_as_a_whole() {
    let dir = tempfile::tempdir().expect("tempdir");
    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "morning_hour = 7\nevening_hour = [").expect("write settings");

    let from_broken = load_settings_from(&broken);
    let from_missing = load_settings_from(dir.path().join("absent.toml"));
    assert_eq!(from_broken, from_missing);
}

#[test]
fn file_overrides_only_named_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(SETTINGS_FILE);
    std::fs::write(
        &path,
        "database_url = \"sqlite://./custom.db\"\nmorning_hour = 8\n",
    )
    .expect("write settings");

    let raw = std::fs::read_to_string(&path).expect("read settings");
    let mut settings = Settings::default();
    settings.apply_file(parse_settings_file(&raw).expect("parse"));

    assert_eq!(settings.database_url, "sqlite://./custom.db");
    assert_eq!(settings.morning_hour, 8);
    assert_eq!(settings.evening_hour, 18);
    assert_eq!(settings.media_dir, Settings::default().media_dir);
}

#[test]
fn invalid_toml_is_rejected() {
    assert!(parse_settings_file("morning_hour = \"eight\"").is_err());
    assert!(parse_settings_file("not toml at all [").is_err());
}

#[test]
fn environment_overrides_file_values() {
    let mut settings = Settings::default();
    settings.apply_file(parse_settings_file("evening_hour = 20").expect("parse"));
    settings.apply_env(env(&[
        ("APP__EVENING_HOUR", "19"),
        ("APP__MEDIA_DIR", "/tmp/media"),
        ("APP__PERSISTENCE_ATTEMPTS", "3"),
        ("APP__NOTIFICATION_TITLE", "Reminder"),
    ]));

    assert_eq!(settings.evening_hour, 19);
    assert_eq!(settings.media_dir, "/tmp/media");
    assert_eq!(settings.persistence_attempts, 3);
    assert_eq!(settings.notification_title, "Reminder");
}

#[test]
fn app_database_url_wins_over_legacy_variable() {
    let mut settings = Settings::default();
    settings.apply_env(env(&[
        ("REMINDERS_DATABASE_URL", "sqlite://legacy.db"),
        ("APP__DATABASE_URL", "sqlite://app.db"),
    ]));
    assert_eq!(settings.database_url, "sqlite://app.db");
}

#[test]
fn unparsable_numeric_env_values_are_ignored() {
    let mut settings = Settings::default();
    settings.apply_env(env(&[
        ("APP__MORNING_HOUR", "early"),
        ("APP__PERSISTENCE_TIMEOUT_MS", "-5"),
    ]));
    assert_eq!(settings.morning_hour, 9);
    assert_eq!(settings.persistence_timeout_ms, 2_000);
}

#[test]
fn sanitize_replaces_out_of_range_values() {
    let settings = Settings {
        morning_hour: 24,
        evening_hour: 99,
        persistence_attempts: 0,
        ..Settings::default()
    }
    .sanitize();

    assert_eq!(settings.morning_hour, 9);
    assert_eq!(settings.evening_hour, 18);
    assert_eq!(settings.persistence_attempts, 1);
}

#[test]
fn projects_interpreter_and_store_settings() {
    let settings = Settings {
        morning_hour: 7,
        evening_hour: 21,
        persistence_timeout_ms: 500,
        persistence_attempts: 2,
        ..Settings::default()
    };

    let interpreter = settings.interpreter();
    assert_eq!(interpreter.morning, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
    assert_eq!(interpreter.evening, NaiveTime::from_hms_opt(21, 0, 0).unwrap());

    let store = settings.store();
    assert_eq!(store.persistence_timeout, Duration::from_millis(500));
    assert_eq!(store.persistence_attempts, 2);
    assert_eq!(store.notification_title, "Hatırlatma");
}

#[test]
fn plain_database_path_is_normalized() {
    let settings = Settings {
        database_url: "./data/reminders.db".into(),
        ..Settings::default()
    };
    let url = settings.normalized_database_url().expect("url");
    assert!(url.starts_with("sqlite:"), "{url}");

    let empty = Settings {
        database_url: "  ".into(),
        ..Settings::default()
    };
    assert!(empty.normalized_database_url().is_err());
}
