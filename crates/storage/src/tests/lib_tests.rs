use super::*;
use chrono::{TimeZone, Utc};

fn sample(title: &str) -> Reminder {
    let created_at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
    Reminder::new(title, created_at).expect("reminder")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn load_without_saved_record_is_empty() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let reminders = storage.load().await.expect("load");
    assert!(reminders.is_empty());
}

#[tokio::test]
async fn save_replaces_the_whole_collection() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = sample("toplantı var");
    let second = sample("call mom");

    storage
        .save(&[first.clone(), second.clone()])
        .await
        .expect("first save");
    storage.save(&[second.clone()]).await.expect("second save");

    let loaded = storage.load().await.expect("load");
    assert_eq!(loaded, vec![second]);
}

#[tokio::test]
async fn clear_removes_the_record() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.save(&[sample("doktora git")]).await.expect("save");

    storage.clear().await.expect("clear");
    assert!(storage.load().await.expect("load").is_empty());
    assert_eq!(
        storage.get_record(REMINDERS_RECORD_KEY).await.expect("get"),
        None
    );

    storage.clear().await.expect("clearing twice is fine");
}

#[tokio::test]
async fn rejects_unknown_format_version() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .put_record(REMINDERS_RECORD_KEY, r#"{"version": 99, "reminders": []}"#)
        .await
        .expect("put");

    let err = storage.load().await.expect_err("unknown version");
    assert!(err.to_string().contains("unsupported reminders format version 99"));
}

#[tokio::test]
async fn rejects_records_that_break_invariants() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let payload = r#"{
        "version": 1,
        "reminders": [{
            "id": "9a1b4c55-7d1e-4f8e-9d2b-3f7f2d8a6c10",
            "title": "",
            "is_done": false,
            "created_at": "2026-10-19T09:00:00Z"
        }]
    }"#;
    storage
        .put_record(REMINDERS_RECORD_KEY, payload)
        .await
        .expect("put");

    assert!(storage.load().await.is_err());
}

#[test]
fn encoded_payload_carries_version_and_field_names() {
    let payload = encode_reminders(&[sample("süt al")]).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&payload).expect("json");
    assert_eq!(value["version"], REMINDERS_FORMAT_VERSION);
    assert_eq!(value["reminders"][0]["title"], "süt al");
    assert_eq!(value["reminders"][0]["is_done"], false);
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/reminders.db").expect("url"),
        "sqlite://./data/reminders.db"
    );
    assert_eq!(
        normalize_database_url("sqlite::memory:").expect("url"),
        "sqlite::memory:"
    );
    assert!(normalize_database_url("   ").is_err());
}

#[test]
fn memory_urls_have_no_file_path() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/reminders.db?mode=rwc"),
        Some(PathBuf::from("./data/reminders.db"))
    );
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("reminders.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn user_name_is_kept_apart_from_reminders() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.load_user_name().await.expect("load"), None);

    storage.save(&[sample("su iç")]).await.expect("save reminders");
    storage.save_user_name("Ayşe").await.expect("save name");
    storage.save_user_name("Fulya").await.expect("rename");
    assert_eq!(
        storage.load_user_name().await.expect("load"),
        Some("Fulya".to_string())
    );

    storage.clear_user_name().await.expect("clear");
    assert_eq!(storage.load_user_name().await.expect("load"), None);
    assert_eq!(storage.load().await.expect("reminders").len(), 1);
}
