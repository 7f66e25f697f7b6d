use super::*;
use chrono::{Duration, FixedOffset};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap()
}

#[test]
fn rejects_blank_titles() {
    let err = Reminder::new("   ", at(9)).expect_err("blank title");
    assert_eq!(err.code, ErrorCode::EmptyTitle);
    assert!(Reminder::new("", at(9)).is_err());
}

#[test]
fn completion_stamp_follows_done_transitions() {
    let mut reminder = Reminder::new("water the plants", at(9)).expect("reminder");
    assert!(!reminder.is_done());
    assert_eq!(reminder.completed_at(), None);

    assert!(reminder.toggle_done(at(10)));
    assert_eq!(reminder.completed_at(), Some(at(10)));

    reminder.set_done(true, at(11));
    assert_eq!(
        reminder.completed_at(),
        Some(at(10)),
        "re-marking done must not move the completion time"
    );

    assert!(!reminder.toggle_done(at(12)));
    assert_eq!(reminder.completed_at(), None);
}

#[test]
fn bucket_day_prefers_completion_day() {
    let created = at(9) - Duration::days(3);
    let mut reminder = Reminder::new("pay rent", created).expect("reminder");
    assert_eq!(reminder.bucket_day(&Utc), created.date_naive());

    reminder.set_done(true, at(9));
    assert_eq!(reminder.bucket_day(&Utc), at(9).date_naive());

    reminder.set_done(false, at(10));
    assert_eq!(reminder.bucket_day(&Utc), created.date_naive());
}

#[test]
fn bucket_day_uses_the_given_time_zone() {
    let late_evening_utc = Utc.with_ymd_and_hms(2026, 10, 19, 22, 30, 0).unwrap();
    let reminder = Reminder::new("late call", late_evening_utc).expect("reminder");
    let istanbul = FixedOffset::east_opt(3 * 3600).unwrap();

    assert_eq!(
        reminder.bucket_day(&istanbul),
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    );
}

#[test]
fn identity_is_carried_from_original() {
    let original = Reminder::new("draft", at(8)).expect("original");
    let replacement = Reminder::new("final", at(15))
        .expect("replacement")
        .with_identity_of(&original);

    assert_eq!(replacement.id(), original.id());
    assert_eq!(replacement.created_at(), original.created_at());
    assert_eq!(replacement.title(), "final");
}

#[test]
fn serializes_with_stable_field_names() {
    let reminder = Reminder::new("doktora git", at(9))
        .expect("reminder")
        .with_reminder_at(Some(at(10)))
        .with_attachment(Some(AttachmentHandle("a.jpg".into())));

    let value = serde_json::to_value(&reminder).expect("serialize");
    let object = value.as_object().expect("object");
    for field in [
        "id",
        "title",
        "is_done",
        "created_at",
        "completed_at",
        "reminder_at",
        "attachment",
    ] {
        assert!(object.contains_key(field), "missing field {field}");
    }
    assert_eq!(object["attachment"], "a.jpg");

    let decoded: Reminder = serde_json::from_value(value).expect("decode");
    assert_eq!(decoded, reminder);
}

#[test]
fn decoding_rejects_inconsistent_completion() {
    let json = serde_json::json!({
        "id": "9a1b4c55-7d1e-4f8e-9d2b-3f7f2d8a6c10",
        "title": "broken",
        "is_done": true,
        "created_at": "2026-10-19T09:00:00Z",
        "completed_at": null,
    });
    let err = serde_json::from_value::<Reminder>(json).expect_err("mismatch");
    assert!(err.to_string().contains("CompletionMismatch"));
}

#[test]
fn decoding_tolerates_missing_optional_fields() {
    let json = serde_json::json!({
        "id": "9a1b4c55-7d1e-4f8e-9d2b-3f7f2d8a6c10",
        "title": "süt al",
        "is_done": false,
        "created_at": "2026-10-19T09:00:00Z",
    });
    let reminder: Reminder = serde_json::from_value(json).expect("decode");
    assert_eq!(reminder.reminder_at(), None);
    assert_eq!(reminder.attachment(), None);
}
