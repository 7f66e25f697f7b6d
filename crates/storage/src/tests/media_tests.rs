use super::*;

#[tokio::test]
async fn stores_fetches_and_deletes_blobs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let media = FsMediaStore::new(dir.path().join("media"));

    let handle = media.store(b"jpeg-bytes").await.expect("store");
    assert!(handle.as_str().ends_with(".jpg"));
    assert_eq!(media.fetch(&handle).await.expect("fetch"), b"jpeg-bytes");

    media.delete(&handle).await.expect("delete");
    assert!(media.fetch(&handle).await.is_err());
}

#[tokio::test]
async fn deleting_a_missing_blob_is_not_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let media = FsMediaStore::new(dir.path());

    media
        .delete(&AttachmentHandle("gone.jpg".into()))
        .await
        .expect("idempotent delete");
}

#[tokio::test]
async fn rejects_handles_that_escape_the_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let media = FsMediaStore::new(dir.path());

    for name in ["../secret.jpg", "nested/file.jpg", "..", ""] {
        let handle = AttachmentHandle(name.into());
        assert!(media.fetch(&handle).await.is_err(), "handle {name:?}");
        assert!(media.delete(&handle).await.is_err(), "handle {name:?}");
    }
}
