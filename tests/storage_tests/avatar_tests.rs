//! Tests for AvatarStore

use std::fs;

use shelfstate::error::ShelfError;
use shelfstate::storage::AvatarStore;
use tempfile::TempDir;

fn setup_store() -> (TempDir, AvatarStore) {
    let dir = TempDir::new().unwrap();
    let store = AvatarStore::new(&dir.path().join("avatars"), "/static/avatars/");
    (dir, store)
}

#[test]
fn test_save_writes_file_and_returns_url() {
    let (_dir, store) = setup_store();

    let url = store.save(7, "me.PNG", b"\x89PNG....").unwrap();

    assert_eq!(url, "/static/avatars/user_7_avatar.png");
    let written = fs::read(store.dir().join("user_7_avatar.png")).unwrap();
    assert_eq!(written, b"\x89PNG....");
}

#[test]
fn test_save_replaces_previous_avatar() {
    let (_dir, store) = setup_store();

    store.save(7, "a.jpg", b"first").unwrap();
    store.save(7, "b.jpg", b"second").unwrap();

    let written = fs::read(store.dir().join("user_7_avatar.jpg")).unwrap();
    assert_eq!(written, b"second");
}

#[test]
fn test_empty_filename_rejected() {
    let (_dir, store) = setup_store();

    let result = store.save(7, "", b"data");

    match result {
        Err(ShelfError::Validation(msg)) => assert_eq!(msg, "No selected file"),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_empty_data_rejected() {
    let (_dir, store) = setup_store();

    assert!(matches!(
        store.save(7, "a.png", b""),
        Err(ShelfError::Validation(_))
    ));
}

#[test]
fn test_unsupported_extension_rejected() {
    let (_dir, store) = setup_store();

    assert!(store.save(7, "evil.exe", b"MZ").is_err());
    assert!(store.save(7, "noext", b"data").is_err());
    assert!(!store.dir().join("user_7_avatar.exe").exists());
}
