use crate::{PendingStore, SeenStore};
use chirp_core::{ApprovalStatus, ReplyDraft};
use std::env;
use std::fs;
use std::path::PathBuf;

fn temp_state_path(label: &str) -> PathBuf {
    env::temp_dir().join(format!("test_chirp_{}_{}.json", label, uuid::Uuid::new_v4()))
}

fn draft(post_id: &str) -> ReplyDraft {
    ReplyDraft {
        post_id: post_id.to_string(),
        author: "bigvoice".to_string(),
        text: "Retention beats reach.".to_string(),
        source_text: "KOL campaigns everywhere".to_string(),
        url: format!("https://x.com/bigvoice/status/{post_id}"),
        status: ApprovalStatus::Pending,
    }
}

#[test]
fn test_missing_file_loads_empty() {
    let store = SeenStore::load(temp_state_path("missing"));
    assert!(store.is_empty());
    assert!(!store.contains("100"));
}

#[test]
fn test_corrupt_file_loads_empty_without_crashing() {
    let path = temp_state_path("corrupt");
    fs::write(&path, "{not valid json").unwrap();

    let store = SeenStore::load(&path);
    assert!(store.is_empty());

    fs::remove_file(&path).ok();
}

#[test]
fn test_insert_is_idempotent() {
    let mut store = SeenStore::load(temp_state_path("idempotent"));
    store.insert("100");
    store.insert("100");
    assert_eq!(store.len(), 1);
    assert!(store.contains("100"));
    assert!(!store.contains("101"));
}

#[test]
fn test_flush_and_reload_roundtrip() {
    let path = temp_state_path("roundtrip");

    let mut store = SeenStore::load(&path);
    store.insert("100");
    store.insert("200");
    store.flush().unwrap();

    let reloaded = SeenStore::load(&path);
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.contains("100"));
    assert!(reloaded.contains("200"));
    assert!(!reloaded.contains("300"));

    fs::remove_file(&path).ok();
}

#[test]
fn test_flush_leaves_no_tmp_file_behind() {
    let path = temp_state_path("atomic");

    let mut store = SeenStore::load(&path);
    store.insert("100");
    store.flush().unwrap();

    let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
    assert!(!tmp_path.exists());
    assert!(path.exists());

    fs::remove_file(&path).ok();
}

#[test]
fn test_flush_replaces_previous_contents() {
    let path = temp_state_path("replace");

    let mut store = SeenStore::load(&path);
    store.insert("100");
    store.flush().unwrap();

    let mut second = SeenStore::load(&path);
    second.insert("200");
    second.flush().unwrap();

    let reloaded = SeenStore::load(&path);
    assert!(reloaded.contains("100"));
    assert!(reloaded.contains("200"));

    fs::remove_file(&path).ok();
}

#[test]
fn test_pending_queue_roundtrip() {
    let path = temp_state_path("pending");

    let mut pending = PendingStore::load(&path);
    assert!(pending.is_empty());

    pending.push(draft("100"));
    pending.push(draft("100")); // duplicate ignored
    pending.push(draft("200"));
    assert_eq!(pending.len(), 2);
    pending.flush().unwrap();

    let mut reloaded = PendingStore::load(&path);
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.contains("100"));
    assert_eq!(reloaded.first().unwrap().draft.post_id, "100");
    assert_eq!(
        reloaded.first().unwrap().draft.status,
        ApprovalStatus::Approved
    );

    assert!(reloaded.remove("100"));
    assert!(!reloaded.remove("100"));
    assert_eq!(reloaded.len(), 1);

    fs::remove_file(&path).ok();
}

#[test]
fn test_pending_corrupt_file_loads_empty() {
    let path = temp_state_path("pending_corrupt");
    fs::write(&path, "[{\"broken\":").unwrap();

    let pending = PendingStore::load(&path);
    assert!(pending.is_empty());

    fs::remove_file(&path).ok();
}
