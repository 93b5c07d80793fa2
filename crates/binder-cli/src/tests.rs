use std::path::PathBuf;

use binder_core::backend::LocalBackend;
use binder_core::db::{Database, KeyValueStore};
use binder_core::selector::{AuthContext, BackendSelector, StorageMode};
use binder_core::storage::R2Storage;
use binder_core::ErrorKind;
use pretty_assertions::assert_eq;

use crate::cli::ModeArg;
use crate::commands::add::{run_mkdir, run_note, run_upload};
use crate::commands::common::{
    auth_context, cursor_key, format_listing_lines, format_relative_time, format_size,
    guess_mime_type, listing, normalize_content, resolve_data_dir, write_output, Session,
};
use crate::commands::delete::run_rm;
use crate::commands::edit::run_rename;
use crate::commands::export::run_export;
use crate::commands::mode::run_mode;
use crate::commands::navigate::run_cd;
use crate::error::CliError;

async fn memory_store() -> KeyValueStore {
    KeyValueStore::new(Database::open_in_memory().await.unwrap().into_shared())
}

async fn session_with(store: KeyValueStore, auth: AuthContext) -> Session {
    let selector: BackendSelector<R2Storage> =
        BackendSelector::load(store.clone(), LocalBackend::new(store.clone()), None, auth)
            .await
            .unwrap();
    Session::start(store, selector).await.unwrap()
}

fn names(session: &Session) -> Vec<String> {
    listing(session.mode(), session.navigator())
        .items
        .into_iter()
        .map(|item| item.name)
        .collect()
}

fn error_kind(error: &CliError) -> Option<ErrorKind> {
    match error {
        CliError::Notice(notice) => notice.kind,
        CliError::Core(error) => Some(error.kind()),
        _ => None,
    }
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn cursor_keys_are_per_mode() {
    assert_eq!(cursor_key(StorageMode::Local), "cli.cursor.local");
    assert_eq!(cursor_key(StorageMode::Cloud), "cli.cursor.cloud");
}

#[test]
fn blank_user_is_anonymous() {
    assert!(!auth_context(None).unwrap().is_authenticated());
    assert!(!auth_context(Some("  ")).unwrap().is_authenticated());
    let auth = auth_context(Some(" user-1 ")).unwrap();
    assert_eq!(auth.owner.unwrap().as_str(), "user-1");
}

#[test]
fn explicit_data_dir_wins() {
    let dir = PathBuf::from("/tmp/binder-test");
    assert_eq!(resolve_data_dir(Some(dir.clone())).unwrap(), dir);
}

#[test]
fn sizes_are_human_readable() {
    assert_eq!(format_size(0), "0 B");
    assert_eq!(format_size(1023), "1023 B");
    assert_eq!(format_size(1536), "1.5 KiB");
    assert_eq!(format_size(2 * 1024 * 1024), "2.0 MiB");
}

#[test]
fn relative_time_buckets() {
    let now = 10 * 24 * 60 * 60 * 1000;
    assert_eq!(format_relative_time(now - 5_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 60 * 60_000, now), "3h ago");
    assert_eq!(format_relative_time(0, now), "1w ago");
}

#[test]
fn mime_type_follows_extension() {
    assert_eq!(guess_mime_type(&PathBuf::from("scan.png")), "image/png");
    assert_eq!(guess_mime_type(&PathBuf::from("notes.txt")), "text/plain");
    assert_eq!(
        guess_mime_type(&PathBuf::from("mystery")),
        "application/octet-stream"
    );
}

#[test]
fn write_output_defaults_to_given_name() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.zip");
    let written = write_output(Some(&target), "ignored.zip", b"PK").unwrap();
    assert_eq!(written, target);
    assert_eq!(std::fs::read(&target).unwrap(), b"PK");
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_shows_folders_before_files() {
    let mut session = session_with(memory_store().await, AuthContext::anonymous()).await;
    run_note(&mut session, "b-note", &["hello".to_string()])
        .await
        .unwrap();
    run_mkdir(&mut session, "z-folder").await.unwrap();

    let listing = listing(session.mode(), session.navigator());
    assert_eq!(listing.path, "/");
    assert_eq!(listing.mode, "local");
    assert_eq!(names(&session), vec!["z-folder", "b-note"]);

    let lines = format_listing_lines(&listing);
    assert!(lines[0].contains("folder"));
    assert!(lines[0].ends_with("z-folder/"));
    assert!(lines[1].contains("note"));
    assert!(lines[1].contains("5 B"));
}

#[tokio::test(flavor = "multi_thread")]
async fn cursor_survives_between_sessions() {
    let store = memory_store().await;
    let mut session = session_with(store.clone(), AuthContext::anonymous()).await;
    run_mkdir(&mut session, "projects").await.unwrap();
    run_cd(&mut session, "projects").await.unwrap();
    run_mkdir(&mut session, "rust").await.unwrap();
    run_cd(&mut session, "rust").await.unwrap();
    session.save_cursor().await.unwrap();

    let session = session_with(store, AuthContext::anonymous()).await;
    assert_eq!(session.navigator().display_path(), "/projects/rust");
}

#[tokio::test(flavor = "multi_thread")]
async fn cd_walks_segments() {
    let mut session = session_with(memory_store().await, AuthContext::anonymous()).await;
    run_mkdir(&mut session, "a").await.unwrap();
    run_cd(&mut session, "a").await.unwrap();
    run_mkdir(&mut session, "b").await.unwrap();

    run_cd(&mut session, "/a/b").await.unwrap();
    assert_eq!(session.navigator().display_path(), "/a/b");
    run_cd(&mut session, "../..").await.unwrap();
    assert_eq!(session.navigator().display_path(), "/");

    let error = run_cd(&mut session, "missing").await.unwrap_err();
    assert_eq!(error_kind(&error), Some(ErrorKind::NotFound));
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_cursor_opens_root() {
    let store = memory_store().await;
    store
        .set(&cursor_key(StorageMode::Local), "deleted-folder")
        .await
        .unwrap();

    let session = session_with(store, AuthContext::anonymous()).await;
    session.ensure_ready().unwrap();
    assert_eq!(session.navigator().display_path(), "/");
}

#[tokio::test(flavor = "multi_thread")]
async fn rename_and_remove_by_name() {
    let mut session = session_with(memory_store().await, AuthContext::anonymous()).await;
    run_mkdir(&mut session, "drafts").await.unwrap();

    run_rename(&mut session, "drafts", "final").await.unwrap();
    assert_eq!(names(&session), vec!["final"]);

    let error = run_rename(&mut session, "final", "a/b").await.unwrap_err();
    assert_eq!(error_kind(&error), Some(ErrorKind::Validation));

    run_rm(&mut session, "final").await.unwrap();
    assert!(names(&session).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_reports_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let small = dir.path().join("small.txt");
    let large = dir.path().join("large.bin");
    std::fs::write(&small, b"tiny").unwrap();
    std::fs::write(&large, vec![0_u8; 2 * 1024 * 1024]).unwrap();

    let mut session = session_with(memory_store().await, AuthContext::anonymous()).await;
    let error = run_upload(&mut session, &[small, large]).await.unwrap_err();

    assert_eq!(error_kind(&error), Some(ErrorKind::QuotaExceeded));
    assert_eq!(names(&session), vec!["small.txt"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn export_requires_cloud() {
    let mut session = session_with(memory_store().await, AuthContext::anonymous()).await;
    run_mkdir(&mut session, "docs").await.unwrap();

    let error = run_export(&mut session, "docs", None).await.unwrap_err();
    assert_eq!(error_kind(&error), Some(ErrorKind::FeatureUnavailable));
}

#[tokio::test(flavor = "multi_thread")]
async fn cloud_mode_without_remote_blocks_commands() {
    let store = memory_store().await;
    let mut session = session_with(store.clone(), AuthContext::anonymous()).await;

    let error = run_mode(&mut session, Some(ModeArg::Cloud)).await.unwrap_err();
    assert_eq!(error_kind(&error), Some(ErrorKind::FeatureUnavailable));

    let mut session = session_with(store, AuthContext::anonymous()).await;
    assert_eq!(session.mode(), StorageMode::Cloud);
    let error = run_mkdir(&mut session, "x").await.unwrap_err();
    assert_eq!(error_kind(&error), Some(ErrorKind::FeatureUnavailable));

    run_mode(&mut session, Some(ModeArg::Local)).await.unwrap();
    run_mkdir(&mut session, "x").await.unwrap();
    assert_eq!(names(&session), vec!["x"]);
}
