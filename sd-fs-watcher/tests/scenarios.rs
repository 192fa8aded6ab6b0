//! End-to-end scenario tests driven by the scripted [`MockRawBackend`],
//! covering the numbered scenarios in `spec.md` §8. These exercise the
//! public `Watcher` API exactly as a real consumer would, with a raw
//! backend that a test script drives instead of the OS.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sd_fs_watcher::backend::mock::MockRawBackend;
use sd_fs_watcher::backend::{Capabilities, RawEvent, RawFlags};
use sd_fs_watcher::probe::StdFsProbe;
use sd_fs_watcher::{Event, Op, WatchError, WatchOptions, Watcher};

/// Capabilities modeling an inotify/Windows-style backend: cookie-keyed
/// renames, explicit recursion required, close-write commits writes.
fn cookie_caps() -> Capabilities {
    Capabilities {
        supports_cookies: true,
        implicit_recursion: false,
        emits_close_write: true,
        has_is_dir_flag: true,
    }
}

/// Capabilities modeling an FSEvents-style backend: no cookies, no
/// close-write notification, Create is final immediately.
fn fsevents_caps() -> Capabilities {
    Capabilities {
        supports_cookies: false,
        implicit_recursion: true,
        emits_close_write: false,
        has_is_dir_flag: true,
    }
}

async fn recv_with_timeout(watcher: &mut Watcher) -> Option<Event> {
    tokio::time::timeout(Duration::from_millis(500), watcher.next_event()).await.expect("timed out waiting for event")
}

async fn recv_error_with_timeout(watcher: &mut Watcher) -> Option<WatchError> {
    tokio::time::timeout(Duration::from_millis(500), watcher.next_error()).await.expect("timed out waiting for error")
}

#[tokio::test]
async fn scenario_1_create_file() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(cookie_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let file = dir.path().join("a.txt");
    std::fs::write(&file, b"hi").unwrap();
    tx.send(RawEvent::new(file.clone(), RawFlags::CREATED)).unwrap();
    tx.send(RawEvent::new(file.clone(), RawFlags::CLOSE_WRITE)).unwrap();

    let event = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(event, Event::create(file, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn scenario_2_create_nested_directory_then_file() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(cookie_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let subdir = dir.path().join("d");
    std::fs::create_dir(&subdir).unwrap();
    tx.send(RawEvent::new(subdir.clone(), RawFlags::CREATED | RawFlags::IS_DIR)).unwrap();

    let first = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(first, Event::create(&subdir, true));

    let file = subdir.join("b.txt");
    std::fs::write(&file, b"hi").unwrap();
    tx.send(RawEvent::new(file.clone(), RawFlags::CREATED)).unwrap();
    tx.send(RawEvent::new(file.clone(), RawFlags::CLOSE_WRITE)).unwrap();

    let second = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(second, Event::create(file, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn scenario_3_rename_inside_watched_root() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(cookie_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    std::fs::write(&a, b"hi").unwrap();
    tx.send(RawEvent::new(a.clone(), RawFlags::CREATED)).unwrap();
    tx.send(RawEvent::new(a.clone(), RawFlags::CLOSE_WRITE)).unwrap();
    assert_eq!(recv_with_timeout(&mut watcher).await.unwrap(), Event::create(&a, false));

    std::fs::rename(&a, &b).unwrap();
    tx.send(RawEvent::new(a.clone(), RawFlags::RENAMED_FROM).with_cookie(1)).unwrap();
    tx.send(RawEvent::new(b.clone(), RawFlags::RENAMED_TO).with_cookie(1)).unwrap();

    let renamed = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(renamed, Event::rename(a, b, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn scenario_4_move_in_from_outside() {
    let outside = tempfile::tempdir().unwrap();
    let watched = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(cookie_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![watched.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let src = outside.path().join("x");
    std::fs::write(&src, b"hi").unwrap();
    let dst = watched.path().join("x");
    std::fs::rename(&src, &dst).unwrap();

    // Only the `to` half lands inside the watched tree; no matching `from`
    // was ever armed for this cookie.
    tx.send(RawEvent::new(dst.clone(), RawFlags::RENAMED_TO).with_cookie(55)).unwrap();

    let event = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(event, Event::create(dst, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn scenario_5_move_out_to_outside() {
    let outside = tempfile::tempdir().unwrap();
    let watched = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(cookie_caps());
    let tx = backend.sender();

    let options = WatchOptions::default().with_rename_deadline(Duration::from_millis(50));
    let mut watcher = Watcher::with_backend_and_probe(vec![watched.path().to_path_buf()], options, Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let src = watched.path().join("x");
    std::fs::write(&src, b"hi").unwrap();
    let dst = outside.path().join("x");
    std::fs::rename(&src, &dst).unwrap();

    // Only the `from` half lands inside the watched tree; the `to` never
    // arrives because it's outside every watched root.
    tx.send(RawEvent::new(src.clone(), RawFlags::RENAMED_FROM).with_cookie(77)).unwrap();

    let event = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(event, Event::remove(src, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn scenario_6_watched_root_removed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let backend = MockRawBackend::new(cookie_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![root.clone()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    tx.send(RawEvent::new(root.clone(), RawFlags::REMOVED)).unwrap();

    let err = recv_error_with_timeout(&mut watcher).await.unwrap();
    assert!(matches!(err, WatchError::WatchedRootRemoved(p) if p == root));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn cookieless_rename_pairs_via_fifo() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(fsevents_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    std::fs::write(&a, b"hi").unwrap();
    std::fs::rename(&a, &b).unwrap();

    tx.send(RawEvent::new(a.clone(), RawFlags::RENAMED)).unwrap();
    tx.send(RawEvent::new(b.clone(), RawFlags::RENAMED)).unwrap();

    let event = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(event, Event::rename(a, b, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn cookieless_rename_idle_timeout_emits_remove_for_gone_path() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(fsevents_caps());
    let tx = backend.sender();

    let options = WatchOptions::default().with_cookieless_rename_idle(Duration::from_millis(30));
    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], options, Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let gone = dir.path().join("gone.txt");
    // Never actually created on disk and never paired: looks like it left
    // the watched set.
    tx.send(RawEvent::new(gone.clone(), RawFlags::RENAMED)).unwrap();

    let event = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(event, Event::remove(gone, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn fsevents_style_create_has_no_close_write_step() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(fsevents_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let file = dir.path().join("a.txt");
    std::fs::write(&file, b"hi").unwrap();
    tx.send(RawEvent::new(file.clone(), RawFlags::CREATED)).unwrap();

    let event = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(event, Event::create(file, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn modify_without_inode_meta_mod_is_dropped_on_fsevents() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(fsevents_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let file = dir.path().join("a.txt");
    std::fs::write(&file, b"hi").unwrap();
    tx.send(RawEvent::new(file.clone(), RawFlags::CREATED)).unwrap();
    assert_eq!(recv_with_timeout(&mut watcher).await.unwrap(), Event::create(&file, false));

    // Bare modify, no INODE_META_MOD: must be dropped, not reported as Write.
    tx.send(RawEvent::new(file.clone(), RawFlags::MODIFIED)).unwrap();
    // Follow it with a real commit so the test doesn't hang forever waiting
    // for an event that should never come.
    tx.send(RawEvent::new(file.clone(), RawFlags::MODIFIED | RawFlags::INODE_META_MOD)).unwrap();

    let event = recv_with_timeout(&mut watcher).await.unwrap();
    assert_eq!(event, Event::write(file, false));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn overflow_surfaces_as_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(cookie_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    tx.send(RawEvent::overflow()).unwrap();

    let err = recv_error_with_timeout(&mut watcher).await.unwrap();
    assert!(matches!(err, WatchError::Transport(_)));

    drop(tx);
    watcher.close().await;
}

#[tokio::test]
async fn stress_many_entries_each_produce_exactly_one_event() {
    const N: usize = 150;
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRawBackend::new(cookie_caps());
    let tx = backend.sender();

    let mut watcher = Watcher::with_backend_and_probe(vec![dir.path().to_path_buf()], WatchOptions::default(), Box::new(backend), Arc::new(StdFsProbe)).unwrap();

    let files: Vec<PathBuf> = (0..N).map(|i| dir.path().join(format!("f{i}.txt"))).collect();
    for file in &files {
        std::fs::write(file, b"x").unwrap();
        tx.send(RawEvent::new(file.clone(), RawFlags::CREATED)).unwrap();
        tx.send(RawEvent::new(file.clone(), RawFlags::CLOSE_WRITE)).unwrap();
    }
    for file in &files {
        std::fs::remove_file(file).unwrap();
        tx.send(RawEvent::new(file.clone(), RawFlags::REMOVED)).unwrap();
    }

    let mut creates = 0usize;
    let mut removes = 0usize;
    for _ in 0..(N * 2) {
        match recv_with_timeout(&mut watcher).await.unwrap().op {
            Op::Create => creates += 1,
            Op::Remove => removes += 1,
            other => panic!("unexpected op {other:?}"),
        }
    }
    assert_eq!(creates, N);
    assert_eq!(removes, N);

    drop(tx);
    watcher.close().await;
}
