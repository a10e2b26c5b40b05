//! Config watcher against the real filesystem.

mod common;

use common::{ConfigDir, BASE_CONFIG};
use ingest_gateway::config::ConfigWatcher;
use std::fs;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const QUIET: Duration = Duration::from_millis(300);

async fn expect_trigger(rx: &mut mpsc::Receiver<()>) {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no trigger within 5s")
        .expect("watcher closed");
}

async fn expect_silence(rx: &mut mpsc::Receiver<()>) {
    assert!(
        timeout(QUIET * 3, rx.recv()).await.is_err(),
        "unexpected trigger"
    );
}

#[tokio::test]
async fn test_burst_yields_one_trigger() {
    let dir = ConfigDir::new(BASE_CONFIG);
    let (_watcher, mut rx) =
        ConfigWatcher::new(Some(dir.main_path().as_path()), Some(dir.overlay_dir().as_path()), QUIET).unwrap();

    for i in 0..5 {
        dir.write_main(&format!("{BASE_CONFIG}\n# edit {i}\n"));
        sleep(Duration::from_millis(20)).await;
    }

    expect_trigger(&mut rx).await;
    expect_silence(&mut rx).await;
}

#[tokio::test]
async fn test_separated_changes_yield_two_triggers() {
    let dir = ConfigDir::new(BASE_CONFIG);
    let (_watcher, mut rx) =
        ConfigWatcher::new(Some(dir.main_path().as_path()), Some(dir.overlay_dir().as_path()), QUIET).unwrap();

    dir.write_main(&format!("{BASE_CONFIG}\n# first\n"));
    expect_trigger(&mut rx).await;

    dir.write_overlay("extra.toml", "");
    expect_trigger(&mut rx).await;
}

#[tokio::test]
async fn test_unrelated_files_are_ignored() {
    let dir = ConfigDir::new(BASE_CONFIG);
    let (_watcher, mut rx) = ConfigWatcher::new(Some(dir.main_path().as_path()), None, QUIET).unwrap();

    fs::write(dir.root().join("notes.txt"), "hello").unwrap();
    expect_silence(&mut rx).await;

    dir.write_main(BASE_CONFIG);
    expect_trigger(&mut rx).await;
}

#[tokio::test]
async fn test_close_ends_triggers() {
    let dir = ConfigDir::new(BASE_CONFIG);
    let (mut watcher, mut rx) =
        ConfigWatcher::new(Some(dir.main_path().as_path()), None, QUIET).unwrap();

    watcher.close();
    watcher.close();
    dir.write_main(BASE_CONFIG);

    let next = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn test_missing_overlay_dir_is_an_error() {
    let dir = ConfigDir::new(BASE_CONFIG);
    let missing = dir.root().join("nope");
    assert!(ConfigWatcher::new(Some(dir.main_path().as_path()), Some(missing.as_path()), QUIET).is_err());
    assert!(ConfigWatcher::new(None, None, QUIET).is_err());
}
