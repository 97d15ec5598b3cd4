#![cfg(unix)]

use mta_analyzer::{ProcessError, ProcessRunner, ProcessState, ShutdownCallback};
use mta_test_utils::fake_analyzer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn counting_hook() -> (Arc<AtomicUsize>, ShutdownCallback) {
    let calls = Arc::new(AtomicUsize::new(0));
    let hook = Arc::clone(&calls);
    (
        calls,
        Box::new(move || {
            hook.fetch_add(1, Ordering::SeqCst);
        }),
    )
}

#[tokio::test]
async fn test_silent_process_is_killed_on_startup_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("still-alive");
    let script = fake_analyzer(
        dir.path(),
        &format!("sleep 0.05\ntouch '{}'\necho late", marker.display()),
    );

    let (calls, hook) = counting_hook();
    let result = ProcessRunner::new(&script, Vec::<String>::new())
        .with_startup_timeout(Duration::from_millis(10))
        .run(hook)
        .await;

    assert!(matches!(result, Err(ProcessError::StartupTimeout(limit)) if limit == Duration::from_millis(10)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Long enough for the script to have reached `touch` had it survived
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!marker.exists(), "analyzer kept running after timeout");
}

#[tokio::test]
async fn test_arguments_and_working_dir_reach_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_analyzer(dir.path(), "echo \"$PWD|$*\"\nsleep 5");

    let (_calls, hook) = counting_hook();
    let started = ProcessRunner::new(&script, ["analyze", "--input", "/app"])
        .with_working_dir(dir.path())
        .with_startup_timeout(Duration::from_secs(5))
        .run(hook)
        .await
        .unwrap();

    let (cwd, args) = started.first_line.split_once('|').unwrap();
    assert_eq!(
        std::fs::canonicalize(cwd).unwrap(),
        std::fs::canonicalize(dir.path()).unwrap()
    );
    assert_eq!(args, "analyze --input /app");
    started.handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_twice_invokes_callback_once() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_analyzer(dir.path(), "echo ready\nsleep 5");

    let (calls, hook) = counting_hook();
    let started = ProcessRunner::new(&script, Vec::<String>::new())
        .with_startup_timeout(Duration::from_secs(5))
        .run(hook)
        .await
        .unwrap();

    let handle = started.handle.clone();
    let (first, second) = tokio::join!(started.handle.shutdown(), handle.shutdown());
    assert!(first || second);
    assert!(!handle.shutdown().await);
    assert_eq!(handle.state(), ProcessState::Killed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_crash_after_start_fires_callback() {
    let dir = tempfile::tempdir().unwrap();
    let script = fake_analyzer(dir.path(), "echo ready\necho working\nexit 7");

    let (calls, hook) = counting_hook();
    let mut started = ProcessRunner::new(&script, Vec::<String>::new())
        .with_startup_timeout(Duration::from_secs(5))
        .run(hook)
        .await
        .unwrap();

    assert_eq!(started.lines.recv().await.as_deref(), Some("working"));
    assert_eq!(started.lines.recv().await, None);
    assert_eq!(started.handle.wait().await, ProcessState::Exited(Some(7)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_abandoned_startup_kills_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("still-alive");
    let script = fake_analyzer(
        dir.path(),
        &format!("sleep 0.3\ntouch '{}'\necho late", marker.display()),
    );

    let (calls, hook) = counting_hook();
    let runner = ProcessRunner::new(&script, Vec::<String>::new())
        .with_startup_timeout(Duration::from_secs(5));
    let abandoned = tokio::time::timeout(Duration::from_millis(50), runner.run(hook)).await;

    assert!(abandoned.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!marker.exists(), "analyzer kept running after startup was dropped");
}
