//! Supervisor integration tests against scripted shell workers

#![cfg(unix)]

use g4a_transport::{
    ReadOptions, TransportError, WorkerConfig, WorkerState, WorkerSupervisor, WorkerTransport,
};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Mimics the chat executable: prompt on start, colourised echo, prompt again
const ECHO_WORKER: &str = r#"printf '> '
while IFS= read -r line; do
    printf '\033[32m%s\033[0m\n> ' "$line"
done
"#;

const STUBBORN_WORKER: &str = r#"trap '' INT
printf 'ready\n'
while :; do sleep 1; done
"#;

fn fast_read() -> ReadOptions {
    ReadOptions::default()
        .with_idle_timeout(Duration::from_millis(300))
        .with_max_retries(2)
}

fn script_worker(dir: &TempDir, body: &str) -> WorkerConfig {
    let path = dir.path().join("worker.sh");
    std::fs::write(&path, body).unwrap();
    WorkerConfig::new("/bin/sh")
        .with_args([path.display().to_string()])
        .with_working_dir(dir.path())
}

fn write_file(path: &Path, contents: &str, mode: u32) {
    std::fs::write(path, contents).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
}

#[tokio::test]
async fn test_echo_exchange_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerSupervisor::new(script_worker(&dir, ECHO_WORKER));

    worker.start().await.unwrap();
    assert_eq!(worker.state(), WorkerState::Running);

    // The greeting is only a prompt, so every cycle comes back empty
    let greeting = worker.read_response(&fast_read()).await.unwrap();
    assert_eq!(greeting, "");

    let reply = worker.exchange("hello worker", &fast_read()).await.unwrap();
    assert_eq!(reply, "hello worker");

    let reply = worker.exchange("second line", &fast_read()).await.unwrap();
    assert_eq!(reply, "second line");

    worker.stop(Duration::from_secs(5)).await.unwrap();
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn test_start_twice_keeps_one_worker() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerSupervisor::new(script_worker(&dir, "exec cat\n"));

    worker.start().await.unwrap();
    let first = worker.pid();
    assert!(first.is_some());

    worker.start().await.unwrap();
    assert_eq!(worker.pid(), first);

    worker.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_graceful_stop_on_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerSupervisor::new(script_worker(&dir, "exec cat\n"));
    worker.start().await.unwrap();

    let started = Instant::now();
    worker.stop(Duration::from_secs(5)).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(worker.state(), WorkerState::Stopped);
    assert!(worker.pid().is_none());
}

#[tokio::test]
async fn test_stop_force_kills_worker_ignoring_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerSupervisor::new(script_worker(&dir, STUBBORN_WORKER));
    worker.start().await.unwrap();

    // Wait until the trap is installed
    let ready = worker.read_response(&fast_read()).await.unwrap();
    assert_eq!(ready, "ready");

    let force_kill_timeout = Duration::from_millis(500);
    let started = Instant::now();
    worker.stop(force_kill_timeout).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= force_kill_timeout, "{elapsed:?}");
    assert!(elapsed < force_kill_timeout + Duration::from_secs(2), "{elapsed:?}");
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerSupervisor::new(script_worker(&dir, "exec cat\n"));
    worker.start().await.unwrap();

    worker.stop(Duration::from_secs(5)).await.unwrap();
    let started = Instant::now();
    worker.stop(Duration::from_secs(5)).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn test_restart_after_stop() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerSupervisor::new(script_worker(&dir, ECHO_WORKER));

    worker.start().await.unwrap();
    worker.stop(Duration::from_secs(5)).await.unwrap();
    worker.start().await.unwrap();

    worker.read_response(&fast_read()).await.unwrap();
    let reply = worker.exchange("again", &fast_read()).await.unwrap();
    assert_eq!(reply, "again");

    worker.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_missing_binary_is_not_executable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpt4all-lora-quantized-linux-x86");
    let mut worker = WorkerSupervisor::new(WorkerConfig::new(&path));

    let err = worker.start().await.unwrap_err();
    assert!(matches!(err, TransportError::BinaryNotExecutable { .. }));
    assert!(err.to_string().contains("gpt4all-lora-quantized-linux-x86"));
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn test_binary_without_exec_bit_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker");
    write_file(&path, "#!/bin/sh\nexit 0\n", 0o644);

    let mut worker = WorkerSupervisor::new(WorkerConfig::new(&path));
    match worker.start().await {
        Err(TransportError::BinaryNotExecutable { path: got, .. }) => assert_eq!(got, path),
        other => panic!("expected BinaryNotExecutable, got {other:?}"),
    }
    assert!(worker.pid().is_none());
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker");
    write_file(&path, "#!/nonexistent/interpreter\n", 0o755);

    let mut worker = WorkerSupervisor::new(WorkerConfig::new(&path));
    match worker.start().await {
        Err(TransportError::ProcessSpawnFailed { path: got, .. }) => assert_eq!(got, path),
        other => panic!("expected ProcessSpawnFailed, got {other:?}"),
    }
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn test_worker_exit_is_observed() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerSupervisor::new(script_worker(&dir, "printf 'bye\\n'\nexit 3\n"));
    worker.start().await.unwrap();

    let last = worker.read_response(&fast_read()).await.unwrap();
    assert_eq!(last, "bye");

    let deadline = Instant::now() + Duration::from_secs(5);
    while worker.state() != WorkerState::Stopped {
        assert!(Instant::now() < deadline, "worker exit never observed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(worker.pid().is_none());
    assert!(worker.send("anyone there?").await.unwrap_err().is_not_running());
}

#[tokio::test]
async fn test_worker_inherits_extra_env() {
    let dir = tempfile::tempdir().unwrap();
    let config = script_worker(&dir, "printf '%s\\n' \"$G4A_TEST_MARKER\"\nexec cat\n")
        .with_env("G4A_TEST_MARKER", "from-host");
    let mut worker = WorkerSupervisor::new(config);
    worker.start().await.unwrap();

    let marker = worker.read_response(&fast_read()).await.unwrap();
    assert_eq!(marker, "from-host");

    worker.stop(Duration::from_secs(5)).await.unwrap();
}
