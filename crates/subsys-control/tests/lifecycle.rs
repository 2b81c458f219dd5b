//! Start / health check / stop against well-behaved children.

mod common;

use common::{Harness, MockEndpoint, SERVE};
use std::time::Duration;
use subsys_control::{
    create_subsystem, register_builtin_subsystems, ProcessState, Subsystem,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_health_stop_happy_path() {
    let endpoint = MockEndpoint::start(200).await;
    let harness = Harness::new(SERVE);
    harness.set("url", &endpoint.url);
    let server = harness.server();
    let cancel = CancellationToken::new();

    let started = Instant::now();
    server.start(&cancel).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    let status = server.status();
    assert!(status.running);
    assert!(status.should_run);
    assert_eq!(status.phase, ProcessState::Running);
    assert_eq!(status.check_url.as_deref(), Some(endpoint.url.as_str()));
    assert!(status.pid.is_some());
    assert_eq!(server.stdout().matcher_count(), 0);

    server.health_check(&cancel).await.unwrap();

    server.stop(&cancel).await.unwrap();
    let status = server.status();
    assert!(!status.running);
    assert!(!status.should_run);
    assert_eq!(status.phase, ProcessState::Stopped);
    // Exit code 0 means the TERM trap ran; a kill would report -1.
    assert_eq!(status.last_exit_code, Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_and_stop_are_idempotent() {
    let harness = Harness::new(SERVE);
    let server = harness.server();
    let cancel = CancellationToken::new();

    server.start(&cancel).await.unwrap();
    let pid = server.status().pid;
    server.start(&cancel).await.unwrap();

    assert_eq!(server.status().pid, pid);
    assert_eq!(harness.read("launches").unwrap().lines().count(), 1);

    server.stop(&cancel).await.unwrap();
    server.stop(&cancel).await.unwrap();
    assert!(!server.status().running);
    assert_eq!(harness.read("launches").unwrap().lines().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_child_launch_contract() {
    let harness = Harness::new(SERVE);
    let server = harness.server();
    let cancel = CancellationToken::new();

    server.start(&cancel).await.unwrap();
    server.stop(&cancel).await.unwrap();

    let root = harness.path().canonicalize().unwrap();
    let expected = format!(
        "-config {} {}",
        harness.config.config_file.display(),
        root.display()
    );
    assert_eq!(harness.read("launch_args").unwrap(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_child_output_is_captured() {
    let harness = Harness::new(SERVE);
    let server = harness.server();
    let cancel = CancellationToken::new();

    server.start(&cancel).await.unwrap();
    assert!(common::wait_until(Duration::from_secs(2), || server.stderr().stats().lines_processed >= 1).await);
    assert!(server.stdout().stats().lines_processed >= 1);
    server.stop(&cancel).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_created_through_registry() {
    register_builtin_subsystems().unwrap();
    let harness = Harness::new(SERVE);
    let subsystem = create_subsystem(&harness.config).unwrap();
    let cancel = CancellationToken::new();

    assert_eq!(subsystem.name(), "app-server");
    subsystem.start(&cancel).await.unwrap();
    assert!(subsystem.status().running);
    subsystem.stop(&cancel).await.unwrap();
    assert!(!subsystem.status().running);
}
