//! DockerRunner against a fake container runtime
//!
//! A shell script stands in for `docker`: it parses `run [-v host:mount]
//! <image> <command>` and plays the connector side of the working-directory
//! protocol (log lines on stdout, catalog and state written to the mount).

#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use common::{stack, PROJECT};
use conduit_core::application::{SyncAction, SyncOutcome};
use conduit_core::domain::{ConnectorParams, WorkflowId};
use conduit_core::port::{CancelToken, ConnectorRunner, RunnerError};
use conduit_infra_system::workdir;
use conduit_infra_system::{DockerRunner, DockerRunnerConfig};
use serde_json::json;
use tempfile::TempDir;

const FAKE_RUNTIME: &str = r#"#!/bin/sh
[ "$1" = "run" ] || { echo "unsupported: $1"; exit 64; }
shift
host=""
if [ "$1" = "-v" ]; then
  host="${2%%:*}"
  shift 2
fi
image="$1"
command="$2"

case "$image" in
  *source-broken:*) echo "2024-03-01T12:00:00Z ERROR boom"; exit 3 ;;
esac

case "$command" in
  spec)
    echo "2024-03-01T12:00:00Z INFO starting"
    echo '{"type":"SPEC","spec":{"required":["host"]}}'
    ;;
  check)
    echo '{"type":"CONNECTION_STATUS","connectionStatus":{"status":"FAILED","message":"stale"}}'
    case "$image" in
      *source-mute:*) echo '2024-03-01T12:00:00Z INFO {"type":"LOG","message":"done"}' ;;
      *) echo '2024-03-01T12:00:00Z INFO {"type":"CONNECTION_STATUS","connectionStatus":{"status":"SUCCEEDED","message":"ok"}}' ;;
    esac
    ;;
  discover)
    grep -q host "$host/config.json" || { echo "config missing"; exit 2; }
    echo '{"streams":[{"name":"users"}]}' > "$host/streams.json"
    ;;
  sync)
    if grep -q cursor "$host/state.json"; then
      echo '{"cursor":2}' > "$host/state.json"
    else
      echo '{"cursor":1}' > "$host/state.json"
    fi
    echo "sync finished"
    ;;
  *) echo "unknown command $command"; exit 64 ;;
esac
"#;

struct Fixture {
    _dir: TempDir,
    config_dir: std::path::PathBuf,
    runner: Arc<DockerRunner>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("fake-runtime");
    std::fs::write(&script, FAKE_RUNTIME).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config_dir = dir.path().join("config");
    let runner = Arc::new(DockerRunner::new(DockerRunnerConfig {
        runtime: script.to_string_lossy().into_owned(),
        config_dir: config_dir.clone(),
        persistent_dir: None,
        image_namespace: "conduit".to_string(),
        mount_point: "/mnt/config".to_string(),
    }));

    Fixture {
        _dir: dir,
        config_dir,
        runner,
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_check_uses_status_from_last_line() {
    let f = fixture();
    let s = stack(f.runner.clone(), "15-minutes").await;

    let status = s
        .connectors
        .test_connection(ConnectorParams::new("postgres", "v1", r#"{"host":"db"}"#))
        .await
        .unwrap();

    assert_eq!(status.status, "SUCCEEDED");
    assert_eq!(status.message, "ok");
}

#[tokio::test]
async fn test_check_without_status_on_last_line() {
    let f = fixture();

    let err = f
        .runner
        .test_connection(
            &WorkflowId::new("test-connection-mute-1"),
            &ConnectorParams::new("mute", "v1", "{}"),
            CancelToken::never(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::ConnectionStatusNotFound));
}

#[tokio::test]
async fn test_working_directory_holds_config() {
    let f = fixture();
    let execution_id = WorkflowId::new("test-connection-postgres-1709294400");

    f.runner
        .test_connection(
            &execution_id,
            &ConnectorParams::new("postgres", "", r#"{"host":"db"}"#),
            CancelToken::never(),
        )
        .await
        .unwrap();

    let work_dir = f
        .config_dir
        .join(workdir::dir_name(execution_id.as_str()));
    let config = work_dir.join(workdir::CONFIG_FILE);
    assert_eq!(read(&config), r#"{"host":"db"}"#);

    let mode = std::fs::metadata(&config).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    let mode = std::fs::metadata(&work_dir).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

#[tokio::test]
async fn test_concurrent_checks_use_separate_working_directories() {
    let f = fixture();
    let s = stack(f.runner.clone(), "15-minutes").await;

    let params = ConnectorParams::new("postgres", "v1", r#"{"host":"db"}"#);
    let (first, second) = tokio::join!(
        s.connectors.test_connection(params.clone()),
        s.connectors.test_connection(params)
    );
    assert_eq!(first.unwrap().status, "SUCCEEDED");
    assert_eq!(second.unwrap().status, "SUCCEEDED");

    let work_dirs = std::fs::read_dir(&f.config_dir).unwrap().count();
    assert_eq!(work_dirs, 2);
}

#[tokio::test]
async fn test_discover_returns_catalog_file() {
    let f = fixture();
    let s = stack(f.runner.clone(), "15-minutes").await;

    let catalog = s
        .connectors
        .discover_catalog(ConnectorParams::new("postgres", "v1", r#"{"host":"db"}"#))
        .await
        .unwrap();

    assert_eq!(catalog, json!({"streams": [{"name": "users"}]}));
}

#[tokio::test]
async fn test_spec_parses_last_json_line() {
    let f = fixture();
    let s = stack(f.runner.clone(), "15-minutes").await;

    let spec = s.connectors.spec("postgres", "v1").await.unwrap();

    assert_eq!(spec["type"], "SPEC");
    assert_eq!(spec["spec"]["required"][0], "host");
}

#[tokio::test]
async fn test_non_zero_exit_keeps_output() {
    let f = fixture();

    let err = f
        .runner
        .spec(
            &WorkflowId::new("spec-broken-1"),
            "broken",
            "v1",
            CancelToken::never(),
        )
        .await
        .unwrap_err();

    match err {
        RunnerError::ExitStatus { code, output } => {
            assert_eq!(code, 3);
            assert!(output.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_sync_round_trips_state_through_container() {
    let f = fixture();
    let s = stack(f.runner.clone(), "15-minutes").await;

    // First run starts from the empty checkpoint
    let outcome = s
        .coordinator
        .manage_sync(PROJECT, s.job_id, "15-minutes", SyncAction::Trigger)
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::Triggered { .. }));
    s.settle().await;
    assert_eq!(s.job().await.state, r#"{"cursor":1}"#);

    // Second run gets the stored checkpoint in state.json
    s.time.advance(1_000);
    s.coordinator
        .manage_sync(PROJECT, s.job_id, "15-minutes", SyncAction::Trigger)
        .await
        .unwrap();
    s.settle().await;
    assert_eq!(s.job().await.state, r#"{"cursor":2}"#);
}
