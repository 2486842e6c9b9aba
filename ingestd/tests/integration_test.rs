//! Integration tests for ingestd
//!
//! These tests drive the public API end to end: submission, the drain loop,
//! status aggregation, the TCP adapter, and the binary itself.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_cmd::Command;
use async_trait::async_trait;
use predicates::prelude::*;
use tempfile::TempDir;
use tokio::time::Instant;

use ingestd::domain::{AggregateStatus, BatchStatus, Priority, RequestId};
use ingestd::ipc::{self, IngestClient};
use ingestd::scheduler::{DrainOutcome, ItemWorker, ProcessingError, Scheduler, SchedulerConfig};

fn config(rate_limit_ms: u64) -> SchedulerConfig {
    SchedulerConfig {
        rate_limit_ms,
        item_delay_ms: 0,
        shutdown_timeout_ms: 5_000,
        ..Default::default()
    }
}

/// Records the time each item was processed
#[derive(Default)]
struct RecordingWorker {
    seen: Mutex<Vec<(i64, Instant)>>,
    fail_on: Option<i64>,
}

#[async_trait]
impl ItemWorker for RecordingWorker {
    async fn process_item(&self, id: i64) -> Result<(), ProcessingError> {
        self.seen.lock().unwrap().push((id, Instant::now()));
        if self.fail_on == Some(id) {
            return Err(ProcessingError::Worker {
                id,
                message: "downstream rejected item".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Scheduler Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_submit_drain_status_end_to_end() {
    let scheduler = Arc::new(Scheduler::new(config(100)));
    let id = scheduler.submit(vec![1, 2, 3, 4, 5], Priority::Medium).await.unwrap();

    let status = scheduler.get_status(&id).await.unwrap();
    assert_eq!(status.status, AggregateStatus::NotStarted);
    assert_eq!(status.batches.len(), 2);

    let drain = scheduler.clone().spawn();
    let status = scheduler.wait_for_request(&id, Duration::from_millis(10)).await.unwrap();
    drain.shutdown().await.unwrap();

    assert_eq!(status.status, AggregateStatus::Done);
    assert!(status.batches.iter().all(|b| b.status == BatchStatus::Done));
    let ids: Vec<i64> = status.batches.iter().flat_map(|b| b.ids.clone()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    let stats = scheduler.stats().await;
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.total_batches, 2);
    assert_eq!(stats.total_completed, 2);
    assert_eq!(stats.total_failed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_high_priority_overtakes_earlier_low() {
    let scheduler = Scheduler::new(config(1_000));

    let low = scheduler.submit(vec![1, 2, 3, 4, 5], Priority::Low).await.unwrap();
    tokio::time::advance(Duration::from_millis(10)).await;
    let high = scheduler.submit(vec![6, 7, 8, 9], Priority::High).await.unwrap();

    let mut order: Vec<RequestId> = Vec::new();
    while order.len() < 4 {
        match scheduler.drain_once().await {
            DrainOutcome::Dispatched { request_id, .. } => order.push(request_id),
            DrainOutcome::RateLimited { retry_after } => tokio::time::advance(retry_after).await,
            DrainOutcome::Empty => break,
        }
    }

    assert_eq!(order, vec![high.clone(), high, low.clone(), low]);
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_respect_rate_limit() {
    let worker = Arc::new(RecordingWorker::default());
    let scheduler = Arc::new(Scheduler::with_worker(config(1_000), worker.clone()));

    let id = scheduler.submit((1..=9).collect(), Priority::High).await.unwrap();
    let drain = scheduler.clone().spawn();
    scheduler.wait_for_request(&id, Duration::from_millis(50)).await.unwrap();
    drain.shutdown().await.unwrap();

    let seen = worker.seen.lock().unwrap().clone();
    let batch_starts: Vec<Instant> = seen.iter().filter(|(id, _)| id % 3 == 1).map(|(_, at)| *at).collect();
    assert_eq!(batch_starts.len(), 3);
    for pair in batch_starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(1_000));
    }
}

#[tokio::test(start_paused = true)]
async fn test_failing_item_fails_request() {
    let worker = Arc::new(RecordingWorker {
        fail_on: Some(5),
        ..Default::default()
    });
    let scheduler = Arc::new(Scheduler::with_worker(config(100), worker.clone()));

    let id = scheduler.submit(vec![1, 2, 3, 4, 5, 6, 7], Priority::Medium).await.unwrap();
    let drain = scheduler.clone().spawn();
    let status = scheduler.wait_for_request(&id, Duration::from_millis(10)).await.unwrap();
    drain.shutdown().await.unwrap();

    assert_eq!(status.status, AggregateStatus::Failed);
    let statuses: Vec<BatchStatus> = status.batches.iter().map(|b| b.status).collect();
    assert_eq!(statuses, vec![BatchStatus::Done, BatchStatus::Failed, BatchStatus::Done]);

    // Item 6 is skipped once its batch fails
    let ids: Vec<i64> = worker.seen.lock().unwrap().iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 7]);
}

#[tokio::test]
async fn test_invalid_submission_leaves_no_trace() {
    let scheduler = Scheduler::new(config(100));

    assert!(scheduler.submit(vec![1, 0], Priority::High).await.is_err());
    assert!(scheduler.submit(vec![1_000_000_008], Priority::High).await.is_err());
    assert!(scheduler.submit(vec![], Priority::High).await.is_err());

    assert_eq!(scheduler.stats().await.total_requests, 0);
    assert_eq!(scheduler.drain_once().await, DrainOutcome::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_leaves_queued_batches_untouched() {
    let scheduler = Arc::new(Scheduler::new(SchedulerConfig {
        poll_interval_ms: Some(10),
        ..config(60_000)
    }));
    let drain = scheduler.clone().spawn();

    let id = scheduler.submit(vec![1, 2, 3, 4, 5, 6], Priority::Low).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drain.shutdown().await.unwrap();

    let status = scheduler.get_status(&id).await.unwrap();
    assert_eq!(status.status, AggregateStatus::InProgress);
    let statuses: Vec<BatchStatus> = status.batches.iter().map(|b| b.status).collect();
    assert_eq!(statuses, vec![BatchStatus::Done, BatchStatus::NotStarted]);
}

// =============================================================================
// TCP Adapter Tests
// =============================================================================

#[tokio::test]
async fn test_tcp_ingest_until_done() {
    let scheduler = Arc::new(Scheduler::new(config(20)));
    let drain = scheduler.clone().spawn();

    let listener = ipc::create_listener("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (listener_tx, listener_rx) = tokio::sync::mpsc::channel(1);
    let server = tokio::spawn(ipc::serve(listener, scheduler.clone(), listener_rx));

    let client = IngestClient::new(addr);
    let id = client.ingest(vec![10, 20, 30, 40], Priority::High).await.unwrap();

    let status = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = client.status(&id).await.unwrap();
            if status.status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("request should finish");

    assert_eq!(status.status, AggregateStatus::Done);
    assert_eq!(client.stats().await.unwrap().stats.total_completed, 2);

    listener_tx.send(()).await.unwrap();
    server.await.unwrap().unwrap();
    drain.shutdown().await.unwrap();
}

// =============================================================================
// CLI Tests
// =============================================================================

fn ingestd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ingestd").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("INGESTD_RATE_LIMIT_MS", "10")
        .env("INGESTD_ITEM_DELAY_MS", "0");
    cmd
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    ingestd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("submit"));
}

#[test]
fn test_cli_run_completes() {
    let home = TempDir::new().unwrap();
    ingestd(&home)
        .args(["run", "-p", "high", "1", "2", "3", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingestion id"))
        .stdout(predicate::str::contains("done"));
}

#[test]
fn test_cli_run_prints_json_status() {
    let home = TempDir::new().unwrap();
    let output = ingestd(&home)
        .args(["run", "--format", "json", "5", "6"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let status: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(status["status"], "done");
    assert_eq!(status["batches"][0]["ids"], serde_json::json!([5, 6]));
}

#[test]
fn test_cli_run_rejects_out_of_range_id() {
    let home = TempDir::new().unwrap();
    ingestd(&home)
        .args(["run", "0", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of valid range"));
}

#[test]
fn test_cli_reads_local_config() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join(".ingestd.yml"), "scheduler:\n  batch-size: 0\n").unwrap();
    ingestd(&home)
        .args(["run", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch-size"));
}
