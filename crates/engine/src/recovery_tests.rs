// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orc_core::{JobId, RobotId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[test]
fn backoff_caps_at_max_delay() {
    let policy = BackoffPolicy { initial: Duration::from_millis(100), multiplier: 10.0, max_delay: Duration::from_secs(1), jitter: false };
    let delay = policy.delay_for(10);
    assert_eq!(delay, Duration::from_secs(1));
}

#[test]
fn backoff_grows_geometrically_before_the_cap() {
    let policy = BackoffPolicy { initial: Duration::from_millis(100), multiplier: 2.0, max_delay: Duration::from_secs(60), jitter: false };
    assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for(2), Duration::from_millis(400));
}

#[test]
fn jitter_only_ever_increases_the_delay() {
    let policy = BackoffPolicy { initial: Duration::from_millis(100), multiplier: 1.0, max_delay: Duration::from_secs(60), jitter: true };
    let delay = policy.delay_for(0);
    assert!(delay >= Duration::from_millis(100));
    assert!(delay <= Duration::from_millis(125));
}

#[tokio::test]
async fn recover_connection_succeeds_on_first_attempt() {
    let manager = RecoveryManager::new(BackoffPolicy { jitter: false, initial: Duration::from_millis(1), ..Default::default() }, 3);
    let robot_id = RobotId::new();
    let ok = manager.recover_connection(robot_id, || async { true }).await;
    assert!(ok);
    assert_eq!(manager.history().len(), 1);
}

#[tokio::test]
async fn recover_connection_escalates_after_exhausting_retries() {
    let manager = RecoveryManager::new(BackoffPolicy { jitter: false, initial: Duration::from_millis(1), ..Default::default() }, 3);
    let robot_id = RobotId::new();
    let ok = manager.recover_connection(robot_id, || async { false }).await;
    assert!(!ok);
    let history = manager.history();
    assert_eq!(history.len(), 4); // 3 reconnect attempts + 1 escalation
    assert!(matches!(history.last().unwrap(), RecoveryAction::Escalated { .. }));
}

#[tokio::test]
async fn recover_job_succeeds_via_same_robot_retry() {
    let manager = RecoveryManager::new(BackoffPolicy::default(), 3);
    let job_id = JobId::new();
    let ok = manager.recover_job(job_id, || async { true }, || async { None }).await;
    assert!(ok);
}

#[tokio::test]
async fn recover_job_fails_over_when_retry_fails() {
    let manager = RecoveryManager::new(BackoffPolicy::default(), 3);
    let job_id = JobId::new();
    let new_robot = RobotId::new();
    let ok = manager.recover_job(job_id, || async { false }, || async { Some(new_robot) }).await;
    assert!(ok);
    assert!(matches!(manager.history().last().unwrap(), RecoveryAction::JobFailedOver { .. }));
}

#[tokio::test]
async fn recover_job_fails_when_retry_and_failover_both_exhausted() {
    let manager = RecoveryManager::new(BackoffPolicy::default(), 3);
    let job_id = JobId::new();
    let ok = manager.recover_job(job_id, || async { false }, || async { None }).await;
    assert!(!ok);
    assert!(matches!(manager.history().last().unwrap(), RecoveryAction::JobFailed { .. }));
}

#[tokio::test]
async fn recover_robot_crash_reassigns_each_active_job() {
    let manager = RecoveryManager::new(BackoffPolicy::default(), 3);
    let robot_id = RobotId::new();
    let jobs = vec![JobId::new(), JobId::new(), JobId::new()];
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let reassigned = manager
        .recover_robot_crash(robot_id, &jobs, move |_job_id| {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                n != 1 // fail the second job, succeed the others
            }
        })
        .await;

    assert_eq!(reassigned.len(), 2);
    assert!(matches!(manager.history().last().unwrap(), RecoveryAction::RobotCrashed { jobs_reassigned: 2, .. }));
}
