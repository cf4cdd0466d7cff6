// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orc_core::FakeClock;

#[test]
fn not_duplicate_before_any_record() {
    let clock = FakeClock::new();
    let dedup = JobDeduplicator::new(clock, Duration::from_secs(300));
    let wf = WorkflowId::new();
    assert!(!dedup.is_duplicate(&wf, None, &[]));
}

#[test]
fn duplicate_within_window() {
    let clock = FakeClock::new();
    let dedup = JobDeduplicator::new(clock.clone(), Duration::from_secs(300));
    let wf = WorkflowId::new();
    let params = vec![("a".to_string(), "1".to_string())];
    dedup.record(&wf, None, &params);

    clock.advance(Duration::from_secs(60));
    assert!(dedup.is_duplicate(&wf, None, &params));
}

#[test]
fn not_duplicate_after_window_elapses() {
    let clock = FakeClock::new();
    let dedup = JobDeduplicator::new(clock.clone(), Duration::from_secs(300));
    let wf = WorkflowId::new();
    let params = vec![("a".to_string(), "1".to_string())];
    dedup.record(&wf, None, &params);

    clock.advance(Duration::from_secs(301));
    assert!(!dedup.is_duplicate(&wf, None, &params));
}

#[test]
fn param_order_does_not_affect_fingerprint() {
    let clock = FakeClock::new();
    let dedup = JobDeduplicator::new(clock, Duration::from_secs(300));
    let wf = WorkflowId::new();
    let a = vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())];
    let b = vec![("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())];
    dedup.record(&wf, None, &a);
    assert!(dedup.is_duplicate(&wf, None, &b));
}

#[test]
fn different_robot_target_is_not_a_duplicate() {
    let clock = FakeClock::new();
    let dedup = JobDeduplicator::new(clock, Duration::from_secs(300));
    let wf = WorkflowId::new();
    let r1 = RobotId::new();
    let r2 = RobotId::new();
    dedup.record(&wf, Some(&r1), &[]);
    assert!(!dedup.is_duplicate(&wf, Some(&r2), &[]));
}
