// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orc_core::FakeClock;

#[test]
fn not_timed_out_before_deadline() {
    let clock = FakeClock::new();
    let mgr = JobTimeoutManager::new(clock.clone(), Duration::from_secs(60));
    let job_id = JobId::new();
    mgr.start_tracking(job_id, None);
    clock.advance(Duration::from_secs(30));
    assert!(mgr.get_timed_out().is_empty());
}

#[test]
fn timed_out_after_deadline() {
    let clock = FakeClock::new();
    let mgr = JobTimeoutManager::new(clock.clone(), Duration::from_secs(2));
    let job_id = JobId::new();
    mgr.start_tracking(job_id, None);
    clock.advance(Duration::from_secs(3));
    assert_eq!(mgr.get_timed_out(), vec![job_id]);
}

#[test]
fn stop_tracking_removes_job() {
    let clock = FakeClock::new();
    let mgr = JobTimeoutManager::new(clock.clone(), Duration::from_secs(2));
    let job_id = JobId::new();
    mgr.start_tracking(job_id, None);
    mgr.stop_tracking(job_id);
    clock.advance(Duration::from_secs(10));
    assert!(mgr.get_timed_out().is_empty());
}

#[test]
fn per_job_override_takes_precedence_over_default() {
    let clock = FakeClock::new();
    let mgr = JobTimeoutManager::new(clock.clone(), Duration::from_secs(3600));
    let job_id = JobId::new();
    mgr.start_tracking(job_id, Some(Duration::from_secs(1)));
    clock.advance(Duration::from_secs(2));
    assert_eq!(mgr.get_timed_out(), vec![job_id]);
}

#[test]
fn remaining_decreases_as_clock_advances() {
    let clock = FakeClock::new();
    let mgr = JobTimeoutManager::new(clock.clone(), Duration::from_secs(10));
    let job_id = JobId::new();
    mgr.start_tracking(job_id, None);
    clock.advance(Duration::from_secs(4));
    let remaining = mgr.remaining(job_id).unwrap();
    assert!(remaining <= Duration::from_secs(6));
}
