// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use orc_core::{Priority, ScheduleBuilder};

#[test]
fn cron_next_run_matches_documented_scenario() {
    // Scenario 6 from the concrete test matrix.
    let from = Utc.with_ymd_and_hms(2025, 1, 6, 8, 30, 0).unwrap(); // Monday
    let next = compute_next_run(Frequency::Cron, Some("0 9 * * MON-FRI"), chrono_tz::UTC, from).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap());

    let after_firing = compute_next_run(Frequency::Cron, Some("0 9 * * MON-FRI"), chrono_tz::UTC, next).unwrap();
    assert_eq!(after_firing, Utc.with_ymd_and_hms(2025, 1, 7, 9, 0, 0).unwrap());
}

#[test]
fn cron_skips_weekend() {
    let friday_after_fire = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
    let next = compute_next_run(Frequency::Cron, Some("0 9 * * MON-FRI"), chrono_tz::UTC, friday_after_fire).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 13, 9, 0, 0).unwrap()); // Monday
}

#[test]
fn hourly_daily_weekly_add_fixed_intervals() {
    let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(compute_next_run(Frequency::Hourly, None, chrono_tz::UTC, from).unwrap(), from + ChronoDuration::hours(1));
    assert_eq!(compute_next_run(Frequency::Daily, None, chrono_tz::UTC, from).unwrap(), from + ChronoDuration::days(1));
    assert_eq!(compute_next_run(Frequency::Weekly, None, chrono_tz::UTC, from).unwrap(), from + ChronoDuration::weeks(1));
    assert_eq!(compute_next_run(Frequency::Monthly, None, chrono_tz::UTC, from).unwrap(), from + ChronoDuration::days(30));
}

#[test]
fn once_frequency_has_no_computed_next_run() {
    let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    assert!(compute_next_run(Frequency::Once, None, chrono_tz::UTC, from).is_none());
}

#[test]
fn invalid_cron_expression_yields_none() {
    let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    assert!(compute_next_run(Frequency::Cron, Some("not a cron"), chrono_tz::UTC, from).is_none());
}

#[test]
fn add_schedule_computes_initial_next_run() {
    let scheduler = Scheduler::new();
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let schedule = ScheduleBuilder::default().frequency(Frequency::Hourly).priority(Priority::Normal).build();
    let id = schedule.id;
    assert!(scheduler.add_schedule(schedule, now));
    assert_eq!(scheduler.get_schedule(id).unwrap().next_run, Some(now + ChronoDuration::hours(1)));
}

#[test]
fn add_schedule_rejects_once_without_explicit_next_run() {
    let scheduler = Scheduler::new();
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let schedule = ScheduleBuilder::default().frequency(Frequency::Once).build();
    assert!(!scheduler.add_schedule(schedule, now));
}

#[test]
fn add_schedule_rejects_invalid_cron() {
    let scheduler = Scheduler::new();
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let schedule = ScheduleBuilder::default().frequency(Frequency::Cron).cron_expression(Some("garbage".to_string())).build();
    assert!(!scheduler.add_schedule(schedule, now));
}

#[test]
fn due_schedules_advances_next_run_and_is_not_refired() {
    let scheduler = Scheduler::new();
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let schedule = ScheduleBuilder::default().frequency(Frequency::Hourly).build();
    let id = schedule.id;
    scheduler.add_schedule(schedule, now);

    let later = now + ChronoDuration::hours(2);
    let due = scheduler.due_schedules(later);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, id);

    let immediate_recheck = scheduler.due_schedules(later);
    assert!(immediate_recheck.is_empty(), "coalesced firing should not repeat for the same due period");

    scheduler.record_fire_result(id, later, true);
    let after = scheduler.get_schedule(id).unwrap();
    assert_eq!(after.run_count, 1);
    assert_eq!(after.success_count, 1);
}

#[test]
fn disabled_schedule_never_comes_due() {
    let scheduler = Scheduler::new();
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let schedule = ScheduleBuilder::default().frequency(Frequency::Hourly).enabled(false).build();
    scheduler.add_schedule(schedule, now);

    let due = scheduler.due_schedules(now + ChronoDuration::hours(5));
    assert!(due.is_empty());
}

#[test]
fn remove_schedule_returns_false_when_absent() {
    let scheduler = Scheduler::new();
    assert!(!scheduler.remove_schedule(orc_core::ScheduleId::new()));
}
