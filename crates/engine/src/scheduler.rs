// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poll-based schedule trigger. Missed firings while the engine wasn't
//! ticking are coalesced into a single fire (the next trigger after the
//! firing `now`, never after the stale `next_run`), matching the
//! one-instance-per-schedule, combine-missed-runs discipline.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use orc_core::{Frequency, Schedule, ScheduleId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;

/// Computes the next fire time strictly after `from`, or `None` when the
/// frequency can't produce one (`ONCE` has an explicit `next_run` set at
/// creation time instead; `CRON` with a missing/invalid expression).
pub fn compute_next_run(
    frequency: Frequency,
    cron_expression: Option<&str>,
    timezone: Tz,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match frequency {
        Frequency::Once => None,
        Frequency::Cron => {
            let expr = cron_expression?;
            let schedule = cron::Schedule::from_str(&six_field(expr)).ok()?;
            let from_tz = from.with_timezone(&timezone);
            schedule.after(&from_tz).next().map(|dt| dt.with_timezone(&Utc))
        }
        Frequency::Hourly => Some(from + ChronoDuration::hours(1)),
        Frequency::Daily => Some(from + ChronoDuration::days(1)),
        Frequency::Weekly => Some(from + ChronoDuration::weeks(1)),
        // 30-day fixed approximation, matching the interval the schedule
        // is documented to use rather than true calendar months.
        Frequency::Monthly => Some(from + ChronoDuration::days(30)),
    }
}

/// The `cron` crate requires a leading seconds field; schedules are
/// authored with standard 5-field expressions (`min hour dom month dow`).
fn six_field(expr: &str) -> String {
    let fields = expr.split_whitespace().count();
    if fields == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

pub struct Scheduler {
    schedules: Mutex<HashMap<ScheduleId, Schedule>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self { schedules: Mutex::new(HashMap::new()) }
    }

    /// Inserts `schedule`, computing its initial `next_run` from `now`
    /// when the schedule doesn't already carry an explicit one (`ONCE`
    /// schedules are created with `next_run` already set). Returns
    /// `false` when `next_run` couldn't be computed (e.g. a `CRON`
    /// schedule with an invalid expression) and the schedule was not
    /// added.
    pub fn add_schedule(&self, mut schedule: Schedule, now: DateTime<Utc>) -> bool {
        if schedule.next_run.is_none() {
            if schedule.frequency == Frequency::Once {
                return false;
            }
            let Some(next_run) =
                compute_next_run(schedule.frequency, schedule.cron_expression.as_deref(), schedule.timezone, now)
            else {
                return false;
            };
            schedule.next_run = Some(next_run);
        }
        self.schedules.lock().insert(schedule.id, schedule);
        true
    }

    pub fn remove_schedule(&self, schedule_id: ScheduleId) -> bool {
        self.schedules.lock().remove(&schedule_id).is_some()
    }

    pub fn get_schedule(&self, schedule_id: ScheduleId) -> Option<Schedule> {
        self.schedules.lock().get(&schedule_id).cloned()
    }

    pub fn all_schedules(&self) -> Vec<Schedule> {
        self.schedules.lock().values().cloned().collect()
    }

    pub fn enable_schedule(&self, schedule_id: ScheduleId, now: DateTime<Utc>) -> bool {
        let mut schedules = self.schedules.lock();
        let Some(schedule) = schedules.get_mut(&schedule_id) else { return false };
        schedule.enabled = true;
        if schedule.next_run.is_none() {
            schedule.next_run =
                compute_next_run(schedule.frequency, schedule.cron_expression.as_deref(), schedule.timezone, now);
        }
        true
    }

    pub fn disable_schedule(&self, schedule_id: ScheduleId) -> bool {
        let mut schedules = self.schedules.lock();
        let Some(schedule) = schedules.get_mut(&schedule_id) else { return false };
        schedule.enabled = false;
        true
    }

    /// Returns every schedule due at or before `now`, advancing each
    /// one's stored `next_run` immediately so a schedule never fires
    /// twice for the same due period regardless of how late the caller
    /// ticks. Pair with [`Scheduler::record_fire_result`] once the
    /// engine has actually executed the callback.
    pub fn due_schedules(&self, now: DateTime<Utc>) -> Vec<Schedule> {
        let mut schedules = self.schedules.lock();
        let mut fired = Vec::new();
        for schedule in schedules.values_mut() {
            if !schedule.enabled {
                continue;
            }
            let Some(next_run) = schedule.next_run else { continue };
            if next_run > now {
                continue;
            }
            fired.push(schedule.clone());
            schedule.next_run =
                compute_next_run(schedule.frequency, schedule.cron_expression.as_deref(), schedule.timezone, now);
        }
        fired
    }

    /// Records the outcome of executing a fired schedule: `run_count`
    /// always increments, `success_count` only when `succeeded`.
    pub fn record_fire_result(&self, schedule_id: ScheduleId, at: DateTime<Utc>, succeeded: bool) {
        if let Some(schedule) = self.schedules.lock().get_mut(&schedule_id) {
            schedule.record_fired(at, succeeded);
        }
    }

    /// Upcoming runs across every enabled schedule, soonest first.
    pub fn upcoming(&self, limit: usize) -> Vec<Schedule> {
        let mut schedules: Vec<Schedule> =
            self.schedules.lock().values().filter(|s| s.enabled && s.next_run.is_some()).cloned().collect();
        schedules.sort_by_key(|s| s.next_run);
        schedules.truncate(limit);
        schedules
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
