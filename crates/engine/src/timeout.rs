// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracks wall-clock deadlines for running jobs.

use orc_core::{Clock, JobId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct JobTimeoutManager<C: Clock> {
    clock: C,
    default_timeout: Duration,
    tracked: Mutex<HashMap<JobId, (Instant, Duration)>>,
}

impl<C: Clock> JobTimeoutManager<C> {
    pub fn new(clock: C, default_timeout: Duration) -> Self {
        Self { clock, default_timeout, tracked: Mutex::new(HashMap::new()) }
    }

    pub fn start_tracking(&self, job_id: JobId, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.tracked.lock().insert(job_id, (self.clock.now(), timeout));
    }

    pub fn stop_tracking(&self, job_id: JobId) {
        self.tracked.lock().remove(&job_id);
    }

    pub fn get_timed_out(&self) -> Vec<JobId> {
        let now = self.clock.now();
        self.tracked
            .lock()
            .iter()
            .filter(|(_, (start, timeout))| now.duration_since(*start) > *timeout)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn remaining(&self, job_id: JobId) -> Option<Duration> {
        let tracked = self.tracked.lock();
        let (start, timeout) = tracked.get(&job_id)?;
        let elapsed = self.clock.now().duration_since(*start);
        Some(timeout.saturating_sub(elapsed))
    }
}

#[cfg(test)]
#[path = "timeout_tests.rs"]
mod tests;
