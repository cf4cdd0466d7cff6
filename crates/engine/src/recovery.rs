// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification and retry/backoff/failover orchestration for
//! connection errors, job failures, and robot crashes. Appends one
//! [`RecoveryAction`] per attempt to a bounded ring buffer.

use orc_core::{JobId, RobotId};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;

const MAX_HISTORY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Timeout,
    Network,
    Temporary,
    ResourceBusy,
    Other,
}

impl ErrorKind {
    pub fn is_retriable_by_default(&self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial: Duration::from_millis(500), multiplier: 2.0, max_delay: Duration::from_secs(60), jitter: true }
    }
}

impl BackoffPolicy {
    /// `delay = min(initial * multiplier^attempt, max_delay)`, optionally
    /// scaled by `1 + U(0, 0.25)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        let jittered = if self.jitter {
            capped * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            capped
        };
        Duration::from_secs_f64(jittered)
    }
}

#[derive(Debug, Clone)]
pub enum RecoveryAction {
    Reconnect { robot_id: RobotId, attempt: u32 },
    Escalated { robot_id: RobotId, reason: String },
    JobRetried { job_id: JobId, attempt: u32 },
    JobFailedOver { job_id: JobId, new_robot_id: RobotId },
    JobFailed { job_id: JobId, reason: String },
    RobotCrashed { robot_id: RobotId, jobs_reassigned: usize },
}

pub struct RecoveryManager {
    backoff: BackoffPolicy,
    max_retries: u32,
    history: Mutex<VecDeque<RecoveryAction>>,
}

impl RecoveryManager {
    pub fn new(backoff: BackoffPolicy, max_retries: u32) -> Self {
        Self { backoff, max_retries, history: Mutex::new(VecDeque::new()) }
    }

    fn record(&self, action: RecoveryAction) {
        let mut history = self.history.lock();
        history.push_back(action);
        if history.len() > MAX_HISTORY {
            history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<RecoveryAction> {
        self.history.lock().iter().cloned().collect()
    }

    /// Attempts `reconnect` up to `max_retries` times, sleeping the
    /// backoff delay between attempts. Returns `true` if `reconnect`
    /// eventually succeeded.
    pub async fn recover_connection<F, Fut>(&self, robot_id: RobotId, mut reconnect: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for attempt in 0..self.max_retries {
            self.record(RecoveryAction::Reconnect { robot_id, attempt });
            if reconnect().await {
                return true;
            }
            tokio::time::sleep(self.backoff.delay_for(attempt)).await;
        }
        self.record(RecoveryAction::Escalated { robot_id, reason: "reconnect attempts exhausted".into() });
        false
    }

    /// Retries a failed job on the same robot once; on exhaustion
    /// attempts a single failover to a different robot (both provided by
    /// the caller). Invokes neither on success; records the terminal
    /// outcome either way.
    pub async fn recover_job<Retry, RetryFut, Failover, FailoverFut>(
        &self,
        job_id: JobId,
        retry_same_robot: Retry,
        failover: Failover,
    ) -> bool
    where
        Retry: FnOnce() -> RetryFut,
        RetryFut: std::future::Future<Output = bool>,
        Failover: FnOnce() -> FailoverFut,
        FailoverFut: std::future::Future<Output = Option<RobotId>>,
    {
        self.record(RecoveryAction::JobRetried { job_id, attempt: 0 });
        if retry_same_robot().await {
            return true;
        }

        match failover().await {
            Some(new_robot_id) => {
                self.record(RecoveryAction::JobFailedOver { job_id, new_robot_id });
                true
            }
            None => {
                self.record(RecoveryAction::JobFailed { job_id, reason: "retry and failover exhausted".into() });
                false
            }
        }
    }

    /// Invokes `reassign` for each of `active_jobs`, recording a
    /// crash-recovery summary. Returns the subset that were successfully
    /// reassigned.
    pub async fn recover_robot_crash<F, Fut>(&self, robot_id: RobotId, active_jobs: &[JobId], mut reassign: F) -> Vec<JobId>
    where
        F: FnMut(JobId) -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let mut reassigned = Vec::new();
        for &job_id in active_jobs {
            if reassign(job_id).await {
                reassigned.push(job_id);
            }
        }
        self.record(RecoveryAction::RobotCrashed { robot_id, jobs_reassigned: reassigned.len() });
        reassigned
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
