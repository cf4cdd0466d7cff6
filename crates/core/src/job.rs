// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, priority, status, and the state machine governing
//! legal transitions.

use crate::clock::Clock;
use crate::robot::RobotId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a job instance.
    pub struct JobId("job-");
}

crate::define_id! {
    /// Identifier of the workflow a job executes. Opaque to the core —
    /// the orchestrator never interprets `workflow_json`.
    pub struct WorkflowId("wfl-");
}

/// Dispatch priority. Ordered `LOW < NORMAL < HIGH < CRITICAL` so that
/// `Reverse(priority)` yields the queue's "higher priority first" key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

crate::simple_display! {
    Priority {
        Low => "low",
        Normal => "normal",
        High => "high",
        Critical => "critical",
    }
}

/// Job lifecycle status. See the transition table in [`Job::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Timeout | JobStatus::Cancelled
        )
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Queued => "queued",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Timeout => "timeout",
        Cancelled => "cancelled",
    }
}

/// A transition outside the table in [`Job::transition`] was attempted.
/// The job's fields are left unmutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Unit of work dispatched to a robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    pub workflow_json: serde_json::Value,
    /// Empty when untargeted (any eligible robot may take it).
    pub robot_id: Option<RobotId>,
    pub robot_name: Option<String>,
    pub status: JobStatus,
    pub priority: Priority,
    pub scheduled_time: Option<chrono::DateTime<chrono::Utc>>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_ms: Option<i64>,
    pub progress: u8,
    pub current_node: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub logs: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    /// Construct a new job in `PENDING` status.
    pub fn new(
        workflow_id: WorkflowId,
        workflow_name: impl Into<String>,
        workflow_json: serde_json::Value,
        priority: Priority,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: JobId::new(),
            workflow_id,
            workflow_name: workflow_name.into(),
            workflow_json,
            robot_id: None,
            robot_name: None,
            status: JobStatus::Pending,
            priority,
            scheduled_time: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            progress: 0,
            current_node: None,
            result: None,
            error_message: None,
            logs: Vec::new(),
            created_at: clock.now_utc(),
        }
    }

    /// Apply a state transition per the table in spec'd component design:
    ///
    /// ```text
    /// PENDING → QUEUED → RUNNING → {COMPLETED, FAILED, TIMEOUT}
    /// PENDING → CANCELLED
    /// QUEUED  → CANCELLED
    /// RUNNING → CANCELLED
    /// ```
    ///
    /// On failure the job is left completely unmutated.
    pub fn transition(
        &mut self,
        to: JobStatus,
        clock: &impl Clock,
    ) -> Result<(), TransitionError> {
        use JobStatus::*;

        let allowed = matches!(
            (self.status, to),
            (Pending, Queued)
                | (Queued, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Timeout)
                | (Pending, Cancelled)
                | (Queued, Cancelled)
                | (Running, Cancelled)
        );
        if !allowed {
            return Err(TransitionError { from: self.status, to });
        }

        self.status = to;
        if to == Running {
            self.started_at = Some(clock.now_utc());
        }
        if to.is_terminal() {
            let now = clock.now_utc();
            self.completed_at = Some(now);
            if let Some(started) = self.started_at {
                self.duration_ms = Some((now - started).num_milliseconds());
            }
            if to == Completed {
                self.progress = 100;
            }
        }
        Ok(())
    }

    /// Clamp and apply a progress update. Caller is responsible for
    /// checking `status == RUNNING` (the queue enforces this).
    pub fn set_progress(&mut self, progress: u8, current_node: Option<String>) {
        self.progress = progress.min(100);
        self.current_node = current_node;
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct JobBuilder => Job {
        into {
            workflow_name: String = "test-workflow",
        }
        set {
            workflow_id: WorkflowId = WorkflowId::new(),
            workflow_json: serde_json::Value = serde_json::Value::Null,
            robot_id: Option<RobotId> = None,
            robot_name: Option<String> = None,
            status: JobStatus = JobStatus::Pending,
            priority: Priority = Priority::Normal,
            scheduled_time: Option<chrono::DateTime<chrono::Utc>> = None,
            started_at: Option<chrono::DateTime<chrono::Utc>> = None,
            completed_at: Option<chrono::DateTime<chrono::Utc>> = None,
            duration_ms: Option<i64> = None,
            progress: u8 = 0,
            current_node: Option<String> = None,
            result: Option<serde_json::Value> = None,
            error_message: Option<String> = None,
            logs: Vec<String> = Vec::new(),
            created_at: chrono::DateTime<chrono::Utc> = chrono::Utc::now(),
        }
        computed {
            id: JobId = JobId::new(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
