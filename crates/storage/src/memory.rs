// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`PersistenceStore`]. Default backend for the daemon and
//! for tests; grounded on the teacher's `MaterializedState` aggregation
//! idiom (a handful of maps behind one lock, grouped by entity).

use crate::{DashboardMetrics, PersistenceStore, StorageError};
use async_trait::async_trait;
use orc_core::{Job, JobId, JobStatus, Robot, RobotId, RobotStatus, Schedule, ScheduleId, Workflow, WorkflowId};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct State {
    robots: HashMap<RobotId, Robot>,
    jobs: HashMap<JobId, Job>,
    workflows: HashMap<WorkflowId, Workflow>,
    schedules: HashMap<ScheduleId, Schedule>,
}

/// Idempotent-on-upsert in-memory store. Not durable across restarts.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn get_robots(&self) -> Result<Vec<Robot>, StorageError> {
        Ok(self.state.lock().robots.values().cloned().collect())
    }

    async fn save_robot(&self, robot: Robot) -> Result<(), StorageError> {
        self.state.lock().robots.insert(robot.id, robot);
        Ok(())
    }

    async fn update_robot_status(&self, id: RobotId, status: RobotStatus) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let robot = state.robots.get_mut(&id).ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        robot.status = status;
        Ok(())
    }

    async fn get_jobs(&self) -> Result<Vec<Job>, StorageError> {
        Ok(self.state.lock().jobs.values().cloned().collect())
    }

    async fn get_job(&self, id: JobId) -> Result<Job, StorageError> {
        self.state
            .lock()
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn save_job(&self, job: Job) -> Result<(), StorageError> {
        self.state.lock().jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_workflows(&self) -> Result<Vec<Workflow>, StorageError> {
        Ok(self.state.lock().workflows.values().cloned().collect())
    }

    async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, StorageError> {
        self.state
            .lock()
            .workflows
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn save_workflow(&self, workflow: Workflow) -> Result<(), StorageError> {
        self.state.lock().workflows.insert(workflow.id, workflow);
        Ok(())
    }

    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), StorageError> {
        self.state.lock().workflows.remove(&id);
        Ok(())
    }

    async fn get_schedules(&self) -> Result<Vec<Schedule>, StorageError> {
        Ok(self.state.lock().schedules.values().cloned().collect())
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Schedule, StorageError> {
        self.state
            .lock()
            .schedules
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn save_schedule(&self, schedule: Schedule) -> Result<(), StorageError> {
        self.state.lock().schedules.insert(schedule.id, schedule);
        Ok(())
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<(), StorageError> {
        self.state.lock().schedules.remove(&id);
        Ok(())
    }

    async fn toggle_schedule(&self, id: ScheduleId, enabled: bool) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let schedule = state.schedules.get_mut(&id).ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        schedule.enabled = enabled;
        Ok(())
    }

    async fn get_dashboard_metrics(&self) -> Result<DashboardMetrics, StorageError> {
        let state = self.state.lock();
        Ok(DashboardMetrics {
            total_robots: state.robots.len() as u64,
            online_robots: state.robots.values().filter(|r| r.status == RobotStatus::Online).count() as u64,
            total_jobs: state.jobs.len() as u64,
            running_jobs: state.jobs.values().filter(|j| j.status == JobStatus::Running).count() as u64,
            completed_jobs: state.jobs.values().filter(|j| j.status == JobStatus::Completed).count() as u64,
            failed_jobs: state.jobs.values().filter(|j| j.status == JobStatus::Failed).count() as u64,
            enabled_schedules: state.schedules.values().filter(|s| s.enabled).count() as u64,
        })
    }

    async fn get_job_history(&self, days: u32) -> Result<Vec<Job>, StorageError> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(days as i64);
        Ok(self
            .state
            .lock()
            .jobs
            .values()
            .filter(|j| j.status.is_terminal() && j.created_at >= cutoff)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
