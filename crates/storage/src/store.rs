// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence collaborator contract. Called from the engine only;
//! no other component calls it directly.

use crate::{DashboardMetrics, StorageError};
use async_trait::async_trait;
use orc_core::{Job, JobId, Robot, RobotId, RobotStatus, Schedule, ScheduleId, Workflow, WorkflowId};

#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn get_robots(&self) -> Result<Vec<Robot>, StorageError>;
    async fn save_robot(&self, robot: Robot) -> Result<(), StorageError>;
    async fn update_robot_status(&self, id: RobotId, status: RobotStatus) -> Result<(), StorageError>;

    async fn get_jobs(&self) -> Result<Vec<Job>, StorageError>;
    async fn get_job(&self, id: JobId) -> Result<Job, StorageError>;
    async fn save_job(&self, job: Job) -> Result<(), StorageError>;

    async fn get_workflows(&self) -> Result<Vec<Workflow>, StorageError>;
    async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, StorageError>;
    async fn save_workflow(&self, workflow: Workflow) -> Result<(), StorageError>;
    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), StorageError>;

    async fn get_schedules(&self) -> Result<Vec<Schedule>, StorageError>;
    async fn get_schedule(&self, id: ScheduleId) -> Result<Schedule, StorageError>;
    async fn save_schedule(&self, schedule: Schedule) -> Result<(), StorageError>;
    async fn delete_schedule(&self, id: ScheduleId) -> Result<(), StorageError>;
    async fn toggle_schedule(&self, id: ScheduleId, enabled: bool) -> Result<(), StorageError>;

    async fn get_dashboard_metrics(&self) -> Result<DashboardMetrics, StorageError>;
    /// Completed/failed/timed-out/cancelled jobs whose `created_at` falls
    /// within the last `days` days.
    async fn get_job_history(&self, days: u32) -> Result<Vec<Job>, StorageError>;
}
