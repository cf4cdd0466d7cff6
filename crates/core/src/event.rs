// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-change event payloads fired synchronously while the owning
//! subsystem's lock is held, so observers see transitions in
//! linearizable order (see the concurrency model).

use crate::health::HealthStatus;
use crate::job::{Job, JobStatus};
use crate::robot::RobotId;

/// Fired by the queue on every successful job status transition.
#[derive(Debug, Clone)]
pub struct JobTransitionEvent {
    pub job: Job,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
}

/// Fired by the health monitor on every status change for a robot.
#[derive(Debug, Clone)]
pub struct HealthTransitionEvent {
    pub robot_id: RobotId,
    pub old_status: HealthStatus,
    pub new_status: HealthStatus,
}
