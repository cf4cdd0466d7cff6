// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate dashboard reader, grounded on the persistence collaborator's
//! `get_dashboard_metrics` method.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_robots: u64,
    pub online_robots: u64,
    pub total_jobs: u64,
    pub running_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub enabled_schedules: u64,
}
