// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared data types for robot selection and distribution. The
//! algorithms that consume these live in the engine crate; these are the
//! plain records passed between the router, selector, and distributor.

use crate::robot::RobotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Named load-balancing policy used by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    RoundRobin,
    LeastLoaded,
    Random,
    CapabilityMatch,
    Affinity,
}

crate::simple_display! {
    SelectorStrategy {
        RoundRobin => "round_robin",
        LeastLoaded => "least_loaded",
        Random => "random",
        CapabilityMatch => "capability_match",
        Affinity => "affinity",
    }
}

impl Default for SelectorStrategy {
    fn default() -> Self {
        SelectorStrategy::LeastLoaded
    }
}

/// Declarative filter matching jobs to a selection policy and candidate
/// pool. The first rule whose `workflow_pattern` (glob) and `environment`
/// match a job is used; if none match, the engine default applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionRule {
    pub workflow_pattern: String,
    pub required_tags: BTreeSet<String>,
    pub preferred_robots: Vec<RobotId>,
    pub excluded_robots: BTreeSet<RobotId>,
    pub environment: Option<String>,
    pub strategy: SelectorStrategy,
    pub priority_boost: i32,
}

impl DistributionRule {
    pub fn new(workflow_pattern: impl Into<String>, strategy: SelectorStrategy) -> Self {
        Self {
            workflow_pattern: workflow_pattern.into(),
            required_tags: BTreeSet::new(),
            preferred_robots: Vec::new(),
            excluded_robots: BTreeSet::new(),
            environment: None,
            strategy,
            priority_boost: 0,
        }
    }
}

/// Outcome of a distributor's dispatch attempt for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionResult {
    pub success: bool,
    pub robot_id: Option<RobotId>,
    pub retry_count: u32,
    pub attempted: Vec<RobotId>,
    pub error_message: Option<String>,
}

impl DistributionResult {
    pub fn success(robot_id: RobotId, retry_count: u32, attempted: Vec<RobotId>) -> Self {
        Self { success: true, robot_id: Some(robot_id), retry_count, attempted, error_message: None }
    }

    pub fn failure(retry_count: u32, attempted: Vec<RobotId>, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            robot_id: None,
            retry_count,
            attempted,
            error_message: Some(error_message.into()),
        }
    }
}
