// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatches jobs to robots: finds the matching [`DistributionRule`],
//! selects a robot, sends the job, and retries on rejection/timeout up
//! to `max_retries` times.
//!
//! Each retry excludes every robot already attempted for this job, so a
//! distribution is exhausted once all eligible candidates have been
//! tried rather than hammering the same robot `max_retries` times.

use async_trait::async_trait;
use orc_core::{DistributionResult, DistributionRule, Job, Robot, RobotId};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::selector::{RobotSelector, SelectionCriteria};

/// Outcome of sending one job to one robot.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Accepted,
    Rejected(String),
}

/// Transport used to actually hand a job to a robot. Implemented by the
/// server crate over the wire protocol; tests use an in-memory stub.
#[async_trait]
pub trait JobSender: Send + Sync {
    async fn send_job(&self, robot_id: RobotId, job: &Job) -> SendOutcome;
}

const MAX_HISTORY: usize = 1000;

pub struct Distributor {
    max_retries: u32,
    retry_delay: Duration,
    distribution_timeout: Duration,
    selector: RobotSelector,
    rules: Mutex<Vec<DistributionRule>>,
    history: Mutex<Vec<DistributionResult>>,
}

impl Distributor {
    pub fn new(max_retries: u32, retry_delay: Duration, distribution_timeout: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            distribution_timeout,
            selector: RobotSelector::new(),
            rules: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn add_rule(&self, rule: DistributionRule) {
        self.rules.lock().push(rule);
    }

    pub fn remove_rule(&self, workflow_pattern: &str) -> bool {
        let mut rules = self.rules.lock();
        let before = rules.len();
        rules.retain(|r| r.workflow_pattern != workflow_pattern);
        rules.len() != before
    }

    pub fn clear_rules(&self) {
        self.rules.lock().clear();
    }

    fn matching_rule(&self, workflow_name: &str, job_environment: Option<&str>) -> Option<DistributionRule> {
        self.rules.lock().iter().find(|rule| {
            let pattern_matches =
                rule.workflow_pattern == "*" || glob_match(&rule.workflow_pattern, workflow_name);
            let env_matches = match &rule.environment {
                Some(env) => job_environment == Some(env.as_str()),
                None => true,
            };
            pattern_matches && env_matches
        }).cloned()
    }

    pub fn evict_robot_affinity(&self, robot_id: RobotId) {
        self.selector.evict_robot(robot_id);
    }

    pub async fn distribute(
        &self,
        job: &Job,
        available_robots: &[Robot],
        sender: &dyn JobSender,
    ) -> DistributionResult {
        let rule = self.matching_rule(&job.workflow_name, None);
        let strategy = rule.as_ref().map(|r| r.strategy).unwrap_or_default();
        let required_tags = rule.as_ref().map(|r| r.required_tags.clone()).unwrap_or_default();
        let preferred_robots = rule.as_ref().map(|r| r.preferred_robots.clone()).unwrap_or_default();
        let excluded_robots = rule.as_ref().map(|r| r.excluded_robots.clone()).unwrap_or_default();

        let mut attempted: Vec<RobotId> = Vec::new();
        let mut retry_count = 0u32;

        for attempt in 0..=self.max_retries {
            let mut excluded = excluded_robots.clone();
            excluded.extend(attempted.iter().copied());
            let criteria = SelectionCriteria {
                environment: None,
                required_tags: &required_tags,
                preferred_robots: &preferred_robots,
                excluded_robots: &excluded,
            };

            let Some(robot_id) =
                self.selector.select(&job.workflow_id, &BTreeSet::new(), available_robots, strategy, &criteria)
            else {
                break;
            };
            attempted.push(robot_id);

            let send_result =
                tokio::time::timeout(self.distribution_timeout, sender.send_job(robot_id, job)).await;

            match send_result {
                Ok(SendOutcome::Accepted) => {
                    let result = DistributionResult::success(robot_id, retry_count, attempted);
                    self.record(result.clone());
                    return result;
                }
                Ok(SendOutcome::Rejected(_)) | Err(_) => {
                    if attempt < self.max_retries {
                        retry_count += 1;
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let result = DistributionResult::failure(
            retry_count,
            attempted,
            format!("distribution failed after {retry_count} retries"),
        );
        self.record(result.clone());
        result
    }

    /// Dispatches `jobs` highest-priority-first; after each success, a
    /// robot at capacity is dropped from the pool for subsequent jobs in
    /// the batch.
    pub async fn distribute_batch(
        &self,
        jobs: &[Job],
        mut available_robots: Vec<Robot>,
        sender: &dyn JobSender,
    ) -> Vec<DistributionResult> {
        let mut sorted: Vec<&Job> = jobs.iter().collect();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut results = Vec::with_capacity(sorted.len());
        for job in sorted {
            let result = self.distribute(job, &available_robots, sender).await;
            if let Some(robot_id) = result.robot_id {
                if let Some(robot) = available_robots.iter_mut().find(|r| r.id == robot_id) {
                    robot.current_jobs += 1;
                    if robot.current_jobs >= robot.max_concurrent_jobs {
                        available_robots.retain(|r| r.id != robot_id);
                    }
                }
            }
            results.push(result);
        }
        results
    }

    fn record(&self, result: DistributionResult) {
        let mut history = self.history.lock();
        history.push(result);
        let len = history.len();
        if len > MAX_HISTORY {
            history.drain(0..len - MAX_HISTORY);
        }
    }

    pub fn recent_results(&self, limit: usize) -> Vec<DistributionResult> {
        let history = self.history.lock();
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    pub fn statistics(&self) -> DistributionStatistics {
        let history = self.history.lock();
        let total = history.len();
        let successful = history.iter().filter(|r| r.success).count();
        DistributionStatistics {
            total_distributions: total,
            successful,
            failed: total - successful,
            success_rate: if total > 0 { successful as f64 / total as f64 } else { 0.0 },
            avg_retry_count: if total > 0 {
                history.iter().map(|r| r.retry_count as f64).sum::<f64>() / total as f64
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionStatistics {
    pub total_distributions: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub avg_retry_count: f64,
}

/// Minimal glob: supports a single trailing `*` (e.g. `"invoice-*"`), the
/// shape distribution rules actually use.
fn glob_match(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

#[cfg(test)]
#[path = "distributor_tests.rs"]
mod tests;
