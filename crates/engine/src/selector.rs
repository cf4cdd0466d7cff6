// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Picks one robot from a filtered candidate set per a named
//! [`SelectorStrategy`]. Filtering is always: `ONLINE`, environment
//! match (when the caller specifies one), tag superset of
//! `required_tags`, not excluded. `preferred_robots` narrows the
//! filtered set further when any preferred candidate survives.

use orc_core::{Robot, RobotId, SelectorStrategy, WorkflowId};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap};

/// Criteria threaded through from a [`crate::distributor::Distributor`]
/// dispatch attempt or a rule lookup.
#[derive(Debug, Clone)]
pub struct SelectionCriteria<'a> {
    pub environment: Option<&'a str>,
    pub required_tags: &'a BTreeSet<String>,
    pub preferred_robots: &'a [RobotId],
    pub excluded_robots: &'a BTreeSet<RobotId>,
}

/// Stateful robot picker. Keeps a round-robin cursor and a
/// workflow-to-robot affinity map across calls.
pub struct RobotSelector {
    round_robin_cursor: Mutex<HashMap<RobotId, usize>>,
    affinity: Mutex<HashMap<WorkflowId, RobotId>>,
}

impl Default for RobotSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotSelector {
    pub fn new() -> Self {
        Self { round_robin_cursor: Mutex::new(HashMap::new()), affinity: Mutex::new(HashMap::new()) }
    }

    fn filter<'a>(&self, robots: &'a [Robot], criteria: &SelectionCriteria<'_>) -> Vec<&'a Robot> {
        let mut candidates: Vec<&Robot> = robots
            .iter()
            .filter(|r| r.status == orc_core::RobotStatus::Online)
            .filter(|r| match criteria.environment {
                Some(env) => r.environment.as_deref() == Some(env),
                None => true,
            })
            .filter(|r| criteria.required_tags.iter().all(|tag| r.tags.contains(tag)))
            .filter(|r| !criteria.excluded_robots.contains(&r.id))
            .collect();

        if !criteria.preferred_robots.is_empty() {
            let preferred: Vec<&Robot> =
                candidates.iter().filter(|r| criteria.preferred_robots.contains(&r.id)).copied().collect();
            if !preferred.is_empty() {
                candidates = preferred;
            }
        }

        candidates
    }

    /// `workflow_id` and `job_tags` drive affinity tracking and
    /// capability scoring respectively; both are optional because not
    /// every strategy needs them.
    pub fn select(
        &self,
        workflow_id: &WorkflowId,
        job_tags: &BTreeSet<String>,
        robots: &[Robot],
        strategy: SelectorStrategy,
        criteria: &SelectionCriteria<'_>,
    ) -> Option<RobotId> {
        let candidates = self.filter(robots, criteria);
        if candidates.is_empty() {
            return None;
        }

        match strategy {
            SelectorStrategy::RoundRobin => self.select_round_robin(&candidates),
            SelectorStrategy::LeastLoaded => self.select_least_loaded(&candidates),
            SelectorStrategy::Random => self.select_random(&candidates),
            SelectorStrategy::CapabilityMatch => self.select_by_capability(job_tags, &candidates),
            SelectorStrategy::Affinity => self.select_by_affinity(workflow_id, &candidates),
        }
    }

    fn select_round_robin(&self, candidates: &[&Robot]) -> Option<RobotId> {
        let mut ids: Vec<RobotId> = candidates.iter().map(|r| r.id).collect();
        ids.sort();

        let mut cursor = self.round_robin_cursor.lock();
        let last_idx = ids
            .iter()
            .filter_map(|id| cursor.get(id).copied())
            .max()
            .map(|i| i as i64)
            .unwrap_or(-1);
        let next_idx = ((last_idx + 1) as usize) % ids.len();
        let selected = ids[next_idx];
        cursor.insert(selected, next_idx);
        Some(selected)
    }

    fn select_least_loaded(&self, candidates: &[&Robot]) -> Option<RobotId> {
        candidates
            .iter()
            .min_by(|a, b| {
                load_key(a).partial_cmp(&load_key(b)).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|r| r.id)
    }

    fn select_random(&self, candidates: &[&Robot]) -> Option<RobotId> {
        candidates.choose(&mut rand::thread_rng()).map(|r| r.id)
    }

    fn select_by_capability(&self, job_tags: &BTreeSet<String>, candidates: &[&Robot]) -> Option<RobotId> {
        candidates
            .iter()
            .min_by(|a, b| {
                capability_key(job_tags, a)
                    .partial_cmp(&capability_key(job_tags, b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|r| r.id)
    }

    fn select_by_affinity(&self, workflow_id: &WorkflowId, candidates: &[&Robot]) -> Option<RobotId> {
        let mut affinity = self.affinity.lock();
        if let Some(sticky) = affinity.get(workflow_id) {
            if candidates.iter().any(|r| &r.id == sticky) {
                return Some(*sticky);
            }
        }

        let selected = self.select_least_loaded(candidates)?;
        affinity.insert(*workflow_id, selected);
        Some(selected)
    }

    /// Drops any affinity pinned to `robot_id`. The health monitor calls
    /// this when a robot goes `UNHEALTHY`/`OFFLINE` so future affinity
    /// lookups don't stick a workflow to a robot that can't run it.
    pub fn evict_robot(&self, robot_id: RobotId) {
        self.affinity.lock().retain(|_, v| *v != robot_id);
    }

    pub fn clear_affinity(&self, workflow_id: &WorkflowId) {
        self.affinity.lock().remove(workflow_id);
    }

    pub fn clear_all_affinity(&self) {
        self.affinity.lock().clear();
    }
}

fn load_key(robot: &Robot) -> (f64, f64) {
    (robot.current_jobs as f64 / robot.max_concurrent_jobs.max(1) as f64, robot.cpu_percent)
}

fn capability_key(job_tags: &BTreeSet<String>, robot: &Robot) -> (i64, f64) {
    let overlap = job_tags.intersection(&robot.tags).count() as i64;
    (-overlap, robot.current_jobs as f64 / robot.max_concurrent_jobs.max(1) as f64)
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
