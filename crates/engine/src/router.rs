// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrows the full robot pool to those eligible for a job by
//! environment and tag routes, falling back to a configured fallback
//! pool or the entire pool when no route matches.

use orc_core::{Robot, RobotId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct JobRouter {
    environment_routes: RwLock<HashMap<String, Vec<RobotId>>>,
    tag_routes: RwLock<HashMap<String, Vec<RobotId>>>,
    fallback_robots: RwLock<Vec<RobotId>>,
}

impl JobRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&self, environment: impl Into<String>, robot_ids: Vec<RobotId>) {
        self.environment_routes.write().insert(environment.into(), robot_ids);
    }

    pub fn add_tag_route(&self, tag: impl Into<String>, robot_ids: Vec<RobotId>) {
        self.tag_routes.write().insert(tag.into(), robot_ids);
    }

    pub fn set_fallback_robots(&self, robot_ids: Vec<RobotId>) {
        *self.fallback_robots.write() = robot_ids;
    }

    pub fn clear_routes(&self) {
        self.environment_routes.write().clear();
        self.tag_routes.write().clear();
        self.fallback_robots.write().clear();
    }

    /// `job_environment`/`job_tags` are supplied by the caller (typically
    /// the distribution rule that matched this job), since a job record
    /// carries neither field itself.
    pub fn eligible_robots<'a>(
        &self,
        job_environment: Option<&str>,
        job_tags: &[String],
        all_robots: &'a [Robot],
    ) -> Vec<&'a Robot> {
        let mut eligible_ids: HashSet<RobotId> = HashSet::new();

        if let Some(env) = job_environment {
            if let Some(ids) = self.environment_routes.read().get(env) {
                eligible_ids.extend(ids);
            }
        }

        let tag_routes = self.tag_routes.read();
        for tag in job_tags {
            if let Some(ids) = tag_routes.get(tag) {
                eligible_ids.extend(ids);
            }
        }
        drop(tag_routes);

        if eligible_ids.is_empty() {
            let fallback = self.fallback_robots.read();
            if !fallback.is_empty() {
                eligible_ids.extend(fallback.iter());
            } else {
                return all_robots.iter().collect();
            }
        }

        all_robots.iter().filter(|r| eligible_ids.contains(&r.id)).collect()
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
