// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rejects functionally-equivalent job submissions within a sliding
//! window. Fingerprint: `sha256("<workflow_id>:<robot_id|'any'>:<sorted
//! k=v params>")`, truncated to 16 hex chars.

use orc_core::{Clock, RobotId, WorkflowId};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::time::Duration;

fn fingerprint(workflow_id: &WorkflowId, robot_id: Option<&RobotId>, params: &[(String, String)]) -> String {
    let robot_part = robot_id.map(|r| r.as_str()).unwrap_or("any");
    let mut input = format!("{}:{}", workflow_id.as_str(), robot_part);
    if !params.is_empty() {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let param_str = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");
        input.push(':');
        input.push_str(&param_str);
    }
    let digest = Sha256::digest(input.as_bytes());
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    let mut s = String::with_capacity(n);
    for b in bytes {
        if s.len() >= n {
            break;
        }
        s.push_str(&format!("{b:02x}"));
    }
    s.truncate(n);
    s
}

pub struct JobDeduplicator<C: Clock> {
    clock: C,
    window: Duration,
    seen: Mutex<VecDeque<(String, std::time::Instant)>>,
}

impl<C: Clock> JobDeduplicator<C> {
    pub fn new(clock: C, window: Duration) -> Self {
        Self { clock, window, seen: Mutex::new(VecDeque::new()) }
    }

    fn purge_expired(&self, seen: &mut VecDeque<(String, std::time::Instant)>) {
        let now = self.clock.now();
        while let Some((_, at)) = seen.front() {
            if now.duration_since(*at) >= self.window {
                seen.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn is_duplicate(
        &self,
        workflow_id: &WorkflowId,
        robot_id: Option<&RobotId>,
        params: &[(String, String)],
    ) -> bool {
        let fp = fingerprint(workflow_id, robot_id, params);
        let mut seen = self.seen.lock();
        self.purge_expired(&mut seen);
        seen.iter().any(|(f, _)| f == &fp)
    }

    pub fn record(
        &self,
        workflow_id: &WorkflowId,
        robot_id: Option<&RobotId>,
        params: &[(String, String)],
    ) -> String {
        let fp = fingerprint(workflow_id, robot_id, params);
        let mut seen = self.seen.lock();
        self.purge_expired(&mut seen);
        seen.push_back((fp.clone(), self.clock.now()));
        fp
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
