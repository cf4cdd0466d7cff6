// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority-ordered job queue: state machine + deduplication + timeout
//! tracking + robot assignment bookkeeping, composed behind one lock.

use crate::dedup::JobDeduplicator;
use crate::timeout::JobTimeoutManager;
use orc_core::{Clock, Job, JobId, JobStatus, Priority, Robot, RobotId};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Queue item ordering key: `(priority desc, created_at asc, seq asc)`.
/// `seq` breaks ties when two jobs share a `created_at` (common under a
/// `FakeClock` in tests).
#[derive(Debug, Clone)]
struct QueueItem {
    priority: Priority,
    created_at: chrono::DateTime<chrono::Utc>,
    seq: u64,
    job_id: JobId,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.job_id == other.job_id
    }
}
impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want the highest priority, then
        // earliest created_at/seq, to compare as "greatest" so it pops first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Result of an [`enqueue`](PriorityQueue::enqueue) or terminal-transition call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOutcome {
    pub ok: bool,
    pub message: String,
}

impl QueueOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self { ok: true, message: message.into() }
    }
    fn err(message: impl Into<String>) -> Self {
        Self { ok: false, message: message.into() }
    }
}

struct Inner {
    heap: BinaryHeap<QueueItem>,
    jobs: HashMap<JobId, Job>,
    running: HashMap<JobId, RobotId>,
    robot_jobs: HashMap<RobotId, HashSet<JobId>>,
    next_seq: u64,
}

/// Callback invoked synchronously, while the queue's lock is held, on
/// every successful job status transition.
pub type StateChangeCallback = Box<dyn Fn(&Job, JobStatus, JobStatus) + Send + Sync>;

pub struct PriorityQueue<C: Clock> {
    inner: Mutex<Inner>,
    dedup: JobDeduplicator<C>,
    timeouts: JobTimeoutManager<C>,
    clock: C,
    on_state_change: Option<StateChangeCallback>,
}

impl<C: Clock> PriorityQueue<C> {
    pub fn new(
        clock: C,
        dedup_window: std::time::Duration,
        default_job_timeout: std::time::Duration,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                jobs: HashMap::new(),
                running: HashMap::new(),
                robot_jobs: HashMap::new(),
                next_seq: 0,
            }),
            dedup: JobDeduplicator::new(clock.clone(), dedup_window),
            timeouts: JobTimeoutManager::new(clock.clone(), default_job_timeout),
            clock,
            on_state_change: None,
        }
    }

    pub fn with_callback(mut self, callback: StateChangeCallback) -> Self {
        self.on_state_change = Some(callback);
        self
    }

    fn notify(&self, job: &Job, old: JobStatus, new: JobStatus) {
        if let Some(cb) = &self.on_state_change {
            cb(job, old, new);
        }
    }

    /// `params` are `k=v` pairs included in the dedup fingerprint.
    pub fn enqueue(
        &self,
        mut job: Job,
        check_duplicate: bool,
        params: &[(String, String)],
    ) -> QueueOutcome {
        if check_duplicate
            && self
                .dedup
                .is_duplicate(&job.workflow_id, job.robot_id.as_ref(), params)
        {
            return QueueOutcome::err("duplicate");
        }

        if job.status != JobStatus::Pending {
            return QueueOutcome::err(format!("job must be in PENDING state, got {}", job.status));
        }

        let old_status = job.status;
        if let Err(e) = job.transition(JobStatus::Queued, &self.clock) {
            return QueueOutcome::err(e.to_string());
        }

        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(QueueItem {
            priority: job.priority,
            created_at: job.created_at,
            seq,
            job_id: job.id,
        });
        inner.jobs.insert(job.id, job.clone());
        drop(inner);

        self.dedup.record(&job.workflow_id, job.robot_id.as_ref(), params);
        self.notify(&job, old_status, job.status);
        QueueOutcome::ok("job enqueued successfully")
    }

    /// Returns the highest-priority queued job that is untargeted or
    /// targeted at `robot.id`, provided `robot.is_available()`. Jobs
    /// skipped because they target a different robot are re-inserted.
    pub fn dequeue(&self, robot: &Robot) -> Option<Job> {
        if !robot.is_available() {
            return None;
        }

        let mut inner = self.inner.lock();
        let mut skipped = Vec::new();
        let mut selected: Option<QueueItem> = None;

        while let Some(item) = inner.heap.pop() {
            let Some(job) = inner.jobs.get(&item.job_id) else { continue };
            if job.status != JobStatus::Queued {
                continue;
            }
            if let Some(target) = job.robot_id {
                if target != robot.id {
                    skipped.push(item);
                    continue;
                }
            }
            selected = Some(item);
            break;
        }

        for item in skipped {
            inner.heap.push(item);
        }

        let item = selected?;
        let job_id = item.job_id;
        let job = inner.jobs.get(&job_id).cloned()?;
        let old_status = job.status;

        let mut job = job;
        if job.transition(JobStatus::Running, &self.clock).is_err() {
            inner.heap.push(item);
            return None;
        }
        job.robot_id = Some(robot.id);
        job.robot_name = Some(robot.name.clone());

        inner.jobs.insert(job_id, job.clone());
        inner.running.insert(job_id, robot.id);
        inner.robot_jobs.entry(robot.id).or_default().insert(job_id);
        drop(inner);

        self.timeouts.start_tracking(job_id, None);
        self.notify(&job, old_status, job.status);
        Some(job)
    }

    /// Transitions a specific queued job to RUNNING, bound to `robot`.
    /// Unlike [`dequeue`](Self::dequeue), the job is picked by the caller
    /// (typically the distributor, after its own rule-based selection)
    /// rather than by priority order. Returns `None` if `job_id` isn't
    /// currently QUEUED.
    pub fn assign(&self, job_id: JobId, robot: &Robot) -> Option<Job> {
        let mut inner = self.inner.lock();
        let job = inner.jobs.get(&job_id).cloned()?;
        if job.status != JobStatus::Queued {
            return None;
        }

        let old_status = job.status;
        let mut job = job;
        job.transition(JobStatus::Running, &self.clock).ok()?;
        job.robot_id = Some(robot.id);
        job.robot_name = Some(robot.name.clone());

        inner.jobs.insert(job_id, job.clone());
        inner.running.insert(job_id, robot.id);
        inner.robot_jobs.entry(robot.id).or_default().insert(job_id);
        drop(inner);

        self.timeouts.start_tracking(job_id, None);
        self.notify(&job, old_status, job.status);
        Some(job)
    }

    /// Rebinds a currently RUNNING job to `new_robot` without changing its
    /// status, for failover after the original robot crashed or
    /// disconnected mid-execution.
    pub fn reassign(&self, job_id: JobId, new_robot: &Robot) -> Option<Job> {
        let mut inner = self.inner.lock();
        let job = inner.jobs.get(&job_id).cloned()?;
        if job.status != JobStatus::Running {
            return None;
        }

        let old_robot = job.robot_id;
        let mut job = job;
        job.robot_id = Some(new_robot.id);
        job.robot_name = Some(new_robot.name.clone());
        inner.jobs.insert(job_id, job.clone());

        if let Some(old) = old_robot {
            if let Some(set) = inner.robot_jobs.get_mut(&old) {
                set.remove(&job_id);
            }
        }
        inner.running.insert(job_id, new_robot.id);
        inner.robot_jobs.entry(new_robot.id).or_default().insert(job_id);
        Some(job)
    }

    fn finish(
        &self,
        job_id: JobId,
        new_status: JobStatus,
        result: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> QueueOutcome {
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get(&job_id).cloned() else {
            return QueueOutcome::err("job not found");
        };
        if job.status != JobStatus::Running {
            return QueueOutcome::err(format!("job is not running (status: {})", job.status));
        }

        let old_status = job.status;
        let mut job = job;
        if let Err(e) = job.transition(new_status, &self.clock) {
            return QueueOutcome::err(e.to_string());
        }
        if result.is_some() {
            job.result = result;
        }
        if let Some(msg) = error_message {
            job.error_message = Some(msg);
        }
        inner.jobs.insert(job_id, job.clone());

        if let Some(robot_id) = inner.running.remove(&job_id) {
            if let Some(set) = inner.robot_jobs.get_mut(&robot_id) {
                set.remove(&job_id);
            }
        }
        drop(inner);

        self.timeouts.stop_tracking(job_id);
        self.notify(&job, old_status, job.status);
        QueueOutcome::ok(format!("job {}", new_status))
    }

    pub fn complete(&self, job_id: JobId, result: Option<serde_json::Value>) -> QueueOutcome {
        self.finish(job_id, JobStatus::Completed, result, None)
    }

    pub fn fail(&self, job_id: JobId, error_message: impl Into<String>) -> QueueOutcome {
        self.finish(job_id, JobStatus::Failed, None, Some(error_message.into()))
    }

    fn timeout_one(&self, job_id: JobId) -> QueueOutcome {
        self.finish(job_id, JobStatus::Timeout, None, Some("Job execution timed out".to_string()))
    }

    pub fn cancel(&self, job_id: JobId, reason: impl Into<String>) -> QueueOutcome {
        let reason = reason.into();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get(&job_id).cloned() else {
            return QueueOutcome::err("job not found");
        };
        if job.status.is_terminal() {
            return QueueOutcome::err(format!("cannot cancel job in {} state", job.status));
        }

        let old_status = job.status;
        let mut job = job;
        if let Err(e) = job.transition(JobStatus::Cancelled, &self.clock) {
            return QueueOutcome::err(e.to_string());
        }
        job.error_message = Some(reason);
        inner.jobs.insert(job_id, job.clone());

        if let Some(robot_id) = inner.running.remove(&job_id) {
            if let Some(set) = inner.robot_jobs.get_mut(&robot_id) {
                set.remove(&job_id);
            }
        }
        drop(inner);

        self.timeouts.stop_tracking(job_id);
        self.notify(&job, old_status, job.status);
        QueueOutcome::ok("job cancelled")
    }

    /// Valid only while RUNNING; clamps `progress` to `[0, 100]`.
    pub fn update_progress(&self, job_id: JobId, progress: u8, current_node: Option<String>) -> bool {
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(&job_id) else { return false };
        if job.status != JobStatus::Running {
            return false;
        }
        job.set_progress(progress, current_node);
        true
    }

    /// Marks every expired running job TIMEOUT, returning their ids.
    pub fn check_timeouts(&self) -> Vec<JobId> {
        let timed_out = self.timeouts.get_timed_out();
        for job_id in &timed_out {
            self.timeout_one(*job_id);
        }
        timed_out
    }

    pub fn get_job(&self, job_id: JobId) -> Option<Job> {
        self.inner.lock().jobs.get(&job_id).cloned()
    }

    pub fn queued_jobs(&self) -> Vec<Job> {
        let inner = self.inner.lock();
        inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .cloned()
            .collect()
    }

    pub fn running_jobs(&self) -> Vec<Job> {
        let inner = self.inner.lock();
        inner.running.keys().filter_map(|id| inner.jobs.get(id).cloned()).collect()
    }

    pub fn robot_jobs(&self, robot_id: RobotId) -> Vec<Job> {
        let inner = self.inner.lock();
        inner
            .robot_jobs
            .get(&robot_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect()
    }

    pub fn queue_depth(&self) -> usize {
        self.queued_jobs().len()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
