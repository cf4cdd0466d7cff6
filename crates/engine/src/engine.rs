// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level composition: wires the queue, distributor, scheduler,
//! recovery manager, health monitor, and security manager onto one
//! persistence collaborator, and drives the background loops that keep
//! them moving.

use crate::config::EngineConfig;
use crate::distributor::{Distributor, JobSender, SendOutcome};
use crate::health::{HealthMonitor, HealthThresholds};
use crate::queue::PriorityQueue;
use crate::recovery::{BackoffPolicy, RecoveryManager};
use crate::router::JobRouter;
use crate::scheduler::Scheduler;
use crate::security::SecurityManager;
use orc_core::{
    BusinessRejection, Clock, FatalError, Job, JobId, JobStatus, OrchestratorError, Priority, Robot,
    RobotId, RobotStatus, Schedule, ScheduleId, ValidationError, WorkflowId,
};
use orc_storage::PersistenceStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PERSISTENCE_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Orchestrates every engine subsystem against one persistence
/// collaborator and one [`JobSender`] transport. Cheap to clone — every
/// field is an `Arc` or `Copy` value.
pub struct Engine<C: Clock, S: PersistenceStore> {
    clock: C,
    storage: Arc<S>,
    config: EngineConfig,
    queue: Arc<PriorityQueue<C>>,
    distributor: Arc<Distributor>,
    scheduler: Arc<Scheduler>,
    recovery: Arc<RecoveryManager>,
    health: Arc<HealthMonitor<C>>,
    security: Arc<SecurityManager<C>>,
    router: Arc<JobRouter>,
    sender: Arc<dyn JobSender>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Clock + 'static, S: PersistenceStore + 'static> Engine<C, S> {
    pub fn new(clock: C, storage: Arc<S>, config: EngineConfig, hmac_secret: Vec<u8>, sender: Arc<dyn JobSender>) -> Self {
        let persist_storage = storage.clone();
        let queue = Arc::new(
            PriorityQueue::new(clock.clone(), config.dedup_window, config.default_job_timeout).with_callback(
                Box::new(move |job: &Job, _old, new| {
                    if new.is_terminal() || new == JobStatus::Running {
                        let storage = persist_storage.clone();
                        let job = job.clone();
                        tokio::spawn(async move {
                            if let Err(err) = storage.save_job(job).await {
                                tracing::error!(%err, "failed to persist job on state change");
                            }
                        });
                    }
                }),
            ),
        );

        let distributor = Arc::new(Distributor::new(config.max_retries, config.retry_delay, config.dispatch_timeout));

        let thresholds = HealthThresholds {
            cpu_warning: config.cpu_warning,
            cpu_critical: config.cpu_critical,
            memory_warning: config.memory_warning,
            memory_critical: config.memory_critical,
            disk_warning: config.disk_warning,
            disk_critical: config.disk_critical,
            error_rate_warning: config.error_rate_warning,
            error_rate_critical: config.error_rate_critical,
            heartbeat_timeout: config.heartbeat_timeout,
        };
        let affinity_distributor = distributor.clone();
        let health = Arc::new(HealthMonitor::new(clock.clone(), thresholds).with_callbacks(
            Box::new(|robot_id, old, new| {
                tracing::info!(%robot_id, ?old, ?new, "robot health changed");
            }),
            Box::new(move |robot_id| {
                affinity_distributor.evict_robot_affinity(robot_id);
            }),
        ));

        let scheduler = Arc::new(Scheduler::new());
        let recovery = Arc::new(RecoveryManager::new(BackoffPolicy::default(), config.max_retries));
        let security = Arc::new(SecurityManager::new(
            clock.clone(),
            hmac_secret,
            config.token_ttl,
            config.rate_limit_window,
            config.rate_limit_requests,
        ));
        let router = Arc::new(JobRouter::new());

        Self {
            clock,
            storage,
            config,
            queue,
            distributor,
            scheduler,
            recovery,
            health,
            security,
            router,
            sender,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self) -> Arc<PriorityQueue<C>> {
        self.queue.clone()
    }

    pub fn distributor(&self) -> Arc<Distributor> {
        self.distributor.clone()
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    pub fn recovery_manager(&self) -> Arc<RecoveryManager> {
        self.recovery.clone()
    }

    pub fn health_monitor(&self) -> Arc<HealthMonitor<C>> {
        self.health.clone()
    }

    pub fn security_manager(&self) -> Arc<SecurityManager<C>> {
        self.security.clone()
    }

    pub fn router(&self) -> Arc<JobRouter> {
        self.router.clone()
    }

    pub fn storage(&self) -> Arc<S> {
        self.storage.clone()
    }

    /// Submits a job for execution. If `scheduled_time` is in the
    /// future, registers a one-shot schedule instead of enqueuing
    /// immediately; either way the returned [`Job`] is persisted.
    pub async fn submit_job(
        &self,
        workflow_id: WorkflowId,
        workflow_name: impl Into<String>,
        workflow_json: serde_json::Value,
        priority: Priority,
        target_robot: Option<RobotId>,
        scheduled_time: Option<chrono::DateTime<chrono::Utc>>,
        check_duplicate: bool,
        params: &[(String, String)],
    ) -> Result<Job, OrchestratorError> {
        let workflow_name = workflow_name.into();
        let now = self.clock.now_utc();

        if let Some(when) = scheduled_time {
            if when > now {
                let mut schedule =
                    Schedule::new(format!("one-shot:{workflow_name}"), workflow_id, orc_core::Frequency::Once, priority);
                schedule.robot_id = target_robot;
                schedule.next_run = Some(when);
                self.storage
                    .save_schedule(schedule.clone())
                    .await
                    .map_err(|e| FatalError::CorruptState(e.to_string()))?;
                self.scheduler.add_schedule(schedule, now);

                let mut job = Job::new(workflow_id, workflow_name, workflow_json, priority, &self.clock);
                job.scheduled_time = Some(when);
                job.robot_id = target_robot;
                self.storage.save_job(job.clone()).await.map_err(|e| FatalError::CorruptState(e.to_string()))?;
                return Ok(job);
            }
        }

        let mut job = Job::new(workflow_id, workflow_name, workflow_json, priority, &self.clock);
        job.robot_id = target_robot;
        let outcome = self.queue.enqueue(job.clone(), check_duplicate, params);
        if !outcome.ok {
            if outcome.message == "duplicate" {
                return Err(BusinessRejection::Duplicate.into());
            }
            return Err(ValidationError::InvalidTransition { from: job.status.to_string(), to: "queued".into() }.into());
        }

        let queued = self.queue.get_job(job.id).unwrap_or(job);
        Ok(queued)
    }

    /// Launches the background dispatch, timeout-sweep, persistence-sweep
    /// and schedule loops. Idempotent only in the sense that calling it
    /// twice spawns a second set of loops — callers should call it once.
    pub fn start(self: &Arc<Self>) {
        self.spawn_loop(self.config.dispatch_interval, {
            let engine = self.clone();
            move || {
                let engine = engine.clone();
                async move {
                    engine.schedule_tick().await;
                    engine.dispatch_tick().await;
                }
            }
        });

        self.spawn_loop(self.config.timeout_check_interval, {
            let engine = self.clone();
            move || {
                let engine = engine.clone();
                async move {
                    engine.timeout_tick();
                    engine.health_sweep_tick();
                }
            }
        });

        self.spawn_loop(PERSISTENCE_SWEEP_INTERVAL, {
            let engine = self.clone();
            move || {
                let engine = engine.clone();
                async move { engine.persistence_tick().await }
            }
        });
    }

    fn spawn_loop<F, Fut>(&self, period: Duration, mut body: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => body().await,
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Stops every background loop and waits for them to exit. Leaves
    /// in-memory and persisted state untouched.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn schedule_tick(&self) {
        let now = self.clock.now_utc();
        for schedule in self.scheduler.due_schedules(now) {
            let workflow = match self.storage.get_workflow(schedule.workflow_id).await {
                Ok(w) => w,
                Err(err) => {
                    tracing::error!(schedule_id = %schedule.id, %err, "schedule fired for unknown workflow");
                    self.scheduler.record_fire_result(schedule.id, now, false);
                    continue;
                }
            };

            let result = self
                .submit_job(
                    workflow.id,
                    workflow.name.clone(),
                    workflow.json_definition.clone(),
                    schedule.priority,
                    schedule.robot_id,
                    None,
                    false,
                    &[],
                )
                .await;
            self.scheduler.record_fire_result(schedule.id, now, result.is_ok());
            if let Err(err) = result {
                tracing::error!(schedule_id = %schedule.id, %err, "scheduled submission failed");
            }
        }
    }

    async fn dispatch_tick(&self) {
        let queued = self.queue.queued_jobs();
        if queued.is_empty() {
            return;
        }
        let robots: Vec<Robot> = match self.storage.get_robots().await {
            Ok(robots) => robots
                .into_iter()
                .map(|mut robot| {
                    // The persisted record's `current_jobs` can lag behind
                    // the queue's own bookkeeping (it's only updated by a
                    // dedicated reconciliation, not on every transition);
                    // derive the true count from the queue instead of
                    // trusting storage for the availability check.
                    robot.current_jobs = self.queue.robot_jobs(robot.id).len() as u32;
                    robot
                })
                .filter(Robot::is_available)
                .collect(),
            Err(err) => {
                tracing::error!(%err, "failed to load robots for dispatch");
                return;
            }
        };
        if robots.is_empty() {
            return;
        }

        let mut sorted = queued;
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
        let results = self.distributor.distribute_batch(&sorted, robots.clone(), self.sender.as_ref()).await;

        for (job, result) in sorted.iter().zip(results.into_iter()) {
            match (result.success, result.robot_id) {
                (true, Some(robot_id)) => {
                    if let Some(robot) = robots.iter().find(|r| r.id == robot_id) {
                        if self.queue.assign(job.id, robot).is_none() {
                            tracing::warn!(job_id = %job.id, "distributor assigned a job that left the queue");
                        }
                    }
                }
                _ => {
                    let reason = result.error_message.unwrap_or_else(|| "distribution failed".to_string());
                    self.queue.fail(job.id, reason);
                }
            }
        }
    }

    fn timeout_tick(&self) {
        for job_id in self.queue.check_timeouts() {
            tracing::warn!(%job_id, "job timed out");
        }
    }

    fn health_sweep_tick(&self) {
        for robot_id in self.health.sweep() {
            tracing::warn!(%robot_id, "robot health sweep found a newly unhealthy robot");
        }
    }

    async fn persistence_tick(&self) {
        for job in self.queue.running_jobs() {
            if let Err(err) = self.storage.save_job(job).await {
                tracing::error!(%err, "persistence sweep failed to save a running job");
            }
        }
    }

    /// Called once a robot's handshake succeeds. Persistence already
    /// happened inside the session; this only logs.
    pub fn handle_robot_connected(&self, robot: Robot) {
        tracing::info!(robot_id = %robot.id, name = %robot.name, "robot connected");
    }

    /// Called when a robot's session ends. Marks it offline, drops its
    /// selector affinity, and attempts to fail over its in-flight jobs to
    /// another available robot.
    pub async fn handle_robot_disconnected(&self, robot_id: RobotId) {
        tracing::info!(%robot_id, "robot disconnected");
        if let Err(err) = self.storage.update_robot_status(robot_id, RobotStatus::Offline).await {
            tracing::error!(%robot_id, %err, "failed to mark disconnected robot offline");
        }
        self.health.forget(robot_id);
        self.distributor.evict_robot_affinity(robot_id);

        let active = self.queue.robot_jobs(robot_id);
        if active.is_empty() {
            return;
        }
        let job_ids: Vec<JobId> = active.iter().map(|j| j.id).collect();
        let jobs_by_id: HashMap<JobId, Job> = active.into_iter().map(|j| (j.id, j)).collect();

        let available: Vec<Robot> = match self.storage.get_robots().await {
            Ok(robots) => robots
                .into_iter()
                .filter(|r| r.id != robot_id)
                .map(|mut robot| {
                    robot.current_jobs = self.queue.robot_jobs(robot.id).len() as u32;
                    robot
                })
                .filter(Robot::is_available)
                .collect(),
            Err(_) => Vec::new(),
        };
        let available = Arc::new(Mutex::new(available));
        let queue = self.queue.clone();
        let sender = self.sender.clone();

        self.recovery
            .recover_robot_crash(robot_id, &job_ids, move |job_id| {
                let available = available.clone();
                let queue = queue.clone();
                let sender = sender.clone();
                let job = jobs_by_id.get(&job_id).cloned();
                async move {
                    let Some(_job) = job else { return false };
                    let chosen = {
                        let mut candidates = available.lock();
                        if candidates.is_empty() {
                            None
                        } else {
                            Some(candidates.remove(0))
                        }
                    };
                    let Some(robot) = chosen else { return false };
                    let Some(reassigned) = queue.reassign(job_id, &robot) else { return false };
                    matches!(sender.send_job(robot.id, &reassigned).await, SendOutcome::Accepted)
                }
            })
            .await;
    }

    pub fn handle_job_progress(&self, job_id: JobId, progress: u8, current_node: Option<String>) {
        tracing::debug!(%job_id, progress, ?current_node, "job progress");
    }

    pub fn handle_job_complete(&self, job_id: JobId, _result: Option<serde_json::Value>) {
        tracing::info!(%job_id, "job completed");
    }

    pub fn handle_job_failed(&self, job_id: JobId, error_message: String) {
        tracing::warn!(%job_id, %error_message, "job failed");
    }

    pub fn handle_job_cancelled(&self, job_id: JobId) {
        tracing::info!(%job_id, "job cancelled");
    }

    /// Inserts a recurring/cron schedule directly, bypassing `submit_job`'s
    /// one-shot path. Used by the daemon to load schedules persisted from
    /// a previous run.
    pub fn register_schedule(&self, schedule: Schedule, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.scheduler.add_schedule(schedule, now)
    }

    pub fn remove_schedule(&self, schedule_id: ScheduleId) -> bool {
        self.scheduler.remove_schedule(schedule_id)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
