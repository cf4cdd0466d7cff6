// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use orc_core::{FakeClock, JobStatus, Priority, RobotBuilder, WorkflowBuilder};
use orc_storage::InMemoryStore;
use parking_lot::Mutex as PlMutex;
use std::sync::Arc;

struct RecordingSender {
    outcome: PlMutex<SendOutcome>,
    sent: PlMutex<Vec<(RobotId, JobId)>>,
}

impl RecordingSender {
    fn accepting() -> Arc<Self> {
        Arc::new(Self { outcome: PlMutex::new(SendOutcome::Accepted), sent: PlMutex::new(Vec::new()) })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self { outcome: PlMutex::new(SendOutcome::Rejected("no capacity".into())), sent: PlMutex::new(Vec::new()) })
    }
}

#[async_trait]
impl JobSender for RecordingSender {
    async fn send_job(&self, robot_id: RobotId, job: &Job) -> SendOutcome {
        self.sent.lock().push((robot_id, job.id));
        self.outcome.lock().clone()
    }
}

fn engine(sender: Arc<dyn JobSender>) -> (Engine<FakeClock, InMemoryStore>, FakeClock, Arc<InMemoryStore>) {
    let clock = FakeClock::new();
    let storage = Arc::new(InMemoryStore::new());
    let config = EngineConfig { max_retries: 1, retry_delay: Duration::from_millis(0), ..EngineConfig::default() };
    let engine = Engine::new(clock.clone(), storage.clone(), config, b"test-secret".to_vec(), sender);
    (engine, clock, storage)
}

#[tokio::test]
async fn submit_job_enqueues_and_returns_a_queued_job() {
    let (engine, _clock, _storage) = engine(RecordingSender::accepting());
    let job = engine
        .submit_job(WorkflowId::new(), "extract-invoice", serde_json::json!({}), Priority::High, None, None, false, &[])
        .await
        .expect("submission succeeds");

    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(engine.queue().queue_depth(), 1);
}

#[tokio::test]
async fn submit_job_rejects_a_duplicate_within_the_dedup_window() {
    let (engine, _clock, _storage) = engine(RecordingSender::accepting());
    let workflow_id = WorkflowId::new();
    engine
        .submit_job(workflow_id, "extract-invoice", serde_json::json!({}), Priority::Normal, None, None, true, &[])
        .await
        .expect("first submission succeeds");

    let err = engine
        .submit_job(workflow_id, "extract-invoice", serde_json::json!({}), Priority::Normal, None, None, true, &[])
        .await
        .expect_err("duplicate submission is rejected");
    assert!(matches!(err, OrchestratorError::Rejected(BusinessRejection::Duplicate)));
}

#[tokio::test]
async fn submit_job_with_a_future_scheduled_time_registers_a_schedule_instead_of_enqueuing() {
    let (engine, clock, storage) = engine(RecordingSender::accepting());
    let workflow = WorkflowBuilder::default().build();
    storage.save_workflow(workflow.clone()).await.expect("save workflow");

    let when = clock.now_utc() + chrono::Duration::hours(1);
    let job = engine
        .submit_job(workflow.id, workflow.name.clone(), workflow.json_definition.clone(), Priority::Normal, None, Some(when), false, &[])
        .await
        .expect("deferred submission succeeds");

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.scheduled_time, Some(when));
    assert_eq!(engine.queue().queue_depth(), 0, "not enqueued yet");
    assert_eq!(engine.scheduler().all_schedules().len(), 1);
}

#[tokio::test]
async fn dispatch_tick_assigns_a_queued_job_to_an_available_robot() {
    let sender = RecordingSender::accepting();
    let (engine, _clock, storage) = engine(sender.clone());
    let robot = RobotBuilder::default().build();
    storage.save_robot(robot.clone()).await.expect("save robot");

    let job = engine
        .submit_job(WorkflowId::new(), "extract-invoice", serde_json::json!({}), Priority::Normal, None, None, false, &[])
        .await
        .expect("submission succeeds");

    engine.dispatch_tick().await;

    let dispatched = engine.queue().get_job(job.id).expect("job tracked");
    assert_eq!(dispatched.status, JobStatus::Running);
    assert_eq!(dispatched.robot_id, Some(robot.id));
    assert_eq!(sender.sent.lock().as_slice(), &[(robot.id, job.id)]);
}

#[tokio::test]
async fn dispatch_tick_fails_a_job_when_every_robot_rejects_it() {
    let sender = RecordingSender::rejecting();
    let (engine, _clock, storage) = engine(sender);
    let robot = RobotBuilder::default().build();
    storage.save_robot(robot).await.expect("save robot");

    let job = engine
        .submit_job(WorkflowId::new(), "extract-invoice", serde_json::json!({}), Priority::Normal, None, None, false, &[])
        .await
        .expect("submission succeeds");

    engine.dispatch_tick().await;

    let failed = engine.queue().get_job(job.id).expect("job tracked");
    assert_eq!(failed.status, JobStatus::Failed);
}

#[tokio::test]
async fn timeout_tick_marks_expired_running_jobs() {
    let sender = RecordingSender::accepting();
    let clock = FakeClock::new();
    let storage = Arc::new(InMemoryStore::new());
    let config = EngineConfig { default_job_timeout: Duration::from_secs(2), ..EngineConfig::default() };
    let engine = Engine::new(clock.clone(), storage.clone(), config, b"test-secret".to_vec(), sender);

    let robot = RobotBuilder::default().build();
    storage.save_robot(robot).await.expect("save robot");
    let job = engine
        .submit_job(WorkflowId::new(), "extract-invoice", serde_json::json!({}), Priority::Normal, None, None, false, &[])
        .await
        .expect("submission succeeds");
    engine.dispatch_tick().await;

    clock.advance(Duration::from_secs(3));
    engine.timeout_tick();

    assert_eq!(engine.queue().get_job(job.id).unwrap().status, JobStatus::Timeout);
}

#[tokio::test]
async fn disconnecting_a_robot_fails_over_its_running_jobs_to_another_available_robot() {
    let sender = RecordingSender::accepting();
    let (engine, _clock, storage) = engine(sender.clone());
    let crashed = RobotBuilder::default().name("crashed").build();
    let replacement = RobotBuilder::default().name("replacement").build();
    storage.save_robot(crashed.clone()).await.expect("save crashed robot");
    storage.save_robot(replacement.clone()).await.expect("save replacement robot");

    let job = engine
        .submit_job(WorkflowId::new(), "extract-invoice", serde_json::json!({}), Priority::Normal, Some(crashed.id), None, false, &[])
        .await
        .expect("submission succeeds");
    engine.dispatch_tick().await;
    assert_eq!(engine.queue().get_job(job.id).unwrap().robot_id, Some(crashed.id));

    engine.handle_robot_disconnected(crashed.id).await;

    let reassigned = engine.queue().get_job(job.id).expect("job still tracked");
    assert_eq!(reassigned.status, JobStatus::Running);
    assert_eq!(reassigned.robot_id, Some(replacement.id));

    let offline = storage.get_robots().await.unwrap().into_iter().find(|r| r.id == crashed.id).unwrap();
    assert_eq!(offline.status, RobotStatus::Offline);
}

#[tokio::test]
async fn start_and_stop_spawn_and_join_background_loops() {
    let engine = Arc::new(engine(RecordingSender::accepting()).0);
    engine.start();
    tokio::time::sleep(Duration::from_millis(5)).await;
    engine.stop().await;
}
