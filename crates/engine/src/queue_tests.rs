// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orc_core::{FakeClock, Job, JobBuilder, Priority, Robot};
use std::time::Duration;

fn pending_job(clock: &FakeClock, priority: Priority) -> Job {
    Job::builder().status(JobStatus::Pending).priority(priority).created_at(clock.now_utc()).build()
}

fn queue() -> PriorityQueue<FakeClock> {
    PriorityQueue::new(FakeClock::new(), Duration::from_secs(300), Duration::from_secs(3600))
}

fn available_robot() -> Robot {
    Robot::builder().status(orc_core::RobotStatus::Online).max_concurrent_jobs(4).build()
}

#[test]
fn enqueue_requires_pending_status() {
    let q = queue();
    let job = JobBuilder::default().status(JobStatus::Queued).build();
    let outcome = q.enqueue(job, false, &[]);
    assert!(!outcome.ok);
}

#[test]
fn dequeue_returns_none_when_queue_empty() {
    let q = queue();
    assert!(q.dequeue(&available_robot()).is_none());
}

#[test]
fn dequeue_returns_none_for_unavailable_robot() {
    let q = queue();
    let clock = FakeClock::new();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let busy = Robot::builder().status(orc_core::RobotStatus::Offline).build();
    assert!(q.dequeue(&busy).is_none());
}

#[test]
fn priority_preemption_scenario() {
    // Scenario 2 from the concrete test matrix.
    let clock = FakeClock::new();
    let q = PriorityQueue::new(clock.clone(), Duration::from_secs(300), Duration::from_secs(3600));

    let j1 = pending_job(&clock, Priority::Normal);
    q.enqueue(j1.clone(), false, &[]);
    clock.advance(Duration::from_millis(1));
    let j2 = pending_job(&clock, Priority::High);
    q.enqueue(j2.clone(), false, &[]);
    clock.advance(Duration::from_millis(1));
    let j3 = pending_job(&clock, Priority::Normal);
    q.enqueue(j3.clone(), false, &[]);

    let robot = available_robot();
    let first = q.dequeue(&robot).unwrap();
    assert_eq!(first.id, j2.id, "HIGH priority job dispatches first");

    let second = q.dequeue(&robot).unwrap();
    assert_eq!(second.id, j1.id, "earlier NORMAL job dispatches before later one (FIFO)");

    let third = q.dequeue(&robot).unwrap();
    assert_eq!(third.id, j3.id);
}

#[test]
fn dequeue_skips_job_targeted_at_other_robot_and_reinserts_it() {
    let clock = FakeClock::new();
    let q = queue();
    let other_robot_id = orc_core::RobotId::new();
    let mut targeted = pending_job(&clock, Priority::Normal);
    targeted.robot_id = Some(other_robot_id);
    q.enqueue(targeted.clone(), false, &[]);

    let robot = available_robot();
    assert!(q.dequeue(&robot).is_none());

    // The job is still there for the robot it was targeted at.
    let other_robot = Robot::builder().status(orc_core::RobotStatus::Online).max_concurrent_jobs(1).build();
    let mut other_robot = other_robot;
    other_robot.id = other_robot_id;
    let dequeued = q.dequeue(&other_robot).unwrap();
    assert_eq!(dequeued.id, targeted.id);
}

#[test]
fn complete_requires_running_status() {
    let q = queue();
    let clock = FakeClock::new();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let job = q.queued_jobs().remove(0);
    let outcome = q.complete(job.id, None);
    assert!(!outcome.ok);
}

#[test]
fn full_lifecycle_enqueue_dequeue_complete() {
    let q = queue();
    let clock = FakeClock::new();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let robot = available_robot();
    let job = q.dequeue(&robot).unwrap();
    assert_eq!(job.status, JobStatus::Running);

    let outcome = q.complete(job.id, Some(serde_json::json!({"ok": true})));
    assert!(outcome.ok);
    let finished = q.get_job(job.id).unwrap();
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.progress, 100);
}

#[test]
fn second_complete_call_fails_without_mutating_state() {
    let q = queue();
    let clock = FakeClock::new();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let robot = available_robot();
    let job = q.dequeue(&robot).unwrap();
    assert!(q.complete(job.id, None).ok);
    let second = q.complete(job.id, None);
    assert!(!second.ok);
}

#[test]
fn cancel_on_terminal_job_fails() {
    let q = queue();
    let clock = FakeClock::new();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let robot = available_robot();
    let job = q.dequeue(&robot).unwrap();
    q.complete(job.id, None);
    let outcome = q.cancel(job.id, "too late");
    assert!(!outcome.ok);
}

#[test]
fn cancel_releases_robot_from_running_set() {
    let q = queue();
    let clock = FakeClock::new();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let robot = available_robot();
    let job = q.dequeue(&robot).unwrap();
    assert_eq!(q.robot_jobs(robot.id).len(), 1);
    q.cancel(job.id, "stop");
    assert_eq!(q.robot_jobs(robot.id).len(), 0);
}

#[test]
fn update_progress_clamps_and_requires_running() {
    let q = queue();
    let clock = FakeClock::new();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let job = q.queued_jobs().remove(0);
    assert!(!q.update_progress(job.id, 50, None));

    let robot = available_robot();
    let running = q.dequeue(&robot).unwrap();
    assert!(q.update_progress(running.id, 250, Some("node-a".into())));
    assert_eq!(q.get_job(running.id).unwrap().progress, 100);
}

#[test]
fn check_timeouts_marks_expired_running_jobs() {
    let clock = FakeClock::new();
    let q = PriorityQueue::new(clock.clone(), Duration::from_secs(300), Duration::from_secs(2));
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let robot = available_robot();
    let job = q.dequeue(&robot).unwrap();

    clock.advance(Duration::from_secs(3));
    let timed_out = q.check_timeouts();
    assert_eq!(timed_out, vec![job.id]);
    assert_eq!(q.get_job(job.id).unwrap().status, JobStatus::Timeout);
}

#[test]
fn enqueue_rejects_duplicate_within_window() {
    let clock = FakeClock::new();
    let q = PriorityQueue::new(clock.clone(), Duration::from_secs(300), Duration::from_secs(3600));
    let wf = orc_core::WorkflowId::new();
    let job1 = Job::builder().status(JobStatus::Pending).workflow_id(wf).created_at(clock.now_utc()).build();
    assert!(q.enqueue(job1, true, &[("a".into(), "1".into())]).ok);

    clock.advance(Duration::from_secs(60));
    let job2 = Job::builder().status(JobStatus::Pending).workflow_id(wf).created_at(clock.now_utc()).build();
    assert!(!q.enqueue(job2, true, &[("a".into(), "1".into())]).ok);

    clock.advance(Duration::from_secs(301));
    let job3 = Job::builder().status(JobStatus::Pending).workflow_id(wf).created_at(clock.now_utc()).build();
    assert!(q.enqueue(job3, true, &[("a".into(), "1".into())]).ok);
}

#[test]
fn assign_binds_a_specific_queued_job_without_priority_ordering() {
    let clock = FakeClock::new();
    let q = queue();
    let low = pending_job(&clock, Priority::Low);
    clock.advance(Duration::from_millis(1));
    let high = pending_job(&clock, Priority::High);
    q.enqueue(low.clone(), false, &[]);
    q.enqueue(high.clone(), false, &[]);

    let robot = available_robot();
    let assigned = q.assign(low.id, &robot).expect("low-priority job is still queued");
    assert_eq!(assigned.status, JobStatus::Running);
    assert_eq!(assigned.robot_id, Some(robot.id));

    // dequeue still sees the higher-priority job untouched.
    let next = q.dequeue(&robot).unwrap();
    assert_eq!(next.id, high.id);
}

#[test]
fn assign_rejects_a_job_that_is_not_queued() {
    let clock = FakeClock::new();
    let q = queue();
    let job = pending_job(&clock, Priority::Normal);
    q.enqueue(job.clone(), false, &[]);
    let robot = available_robot();
    assert!(q.assign(job.id, &robot).is_some());
    assert!(q.assign(job.id, &robot).is_none(), "already RUNNING, not QUEUED");
}

#[test]
fn reassign_moves_a_running_job_to_a_new_robot() {
    let clock = FakeClock::new();
    let q = queue();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let original = available_robot();
    let job = q.dequeue(&original).unwrap();

    let replacement = available_robot();
    let reassigned = q.reassign(job.id, &replacement).expect("running job can be reassigned");
    assert_eq!(reassigned.robot_id, Some(replacement.id));
    assert_eq!(reassigned.status, JobStatus::Running, "status is untouched by reassignment");
    assert_eq!(q.robot_jobs(original.id).len(), 0);
    assert_eq!(q.robot_jobs(replacement.id).len(), 1);
}

#[test]
fn reassign_rejects_a_job_that_is_not_running() {
    let clock = FakeClock::new();
    let q = queue();
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    let job = q.queued_jobs().remove(0);
    assert!(q.reassign(job.id, &available_robot()).is_none());
}

#[test]
fn on_state_change_callback_fires_synchronously() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let clock = FakeClock::new();
    let q = PriorityQueue::new(clock.clone(), Duration::from_secs(300), Duration::from_secs(3600))
        .with_callback(Box::new(move |_job, _old, _new| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
    q.enqueue(pending_job(&clock, Priority::Normal), false, &[]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
