// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn available_when_online_and_under_capacity() {
    let robot = Robot::builder().status(RobotStatus::Online).max_concurrent_jobs(2).current_jobs(1).build();
    assert!(robot.is_available());
}

#[test]
fn unavailable_when_at_capacity() {
    let robot = Robot::builder().status(RobotStatus::Online).max_concurrent_jobs(2).current_jobs(2).build();
    assert!(!robot.is_available());
}

#[test]
fn unavailable_when_offline() {
    let robot = Robot::builder().status(RobotStatus::Offline).max_concurrent_jobs(2).current_jobs(0).build();
    assert!(!robot.is_available());
}

#[test]
fn utilization_is_fraction_of_capacity() {
    let robot = Robot::builder().max_concurrent_jobs(4).current_jobs(1).build();
    assert_eq!(robot.utilization(), 0.25);
}

#[test]
fn utilization_saturates_when_capacity_zero() {
    let robot = Robot::builder().max_concurrent_jobs(0).build();
    assert_eq!(robot.utilization(), 1.0);
}

#[test]
fn new_robot_starts_offline_with_no_jobs() {
    let robot = Robot::new("r1", 3);
    assert_eq!(robot.status, RobotStatus::Offline);
    assert_eq!(robot.current_jobs, 0);
    assert!(!robot.is_available());
}
