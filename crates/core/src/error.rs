// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy, grouped by meaning rather than by call site.
//!
//! The four categories below mirror how callers are meant to react: a
//! [`ValidationError`] is returned to the caller verbatim and never
//! mutates state; a [`TransientError`] is the recovery manager's business;
//! a [`BusinessRejection`] is a normal, expected "no" (duplicate, quota,
//! no robot available); a [`FatalError`] is logged, the offending item is
//! skipped, and the rest of the system keeps running.

use thiserror::Error;

/// Bad submission, invalid transition, or unknown id. No retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("unknown robot: {0}")]
    UnknownRobot(String),

    #[error("unknown schedule: {0}")]
    UnknownSchedule(String),

    #[error("progress must be within [0, 100], got {0}")]
    ProgressOutOfRange(u8),

    #[error("cron expression is invalid: {0}")]
    InvalidCronExpression(String),
}

/// Connection drop, timeout, resource busy. Caught by the recovery
/// manager and retried with backoff per policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransientError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("temporary error: {0}")]
    Temporary(String),

    #[error("resource busy: {0}")]
    ResourceBusy(String),
}

impl TransientError {
    /// Whether the recovery manager's default retriable set covers this
    /// error. Matches spec's `{ConnectionError, TimeoutError,
    /// NetworkError, TemporaryError, ResourceBusy}` default.
    pub fn is_retriable_by_default(&self) -> bool {
        true
    }
}

/// Duplicate submission, quota exceeded, robot unavailable. Returned to
/// the caller verbatim; never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusinessRejection {
    #[error("duplicate")]
    Duplicate,

    #[error("no eligible robot available")]
    NoRobotAvailable,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("robot at capacity: {0}")]
    RobotAtCapacity(String),
}

/// Invalid cron expression at load, corrupt persisted state. Logged; the
/// offending item is skipped; the rest of the system continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("invalid cron expression in schedule {schedule_id}: {message}")]
    InvalidSchedule { schedule_id: String, message: String },

    #[error("corrupt persisted state: {0}")]
    CorruptState(String),
}

/// Umbrella error for call sites that need one return type across
/// categories (e.g. the engine's public API).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transient(#[from] TransientError),

    #[error(transparent)]
    Rejected(#[from] BusinessRejection),

    #[error(transparent)]
    Fatal(#[from] FatalError),
}
