// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator's message envelope and its twelve canonical types.

use orc_core::{Job, RobotId};
use serde::{Deserialize, Serialize};

/// Current wire protocol version. Bumped on breaking payload changes.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Handshake,
    HandshakeAck,
    Heartbeat,
    RobotStatus,
    ExecuteJob,
    JobAccepted,
    JobRejected,
    JobProgress,
    JobCompleted,
    JobFailed,
    JobCancelled,
    Error,
}

/// Payload carried by a [`Message`]. Recognized fields depend on
/// [`MessageType`]; the envelope itself is untyped so a session can parse
/// the tag before committing to a payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Handshake {
        robot_id: RobotId,
        name: String,
        token: String,
        capabilities: Vec<String>,
        tags: Vec<String>,
        environment: Option<String>,
    },
    HandshakeAck {
        session_id: String,
        server_version: String,
    },
    Heartbeat {
        cpu_percent: f64,
        memory_percent: f64,
        disk_percent: f64,
        active_jobs: u32,
    },
    RobotStatus {
        status: String,
    },
    ExecuteJob {
        job: Box<Job>,
    },
    JobAccepted {
        job_id: String,
    },
    JobRejected {
        job_id: String,
        reason: Option<String>,
    },
    JobProgress {
        job_id: String,
        progress: u8,
        current_node: Option<String>,
    },
    JobCompleted {
        job_id: String,
        result: Option<serde_json::Value>,
    },
    JobFailed {
        job_id: String,
        error_message: String,
    },
    JobCancelled {
        job_id: String,
    },
    Error {
        message: String,
    },
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Handshake { .. } => MessageType::Handshake,
            Payload::HandshakeAck { .. } => MessageType::HandshakeAck,
            Payload::Heartbeat { .. } => MessageType::Heartbeat,
            Payload::RobotStatus { .. } => MessageType::RobotStatus,
            Payload::ExecuteJob { .. } => MessageType::ExecuteJob,
            Payload::JobAccepted { .. } => MessageType::JobAccepted,
            Payload::JobRejected { .. } => MessageType::JobRejected,
            Payload::JobProgress { .. } => MessageType::JobProgress,
            Payload::JobCompleted { .. } => MessageType::JobCompleted,
            Payload::JobFailed { .. } => MessageType::JobFailed,
            Payload::JobCancelled { .. } => MessageType::JobCancelled,
            Payload::Error { .. } => MessageType::Error,
        }
    }
}

/// A discrete wire record. Every message carries a monotonically
/// increasing `id` and a `timestamp`; when signing is enabled the HMAC
/// covers the serialized bytes of the envelope with `signature` cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub version: u32,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub id: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload: Payload,
    pub signature: Option<String>,
}

impl Message {
    pub fn new(id: u64, timestamp: chrono::DateTime<chrono::Utc>, payload: Payload) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type: payload.message_type(),
            id,
            timestamp,
            payload,
            signature: None,
        }
    }

    /// Bytes the HMAC signature is computed over: the envelope serialized
    /// with `signature` forced to `null`.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        serde_json::to_vec(&unsigned)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
