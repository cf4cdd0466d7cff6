// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definition record. The orchestrator stores and routes these
//! by id but never interprets `json_definition` — it is an opaque
//! payload the robot executes.

use crate::job::WorkflowId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Published,
    Archived,
}

crate::simple_display! {
    WorkflowStatus {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: String,
    pub json_definition: serde_json::Value,
    pub version: u32,
    pub status: WorkflowStatus,
}

impl Workflow {
    pub fn new(name: impl Into<String>, json_definition: serde_json::Value) -> Self {
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            description: String::new(),
            json_definition,
            version: 1,
            status: WorkflowStatus::Draft,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct WorkflowBuilder => Workflow {
        into {
            name: String = "test-workflow",
            description: String = "",
        }
        set {
            json_definition: serde_json::Value = serde_json::Value::Null,
            version: u32 = 1,
            status: WorkflowStatus = WorkflowStatus::Draft,
        }
        computed {
            id: WorkflowId = WorkflowId::new(),
        }
    }
}
