use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::models::event::UploadEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub enum PipelineState {
    CreateRecord,
    ParallelTransform,
    MergeResults,
    UpdateRecord,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::CreateRecord => "CreateRecord",
            PipelineState::ParallelTransform => "ParallelTransform",
            PipelineState::MergeResults => "MergeResults",
            PipelineState::UpdateRecord => "UpdateRecord",
            PipelineState::Succeeded => "Succeeded",
            PipelineState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Outcome of one transform branch. `Done(None)` is the soft-miss result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum BranchSlot {
    Pending,
    Done(Option<String>),
    Failed(String),
}

impl BranchSlot {
    pub fn is_settled(&self) -> bool {
        !matches!(self, BranchSlot::Pending)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub struct MergedResults {
    pub normalized: Option<String>,
    pub blur_hash: Option<String>,
}

/// Typed payload threaded through every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    pub bucket: String,
    pub original_key: String,
    pub normalized: BranchSlot,
    pub placeholder: BranchSlot,
    pub merged: Option<MergedResults>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInstance {
    pub id: String,
    pub state: PipelineState,
    pub context: PipelineContext,
    /// Number of times a driver has picked this instance up; above one means it was resumed.
    pub runs: u32,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PipelineInstance {
    pub fn new(event: UploadEvent) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: Ulid::new().to_string(),
            state: PipelineState::CreateRecord,
            context: PipelineContext {
                bucket: event.bucket,
                original_key: event.key,
                normalized: BranchSlot::Pending,
                placeholder: BranchSlot::Pending,
                merged: None,
            },
            runs: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_resumed(&self) -> bool {
        self.runs > 1
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}
