use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking::BookingPriority;
use crate::domain::workflow::{StepId, WorkflowId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItemId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItemHistoryId(pub i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub uuid: Uuid,
    pub org_id: String,
    pub workflow_id: WorkflowId,
    /// Invariant: always a step of `workflow_id`.
    pub current_step: StepId,
    pub title: String,
    pub description: String,
    pub priority: BookingPriority,
    pub data: serde_json::Value,
    /// Derived: true exactly when `current_step` is terminal.
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit record of a step transition. `from_step` is None
/// for the initial placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItemHistory {
    pub id: WorkItemHistoryId,
    pub work_item_id: WorkItemId,
    pub from_step: Option<StepId>,
    pub to_step: StepId,
    pub changed_by: String,
    pub notes: String,
    pub data_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewWorkItem {
    pub org_id: String,
    pub workflow_id: WorkflowId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: BookingPriority,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_by: String,
}

impl NewWorkItem {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.org_id.trim().is_empty() {
            return Err(DomainError::MissingField("org_id"));
        }
        if self.title.trim().is_empty() {
            return Err(DomainError::MissingField("title"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewWorkItemHistory {
    pub work_item_id: WorkItemId,
    pub from_step: Option<StepId>,
    pub to_step: StepId,
    pub changed_by: String,
    pub notes: String,
    pub data_snapshot: serde_json::Value,
}
