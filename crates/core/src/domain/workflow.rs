use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub org_id: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub workflow_id: WorkflowId,
    pub name: String,
    pub description: String,
    /// Placement within the workflow; strictly increasing but not
    /// required to be contiguous.
    pub order: i64,
    pub assigned_team: Option<String>,
    pub requires_booking: bool,
    pub estimated_duration_hours: Option<Decimal>,
    pub is_terminal: bool,
}

/// Directed edge between two steps of the same workflow. Uniqueness is
/// per ordered pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub id: TransitionId,
    pub from_step: StepId,
    pub to_step: StepId,
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub org_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_by: Option<String>,
}

impl NewWorkflow {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.org_id.trim().is_empty() {
            return Err(DomainError::MissingField("org_id"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::MissingField("name"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflowStep {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub order: i64,
    pub assigned_team: Option<String>,
    #[serde(default)]
    pub requires_booking: bool,
    pub estimated_duration_hours: Option<Decimal>,
    #[serde(default)]
    pub is_terminal: bool,
}

/// Edge spec by step name; resolved to step ids when the definition is
/// persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflowTransition {
    pub from_step: String,
    pub to_step: String,
    pub label: Option<String>,
}
