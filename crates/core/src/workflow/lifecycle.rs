//! Work item step transitions. Planning is pure: the caller fetches
//! the item and graph, we produce the updated item plus the history
//! record to append, and the repository applies both atomically.

use chrono::{DateTime, Utc};

use crate::domain::work_item::{NewWorkItemHistory, WorkItem};
use crate::domain::workflow::StepId;
use crate::errors::DomainError;
use crate::workflow::graph::WorkflowGraph;

#[derive(Clone, Debug)]
pub struct TransitionPlan {
    pub item: WorkItem,
    pub history: NewWorkItemHistory,
}

/// Recompute the derived completion fields from the current step.
/// Runs on every transition, in both directions, so moving out of a
/// terminal step reopens the item.
fn apply_completion(item: &mut WorkItem, graph: &WorkflowGraph, now: DateTime<Utc>) {
    let terminal = graph.is_terminal(item.current_step);
    if terminal && !item.is_completed {
        item.is_completed = true;
        item.completed_at = Some(now);
    } else if !terminal && item.is_completed {
        item.is_completed = false;
        item.completed_at = None;
    }
}

/// Plan moving `item` to `to_step`. The move must follow a defined
/// transition edge; the plan carries a data snapshot taken before any
/// caller-side mutation.
pub fn plan_transition(
    graph: &WorkflowGraph,
    item: &WorkItem,
    to_step: StepId,
    changed_by: &str,
    notes: String,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, DomainError> {
    if !graph.contains(to_step) {
        return Err(DomainError::Integrity(format!(
            "step {} is not part of workflow {}",
            to_step.0,
            graph.workflow_id().0
        )));
    }
    if !graph.can_transition(item.current_step, to_step) {
        return Err(DomainError::StepNotReachable {
            from: item.current_step.0,
            to: to_step.0,
        });
    }

    let mut updated = item.clone();
    let from_step = updated.current_step;
    updated.current_step = to_step;
    updated.updated_at = now;
    apply_completion(&mut updated, graph, now);

    let history = NewWorkItemHistory {
        work_item_id: item.id,
        from_step: Some(from_step),
        to_step,
        changed_by: changed_by.to_string(),
        notes,
        data_snapshot: item.data.clone(),
    };

    Ok(TransitionPlan { item: updated, history })
}

/// History record for a freshly created item placed on its first step.
pub fn initial_history(item: &WorkItem) -> NewWorkItemHistory {
    NewWorkItemHistory {
        work_item_id: item.id,
        from_step: None,
        to_step: item.current_step,
        changed_by: item.created_by.clone(),
        notes: String::new(),
        data_snapshot: item.data.clone(),
    }
}
