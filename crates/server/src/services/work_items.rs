//! Workflow definitions and work item lifecycle. Definitions are
//! validated as a graph before they are persisted; transitions are
//! planned in the core and applied atomically by the repository.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use bookflow_core::domain::work_item::{NewWorkItem, WorkItem, WorkItemHistory, WorkItemId};
use bookflow_core::domain::workflow::{
    NewWorkflow, NewWorkflowStep, NewWorkflowTransition, StepId, Workflow, WorkflowId,
    WorkflowStep, WorkflowTransition,
};
use bookflow_core::errors::{ApplicationError, DomainError};
use bookflow_core::workflow::graph::WorkflowGraph;
use bookflow_core::workflow::lifecycle::plan_transition;
use bookflow_db::repositories::{WorkItemRepository, WorkflowRepository};

use crate::services::persistence;

#[derive(Clone, Debug, Serialize)]
pub struct WorkflowDefinition {
    pub workflow: Workflow,
    pub steps: Vec<WorkflowStep>,
    pub transitions: Vec<WorkflowTransition>,
}

pub struct WorkItemService {
    workflows: Arc<dyn WorkflowRepository>,
    items: Arc<dyn WorkItemRepository>,
}

impl WorkItemService {
    pub fn new(workflows: Arc<dyn WorkflowRepository>, items: Arc<dyn WorkItemRepository>) -> Self {
        Self { workflows, items }
    }

    fn validate_definition(
        steps: &[NewWorkflowStep],
        transitions: &[NewWorkflowTransition],
    ) -> Result<(), DomainError> {
        if steps.is_empty() {
            return Err(DomainError::InvalidConfig(
                "workflow must define at least one step".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for step in steps {
            if step.name.trim().is_empty() {
                return Err(DomainError::MissingField("step name"));
            }
            if !names.insert(step.name.as_str()) {
                return Err(DomainError::InvalidConfig(format!(
                    "duplicate step name `{}`",
                    step.name
                )));
            }
        }
        if !steps.iter().any(|s| s.is_terminal) {
            return Err(DomainError::InvalidConfig(
                "workflow must define at least one terminal step".to_string(),
            ));
        }
        for transition in transitions {
            for endpoint in [&transition.from_step, &transition.to_step] {
                if !names.contains(endpoint.as_str()) {
                    return Err(DomainError::InvalidConfig(format!(
                        "transition references unknown step `{endpoint}`"
                    )));
                }
            }
        }
        Ok(())
    }

    pub async fn create_workflow(
        &self,
        new: NewWorkflow,
        steps: Vec<NewWorkflowStep>,
        transitions: Vec<NewWorkflowTransition>,
    ) -> Result<WorkflowDefinition, ApplicationError> {
        new.validate()?;
        Self::validate_definition(&steps, &transitions)?;

        let (workflow, steps, transitions) = self
            .workflows
            .create_definition(new, steps, transitions)
            .await
            .map_err(persistence)?;
        // Rebuild the graph from stored rows so a definition that
        // cannot be traversed never leaves this function.
        WorkflowGraph::new(workflow.id, steps.clone(), transitions.clone())?;

        info!(
            event_name = "workflow.created",
            correlation_id = workflow.id.0,
            workflow_id = workflow.id.0,
            step_count = steps.len(),
            "workflow definition stored"
        );
        Ok(WorkflowDefinition { workflow, steps, transitions })
    }

    pub async fn get_workflow(
        &self,
        org_id: &str,
        id: WorkflowId,
    ) -> Result<WorkflowDefinition, ApplicationError> {
        let workflow = self
            .workflows
            .find_by_id(org_id, id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("workflow", id.0.to_string()))?;
        let steps = self.workflows.list_steps(id).await.map_err(persistence)?;
        let transitions = self.workflows.list_transitions(id).await.map_err(persistence)?;
        Ok(WorkflowDefinition { workflow, steps, transitions })
    }

    pub async fn list_workflows(&self, org_id: &str) -> Result<Vec<Workflow>, ApplicationError> {
        self.workflows.list_for_org(org_id).await.map_err(persistence)
    }

    async fn load_graph(&self, workflow_id: WorkflowId) -> Result<WorkflowGraph, ApplicationError> {
        let steps = self.workflows.list_steps(workflow_id).await.map_err(persistence)?;
        let transitions =
            self.workflows.list_transitions(workflow_id).await.map_err(persistence)?;
        Ok(WorkflowGraph::new(workflow_id, steps, transitions)?)
    }

    /// Create a work item on `initial_step` when given, otherwise on
    /// the workflow's first step by display order.
    pub async fn create_work_item(
        &self,
        new: NewWorkItem,
        initial_step: Option<StepId>,
    ) -> Result<WorkItem, ApplicationError> {
        new.validate()?;
        self.workflows
            .find_by_id(&new.org_id, new.workflow_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                ApplicationError::not_found("workflow", new.workflow_id.0.to_string())
            })?;
        let graph = self.load_graph(new.workflow_id).await?;

        let step = match initial_step {
            Some(step) => {
                if !graph.contains(step) {
                    return Err(DomainError::Integrity(format!(
                        "step {} is not part of workflow {}",
                        step.0, new.workflow_id.0
                    ))
                    .into());
                }
                step
            }
            None => {
                graph
                    .initial_step()
                    .ok_or_else(|| {
                        DomainError::Integrity("workflow has no steps".to_string())
                    })?
                    .id
            }
        };

        let item = self.items.create(new, step).await.map_err(persistence)?;
        info!(
            event_name = "work_item.created",
            correlation_id = %item.uuid,
            work_item_id = item.id.0,
            workflow_id = item.workflow_id.0,
            step_id = item.current_step.0,
            "work item created"
        );
        Ok(item)
    }

    async fn load_item(
        &self,
        org_id: &str,
        id: WorkItemId,
    ) -> Result<WorkItem, ApplicationError> {
        self.items
            .find_by_id(org_id, id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("work item", id.0.to_string()))
    }

    pub async fn get(&self, org_id: &str, id: WorkItemId) -> Result<WorkItem, ApplicationError> {
        self.load_item(org_id, id).await
    }

    pub async fn list(
        &self,
        org_id: &str,
        only_open: bool,
    ) -> Result<Vec<WorkItem>, ApplicationError> {
        self.items.list_for_org(org_id, only_open).await.map_err(persistence)
    }

    /// Move a work item along a defined transition edge. Completion is
    /// derived from the destination step, so moving into a terminal
    /// step completes the item and moving out reopens it.
    pub async fn transition(
        &self,
        org_id: &str,
        id: WorkItemId,
        to_step: StepId,
        changed_by: &str,
        notes: String,
    ) -> Result<WorkItem, ApplicationError> {
        let item = self.load_item(org_id, id).await?;
        let graph = self.load_graph(item.workflow_id).await?;
        let plan = plan_transition(&graph, &item, to_step, changed_by, notes, Utc::now())?;
        self.items.apply_transition(&plan).await.map_err(persistence)?;

        info!(
            event_name = "work_item.transitioned",
            correlation_id = %plan.item.uuid,
            work_item_id = plan.item.id.0,
            from_step = item.current_step.0,
            to_step = to_step.0,
            is_completed = plan.item.is_completed,
            "work item moved to a new step"
        );
        Ok(plan.item)
    }

    pub async fn legal_next_steps(
        &self,
        org_id: &str,
        id: WorkItemId,
    ) -> Result<Vec<WorkflowStep>, ApplicationError> {
        let item = self.load_item(org_id, id).await?;
        let graph = self.load_graph(item.workflow_id).await?;
        Ok(graph.legal_next_steps(item.current_step).into_iter().cloned().collect())
    }

    pub async fn history(
        &self,
        org_id: &str,
        id: WorkItemId,
    ) -> Result<Vec<WorkItemHistory>, ApplicationError> {
        self.load_item(org_id, id).await?;
        self.items.list_history(id).await.map_err(persistence)
    }
}
