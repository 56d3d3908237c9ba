use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use bookflow_core::domain::workflow::{
    NewWorkflow, NewWorkflowStep, NewWorkflowTransition, Workflow, WorkflowId,
};

use crate::context::RequestContext;
use crate::error::ApiResult;
use crate::services::work_items::WorkflowDefinition;
use crate::services::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/workflows", get(list_workflows).post(create_workflow))
        .route("/api/v1/workflows/{id}", get(get_workflow))
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<NewWorkflowStep>,
    #[serde(default)]
    pub transitions: Vec<NewWorkflowTransition>,
}

async fn create_workflow(
    State(state): State<AppState>,
    context: RequestContext,
    Json(body): Json<CreateWorkflowBody>,
) -> ApiResult<WorkflowDefinition> {
    let new = NewWorkflow {
        org_id: context.org_id,
        name: body.name,
        description: body.description,
        created_by: Some(context.actor_id),
    };
    let definition =
        state.work_items.create_workflow(new, body.steps, body.transitions).await?;
    Ok(Json(definition))
}

async fn list_workflows(
    State(state): State<AppState>,
    context: RequestContext,
) -> ApiResult<Vec<Workflow>> {
    let workflows = state.work_items.list_workflows(&context.org_id).await?;
    Ok(Json(workflows))
}

async fn get_workflow(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<WorkflowDefinition> {
    let definition = state.work_items.get_workflow(&context.org_id, WorkflowId(id)).await?;
    Ok(Json(definition))
}
