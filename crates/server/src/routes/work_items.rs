use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use bookflow_core::domain::booking::{BookingPriority, BookingRequest};
use bookflow_core::domain::work_item::{NewWorkItem, WorkItem, WorkItemHistory, WorkItemId};
use bookflow_core::domain::workflow::{StepId, WorkflowId, WorkflowStep};
use bookflow_core::errors::ApplicationError;

use crate::context::RequestContext;
use crate::error::ApiResult;
use crate::services::booking::AdmissionOutcome;
use crate::services::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/work-items", get(list_items).post(create_item))
        .route("/api/v1/work-items/{id}", get(get_item))
        .route("/api/v1/work-items/{id}/transition", post(transition_item))
        .route("/api/v1/work-items/{id}/next-steps", get(next_steps))
        .route("/api/v1/work-items/{id}/history", get(item_history))
        .route("/api/v1/work-items/{id}/bookings", get(item_bookings).post(book_step))
        .route("/api/v1/work-items/{id}/bookings/complete", post(settle_bookings))
        .route("/api/v1/work-items/{id}/bookings/cancel", post(cancel_bookings))
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkItemBody {
    pub workflow_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: BookingPriority,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Explicit starting step; defaults to the workflow's first step.
    pub initial_step: Option<i64>,
}

fn default_priority() -> BookingPriority {
    BookingPriority::Normal
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    only_open: bool,
}

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub to_step: i64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct BookStepBody {
    pub step_id: i64,
    pub start: DateTime<Utc>,
    pub duration_hours: Option<Decimal>,
}

async fn create_item(
    State(state): State<AppState>,
    context: RequestContext,
    Json(body): Json<CreateWorkItemBody>,
) -> ApiResult<WorkItem> {
    let new = NewWorkItem {
        org_id: context.org_id,
        workflow_id: WorkflowId(body.workflow_id),
        title: body.title,
        description: body.description,
        priority: body.priority,
        data: body.data,
        created_by: context.actor_id,
    };
    let item =
        state.work_items.create_work_item(new, body.initial_step.map(StepId)).await?;
    Ok(Json(item))
}

async fn list_items(
    State(state): State<AppState>,
    context: RequestContext,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<WorkItem>> {
    let items = state.work_items.list(&context.org_id, query.only_open).await?;
    Ok(Json(items))
}

async fn get_item(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<WorkItem> {
    let item = state.work_items.get(&context.org_id, WorkItemId(id)).await?;
    Ok(Json(item))
}

async fn transition_item(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Json(body): Json<TransitionBody>,
) -> ApiResult<WorkItem> {
    let item = state
        .work_items
        .transition(
            &context.org_id,
            WorkItemId(id),
            StepId(body.to_step),
            &context.actor_id,
            body.notes,
        )
        .await?;
    Ok(Json(item))
}

async fn next_steps(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Vec<WorkflowStep>> {
    let steps = state.work_items.legal_next_steps(&context.org_id, WorkItemId(id)).await?;
    Ok(Json(steps))
}

async fn item_history(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Vec<WorkItemHistory>> {
    let history = state.work_items.history(&context.org_id, WorkItemId(id)).await?;
    Ok(Json(history))
}

async fn item_bookings(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<Vec<BookingRequest>> {
    state.work_items.get(&context.org_id, WorkItemId(id)).await?;
    let bookings = state.bridge.bookings_for_work_item(&context.org_id, id).await?;
    Ok(Json(bookings))
}

/// Book the assigned team of one workflow step for this work item.
async fn book_step(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Json(body): Json<BookStepBody>,
) -> ApiResult<AdmissionOutcome> {
    let item = state.work_items.get(&context.org_id, WorkItemId(id)).await?;
    let definition =
        state.work_items.get_workflow(&context.org_id, item.workflow_id).await?;
    let step = definition
        .steps
        .iter()
        .find(|s| s.id.0 == body.step_id)
        .ok_or_else(|| ApplicationError::not_found("workflow step", body.step_id.to_string()))?;

    let outcome = state
        .bridge
        .create_work_item_booking(&item, step, &context.actor_id, body.start, body.duration_hours)
        .await?;
    Ok(Json(outcome))
}

async fn settle_bookings(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.work_items.get(&context.org_id, WorkItemId(id)).await?;
    let changed = state
        .bridge
        .complete_work_item_bookings(&context.org_id, id, &context.actor_id)
        .await?;
    Ok(Json(serde_json::json!({ "changed": changed })))
}

async fn cancel_bookings(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state.work_items.get(&context.org_id, WorkItemId(id)).await?;
    let changed = state.bridge.cancel_work_item_bookings(&context.org_id, id).await?;
    Ok(Json(serde_json::json!({ "changed": changed })))
}
