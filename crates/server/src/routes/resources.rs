use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use bookflow_core::domain::booking::BookingRequest;
use bookflow_core::domain::resource::{
    AvailabilityConfig, NewResource, ResourceId, SchedulableResource,
};
use bookflow_core::domain::rule::{NewRule, ResourceScheduleRule};
use bookflow_core::errors::ApplicationError;
use bookflow_core::scheduling::availability::{DayAvailability, UtilizationStats};
use bookflow_core::scheduling::suggest::TimeSuggestion;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::services::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/resources", get(list_resources).post(create_resource))
        .route("/api/v1/resources/{id}", get(get_resource))
        .route("/api/v1/resources/{id}/rules", get(list_rules).post(create_rule))
        .route("/api/v1/resources/{id}/availability", get(availability).put(set_availability))
        .route("/api/v1/resources/{id}/blackouts", post(add_blackout))
        .route("/api/v1/resources/{id}/schedule", get(schedule))
        .route("/api/v1/resources/{id}/utilization", get(utilization))
        .route("/api/v1/resources/{id}/suggest", get(suggest))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    only_active: bool,
}

#[derive(Debug, Deserialize)]
struct DateRangeQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

async fn create_resource(
    State(state): State<AppState>,
    context: RequestContext,
    Json(mut body): Json<NewResource>,
) -> ApiResult<SchedulableResource> {
    // The org always comes from the request context, never the body.
    body.org_id = context.org_id;
    body.validate().map_err(ApiError::from)?;
    let resource = state.resources.create(body).await?;
    Ok(Json(resource))
}

async fn list_resources(
    State(state): State<AppState>,
    context: RequestContext,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<SchedulableResource>> {
    let resources = state.resources.list_for_org(&context.org_id, query.only_active).await?;
    Ok(Json(resources))
}

async fn get_resource(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<SchedulableResource> {
    let resource = state
        .resources
        .find_by_id(&context.org_id, ResourceId(id))
        .await?
        .ok_or_else(|| ApplicationError::not_found("resource", id.to_string()))?;
    Ok(Json(resource))
}

async fn set_availability(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Json(body): Json<AvailabilityConfig>,
) -> ApiResult<SchedulableResource> {
    body.validate().map_err(ApiError::from)?;
    let mut resource = state
        .resources
        .find_by_id(&context.org_id, ResourceId(id))
        .await?
        .ok_or_else(|| ApplicationError::not_found("resource", id.to_string()))?;
    resource.availability = body;
    resource.updated_at = Utc::now();
    state.resources.save(resource.clone()).await?;
    Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
struct BlackoutBody {
    date: NaiveDate,
}

async fn add_blackout(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Json(body): Json<BlackoutBody>,
) -> ApiResult<SchedulableResource> {
    let mut resource = state
        .resources
        .find_by_id(&context.org_id, ResourceId(id))
        .await?
        .ok_or_else(|| ApplicationError::not_found("resource", id.to_string()))?;
    if !resource.availability.blackout_dates.contains(&body.date) {
        resource.availability.blackout_dates.push(body.date);
        resource.availability.blackout_dates.sort();
        resource.updated_at = Utc::now();
        state.resources.save(resource.clone()).await?;
    }
    Ok(Json(resource))
}

async fn create_rule(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Json(mut body): Json<NewRule>,
) -> ApiResult<ResourceScheduleRule> {
    state
        .resources
        .find_by_id(&context.org_id, ResourceId(id))
        .await?
        .ok_or_else(|| ApplicationError::not_found("resource", id.to_string()))?;
    body.resource_id = ResourceId(id);
    let rule = state.rules.create(body).await?;
    Ok(Json(rule))
}

async fn list_rules(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<ResourceScheduleRule>> {
    state
        .resources
        .find_by_id(&context.org_id, ResourceId(id))
        .await?
        .ok_or_else(|| ApplicationError::not_found("resource", id.to_string()))?;
    let rules = state.rules.list_for_resource(ResourceId(id), query.only_active).await?;
    Ok(Json(rules))
}

async fn availability(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<Vec<DayAvailability>> {
    let days = state
        .bookings
        .availability(&context.org_id, ResourceId(id), query.start_date, query.end_date)
        .await?;
    Ok(Json(days))
}

async fn schedule(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Vec<BookingRequest>> {
    let bookings = state
        .bookings
        .schedule(&context.org_id, ResourceId(id), query.start, query.end)
        .await?;
    Ok(Json(bookings))
}

async fn utilization(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<UtilizationStats> {
    let stats = state
        .bookings
        .utilization(&context.org_id, ResourceId(id), query.start_date, query.end_date)
        .await?;
    Ok(Json(stats))
}

async fn suggest(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Vec<TimeSuggestion>> {
    let suggestions = state
        .bookings
        .suggest_times(&context.org_id, ResourceId(id), query.start, query.end)
        .await?;
    Ok(Json(suggestions))
}
