use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use bookflow_core::domain::booking::{BookingId, BookingRequest, BookingStatus, NewBookingRequest};
use bookflow_core::domain::resource::ResourceId;
use bookflow_core::errors::DomainError;

use crate::context::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::services::booking::AdmissionOutcome;
use crate::services::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/bookings", get(list_bookings).post(create_booking))
        .route("/api/v1/bookings/{id}", get(get_booking))
        .route("/api/v1/bookings/{id}/confirm", post(confirm_booking))
        .route("/api/v1/bookings/{id}/start", post(start_booking))
        .route("/api/v1/bookings/{id}/complete", post(complete_booking))
        .route("/api/v1/bookings/{id}/cancel", post(cancel_booking))
}

/// Booking creation body for the native API. The source triple is
/// assigned server-side; externally owned bookings go through the
/// sync endpoint instead.
#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    pub resource_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub requested_start: chrono::DateTime<chrono::Utc>,
    pub requested_end: chrono::DateTime<chrono::Utc>,
    #[serde(default = "default_capacity")]
    pub required_capacity: i64,
    #[serde(default = "default_priority")]
    pub priority: bookflow_core::BookingPriority,
    #[serde(default)]
    pub custom_data: serde_json::Value,
}

fn default_capacity() -> i64 {
    1
}

fn default_priority() -> bookflow_core::BookingPriority {
    bookflow_core::BookingPriority::Normal
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Default, Deserialize)]
struct ConfirmBody {
    #[serde(default)]
    override_rules: bool,
}

async fn create_booking(
    State(state): State<AppState>,
    context: RequestContext,
    Json(body): Json<CreateBookingBody>,
) -> ApiResult<AdmissionOutcome> {
    let new = NewBookingRequest {
        org_id: context.org_id,
        resource_id: ResourceId(body.resource_id),
        title: body.title,
        description: body.description,
        requested_start: body.requested_start,
        requested_end: body.requested_end,
        required_capacity: body.required_capacity,
        priority: body.priority,
        source: bookflow_core::SourceRef::new(
            "bookflow",
            "booking",
            uuid::Uuid::new_v4().to_string(),
        ),
        custom_data: body.custom_data,
        requested_by: context.actor_id,
    };
    let outcome = state.bookings.create(new).await?;
    Ok(Json(outcome))
}

async fn list_bookings(
    State(state): State<AppState>,
    context: RequestContext,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<BookingRequest>> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| ApiError::from(DomainError::UnknownStatus(raw.to_string())))?,
        ),
    };
    let bookings = state.bookings.list(&context.org_id, status, query.limit).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<BookingRequest> {
    let booking = state.bookings.get(&context.org_id, BookingId(id)).await?;
    Ok(Json(booking))
}

async fn confirm_booking(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
    body: Option<Json<ConfirmBody>>,
) -> ApiResult<BookingRequest> {
    let override_rules = body.map(|Json(b)| b.override_rules).unwrap_or(false);
    let booking =
        state.bookings.confirm(&context.org_id, BookingId(id), override_rules).await?;
    Ok(Json(booking))
}

async fn start_booking(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<BookingRequest> {
    let booking = state.bookings.start(&context.org_id, BookingId(id)).await?;
    Ok(Json(booking))
}

async fn complete_booking(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<BookingRequest> {
    let booking =
        state.bookings.complete(&context.org_id, BookingId(id), &context.actor_id).await?;
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    context: RequestContext,
    Path(id): Path<i64>,
) -> ApiResult<BookingRequest> {
    let booking = state.bookings.cancel(&context.org_id, BookingId(id)).await?;
    Ok(Json(booking))
}
