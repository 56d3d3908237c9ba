use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use bookflow_core::domain::booking::BookingRequest;
use bookflow_core::scheduling::availability::DayAvailability;
use bookflow_core::scheduling::suggest::TimeSuggestion;

use crate::context::RequestContext;
use crate::error::ApiResult;
use crate::services::bridge::{ExternalBookingRef, SyncReport};
use crate::services::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/integrations/sync", post(sync_bookings))
        .route("/api/v1/integrations/teams/{team}/schedule", get(team_schedule))
        .route("/api/v1/integrations/teams/{team}/availability", get(team_availability))
        .route("/api/v1/integrations/teams/{team}/suggest", get(team_suggest))
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    pub bookings: Vec<ExternalBookingRef>,
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct DateRangeQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

/// Mirror a batch of externally owned bookings. Entries are forced
/// into the caller's org; per-entry failures are reported, not fatal.
async fn sync_bookings(
    State(state): State<AppState>,
    context: RequestContext,
    Json(body): Json<SyncBody>,
) -> ApiResult<SyncReport> {
    let batch: Vec<ExternalBookingRef> = body
        .bookings
        .into_iter()
        .map(|mut external| {
            external.org_id = context.org_id.clone();
            external
        })
        .collect();
    let report = state.bridge.sync_all(&batch).await;
    Ok(Json(report))
}

async fn team_schedule(
    State(state): State<AppState>,
    context: RequestContext,
    Path(team): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Vec<BookingRequest>> {
    let bookings =
        state.bridge.team_schedule(&context.org_id, &team, query.start, query.end).await?;
    Ok(Json(bookings))
}

async fn team_availability(
    State(state): State<AppState>,
    context: RequestContext,
    Path(team): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<Vec<DayAvailability>> {
    let days = state
        .bridge
        .team_availability(&context.org_id, &team, query.start_date, query.end_date)
        .await?;
    Ok(Json(days))
}

async fn team_suggest(
    State(state): State<AppState>,
    context: RequestContext,
    Path(team): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Vec<TimeSuggestion>> {
    let suggestions =
        state.bridge.suggest_times_for_team(&context.org_id, &team, query.start, query.end).await?;
    Ok(Json(suggestions))
}
