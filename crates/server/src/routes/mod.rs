//! API surface. All routes are JSON under `/api/v1` and org-scoped
//! through [`crate::context::RequestContext`]; `/health` is unscoped.

use axum::Router;

use crate::health;
use crate::services::AppState;

pub mod bookings;
pub mod integrations;
pub mod resources;
pub mod work_items;
pub mod workflows;

pub fn router(state: AppState) -> Router {
    let health = health::router(state.db_pool.clone());
    Router::new()
        .merge(resources::router())
        .merge(bookings::router())
        .merge(workflows::router())
        .merge(work_items::router())
        .merge(integrations::router())
        .with_state(state)
        .merge(health)
}
