use std::sync::Arc;

use bookflow_core::config::AppConfig;
use bookflow_core::errors::ApplicationError;
use bookflow_core::scheduling::suggest::SearchParams;
use bookflow_db::repositories::{
    RepositoryError, ResourceRepository, RuleRepository, SqlBookingRepository,
    SqlResourceRepository, SqlRuleRepository, SqlWorkItemRepository, SqlWorkflowRepository,
};
use bookflow_db::DbPool;

pub mod booking;
pub mod bridge;
pub mod locks;
pub mod notify;
pub mod work_items;

pub use booking::BookingService;
pub use bridge::IntegrationBridge;
pub use locks::ResourceLocks;
pub use notify::Notifier;
pub use work_items::WorkItemService;

/// Shared handler state. Services are behind `Arc` so the state stays
/// cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub resources: Arc<dyn ResourceRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub bookings: Arc<BookingService>,
    pub work_items: Arc<WorkItemService>,
    pub bridge: Arc<IntegrationBridge>,
}

impl AppState {
    pub fn new(config: &AppConfig, db_pool: DbPool) -> Self {
        let resources: Arc<dyn ResourceRepository> =
            Arc::new(SqlResourceRepository::new(db_pool.clone()));
        let rules: Arc<dyn RuleRepository> = Arc::new(SqlRuleRepository::new(db_pool.clone()));
        let booking_repo = Arc::new(SqlBookingRepository::new(db_pool.clone()));
        let workflow_repo = Arc::new(SqlWorkflowRepository::new(db_pool.clone()));
        let work_item_repo = Arc::new(SqlWorkItemRepository::new(db_pool.clone()));

        let search = SearchParams {
            horizon_days: config.scheduling.suggestion_horizon_days,
            step_hours: config.scheduling.suggestion_step_hours,
            limit: config.scheduling.suggestion_limit,
        };

        let bookings = Arc::new(BookingService::new(
            resources.clone(),
            rules.clone(),
            booking_repo.clone(),
            ResourceLocks::new(),
            Arc::new(Notifier::new(&config.integration)),
            search,
        ));
        let work_items = Arc::new(WorkItemService::new(workflow_repo, work_item_repo));
        let bridge = Arc::new(IntegrationBridge::new(
            resources.clone(),
            booking_repo,
            bookings.clone(),
        ));

        Self { db_pool, resources, rules, bookings, work_items, bridge }
    }
}

/// Repository failures cross into the application layer as opaque
/// persistence errors; callers cannot repair them by editing input.
pub(crate) fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
