//! Bridge between external services and the booking engine. External
//! bookings are mirrored idempotently on their source triple, and work
//! item steps spawn capacity bookings on their assigned team's
//! resource.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use bookflow_core::domain::booking::{
    BookingPriority, BookingRequest, BookingStatus, NewBookingRequest, SourceRef,
};
use bookflow_core::domain::resource::{
    AvailabilityConfig, NewResource, ResourceType, SchedulableResource,
};
use bookflow_core::domain::work_item::WorkItem;
use bookflow_core::domain::workflow::WorkflowStep;
use bookflow_core::errors::{ApplicationError, DomainError};
use bookflow_core::scheduling::availability::DayAvailability;
use bookflow_core::scheduling::suggest::TimeSuggestion;
use bookflow_db::repositories::{BookingRepository, ResourceRepository};

use crate::services::booking::{AdmissionOutcome, BookingService};
use crate::services::persistence;

/// Version tag for the custom_data contract written on work item
/// bookings.
const WORK_ITEM_CONTRACT_VERSION: i64 = 1;

const DEFAULT_STEP_DURATION_HOURS: i64 = 2;

/// Snapshot of a booking owned by an external service. The
/// (`service`, `object_type`, `object_id`) triple is the idempotency
/// key; syncing the same snapshot twice is a no-op.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExternalBookingRef {
    /// Overwritten with the caller's org by the sync endpoint.
    #[serde(default)]
    pub org_id: String,
    pub service: String,
    pub object_type: String,
    pub object_id: String,
    pub team_id: String,
    pub team_name: String,
    pub team_capacity: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub required_capacity: i64,
    pub priority: BookingPriority,
    pub requested_by: String,
    #[serde(default)]
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    #[serde(default)]
    pub custom_data: serde_json::Value,
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncOutcome {
    pub booking: BookingRequest,
    pub created: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncFailure {
    pub object_id: String,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<SyncFailure>,
}

pub struct IntegrationBridge {
    resources: Arc<dyn ResourceRepository>,
    bookings: Arc<dyn BookingRepository>,
    service: Arc<BookingService>,
}

impl IntegrationBridge {
    pub fn new(
        resources: Arc<dyn ResourceRepository>,
        bookings: Arc<dyn BookingRepository>,
        service: Arc<BookingService>,
    ) -> Self {
        Self { resources, bookings, service }
    }

    /// Find or create the schedulable resource mirroring an external
    /// team, keyed on (`org_id`, `service_type`, `external_resource_id`).
    pub async fn ensure_resource_for_team(
        &self,
        org_id: &str,
        service_type: &str,
        team_id: &str,
        team_name: &str,
        capacity: i64,
    ) -> Result<SchedulableResource, ApplicationError> {
        if let Some(existing) = self
            .resources
            .find_by_external_id(org_id, service_type, team_id)
            .await
            .map_err(persistence)?
        {
            return Ok(existing);
        }

        let new = NewResource {
            org_id: org_id.to_string(),
            name: team_name.to_string(),
            resource_type: ResourceType::Team,
            description: format!("Team resource for {team_name}"),
            max_concurrent_bookings: capacity.max(1),
            availability: AvailabilityConfig::default(),
            linked_team: Some(team_name.to_string()),
            external_resource_id: Some(team_id.to_string()),
            service_type: service_type.to_string(),
        };
        new.validate()?;
        let resource = self.resources.create(new).await.map_err(persistence)?;
        info!(
            event_name = "integration.resource.created",
            correlation_id = %team_id,
            resource_id = resource.id.0,
            service_type,
            "schedulable resource created for external team"
        );
        Ok(resource)
    }

    /// Mirror one external booking. Existing mirrors (matched on the
    /// source triple within the caller's org) are updated in place;
    /// new ones are inserted already confirmed, since the owning
    /// service has committed them.
    pub async fn sync_external_booking(
        &self,
        external: &ExternalBookingRef,
    ) -> Result<SyncOutcome, ApplicationError> {
        if external.start >= external.end {
            return Err(DomainError::InvalidWindow {
                start: external.start,
                end: external.end,
            }
            .into());
        }
        let resource = self
            .ensure_resource_for_team(
                &external.org_id,
                &external.service,
                &external.team_id,
                &external.team_name,
                external.team_capacity,
            )
            .await?;

        let source =
            SourceRef::new(&external.service, &external.object_type, &external.object_id);
        let existing = self
            .bookings
            .find_by_source(&external.org_id, &source)
            .await
            .map_err(persistence)?;

        if let Some(mut booking) = existing {
            booking.title = external.title.clone();
            booking.description = external.description.clone();
            booking.requested_start = external.start;
            booking.requested_end = external.end;
            booking.required_capacity = external.required_capacity;
            booking.custom_data = external.custom_data.clone();
            if external.is_completed && !booking.status.is_terminal() {
                booking.status = BookingStatus::Completed;
                booking.actual_end = external.completed_at.or_else(|| Some(Utc::now()));
                booking.completed_by = external.completed_by.clone();
            }
            booking.updated_at = Utc::now();
            self.bookings.save(booking.clone()).await.map_err(persistence)?;
            return Ok(SyncOutcome { booking, created: false });
        }

        let new = NewBookingRequest {
            org_id: external.org_id.clone(),
            resource_id: resource.id,
            title: external.title.clone(),
            description: external.description.clone(),
            requested_start: external.start,
            requested_end: external.end,
            required_capacity: external.required_capacity,
            priority: external.priority,
            source,
            custom_data: external.custom_data.clone(),
            requested_by: external.requested_by.clone(),
        };
        new.validate()?;
        let status = if external.is_completed {
            BookingStatus::Completed
        } else {
            BookingStatus::Confirmed
        };
        let mut booking = self.bookings.create(new, status).await.map_err(persistence)?;
        if external.is_completed {
            booking.actual_end = external.completed_at.or_else(|| Some(Utc::now()));
            booking.completed_by = external.completed_by.clone();
            self.bookings.save(booking.clone()).await.map_err(persistence)?;
        }
        Ok(SyncOutcome { booking, created: true })
    }

    /// Mirror a batch of external bookings. Failures are collected per
    /// entry instead of aborting the batch.
    pub async fn sync_all(&self, batch: &[ExternalBookingRef]) -> SyncReport {
        let mut report = SyncReport::default();
        for external in batch {
            match self.sync_external_booking(external).await {
                Ok(outcome) if outcome.created => report.created += 1,
                Ok(_) => report.updated += 1,
                Err(error) => {
                    warn!(
                        event_name = "integration.sync.failed",
                        correlation_id = %external.object_id,
                        service = %external.service,
                        error = %error,
                        "external booking failed to sync"
                    );
                    report.failures.push(SyncFailure {
                        object_id: external.object_id.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }
        info!(
            event_name = "integration.sync.finished",
            correlation_id = "sync",
            created = report.created,
            updated = report.updated,
            failed = report.failures.len(),
            "external booking sync finished"
        );
        report
    }

    /// Book the assigned team of a workflow step for a work item. The
    /// request goes through normal admission, so it may land pending
    /// when the team is fully booked.
    pub async fn create_work_item_booking(
        &self,
        item: &WorkItem,
        step: &WorkflowStep,
        requested_by: &str,
        start: DateTime<Utc>,
        duration_hours: Option<Decimal>,
    ) -> Result<AdmissionOutcome, ApplicationError> {
        let team = step
            .assigned_team
            .as_deref()
            .ok_or(DomainError::MissingField("assigned_team"))?;
        let duration = duration_hours
            .or(step.estimated_duration_hours)
            .unwrap_or_else(|| Decimal::from(DEFAULT_STEP_DURATION_HOURS));
        let minutes = (duration * Decimal::from(60))
            .round()
            .to_i64()
            .filter(|m| *m > 0)
            .ok_or_else(|| {
                DomainError::InvalidConfig(format!("step duration {duration} is not bookable"))
            })?;

        let resource = self
            .ensure_resource_for_team(&item.org_id, "bookflow", team, team, 1)
            .await?;

        let new = NewBookingRequest {
            org_id: item.org_id.clone(),
            resource_id: resource.id,
            title: format!("{} - {}", item.title, step.name),
            description: format!("Booking for work item: {}", item.title),
            requested_start: start,
            requested_end: start + Duration::minutes(minutes),
            required_capacity: 1,
            priority: item.priority,
            source: SourceRef::new(
                "bookflow",
                "work_item_step",
                format!("{}:{}", item.id.0, step.id.0),
            ),
            custom_data: json!({
                "contract_version": WORK_ITEM_CONTRACT_VERSION,
                "work_item_id": item.id.0,
                "workflow_step_id": step.id.0,
                "estimated_duration_hours": duration,
                "team_id": team,
            }),
            requested_by: requested_by.to_string(),
        };
        self.service.create(new).await
    }

    pub async fn bookings_for_work_item(
        &self,
        org_id: &str,
        work_item_id: i64,
    ) -> Result<Vec<BookingRequest>, ApplicationError> {
        self.bookings.list_for_work_item(org_id, work_item_id).await.map_err(persistence)
    }

    // The read paths below are keyed on the team's display name; a
    // team that never produced a resource yields empty results rather
    // than an error.
    async fn find_team_resource(
        &self,
        org_id: &str,
        team_name: &str,
    ) -> Result<Option<SchedulableResource>, ApplicationError> {
        let resources = self.resources.list_for_org(org_id, true).await.map_err(persistence)?;
        Ok(resources
            .into_iter()
            .find(|r| r.resource_type == ResourceType::Team && r.name == team_name))
    }

    pub async fn team_schedule(
        &self,
        org_id: &str,
        team_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BookingRequest>, ApplicationError> {
        match self.find_team_resource(org_id, team_name).await? {
            Some(resource) => self.service.schedule(org_id, resource.id, start, end).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn team_availability(
        &self,
        org_id: &str,
        team_name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DayAvailability>, ApplicationError> {
        match self.find_team_resource(org_id, team_name).await? {
            Some(resource) => {
                self.service.availability(org_id, resource.id, start_date, end_date).await
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn suggest_times_for_team(
        &self,
        org_id: &str,
        team_name: &str,
        requested_start: DateTime<Utc>,
        requested_end: DateTime<Utc>,
    ) -> Result<Vec<TimeSuggestion>, ApplicationError> {
        match self.find_team_resource(org_id, team_name).await? {
            Some(resource) => {
                self.service.suggest_times(org_id, resource.id, requested_start, requested_end).await
            }
            None => Ok(Vec::new()),
        }
    }

    /// On work item completion: complete its held bookings and cancel
    /// the ones that never got confirmed. Returns how many changed.
    pub async fn complete_work_item_bookings(
        &self,
        org_id: &str,
        work_item_id: i64,
        completed_by: &str,
    ) -> Result<usize, ApplicationError> {
        let now = Utc::now();
        let mut changed = 0;
        for mut booking in self.bookings_for_work_item(org_id, work_item_id).await? {
            match booking.status {
                BookingStatus::Confirmed | BookingStatus::InProgress => {
                    booking.complete(completed_by, now)?;
                }
                BookingStatus::Pending => booking.cancel()?,
                BookingStatus::Completed | BookingStatus::Cancelled => continue,
            }
            booking.updated_at = now;
            self.bookings.save(booking).await.map_err(persistence)?;
            changed += 1;
        }
        Ok(changed)
    }

    /// Cancel every non-terminal booking held for a work item.
    pub async fn cancel_work_item_bookings(
        &self,
        org_id: &str,
        work_item_id: i64,
    ) -> Result<usize, ApplicationError> {
        let now = Utc::now();
        let mut changed = 0;
        for mut booking in self.bookings_for_work_item(org_id, work_item_id).await? {
            if booking.status.is_terminal() {
                continue;
            }
            booking.cancel()?;
            booking.updated_at = now;
            self.bookings.save(booking).await.map_err(persistence)?;
            changed += 1;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use bookflow_core::domain::booking::{BookingPriority, BookingStatus};
    use bookflow_core::scheduling::suggest::SearchParams;
    use bookflow_db::repositories::{
        SqlBookingRepository, SqlResourceRepository, SqlRuleRepository,
    };
    use bookflow_db::{connect_with_settings, migrations};

    use crate::services::booking::BookingService;
    use crate::services::locks::ResourceLocks;
    use crate::services::notify::Notifier;

    use super::{ExternalBookingRef, IntegrationBridge};

    async fn setup() -> IntegrationBridge {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 5, 30)
            .await
            .expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let resources = Arc::new(SqlResourceRepository::new(pool.clone()));
        let bookings = Arc::new(SqlBookingRepository::new(pool.clone()));
        let service = Arc::new(BookingService::new(
            resources.clone(),
            Arc::new(SqlRuleRepository::new(pool.clone())),
            bookings.clone(),
            ResourceLocks::new(),
            Arc::new(Notifier::disabled()),
            SearchParams::default(),
        ));
        IntegrationBridge::new(resources, bookings, service)
    }

    fn external(object_id: &str) -> ExternalBookingRef {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();
        ExternalBookingRef {
            org_id: "org-1".to_string(),
            service: "cflows".to_string(),
            object_type: "team_booking".to_string(),
            object_id: object_id.to_string(),
            team_id: "team-7".to_string(),
            team_name: "Paint Shop".to_string(),
            team_capacity: 2,
            title: "Hull repaint".to_string(),
            description: String::new(),
            start,
            end: start + Duration::hours(2),
            required_capacity: 1,
            priority: BookingPriority::Normal,
            requested_by: "user-1".to_string(),
            is_completed: false,
            completed_at: None,
            completed_by: None,
            custom_data: serde_json::json!({"team_booking_id": 42}),
        }
    }

    #[tokio::test]
    async fn sync_creates_resource_and_confirmed_mirror() {
        let bridge = setup().await;
        let outcome =
            bridge.sync_external_booking(&external("40")).await.expect("sync");

        assert!(outcome.created);
        assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
        assert_eq!(outcome.booking.source.object_id, "40");

        let resource = bridge
            .resources
            .find_by_external_id("org-1", "cflows", "team-7")
            .await
            .expect("query")
            .expect("resource mirrored");
        assert_eq!(resource.max_concurrent_bookings, 2);
        assert_eq!(resource.linked_team.as_deref(), Some("Paint Shop"));
    }

    #[tokio::test]
    async fn sync_is_idempotent_on_the_source_triple() {
        let bridge = setup().await;
        let first = bridge.sync_external_booking(&external("42")).await.expect("first");

        let mut changed = external("42");
        changed.title = "Hull repaint (rescheduled)".to_string();
        changed.start += Duration::hours(2);
        changed.end += Duration::hours(2);
        let second = bridge.sync_external_booking(&changed).await.expect("second");

        assert!(!second.created);
        assert_eq!(second.booking.id, first.booking.id);
        assert_eq!(second.booking.title, "Hull repaint (rescheduled)");
        assert_eq!(second.booking.requested_start, changed.start);
    }

    #[tokio::test]
    async fn sync_never_adopts_another_orgs_mirror() {
        let bridge = setup().await;
        let first = bridge.sync_external_booking(&external("60")).await.expect("org-1 sync");

        let mut other = external("60");
        other.org_id = "org-2".to_string();
        other.title = "Deck repaint".to_string();
        let second = bridge.sync_external_booking(&other).await.expect("org-2 sync");

        assert!(second.created, "the other org must get its own mirror");
        assert_ne!(second.booking.id, first.booking.id);
        assert_eq!(second.booking.org_id, "org-2");

        let untouched = bridge
            .bookings
            .find_by_source("org-1", &first.booking.source)
            .await
            .expect("query")
            .expect("org-1 mirror still present");
        assert_eq!(untouched.org_id, "org-1");
        assert_eq!(untouched.title, "Hull repaint");

        // The team resource forks per org as well.
        let mirrored = bridge
            .resources
            .find_by_external_id("org-2", "cflows", "team-7")
            .await
            .expect("query")
            .expect("org-2 team resource");
        assert_eq!(mirrored.org_id, "org-2");
        assert_eq!(mirrored.id, second.booking.resource_id);
        assert_ne!(mirrored.id, first.booking.resource_id);
    }

    #[tokio::test]
    async fn completed_external_bookings_arrive_completed() {
        let bridge = setup().await;
        let mut done = external("43");
        done.is_completed = true;
        done.completed_at = Some(Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap());
        done.completed_by = Some("user-9".to_string());

        let outcome = bridge.sync_external_booking(&done).await.expect("sync");
        assert_eq!(outcome.booking.status, BookingStatus::Completed);
        assert_eq!(outcome.booking.actual_end, done.completed_at);
        assert_eq!(outcome.booking.completed_by.as_deref(), Some("user-9"));
    }

    #[tokio::test]
    async fn sync_all_collects_failures_without_aborting() {
        let bridge = setup().await;
        let mut bad = external("44");
        bad.end = bad.start; // degenerate window

        let report = bridge.sync_all(&[external("46"), bad, external("45")]).await;
        assert_eq!(report.created, 2);
        assert_eq!(report.updated, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].object_id, "44");
    }

    #[tokio::test]
    async fn completing_a_work_item_settles_its_bookings() {
        let bridge = setup().await;
        // Two mirrored bookings tagged with the same work item.
        let mut first = external("50");
        first.custom_data = serde_json::json!({"work_item_id": 7});
        let mut second = external("51");
        second.custom_data = serde_json::json!({"work_item_id": 7});
        second.start += Duration::hours(3);
        second.end += Duration::hours(3);
        bridge.sync_external_booking(&first).await.expect("first");
        bridge.sync_external_booking(&second).await.expect("second");

        let changed =
            bridge.complete_work_item_bookings("org-1", 7, "user-2").await.expect("complete");
        assert_eq!(changed, 2);

        for booking in bridge.bookings_for_work_item("org-1", 7).await.expect("list") {
            assert_eq!(booking.status, BookingStatus::Completed);
            assert_eq!(booking.completed_by.as_deref(), Some("user-2"));
        }
    }
}
