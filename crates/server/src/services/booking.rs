//! Booking lifecycle and admission control. All capacity decisions
//! run under the per-resource lock so that check-then-confirm is
//! atomic with respect to other requests on the same resource.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use bookflow_core::domain::booking::{
    BookingId, BookingRequest, BookingStatus, NewBookingRequest,
};
use bookflow_core::domain::resource::{ResourceId, SchedulableResource};
use bookflow_core::errors::{ApplicationError, DomainError};
use bookflow_core::scheduling::availability::{
    daily_availability, has_capacity, is_window_available, resource_schedule, utilization_stats,
    DayAvailability, UtilizationStats,
};
use bookflow_core::scheduling::rules::{can_auto_confirm, evaluate, AdmissionDecision};
use bookflow_core::scheduling::suggest::{suggest_alternative_times, SearchParams, TimeSuggestion};
use bookflow_db::repositories::{BookingRepository, ResourceRepository, RuleRepository};

use crate::services::locks::ResourceLocks;
use crate::services::notify::Notifier;
use crate::services::persistence;

/// Result of admitting a new booking: the stored row plus the rule
/// decision that produced its status.
#[derive(Clone, Debug, Serialize)]
pub struct AdmissionOutcome {
    pub booking: BookingRequest,
    pub auto_confirmed: bool,
    pub decision: AdmissionDecision,
}

pub struct BookingService {
    resources: Arc<dyn ResourceRepository>,
    rules: Arc<dyn RuleRepository>,
    bookings: Arc<dyn BookingRepository>,
    locks: ResourceLocks,
    notifier: Arc<Notifier>,
    search: SearchParams,
}

impl BookingService {
    pub fn new(
        resources: Arc<dyn ResourceRepository>,
        rules: Arc<dyn RuleRepository>,
        bookings: Arc<dyn BookingRepository>,
        locks: ResourceLocks,
        notifier: Arc<Notifier>,
        search: SearchParams,
    ) -> Self {
        Self { resources, rules, bookings, locks, notifier, search }
    }

    async fn load_resource(
        &self,
        org_id: &str,
        id: ResourceId,
    ) -> Result<SchedulableResource, ApplicationError> {
        self.resources
            .find_by_id(org_id, id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("resource", id.0.to_string()))
    }

    async fn load_booking(
        &self,
        org_id: &str,
        id: BookingId,
    ) -> Result<BookingRequest, ApplicationError> {
        self.bookings
            .find_by_id(org_id, id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("booking", id.0.to_string()))
    }

    /// Create a booking. The row is always persisted as pending first;
    /// the rule engine then decides whether it auto-confirms, under
    /// the resource lock so concurrent creates serialize.
    pub async fn create(
        &self,
        new: NewBookingRequest,
    ) -> Result<AdmissionOutcome, ApplicationError> {
        new.validate()?;
        let resource = self.load_resource(&new.org_id, new.resource_id).await?;
        if !resource.is_active {
            return Err(DomainError::ResourceInactive(resource.id.0).into());
        }
        if new.required_capacity > resource.max_concurrent_bookings {
            return Err(DomainError::InvalidCapacity(new.required_capacity).into());
        }

        // Webhook delivery can stall for its full timeout, so the
        // admission lock is released before notifying.
        let (booking, decision, auto_confirmed) = {
            let _guard = self.locks.acquire(resource.id).await;

            let mut booking =
                self.bookings.create(new, BookingStatus::Pending).await.map_err(persistence)?;
            let active =
                self.bookings.list_active_for_resource(resource.id).await.map_err(persistence)?;
            let rules =
                self.rules.list_for_resource(resource.id, true).await.map_err(persistence)?;

            let now = Utc::now();
            let decision = evaluate(&rules, &booking, now);
            let auto_confirmed = can_auto_confirm(&resource, &rules, &active, &booking, now);
            if auto_confirmed {
                booking.confirm()?;
                booking.updated_at = now;
                self.bookings.save(booking.clone()).await.map_err(persistence)?;
            }
            (booking, decision, auto_confirmed)
        };
        if auto_confirmed {
            self.notifier.booking_status_changed(&booking, BookingStatus::Pending).await;
        }

        info!(
            event_name = "booking.created",
            correlation_id = %booking.uuid,
            booking_id = booking.id.0,
            resource_id = resource.id.0,
            status = booking.status.as_str(),
            auto_confirmed,
            "booking request admitted"
        );

        Ok(AdmissionOutcome { booking, auto_confirmed, decision })
    }

    /// Manually confirm a pending booking. With `override_rules` only
    /// raw capacity is checked; otherwise the full availability check
    /// applies (working hours, blackouts, capacity).
    pub async fn confirm(
        &self,
        org_id: &str,
        id: BookingId,
        override_rules: bool,
    ) -> Result<BookingRequest, ApplicationError> {
        let mut booking = self.load_booking(org_id, id).await?;
        let resource = self.load_resource(org_id, booking.resource_id).await?;

        let guard = self.locks.acquire(resource.id).await;

        let active =
            self.bookings.list_active_for_resource(resource.id).await.map_err(persistence)?;
        let allowed = if override_rules {
            has_capacity(
                &resource,
                &active,
                booking.requested_start,
                booking.requested_end,
                Some(booking.id),
            )
        } else {
            let rules =
                self.rules.list_for_resource(resource.id, true).await.map_err(persistence)?;
            is_window_available(
                &resource,
                &active,
                &rules,
                booking.requested_start,
                booking.requested_end,
                Some(booking.id),
            )
        };
        if !allowed {
            return Err(DomainError::WindowUnavailable {
                resource: resource.name,
                start: booking.requested_start,
                end: booking.requested_end,
            }
            .into());
        }

        let previous = booking.status;
        booking.confirm()?;
        booking.updated_at = Utc::now();
        self.bookings.save(booking.clone()).await.map_err(persistence)?;
        drop(guard);

        self.notifier.booking_status_changed(&booking, previous).await;
        Ok(booking)
    }

    pub async fn start(
        &self,
        org_id: &str,
        id: BookingId,
    ) -> Result<BookingRequest, ApplicationError> {
        let mut booking = self.load_booking(org_id, id).await?;
        let previous = booking.status;
        booking.start(Utc::now())?;
        booking.updated_at = Utc::now();
        self.bookings.save(booking.clone()).await.map_err(persistence)?;
        self.notifier.booking_status_changed(&booking, previous).await;
        Ok(booking)
    }

    pub async fn complete(
        &self,
        org_id: &str,
        id: BookingId,
        completed_by: &str,
    ) -> Result<BookingRequest, ApplicationError> {
        let mut booking = self.load_booking(org_id, id).await?;
        let previous = booking.status;
        booking.complete(completed_by, Utc::now())?;
        booking.updated_at = Utc::now();
        self.bookings.save(booking.clone()).await.map_err(persistence)?;
        self.notifier.booking_status_changed(&booking, previous).await;
        Ok(booking)
    }

    pub async fn cancel(
        &self,
        org_id: &str,
        id: BookingId,
    ) -> Result<BookingRequest, ApplicationError> {
        let mut booking = self.load_booking(org_id, id).await?;
        let previous = booking.status;
        booking.cancel()?;
        booking.updated_at = Utc::now();
        self.bookings.save(booking.clone()).await.map_err(persistence)?;
        self.notifier.booking_status_changed(&booking, previous).await;
        Ok(booking)
    }

    pub async fn get(
        &self,
        org_id: &str,
        id: BookingId,
    ) -> Result<BookingRequest, ApplicationError> {
        self.load_booking(org_id, id).await
    }

    pub async fn list(
        &self,
        org_id: &str,
        status: Option<BookingStatus>,
        limit: u32,
    ) -> Result<Vec<BookingRequest>, ApplicationError> {
        self.bookings.list_for_org(org_id, status, limit).await.map_err(persistence)
    }

    pub async fn availability(
        &self,
        org_id: &str,
        resource_id: ResourceId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DayAvailability>, ApplicationError> {
        let resource = self.load_resource(org_id, resource_id).await?;
        let bookings = self.bookings_in_date_range(resource_id, start_date, end_date).await?;
        Ok(daily_availability(&resource, &bookings, start_date, end_date))
    }

    pub async fn schedule(
        &self,
        org_id: &str,
        resource_id: ResourceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BookingRequest>, ApplicationError> {
        self.load_resource(org_id, resource_id).await?;
        let bookings =
            self.bookings.list_in_window(resource_id, start, end).await.map_err(persistence)?;
        Ok(resource_schedule(&bookings, start, end).into_iter().cloned().collect())
    }

    pub async fn utilization(
        &self,
        org_id: &str,
        resource_id: ResourceId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<UtilizationStats, ApplicationError> {
        let resource = self.load_resource(org_id, resource_id).await?;
        let bookings = self.bookings_in_date_range(resource_id, start_date, end_date).await?;
        Ok(utilization_stats(&resource, &bookings, start_date, end_date))
    }

    /// Alternative windows near a requested slot that was rejected.
    pub async fn suggest_times(
        &self,
        org_id: &str,
        resource_id: ResourceId,
        requested_start: DateTime<Utc>,
        requested_end: DateTime<Utc>,
    ) -> Result<Vec<TimeSuggestion>, ApplicationError> {
        let resource = self.load_resource(org_id, resource_id).await?;
        let active =
            self.bookings.list_active_for_resource(resource_id).await.map_err(persistence)?;
        let rules =
            self.rules.list_for_resource(resource_id, true).await.map_err(persistence)?;
        Ok(suggest_alternative_times(
            &resource,
            &active,
            &rules,
            requested_start,
            requested_end,
            self.search,
        ))
    }

    async fn bookings_in_date_range(
        &self,
        resource_id: ResourceId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<BookingRequest>, ApplicationError> {
        let start = start_date
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .ok_or_else(|| ApplicationError::Persistence("invalid start date".to_string()))?;
        let end = end_date
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc())
            .ok_or_else(|| ApplicationError::Persistence("invalid end date".to_string()))?;
        self.bookings.list_in_window(resource_id, start, end).await.map_err(persistence)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use bookflow_core::domain::booking::{
        BookingPriority, BookingStatus, NewBookingRequest, SourceRef,
    };
    use bookflow_core::domain::resource::{AvailabilityConfig, NewResource, ResourceType};
    use bookflow_core::domain::rule::{NewRule, RuleConfig};
    use bookflow_core::errors::{ApplicationError, DomainError};
    use bookflow_core::scheduling::suggest::SearchParams;
    use bookflow_db::repositories::{
        ResourceRepository, SqlBookingRepository, SqlResourceRepository, SqlRuleRepository,
    };
    use bookflow_db::{connect_with_settings, migrations};

    use crate::services::locks::ResourceLocks;
    use crate::services::notify::Notifier;

    use super::BookingService;

    async fn setup(capacity: i64) -> (BookingService, bookflow_core::SchedulableResource) {
        setup_with_notifier(capacity, Notifier::disabled()).await
    }

    async fn setup_with_notifier(
        capacity: i64,
        notifier: Notifier,
    ) -> (BookingService, bookflow_core::SchedulableResource) {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 5, 30)
            .await
            .expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let resources = Arc::new(SqlResourceRepository::new(pool.clone()));
        let resource = resources
            .create(NewResource {
                org_id: "org-1".to_string(),
                name: "Paint Shop".to_string(),
                resource_type: ResourceType::Team,
                description: String::new(),
                max_concurrent_bookings: capacity,
                availability: AvailabilityConfig::default(),
                linked_team: Some("Paint Shop".to_string()),
                external_resource_id: None,
                service_type: "cflows".to_string(),
            })
            .await
            .expect("create resource");

        let service = BookingService::new(
            resources,
            Arc::new(SqlRuleRepository::new(pool.clone())),
            Arc::new(SqlBookingRepository::new(pool.clone())),
            ResourceLocks::new(),
            Arc::new(notifier),
            SearchParams::default(),
        );
        (service, resource)
    }

    fn monday_at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap()
    }

    fn new_booking(resource_id: bookflow_core::ResourceId, hour: u32) -> NewBookingRequest {
        NewBookingRequest {
            org_id: "org-1".to_string(),
            resource_id,
            title: "Hull repaint".to_string(),
            description: String::new(),
            requested_start: monday_at(hour),
            requested_end: monday_at(hour + 2),
            required_capacity: 1,
            priority: BookingPriority::Normal,
            source: SourceRef::new("bookflow", "booking", uuid::Uuid::new_v4().to_string()),
            custom_data: serde_json::Value::Null,
            requested_by: "user-1".to_string(),
        }
    }

    #[tokio::test]
    async fn free_window_auto_confirms() {
        let (service, resource) = setup(1).await;
        let outcome = service.create(new_booking(resource.id, 10)).await.expect("create");
        assert!(outcome.auto_confirmed);
        assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn full_resource_leaves_booking_pending() {
        let (service, resource) = setup(1).await;
        service.create(new_booking(resource.id, 10)).await.expect("first");

        let outcome = service.create(new_booking(resource.id, 10)).await.expect("second");
        assert!(!outcome.auto_confirmed);
        assert_eq!(outcome.booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn require_approval_rule_blocks_auto_confirm() {
        let (service, resource) = setup(2).await;
        service
            .rules
            .create(NewRule {
                resource_id: resource.id,
                name: "manual review".to_string(),
                description: String::new(),
                config: RuleConfig::RequireApproval {
                    match_priority: None,
                    max_duration_hours: None,
                },
                priority: 0,
                effective_start: None,
                effective_end: None,
            })
            .await
            .expect("create rule");

        let outcome = service.create(new_booking(resource.id, 10)).await.expect("create");
        assert!(!outcome.auto_confirmed);
        assert!(outcome.decision.require_approval.is_some());
        assert_eq!(outcome.booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn concurrent_creates_confirm_exactly_one_on_capacity_one() {
        let (service, resource) = setup(1).await;
        let service = Arc::new(service);

        let a = {
            let service = service.clone();
            let new = new_booking(resource.id, 10);
            tokio::spawn(async move { service.create(new).await })
        };
        let b = {
            let service = service.clone();
            let new = new_booking(resource.id, 10);
            tokio::spawn(async move { service.create(new).await })
        };

        let first = a.await.expect("join").expect("create");
        let second = b.await.expect("join").expect("create");

        let confirmed =
            [&first, &second].iter().filter(|o| o.auto_confirmed).count();
        assert_eq!(confirmed, 1, "capacity 1 admits exactly one of two racing requests");
    }

    #[tokio::test]
    async fn admission_does_not_wait_for_webhook_delivery() {
        // Webhook endpoint that accepts connections and never replies.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else { break };
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                    drop(socket);
                });
            }
        });

        let notifier = Notifier::new(&bookflow_core::config::IntegrationConfig {
            webhook_url: Some(format!("http://{address}/hook")),
            timeout_secs: 5,
        });
        let (service, resource) = setup_with_notifier(1, notifier).await;
        let service = Arc::new(service);

        // First create auto-confirms and stalls in webhook delivery.
        let stalled = {
            let service = service.clone();
            let new = new_booking(resource.id, 10);
            tokio::spawn(async move { service.create(new).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        // A second admission on the same resource lands pending and
        // must not queue behind the in-flight webhook.
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            service.create(new_booking(resource.id, 10)),
        )
        .await
        .expect("admission must proceed while a webhook is in flight")
        .expect("create");
        assert!(!outcome.auto_confirmed);

        stalled.abort();
    }

    #[tokio::test]
    async fn confirm_rejects_unavailable_window_unless_overridden() {
        let (service, resource) = setup(1).await;
        let winner = service.create(new_booking(resource.id, 10)).await.expect("winner");
        assert!(winner.auto_confirmed);

        let loser = service.create(new_booking(resource.id, 10)).await.expect("loser");
        let error = service
            .confirm("org-1", loser.booking.id, false)
            .await
            .expect_err("no capacity left");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::WindowUnavailable { .. })
        ));

        // Override still checks raw capacity, so it fails here too.
        let error = service
            .confirm("org-1", loser.booking.id, true)
            .await
            .expect_err("capacity is never overridable");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::WindowUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn override_confirm_bypasses_working_hours_only() {
        let (service, resource) = setup(1).await;
        // Saturday booking: outside working days, plain confirm fails.
        let saturday = Utc.with_ymd_and_hms(2025, 3, 8, 10, 0, 0).unwrap();
        let new = NewBookingRequest {
            requested_start: saturday,
            requested_end: saturday + Duration::hours(2),
            ..new_booking(resource.id, 10)
        };
        let outcome = service.create(new).await.expect("create");
        assert!(!outcome.auto_confirmed);

        service
            .confirm("org-1", outcome.booking.id, false)
            .await
            .expect_err("weekend is unavailable without override");
        let confirmed = service
            .confirm("org-1", outcome.booking.id, true)
            .await
            .expect("override ignores working days");
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn lifecycle_and_cancellation_free_capacity() {
        let (service, resource) = setup(1).await;
        let outcome = service.create(new_booking(resource.id, 10)).await.expect("create");
        let id = outcome.booking.id;

        let started = service.start("org-1", id).await.expect("start");
        assert_eq!(started.status, BookingStatus::InProgress);
        let completed = service.complete("org-1", id, "user-2").await.expect("complete");
        assert_eq!(completed.status, BookingStatus::Completed);
        assert_eq!(completed.completed_by.as_deref(), Some("user-2"));

        // Completed bookings no longer hold capacity.
        let next = service.create(new_booking(resource.id, 10)).await.expect("create");
        assert!(next.auto_confirmed);
        let cancelled = service.cancel("org-1", next.booking.id).await.expect("cancel");
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn oversized_capacity_request_is_rejected_up_front() {
        let (service, resource) = setup(2).await;
        let new = NewBookingRequest {
            required_capacity: 3,
            ..new_booking(resource.id, 10)
        };
        let error = service.create(new).await.expect_err("exceeds resource capacity");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidCapacity(3))
        ));
    }

    #[tokio::test]
    async fn suggestions_skip_the_taken_window() {
        let (service, resource) = setup(1).await;
        service.create(new_booking(resource.id, 10)).await.expect("occupy 10-12");

        let suggestions = service
            .suggest_times("org-1", resource.id, monday_at(10), monday_at(12))
            .await
            .expect("suggest");
        assert!(!suggestions.is_empty());
        assert!(suggestions.iter().all(|s| s.start != monday_at(10)));
    }

    #[tokio::test]
    async fn unknown_booking_is_not_found() {
        let (service, _resource) = setup(1).await;
        let error = service
            .get("org-1", bookflow_core::BookingId(999))
            .await
            .expect_err("missing booking");
        assert!(matches!(error, ApplicationError::NotFound { .. }));
    }
}
