use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::resource::ResourceId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Only confirmed and in-progress bookings hold capacity; pending
    /// requests never block other admissions.
    pub fn counts_against_capacity(&self) -> bool {
        matches!(self, Self::Confirmed | Self::InProgress)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl BookingPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Durable foreign key into the external domain object that owns this
/// booking; the triple is the idempotent sync key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub service: String,
    pub object_type: String,
    pub object_id: String,
}

impl SourceRef {
    pub fn new(
        service: impl Into<String>,
        object_type: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: BookingId,
    pub uuid: Uuid,
    pub org_id: String,
    pub resource_id: ResourceId,
    pub title: String,
    pub description: String,
    pub requested_start: DateTime<Utc>,
    pub requested_end: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub required_capacity: i64,
    pub status: BookingStatus,
    pub priority: BookingPriority,
    pub source: SourceRef,
    pub custom_data: serde_json::Value,
    pub requested_by: String,
    pub completed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingRequest {
    pub fn duration(&self) -> Duration {
        self.requested_end - self.requested_start
    }

    pub fn duration_hours(&self) -> Decimal {
        Decimal::from(self.duration().num_minutes()) / Decimal::from(60)
    }

    /// Strict interval overlap on the half-open window `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.requested_start < end && self.requested_end > start
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::{Cancelled, Completed, Confirmed, InProgress, Pending};
        matches!(
            (self.status, next),
            (Pending, Confirmed)
                | (Confirmed, InProgress)
                | (Confirmed, Completed)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (InProgress, Cancelled)
        )
    }

    fn transition_to(&mut self, next: BookingStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidBookingTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), DomainError> {
        self.transition_to(BookingStatus::Confirmed)
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition_to(BookingStatus::InProgress)?;
        self.actual_start = Some(now);
        Ok(())
    }

    pub fn complete(
        &mut self,
        completed_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(BookingStatus::Completed)?;
        self.actual_end = Some(now);
        self.completed_by = Some(completed_by.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition_to(BookingStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewBookingRequest {
    pub org_id: String,
    pub resource_id: ResourceId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub requested_start: DateTime<Utc>,
    pub requested_end: DateTime<Utc>,
    pub required_capacity: i64,
    pub priority: BookingPriority,
    pub source: SourceRef,
    #[serde(default)]
    pub custom_data: serde_json::Value,
    pub requested_by: String,
}

impl NewBookingRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::MissingField("title"));
        }
        if self.requested_start >= self.requested_end {
            return Err(DomainError::InvalidWindow {
                start: self.requested_start,
                end: self.requested_end,
            });
        }
        if self.required_capacity < 1 {
            return Err(DomainError::InvalidCapacity(self.required_capacity));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::{BookingId, BookingPriority, BookingRequest, BookingStatus, SourceRef};
    use crate::domain::resource::ResourceId;

    pub fn booking(
        id: i64,
        status: BookingStatus,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingRequest {
        BookingRequest {
            id: BookingId(id),
            uuid: Uuid::new_v4(),
            org_id: "org-1".to_string(),
            resource_id: ResourceId(1),
            title: format!("booking {id}"),
            description: String::new(),
            requested_start: start,
            requested_end: end,
            actual_start: None,
            actual_end: None,
            required_capacity: 1,
            status,
            priority: BookingPriority::Normal,
            source: SourceRef::new("cflows", "team_booking", id.to_string()),
            custom_data: serde_json::Value::Null,
            requested_by: "user-1".to_string(),
            completed_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::test_support::booking;
    use super::{BookingStatus, NewBookingRequest, SourceRef};
    use crate::domain::booking::BookingPriority;
    use crate::domain::resource::ResourceId;
    use crate::errors::DomainError;

    fn window() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();
        (start, start + Duration::hours(2))
    }

    #[test]
    fn happy_path_lifecycle() {
        let (start, end) = window();
        let mut booking = booking(1, BookingStatus::Pending, start, end);
        let now = Utc::now();

        booking.confirm().expect("pending -> confirmed");
        booking.start(now).expect("confirmed -> in_progress");
        assert_eq!(booking.actual_start, Some(now));

        booking.complete("user-2", now).expect("in_progress -> completed");
        assert_eq!(booking.actual_end, Some(now));
        assert_eq!(booking.completed_by.as_deref(), Some("user-2"));
        assert!(booking.status.is_terminal());
    }

    #[test]
    fn completed_booking_rejects_every_transition() {
        let (start, end) = window();
        let mut booking = booking(1, BookingStatus::Completed, start, end);

        for next in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::InProgress,
            BookingStatus::Cancelled,
        ] {
            assert!(!booking.can_transition_to(next));
        }
        let error = booking.cancel().expect_err("completed cannot cancel");
        assert!(matches!(error, DomainError::InvalidBookingTransition { .. }));
    }

    #[test]
    fn cancel_is_reachable_from_every_non_terminal_state() {
        let (start, end) = window();
        for status in
            [BookingStatus::Pending, BookingStatus::Confirmed, BookingStatus::InProgress]
        {
            let mut booking = booking(1, status, start, end);
            booking.cancel().expect("non-terminal states can cancel");
            assert_eq!(booking.status, BookingStatus::Cancelled);
        }
    }

    #[test]
    fn complete_is_allowed_straight_from_confirmed() {
        let (start, end) = window();
        let mut booking = booking(1, BookingStatus::Confirmed, start, end);
        booking.complete("user-2", Utc::now()).expect("confirmed -> completed");
        assert_eq!(booking.status, BookingStatus::Completed);
    }

    #[test]
    fn overlap_is_strict_on_the_half_open_window() {
        let (start, end) = window();
        let booking = booking(1, BookingStatus::Confirmed, start, end);

        assert!(booking.overlaps(start + Duration::hours(1), end + Duration::hours(1)));
        // Touching endpoints do not overlap.
        assert!(!booking.overlaps(end, end + Duration::hours(2)));
        assert!(!booking.overlaps(start - Duration::hours(2), start));
    }

    #[test]
    fn duration_hours_uses_decimal() {
        let (start, _) = window();
        let booking = booking(1, BookingStatus::Pending, start, start + Duration::minutes(90));
        assert_eq!(booking.duration_hours(), Decimal::new(15, 1)); // 1.5h
    }

    #[test]
    fn new_booking_validation() {
        let (start, end) = window();
        let input = NewBookingRequest {
            org_id: "org-1".to_string(),
            resource_id: ResourceId(1),
            title: "Inspection".to_string(),
            description: String::new(),
            requested_start: end,
            requested_end: start,
            required_capacity: 1,
            priority: BookingPriority::Normal,
            source: SourceRef::new("cflows", "work_item", "7"),
            custom_data: serde_json::Value::Null,
            requested_by: "user-1".to_string(),
        };
        assert!(matches!(input.validate(), Err(DomainError::InvalidWindow { .. })));

        let zero_capacity = NewBookingRequest {
            requested_start: start,
            requested_end: end,
            required_capacity: 0,
            ..input
        };
        assert_eq!(zero_capacity.validate(), Err(DomainError::InvalidCapacity(0)));
    }
}
