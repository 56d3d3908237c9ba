use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Team,
    Equipment,
    Room,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Equipment => "equipment",
            Self::Room => "room",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "team" => Some(Self::Team),
            "equipment" => Some(Self::Equipment),
            "room" => Some(Self::Room),
            _ => None,
        }
    }
}

/// Working-hours and blackout configuration for a resource. Weekdays
/// follow chrono's `Weekday`; the default window matches the reference
/// deployment (09:00-17:00, Monday through Friday).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    pub working_days: Vec<Weekday>,
    #[serde(default)]
    pub blackout_dates: Vec<NaiveDate>,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            blackout_dates: Vec::new(),
        }
    }
}

impl AvailabilityConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(DomainError::InvalidConfig(format!(
                "availability hours {}..{} are not a valid daily window",
                self.start_hour, self.end_hour
            )));
        }
        if self.working_days.is_empty() {
            return Err(DomainError::InvalidConfig(
                "availability must include at least one working day".to_string(),
            ));
        }
        Ok(())
    }

    pub fn daily_capacity_hours(&self) -> Decimal {
        Decimal::from(self.end_hour.saturating_sub(self.start_hour))
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days.contains(&date.weekday())
    }

    pub fn is_blackout_date(&self, date: NaiveDate) -> bool {
        self.blackout_dates.contains(&date)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulableResource {
    pub id: ResourceId,
    pub org_id: String,
    pub name: String,
    pub resource_type: ResourceType,
    pub description: String,
    pub max_concurrent_bookings: i64,
    pub availability: AvailabilityConfig,
    pub linked_team: Option<String>,
    pub external_resource_id: Option<String>,
    pub service_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a resource; validated before it touches storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewResource {
    #[serde(default)]
    pub org_id: String,
    pub name: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub description: String,
    pub max_concurrent_bookings: i64,
    #[serde(default)]
    pub availability: AvailabilityConfig,
    pub linked_team: Option<String>,
    pub external_resource_id: Option<String>,
    pub service_type: String,
}

impl NewResource {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.org_id.trim().is_empty() {
            return Err(DomainError::MissingField("org_id"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::MissingField("name"));
        }
        if self.max_concurrent_bookings < 1 {
            return Err(DomainError::InvalidCapacity(self.max_concurrent_bookings));
        }
        self.availability.validate()
    }
}
