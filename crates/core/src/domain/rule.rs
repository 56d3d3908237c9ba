use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingPriority;
use crate::domain::resource::ResourceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Blackout,
    AutoApproval,
    RequireApproval,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blackout => "blackout",
            Self::AutoApproval => "auto_approval",
            Self::RequireApproval => "require_approval",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "blackout" => Some(Self::Blackout),
            "auto_approval" => Some(Self::AutoApproval),
            "require_approval" => Some(Self::RequireApproval),
            _ => None,
        }
    }
}

/// Typed rule payload. `match_priority` is an exact priority match and
/// `max_duration_hours` caps the requested duration; a rule with no
/// constraints matches every booking on its resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleConfig {
    Blackout,
    AutoApproval {
        match_priority: Option<BookingPriority>,
        max_duration_hours: Option<Decimal>,
    },
    RequireApproval {
        match_priority: Option<BookingPriority>,
        max_duration_hours: Option<Decimal>,
    },
}

impl RuleConfig {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Blackout => RuleKind::Blackout,
            Self::AutoApproval { .. } => RuleKind::AutoApproval,
            Self::RequireApproval { .. } => RuleKind::RequireApproval,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceScheduleRule {
    pub id: RuleId,
    pub resource_id: ResourceId,
    pub name: String,
    pub description: String,
    pub config: RuleConfig,
    /// Lower values evaluate first.
    pub priority: i64,
    pub effective_start: Option<DateTime<Utc>>,
    pub effective_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceScheduleRule {
    /// A rule is in effect when active and `at` falls inside its
    /// optional effective bounds.
    pub fn in_effect_at(&self, at: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(start) = self.effective_start {
            if start > at {
                return false;
            }
        }
        if let Some(end) = self.effective_end {
            if end < at {
                return false;
            }
        }
        true
    }

    /// Whether the rule's effective window intersects `[start, end)`.
    /// Missing bounds are treated as open-ended.
    pub fn window_intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let starts_before_end = self.effective_start.map(|s| s <= end).unwrap_or(true);
        let ends_after_start = self.effective_end.map(|e| e >= start).unwrap_or(true);
        starts_before_end && ends_after_start
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub resource_id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config: RuleConfig,
    #[serde(default)]
    pub priority: i64,
    pub effective_start: Option<DateTime<Utc>>,
    pub effective_end: Option<DateTime<Utc>>,
}
