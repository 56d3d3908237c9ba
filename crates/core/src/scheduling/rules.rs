//! Schedule-rule evaluation. Rules are evaluated in ascending
//! `priority` order and dispatched per `RuleConfig` variant; the
//! decision records which rule fired so callers can report it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingRequest;
use crate::domain::resource::SchedulableResource;
use crate::domain::rule::{ResourceScheduleRule, RuleConfig, RuleId};
use crate::scheduling::availability::{has_capacity, is_window_available};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: RuleId,
    pub rule_name: String,
}

/// Outcome of evaluating the approval rules for one booking. Both
/// sides may match; `require_approval` always wins (the conservative
/// branch), and `can_auto_confirm` encodes that precedence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub require_approval: Option<RuleMatch>,
    pub auto_approval: Option<RuleMatch>,
}

fn approval_constraints_match(
    match_priority: Option<crate::domain::booking::BookingPriority>,
    max_duration_hours: Option<rust_decimal::Decimal>,
    booking: &BookingRequest,
) -> bool {
    if let Some(priority) = match_priority {
        if booking.priority != priority {
            return false;
        }
    }
    if let Some(max_hours) = max_duration_hours {
        if booking.duration_hours() > max_hours {
            return false;
        }
    }
    true
}

/// Evaluate the approval rules against a booking at time `now`.
/// Blackout rules are handled by the availability resolver, not here.
pub fn evaluate(
    rules: &[ResourceScheduleRule],
    booking: &BookingRequest,
    now: DateTime<Utc>,
) -> AdmissionDecision {
    let mut ordered: Vec<&ResourceScheduleRule> =
        rules.iter().filter(|rule| rule.in_effect_at(now)).collect();
    ordered.sort_by_key(|rule| (rule.priority, rule.id.0));

    let mut decision = AdmissionDecision::default();
    for rule in ordered {
        match &rule.config {
            RuleConfig::Blackout => {}
            RuleConfig::AutoApproval { match_priority, max_duration_hours } => {
                if decision.auto_approval.is_none()
                    && approval_constraints_match(*match_priority, *max_duration_hours, booking)
                {
                    decision.auto_approval =
                        Some(RuleMatch { rule_id: rule.id, rule_name: rule.name.clone() });
                }
            }
            RuleConfig::RequireApproval { match_priority, max_duration_hours } => {
                if decision.require_approval.is_none()
                    && approval_constraints_match(*match_priority, *max_duration_hours, booking)
                {
                    decision.require_approval =
                        Some(RuleMatch { rule_id: rule.id, rule_name: rule.name.clone() });
                }
            }
        }
    }
    decision
}

/// Admission decision for a freshly created pending booking.
///
/// A matching require_approval rule always disallows auto-confirm. A
/// matching auto_approval rule bypasses working-hours and blackout
/// restrictions but never the capacity check. With no matching rule,
/// plain availability decides.
pub fn can_auto_confirm(
    resource: &SchedulableResource,
    rules: &[ResourceScheduleRule],
    bookings: &[BookingRequest],
    booking: &BookingRequest,
    now: DateTime<Utc>,
) -> bool {
    let decision = evaluate(rules, booking, now);
    if decision.require_approval.is_some() {
        return false;
    }
    if decision.auto_approval.is_some() {
        return has_capacity(
            resource,
            bookings,
            booking.requested_start,
            booking.requested_end,
            Some(booking.id),
        );
    }
    is_window_available(
        resource,
        bookings,
        rules,
        booking.requested_start,
        booking.requested_end,
        Some(booking.id),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{can_auto_confirm, evaluate};
    use crate::domain::booking::test_support::booking;
    use crate::domain::booking::{BookingPriority, BookingStatus};
    use crate::domain::resource::{
        AvailabilityConfig, ResourceId, ResourceType, SchedulableResource,
    };
    use crate::domain::rule::{ResourceScheduleRule, RuleConfig, RuleId};

    fn resource(capacity: i64) -> SchedulableResource {
        SchedulableResource {
            id: ResourceId(1),
            org_id: "org-1".to_string(),
            name: "Paint Shop".to_string(),
            resource_type: ResourceType::Team,
            description: String::new(),
            max_concurrent_bookings: capacity,
            availability: AvailabilityConfig::default(),
            linked_team: None,
            external_resource_id: None,
            service_type: "cflows".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rule(id: i64, priority: i64, config: RuleConfig) -> ResourceScheduleRule {
        ResourceScheduleRule {
            id: RuleId(id),
            resource_id: ResourceId(1),
            name: format!("rule {id}"),
            description: String::new(),
            config,
            priority,
            effective_start: None,
            effective_end: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn monday_at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap()
    }

    #[test]
    fn approval_constraints_require_exact_priority() {
        let candidate = booking(1, BookingStatus::Pending, monday_at(10), monday_at(12));
        let rules = vec![rule(
            1,
            0,
            RuleConfig::AutoApproval {
                match_priority: Some(BookingPriority::High),
                max_duration_hours: None,
            },
        )];

        let decision = evaluate(&rules, &candidate, Utc::now());
        assert!(decision.auto_approval.is_none());

        let mut high = candidate;
        high.priority = BookingPriority::High;
        let decision = evaluate(&rules, &high, Utc::now());
        assert_eq!(decision.auto_approval.as_ref().map(|m| m.rule_id.0), Some(1));
    }

    #[test]
    fn max_duration_caps_the_match() {
        let short = booking(1, BookingStatus::Pending, monday_at(10), monday_at(12));
        let long = booking(2, BookingStatus::Pending, monday_at(9), monday_at(15));
        let rules = vec![rule(
            1,
            0,
            RuleConfig::AutoApproval {
                match_priority: None,
                max_duration_hours: Some(Decimal::from(4)),
            },
        )];

        assert!(evaluate(&rules, &short, Utc::now()).auto_approval.is_some());
        assert!(evaluate(&rules, &long, Utc::now()).auto_approval.is_none());
    }

    #[test]
    fn lowest_priority_matching_rule_wins_attribution() {
        let candidate = booking(1, BookingStatus::Pending, monday_at(10), monday_at(12));
        let rules = vec![
            rule(
                7,
                10,
                RuleConfig::AutoApproval { match_priority: None, max_duration_hours: None },
            ),
            rule(
                3,
                1,
                RuleConfig::AutoApproval { match_priority: None, max_duration_hours: None },
            ),
        ];

        let decision = evaluate(&rules, &candidate, Utc::now());
        assert_eq!(decision.auto_approval.as_ref().map(|m| m.rule_id.0), Some(3));
    }

    #[test]
    fn require_approval_wins_over_auto_approval() {
        let candidate = booking(1, BookingStatus::Pending, monday_at(10), monday_at(12));
        let rules = vec![
            rule(
                1,
                0,
                RuleConfig::AutoApproval { match_priority: None, max_duration_hours: None },
            ),
            rule(
                2,
                5,
                RuleConfig::RequireApproval { match_priority: None, max_duration_hours: None },
            ),
        ];

        let decision = evaluate(&rules, &candidate, Utc::now());
        assert!(decision.auto_approval.is_some());
        assert!(decision.require_approval.is_some());
        assert!(!can_auto_confirm(&resource(1), &rules, &[], &candidate, Utc::now()));
    }

    #[test]
    fn auto_approval_bypasses_hours_but_not_capacity() {
        let resource = resource(1);
        // Sunday booking, outside working days.
        let sunday = Utc.with_ymd_and_hms(2025, 3, 9, 10, 0, 0).unwrap();
        let candidate = booking(9, BookingStatus::Pending, sunday, sunday + Duration::hours(2));
        let rules =
            vec![rule(1, 0, RuleConfig::AutoApproval { match_priority: None, max_duration_hours: None })];

        assert!(can_auto_confirm(&resource, &rules, &[], &candidate, Utc::now()));

        // Same window already fully booked: the override does not help.
        let holder = booking(8, BookingStatus::Confirmed, sunday, sunday + Duration::hours(2));
        assert!(!can_auto_confirm(&resource, &rules, &[holder], &candidate, Utc::now()));
    }

    #[test]
    fn plain_availability_decides_without_matching_rules() {
        let resource = resource(1);
        let candidate = booking(1, BookingStatus::Pending, monday_at(10), monday_at(12));

        assert!(can_auto_confirm(&resource, &[], &[], &candidate, Utc::now()));

        let holder = booking(2, BookingStatus::Confirmed, monday_at(10), monday_at(12));
        assert!(!can_auto_confirm(&resource, &[], &[holder], &candidate, Utc::now()));
    }

    #[test]
    fn expired_rules_do_not_fire() {
        let candidate = booking(1, BookingStatus::Pending, monday_at(10), monday_at(12));
        let mut expired = rule(
            1,
            0,
            RuleConfig::RequireApproval { match_priority: None, max_duration_hours: None },
        );
        expired.effective_end = Some(monday_at(0) - Duration::days(30));

        let decision = evaluate(&[expired], &candidate, Utc::now());
        assert!(decision.require_approval.is_none());
    }
}
