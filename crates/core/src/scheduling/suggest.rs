//! Alternative-time search. Scans outward from a requested window in
//! fixed steps, both forward and backward, and returns the nearest
//! available windows of the same duration.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingRequest;
use crate::domain::resource::SchedulableResource;
use crate::domain::rule::ResourceScheduleRule;
use crate::scheduling::availability::is_window_available;

/// How far from the requested start the search is willing to look.
pub const SEARCH_HORIZON_DAYS: i64 = 14;
/// Granularity of candidate start times.
pub const SEARCH_STEP_HOURS: i64 = 2;

/// Tunable bounds for one search. `Default` matches the engine
/// constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchParams {
    pub horizon_days: i64,
    pub step_hours: i64,
    pub limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { horizon_days: SEARCH_HORIZON_DAYS, step_hours: SEARCH_STEP_HOURS, limit: 5 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSuggestion {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Signed distance from the requested start, in hours.
    pub offset_hours: i64,
    /// True when the suggestion is the requested window itself.
    pub is_preferred: bool,
}

/// Suggest up to `limit` available windows near the requested one,
/// nearest first. A forward candidate sorts before the backward
/// candidate at the same distance.
pub fn suggest_alternative_times(
    resource: &SchedulableResource,
    bookings: &[BookingRequest],
    rules: &[ResourceScheduleRule],
    requested_start: DateTime<Utc>,
    requested_end: DateTime<Utc>,
    params: SearchParams,
) -> Vec<TimeSuggestion> {
    let duration = requested_end - requested_start;
    if duration <= Duration::zero()
        || params.limit == 0
        || params.step_hours <= 0
        || params.horizon_days <= 0
    {
        return Vec::new();
    }

    let mut suggestions = Vec::new();
    let horizon_hours = params.horizon_days * 24;

    let mut consider = |offset_hours: i64, suggestions: &mut Vec<TimeSuggestion>| {
        let start = requested_start + Duration::hours(offset_hours);
        let end = start + duration;
        if is_window_available(resource, bookings, rules, start, end, None) {
            suggestions.push(TimeSuggestion {
                start,
                end,
                offset_hours,
                is_preferred: offset_hours == 0,
            });
        }
    };

    consider(0, &mut suggestions);
    let mut offset = params.step_hours;
    while offset <= horizon_hours {
        consider(offset, &mut suggestions);
        consider(-offset, &mut suggestions);
        offset += params.step_hours;
    }

    // Stable sort keeps the forward candidate ahead of the backward
    // one at the same distance.
    suggestions.sort_by_key(|s| s.offset_hours.abs());
    suggestions.truncate(params.limit);
    suggestions
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Timelike, Utc};

    use super::{suggest_alternative_times, SearchParams, TimeSuggestion};
    use crate::domain::booking::test_support::booking;
    use crate::domain::booking::BookingStatus;
    use crate::domain::resource::{
        AvailabilityConfig, ResourceId, ResourceType, SchedulableResource,
    };

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

    fn monday_at(hour: u32) -> chrono::DateTime<Utc> {
        // Monday 2025-03-03.
        Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap()
    }

    #[test]
    fn free_window_is_preferred_and_first() {
        let resource = resource(1);
        let got = suggest_alternative_times(
            &resource,
            &[],
            &[],
            monday_at(10),
            monday_at(12),
            SearchParams { limit: 3, ..SearchParams::default() },
        );
        assert_eq!(got[0].start, monday_at(10));
        assert!(got[0].is_preferred);
        assert_eq!(got[0].offset_hours, 0);
    }

    #[test]
    fn nearest_alternative_follows_a_taken_window() {
        let resource = resource(1);
        let taken = booking(1, BookingStatus::Confirmed, monday_at(10), monday_at(12));

        let got = suggest_alternative_times(
            &resource,
            &[taken],
            &[],
            monday_at(10),
            monday_at(12),
            SearchParams { limit: 1, ..SearchParams::default() },
        );
        assert_eq!(
            got,
            vec![TimeSuggestion {
                start: monday_at(12),
                end: monday_at(14),
                offset_hours: 2,
                is_preferred: false,
            }]
        );
    }

    #[test]
    fn forward_beats_backward_at_equal_distance() {
        let resource = resource(1);
        let taken = booking(1, BookingStatus::Confirmed, monday_at(11), monday_at(13));

        // Requested 11:00-13:00 is taken; 13:00-15:00 (+2) and
        // 9:00-11:00 (-2) are both free and equidistant.
        let got = suggest_alternative_times(
            &resource,
            &[taken],
            &[],
            monday_at(11),
            monday_at(13),
            SearchParams { limit: 2, ..SearchParams::default() },
        );
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].offset_hours, 2);
        assert_eq!(got[1].offset_hours, -2);
    }

    #[test]
    fn suggestions_respect_working_hours() {
        let resource = resource(1);
        let taken = booking(1, BookingStatus::Confirmed, monday_at(13), monday_at(15));

        let got = suggest_alternative_times(
            &resource,
            &[taken],
            &[],
            monday_at(13),
            monday_at(15),
            SearchParams { limit: 10, ..SearchParams::default() },
        );
        for suggestion in &got {
            assert!(suggestion.start.hour() >= 9);
        }
        assert!(!got.iter().any(|s| s.start == monday_at(13)));
    }

    #[test]
    fn empty_when_window_is_degenerate() {
        let resource = resource(1);
        assert!(suggest_alternative_times(
            &resource,
            &[],
            &[],
            monday_at(12),
            monday_at(12),
            SearchParams { limit: 5, ..SearchParams::default() },
        )
        .is_empty());
    }

    #[test]
    fn limit_caps_the_result() {
        let resource = resource(1);
        let got = suggest_alternative_times(
            &resource,
            &[],
            &[],
            monday_at(9),
            monday_at(11),
            SearchParams { limit: 4, ..SearchParams::default() },
        );
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn fully_booked_horizon_yields_nothing() {
        let mut resource = resource(1);
        // Shrink the window to a single working day, then occupy it.
        resource.availability = AvailabilityConfig {
            start_hour: 9,
            end_hour: 11,
            working_days: vec![chrono::Weekday::Mon],
            blackout_dates: Vec::new(),
        };
        let mut taken = Vec::new();
        for week in -2i64..=2 {
            let start = monday_at(9) + Duration::days(7 * week);
            taken.push(booking(
                week + 3,
                BookingStatus::Confirmed,
                start,
                start + Duration::hours(2),
            ));
        }

        let got = suggest_alternative_times(
            &resource,
            &taken,
            &[],
            monday_at(9),
            monday_at(11),
            SearchParams { limit: 5, ..SearchParams::default() },
        );
        assert!(got.is_empty());
    }
}
