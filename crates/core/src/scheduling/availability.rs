//! Availability and admission-control queries. Every function here is
//! a pure read over the bookings/rules the caller fetched; mutual
//! exclusion across check-then-confirm is the caller's responsibility.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::booking::{BookingId, BookingRequest, BookingStatus};
use crate::domain::resource::SchedulableResource;
use crate::domain::rule::{ResourceScheduleRule, RuleConfig};

/// Number of capacity-holding bookings overlapping `[start, end)`,
/// optionally excluding one booking (used when re-validating an
/// update of that same booking).
pub fn overlap_count(
    bookings: &[BookingRequest],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<BookingId>,
) -> usize {
    bookings
        .iter()
        .filter(|b| b.status.counts_against_capacity())
        .filter(|b| exclude != Some(b.id))
        .filter(|b| b.overlaps(start, end))
        .count()
}

/// The base capacity check: would admitting `[start, end)` keep the
/// number of concurrent holders under `max_concurrent_bookings`?
pub fn has_capacity(
    resource: &SchedulableResource,
    bookings: &[BookingRequest],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<BookingId>,
) -> bool {
    (overlap_count(bookings, start, end, exclude) as i64) < resource.max_concurrent_bookings
}

/// Hour-of-day working-hours check. This compares the start and end
/// hours against the configured window and is not aware of windows
/// spanning midnight.
fn within_working_hours(resource: &SchedulableResource, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let config = &resource.availability;
    start.hour() >= config.start_hour && end.hour() <= config.end_hour
}

fn blackout_rule_applies(
    rules: &[ResourceScheduleRule],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    rules
        .iter()
        .filter(|rule| rule.is_active && matches!(rule.config, RuleConfig::Blackout))
        .any(|rule| rule.window_intersects(start, end))
}

/// Full admission check for `[start, end)`: capacity, working hours,
/// working day, ad-hoc blackout dates, then blackout rules.
pub fn is_window_available(
    resource: &SchedulableResource,
    bookings: &[BookingRequest],
    rules: &[ResourceScheduleRule],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<BookingId>,
) -> bool {
    if !has_capacity(resource, bookings, start, end, exclude) {
        return false;
    }
    if !within_working_hours(resource, start, end) {
        return false;
    }
    let date = start.date_naive();
    if !resource.availability.is_working_day(date) || resource.availability.is_blackout_date(date) {
        return false;
    }
    !blackout_rule_applies(rules, start, end)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub is_available: bool,
    pub booking_count: usize,
    pub total_hours: Decimal,
    pub max_capacity_hours: Decimal,
    pub utilization_percent: Decimal,
}

/// Per-day aggregation of confirmed/in-progress load over a date
/// range, keyed by each booking's start date.
pub fn daily_availability(
    resource: &SchedulableResource,
    bookings: &[BookingRequest],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Vec<DayAvailability> {
    let mut days = Vec::new();
    let mut current = start_date;

    while current <= end_date {
        let day_bookings: Vec<&BookingRequest> = bookings
            .iter()
            .filter(|b| b.status.counts_against_capacity())
            .filter(|b| b.requested_start.date_naive() == current)
            .collect();

        let total_hours: Decimal =
            day_bookings.iter().map(|b| b.duration_hours()).sum::<Decimal>().round_dp(2);
        let max_capacity_hours = resource.availability.daily_capacity_hours();
        let utilization_percent = if max_capacity_hours > Decimal::ZERO {
            (total_hours / max_capacity_hours * Decimal::from(100)).round_dp(1)
        } else {
            Decimal::ZERO
        };

        days.push(DayAvailability {
            date: current,
            is_available: resource.availability.is_working_day(current)
                && !resource.availability.is_blackout_date(current),
            booking_count: day_bookings.len(),
            total_hours,
            max_capacity_hours,
            utilization_percent,
        });

        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    days
}

/// Ordered schedule view: pending, confirmed, and in-progress bookings
/// overlapping the range. Pending entries are included for
/// visualization only; they never count against capacity.
pub fn resource_schedule<'a>(
    bookings: &'a [BookingRequest],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<&'a BookingRequest> {
    let mut items: Vec<&BookingRequest> = bookings
        .iter()
        .filter(|b| {
            matches!(
                b.status,
                BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::InProgress
            )
        })
        .filter(|b| b.overlaps(start, end))
        .collect();
    items.sort_by_key(|b| b.requested_start);
    items
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtilizationStats {
    pub total_bookings: usize,
    pub total_hours: Decimal,
    pub max_possible_hours: Decimal,
    pub utilization_percent: Decimal,
    pub average_booking_duration: Decimal,
}

/// Utilization over a date range, counting confirmed, in-progress,
/// and completed bookings that start within it.
pub fn utilization_stats(
    resource: &SchedulableResource,
    bookings: &[BookingRequest],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> UtilizationStats {
    let in_range: Vec<&BookingRequest> = bookings
        .iter()
        .filter(|b| {
            matches!(
                b.status,
                BookingStatus::Confirmed | BookingStatus::InProgress | BookingStatus::Completed
            )
        })
        .filter(|b| {
            let date = b.requested_start.date_naive();
            date >= start_date && date <= end_date
        })
        .collect();

    let total_bookings = in_range.len();
    let total_hours: Decimal =
        in_range.iter().map(|b| b.duration_hours()).sum::<Decimal>().round_dp(2);

    let days_in_period = Decimal::from((end_date - start_date).num_days() + 1);
    let max_possible_hours =
        (days_in_period * resource.availability.daily_capacity_hours()).round_dp(2);

    let utilization_percent = if max_possible_hours > Decimal::ZERO {
        (total_hours / max_possible_hours * Decimal::from(100)).round_dp(1)
    } else {
        Decimal::ZERO
    };
    let average_booking_duration = if total_bookings > 0 {
        (total_hours / Decimal::from(total_bookings)).round_dp(2)
    } else {
        Decimal::ZERO
    };

    UtilizationStats {
        total_bookings,
        total_hours,
        max_possible_hours,
        utilization_percent,
        average_booking_duration,
    }
}
