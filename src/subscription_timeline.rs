//! Subscription timeline classification and renewal-date arithmetic.
//!
//! Records are classified against a calendar date ("today") into the single
//! current subscription, the upcoming ones and the past ones. Every
//! comparison is date-only; time-of-day in the raw values is discarded.
//! Records with missing or unparseable dates are excluded, never rejected.

use chrono::{DateTime, Days, Local, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{RenewalCadence, SubscriptionRecord};

const ISO_DATE: &str = "%Y-%m-%d";

/// Parses a backend date value down to its calendar date.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`
/// timestamps. Returns `None` for anything else.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, ISO_DATE) {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|timestamp| timestamp.date())
}

fn covers(record: &SubscriptionRecord, day: NaiveDate) -> bool {
    match (record.start(), record.end()) {
        (Some(start), Some(end)) => start <= day && day <= end,
        _ => false,
    }
}

/// Returns the first record, in input order, whose inclusive range contains `today`.
///
/// Overlapping ranges are not repaired: the first match wins and the overlap
/// is logged.
pub fn find_current(records: &[SubscriptionRecord], today: NaiveDate) -> Option<&SubscriptionRecord> {
    let mut covering = records.iter().filter(|record| covers(record, today));
    let current = covering.next()?;

    let overlapping = covering.count();
    if overlapping > 0 {
        tracing::warn!(
            "{} more subscription(s) also cover {}; keeping the first one ({:?})",
            overlapping,
            today,
            current.id
        );
    }

    Some(current)
}

/// Records starting strictly after the current subscription ends (or after
/// `today` when there is none), earliest first.
///
/// Returns `None` rather than an empty list when nothing qualifies.
pub fn find_future<'a>(
    records: &'a [SubscriptionRecord],
    current: Option<&SubscriptionRecord>,
    today: NaiveDate,
) -> Option<Vec<&'a SubscriptionRecord>> {
    let cutoff = current.and_then(SubscriptionRecord::end).unwrap_or(today);

    let mut upcoming: Vec<(NaiveDate, &SubscriptionRecord)> = records
        .iter()
        .filter_map(|record| record.start().map(|start| (start, record)))
        .filter(|(start, _)| *start > cutoff)
        .collect();

    if upcoming.is_empty() {
        return None;
    }

    upcoming.sort_by_key(|(start, _)| *start);
    Some(upcoming.into_iter().map(|(_, record)| record).collect())
}

/// Records ending strictly before the current subscription starts (or before
/// `today` when there is none), most recent start first.
///
/// The ordering key is the start date even though qualification uses the
/// end date. Records without a usable start date sort last.
pub fn find_past<'a>(
    records: &'a [SubscriptionRecord],
    current: Option<&SubscriptionRecord>,
    today: NaiveDate,
) -> Option<Vec<&'a SubscriptionRecord>> {
    let cutoff = current.and_then(SubscriptionRecord::start).unwrap_or(today);

    let mut past: Vec<(Option<NaiveDate>, &SubscriptionRecord)> = records
        .iter()
        .filter(|record| record.end().is_some_and(|end| end < cutoff))
        .map(|record| (record.start(), record))
        .collect();

    if past.is_empty() {
        return None;
    }

    past.sort_by(|(a, _), (b, _)| b.cmp(a));
    Some(past.into_iter().map(|(_, record)| record).collect())
}

/// A client's subscriptions split around a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionTimeline {
    /// Date the records were classified against.
    pub as_of: NaiveDate,
    pub current: Option<SubscriptionRecord>,
    pub upcoming: Option<Vec<SubscriptionRecord>>,
    pub past: Option<Vec<SubscriptionRecord>>,
}

impl SubscriptionTimeline {
    pub fn classify(records: &[SubscriptionRecord], today: NaiveDate) -> Self {
        let current = find_current(records, today);
        let upcoming = find_future(records, current, today);
        let past = find_past(records, current, today);

        Self {
            as_of: today,
            current: current.cloned(),
            upcoming: upcoming.map(|list| list.into_iter().cloned().collect()),
            past: past.map(|list| list.into_iter().cloned().collect()),
        }
    }

    /// First uncovered day after the current and upcoming plans, or `as_of`
    /// when the client has no active or upcoming coverage.
    pub fn renewal_start(&self) -> NaiveDate {
        self.current
            .iter()
            .chain(self.upcoming.iter().flatten())
            .filter_map(SubscriptionRecord::end)
            .max()
            .and_then(|end| end.checked_add_days(Days::new(1)))
            .unwrap_or(self.as_of)
    }
}

/// End date of a renewal starting at `anchor`, using calendar months for
/// monthly and quarterly plans and a fixed 365 days for yearly plans.
///
/// Month arithmetic is chrono's: a day past the end of the target month is
/// clamped to its last day. `None` when the result is past the last
/// representable date.
pub fn renewal_end_date(cadence: RenewalCadence, anchor: NaiveDate) -> Option<NaiveDate> {
    let next = match cadence {
        RenewalCadence::Weekly => anchor.checked_add_days(Days::new(7)),
        RenewalCadence::Monthly => anchor.checked_add_months(Months::new(1)),
        RenewalCadence::Quarterly => anchor.checked_add_months(Months::new(3)),
        RenewalCadence::Yearly => anchor.checked_add_days(Days::new(365)),
    };
    if next.is_none() {
        tracing::warn!("{} renewal from {} overflows the calendar", cadence, anchor);
    }
    next
}

/// Next renewal date as `YYYY-MM-DD`. `anchor` defaults to the local date.
pub fn next_renewal_date(cadence: RenewalCadence, anchor: Option<NaiveDate>) -> Option<String> {
    let anchor = anchor.unwrap_or_else(|| Local::now().date_naive());
    renewal_end_date(cadence, anchor).map(|date| date.format(ISO_DATE).to_string())
}

/// Fixed day count for a lowercase interval name. Unknown names fall back to a week.
pub fn interval_days(interval: &str) -> u64 {
    match interval {
        "weekly" => 7,
        "monthly" => 30,
        "quarterly" => 90,
        "yearly" => 365,
        other => {
            tracing::warn!("Unknown renewal interval '{}', scheduling 7 days out", other);
            7
        }
    }
}

/// `start` plus the fixed day count of `interval`, as `YYYY-MM-DD`.
///
/// Unlike [`next_renewal_date`] every interval is a fixed number of days.
/// Returns `None` when `start` is not a date or the result overflows.
pub fn future_date_from_interval(interval: &str, start: &str) -> Option<String> {
    let start = normalize_date(start)?;
    fixed_interval_end(interval, start).map(|date| date.format(ISO_DATE).to_string())
}

fn fixed_interval_end(interval: &str, start: NaiveDate) -> Option<NaiveDate> {
    let end = start.checked_add_days(Days::new(interval_days(interval)));
    if end.is_none() {
        tracing::warn!("'{}' schedule from {} overflows the calendar", interval, start);
    }
    end
}
