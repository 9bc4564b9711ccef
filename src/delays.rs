//! Delay classification for in-flight shipments
//!
//! Classifies already-fetched trackings as delayed by comparing the most
//! authoritative expected-delivery date against a per-carrier threshold of
//! whole days overdue. Records without any expected date are never
//! classified as delayed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::api::{Tag, Tracking};

/// Days past the expected delivery date before a shipment counts as
/// delayed, per carrier slug (matched case-insensitively)
const CARRIER_THRESHOLDS: &[(&str, i64)] = &[
    ("ups", 1),
    ("royal-mail", 3),
    ("fedex-freight", 2),
];

/// Threshold for carriers without a dedicated entry
const DEFAULT_THRESHOLD_DAYS: i64 = 2;

/// A shipment flagged as delayed, with the evidence used to flag it
#[derive(Debug, Clone, Serialize)]
pub struct DelayedShipment {
    pub tracking: Tracking,
    /// The expected-delivery date the classification used
    pub expected_delivery: NaiveDate,
    /// Whole days elapsed since the expected date
    pub days_overdue: i64,
    /// The threshold applied for this carrier
    pub threshold_days: i64,
}

/// Returns the overdue threshold for a carrier slug
pub fn threshold_days(slug: Option<&str>) -> i64 {
    let Some(slug) = slug else {
        return DEFAULT_THRESHOLD_DAYS;
    };
    CARRIER_THRESHOLDS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(slug))
        .map(|(_, days)| *days)
        .unwrap_or(DEFAULT_THRESHOLD_DAYS)
}

/// Picks the expected-delivery date for a tracking
///
/// Priority order: latest carrier estimate, then the courier's promised
/// date, then the date promised when the order was placed. Unparseable
/// values are treated as unset.
pub fn expected_delivery(tracking: &Tracking) -> Option<NaiveDate> {
    [
        tracking.latest_estimated_delivery.as_deref(),
        tracking.courier_estimated_delivery_date.as_deref(),
        tracking.order_promised_delivery_date.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find_map(parse_flexible_date)
}

/// Whole days between now and the expected date, negative when the
/// expected date is still in the future
pub fn days_overdue(tracking: &Tracking, now: DateTime<Utc>) -> Option<i64> {
    let expected = expected_delivery(tracking)?;
    Some((now.date_naive() - expected).num_days())
}

/// Classifies one tracking, returning the delay report when it is delayed
pub fn classify(tracking: &Tracking, now: DateTime<Utc>) -> Option<DelayedShipment> {
    if matches!(tracking.tag, Some(Tag::Delivered) | Some(Tag::Expired)) {
        return None;
    }

    let expected = expected_delivery(tracking)?;
    let overdue = (now.date_naive() - expected).num_days();
    let threshold = threshold_days(tracking.slug.as_deref());
    if overdue < threshold {
        return None;
    }

    Some(DelayedShipment {
        tracking: tracking.clone(),
        expected_delivery: expected,
        days_overdue: overdue,
        threshold_days: threshold,
    })
}

/// Runs the classifier over a fetched batch
pub fn delayed_shipments(batch: &[Tracking], now: DateTime<Utc>) -> Vec<DelayedShipment> {
    batch
        .iter()
        .filter_map(|tracking| classify(tracking, now))
        .collect()
}

/// Parses a date from the formats the API uses: RFC 3339 timestamps,
/// bare datetimes, or bare dates
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
