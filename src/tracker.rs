//! High-level tracking client with response caching
//!
//! `TrackerClient` wraps the raw API client with cache-aside reads,
//! conservative cache invalidation on writes, and the client-side
//! monitoring queries: delay classification, the multi-tag active-shipment
//! sweep, delivered date windows, and carrier resolution. Cache keys are
//! built deterministically from an operation tag and its sorted
//! parameters, so identical reads within a TTL window share one entry.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::api::{
    ApiClient, ApiError, Courier, ListFilters, NewTracking, Tag, Tracking, TrackingId,
    TrackingList, TrackingUpdate,
};
use crate::cache::CacheStore;
use crate::delays::{self, DelayedShipment};
use crate::resolve::{self, CarrierResolution};

/// Cache TTL for tracking detail and list reads
const TTL_TRACKING_MINUTES: i64 = 5;

/// Cache TTL for delivered-window queries
const TTL_DELIVERED_MINUTES: i64 = 15;

/// Cache TTL for courier lists
const TTL_COURIERS_MINUTES: i64 = 60;

/// Cache TTL for carrier detection, which is deterministic per number
const TTL_DETECT_MINUTES: i64 = 24 * 60;

/// Every list-style tracking key starts with this prefix, which is what
/// mutating operations invalidate
const LIST_PREFIX: &str = "trackings:";

/// Status tags that mean a shipment is still moving
const ACTIVE_TAGS: &[Tag] = &[
    Tag::Pending,
    Tag::InfoReceived,
    Tag::InTransit,
    Tag::OutForDelivery,
    Tag::AttemptFail,
    Tag::AvailableForPickup,
    Tag::Exception,
];

/// Errors from the tracking client
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The remote call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A locally-validated date window was inverted
    #[error("invalid date window: {0}")]
    InvalidDateWindow(String),
}

/// Tracking client layering a response cache over the API client
///
/// Reads go cache-first with an operation-specific TTL; writes go straight
/// to the API and then invalidate the exact detail key they touched plus
/// every list-style entry. Built with `None` for the cache, every read
/// goes remote (the `--no-cache` path).
pub struct TrackerClient {
    api: ApiClient,
    cache: Option<CacheStore>,
}

impl TrackerClient {
    /// Creates a tracking client with an optional response cache
    pub fn new(api: ApiClient, cache: Option<CacheStore>) -> Self {
        Self { api, cache }
    }

    /// Registers a new shipment and invalidates list-style caches
    pub async fn create_tracking(&mut self, new: &NewTracking) -> Result<Tracking, TrackerError> {
        let tracking = self.api.create_tracking(new).await?;

        let mut stale = vec![LIST_PREFIX.to_string()];
        if let Some(slug) = &new.slug {
            stale.push(detail_key(&TrackingId::SlugNumber {
                slug: slug.clone(),
                number: new.tracking_number.clone(),
            }));
        }
        self.invalidate_stale(&stale);
        Ok(tracking)
    }

    /// Fetches one tracking, serving from cache within the TTL
    pub async fn get_tracking(&mut self, id: &TrackingId) -> Result<Tracking, TrackerError> {
        let key = detail_key(id);
        if let Some(hit) = self.cache_get::<Tracking>(&key) {
            return Ok(hit);
        }

        let tracking = self.api.get_tracking(id).await?;
        self.cache_put(&key, &tracking, TTL_TRACKING_MINUTES);
        Ok(tracking)
    }

    /// Lists trackings, serving from cache within the TTL
    pub async fn list_trackings(
        &mut self,
        filters: &ListFilters,
    ) -> Result<TrackingList, TrackerError> {
        let key = list_key(filters);
        if let Some(hit) = self.cache_get::<TrackingList>(&key) {
            return Ok(hit);
        }

        let list = self.api.list_trackings(filters).await?;
        self.cache_put(&key, &list, TTL_TRACKING_MINUTES);
        Ok(list)
    }

    /// Updates a tracking and invalidates its detail key plus list caches
    pub async fn update_tracking(
        &mut self,
        id: &TrackingId,
        update: &TrackingUpdate,
    ) -> Result<Tracking, TrackerError> {
        let tracking = self.api.update_tracking(id, update).await?;
        self.invalidate_stale(&stale_patterns(id));
        Ok(tracking)
    }

    /// Deletes a tracking and invalidates its detail key plus list caches
    pub async fn delete_tracking(&mut self, id: &TrackingId) -> Result<Tracking, TrackerError> {
        let tracking = self.api.delete_tracking(id).await?;
        self.invalidate_stale(&stale_patterns(id));
        Ok(tracking)
    }

    /// Re-activates an expired tracking and invalidates stale reads
    pub async fn retrack(&mut self, id: &TrackingId) -> Result<Tracking, TrackerError> {
        let tracking = self.api.retrack(id).await?;
        self.invalidate_stale(&stale_patterns(id));
        Ok(tracking)
    }

    /// Closes a tracking with a reason and invalidates stale reads
    pub async fn mark_completed(
        &mut self,
        id: &TrackingId,
        reason: &str,
    ) -> Result<Tracking, TrackerError> {
        let tracking = self.api.mark_as_completed(id, reason).await?;
        self.invalidate_stale(&stale_patterns(id));
        Ok(tracking)
    }

    /// Couriers activated on the account, cached for an hour
    pub async fn list_couriers(&mut self) -> Result<Vec<Courier>, TrackerError> {
        let key = "couriers:list".to_string();
        if let Some(hit) = self.cache_get::<Vec<Courier>>(&key) {
            return Ok(hit);
        }

        let couriers = self.api.list_couriers().await?;
        self.cache_put(&key, &couriers, TTL_COURIERS_MINUTES);
        Ok(couriers)
    }

    /// Every courier the provider supports, cached for an hour
    pub async fn list_all_couriers(&mut self) -> Result<Vec<Courier>, TrackerError> {
        let key = "couriers:all".to_string();
        if let Some(hit) = self.cache_get::<Vec<Courier>>(&key) {
            return Ok(hit);
        }

        let couriers = self.api.list_all_couriers().await?;
        self.cache_put(&key, &couriers, TTL_COURIERS_MINUTES);
        Ok(couriers)
    }

    /// Provider-side carrier detection, cached for a day
    pub async fn detect_courier(&mut self, number: &str) -> Result<Vec<Courier>, TrackerError> {
        let key = cache_key("couriers:detect", &[("number", Some(number.to_string()))]);
        if let Some(hit) = self.cache_get::<Vec<Courier>>(&key) {
            return Ok(hit);
        }

        let couriers = self.api.detect_couriers(number).await?;
        self.cache_put(&key, &couriers, TTL_DETECT_MINUTES);
        Ok(couriers)
    }

    /// All shipments still moving: one list call per active status tag,
    /// issued sequentially, deduplicated by tracking id
    pub async fn active_shipments(&mut self) -> Result<Vec<Tracking>, TrackerError> {
        let mut seen = HashSet::new();
        let mut active = Vec::new();

        for tag in ACTIVE_TAGS {
            let filters = ListFilters {
                tag: Some(*tag),
                ..Default::default()
            };
            let list = self.list_trackings(&filters).await?;
            for tracking in list.trackings {
                if seen.insert(tracking.id.clone()) {
                    active.push(tracking);
                }
            }
        }

        Ok(active)
    }

    /// Active shipments past their carrier's overdue threshold
    ///
    /// The classification depends on the current time, so only the
    /// underlying list fetches are cached, never the classification.
    pub async fn delayed_shipments(
        &mut self,
        slug: Option<&str>,
    ) -> Result<Vec<DelayedShipment>, TrackerError> {
        let batch = self.active_shipments().await?;
        let batch: Vec<Tracking> = match slug {
            Some(slug) => batch
                .into_iter()
                .filter(|tracking| {
                    tracking
                        .slug
                        .as_deref()
                        .is_some_and(|s| s.eq_ignore_ascii_case(slug))
                })
                .collect(),
            None => batch,
        };

        Ok(delays::delayed_shipments(&batch, Utc::now()))
    }

    /// Shipments delivered within the inclusive `[start, end]` date window
    ///
    /// Fetches the delivered list and filters client-side on the actual
    /// delivery date; records without a parseable delivery date are
    /// excluded.
    pub async fn delivered_shipments(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Tracking>, TrackerError> {
        if end < start {
            return Err(TrackerError::InvalidDateWindow(format!(
                "window ends {} before it starts {}",
                end, start
            )));
        }

        let key = cache_key(
            "trackings:delivered",
            &[
                ("end", Some(end.to_string())),
                ("start", Some(start.to_string())),
            ],
        );
        if let Some(hit) = self.cache_get::<Vec<Tracking>>(&key) {
            return Ok(hit);
        }

        let filters = ListFilters {
            tag: Some(Tag::Delivered),
            ..Default::default()
        };
        let list = self.api.list_trackings(&filters).await?;
        let delivered: Vec<Tracking> = list
            .trackings
            .into_iter()
            .filter(|tracking| delivered_within(tracking, start, end))
            .collect();

        self.cache_put(&key, &delivered, TTL_DELIVERED_MINUTES);
        Ok(delivered)
    }

    /// Resolves a bare tracking number to a carrier
    ///
    /// Detection failures fall through to the probe sequence rather than
    /// surfacing, so this never errors for an unrecognized number.
    pub async fn resolve_carrier(&mut self, number: &str) -> Result<CarrierResolution, TrackerError> {
        let detected = match self.detect_courier(number).await {
            Ok(couriers) => Some(couriers),
            Err(err) => {
                tracing::debug!(%err, "courier detection failed, probing fallbacks");
                None
            }
        };

        Ok(resolve::resolve_with_fallback(&self.api, number, detected).await)
    }

    /// Reads a typed value from the cache, discarding undecodable entries
    fn cache_get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let cache = self.cache.as_mut()?;
        let value = cache.get(key)?;
        match serde_json::from_value(value) {
            Ok(data) => {
                tracing::debug!(key, "cache hit");
                Some(data)
            }
            Err(err) => {
                tracing::debug!(key, %err, "discarding undecodable cache entry");
                cache.invalidate(key);
                None
            }
        }
    }

    /// Stores a typed value in the cache; failures are not fatal
    fn cache_put<T: Serialize>(&mut self, key: &str, value: &T, ttl_minutes: i64) {
        let Some(cache) = self.cache.as_mut() else {
            return;
        };
        if let Ok(json) = serde_json::to_value(value) {
            let _ = cache.put(key, json, Duration::minutes(ttl_minutes));
        }
    }

    /// Drops every cache entry matching one of the given patterns
    fn invalidate_stale(&mut self, patterns: &[String]) {
        let Some(cache) = self.cache.as_mut() else {
            return;
        };
        let mut removed = 0;
        for pattern in patterns {
            removed += cache.invalidate(pattern);
        }
        tracing::debug!(removed, "invalidated cached reads after write");
    }
}

/// Builds a deterministic cache key from an operation tag and parameters
///
/// Unset parameters are omitted and the rest sorted by name, so two calls
/// with the same effective parameters always produce the same key.
fn cache_key(op: &str, params: &[(&str, Option<String>)]) -> String {
    let mut set: Vec<(&str, &String)> = params
        .iter()
        .filter_map(|(name, value)| value.as_ref().map(|value| (*name, value)))
        .collect();
    set.sort_by_key(|(name, _)| *name);

    if set.is_empty() {
        return op.to_string();
    }
    let joined = set
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("|");
    format!("{}:{}", op, joined)
}

/// Cache key for a single tracking's detail read
fn detail_key(id: &TrackingId) -> String {
    match id {
        TrackingId::Id(id) => cache_key("tracking:detail", &[("id", Some(id.clone()))]),
        TrackingId::SlugNumber { slug, number } => cache_key(
            "tracking:detail",
            &[
                ("number", Some(number.clone())),
                ("slug", Some(slug.clone())),
            ],
        ),
    }
}

/// Cache key for a filtered list read
fn list_key(filters: &ListFilters) -> String {
    cache_key(
        "trackings:list",
        &[
            ("created_at_max", filters.created_at_max.clone()),
            ("created_at_min", filters.created_at_min.clone()),
            ("keyword", filters.keyword.clone()),
            ("limit", filters.limit.map(|v| v.to_string())),
            ("page", filters.page.map(|v| v.to_string())),
            ("slug", filters.slug.clone()),
            ("tag", filters.tag.map(|t| t.as_str().to_string())),
        ],
    )
}

/// Patterns a mutation of the given tracking makes stale: its exact
/// detail key plus every list-style entry
fn stale_patterns(id: &TrackingId) -> Vec<String> {
    vec![detail_key(id), LIST_PREFIX.to_string()]
}

/// Whether a tracking's delivery date falls inside the inclusive window
fn delivered_within(tracking: &Tracking, start: NaiveDate, end: NaiveDate) -> bool {
    tracking
        .shipment_delivery_date
        .as_deref()
        .and_then(delays::parse_flexible_date)
        .is_some_and(|date| start <= date && date <= end)
}
