//! Data models for the AfterShip tracking API
//!
//! This module contains the types exchanged with the remote service:
//! trackings, checkpoints, couriers, status tags, and the request/filter
//! types the client sends. They are pass-through representations of the
//! remote objects; nothing here is persisted beyond the response cache.

pub mod client;

pub use client::{ApiClient, ApiError};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shipment status tags used by the tracking API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Pending,
    InfoReceived,
    InTransit,
    OutForDelivery,
    AttemptFail,
    AvailableForPickup,
    Delivered,
    Exception,
    Expired,
}

impl Tag {
    /// The wire name of the tag, as the API sends and accepts it
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Pending => "Pending",
            Tag::InfoReceived => "InfoReceived",
            Tag::InTransit => "InTransit",
            Tag::OutForDelivery => "OutForDelivery",
            Tag::AttemptFail => "AttemptFail",
            Tag::AvailableForPickup => "AvailableForPickup",
            Tag::Delivered => "Delivered",
            Tag::Exception => "Exception",
            Tag::Expired => "Expired",
        }
    }

    /// Parses a tag from user input, accepting wire names ("InTransit")
    /// as well as kebab/snake/lowercase spellings ("in-transit").
    pub fn from_str(s: &str) -> Option<Tag> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match folded.as_str() {
            "pending" => Some(Tag::Pending),
            "inforeceived" => Some(Tag::InfoReceived),
            "intransit" => Some(Tag::InTransit),
            "outfordelivery" => Some(Tag::OutForDelivery),
            "attemptfail" => Some(Tag::AttemptFail),
            "availableforpickup" => Some(Tag::AvailableForPickup),
            "delivered" => Some(Tag::Delivered),
            "exception" => Some(Tag::Exception),
            "expired" => Some(Tag::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shipment tracking record as returned by the remote API
///
/// Date fields are kept as the strings the API sends (RFC 3339 timestamps
/// or bare dates); interpretation happens where it is needed, e.g. in the
/// delay classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracking {
    /// Identifier assigned by the API
    pub id: String,
    /// The carrier's tracking number
    pub tracking_number: String,
    /// Carrier slug, if known
    #[serde(default)]
    pub slug: Option<String>,
    /// Current status tag
    #[serde(default)]
    pub tag: Option<Tag>,
    /// Finer-grained status, e.g. "InTransit_003"
    #[serde(default)]
    pub subtag: Option<String>,
    /// Customer-facing title, defaults to the tracking number remotely
    #[serde(default)]
    pub title: Option<String>,
    /// Order identifier supplied at creation
    #[serde(default)]
    pub order_id: Option<String>,
    /// Latest estimate produced by the carrier
    #[serde(default)]
    pub latest_estimated_delivery: Option<String>,
    /// Delivery date promised by the courier
    #[serde(default)]
    pub courier_estimated_delivery_date: Option<String>,
    /// Delivery date promised when the order was placed
    #[serde(default)]
    pub order_promised_delivery_date: Option<String>,
    /// Actual delivery timestamp, once delivered
    #[serde(default)]
    pub shipment_delivery_date: Option<String>,
    /// Whether the remote service is still polling the carrier
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Free-form fields supplied at creation
    #[serde(default)]
    pub custom_fields: Option<Value>,
    /// Carrier scan events, newest last
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

/// A single carrier scan event on a tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub tag: Option<Tag>,
    #[serde(default)]
    pub subtag: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub checkpoint_time: Option<String>,
}

/// A carrier descriptor from the courier endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub other_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub optional_fields: Vec<String>,
}

/// A page of trackings from the list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingList {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    /// Total matches across all pages, as reported by the API
    #[serde(default)]
    pub count: Option<u64>,
    pub trackings: Vec<Tracking>,
}

/// Fields accepted when registering a new tracking
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTracking {
    pub tracking_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Value>,
}

/// Fields accepted when updating an existing tracking
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Value>,
}

/// Filters for the tracking list endpoint
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub slug: Option<String>,
    pub tag: Option<Tag>,
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub created_at_min: Option<String>,
    pub created_at_max: Option<String>,
}

impl ListFilters {
    /// Query parameters for the list endpoint, unset filters omitted
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(slug) = &self.slug {
            query.push(("slug", slug.clone()));
        }
        if let Some(tag) = &self.tag {
            query.push(("tag", tag.as_str().to_string()));
        }
        if let Some(keyword) = &self.keyword {
            query.push(("keyword", keyword.clone()));
        }
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(min) = &self.created_at_min {
            query.push(("created_at_min", min.clone()));
        }
        if let Some(max) = &self.created_at_max {
            query.push(("created_at_max", max.clone()));
        }
        query
    }
}

/// How a single tracking is addressed on the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingId {
    /// By the identifier the API assigned
    Id(String),
    /// By carrier slug plus tracking number
    SlugNumber { slug: String, number: String },
}

impl TrackingId {
    /// URL path segment for this tracking under `/trackings`
    pub fn path(&self) -> String {
        match self {
            TrackingId::Id(id) => format!("trackings/{}", id),
            TrackingId::SlugNumber { slug, number } => {
                format!("trackings/{}/{}", slug, number)
            }
        }
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingId::Id(id) => write!(f, "{}", id),
            TrackingId::SlugNumber { slug, number } => write!(f, "{}/{}", slug, number),
        }
    }
}
