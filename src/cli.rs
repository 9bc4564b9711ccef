//! Command-line interface for shiptrack
//!
//! One subcommand per tracking, courier, monitoring, or cache operation.
//! Tags, dates, completion reasons, and custom-fields JSON are validated
//! locally by the argument parser, so bad input is rejected with a
//! descriptive message before any remote call.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;

use crate::api::{Tag, TrackingId};

/// Completion reasons the provider accepts for `mark-completed`
const COMPLETION_REASONS: &[&str] = &["DELIVERED", "LOST", "RETURNED_TO_SENDER"];

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The tag string is not a known status tag
    #[error("invalid tag '{0}'. Valid tags: Pending, InfoReceived, InTransit, OutForDelivery, AttemptFail, AvailableForPickup, Delivered, Exception, Expired")]
    InvalidTag(String),

    /// The date string is not in YYYY-MM-DD form
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    /// The custom-fields argument is not a JSON object
    #[error("custom fields must be a JSON object: {0}")]
    InvalidCustomFields(String),

    /// The completion reason is not one the provider accepts
    #[error("invalid completion reason '{0}'. Valid reasons: DELIVERED, LOST, RETURNED_TO_SENDER")]
    InvalidReason(String),

    /// Neither --id nor --slug/--number was given
    #[error("specify either --id or both --slug and --number")]
    MissingTarget,
}

/// Shiptrack - AfterShip shipment tracking from the command line
#[derive(Parser, Debug)]
#[command(name = "shiptrack")]
#[command(about = "Track shipments, monitor delays, and manage the response cache")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON config file carrying the API credential
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bypass the response cache for this invocation
    #[arg(long = "no-cache", global = true)]
    pub no_cache: bool,

    /// Directory holding cached responses (defaults to the platform cache dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Addresses one tracking: by API id, or by carrier slug plus number
#[derive(Args, Debug)]
pub struct Target {
    /// Tracking id assigned by the API
    #[arg(long, conflicts_with_all = ["slug", "number"])]
    pub id: Option<String>,

    /// Carrier slug, paired with --number
    #[arg(long, requires = "number")]
    pub slug: Option<String>,

    /// Tracking number, paired with --slug
    #[arg(long, requires = "slug")]
    pub number: Option<String>,
}

impl Target {
    /// Resolves the flags into a tracking address
    pub fn to_tracking_id(&self) -> Result<TrackingId, CliError> {
        if let Some(id) = &self.id {
            return Ok(TrackingId::Id(id.clone()));
        }
        match (&self.slug, &self.number) {
            (Some(slug), Some(number)) => Ok(TrackingId::SlugNumber {
                slug: slug.clone(),
                number: number.clone(),
            }),
            _ => Err(CliError::MissingTarget),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a new shipment for tracking
    CreateTracking {
        /// The carrier's tracking number
        #[arg(long)]
        number: String,
        /// Carrier slug; omit to let the provider detect it
        #[arg(long)]
        slug: Option<String>,
        /// Customer-facing title
        #[arg(long)]
        title: Option<String>,
        /// Order identifier to attach
        #[arg(long)]
        order_id: Option<String>,
        /// Free-form fields as a JSON object, e.g. '{"store":"eu"}'
        #[arg(long, value_name = "JSON", value_parser = parse_custom_fields_arg)]
        custom_fields: Option<Value>,
    },

    /// Fetch one tracking
    GetTracking {
        #[command(flatten)]
        target: Target,
    },

    /// List trackings with optional filters
    ListTrackings {
        /// Only this carrier slug
        #[arg(long)]
        slug: Option<String>,
        /// Only this status tag
        #[arg(long, value_parser = parse_tag_arg)]
        tag: Option<Tag>,
        /// Search tracking numbers and titles
        #[arg(long)]
        keyword: Option<String>,
        /// Page number, starting at 1
        #[arg(long)]
        page: Option<u32>,
        /// Results per page
        #[arg(long)]
        limit: Option<u32>,
        /// Only trackings created on or after this date
        #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
        created_after: Option<NaiveDate>,
        /// Only trackings created on or before this date
        #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
        created_before: Option<NaiveDate>,
    },

    /// Update a tracking's title, order id, or custom fields
    UpdateTracking {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        order_id: Option<String>,
        /// Replacement custom fields as a JSON object
        #[arg(long, value_name = "JSON", value_parser = parse_custom_fields_arg)]
        custom_fields: Option<Value>,
    },

    /// Stop tracking a shipment and remove it
    DeleteTracking {
        #[command(flatten)]
        target: Target,
    },

    /// Re-activate an expired tracking
    Retrack {
        #[command(flatten)]
        target: Target,
    },

    /// Close a tracking with a completion reason
    MarkCompleted {
        #[command(flatten)]
        target: Target,
        /// One of DELIVERED, LOST, RETURNED_TO_SENDER
        #[arg(long, value_parser = parse_reason_arg)]
        reason: String,
    },

    /// Ask the provider which couriers could own a tracking number
    DetectCourier {
        #[arg(long)]
        number: String,
    },

    /// List couriers activated on the account
    ListCouriers,

    /// List every courier the provider supports
    ListAllCouriers,

    /// Active shipments past their carrier's overdue threshold
    DelayedShipments {
        /// Only consider this carrier slug
        #[arg(long)]
        slug: Option<String>,
    },

    /// Every shipment still moving, across all active status tags
    ActiveShipments,

    /// Shipments delivered within a date window
    DeliveredShipments {
        /// Window start, inclusive
        #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
        start: NaiveDate,
        /// Window end, inclusive
        #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
        end: NaiveDate,
    },

    /// Resolve a bare tracking number to a carrier
    ResolveCarrier {
        #[arg(long)]
        number: String,
    },

    /// Report cache entry and hit/miss statistics
    CacheStats,

    /// Drop every cached entry
    CacheClear,

    /// Drop cached entries whose key starts with a pattern
    CacheInvalidate {
        /// Key prefix, e.g. 'trackings:' or 'couriers:detect'
        #[arg(long)]
        pattern: String,
    },
}

/// Parses a status tag argument
pub fn parse_tag_arg(s: &str) -> Result<Tag, CliError> {
    Tag::from_str(s).ok_or_else(|| CliError::InvalidTag(s.to_string()))
}

/// Parses a YYYY-MM-DD date argument
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CliError::InvalidDate(s.to_string()))
}

/// Parses and validates a custom-fields argument as a JSON object
pub fn parse_custom_fields_arg(s: &str) -> Result<Value, CliError> {
    let value: Value =
        serde_json::from_str(s).map_err(|e| CliError::InvalidCustomFields(e.to_string()))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(CliError::InvalidCustomFields(
            "expected a JSON object".to_string(),
        ))
    }
}

/// Normalizes and validates a completion reason argument
pub fn parse_reason_arg(s: &str) -> Result<String, CliError> {
    let normalized = s.to_uppercase().replace('-', "_");
    if COMPLETION_REASONS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(CliError::InvalidReason(s.to_string()))
    }
}
