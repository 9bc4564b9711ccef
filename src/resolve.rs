//! Best-effort carrier resolution for bare tracking numbers
//!
//! Provider-side detection is tried first; when it comes up empty or
//! fails, a short fixed list of well-known carriers is probed one by one
//! with a scoped tracking lookup. Resolution never raises; an
//! unrecognized number yields a not-found result.

use serde::Serialize;

use crate::api::{ApiClient, Courier, TrackingId};

/// Carriers probed, in order, when provider-side detection comes up empty
const FALLBACK_SLUGS: &[&str] = &["ups", "usps", "fedex", "dhl", "royal-mail"];

/// Where a resolution result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// The provider's detection endpoint named the carrier
    AutoDetect,
    /// A fallback probe found the tracking under a candidate slug
    Fallback,
    /// Detection and every probe failed
    NotFound,
}

/// Outcome of resolving a tracking number to a carrier
#[derive(Debug, Clone, Serialize)]
pub struct CarrierResolution {
    pub tracking_number: String,
    pub provenance: Provenance,
    /// The resolved carrier slug, absent for not-found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Full courier descriptor, only available from auto-detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier: Option<Courier>,
}

/// Resolves a tracking number given the detection outcome
///
/// `detected` carries the provider's detection result, or `None` when the
/// detection call itself failed. The first detected courier wins; otherwise
/// each fallback slug is probed sequentially with a scoped lookup, stopping
/// at the first probe that finds the tracking. Probe errors of any kind
/// advance to the next candidate.
pub async fn resolve_with_fallback(
    api: &ApiClient,
    tracking_number: &str,
    detected: Option<Vec<Courier>>,
) -> CarrierResolution {
    if let Some(couriers) = detected {
        if let Some(courier) = couriers.into_iter().next() {
            return CarrierResolution {
                tracking_number: tracking_number.to_string(),
                provenance: Provenance::AutoDetect,
                slug: Some(courier.slug.clone()),
                courier: Some(courier),
            };
        }
        tracing::debug!(tracking_number, "detection returned no couriers, probing fallbacks");
    }

    for &slug in FALLBACK_SLUGS {
        let id = TrackingId::SlugNumber {
            slug: slug.to_string(),
            number: tracking_number.to_string(),
        };
        match api.get_tracking(&id).await {
            Ok(_) => {
                tracing::debug!(tracking_number, slug, "fallback probe matched");
                return CarrierResolution {
                    tracking_number: tracking_number.to_string(),
                    provenance: Provenance::Fallback,
                    slug: Some(slug.to_string()),
                    courier: None,
                };
            }
            Err(err) => {
                tracing::debug!(tracking_number, slug, %err, "fallback probe missed");
            }
        }
    }

    CarrierResolution {
        tracking_number: tracking_number.to_string(),
        provenance: Provenance::NotFound,
        slug: None,
        courier: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn courier(slug: &str, name: &str) -> Courier {
        Courier {
            slug: slug.to_string(),
            name: name.to_string(),
            other_name: None,
            phone: None,
            web_url: None,
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
        }
    }

    // Detection hits short-circuit before any probe, so a client pointed
    // at an unroutable address is safe here.
    fn offline_api() -> ApiClient {
        ApiClient::new("test-key").with_base_url("http://127.0.0.1:1")
    }

    #[tokio::test]
    async fn test_detection_hit_wins_without_probing() {
        let detected = vec![courier("ups", "UPS"), courier("fedex", "FedEx")];
        let resolution = resolve_with_fallback(&offline_api(), "1Z999", Some(detected)).await;

        assert_eq!(resolution.provenance, Provenance::AutoDetect);
        assert_eq!(resolution.slug.as_deref(), Some("ups"));
        assert_eq!(resolution.courier.as_ref().map(|c| c.name.as_str()), Some("UPS"));
    }

    #[tokio::test]
    async fn test_unreachable_probes_resolve_to_not_found() {
        // Empty detection plus probes that cannot connect: every candidate
        // errors out and resolution degrades to not-found instead of raising.
        let resolution = resolve_with_fallback(&offline_api(), "XYZ", Some(Vec::new())).await;

        assert_eq!(resolution.provenance, Provenance::NotFound);
        assert!(resolution.slug.is_none());
        assert!(resolution.courier.is_none());
    }

    #[test]
    fn test_not_found_serializes_without_slug() {
        let resolution = CarrierResolution {
            tracking_number: "XYZ".to_string(),
            provenance: Provenance::NotFound,
            slug: None,
            courier: None,
        };

        let json = serde_json::to_value(&resolution).expect("Failed to serialize");
        assert_eq!(json["provenance"], "not-found");
        assert!(json.get("slug").is_none());
    }

    #[test]
    fn test_provenance_wire_names() {
        assert_eq!(
            serde_json::to_value(Provenance::AutoDetect).unwrap(),
            "auto-detect"
        );
        assert_eq!(serde_json::to_value(Provenance::Fallback).unwrap(), "fallback");
    }
}
