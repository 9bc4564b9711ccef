//! Integration tests for the tracking client against a mock API
//!
//! Exercises the cache-aside read path, write invalidation, the
//! monitoring filters, and carrier resolution with a local mock server,
//! asserting on remote hit counts to prove what was (not) refetched.

use chrono::{Duration, Utc};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use shiptrack::api::{ApiClient, ListFilters, NewTracking, TrackingId, TrackingUpdate};
use shiptrack::cache::CacheStore;
use shiptrack::resolve::Provenance;
use shiptrack::tracker::TrackerClient;

fn temp_store() -> (CacheStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let store = CacheStore::with_dir(dir.path().to_path_buf(), "tracking");
    (store, dir)
}

fn tracker(server: &MockServer, cache: Option<CacheStore>) -> TrackerClient {
    let api = ApiClient::new("test-key").with_base_url(server.base_url());
    TrackerClient::new(api, cache)
}

fn tracking_json(id: &str, number: &str, slug: &str, tag: &str) -> Value {
    json!({
        "id": id,
        "tracking_number": number,
        "slug": slug,
        "tag": tag,
    })
}

fn detail_envelope(tracking: Value) -> Value {
    json!({ "meta": { "code": 200 }, "data": { "tracking": tracking } })
}

fn list_envelope(trackings: Vec<Value>) -> Value {
    json!({
        "meta": { "code": 200 },
        "data": {
            "page": 1,
            "limit": 100,
            "count": trackings.len(),
            "trackings": trackings,
        }
    })
}

fn ups_id() -> TrackingId {
    TrackingId::SlugNumber {
        slug: "ups".to_string(),
        number: "1Z999".to_string(),
    }
}

#[tokio::test]
async fn test_second_read_within_ttl_does_not_hit_remote() {
    let server = MockServer::start();
    let detail = server.mock(|when, then| {
        when.method(GET)
            .path("/trackings/ups/1Z999")
            .header("aftership-api-key", "test-key");
        then.status(200)
            .json_body(detail_envelope(tracking_json("t1", "1Z999", "ups", "InTransit")));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));

    let first = client.get_tracking(&ups_id()).await.expect("First read");
    let second = client.get_tracking(&ups_id()).await.expect("Second read");

    assert_eq!(first.id, second.id);
    detail.assert_hits(1);
}

#[tokio::test]
async fn test_no_cache_reads_hit_remote_every_time() {
    let server = MockServer::start();
    let detail = server.mock(|when, then| {
        when.method(GET).path("/trackings/ups/1Z999");
        then.status(200)
            .json_body(detail_envelope(tracking_json("t1", "1Z999", "ups", "InTransit")));
    });

    let mut client = tracker(&server, None);
    client.get_tracking(&ups_id()).await.expect("First read");
    client.get_tracking(&ups_id()).await.expect("Second read");

    detail.assert_hits(2);
}

#[tokio::test]
async fn test_update_invalidates_detail_and_list_reads() {
    let server = MockServer::start();
    let detail = server.mock(|when, then| {
        when.method(GET).path("/trackings/ups/1Z999");
        then.status(200)
            .json_body(detail_envelope(tracking_json("t1", "1Z999", "ups", "InTransit")));
    });
    let list = server.mock(|when, then| {
        when.method(GET).path("/trackings");
        then.status(200)
            .json_body(list_envelope(vec![tracking_json("t1", "1Z999", "ups", "InTransit")]));
    });
    let update = server.mock(|when, then| {
        when.method(PUT).path("/trackings/ups/1Z999");
        then.status(200)
            .json_body(detail_envelope(tracking_json("t1", "1Z999", "ups", "InTransit")));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));
    let id = ups_id();

    // Warm both caches, then prove they are warm
    client.get_tracking(&id).await.expect("Detail read");
    client
        .list_trackings(&ListFilters::default())
        .await
        .expect("List read");
    client.get_tracking(&id).await.expect("Cached detail read");
    client
        .list_trackings(&ListFilters::default())
        .await
        .expect("Cached list read");
    detail.assert_hits(1);
    list.assert_hits(1);

    // The write invalidates both, so the next reads go remote
    client
        .update_tracking(&id, &TrackingUpdate::default())
        .await
        .expect("Update");
    update.assert_hits(1);

    client.get_tracking(&id).await.expect("Fresh detail read");
    client
        .list_trackings(&ListFilters::default())
        .await
        .expect("Fresh list read");
    detail.assert_hits(2);
    list.assert_hits(2);
}

#[tokio::test]
async fn test_create_invalidates_list_reads() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/trackings");
        then.status(200).json_body(list_envelope(vec![]));
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/trackings");
        then.status(201)
            .json_body(detail_envelope(tracking_json("t9", "1Z111", "ups", "Pending")));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));

    client
        .list_trackings(&ListFilters::default())
        .await
        .expect("List read");
    list.assert_hits(1);

    let new = NewTracking {
        tracking_number: "1Z111".to_string(),
        slug: Some("ups".to_string()),
        ..Default::default()
    };
    client.create_tracking(&new).await.expect("Create");
    create.assert_hits(1);

    client
        .list_trackings(&ListFilters::default())
        .await
        .expect("Fresh list read");
    list.assert_hits(2);
}

#[tokio::test]
async fn test_mark_completed_sends_reason_and_invalidates() {
    let server = MockServer::start();
    let detail = server.mock(|when, then| {
        when.method(GET).path("/trackings/ups/1Z999");
        then.status(200)
            .json_body(detail_envelope(tracking_json("t1", "1Z999", "ups", "InTransit")));
    });
    let complete = server.mock(|when, then| {
        when.method(POST)
            .path("/trackings/ups/1Z999/mark-as-completed")
            .json_body(json!({ "reason": "DELIVERED" }));
        then.status(200)
            .json_body(detail_envelope(tracking_json("t1", "1Z999", "ups", "Delivered")));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));
    let id = ups_id();

    client.get_tracking(&id).await.expect("Detail read");
    client
        .mark_completed(&id, "DELIVERED")
        .await
        .expect("Mark completed");
    complete.assert();

    client.get_tracking(&id).await.expect("Fresh detail read");
    detail.assert_hits(2);
}

#[tokio::test]
async fn test_courier_detection_is_cached() {
    let server = MockServer::start();
    let detect = server.mock(|when, then| {
        when.method(POST).path("/couriers/detect");
        then.status(200).json_body(json!({
            "meta": { "code": 200 },
            "data": { "total": 1, "couriers": [{ "slug": "ups", "name": "UPS" }] }
        }));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));

    let first = client.detect_courier("1Z999").await.expect("First detect");
    let second = client.detect_courier("1Z999").await.expect("Second detect");

    assert_eq!(first.len(), 1);
    assert_eq!(second[0].slug, "ups");
    detect.assert_hits(1);
}

#[tokio::test]
async fn test_active_shipments_dedup_across_tag_queries() {
    let server = MockServer::start();
    // Every per-tag query matches here, so the same two records come back
    // for each status tag and must be collapsed by id.
    let list = server.mock(|when, then| {
        when.method(GET).path("/trackings");
        then.status(200).json_body(list_envelope(vec![
            tracking_json("t1", "1Z999", "ups", "InTransit"),
            tracking_json("t2", "RM200", "royal-mail", "Pending"),
        ]));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));

    let active = client.active_shipments().await.expect("Active query");
    assert_eq!(active.len(), 2, "Duplicates across tag queries should collapse");
    assert!(list.hits() > 1, "Each status tag should be queried separately");
}

#[tokio::test]
async fn test_delayed_shipments_apply_carrier_thresholds() {
    let server = MockServer::start();
    let two_days_ago = (Utc::now() - Duration::days(2)).to_rfc3339();
    let one_day_ago = (Utc::now() - Duration::days(1)).to_rfc3339();

    let mut overdue_ups = tracking_json("t1", "1Z999", "ups", "InTransit");
    overdue_ups["latest_estimated_delivery"] = json!(two_days_ago);
    let mut barely_late_dhl = tracking_json("t2", "DH200", "dhl", "InTransit");
    barely_late_dhl["latest_estimated_delivery"] = json!(one_day_ago);
    let mut delivered = tracking_json("t3", "1Z000", "ups", "Delivered");
    delivered["latest_estimated_delivery"] = json!(two_days_ago);

    server.mock(|when, then| {
        when.method(GET).path("/trackings");
        then.status(200)
            .json_body(list_envelope(vec![overdue_ups, barely_late_dhl, delivered]));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));

    let delayed = client.delayed_shipments(None).await.expect("Delayed query");
    assert_eq!(delayed.len(), 1);
    assert_eq!(delayed[0].tracking.id, "t1");
    assert_eq!(delayed[0].threshold_days, 1);
    assert!(delayed[0].days_overdue >= 2);

    // Scoped to a carrier with no delayed shipments
    let none = client
        .delayed_shipments(Some("DHL"))
        .await
        .expect("Scoped delayed query");
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_delivered_window_filters_and_caches() {
    let server = MockServer::start();
    let mut inside = tracking_json("t1", "1Z999", "ups", "Delivered");
    inside["shipment_delivery_date"] = json!("2024-07-10T09:00:00");
    let mut outside = tracking_json("t2", "RM200", "royal-mail", "Delivered");
    outside["shipment_delivery_date"] = json!("2024-08-02T12:00:00");
    let undated = tracking_json("t3", "DH300", "dhl", "Delivered");

    let list = server.mock(|when, then| {
        when.method(GET)
            .path("/trackings")
            .query_param("tag", "Delivered");
        then.status(200)
            .json_body(list_envelope(vec![inside, outside, undated]));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));
    let start = chrono::NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let end = chrono::NaiveDate::from_ymd_opt(2024, 7, 31).unwrap();

    let delivered = client
        .delivered_shipments(start, end)
        .await
        .expect("Window query");
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, "t1");

    // Second identical window is served from cache
    client
        .delivered_shipments(start, end)
        .await
        .expect("Cached window query");
    list.assert_hits(1);

    // An inverted window is a local error, no remote call
    let inverted = client.delivered_shipments(end, start).await;
    assert!(inverted.is_err());
    list.assert_hits(1);
}

#[tokio::test]
async fn test_resolution_prefers_auto_detection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/couriers/detect");
        then.status(200).json_body(json!({
            "meta": { "code": 200 },
            "data": { "total": 1, "couriers": [{ "slug": "ups", "name": "UPS" }] }
        }));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));

    let resolution = client.resolve_carrier("1Z999").await.expect("Resolution");
    assert_eq!(resolution.provenance, Provenance::AutoDetect);
    assert_eq!(resolution.slug.as_deref(), Some("ups"));
}

#[tokio::test]
async fn test_resolution_falls_back_to_sequential_probes() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/couriers/detect");
        then.status(200).json_body(json!({
            "meta": { "code": 200 },
            "data": { "total": 0, "couriers": [] }
        }));
    });
    let ups_probe = server.mock(|when, then| {
        when.method(GET).path("/trackings/ups/RX123");
        then.status(404)
            .json_body(json!({ "meta": { "code": 4004, "message": "Tracking does not exist." } }));
    });
    let usps_probe = server.mock(|when, then| {
        when.method(GET).path("/trackings/usps/RX123");
        then.status(200)
            .json_body(detail_envelope(tracking_json("t5", "RX123", "usps", "InTransit")));
    });
    let fedex_probe = server.mock(|when, then| {
        when.method(GET).path("/trackings/fedex/RX123");
        then.status(200)
            .json_body(detail_envelope(tracking_json("t5", "RX123", "fedex", "InTransit")));
    });

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));

    let resolution = client.resolve_carrier("RX123").await.expect("Resolution");
    assert_eq!(resolution.provenance, Provenance::Fallback);
    assert_eq!(resolution.slug.as_deref(), Some("usps"));

    ups_probe.assert_hits(1);
    usps_probe.assert_hits(1);
    fedex_probe.assert_hits(0);
}

#[tokio::test]
async fn test_resolution_reports_not_found_instead_of_erroring() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/couriers/detect");
        then.status(200).json_body(json!({
            "meta": { "code": 200 },
            "data": { "total": 0, "couriers": [] }
        }));
    });
    // No probe mocks: every lookup gets the mock server's 404

    let (store, _dir) = temp_store();
    let mut client = tracker(&server, Some(store));

    let resolution = client
        .resolve_carrier("UNKNOWN999")
        .await
        .expect("Resolution must not error");
    assert_eq!(resolution.provenance, Provenance::NotFound);
    assert!(resolution.slug.is_none());
}

#[tokio::test]
async fn test_cache_state_spans_client_instances() {
    let server = MockServer::start();
    let detail = server.mock(|when, then| {
        when.method(GET).path("/trackings/ups/1Z999");
        then.status(200)
            .json_body(detail_envelope(tracking_json("t1", "1Z999", "ups", "InTransit")));
    });

    let dir = TempDir::new().expect("Failed to create temp directory");

    {
        let store = CacheStore::with_dir(dir.path().to_path_buf(), "tracking");
        let mut client = tracker(&server, Some(store));
        client.get_tracking(&ups_id()).await.expect("First read");
    }

    // A new client over the same cache directory sees the warm entry
    let store = CacheStore::with_dir(dir.path().to_path_buf(), "tracking");
    let mut client = tracker(&server, Some(store));
    client.get_tracking(&ups_id()).await.expect("Second read");

    detail.assert_hits(1);
}
