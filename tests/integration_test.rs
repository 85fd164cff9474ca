//! Integration tests for the Lixee exporter.
//!
//! These verify the full flow from an inbound meter payload to the
//! exposition and raw-state endpoints, plus the concurrency guarantees
//! of the shared store.

use std::sync::Arc;
use std::thread;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use lixee_exporter_prometheus::config::DecodePolicy;
use lixee_exporter_prometheus::http::create_router;
use lixee_exporter_prometheus::{
    MetricCollector, SharedStore, StateStore, TelemetryListener, TelemetryRecord,
};

fn sample_payload() -> serde_json::Value {
    json!({
        "MOTDETAT": "000000",
        "active_register_tier_delivered": "HC..",
        "apparent_power": 540,
        "available_power": 6000,
        "current_summ_delivered": 12345678,
        "current_tarif": "HCHP",
        "linkquality": 87,
        "meter_serial_number": "021728123456",
        "mot_d_etat": "000000",
        "rms_current": 2,
        "rms_current_max": 30,
        "update": {"installed_version": 4, "latest_version": 5, "state": "available"},
        "update_available": false,
        "warn_d_p_s": 0
    })
}

fn make_store() -> SharedStore {
    Arc::new(StateStore::new())
}

#[test]
fn test_payload_to_exposition_flow() {
    let store = make_store();
    let collector = MetricCollector::new(store.clone(), "lixee");

    let record = TelemetryRecord::decode(sample_payload().to_string().as_bytes()).unwrap();
    store.replace(record);

    let output = collector.render();

    assert!(output.contains("lixee_apparent_power{meter_serial_number=\"021728123456\"} 540"));
    assert!(output.contains("lixee_link_quality{meter_serial_number=\"021728123456\"} 87"));
    assert!(output.contains("lixee_info{meter_serial_number=\"021728123456\",active_register_tier_delivered=\"HC..\",current_tarif=\"HCHP\",mot_d_etat=\"000000\"} 1"));
}

#[test]
fn test_scrape_before_any_message() {
    let store = make_store();
    let collector = MetricCollector::new(store, "lixee");

    let output = collector.render();

    // Nine samples, all zero-valued with empty string labels.
    let samples: Vec<&str> = output
        .lines()
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .collect();
    assert_eq!(samples.len(), 9);
    for sample in samples {
        assert!(sample.ends_with(" 0"), "expected zero sample: {}", sample);
        assert!(
            sample.contains("meter_serial_number=\"\""),
            "expected empty serial label: {}",
            sample
        );
    }
}

#[test]
fn test_single_writer_consistency() {
    let store = make_store();
    let collector = MetricCollector::new(store.clone(), "lixee");
    let listener = TelemetryListener::new(
        store,
        Default::default(),
        "zigbee2mqtt/LiXee",
        DecodePolicy::Fatal,
    );

    listener
        .handle_payload(br#"{"meter_serial_number": "A", "apparent_power": 100}"#)
        .unwrap();
    listener
        .handle_payload(br#"{"meter_serial_number": "A", "apparent_power": 150}"#)
        .unwrap();

    let output = collector.render();
    assert!(output.contains("lixee_apparent_power{meter_serial_number=\"A\"} 150"));
    assert!(!output.contains("lixee_apparent_power{meter_serial_number=\"A\"} 100"));
}

/// Concurrent replaces never let a snapshot observe fields from two
/// different records.
#[test]
fn test_atomic_replace_under_concurrency() {
    let store = make_store();
    let writer_store = store.clone();

    // Every written record correlates all numeric fields to one seed, so
    // a torn read would show up as mismatched fields.
    let writer = thread::spawn(move || {
        for i in 0..5_000_i64 {
            writer_store.replace(TelemetryRecord {
                meter_serial_number: format!("M{}", i),
                apparent_power: i,
                available_power: i,
                rms_current: i,
                warn_dps: i,
                ..Default::default()
            });
        }
    });

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let reader_store = store.clone();
            thread::spawn(move || {
                for _ in 0..5_000 {
                    let snapshot = reader_store.snapshot();
                    let i = snapshot.apparent_power;
                    assert_eq!(snapshot.available_power, i);
                    assert_eq!(snapshot.rms_current, i);
                    assert_eq!(snapshot.warn_dps, i);
                    if !snapshot.meter_serial_number.is_empty() {
                        assert_eq!(snapshot.meter_serial_number, format!("M{}", i));
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[tokio::test]
async fn test_raw_state_round_trip() {
    let store = make_store();
    let collector = Arc::new(MetricCollector::new(store.clone(), "lixee"));

    let payload = sample_payload();
    let record = TelemetryRecord::decode(payload.to_string().as_bytes()).unwrap();
    store.replace(record);

    let router = create_router(collector, store, "/metrics");
    let response = router
        .oneshot(Request::get("/api/v1/lixee").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // Every inbound field comes back with identical name and value.
    assert_eq!(value, payload);
}

#[tokio::test]
async fn test_metrics_endpoint_full_flow() {
    let store = make_store();
    let collector = Arc::new(MetricCollector::new(store.clone(), "lixee"));

    store.replace(TelemetryRecord::decode(sample_payload().to_string().as_bytes()).unwrap());

    let router = create_router(collector, store, "/metrics");
    let response = router
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();

    assert!(body.contains("# TYPE lixee_current_summ_delivered gauge"));
    assert!(
        body.contains("lixee_current_summ_delivered{meter_serial_number=\"021728123456\"} 12345678")
    );
    assert!(body.contains("lixee_meter_serial_number{meter_serial_number=\"021728123456\"} 1"));
}

#[tokio::test]
async fn test_healthy_endpoint_unconditional() {
    let store = make_store();
    let collector = Arc::new(MetricCollector::new(store.clone(), "lixee"));

    // No reading has arrived; liveness still reports healthy.
    let router = create_router(collector, store, "/metrics");
    let response = router
        .oneshot(Request::get("/-/healthy").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Healthy");
}
