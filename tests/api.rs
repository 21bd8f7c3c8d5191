//! Alpaca API integration tests against a running daemon

mod common;

use common::{get, loopback, put, raw, start};
use tokio_test::assert_ok;

const INVALID_VALUE: i64 = 0x401;
const DEVICE_BUSY: i64 = 0x503;

#[tokio::test]
async fn client_transaction_id_is_echoed() {
    let running = start().await;
    let addr = loopback(running.addr);

    let body = get(addr, "/api/v1/dome/0/canfindhome", "ClientTransactionID=5").await;
    assert_eq!(body["Value"], true);
    assert_eq!(body["ClientTransactionID"], 5);
    assert_eq!(body["ErrorNumber"], 0);
    assert_eq!(body["ErrorMessage"], "");

    assert_ok!(running.shutdown().await);
}

#[tokio::test]
async fn server_transaction_ids_increase() {
    let running = start().await;
    let addr = loopback(running.addr);

    let mut last = 0;
    for _ in 0..4 {
        let body = get(addr, "/api/v1/telescope/0/tracking", "").await;
        let id = body["ServerTransactionID"].as_u64().unwrap();
        assert!(id > last, "{id} not above {last}");
        last = id;
    }

    assert_ok!(running.shutdown().await);
}

#[tokio::test]
async fn out_of_range_azimuth_is_rejected() {
    let running = start().await;
    let addr = loopback(running.addr);

    let body = put(addr, "/api/v1/dome/0/slewtoazimuth", "Azimuth=370&ClientTransactionID=2").await;
    assert_eq!(body["ErrorNumber"], INVALID_VALUE);
    assert_eq!(body["ClientTransactionID"], 2);
    assert!(!body["ErrorMessage"].as_str().unwrap().is_empty());

    assert_ok!(running.shutdown().await);
}

#[tokio::test]
async fn out_of_range_latitude_leaves_site_unchanged() {
    let running = start().await;
    let addr = loopback(running.addr);

    let body = put(addr, "/api/v1/telescope/0/sitelatitude", "SiteLatitude=95").await;
    assert_eq!(body["ErrorNumber"], INVALID_VALUE);

    let body = get(addr, "/api/v1/telescope/0/sitelatitude", "").await;
    assert_eq!(body["ErrorNumber"], 0);
    assert!(body["Value"].as_f64().unwrap().abs() < 1e-9);

    assert_ok!(running.shutdown().await);
}

#[tokio::test]
async fn second_exposure_while_busy_is_refused() {
    let running = start().await;
    let addr = loopback(running.addr);

    let body = put(addr, "/api/v1/camera/0/startexposure", "Duration=5&Light=true").await;
    assert_eq!(body["ErrorNumber"], 0);

    let body = put(addr, "/api/v1/camera/0/startexposure", "Duration=5&Light=true").await;
    assert_eq!(body["ErrorNumber"], DEVICE_BUSY);

    let body = put(addr, "/api/v1/camera/0/abortexposure", "").await;
    assert_eq!(body["ErrorNumber"], 0);

    assert_ok!(running.shutdown().await);
}

#[tokio::test]
async fn unknown_device_reports_an_error() {
    let running = start().await;
    let addr = loopback(running.addr);

    let body = get(addr, "/api/v1/camera/7/connected", "ClientTransactionID=3").await;
    assert_ne!(body["ErrorNumber"], 0);
    assert_eq!(body["ClientTransactionID"], 3);

    assert_ok!(running.shutdown().await);
}

#[tokio::test]
async fn configured_devices_are_numbered_per_kind() {
    let running = start().await;
    let addr = loopback(running.addr);

    let body = get(addr, "/management/v1/configureddevices", "").await;
    let devices = body["Value"].as_array().unwrap();
    assert_eq!(devices.len(), 4);
    let mut kinds: Vec<&str> = devices
        .iter()
        .map(|d| d["DeviceType"].as_str().unwrap())
        .collect();
    kinds.sort_unstable();
    assert_eq!(kinds, ["Camera", "Dome", "Shutter", "Telescope"]);
    assert!(devices.iter().all(|d| d["DeviceNumber"] == 0));

    let body = get(addr, "/management/apiversions", "").await;
    assert_eq!(body["Value"], serde_json::json!([1]));

    assert_ok!(running.shutdown().await);
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let running = start().await;
    let addr = loopback(running.addr);

    let response = raw(addr, "garbage\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.0 400"), "{response}");

    let response = raw(addr, "DELETE /api/v1/dome/0/park HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.0 400"), "{response}");

    assert_ok!(running.shutdown().await);
}
