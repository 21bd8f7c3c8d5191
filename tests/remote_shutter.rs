//! A shutterless dome driving the shutter of another server

mod common;

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use alpaca_server::Device;
use alpaca_server::config::DeviceCounts;
use alpaca_server::discovery::DiscoveredDevice;
use alpaca_server::protocol::DeviceType;
use common::{get, loopback, put, start, start_with, test_config};
use tokio_test::assert_ok;

const NOT_CONNECTED: i64 = 0x407;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dome_forwards_shutter_commands_and_polls_status() {
    let roof = start().await;
    let roof_addr = loopback(roof.addr);

    let mut config = test_config();
    config.devices = DeviceCounts {
        domes: 1,
        cameras: 0,
        telescopes: 0,
        shutters: 0,
    };
    config.dome.remote_shutter = true;
    config.discovery.responder = false;
    let observatory = start_with(config).await;
    let addr = loopback(observatory.addr);

    let body = get(addr, "/api/v1/dome/0/cansetshutter", "").await;
    assert_eq!(body["Value"], false);

    let dome = observatory.registry().lookup(DeviceType::Dome, 0).unwrap();
    dome.process_discovery(&DiscoveredDevice {
        address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: roof_addr.port(),
        device_type: "Shutter".to_string(),
        device_number: 0,
        device_name: "Simulated Shutter 0".to_string(),
        unique_id: String::new(),
    });
    let body = get(addr, "/api/v1/dome/0/cansetshutter", "").await;
    assert_eq!(body["Value"], true);

    let body = put(addr, "/api/v1/dome/0/openshutter", "ClientTransactionID=3").await;
    assert_eq!(body["ErrorNumber"], 0, "{body}");
    assert_eq!(body["ClientTransactionID"], 3);
    let body = get(roof_addr, "/api/v1/shutter/0/shutterstatus", "").await;
    assert_eq!(body["Value"], 2);

    // the dome picks the peer's status up on a later scheduler pass
    let mut status = serde_json::Value::Null;
    for _ in 0..50 {
        let body = get(addr, "/api/v1/dome/0/shutterstatus", "").await;
        if body["ErrorNumber"] == 0 {
            status = body["Value"].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(status, 2);

    let body = put(addr, "/api/v1/dome/0/abortslew", "").await;
    assert_eq!(body["ErrorNumber"], 0, "{body}");
    let body = get(roof_addr, "/api/v1/shutter/0/shutterstatus", "").await;
    assert_ne!(body["Value"], 2);

    assert_ok!(roof.shutdown().await);

    let body = put(addr, "/api/v1/dome/0/closeshutter", "").await;
    assert_eq!(body["ErrorNumber"], NOT_CONNECTED);

    assert_ok!(observatory.shutdown().await);
}
