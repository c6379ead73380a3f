//! Entry setup and unload against a fake device.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Json, Router};
use bwt_perla_core::{
    setup_entry, ConfigEntry, DeviceModel, PerlaConfig, PerlaError, SensorValue, SetupError,
    SnapshotSubscriber,
};
use serde_json::json;

use common::{closed_addr, registers, spawn_device, Hits};

fn silk_registers_device(hits: Arc<Hits>) -> Router {
    Router::new().route(
        "/silk/registers",
        get(move || async move {
            let n = hits.registers.fetch_add(1, Ordering::SeqCst);
            // Water starts flowing after detection and the first refresh
            let flow = if n < 2 { 0 } else { 1 };
            Json(json!({ "params": registers(&[(16, flow), (23, 1315), (34, 365)]) }))
        }),
    )
}

fn config_for(addr: std::net::SocketAddr) -> PerlaConfig {
    let mut config = PerlaConfig::new(addr.to_string());
    config.probe_timeout_secs = 2;
    config.fetch_timeout_secs = 2;
    config
}

#[tokio::test]
async fn test_setup_detects_and_polls() {
    let hits = Hits::new();
    let addr = spawn_device(silk_registers_device(hits.clone())).await;

    let entry = ConfigEntry::new("perla1", "Perla", config_for(addr));
    let mut loaded = setup_entry(entry).await.unwrap();

    assert_eq!(loaded.model(), DeviceModel::SilkRegisters);
    assert_eq!(loaded.entry.config.model, Some(DeviceModel::SilkRegisters));
    assert_eq!(loaded.sensors.device.model, "Perla Water Softener");
    assert_eq!(
        loaded.sensors.value("capacity_percentage"),
        Some(&SensorValue::Integer(50))
    );
    assert_eq!(loaded.sensors.value("current_flow"), Some(&SensorValue::Float(0.0)));
    assert!(loaded
        .entry
        .unique_ids
        .contains(&"perla1_warranty_days_remaining".to_string()));
    // One detection probe plus the first refresh
    assert_eq!(hits.registers(), 2);

    let mut subscription = loaded.subscribe();
    loaded.request_refresh();
    let state = tokio::time::timeout(Duration::from_secs(5), subscription.changed())
        .await
        .unwrap()
        .unwrap();
    loaded.sensors.on_update(&state);
    assert_eq!(loaded.sensors.value("current_flow"), Some(&SensorValue::Float(3.6)));
    assert_eq!(loaded.current().interval.as_duration(), Duration::from_secs(1));

    loaded.unload().await.unwrap();
}

#[tokio::test]
async fn test_persisted_model_skips_detection() {
    let hits = Hits::new();
    let addr = spawn_device(silk_registers_device(hits.clone())).await;

    let entry = ConfigEntry::new(
        "perla1",
        "Perla",
        config_for(addr).with_model(DeviceModel::SilkRegisters),
    );
    let loaded = setup_entry(entry).await.unwrap();
    assert_eq!(hits.registers(), 1);
    loaded.unload().await.unwrap();
}

#[tokio::test]
async fn test_wrong_code_is_auth_failure() {
    let addr = spawn_device(Router::new().route(
        "/api/GetCurrentData",
        get(|| async { StatusCode::UNAUTHORIZED }),
    ))
    .await;

    let mut config = config_for(addr).with_code("0000");
    config.local_api_port = addr.port();
    let err = setup_entry(ConfigEntry::new("perla1", "Perla", config))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SetupError::AuthFailed(PerlaError::Auth(_))));
}

#[tokio::test]
async fn test_unreachable_device_is_not_ready() {
    let addr = closed_addr().await;
    let config = config_for(addr).with_model(DeviceModel::Silk);
    let err = setup_entry(ConfigEntry::new("perla1", "Perla", config))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SetupError::NotReady(PerlaError::Connection(_))));
}

#[tokio::test]
async fn test_legacy_entry_migrated_on_setup() {
    let hits = Hits::new();
    let addr = spawn_device(silk_registers_device(hits)).await;

    let entry = ConfigEntry {
        version: 1,
        unique_ids: vec!["total_output".to_string()],
        ..ConfigEntry::new("perla1", "Perla", config_for(addr))
    };
    let loaded = setup_entry(entry).await.unwrap();
    assert_eq!(loaded.entry.version, 2);
    assert!(loaded.entry.unique_ids.contains(&"perla1_total_output".to_string()));
    loaded.unload().await.unwrap();
}
