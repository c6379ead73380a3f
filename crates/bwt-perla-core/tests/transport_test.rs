//! HTTP transports against a fake device.

mod common;

use std::time::Duration;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use bwt_perla_core::{
    create_transport, DeviceModel, LocalApiClient, PerlaError, RawPayload, RegistersClient,
    Transport,
};
use serde_json::json;

use common::{closed_addr, endpoints, spawn_device};

const TIMEOUT: Duration = Duration::from_secs(2);

/// base64("user:1234")
const EXPECTED_AUTH: &str = "Basic dXNlcjoxMjM0";

async fn local_api(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(EXPECTED_AUTH) => (
            StatusCode::OK,
            Json(json!({
                "ActiveErrorIDs": "",
                "CurrentFlowrate_l_h": 900,
                "FirmwareVersion": "2.0206",
                "HardnessIN_dH": 20,
                "HardnessOUT_dH": 5,
                "TreatedWaterDay_l": 300
            })),
        ),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({}))),
    }
}

fn device() -> Router {
    Router::new()
        .route("/api/GetCurrentData", get(local_api))
        .route(
            "/silk/registers",
            get(|| async { Json(json!({"params": [5, 6, 7]})) }),
        )
        .route("/registers", get(|| async { Json(json!([1, 2])) }))
        .route(
            "/broken/registers",
            get(|| async { (StatusCode::OK, "not json") }),
        )
        .route(
            "/slow/registers",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!([]))
            }),
        )
}

#[tokio::test]
async fn test_local_api_sends_code_as_basic_auth() {
    let addr = spawn_device(device()).await;
    let client = LocalApiClient::new(endpoints(addr).local_api, "1234", TIMEOUT);

    let data = client.get_current_data().await.unwrap();
    assert_eq!(data.current_flow, 900);
    assert_eq!(data.firmware_version, "2.0206");
    assert!(data.errors.is_empty());
    client.close().await;
}

#[tokio::test]
async fn test_local_api_wrong_code_is_auth_error() {
    let addr = spawn_device(device()).await;
    let client = LocalApiClient::new(endpoints(addr).local_api, "0000", TIMEOUT);

    let err = client.fetch().await.unwrap_err();
    assert!(err.is_auth());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_register_transports_use_their_endpoint() {
    let addr = spawn_device(device()).await;
    let endpoints = endpoints(addr);

    let transport = create_transport(DeviceModel::SilkRegisters, &endpoints, None, TIMEOUT).unwrap();
    assert_eq!(transport.model(), DeviceModel::SilkRegisters);
    assert_eq!(transport.fetch().await.unwrap(), RawPayload::Registers(vec![5, 6, 7]));

    let transport = create_transport(DeviceModel::Silk, &endpoints, None, TIMEOUT).unwrap();
    assert_eq!(transport.fetch().await.unwrap(), RawPayload::Registers(vec![1, 2]));
}

#[tokio::test]
async fn test_local_api_transport_requires_code() {
    let addr = spawn_device(device()).await;
    let err = create_transport(DeviceModel::LocalApi, &endpoints(addr), None, TIMEOUT)
        .err()
        .unwrap();
    assert!(matches!(err, PerlaError::Configuration(_)));
}

#[tokio::test]
async fn test_http_error_is_malformed_response() {
    let addr = spawn_device(device()).await;
    let client = RegistersClient::new(
        DeviceModel::Silk,
        format!("http://{}/missing", addr),
        TIMEOUT,
    );
    let err = client.get_registers().await.unwrap_err();
    assert!(matches!(err, PerlaError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_invalid_body_is_malformed_response() {
    let addr = spawn_device(device()).await;
    let client = RegistersClient::new(
        DeviceModel::Silk,
        format!("http://{}/broken/registers", addr),
        TIMEOUT,
    );
    let err = client.get_registers().await.unwrap_err();
    assert!(matches!(err, PerlaError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_slow_device_times_out() {
    let addr = spawn_device(device()).await;
    let client = RegistersClient::new(
        DeviceModel::Silk,
        format!("http://{}/slow/registers", addr),
        Duration::from_secs(1),
    );
    let err = client.get_registers().await.unwrap_err();
    assert!(matches!(err, PerlaError::Timeout(1)));
}

#[tokio::test]
async fn test_unreachable_device_is_connection_error() {
    let addr = closed_addr().await;
    let client = RegistersClient::new(DeviceModel::Silk, endpoints(addr).silk, TIMEOUT);
    let err = client.get_registers().await.unwrap_err();
    assert!(matches!(err, PerlaError::Connection(_)));
}

#[tokio::test]
async fn test_close_then_fetch_reopens() {
    let addr = spawn_device(device()).await;
    let client = RegistersClient::new(DeviceModel::Silk, endpoints(addr).silk, TIMEOUT);
    client.fetch().await.unwrap();
    client.close().await;
    client.close().await;
    assert_eq!(client.fetch().await.unwrap(), RawPayload::Registers(vec![1, 2]));
}
