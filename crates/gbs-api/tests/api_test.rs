// API 集成测试

use gbs_api::{create_router, AppState};
use gbs_signal::config::{GatewayConfig, SipConfig};
use gbs_signal::sip::transport::TransportKind;
use gbs_signal::SipGateway;

async fn spawn_api() -> (std::sync::Arc<SipGateway>, String) {
    let config = GatewayConfig {
        sip: SipConfig {
            ip: "127.0.0.1".to_string(),
            port: 0,
            ..SipConfig::default()
        },
        ..GatewayConfig::default()
    };
    let gateway = SipGateway::start(config).await.unwrap();

    let router = create_router(AppState::new(gateway.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (gateway, base)
}

#[tokio::test]
async fn test_health() {
    let (_gateway, base) = spawn_api().await;
    let body = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_device_list_and_channels() {
    let (gateway, base) = spawn_api().await;

    gateway.devices().register_or_update(
        "34020000001320000001",
        "192.168.1.100".to_string(),
        5060,
        TransportKind::Udp,
        3600,
        "12345678",
    );

    let devices: serde_json::Value = reqwest::get(format!("{}/api/v1/device/list", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["id"], "34020000001320000001");
    assert_eq!(devices[0]["online"], true);

    // 已注册设备通道为空列表
    let resp = reqwest::get(format!(
        "{}/api/v1/device/34020000001320000001/channellist",
        base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let channels: serde_json::Value = resp.json().await.unwrap();
    assert!(channels.as_array().unwrap().is_empty());

    // 未注册设备返回 404
    let resp = reqwest::get(format!(
        "{}/api/v1/device/34020000009999999999/channellist",
        base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn test_stop_stream_without_dialog_is_404() {
    let (_gateway, base) = spawn_api().await;
    let resp = reqwest::get(format!(
        "{}/api/v1/stream/stop?serial=34020000001320000001&code=34020000001310000001",
        base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
