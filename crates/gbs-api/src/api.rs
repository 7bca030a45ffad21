use crate::{handlers, state::AppState};
use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// 创建 API 路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 设备 API
        .route("/api/v1/device/list", get(handlers::list_devices))
        .route(
            "/api/v1/device/:device_id/channellist",
            get(handlers::list_channels),
        )
        .route(
            "/api/v1/device/:device_id/catalog",
            get(handlers::refresh_catalog),
        )
        .route(
            "/api/v1/device/:device_id/info",
            get(handlers::query_device_info),
        )
        .route(
            "/api/v1/device/:device_id/status",
            get(handlers::query_device_status),
        )
        // 流 API
        .route("/api/v1/stream/start", get(handlers::start_stream))
        .route("/api/v1/stream/stop", get(handlers::stop_stream))
        // 设备控制 API
        .route("/api/v1/control/ptz", get(handlers::ptz))
        // 中间件
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 健康检查
async fn health_check() -> &'static str {
    "OK"
}
