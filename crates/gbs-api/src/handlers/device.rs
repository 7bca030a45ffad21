// 设备查询与目录刷新

use crate::error::{ApiError, Result};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use gbs_signal::{Device, DeviceChannel};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// 列出全部设备
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<Device>> {
    Json(state.gateway.devices().list())
}

/// 列出设备通道
pub async fn list_channels(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<DeviceChannel>>> {
    // 设备必须已注册，通道可以为空
    state
        .gateway
        .devices()
        .get(&device_id)
        .ok_or(ApiError::DeviceNotFound(device_id.clone()))?;
    Ok(Json(state.gateway.devices().channels_of(&device_id)))
}

#[derive(Debug, Deserialize)]
pub struct CatalogQueryParams {
    /// 应答超时（秒）
    pub timeout: Option<u64>,
}

/// 主动刷新设备目录，返回取回的通道列表
pub async fn refresh_catalog(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<CatalogQueryParams>,
) -> Result<Json<Vec<DeviceChannel>>> {
    let timeout = params.timeout.map(Duration::from_secs);
    let channels = state.gateway.catalog_query(&device_id, timeout).await?;
    Ok(Json(channels))
}

/// 下发设备信息查询，应答异步更新注册表
pub async fn query_device_info(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>> {
    state.gateway.query_device_info(&device_id).await?;
    Ok(Json(json!({ "status": "query sent" })))
}

/// 下发设备状态查询
pub async fn query_device_status(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>> {
    state.gateway.query_device_status(&device_id).await?;
    Ok(Json(json!({ "status": "query sent" })))
}
