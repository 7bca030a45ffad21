// 点播起停

use crate::error::Result;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use gbs_signal::{PlayParams, StreamInfo};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct StartParams {
    /// 设备编号
    pub serial: String,

    /// 通道编号
    pub code: String,

    /// 流传输覆盖（UDP/TCP），缺省取设备配置
    pub transport: Option<String>,

    /// TCP 主被动（active/passive），默认被动
    pub transport_mode: Option<String>,

    /// 拉流超时（秒）
    pub timeout: Option<u64>,
}

/// 开始直播
pub async fn start_stream(
    State(state): State<AppState>,
    Query(params): Query<StartParams>,
) -> Result<Json<StreamInfo>> {
    let play = PlayParams {
        transport: params.transport,
        transport_mode: params.transport_mode,
        timeout: params.timeout.map(Duration::from_secs),
    };
    let info = state
        .gateway
        .play_stream(&params.serial, &params.code, play)
        .await?;
    Ok(Json(info))
}

#[derive(Debug, Deserialize)]
pub struct StopParams {
    pub serial: String,
    pub code: String,
}

/// 停止直播
pub async fn stop_stream(
    State(state): State<AppState>,
    Query(params): Query<StopParams>,
) -> Result<Json<Value>> {
    state
        .gateway
        .stop_stream(&params.serial, &params.code)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}
