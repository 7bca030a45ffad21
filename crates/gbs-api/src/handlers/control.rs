// 设备控制（云台）

use crate::error::Result;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct PtzParams {
    /// 设备编号
    pub serial: String,

    /// 通道编号
    pub code: String,

    /// 控制指令：left/right/up/down/upleft/upright/downleft/downright/zoomin/zoomout/stop
    pub command: String,

    /// 速度（0~255），默认 129
    pub speed: Option<u8>,
}

/// 云台控制
pub async fn ptz(
    State(state): State<AppState>,
    Query(params): Query<PtzParams>,
) -> Result<Json<Value>> {
    state
        .gateway
        .ptz_control(&params.serial, &params.code, &params.command, params.speed)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}
