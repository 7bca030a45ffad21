use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gbs_signal::SignalError;
use serde_json::json;
use std::fmt;

/// API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 设备未注册
    DeviceNotFound(String),
    /// 对话不存在（无流可停）
    DialogNotFound(String),
    /// 设备应答超时
    Timeout(String),
    /// 流媒体服务器预配失败
    UpstreamFailed(String),
    /// 请求参数错误
    BadRequest(String),
    /// 内部错误
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::DeviceNotFound(id) => write!(f, "Device not found: {}", id),
            ApiError::DialogNotFound(id) => write!(f, "Dialog not found: {}", id),
            ApiError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            ApiError::UpstreamFailed(msg) => write!(f, "Media server error: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::DeviceNotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::DialogNotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Timeout(ref msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            ApiError::UpstreamFailed(ref msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InternalError(ref msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

// 从 gbs_signal::SignalError 转换
impl From<SignalError> for ApiError {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::DeviceNotFound(id) => ApiError::DeviceNotFound(id),
            SignalError::DialogNotFound {
                device_id,
                channel_id,
            } => ApiError::DialogNotFound(format!("{}@{}", device_id, channel_id)),
            SignalError::CorrelationTimeout { category, id } => {
                ApiError::Timeout(format!("{}/{}", category, id))
            }
            SignalError::UpstreamProvisionFailed(msg) => ApiError::UpstreamFailed(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
