// gbs-api: 网关操作员控制面
// 设备/通道查询、目录刷新、点播起停与云台控制的 HTTP 接口，
// 全部落到 gbs-signal 的对应操作上

pub mod api;
pub mod error;
pub mod handlers;
pub mod state;

pub use api::create_router;
pub use error::{ApiError, Result};
pub use state::AppState;
