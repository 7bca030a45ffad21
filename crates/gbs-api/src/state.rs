use gbs_signal::SipGateway;
use std::sync::Arc;

/// API 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 信令网关
    pub gateway: Arc<SipGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<SipGateway>) -> Self {
        Self { gateway }
    }
}
