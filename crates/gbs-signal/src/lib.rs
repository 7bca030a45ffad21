// gbs-signal: GB28181 信令网关核心库
//
// 架构：
// - sip/: SIP 传输、消息解析、分发注册表、Digest 鉴权
// - device: 设备与通道注册表
// - correlate: 异步请求/响应关联中枢
// - catalog: 目录查询协议（MANSCDP XML）
// - invite: 实时流邀请编排（含 SDP 构造）
// - media: 流媒体服务器控制接口客户端

pub mod config;
pub mod correlate;
pub mod device;
pub mod dialog;
pub mod error;
pub mod gateway;
pub mod media;
pub mod sdp;
pub mod sip;
pub mod stream;
pub mod xml;

pub use config::{GatewayConfig, MediaConfig, SipConfig};
pub use device::{Device, DeviceChannel, DeviceRegistry};
pub use error::{Result, SignalError};
pub use gateway::{PlayParams, SipGateway};
pub use sdp::StreamMode;
pub use stream::StreamInfo;
