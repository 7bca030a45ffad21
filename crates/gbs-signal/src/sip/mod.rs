// SIP 信令层
// 传输监听、消息解析、分类分发与 Digest 鉴权

pub mod auth;
pub mod dispatch;
pub mod message;
pub mod transport;

pub use dispatch::{CommandEvent, DispatchRegistry, RequestEvent, ResponseEvent};
pub use message::{SipMessage, SipMethod, SipRequest, SipResponse};
pub use transport::{SipEvent, SipListener, SipSender, TransportKind};
