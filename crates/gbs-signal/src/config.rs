// 网关配置
// SIP 侧与流媒体服务器侧的静态配置，守护进程从 TOML 加载

use serde::Deserialize;

/// SIP 信令侧配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SipConfig {
    /// 平台国标编号（20 位）
    pub serial: String,

    /// SIP 域
    pub realm: String,

    /// 监听地址
    pub ip: String,

    /// 监听端口（UDP 与 TCP 同端口）
    pub port: u16,

    /// 设备注册密码
    pub password: String,

    /// 命令应答超时（秒），目录查询等默认使用该值
    pub ack_timeout: u64,

    /// 心跳超时（秒）
    pub keepalive_timeout: u64,

    /// 扩展编码集 SDP（附加 H264S/MP4V-ES 等负载类型）
    pub senior_sdp: bool,
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            serial: "34020000002000000001".to_string(),
            realm: "3402000000".to_string(),
            ip: "0.0.0.0".to_string(),
            port: 5060,
            password: "12345678".to_string(),
            ack_timeout: 30,
            keepalive_timeout: 120,
            senior_sdp: false,
        }
    }
}

impl SipConfig {
    /// 监听套接字地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// 流媒体服务器（SRS）配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// 流媒体服务器编号
    pub serial: String,

    /// 服务器主机名或 IP
    pub host: String,

    /// HTTP API 端口
    pub http_port: u16,

    /// HTTP 流端口（flv/hls）
    pub port: u16,

    /// RTMP 端口
    pub rtmp_port: u16,

    /// HTTPS 流端口，0 表示未启用
    pub https_port: u16,

    /// RTP 复用端口（SDP 中通告的收流端口）
    pub rtp_mux_port: u16,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            serial: "34020000002020000001".to_string(),
            host: "127.0.0.1".to_string(),
            http_port: 1985,
            port: 8080,
            rtmp_port: 1935,
            https_port: 0,
            rtp_mux_port: 9000,
        }
    }
}

impl MediaConfig {
    /// API 基地址
    pub fn api_base(&self) -> String {
        format!("http://{}:{}", self.host, self.http_port)
    }

    /// 流地址使用的协议（启用 HTTPS 端口时为 https）
    pub fn http_scheme(&self) -> &'static str {
        if self.https_port == 0 {
            "http"
        } else {
            "https"
        }
    }
}

/// 网关整体配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub sip: SipConfig,
    pub media: MediaConfig,
}
