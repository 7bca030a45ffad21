// 邀请 SDP 构造
// 设备按行位置解析 SDP，字段顺序固定不可重排，行尾一律 CRLF：
//   v= / o= / s= / c= / t= / m= / a=recvonly / a=rtpmap... / [a=setup / a=connection] / y=

use crate::sip::transport::TransportKind;
use std::fmt;

/// 流传输模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Udp,
    TcpActive,
    TcpPassive,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Udp => "UDP",
            StreamMode::TcpActive => "TCP-ACTIVE",
            StreamMode::TcpPassive => "TCP-PASSIVE",
        }
    }

    /// 信令/媒体传输落在哪种传输类型上
    pub fn transport_kind(&self) -> TransportKind {
        match self {
            StreamMode::Udp => TransportKind::Udp,
            StreamMode::TcpActive | StreamMode::TcpPassive => TransportKind::Tcp,
        }
    }

    /// 按优先级解析生效模式：请求显式指定 > 设备配置的媒体传输
    ///
    /// transport 为 UDP/TCP，transport_mode 仅在 TCP 时区分主被动（默认被动）
    pub fn negotiate(
        transport: Option<&str>,
        transport_mode: Option<&str>,
        device_media_transport: &str,
    ) -> Self {
        let effective = transport.unwrap_or(device_media_transport);
        if effective.eq_ignore_ascii_case("TCP") {
            if transport_mode
                .map(|m| m.eq_ignore_ascii_case("active"))
                .unwrap_or(false)
            {
                StreamMode::TcpActive
            } else {
                StreamMode::TcpPassive
            }
        } else {
            StreamMode::Udp
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 构造发往设备的邀请 SDP
///
/// senior_sdp 启用扩展编码集，在负载类型列表与 rtpmap 中附加
/// H264S/MP4V-ES 等条目
pub fn build_invite_sdp(
    channel_id: &str,
    gateway_ip: &str,
    media_port: u16,
    mode: StreamMode,
    senior_sdp: bool,
    ssrc: u32,
) -> String {
    let mut content = String::with_capacity(256);
    content.push_str("v=0\r\n");
    content.push_str(&format!("o={} 0 0 IN IP4 {}\r\n", channel_id, gateway_ip));
    content.push_str("s=Play\r\n");
    content.push_str(&format!("c=IN IP4 {}\r\n", gateway_ip));
    content.push_str("t=0 0\r\n");

    let proto = match mode {
        StreamMode::Udp => "RTP/AVP",
        StreamMode::TcpActive | StreamMode::TcpPassive => "TCP/RTP/AVP",
    };
    if senior_sdp {
        content.push_str(&format!(
            "m=video {} {} 96 126 125 99 34 98 97\r\n",
            media_port, proto
        ));
        content.push_str("a=recvonly\r\n");
        content.push_str("a=rtpmap:96 PS/90000\r\n");
        content.push_str("a=fmtp:126 profile-level-id=42e01e\r\n");
        content.push_str("a=rtpmap:126 H264/90000\r\n");
        content.push_str("a=rtpmap:125 H264S/90000\r\n");
        content.push_str("a=fmtp:125 profile-level-id=42e01e\r\n");
        content.push_str("a=rtpmap:99 MP4V-ES/90000\r\n");
        content.push_str("a=fmtp:99 profile-level-id=3\r\n");
    } else {
        content.push_str(&format!("m=video {} {} 96 98 97\r\n", media_port, proto));
        content.push_str("a=recvonly\r\n");
        content.push_str("a=rtpmap:96 PS/90000\r\n");
    }
    content.push_str("a=rtpmap:98 H264/90000\r\n");
    content.push_str("a=rtpmap:97 MPEG4/90000\r\n");

    match mode {
        StreamMode::TcpPassive => {
            content.push_str("a=setup:passive\r\n");
            content.push_str("a=connection:new\r\n");
        }
        StreamMode::TcpActive => {
            content.push_str("a=setup:active\r\n");
            content.push_str("a=connection:new\r\n");
        }
        StreamMode::Udp => {}
    }

    content.push_str(&format!("y={}\r\n", ssrc));
    content
}

/// 从应答 SDP 中提取 y= 行携带的 SSRC
pub fn extract_ssrc(sdp: &str) -> Option<String> {
    sdp.lines()
        .find_map(|line| line.trim().strip_prefix("y="))
        .map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_precedence() {
        // 请求显式指定优先于设备配置
        assert_eq!(
            StreamMode::negotiate(Some("TCP"), Some("active"), "UDP"),
            StreamMode::TcpActive
        );
        assert_eq!(
            StreamMode::negotiate(Some("UDP"), None, "TCP"),
            StreamMode::Udp
        );
        // 未指定时回落到设备配置，TCP 默认被动
        assert_eq!(StreamMode::negotiate(None, None, "TCP"), StreamMode::TcpPassive);
        assert_eq!(StreamMode::negotiate(None, None, "UDP"), StreamMode::Udp);
    }

    #[test]
    fn test_udp_basic_sdp() {
        let sdp = build_invite_sdp(
            "34020000001310000001",
            "192.168.1.10",
            9000,
            StreamMode::Udp,
            false,
            9000001,
        );

        let lines: Vec<&str> = sdp.lines().collect();
        assert_eq!(lines[0], "v=0");
        assert_eq!(lines[1], "o=34020000001310000001 0 0 IN IP4 192.168.1.10");
        assert_eq!(lines[2], "s=Play");
        assert_eq!(lines[3], "c=IN IP4 192.168.1.10");
        assert_eq!(lines[4], "t=0 0");
        assert_eq!(lines[5], "m=video 9000 RTP/AVP 96 98 97");
        assert_eq!(lines[6], "a=recvonly");
        assert_eq!(*lines.last().unwrap(), "y=9000001");

        assert_eq!(sdp.matches("m=video").count(), 1);
        assert!(!sdp.contains("a=setup"));
        assert!(sdp.ends_with("\r\n"));
    }

    #[test]
    fn test_tcp_passive_sdp() {
        let sdp = build_invite_sdp(
            "34020000001310000001",
            "192.168.1.10",
            9000,
            StreamMode::TcpPassive,
            false,
            9000001,
        );

        assert!(sdp.contains("m=video 9000 TCP/RTP/AVP 96 98 97\r\n"));
        assert!(sdp.contains("a=setup:passive\r\n"));
        assert!(sdp.contains("a=connection:new\r\n"));
        // y= 保持为最后一行
        assert!(sdp.ends_with("y=9000001\r\n"));
    }

    #[test]
    fn test_tcp_active_sdp() {
        let sdp = build_invite_sdp(
            "34020000001310000001",
            "192.168.1.10",
            9000,
            StreamMode::TcpActive,
            false,
            1,
        );
        assert!(sdp.contains("a=setup:active\r\n"));
    }

    #[test]
    fn test_senior_sdp_payload_types() {
        let sdp = build_invite_sdp(
            "34020000001310000001",
            "192.168.1.10",
            9000,
            StreamMode::Udp,
            true,
            1,
        );
        assert!(sdp.contains("m=video 9000 RTP/AVP 96 126 125 99 34 98 97\r\n"));
        assert!(sdp.contains("a=rtpmap:125 H264S/90000\r\n"));
        assert!(sdp.contains("a=rtpmap:99 MP4V-ES/90000\r\n"));
    }

    #[test]
    fn test_extract_ssrc() {
        let sdp = "v=0\r\no=x 0 0 IN IP4 1.2.3.4\r\ny=9000001\r\n";
        assert_eq!(extract_ssrc(sdp).as_deref(), Some("9000001"));
        assert_eq!(extract_ssrc("v=0\r\n"), None);
    }
}
