// SIP 消息解析和生成
// 国标设备的 MANSCDP 消息体使用 GB2312/GBK 编码，起始行与头部为 ASCII，
// 因此按字节切分头体后分别解码

use encoding_rs::GBK;
use std::collections::HashMap;
use std::fmt;

/// SIP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SipMethod {
    Register,
    Invite,
    Ack,
    Bye,
    Cancel,
    Message,
    Subscribe,
    Notify,
    Info,
}

impl fmt::Display for SipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SipMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SipMethod::Register => "REGISTER",
            SipMethod::Invite => "INVITE",
            SipMethod::Ack => "ACK",
            SipMethod::Bye => "BYE",
            SipMethod::Cancel => "CANCEL",
            SipMethod::Message => "MESSAGE",
            SipMethod::Subscribe => "SUBSCRIBE",
            SipMethod::Notify => "NOTIFY",
            SipMethod::Info => "INFO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "REGISTER" => Some(SipMethod::Register),
            "INVITE" => Some(SipMethod::Invite),
            "ACK" => Some(SipMethod::Ack),
            "BYE" => Some(SipMethod::Bye),
            "CANCEL" => Some(SipMethod::Cancel),
            "MESSAGE" => Some(SipMethod::Message),
            "SUBSCRIBE" => Some(SipMethod::Subscribe),
            "NOTIFY" => Some(SipMethod::Notify),
            "INFO" => Some(SipMethod::Info),
            _ => None,
        }
    }
}

/// SIP 请求
#[derive(Debug, Clone)]
pub struct SipRequest {
    pub method: SipMethod,
    pub uri: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl SipRequest {
    pub fn new(method: SipMethod, uri: String) -> Self {
        Self {
            method,
            uri,
            version: "SIP/2.0".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn add_header(&mut self, key: &str, value: String) {
        self.headers.insert(key.to_string(), value);
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn set_body(&mut self, body: String) {
        self.body = Some(body);
    }

    /// From 头部 SIP URI 中的用户名（设备国标编号）
    pub fn from_user(&self) -> Option<String> {
        self.header("From").and_then(sip_uri_user)
    }

    /// To 头部 SIP URI 中的用户名
    pub fn to_user(&self) -> Option<String> {
        self.header("To").and_then(sip_uri_user)
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header("Call-ID")
    }

    /// Expires 头部，缺失或非法时返回 None
    pub fn expires(&self) -> Option<i64> {
        self.header("Expires").and_then(|e| e.trim().parse().ok())
    }

    /// 序列化为线缆字节，消息体按 GBK 编码并据此计算 Content-Length
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body.as_deref().map(encode_body);
        let mut head = format!("{} {} {}\r\n", self.method, self.uri, self.version);
        for (key, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", key, value));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\n\r\n",
            body.as_ref().map(|b| b.len()).unwrap_or(0)
        ));

        let mut data = head.into_bytes();
        if let Some(body) = body {
            data.extend_from_slice(&body);
        }
        data
    }
}

/// SIP 响应
#[derive(Debug, Clone)]
pub struct SipResponse {
    pub version: String,
    pub status_code: u16,
    pub reason_phrase: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl SipResponse {
    pub fn new(status_code: u16, reason_phrase: &str) -> Self {
        Self {
            version: "SIP/2.0".to_string(),
            status_code,
            reason_phrase: reason_phrase.to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// 以请求为模板构造响应，回显 Via/From/To/Call-ID/CSeq
    pub fn for_request(status_code: u16, reason_phrase: &str, req: &SipRequest) -> Self {
        let mut resp = Self::new(status_code, reason_phrase);
        for key in ["Via", "From", "To", "Call-ID", "CSeq"] {
            if let Some(value) = req.header(key) {
                resp.add_header(key, value.to_string());
            }
        }
        resp
    }

    pub fn add_header(&mut self, key: &str, value: String) {
        self.headers.insert(key.to_string(), value);
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn set_body(&mut self, body: String) {
        self.body = Some(body);
    }

    /// 是否为 2xx 最终成功响应
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// CSeq 头部中的方法名（响应与原始请求方法匹配的依据）
    pub fn cseq_method(&self) -> Option<&str> {
        self.header("CSeq")
            .and_then(|c| c.split_whitespace().nth(1))
    }

    pub fn cseq_number(&self) -> Option<u32> {
        self.header("CSeq")
            .and_then(|c| c.split_whitespace().next())
            .and_then(|n| n.parse().ok())
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header("Call-ID")
    }

    /// To 头部 SIP URI 中的用户名（点播响应中为通道编号）
    pub fn to_user(&self) -> Option<String> {
        self.header("To").and_then(sip_uri_user)
    }

    /// From/To 头部的 tag 参数
    pub fn tag_of(&self, header: &str) -> Option<String> {
        self.header(header).and_then(header_tag)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body.as_deref().map(encode_body);
        let mut head = format!(
            "{} {} {}\r\n",
            self.version, self.status_code, self.reason_phrase
        );
        for (key, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", key, value));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\n\r\n",
            body.as_ref().map(|b| b.len()).unwrap_or(0)
        ));

        let mut data = head.into_bytes();
        if let Some(body) = body {
            data.extend_from_slice(&body);
        }
        data
    }
}

/// SIP 消息（请求或响应）
#[derive(Debug, Clone)]
pub enum SipMessage {
    Request(SipRequest),
    Response(SipResponse),
}

impl SipMessage {
    /// 从线缆字节解析 SIP 消息
    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        let (head, body) = split_head_body(data);
        let head = std::str::from_utf8(head).map_err(|_| "Non-ASCII message head".to_string())?;

        let mut lines = head.split("\r\n");
        let start_line = lines.next().ok_or_else(|| "Empty SIP message".to_string())?;

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            if let Some(pos) = line.find(':') {
                let key = line[..pos].trim().to_string();
                let value = line[pos + 1..].trim().to_string();
                headers.insert(key, value);
            }
        }

        let body = if body.is_empty() {
            None
        } else {
            Some(decode_body(body))
        };

        if start_line.starts_with("SIP/") {
            let parts: Vec<&str> = start_line.splitn(3, ' ').collect();
            if parts.len() != 3 {
                return Err("Invalid status line".to_string());
            }
            let status_code = parts[1]
                .parse::<u16>()
                .map_err(|_| "Invalid status code".to_string())?;
            Ok(SipMessage::Response(SipResponse {
                version: parts[0].to_string(),
                status_code,
                reason_phrase: parts[2].to_string(),
                headers,
                body,
            }))
        } else {
            let parts: Vec<&str> = start_line.split_whitespace().collect();
            if parts.len() != 3 {
                return Err("Invalid request line".to_string());
            }
            let method =
                SipMethod::parse(parts[0]).ok_or_else(|| format!("Unknown method: {}", parts[0]))?;
            Ok(SipMessage::Request(SipRequest {
                method,
                uri: parts[1].to_string(),
                version: parts[2].to_string(),
                headers,
                body,
            }))
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SipMessage::Request(req) => req.to_bytes(),
            SipMessage::Response(resp) => resp.to_bytes(),
        }
    }
}

/// 在首个空行处切分头部与消息体
fn split_head_body(data: &[u8]) -> (&[u8], &[u8]) {
    if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
        (&data[..pos], &data[pos + 4..])
    } else {
        (data, &[][..])
    }
}

/// 消息体解码：优先按 UTF-8，失败则按 GBK
fn decode_body(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = GBK.decode(body);
            decoded.into_owned()
        }
    }
}

/// 消息体编码为 GBK 字节（纯 ASCII 内容编码前后一致）
fn encode_body(body: &str) -> Vec<u8> {
    let (encoded, _, _) = GBK.encode(body);
    encoded.into_owned()
}

/// 从形如 `<sip:user@host>;tag=x` 的头部值中提取用户名
fn sip_uri_user(value: &str) -> Option<String> {
    let start = value.find("sip:")? + 4;
    let rest = &value[start..];
    let end = rest.find('@')?;
    Some(rest[..end].to_string())
}

/// 提取头部值中的 tag 参数
fn header_tag(value: &str) -> Option<String> {
    for part in value.split(';').skip(1) {
        if let Some(tag) = part.trim().strip_prefix("tag=") {
            return Some(tag.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let mut req = SipRequest::new(
            SipMethod::Register,
            "sip:34020000002000000001@3402000000".to_string(),
        );
        req.add_header("Via", "SIP/2.0/UDP 192.168.1.100:5060".to_string());
        req.add_header(
            "From",
            "<sip:34020000001320000001@3402000000>;tag=123".to_string(),
        );
        req.add_header("To", "<sip:34020000001320000001@3402000000>".to_string());
        req.add_header("Call-ID", "123456789@192.168.1.100".to_string());
        req.add_header("CSeq", "1 REGISTER".to_string());

        let data = req.to_bytes();
        let text = String::from_utf8(data.clone()).unwrap();
        assert!(text.starts_with("REGISTER sip:"));
        assert!(text.contains("Content-Length: 0"));

        match SipMessage::from_bytes(&data).unwrap() {
            SipMessage::Request(parsed) => {
                assert_eq!(parsed.method, SipMethod::Register);
                assert_eq!(
                    parsed.from_user().as_deref(),
                    Some("34020000001320000001")
                );
                assert_eq!(parsed.call_id(), Some("123456789@192.168.1.100"));
            }
            SipMessage::Response(_) => panic!("expected request"),
        }
    }

    #[test]
    fn test_response_parsing() {
        let raw = b"SIP/2.0 200 OK\r\n\
                    Via: SIP/2.0/UDP 192.168.1.100:5060\r\n\
                    From: <sip:34020000002000000001@3402000000>;tag=FromInvt1\r\n\
                    To: <sip:34020000001310000001@3402000000>;tag=device1\r\n\
                    Call-ID: abc@192.168.1.100\r\n\
                    CSeq: 1 INVITE\r\n\
                    Content-Length: 0\r\n\
                    \r\n";

        match SipMessage::from_bytes(raw).unwrap() {
            SipMessage::Response(resp) => {
                assert!(resp.is_success());
                assert_eq!(resp.cseq_method(), Some("INVITE"));
                assert_eq!(resp.to_user().as_deref(), Some("34020000001310000001"));
                assert_eq!(resp.tag_of("To").as_deref(), Some("device1"));
            }
            SipMessage::Request(_) => panic!("expected response"),
        }
    }

    #[test]
    fn test_gbk_body_decoding() {
        let head = b"MESSAGE sip:34020000002000000001@3402000000 SIP/2.0\r\n\
                     Call-ID: 1@test\r\n\
                     Content-Length: 0\r\n\r\n";
        // "摄像头" 的 GBK 编码
        let body: &[u8] = &[0xC9, 0xE3, 0xCF, 0xF1, 0xCD, 0xB7];
        let mut data = head.to_vec();
        data.extend_from_slice(body);

        match SipMessage::from_bytes(&data).unwrap() {
            SipMessage::Request(req) => {
                assert_eq!(req.body.as_deref(), Some("摄像头"));
            }
            SipMessage::Response(_) => panic!("expected request"),
        }
    }

    #[test]
    fn test_expires_header() {
        let raw = b"REGISTER sip:34020000002000000001@3402000000 SIP/2.0\r\n\
                    Expires: 3600\r\n\
                    Content-Length: 0\r\n\r\n";
        match SipMessage::from_bytes(raw).unwrap() {
            SipMessage::Request(req) => assert_eq!(req.expires(), Some(3600)),
            SipMessage::Response(_) => panic!("expected request"),
        }
    }
}
