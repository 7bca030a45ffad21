// MANSCDP XML 消息体
// 每类命令一个结构体，标签映射由 serde rename 声明，统一经 quick-xml 反序列化

use crate::{Result, SignalError};
use quick_xml::de::from_str;
use serde::Deserialize;

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"GB2312\"?>";

/// 从消息体中提取（消息类别, 命令类型）二级分类键
///
/// 类别为根元素名（Query/Response/Notify/Control），命令类型为 CmdType 文本
pub fn classify_body(body: &str) -> Option<(String, String)> {
    let body = body.trim();
    let mut rest = body;
    if let Some(end) = rest.strip_prefix("<?") {
        rest = &end[end.find("?>")? + 2..];
    }
    let start = rest.find('<')? + 1;
    let tail = &rest[start..];
    let end = tail.find(|c: char| c == '>' || c.is_whitespace())?;
    let category = tail[..end].to_string();

    let cmd_start = body.find("<CmdType>")? + "<CmdType>".len();
    let cmd_end = body[cmd_start..].find("</CmdType>")? + cmd_start;
    let cmd_type = body[cmd_start..cmd_end].trim().to_string();

    Some((category, cmd_type))
}

fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T> {
    from_str(body.trim()).map_err(|e| SignalError::Parse(format!("MANSCDP XML: {}", e)))
}

/// Response/Catalog 目录响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogResponse {
    pub cmd_type: String,

    #[serde(rename = "SN")]
    pub sn: u32,

    #[serde(rename = "DeviceID")]
    pub device_id: String,

    /// 目录总项数，分片响应各片均携带
    #[serde(default)]
    pub sum_num: u32,

    #[serde(default)]
    pub device_list: Option<CatalogDeviceList>,
}

impl CatalogResponse {
    pub fn parse(body: &str) -> Result<Self> {
        parse(body)
    }

    pub fn items(&self) -> &[CatalogItem] {
        self.device_list
            .as_ref()
            .map(|l| l.items.as_slice())
            .unwrap_or(&[])
    }
}

/// 目录响应中的 DeviceList 节点
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogDeviceList {
    #[serde(rename = "@Num", default)]
    pub num: Option<u32>,

    #[serde(rename = "Item", default)]
    pub items: Vec<CatalogItem>,
}

/// 目录项（一个通道）
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogItem {
    #[serde(rename = "DeviceID")]
    pub device_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub owner: String,

    /// 行政区划编码
    #[serde(default)]
    pub civil_code: String,

    #[serde(default)]
    pub address: String,

    /// 是否有子节点（1 有，0 无）
    #[serde(default)]
    pub parental: u8,

    #[serde(rename = "ParentID", default)]
    pub parent_id: String,

    #[serde(default)]
    pub safety_way: u8,

    #[serde(default)]
    pub register_way: u8,

    #[serde(default)]
    pub secrecy: u8,

    /// ON/OFF
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default)]
    pub latitude: Option<f64>,
}

/// Notify/Keepalive 心跳
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeepaliveNotify {
    pub cmd_type: String,

    #[serde(rename = "SN", default)]
    pub sn: u32,

    #[serde(rename = "DeviceID")]
    pub device_id: String,

    #[serde(default)]
    pub status: String,
}

impl KeepaliveNotify {
    pub fn parse(body: &str) -> Result<Self> {
        parse(body)
    }
}

/// Response/DeviceInfo 设备信息响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceInfoResponse {
    pub cmd_type: String,

    #[serde(rename = "SN", default)]
    pub sn: u32,

    #[serde(rename = "DeviceID")]
    pub device_id: String,

    #[serde(default)]
    pub device_name: String,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub firmware: String,

    /// 通道数量
    #[serde(default)]
    pub channel: Option<u32>,

    #[serde(default)]
    pub result: String,
}

impl DeviceInfoResponse {
    pub fn parse(body: &str) -> Result<Self> {
        parse(body)
    }
}

/// Response/DeviceStatus 设备状态响应
///
/// 部分厂商以 Status 字段而非 Online 表示在线状态
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceStatusResponse {
    pub cmd_type: String,

    #[serde(rename = "SN", default)]
    pub sn: u32,

    #[serde(rename = "DeviceID")]
    pub device_id: String,

    #[serde(default)]
    pub online: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub result: String,
}

impl DeviceStatusResponse {
    pub fn parse(body: &str) -> Result<Self> {
        parse(body)
    }

    pub fn is_online(&self) -> bool {
        self.online.eq_ignore_ascii_case("ONLINE")
            || self.status.eq_ignore_ascii_case("OK")
            || self.status.eq_ignore_ascii_case("ONLINE")
    }
}

/// Query/Catalog 目录查询（设备或上级发起，网关仅应答）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogQueryCmd {
    pub cmd_type: String,

    #[serde(rename = "SN")]
    pub sn: u32,

    #[serde(rename = "DeviceID")]
    pub device_id: String,
}

impl CatalogQueryCmd {
    pub fn parse(body: &str) -> Result<Self> {
        parse(body)
    }
}

/// 构造 Query/Catalog 查询体
pub fn build_catalog_query(sn: u32, device_id: &str) -> String {
    format!(
        "{}\r\n<Query>\r\n<CmdType>Catalog</CmdType>\r\n<SN>{}</SN>\r\n<DeviceID>{}</DeviceID>\r\n</Query>\r\n",
        XML_DECLARATION, sn, device_id
    )
}

/// 构造 Query/DeviceInfo 查询体
pub fn build_device_info_query(sn: u32, device_id: &str) -> String {
    format!(
        "{}\r\n<Query>\r\n<CmdType>DeviceInfo</CmdType>\r\n<SN>{}</SN>\r\n<DeviceID>{}</DeviceID>\r\n</Query>\r\n",
        XML_DECLARATION, sn, device_id
    )
}

/// 构造 Query/DeviceStatus 查询体
pub fn build_device_status_query(sn: u32, device_id: &str) -> String {
    format!(
        "{}\r\n<Query>\r\n<CmdType>DeviceStatus</CmdType>\r\n<SN>{}</SN>\r\n<DeviceID>{}</DeviceID>\r\n</Query>\r\n",
        XML_DECLARATION, sn, device_id
    )
}

/// 构造 Control/DeviceControl 云台控制体，指令码由调用方给出
pub fn build_device_control(sn: u32, device_id: &str, ptz_cmd: &str) -> String {
    format!(
        "{}\r\n<Control>\r\n<CmdType>DeviceControl</CmdType>\r\n<SN>{}</SN>\r\n<DeviceID>{}</DeviceID>\r\n<PTZCmd>{}</PTZCmd>\r\n</Control>\r\n",
        XML_DECLARATION, sn, device_id, ptz_cmd
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_RESPONSE: &str = r#"<?xml version="1.0" encoding="GB2312"?>
<Response>
<CmdType>Catalog</CmdType>
<SN>12345678</SN>
<DeviceID>34020000001320000001</DeviceID>
<SumNum>2</SumNum>
<DeviceList Num="2">
<Item>
<DeviceID>34020000001310000001</DeviceID>
<Name>摄像头1</Name>
<Manufacturer>海康威视</Manufacturer>
<Model>DS-2CD3T46WD</Model>
<Owner>Owner</Owner>
<CivilCode>340200</CivilCode>
<Parental>0</Parental>
<ParentID>34020000001320000001</ParentID>
<SafetyWay>0</SafetyWay>
<RegisterWay>1</RegisterWay>
<Secrecy>0</Secrecy>
<Status>ON</Status>
</Item>
<Item>
<DeviceID>34020000001310000002</DeviceID>
<Name>摄像头2</Name>
<Manufacturer>大华</Manufacturer>
<Status>OFF</Status>
</Item>
</DeviceList>
</Response>"#;

    #[test]
    fn test_classify_body() {
        let (category, cmd) = classify_body(CATALOG_RESPONSE).unwrap();
        assert_eq!(category, "Response");
        assert_eq!(cmd, "Catalog");

        let keepalive = "<Notify><CmdType>Keepalive</CmdType><DeviceID>x</DeviceID></Notify>";
        assert_eq!(
            classify_body(keepalive),
            Some(("Notify".to_string(), "Keepalive".to_string()))
        );

        assert!(classify_body("not xml at all").is_none());
    }

    #[test]
    fn test_parse_catalog_response() {
        let resp = CatalogResponse::parse(CATALOG_RESPONSE).unwrap();
        assert_eq!(resp.cmd_type, "Catalog");
        assert_eq!(resp.sn, 12345678);
        assert_eq!(resp.sum_num, 2);
        assert_eq!(resp.items().len(), 2);
        assert_eq!(resp.items()[0].name, "摄像头1");
        assert_eq!(resp.items()[0].parent_id, "34020000001320000001");
        assert_eq!(resp.items()[1].status, "OFF");
    }

    #[test]
    fn test_parse_catalog_without_list() {
        let xml = r#"<Response>
<CmdType>Catalog</CmdType>
<SN>1</SN>
<DeviceID>34020000001320000001</DeviceID>
<SumNum>0</SumNum>
</Response>"#;
        let resp = CatalogResponse::parse(xml).unwrap();
        assert_eq!(resp.sum_num, 0);
        assert!(resp.items().is_empty());
    }

    #[test]
    fn test_parse_keepalive() {
        let xml = r#"<Notify>
<CmdType>Keepalive</CmdType>
<SN>42</SN>
<DeviceID>34020000001320000001</DeviceID>
<Status>OK</Status>
</Notify>"#;
        let notify = KeepaliveNotify::parse(xml).unwrap();
        assert_eq!(notify.device_id, "34020000001320000001");
        assert_eq!(notify.status, "OK");
    }

    #[test]
    fn test_parse_device_status() {
        let xml = r#"<Response>
<CmdType>DeviceStatus</CmdType>
<SN>7</SN>
<DeviceID>34020000001320000001</DeviceID>
<Online>ONLINE</Online>
<Status>OK</Status>
<Result>OK</Result>
</Response>"#;
        let status = DeviceStatusResponse::parse(xml).unwrap();
        assert!(status.is_online());
    }

    #[test]
    fn test_build_catalog_query() {
        let xml = build_catalog_query(12345678, "34020000001320000001");
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains("<CmdType>Catalog</CmdType>"));
        assert!(xml.contains("<SN>12345678</SN>"));
        assert!(xml.contains("<DeviceID>34020000001320000001</DeviceID>"));

        let (category, cmd) = classify_body(&xml).unwrap();
        assert_eq!(category, "Query");
        assert_eq!(cmd, "Catalog");
    }

    #[test]
    fn test_build_device_control() {
        let xml = build_device_control(9, "34020000001310000001", "A50F01021F0000D6");
        let (category, cmd) = classify_body(&xml).unwrap();
        assert_eq!(category, "Control");
        assert_eq!(cmd, "DeviceControl");
        assert!(xml.contains("<PTZCmd>A50F01021F0000D6</PTZCmd>"));
    }
}
