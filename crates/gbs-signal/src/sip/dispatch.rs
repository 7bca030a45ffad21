// 消息分类与分发注册表
// 三张查找表：请求方法、响应方法（取自 CSeq 中的原始请求方法）、
// 会话控制消息体的（消息类别, 命令类型）二级键。
//
// 注册表在启动时显式构造，条目一目了然；未注册的方法或命令
// 返回错误交由上层记录，不静默吞掉——设备发来未处理的命令
// 必须可见，否则协议符合性问题无从排查。
//
// 分类只做解析（幂等、无副作用），产出携带已解析字段的事件对象，
// 对事件的反应由网关负责，二者分离便于脱离网络单测。

use super::message::{SipMethod, SipRequest, SipResponse};
use crate::error::{Result, SignalError};
use crate::sdp;
use crate::xml::{
    self, CatalogQueryCmd, CatalogResponse, DeviceInfoResponse, DeviceStatusResponse,
    KeepaliveNotify,
};
use std::collections::HashMap;

/// 入站请求事件
#[derive(Debug)]
pub enum RequestEvent {
    Register(RegisterEvent),
    Message(CommandEvent),
    Ack(AckEvent),
    Bye(ByeEvent),
}

/// REGISTER 事件
#[derive(Debug)]
pub struct RegisterEvent {
    pub device_id: String,
    /// Expires 头部值，缺失时由上层取默认
    pub expires: Option<i64>,
}

/// ACK 事件
#[derive(Debug)]
pub struct AckEvent {
    pub call_id: Option<String>,
}

/// 设备侧发起的 BYE
#[derive(Debug)]
pub struct ByeEvent {
    pub device_id: Option<String>,
    pub call_id: Option<String>,
}

/// 会话控制（MESSAGE 体）命令事件
#[derive(Debug)]
pub enum CommandEvent {
    Keepalive(KeepaliveNotify),
    CatalogQuery(CatalogQueryCmd),
    CatalogResponse(CatalogResponse),
    DeviceInfo(DeviceInfoResponse),
    DeviceStatus(DeviceStatusResponse),
}

/// 入站响应事件
#[derive(Debug)]
pub enum ResponseEvent {
    Invite(InviteResponseEvent),
    /// MESSAGE/BYE 的响应只需记录，无进一步处理
    Plain { method: &'static str, status: u16 },
}

/// 邀请响应事件
#[derive(Debug)]
pub struct InviteResponseEvent {
    pub status_code: u16,
    /// To 头部中的通道编号
    pub channel_id: Option<String>,
    pub call_id: Option<String>,
    pub from_tag: Option<String>,
    pub to_tag: Option<String>,
    pub cseq: Option<u32>,
    /// 应答 SDP y= 行中的流标识
    pub ssrc: Option<String>,
}

type RequestParser = fn(&DispatchRegistry, &SipRequest) -> Result<RequestEvent>;
type ResponseParser = fn(&SipResponse) -> Result<ResponseEvent>;
type CommandParser = fn(&str) -> Result<CommandEvent>;

/// 分发注册表
pub struct DispatchRegistry {
    requests: HashMap<SipMethod, RequestParser>,
    responses: HashMap<&'static str, ResponseParser>,
    /// 消息类别 -> 命令类型 -> 解析器
    commands: HashMap<&'static str, HashMap<&'static str, CommandParser>>,
}

impl DispatchRegistry {
    /// 构造标准注册表，条目在此处集中登记
    pub fn standard() -> Self {
        let mut registry = Self {
            requests: HashMap::new(),
            responses: HashMap::new(),
            commands: HashMap::new(),
        };

        registry.requests.insert(SipMethod::Register, parse_register);
        registry.requests.insert(SipMethod::Message, parse_message);
        registry.requests.insert(SipMethod::Ack, parse_ack);
        registry.requests.insert(SipMethod::Bye, parse_bye);

        registry.responses.insert("INVITE", parse_invite_response);
        registry.responses.insert("MESSAGE", parse_message_response);
        registry.responses.insert("BYE", parse_bye_response);

        registry.register_command("Notify", "Keepalive", parse_keepalive_cmd);
        registry.register_command("Query", "Catalog", parse_catalog_query_cmd);
        registry.register_command("Response", "Catalog", parse_catalog_response_cmd);
        registry.register_command("Response", "DeviceInfo", parse_device_info_cmd);
        registry.register_command("Response", "DeviceStatus", parse_device_status_cmd);

        registry
    }

    fn register_command(&mut self, category: &'static str, cmd: &'static str, f: CommandParser) {
        self.commands.entry(category).or_default().insert(cmd, f);
    }

    /// 分类入站请求
    pub fn classify_request(&self, req: &SipRequest) -> Result<RequestEvent> {
        let parser = self
            .requests
            .get(&req.method)
            .ok_or_else(|| SignalError::UnregisteredMethod(req.method.to_string()))?;
        parser(self, req)
    }

    /// 分类入站响应，按 CSeq 中的原始请求方法匹配
    pub fn classify_response(&self, resp: &SipResponse) -> Result<ResponseEvent> {
        let method = resp
            .cseq_method()
            .ok_or_else(|| SignalError::Parse("response missing CSeq method".to_string()))?;
        let parser = self
            .responses
            .get(method)
            .ok_or_else(|| SignalError::UnregisteredMethod(method.to_string()))?;
        parser(resp)
    }

    /// 分类 MESSAGE 消息体
    pub fn classify_command(&self, body: &str) -> Result<CommandEvent> {
        let (category, cmd_type) = xml::classify_body(body)
            .ok_or_else(|| SignalError::Parse("MESSAGE body is not MANSCDP XML".to_string()))?;
        let parser = self
            .commands
            .get(category.as_str())
            .and_then(|inner| inner.get(cmd_type.as_str()))
            .ok_or(SignalError::UnregisteredCommand {
                category: category.clone(),
                cmd_type: cmd_type.clone(),
            })?;
        parser(body)
    }
}

fn parse_register(_registry: &DispatchRegistry, req: &SipRequest) -> Result<RequestEvent> {
    let device_id = req
        .from_user()
        .ok_or_else(|| SignalError::Parse("REGISTER missing From user".to_string()))?;
    Ok(RequestEvent::Register(RegisterEvent {
        device_id,
        expires: req.expires(),
    }))
}

fn parse_message(registry: &DispatchRegistry, req: &SipRequest) -> Result<RequestEvent> {
    let body = req
        .body
        .as_deref()
        .ok_or_else(|| SignalError::Parse("MESSAGE without body".to_string()))?;
    // 命令表查找失败（UnregisteredCommand）原样向上传递
    registry.classify_command(body).map(RequestEvent::Message)
}

fn parse_ack(_registry: &DispatchRegistry, req: &SipRequest) -> Result<RequestEvent> {
    Ok(RequestEvent::Ack(AckEvent {
        call_id: req.call_id().map(str::to_string),
    }))
}

fn parse_bye(_registry: &DispatchRegistry, req: &SipRequest) -> Result<RequestEvent> {
    Ok(RequestEvent::Bye(ByeEvent {
        device_id: req.from_user(),
        call_id: req.call_id().map(str::to_string),
    }))
}

fn parse_invite_response(resp: &SipResponse) -> Result<ResponseEvent> {
    let ssrc = resp.body.as_deref().and_then(sdp::extract_ssrc);
    Ok(ResponseEvent::Invite(InviteResponseEvent {
        status_code: resp.status_code,
        channel_id: resp.to_user(),
        call_id: resp.call_id().map(str::to_string),
        from_tag: resp.tag_of("From"),
        to_tag: resp.tag_of("To"),
        cseq: resp.cseq_number(),
        ssrc,
    }))
}

fn parse_message_response(resp: &SipResponse) -> Result<ResponseEvent> {
    Ok(ResponseEvent::Plain {
        method: "MESSAGE",
        status: resp.status_code,
    })
}

fn parse_bye_response(resp: &SipResponse) -> Result<ResponseEvent> {
    Ok(ResponseEvent::Plain {
        method: "BYE",
        status: resp.status_code,
    })
}

fn parse_keepalive_cmd(body: &str) -> Result<CommandEvent> {
    Ok(CommandEvent::Keepalive(KeepaliveNotify::parse(body)?))
}

fn parse_catalog_query_cmd(body: &str) -> Result<CommandEvent> {
    Ok(CommandEvent::CatalogQuery(CatalogQueryCmd::parse(body)?))
}

fn parse_catalog_response_cmd(body: &str) -> Result<CommandEvent> {
    Ok(CommandEvent::CatalogResponse(CatalogResponse::parse(body)?))
}

fn parse_device_info_cmd(body: &str) -> Result<CommandEvent> {
    Ok(CommandEvent::DeviceInfo(DeviceInfoResponse::parse(body)?))
}

fn parse_device_status_cmd(body: &str) -> Result<CommandEvent> {
    Ok(CommandEvent::DeviceStatus(DeviceStatusResponse::parse(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_body(body: &str) -> SipRequest {
        let mut req = SipRequest::new(
            SipMethod::Message,
            "sip:34020000002000000001@3402000000".to_string(),
        );
        req.add_header(
            "From",
            "<sip:34020000001320000001@3402000000>;tag=1".to_string(),
        );
        req.set_body(body.to_string());
        req
    }

    #[test]
    fn test_classify_register() {
        let registry = DispatchRegistry::standard();
        let mut req = SipRequest::new(
            SipMethod::Register,
            "sip:34020000002000000001@3402000000".to_string(),
        );
        req.add_header(
            "From",
            "<sip:34020000001320000001@3402000000>;tag=1".to_string(),
        );
        req.add_header("Expires", "3600".to_string());

        match registry.classify_request(&req).unwrap() {
            RequestEvent::Register(ev) => {
                assert_eq!(ev.device_id, "34020000001320000001");
                assert_eq!(ev.expires, Some(3600));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_classify_keepalive_command() {
        let registry = DispatchRegistry::standard();
        let req = message_with_body(
            "<Notify><CmdType>Keepalive</CmdType><SN>1</SN><DeviceID>34020000001320000001</DeviceID></Notify>",
        );

        match registry.classify_request(&req).unwrap() {
            RequestEvent::Message(CommandEvent::Keepalive(keepalive)) => {
                assert_eq!(keepalive.device_id, "34020000001320000001");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_command_surfaces() {
        let registry = DispatchRegistry::standard();
        let req = message_with_body(
            "<Notify><CmdType>MediaStatus</CmdType><SN>1</SN><DeviceID>x</DeviceID></Notify>",
        );

        match registry.classify_request(&req) {
            Err(SignalError::UnregisteredCommand { category, cmd_type }) => {
                assert_eq!(category, "Notify");
                assert_eq!(cmd_type, "MediaStatus");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_method_surfaces() {
        let registry = DispatchRegistry::standard();
        let req = SipRequest::new(
            SipMethod::Subscribe,
            "sip:34020000002000000001@3402000000".to_string(),
        );
        assert!(matches!(
            registry.classify_request(&req),
            Err(SignalError::UnregisteredMethod(_))
        ));
    }

    #[test]
    fn test_classify_invite_response() {
        let registry = DispatchRegistry::standard();
        let mut resp = SipResponse::new(200, "OK");
        resp.add_header("CSeq", "1 INVITE".to_string());
        resp.add_header(
            "To",
            "<sip:34020000001310000001@3402000000>;tag=dev1".to_string(),
        );
        resp.add_header("Call-ID", "call-1".to_string());
        resp.set_body("v=0\r\no=x 0 0 IN IP4 1.2.3.4\r\ny=9000001\r\n".to_string());

        match registry.classify_response(&resp).unwrap() {
            ResponseEvent::Invite(ev) => {
                assert_eq!(ev.status_code, 200);
                assert_eq!(ev.channel_id.as_deref(), Some("34020000001310000001"));
                assert_eq!(ev.ssrc.as_deref(), Some("9000001"));
                assert_eq!(ev.to_tag.as_deref(), Some("dev1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
