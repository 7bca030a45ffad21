// GB28181 信令网关
// 消费传输层事件，驱动注册鉴权、心跳、目录同步、点播邀请与挂断，
// 并通过流媒体服务器控制接口预配/释放媒体通道。
//
// 每条入站消息独立处理，处理器自行捕获并记录协议错误，
// 单条畸形消息不会中断监听循环。

use crate::config::GatewayConfig;
use crate::correlate::{ResponseHolder, SlotValue, CALLBACK_CATALOG, CALLBACK_PLAY};
use crate::device::{Device, DeviceChannel, DeviceRegistry};
use crate::dialog::{Dialog, DialogStore};
use crate::error::{Result, SignalError};
use crate::media::MediaClient;
use crate::sdp::{build_invite_sdp, StreamMode};
use crate::sip::auth;
use crate::sip::dispatch::{
    ByeEvent, CommandEvent, DispatchRegistry, InviteResponseEvent, RegisterEvent, RequestEvent,
    ResponseEvent,
};
use crate::sip::message::{SipMessage, SipMethod, SipRequest, SipResponse};
use crate::sip::transport::{SipEvent, SipListener, SipSender, TransportKind};
use crate::stream::StreamInfo;
use crate::xml;
use dashmap::DashMap;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// 点播请求参数
#[derive(Debug, Default, Clone)]
pub struct PlayParams {
    /// 流传输覆盖（UDP/TCP），未指定时取设备配置
    pub transport: Option<String>,

    /// TCP 主被动（active/passive），默认被动
    pub transport_mode: Option<String>,

    /// 邀请应答超时，未指定时 15 秒
    pub timeout: Option<Duration>,
}

/// 已发出、尚未应答的邀请上下文
#[derive(Debug, Clone)]
struct PendingInvite {
    device_id: String,
    channel_id: String,
    call_id: String,
    ssrc: String,
    transport: TransportKind,
    request_uri: String,
    from_tag: String,
    cseq: u32,
}

/// 信令网关
pub struct SipGateway {
    config: GatewayConfig,
    local_addr: SocketAddr,
    dispatch: DispatchRegistry,
    devices: Arc<DeviceRegistry>,
    holder: Arc<ResponseHolder>,
    dialogs: Arc<DialogStore>,
    media: MediaClient,
    sender: SipSender,
    /// Call-ID -> 未决邀请
    invites: DashMap<String, PendingInvite>,
}

impl SipGateway {
    /// 绑定监听地址并启动接收与处理循环
    pub async fn start(config: GatewayConfig) -> Result<Arc<Self>> {
        let (listener, event_rx, sender) = SipListener::bind(&config.sip.bind_addr()).await?;
        let local_addr = listener.local_addr()?;

        let media = MediaClient::new(config.media.clone());
        let gateway = Arc::new(Self {
            config,
            local_addr,
            dispatch: DispatchRegistry::standard(),
            devices: Arc::new(DeviceRegistry::new()),
            holder: Arc::new(ResponseHolder::new()),
            dialogs: Arc::new(DialogStore::new()),
            media,
            sender,
            invites: DashMap::new(),
        });

        tokio::spawn(listener.run());

        let worker = gateway.clone();
        tokio::spawn(async move {
            worker.event_loop(event_rx).await;
        });

        tracing::info!(
            target: "gbs::gateway",
            addr = %gateway.local_addr,
            serial = %gateway.config.sip.serial,
            "signaling gateway started"
        );

        Ok(gateway)
    }

    /// 实际监听地址（配置端口 0 时为系统分配端口）
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn dialogs(&self) -> &DialogStore {
        &self.dialogs
    }

    pub fn holder(&self) -> &ResponseHolder {
        &self.holder
    }

    /// 事件主循环：逐条并发处理，处理器错误只记录
    async fn event_loop(self: Arc<Self>, mut event_rx: mpsc::Receiver<SipEvent>) {
        while let Some(event) = event_rx.recv().await {
            let gateway = self.clone();
            tokio::spawn(async move {
                if let Err(e) = gateway.handle_event(event).await {
                    tracing::error!(target: "gbs::gateway", "handle event failed: {}", e);
                }
            });
        }
    }

    async fn handle_event(self: Arc<Self>, event: SipEvent) -> Result<()> {
        match event.message {
            SipMessage::Request(req) => {
                self.handle_request(req, event.source, event.transport).await
            }
            SipMessage::Response(resp) => {
                self.handle_response(resp, event.source, event.transport)
                    .await
            }
        }
    }

    async fn handle_request(
        self: Arc<Self>,
        req: SipRequest,
        source: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        let classified = match self.dispatch.classify_request(&req) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    target: "gbs::gateway",
                    %source,
                    method = %req.method,
                    "unhandled request: {}",
                    e
                );
                // MESSAGE 类请求按协议仍需应答，业务结果与应答无关
                if req.method == SipMethod::Message {
                    self.ack_request(&req, source, transport).await?;
                }
                return Ok(());
            }
        };

        match classified {
            RequestEvent::Register(event) => {
                self.handle_register(event, &req, source, transport).await
            }
            RequestEvent::Message(command) => {
                self.handle_command(command, &req, source, transport).await
            }
            RequestEvent::Ack(event) => {
                tracing::debug!(
                    target: "gbs::gateway",
                    call_id = event.call_id.as_deref().unwrap_or(""),
                    "ACK received"
                );
                Ok(())
            }
            RequestEvent::Bye(event) => {
                self.handle_device_bye(event, &req, source, transport).await
            }
        }
    }

    /// 处理 REGISTER：鉴权、建档/刷新、注销，成功且非注销时触发目录同步
    async fn handle_register(
        self: Arc<Self>,
        event: RegisterEvent,
        req: &SipRequest,
        source: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        let device_id = event.device_id.clone();

        // 设备级密码覆盖全局密码
        let password = self
            .devices
            .get(&device_id)
            .map(|d| d.password.clone())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.config.sip.password.clone());

        if !auth::authenticate(req, &password) {
            // 鉴权失败：回挑战，不建档不刷新
            let mut resp = SipResponse::for_request(401, "Unauthorized", req);
            resp.add_header(
                "WWW-Authenticate",
                auth::generate_challenge(&self.config.sip.realm),
            );
            self.send_response(resp, source, transport).await?;
            tracing::info!(
                target: "gbs::gateway",
                %device_id,
                remote = %source,
                "REGISTER challenged"
            );
            return Ok(());
        }

        let expires = event.expires.unwrap_or(3600);
        let outcome = self.devices.register_or_update(
            &device_id,
            source.ip().to_string(),
            source.port(),
            transport,
            expires,
            &self.config.sip.password,
        );

        let mut resp = SipResponse::for_request(200, "OK", req);
        resp.add_header("Date", chrono::Utc::now().to_rfc2822());
        resp.add_header("Expires", expires.to_string());
        self.send_response(resp, source, transport).await?;
        tracing::info!(
            target: "gbs::gateway",
            %device_id,
            remote = %source,
            expires,
            "REGISTER accepted"
        );

        if !outcome.unregistered {
            // 注册（含鉴权）完成后才发起目录查询
            let gateway = self.clone();
            tokio::spawn(async move {
                if let Err(e) = gateway.catalog_query(&device_id, None).await {
                    tracing::warn!(
                        target: "gbs::gateway",
                        %device_id,
                        "catalog refresh after register failed: {}",
                        e
                    );
                }
            });
        }

        Ok(())
    }

    /// 处理 MESSAGE 命令事件
    async fn handle_command(
        &self,
        command: CommandEvent,
        req: &SipRequest,
        source: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        match command {
            CommandEvent::Keepalive(keepalive) => {
                if self.devices.touch_keepalive(&keepalive.device_id) {
                    self.ack_request(req, source, transport).await?;
                    tracing::debug!(
                        target: "gbs::gateway",
                        device_id = %keepalive.device_id,
                        "keepalive"
                    );
                } else {
                    // 未注册设备的心跳：告知对端不存在
                    let resp = SipResponse::for_request(404, "Not Found", req);
                    self.send_response(resp, source, transport).await?;
                    tracing::warn!(
                        target: "gbs::gateway",
                        device_id = %keepalive.device_id,
                        "keepalive from unknown device"
                    );
                }
            }
            CommandEvent::CatalogQuery(query) => {
                // 上级目录查询只应答，不提供平台目录
                self.ack_request(req, source, transport).await?;
                tracing::debug!(
                    target: "gbs::gateway",
                    device_id = %query.device_id,
                    sn = query.sn,
                    "catalog query acknowledged"
                );
            }
            CommandEvent::CatalogResponse(response) => {
                // 应答与关联彼此独立：先按协议确认收到
                self.ack_request(req, source, transport).await?;
                self.on_catalog_response(response);
            }
            CommandEvent::DeviceInfo(info) => {
                self.ack_request(req, source, transport).await?;
                self.devices.apply_device_info(
                    &info.device_id,
                    &info.device_name,
                    &info.manufacturer,
                    &info.model,
                    &info.firmware,
                    info.channel,
                );
            }
            CommandEvent::DeviceStatus(status) => {
                self.ack_request(req, source, transport).await?;
                let online = status.is_online();
                self.devices.apply_device_status(&status.device_id, online);
            }
        }
        Ok(())
    }

    /// 目录响应：分片累积，达到声明总数后完成关联槽位
    fn on_catalog_response(&self, response: xml::CatalogResponse) {
        let span = tracing::info_span!(
            "gbs.catalog_response",
            device_id = %response.device_id,
            sn = response.sn,
            sum_num = response.sum_num,
            items = response.items().len(),
        );
        let _enter = span.enter();

        let channels: Vec<DeviceChannel> = response
            .items()
            .iter()
            .map(|item| DeviceChannel {
                device_id: response.device_id.clone(),
                channel_id: item.device_id.clone(),
                name: item.name.clone(),
                manufacturer: item.manufacturer.clone(),
                model: item.model.clone(),
                owner: item.owner.clone(),
                civil_code: item.civil_code.clone(),
                address: item.address.clone(),
                parental: item.parental,
                parent_id: item.parent_id.clone(),
                safety_way: item.safety_way,
                register_way: item.register_way,
                secrecy: item.secrecy,
                status: item.status.clone(),
                longitude: item.longitude,
                latitude: item.latitude,
            })
            .collect();

        // 通道随到随存；关联槽位只负责把完整列表交给等待方
        self.devices.upsert_channels(channels.clone());

        let sn = response.sn.to_string();
        if self
            .holder
            .accumulate(CALLBACK_CATALOG, &sn, channels, response.sum_num)
        {
            self.holder.resolve_accumulated(CALLBACK_CATALOG, &sn);
            tracing::info!(target: "gbs::gateway", "catalog complete");
        }
    }

    /// 设备侧 BYE：记录并应答
    async fn handle_device_bye(
        &self,
        event: ByeEvent,
        req: &SipRequest,
        source: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        tracing::info!(
            target: "gbs::gateway",
            device_id = event.device_id.as_deref().unwrap_or(""),
            call_id = event.call_id.as_deref().unwrap_or(""),
            "BYE from device"
        );
        self.ack_request(req, source, transport).await
    }

    /// 处理入站响应
    async fn handle_response(
        &self,
        resp: SipResponse,
        source: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        if resp.status_code >= 300 {
            tracing::warn!(
                target: "gbs::gateway",
                status = resp.status_code,
                method = resp.cseq_method().unwrap_or(""),
                %source,
                "failure response"
            );
            // 失败的邀请不再等待，回收上下文；等待方按超时失败
            if resp.cseq_method() == Some("INVITE") {
                if let Some(call_id) = resp.call_id() {
                    self.invites.remove(call_id);
                }
            }
            return Ok(());
        }

        match self.dispatch.classify_response(&resp)? {
            ResponseEvent::Invite(event) => {
                self.on_invite_response(event, source, transport).await
            }
            ResponseEvent::Plain { method, status } => {
                tracing::debug!(target: "gbs::gateway", %method, status, "response");
                Ok(())
            }
        }
    }

    /// 邀请 2xx 应答：先按协议回 ACK，再完成关联并登记对话
    async fn on_invite_response(
        &self,
        event: InviteResponseEvent,
        source: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        if !(200..300).contains(&event.status_code) {
            // 1xx 临时应答无需处理
            return Ok(());
        }

        let Some(call_id) = event.call_id.clone() else {
            tracing::warn!(target: "gbs::gateway", "invite response without Call-ID");
            return Ok(());
        };
        let Some((_, pending)) = self.invites.remove(&call_id) else {
            tracing::warn!(
                target: "gbs::gateway",
                %call_id,
                "invite response without pending invite"
            );
            return Ok(());
        };

        // 任何更高层处理之前先确认应答
        self.send_invite_ack(&pending, &event, source, transport)
            .await?;

        let stream_id = event.ssrc.clone().unwrap_or_else(|| pending.ssrc.clone());
        let info = StreamInfo::build(
            self.media.config(),
            &pending.device_id,
            &pending.channel_id,
            &stream_id,
            pending.transport.as_str(),
        );

        let subscribe_id = format!("{}@{}", pending.device_id, pending.channel_id);
        self.holder
            .resolve(CALLBACK_PLAY, &subscribe_id, SlotValue::Stream(info));

        self.dialogs.put(Dialog {
            device_id: pending.device_id.clone(),
            channel_id: pending.channel_id.clone(),
            call_id,
            from_tag: pending.from_tag.clone(),
            to_tag: event.to_tag.unwrap_or_default(),
            cseq: event.cseq.unwrap_or(pending.cseq),
            transport,
            remote_addr: source.to_string(),
            request_uri: pending.request_uri.clone(),
            established_at: chrono::Utc::now(),
        });

        tracing::info!(
            target: "gbs::gateway",
            device_id = %pending.device_id,
            channel_id = %pending.channel_id,
            %stream_id,
            "invite accepted"
        );
        Ok(())
    }

    async fn send_invite_ack(
        &self,
        pending: &PendingInvite,
        event: &InviteResponseEvent,
        source: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        let mut ack = SipRequest::new(SipMethod::Ack, pending.request_uri.clone());
        ack.add_header("Via", self.via_header(transport));
        ack.add_header(
            "From",
            format!(
                "<sip:{}@{}>;tag={}",
                self.config.sip.serial, self.config.sip.realm, pending.from_tag
            ),
        );
        let mut to = format!("<sip:{}@{}>", pending.channel_id, self.config.sip.realm);
        if let Some(tag) = &event.to_tag {
            to.push_str(&format!(";tag={}", tag));
        }
        ack.add_header("To", to);
        ack.add_header("Call-ID", pending.call_id.clone());
        ack.add_header("CSeq", format!("{} ACK", pending.cseq));
        ack.add_header("Max-Forwards", "70".to_string());

        self.send_request(&ack, source, transport).await
    }

    // ------------------------------------------------------------------
    // 主动操作
    // ------------------------------------------------------------------

    /// 目录查询：注册关联槽位、下发 Query/Catalog、等待分片齐全
    ///
    /// 超时未指定时使用配置的 ack_timeout
    pub async fn catalog_query(
        &self,
        device_id: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<DeviceChannel>> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| SignalError::DeviceNotFound(device_id.to_string()))?;

        // 8 位伪随机序列号
        let sn: u32 = rand::thread_rng().gen_range(10_000_000..100_000_000);

        // 先注册槽位再发送，避免应答先于注册到达
        let pending = self.holder.register(CALLBACK_CATALOG, &sn.to_string());

        let body = xml::build_catalog_query(sn, device_id);
        let req = self.manscdp_request(&device, sn, body);
        self.send_request(&req, device.remote_socket_addr()?, device.command_transport)
            .await?;
        tracing::info!(target: "gbs::gateway", %device_id, sn, "catalog query sent");

        let timeout = timeout.unwrap_or_else(|| Duration::from_secs(self.config.sip.ack_timeout));
        match self.holder.wait(pending, timeout).await? {
            SlotValue::Channels(channels) => Ok(channels),
            SlotValue::Stream(_) => Err(SignalError::Other(
                "catalog slot resolved with stream value".to_string(),
            )),
        }
    }

    /// 点播：预配媒体通道、注册槽位、协商模式、下发邀请、等待应答
    pub async fn play_stream(
        &self,
        device_id: &str,
        channel_id: &str,
        params: PlayParams,
    ) -> Result<StreamInfo> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| SignalError::DeviceNotFound(device_id.to_string()))?;

        // 1. 预配媒体通道，失败即整体失败
        let created = self.media.create_channel(device_id, channel_id).await?;

        // 2. 发送邀请前注册槽位，防止应答与注册竞态
        let subscribe_id = format!("{}@{}", device_id, channel_id);
        let pending = self.holder.register(CALLBACK_PLAY, &subscribe_id);

        // 3. 生效流模式：请求覆盖 > 设备配置
        let mode = StreamMode::negotiate(
            params.transport.as_deref(),
            params.transport_mode.as_deref(),
            &device.media_transport,
        );

        // 4. 构造会话描述
        let media_port = if created.rtp_port > 0 {
            created.rtp_port
        } else {
            self.config.media.rtp_mux_port
        };
        let sdp = build_invite_sdp(
            channel_id,
            &self.config.sip.ip,
            media_port,
            mode,
            self.config.sip.senior_sdp,
            created.ssrc,
        );

        // 5. 构造并发送邀请
        let transport = mode.transport_kind();
        let remote_addr = device.remote_socket_addr()?;
        let tm = chrono::Utc::now().timestamp_millis();
        let call_id = format!(
            "{}{}@{}",
            tm,
            rand::thread_rng().gen_range(100..1000),
            self.config.sip.realm
        );
        let from_tag = format!("FromInvt{}", tm);
        let request_uri = format!("sip:{}@{}", channel_id, device.remote_addr());

        let mut invite = SipRequest::new(SipMethod::Invite, request_uri.clone());
        invite.add_header("Via", self.via_header(transport));
        invite.add_header(
            "From",
            format!(
                "<sip:{}@{}>;tag={}",
                self.config.sip.serial,
                self.gateway_host(),
                from_tag
            ),
        );
        invite.add_header(
            "To",
            format!("<sip:{}@{}>", channel_id, self.config.sip.realm),
        );
        invite.add_header("Call-ID", call_id.clone());
        invite.add_header("CSeq", "1 INVITE".to_string());
        invite.add_header(
            "Contact",
            format!("<sip:{}@{}>", self.config.sip.serial, self.gateway_host()),
        );
        invite.add_header("Max-Forwards", "70".to_string());
        invite.add_header(
            "Subject",
            format!("{}:{},{}:0", channel_id, created.ssrc, self.config.sip.serial),
        );
        invite.add_header("Content-Type", "APPLICATION/SDP".to_string());
        invite.set_body(sdp);

        self.invites.insert(
            call_id.clone(),
            PendingInvite {
                device_id: device_id.to_string(),
                channel_id: channel_id.to_string(),
                call_id: call_id.clone(),
                ssrc: created.ssrc.to_string(),
                transport,
                request_uri,
                from_tag,
                cseq: 1,
            },
        );

        if let Err(e) = self.send_request(&invite, remote_addr, transport).await {
            self.invites.remove(&call_id);
            return Err(e);
        }
        tracing::info!(
            target: "gbs::gateway",
            %device_id,
            %channel_id,
            %mode,
            ssrc = created.ssrc,
            "invite sent"
        );

        // 6. 等待应答；超时回收未决邀请并释放已预配的媒体通道
        let timeout = params.timeout.unwrap_or(Duration::from_secs(15));
        match self.holder.wait(pending, timeout).await {
            Ok(SlotValue::Stream(info)) => Ok(info),
            Ok(SlotValue::Channels(_)) => Err(SignalError::Other(
                "play slot resolved with catalog value".to_string(),
            )),
            Err(e) => {
                self.invites.remove(&call_id);
                let media = self.media.clone();
                let device_id = device_id.to_string();
                let channel_id = channel_id.to_string();
                tokio::spawn(async move {
                    media.delete_channel(&device_id, &channel_id).await;
                });
                Err(e)
            }
        }
    }

    /// 停流：按对话上下文下发 BYE，并尽力通知媒体服务器删除通道
    ///
    /// 两步互相独立：删除通道失败不回滚信令挂断
    pub async fn stop_stream(&self, device_id: &str, channel_id: &str) -> Result<()> {
        let Some(dialog) = self.dialogs.remove(device_id, channel_id) else {
            tracing::info!(
                target: "gbs::gateway",
                %device_id,
                %channel_id,
                "no dialog to tear down"
            );
            return Err(SignalError::DialogNotFound {
                device_id: device_id.to_string(),
                channel_id: channel_id.to_string(),
            });
        };

        let mut bye = SipRequest::new(SipMethod::Bye, dialog.request_uri.clone());
        bye.add_header("Via", self.via_header(dialog.transport));
        bye.add_header(
            "From",
            format!(
                "<sip:{}@{}>;tag={}",
                self.config.sip.serial, self.config.sip.realm, dialog.from_tag
            ),
        );
        let mut to = format!("<sip:{}@{}>", channel_id, self.config.sip.realm);
        if !dialog.to_tag.is_empty() {
            to.push_str(&format!(";tag={}", dialog.to_tag));
        }
        bye.add_header("To", to);
        bye.add_header("Call-ID", dialog.call_id.clone());
        bye.add_header("CSeq", format!("{} BYE", dialog.cseq + 1));
        bye.add_header("Max-Forwards", "70".to_string());

        let remote: SocketAddr = dialog
            .remote_addr
            .parse()
            .map_err(|e| SignalError::Transport(format!("dialog remote addr: {}", e)))?;
        self.send_request(&bye, remote, dialog.transport).await?;
        tracing::info!(
            target: "gbs::gateway",
            %device_id,
            %channel_id,
            "BYE sent"
        );

        // 独立的尽力通知
        let media = self.media.clone();
        let device_id = device_id.to_string();
        let channel_id = channel_id.to_string();
        tokio::spawn(async move {
            media.delete_channel(&device_id, &channel_id).await;
        });

        Ok(())
    }

    /// 云台控制触点：下发 Control/DeviceControl 指令
    pub async fn ptz_control(
        &self,
        device_id: &str,
        channel_id: &str,
        command: &str,
        speed: Option<u8>,
    ) -> Result<()> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| SignalError::DeviceNotFound(device_id.to_string()))?;

        let cmd = ptz_command_code(command, speed.unwrap_or(129))
            .ok_or_else(|| SignalError::Other(format!("unknown ptz command: {}", command)))?;

        let sn: u32 = rand::thread_rng().gen_range(10_000_000..100_000_000);
        let body = xml::build_device_control(sn, channel_id, &cmd);
        let req = self.manscdp_request(&device, sn, body);
        self.send_request(&req, device.remote_socket_addr()?, device.command_transport)
            .await?;

        tracing::info!(
            target: "gbs::gateway",
            %device_id,
            %channel_id,
            %command,
            "ptz command sent"
        );
        Ok(())
    }

    /// 下发 Query/DeviceInfo，结果经响应处理更新注册表
    pub async fn query_device_info(&self, device_id: &str) -> Result<()> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| SignalError::DeviceNotFound(device_id.to_string()))?;
        let sn: u32 = rand::thread_rng().gen_range(10_000_000..100_000_000);
        let body = xml::build_device_info_query(sn, device_id);
        let req = self.manscdp_request(&device, sn, body);
        self.send_request(&req, device.remote_socket_addr()?, device.command_transport)
            .await
    }

    /// 下发 Query/DeviceStatus
    pub async fn query_device_status(&self, device_id: &str) -> Result<()> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| SignalError::DeviceNotFound(device_id.to_string()))?;
        let sn: u32 = rand::thread_rng().gen_range(10_000_000..100_000_000);
        let body = xml::build_device_status_query(sn, device_id);
        let req = self.manscdp_request(&device, sn, body);
        self.send_request(&req, device.remote_socket_addr()?, device.command_transport)
            .await
    }

    // ------------------------------------------------------------------
    // 发送辅助
    // ------------------------------------------------------------------

    /// 构造携带 MANSCDP 体的 MESSAGE 请求
    fn manscdp_request(&self, device: &Device, sn: u32, body: String) -> SipRequest {
        let mut req = SipRequest::new(
            SipMethod::Message,
            format!("sip:{}@{}", device.id, device.remote_addr()),
        );
        req.add_header("Via", self.via_header(device.command_transport));
        req.add_header(
            "From",
            format!(
                "<sip:{}@{}>;tag=FromCat{}",
                self.config.sip.serial,
                self.config.sip.realm,
                chrono::Utc::now().timestamp_millis()
            ),
        );
        req.add_header(
            "To",
            format!("<sip:{}@{}>", device.id, self.config.sip.realm),
        );
        req.add_header("Call-ID", format!("{}@{}", sn, self.config.sip.realm));
        req.add_header("CSeq", format!("{} MESSAGE", sn));
        req.add_header("Content-Type", "Application/MANSCDP+xml".to_string());
        req.add_header("Max-Forwards", "70".to_string());
        req.set_body(body);
        req
    }

    /// 网关对外地址：配置 IP 加实际监听端口
    fn gateway_host(&self) -> String {
        format!("{}:{}", self.config.sip.ip, self.local_addr.port())
    }

    fn via_header(&self, transport: TransportKind) -> String {
        format!(
            "SIP/2.0/{} {};rport;branch=z9hG4bK{}",
            transport,
            self.gateway_host(),
            chrono::Utc::now().timestamp_millis()
        )
    }

    /// 以 200 OK 确认请求
    async fn ack_request(
        &self,
        req: &SipRequest,
        source: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        let resp = SipResponse::for_request(200, "OK", req);
        self.send_response(resp, source, transport).await
    }

    async fn send_response(
        &self,
        resp: SipResponse,
        addr: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        self.sender.send(&resp.to_bytes(), addr, transport).await?;
        tracing::debug!(
            target: "gbs::gateway",
            %addr,
            status = resp.status_code,
            "response sent"
        );
        Ok(())
    }

    async fn send_request(
        &self,
        req: &SipRequest,
        addr: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        self.sender.send(&req.to_bytes(), addr, transport).await?;
        tracing::debug!(
            target: "gbs::gateway",
            %addr,
            method = %req.method,
            "request sent"
        );
        Ok(())
    }
}

/// GB28181 A.3 云台指令编码（单触点，8 字节指令串）
///
/// 字节 4 为方向/变倍位，5、6 为水平与垂直速度，7 高四位为变倍速度，
/// 8 为前七字节校验和
fn ptz_command_code(command: &str, speed: u8) -> Option<String> {
    let (cmd, pan, tilt, zoom): (u8, u8, u8, u8) = match command {
        "left" => (0x02, speed, 0, 0),
        "right" => (0x01, speed, 0, 0),
        "up" => (0x08, 0, speed, 0),
        "down" => (0x04, 0, speed, 0),
        "upleft" => (0x0A, speed, speed, 0),
        "upright" => (0x09, speed, speed, 0),
        "downleft" => (0x06, speed, speed, 0),
        "downright" => (0x05, speed, speed, 0),
        "zoomin" => (0x10, 0, 0, 1),
        "zoomout" => (0x20, 0, 0, 1),
        "stop" => (0x00, 0, 0, 0),
        _ => return None,
    };

    let bytes = [0xA5u8, 0x0F, 0x01, cmd, pan, tilt, zoom << 4];
    let checksum = bytes.iter().fold(0u32, |acc, b| acc + *b as u32) % 256;

    let mut code = String::with_capacity(16);
    for b in bytes {
        code.push_str(&format!("{:02X}", b));
    }
    code.push_str(&format!("{:02X}", checksum));
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ptz_command_code() {
        // A5 0F 01 02 81 00 00 -> 校验和 0x38
        let code = ptz_command_code("left", 0x81).unwrap();
        assert_eq!(code, "A50F010281000038");

        let stop = ptz_command_code("stop", 0).unwrap();
        assert_eq!(stop.len(), 16);
        assert!(stop.starts_with("A50F0100"));

        assert!(ptz_command_code("sideways", 10).is_none());
    }

    #[test]
    fn test_play_params_default() {
        let params = PlayParams::default();
        assert!(params.transport.is_none());
        assert!(params.timeout.is_none());
    }
}
