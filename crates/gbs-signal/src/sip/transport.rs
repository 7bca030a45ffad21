// SIP 传输监听
// 同一地址端口同时监听 UDP 与 TCP，入站消息统一为 SipEvent 投递，
// 本层不做任何业务处理，解析失败与 IO 错误仅记录日志后丢弃

use super::message::SipMessage;
use crate::{Result, SignalError};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpSocket, TcpStream, UdpSocket};
use tokio::sync::{mpsc, Mutex};

/// 传输类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportKind {
    Udp,
    Tcp,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Udp => "UDP",
            TransportKind::Tcp => "TCP",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("TCP") {
            TransportKind::Tcp
        } else {
            TransportKind::Udp
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 入站信令事件
#[derive(Debug)]
pub struct SipEvent {
    pub message: SipMessage,
    pub source: SocketAddr,
    pub transport: TransportKind,
}

/// 出站发送句柄
///
/// UDP 直接 send_to；TCP 复用设备入站连接，无连接时主动建连
#[derive(Clone)]
pub struct SipSender {
    udp: Arc<UdpSocket>,
    tcp_conns: Arc<DashMap<SocketAddr, Arc<Mutex<OwnedWriteHalf>>>>,
    event_tx: mpsc::Sender<SipEvent>,
}

impl SipSender {
    pub async fn send(
        &self,
        data: &[u8],
        addr: SocketAddr,
        transport: TransportKind,
    ) -> Result<()> {
        match transport {
            TransportKind::Udp => {
                self.udp
                    .send_to(data, addr)
                    .await
                    .map_err(|e| SignalError::Transport(format!("udp send to {}: {}", addr, e)))?;
            }
            TransportKind::Tcp => {
                let conn = match self.tcp_conns.get(&addr) {
                    Some(conn) => conn.clone(),
                    None => self.connect_tcp(addr).await?,
                };
                let mut guard = conn.lock().await;
                if let Err(e) = guard.write_all(data).await {
                    drop(guard);
                    self.tcp_conns.remove(&addr);
                    return Err(SignalError::Transport(format!(
                        "tcp send to {}: {}",
                        addr, e
                    )));
                }
            }
        }
        Ok(())
    }

    /// 主动建立 TCP 连接并挂入读循环
    async fn connect_tcp(&self, addr: SocketAddr) -> Result<Arc<Mutex<OwnedWriteHalf>>> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        };
        let socket = socket.map_err(|e| SignalError::Transport(format!("tcp socket: {}", e)))?;
        let stream = socket
            .connect(addr)
            .await
            .map_err(|e| SignalError::Transport(format!("tcp connect {}: {}", addr, e)))?;

        let (read_half, write_half) = stream.into_split();
        let write_half = Arc::new(Mutex::new(write_half));
        self.tcp_conns.insert(addr, write_half.clone());

        let conns = self.tcp_conns.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tcp_read_loop(read_half, addr, event_tx).await;
            conns.remove(&addr);
        });

        Ok(write_half)
    }
}

/// SIP 传输监听器
pub struct SipListener {
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    event_tx: mpsc::Sender<SipEvent>,
    tcp_conns: Arc<DashMap<SocketAddr, Arc<Mutex<OwnedWriteHalf>>>>,
}

impl SipListener {
    /// 绑定监听地址，返回监听器、事件接收端与发送句柄
    ///
    /// UDP 先绑定，TCP 跟随其实际端口，保证两个传输落在同一端口上
    pub async fn bind(addr: &str) -> Result<(Self, mpsc::Receiver<SipEvent>, SipSender)> {
        let udp = Arc::new(UdpSocket::bind(addr).await?);
        let tcp = TcpListener::bind(udp.local_addr()?).await?;
        let (event_tx, event_rx) = mpsc::channel(1024);
        let tcp_conns: Arc<DashMap<SocketAddr, Arc<Mutex<OwnedWriteHalf>>>> =
            Arc::new(DashMap::new());

        tracing::info!(
            target: "gbs::sip",
            %addr,
            "SIP listener bound on UDP and TCP"
        );

        let sender = SipSender {
            udp: udp.clone(),
            tcp_conns: tcp_conns.clone(),
            event_tx: event_tx.clone(),
        };

        Ok((
            Self {
                udp,
                tcp,
                event_tx,
                tcp_conns,
            },
            event_rx,
            sender,
        ))
    }

    /// 实际绑定到的本地地址（测试中绑定端口 0 后取回）
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.udp.local_addr()?)
    }

    /// 启动接收循环，直到事件接收端被关闭
    pub async fn run(self) {
        let udp = self.udp.clone();
        let udp_tx = self.event_tx.clone();
        tokio::spawn(async move {
            udp_recv_loop(udp, udp_tx).await;
        });

        loop {
            match self.tcp.accept().await {
                Ok((stream, peer)) => {
                    self.spawn_tcp_conn(stream, peer);
                }
                Err(e) => {
                    tracing::error!(target: "gbs::sip", "tcp accept failed: {}", e);
                }
            }
        }
    }

    fn spawn_tcp_conn(&self, stream: TcpStream, peer: SocketAddr) {
        let (read_half, write_half) = stream.into_split();
        self.tcp_conns
            .insert(peer, Arc::new(Mutex::new(write_half)));

        let conns = self.tcp_conns.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tcp_read_loop(read_half, peer, event_tx).await;
            conns.remove(&peer);
        });
    }
}

async fn udp_recv_loop(udp: Arc<UdpSocket>, event_tx: mpsc::Sender<SipEvent>) {
    let mut buf = vec![0u8; 65536];
    loop {
        match udp.recv_from(&mut buf).await {
            Ok((len, source)) => {
                dispatch_raw(&buf[..len], source, TransportKind::Udp, &event_tx).await;
            }
            Err(e) => {
                tracing::error!(target: "gbs::sip", "udp recv failed: {}", e);
            }
        }
    }
}

/// TCP 读循环：按 Content-Length 对字节流切分出完整消息
async fn tcp_read_loop(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    peer: SocketAddr,
    event_tx: mpsc::Sender<SipEvent>,
) {
    let mut buf: Vec<u8> = Vec::with_capacity(8192);
    let mut chunk = vec![0u8; 8192];
    loop {
        match read_half.read(&mut chunk).await {
            Ok(0) => {
                tracing::debug!(target: "gbs::sip", %peer, "tcp connection closed");
                break;
            }
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                while let Some(frame_len) = complete_frame_len(&buf) {
                    let frame: Vec<u8> = buf.drain(..frame_len).collect();
                    dispatch_raw(&frame, peer, TransportKind::Tcp, &event_tx).await;
                }
            }
            Err(e) => {
                tracing::warn!(target: "gbs::sip", %peer, "tcp read failed: {}", e);
                break;
            }
        }
    }
}

/// 缓冲区中首个完整消息的长度；不完整时返回 None
fn complete_frame_len(buf: &[u8]) -> Option<usize> {
    let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let head = std::str::from_utf8(&buf[..head_end]).ok()?;
    let content_length = head
        .split("\r\n")
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("Content-Length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);

    let total = head_end + content_length;
    (buf.len() >= total).then_some(total)
}

async fn dispatch_raw(
    data: &[u8],
    source: SocketAddr,
    transport: TransportKind,
    event_tx: &mpsc::Sender<SipEvent>,
) {
    match SipMessage::from_bytes(data) {
        Ok(message) => {
            let event = SipEvent {
                message,
                source,
                transport,
            };
            if event_tx.send(event).await.is_err() {
                tracing::warn!(target: "gbs::sip", "event channel closed, dropping message");
            }
        }
        Err(e) => {
            tracing::warn!(
                target: "gbs::sip",
                %source,
                %transport,
                "failed to parse SIP message: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_frame_len() {
        let msg = b"MESSAGE sip:a@b SIP/2.0\r\nContent-Length: 4\r\n\r\nbody";
        assert_eq!(complete_frame_len(msg), Some(msg.len()));

        // 消息体尚未到齐
        let partial = b"MESSAGE sip:a@b SIP/2.0\r\nContent-Length: 10\r\n\r\nbody";
        assert_eq!(complete_frame_len(partial), None);

        // 粘包：只切出第一条
        let mut two = msg.to_vec();
        two.extend_from_slice(msg);
        assert_eq!(complete_frame_len(&two), Some(msg.len()));
    }

    #[tokio::test]
    async fn test_udp_event_delivery() {
        let (listener, mut rx, _sender) = SipListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let raw = b"REGISTER sip:34020000002000000001@3402000000 SIP/2.0\r\n\
                    From: <sip:34020000001320000001@3402000000>;tag=1\r\n\
                    Content-Length: 0\r\n\r\n";
        client.send_to(raw, addr).await.unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.transport, TransportKind::Udp);
        match event.message {
            SipMessage::Request(req) => {
                assert_eq!(req.method, super::super::message::SipMethod::Register)
            }
            SipMessage::Response(_) => panic!("expected request"),
        }
    }
}
