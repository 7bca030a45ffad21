// gbs-gatewayd: GB28181 信令网关守护进程
// 加载配置，启动 SIP 信令网关与操作员 HTTP API

use clap::Parser;
use gbs_api::{create_router, AppState};
use gbs_signal::{GatewayConfig, SipGateway};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 配置文件路径（TOML）
    #[arg(long, default_value = "./config/gateway.toml")]
    config: String,

    /// HTTP API 监听地址
    #[arg(long, default_value = "0.0.0.0:8081")]
    http_bind: String,

    /// SIP 监听 IP，覆盖配置文件
    #[arg(long)]
    sip_ip: Option<String>,

    /// SIP 监听端口，覆盖配置文件
    #[arg(long)]
    sip_port: Option<u16>,

    /// 设备注册密码，覆盖配置文件
    #[arg(long)]
    password: Option<String>,
}

fn load_config(path: &str) -> GatewayConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(target: "gatewayd", %path, "config parse failed, using defaults: {}", e);
                GatewayConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(target: "gatewayd", %path, "config not readable, using defaults: {}", e);
            GatewayConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(&args.config);
    if let Some(ip) = args.sip_ip {
        config.sip.ip = ip;
    }
    if let Some(port) = args.sip_port {
        config.sip.port = port;
    }
    if let Some(password) = args.password {
        config.sip.password = password;
    }

    tracing::info!(
        target: "gatewayd",
        sip = %config.sip.bind_addr(),
        media = %config.media.api_base(),
        "starting gateway"
    );

    let gateway = SipGateway::start(config).await?;

    let router = create_router(AppState::new(gateway));
    let listener = tokio::net::TcpListener::bind(&args.http_bind).await?;
    tracing::info!(target: "gatewayd", http = %args.http_bind, "http api listening");
    axum::serve(listener, router).await?;

    Ok(())
}
