// 流媒体服务器控制接口客户端
// 点播前按 `设备编号@通道编号` 建立媒体通道取得 SSRC 与收流端口，
// 停流时删除通道；删除属尽力通知，结果只记日志

use crate::config::MediaConfig;
use crate::error::{Result, SignalError};
use serde::Deserialize;
use std::time::Duration;

const APP: &str = "gb28181";

/// create_channel 应答中的 query 对象
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateChannelResp {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub ip: String,

    #[serde(default)]
    pub app: String,

    #[serde(default)]
    pub stream: String,

    /// 服务器分配的同步源标识
    #[serde(default)]
    pub ssrc: u32,

    /// 服务器实际收流端口
    #[serde(default)]
    pub rtp_port: u16,

    #[serde(default)]
    pub port_mode: String,

    #[serde(default)]
    pub rtmp_url: String,

    #[serde(default)]
    pub flv_url: String,

    #[serde(default)]
    pub hls_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i32,

    #[serde(default)]
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(default)]
    query: Option<CreateChannelResp>,
}

/// 控制接口客户端
#[derive(Clone)]
pub struct MediaClient {
    http: reqwest::Client,
    config: MediaConfig,
}

impl MediaClient {
    pub fn new(config: MediaConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { http, config }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// 建立媒体通道，应答 code 非零视为预配失败
    pub async fn create_channel(
        &self,
        device_id: &str,
        channel_id: &str,
    ) -> Result<CreateChannelResp> {
        let stream = format!("{}@{}", device_id, channel_id);
        let url = format!(
            "{}/api/v1/{}?action=create_channel&id={}&stream={}&port_mode=fixed&app={}",
            self.config.api_base(),
            APP,
            stream,
            stream,
            APP
        );

        let resp: ApiResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SignalError::UpstreamProvisionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| SignalError::UpstreamProvisionFailed(e.to_string()))?;

        if resp.code != 0 {
            return Err(SignalError::UpstreamProvisionFailed(format!(
                "create_channel for {} returned code {}",
                stream, resp.code
            )));
        }

        resp.data
            .and_then(|d| d.query)
            .ok_or_else(|| {
                SignalError::UpstreamProvisionFailed(format!(
                    "create_channel for {} returned no query object",
                    stream
                ))
            })
    }

    /// 删除媒体通道，尽力通知：任何结果只记日志，从不向调用方传播
    pub async fn delete_channel(&self, device_id: &str, channel_id: &str) {
        let url = format!(
            "{}/api/v1/{}?action=delete_channel&id={}&chid={}",
            self.config.api_base(),
            APP,
            device_id,
            channel_id
        );

        match self.http.get(&url).send().await {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::info!(
                    target: "gbs::media",
                    %device_id,
                    %channel_id,
                    %status,
                    "delete_channel result: {}",
                    body
                );
            }
            Err(e) => {
                tracing::warn!(
                    target: "gbs::media",
                    %device_id,
                    %channel_id,
                    "delete_channel request failed: {}",
                    e
                );
            }
        }
    }
}
