// 点播结果
// 一次成功邀请产生一个 StreamInfo，构造后不再变更

use crate::config::MediaConfig;
use serde::Serialize;

const APP: &str = "gb28181";

/// 各协议播放地址与流标识
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamInfo {
    /// 流标识（邀请应答中 y= 行携带的 SSRC）
    pub streamid: String,

    /// 流媒体服务器编号
    pub smsid: String,

    pub deviceid: String,
    pub channelid: String,
    pub channelname: String,

    pub flv: String,
    pub hls: String,
    pub rtmp: String,
    pub rtsp: String,
    pub webrtc: String,
    pub cdn: String,

    /// 实际媒体传输类型
    pub transport: String,

    // 统计字段由流媒体服务器异步填充，初始为零
    pub rtpcount: u64,
    pub rtplostcount: u64,
    pub rtplostrate: u32,
}

impl StreamInfo {
    /// 依据流媒体服务器配置合成各协议播放地址
    ///
    /// 流路径为 `deviceId@channelId`
    pub fn build(
        media: &MediaConfig,
        device_id: &str,
        channel_id: &str,
        stream_id: &str,
        transport: &str,
    ) -> Self {
        let stream = format!("{}@{}", device_id, channel_id);
        let scheme = media.http_scheme();

        Self {
            streamid: stream_id.to_string(),
            smsid: media.serial.clone(),
            deviceid: device_id.to_string(),
            channelid: channel_id.to_string(),
            channelname: String::new(),
            flv: format!(
                "{}://{}:{}/{}/{}.flv",
                scheme, media.host, media.port, APP, stream
            ),
            hls: format!(
                "{}://{}:{}/{}/{}.m3u8",
                scheme, media.host, media.port, APP, stream
            ),
            rtmp: format!(
                "rtmp://{}:{}/{}/{}",
                media.host, media.rtmp_port, APP, stream
            ),
            rtsp: format!("rtsp://{}:554/{}/{}", media.host, APP, stream),
            webrtc: format!(
                "webrtc://{}:{}/{}/{}",
                media.host, media.http_port, APP, stream
            ),
            cdn: format!(
                "rtmp://{}:{}/{}/{}",
                media.host, media.rtmp_port, APP, stream
            ),
            transport: transport.to_string(),
            rtpcount: 0,
            rtplostcount: 0,
            rtplostrate: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_from_media_config() {
        let media = MediaConfig {
            host: "media.example".to_string(),
            ..MediaConfig::default()
        };
        let info = StreamInfo::build(
            &media,
            "34020000001320000001",
            "34020000001310000001",
            "9000001",
            "UDP",
        );

        assert_eq!(info.streamid, "9000001");
        assert_eq!(
            info.flv,
            "http://media.example:8080/gb28181/34020000001320000001@34020000001310000001.flv"
        );
        assert_eq!(
            info.hls,
            "http://media.example:8080/gb28181/34020000001320000001@34020000001310000001.m3u8"
        );
        assert_eq!(
            info.rtmp,
            "rtmp://media.example:1935/gb28181/34020000001320000001@34020000001310000001"
        );
        assert_eq!(info.transport, "UDP");
    }
}
