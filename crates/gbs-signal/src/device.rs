// 设备与通道注册表
// 设备按国标编号作键并发 upsert，通道随目录响应整批 upsert、按通道编号替换，
// 注销（expires <= 0）只置离线，记录不删除

use crate::error::{Result, SignalError};
use crate::sip::transport::TransportKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;

/// 已注册设备
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    /// 设备国标编号（20 位），创建后不变
    pub id: String,

    /// 设备名称
    pub name: String,

    /// 制造商
    pub manufacturer: String,

    /// 设备类型标记
    pub device_type: String,

    /// 通道数量
    pub channel_count: u32,

    /// 固件版本
    pub firmware: String,

    /// 型号
    pub model: String,

    /// 首选流媒体服务器编号，空表示使用全局配置
    pub sms_id: Option<String>,

    /// 目录刷新间隔（秒）
    pub catalog_interval: u32,

    /// 订阅刷新间隔（秒）
    pub subscribe_interval: u32,

    pub catalog_subscribe: bool,
    pub alarm_subscribe: bool,
    pub position_subscribe: bool,

    /// 在线标记：仅在鉴权成功后置真，注销时置假
    pub online: bool,

    /// 设备级密码，覆盖全局注册密码
    #[serde(skip_serializing)]
    pub password: String,

    /// 信令传输类型
    pub command_transport: TransportKind,

    /// 媒体传输偏好（UDP/TCP）
    pub media_transport: String,

    /// 设备远端地址
    pub remote_ip: String,
    pub remote_port: u16,

    pub longitude: f64,
    pub latitude: f64,

    pub last_register_at: DateTime<Utc>,
    pub last_keepalive_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.remote_ip, self.remote_port)
    }

    pub fn remote_socket_addr(&self) -> Result<SocketAddr> {
        self.remote_addr()
            .parse()
            .map_err(|e| SignalError::Transport(format!("device {} remote addr: {}", self.id, e)))
    }
}

/// 设备通道（摄像头）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceChannel {
    /// 所属设备编号
    pub device_id: String,

    /// 通道国标编号，设备内唯一
    pub channel_id: String,

    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub owner: String,

    /// 行政区划编码
    pub civil_code: String,

    pub address: String,

    /// 是否有子节点
    pub parental: u8,

    pub parent_id: String,
    pub safety_way: u8,
    pub register_way: u8,
    pub secrecy: u8,

    /// ON/OFF
    pub status: String,

    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

/// 注册处理结果
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub device: Device,
    /// 本次注册是否为注销（expires <= 0）
    pub unregistered: bool,
}

/// 设备注册表
pub struct DeviceRegistry {
    devices: DashMap<String, Device>,
    /// device_id -> (channel_id -> DeviceChannel)
    channels: DashMap<String, HashMap<String, DeviceChannel>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            channels: DashMap::new(),
        }
    }

    /// 注册或刷新设备
    ///
    /// 未知设备按默认值创建；已知设备仅刷新在线标记、远端地址、传输类型
    /// 与注册/心跳时间戳。expires <= 0 表示注销，置离线而非上线。
    pub fn register_or_update(
        &self,
        device_id: &str,
        remote_ip: String,
        remote_port: u16,
        transport: TransportKind,
        expires: i64,
        default_password: &str,
    ) -> RegisterOutcome {
        let now = Utc::now();
        let unregistered = expires <= 0;

        let mut entry = self
            .devices
            .entry(device_id.to_string())
            .or_insert_with(|| Device {
                id: device_id.to_string(),
                name: String::new(),
                manufacturer: String::new(),
                device_type: "GB".to_string(),
                channel_count: 0,
                firmware: String::new(),
                model: String::new(),
                sms_id: None,
                catalog_interval: 3600,
                subscribe_interval: 0,
                catalog_subscribe: false,
                alarm_subscribe: false,
                position_subscribe: false,
                online: true,
                password: default_password.to_string(),
                command_transport: transport,
                media_transport: transport.as_str().to_string(),
                remote_ip: remote_ip.clone(),
                remote_port,
                longitude: 0.0,
                latitude: 0.0,
                last_register_at: now,
                last_keepalive_at: now,
                updated_at: now,
                created_at: now,
            });

        let device = entry.value_mut();
        device.online = !unregistered;
        device.remote_ip = remote_ip;
        device.remote_port = remote_port;
        device.command_transport = transport;
        device.last_register_at = now;
        device.last_keepalive_at = now;
        device.updated_at = now;

        let device = device.clone();
        drop(entry);

        if unregistered {
            tracing::info!(target: "gbs::device", %device_id, "device unregistered");
        } else {
            tracing::info!(target: "gbs::device", %device_id, "device registered");
        }

        RegisterOutcome {
            device,
            unregistered,
        }
    }

    pub fn get(&self, device_id: &str) -> Option<Device> {
        self.devices.get(device_id).map(|d| d.clone())
    }

    pub fn list(&self) -> Vec<Device> {
        self.devices.iter().map(|d| d.clone()).collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// 刷新心跳时间，未知设备返回 false
    pub fn touch_keepalive(&self, device_id: &str) -> bool {
        match self.devices.get_mut(device_id) {
            Some(mut device) => {
                let now = Utc::now();
                device.last_keepalive_at = now;
                device.updated_at = now;
                true
            }
            None => false,
        }
    }

    /// 应用 DeviceInfo 响应中的描述字段，空字段不覆盖
    pub fn apply_device_info(
        &self,
        device_id: &str,
        name: &str,
        manufacturer: &str,
        model: &str,
        firmware: &str,
        channel_count: Option<u32>,
    ) {
        if let Some(mut device) = self.devices.get_mut(device_id) {
            if !name.is_empty() {
                device.name = name.to_string();
            }
            if !manufacturer.is_empty() {
                device.manufacturer = manufacturer.to_string();
            }
            if !model.is_empty() {
                device.model = model.to_string();
            }
            if !firmware.is_empty() {
                device.firmware = firmware.to_string();
            }
            if let Some(count) = channel_count {
                device.channel_count = count;
            }
            device.updated_at = Utc::now();
        }
    }

    /// 应用 DeviceStatus 响应中的在线状态
    pub fn apply_device_status(&self, device_id: &str, online: bool) {
        if let Some(mut device) = self.devices.get_mut(device_id) {
            device.online = online;
            device.updated_at = Utc::now();
        }
    }

    /// 整批 upsert 通道，按通道编号替换，未出现的通道不删除
    pub fn upsert_channels(&self, channels: Vec<DeviceChannel>) {
        for channel in channels {
            let mut entry = self
                .channels
                .entry(channel.device_id.clone())
                .or_default();
            entry.insert(channel.channel_id.clone(), channel);
        }
    }

    pub fn channels_of(&self, device_id: &str) -> Vec<DeviceChannel> {
        self.channels
            .get(device_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn channel_of(&self, device_id: &str, channel_id: &str) -> Option<DeviceChannel> {
        self.channels
            .get(device_id)
            .and_then(|m| m.get(channel_id).cloned())
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(registry: &DeviceRegistry, expires: i64) -> RegisterOutcome {
        registry.register_or_update(
            "34020000001320000001",
            "192.168.1.100".to_string(),
            5060,
            TransportKind::Udp,
            expires,
            "12345678",
        )
    }

    #[test]
    fn test_register_creates_with_defaults() {
        let registry = DeviceRegistry::new();
        let outcome = register(&registry, 3600);

        assert!(!outcome.unregistered);
        let device = outcome.device;
        assert!(device.online);
        assert_eq!(device.device_type, "GB");
        assert_eq!(device.catalog_interval, 3600);
        assert_eq!(device.subscribe_interval, 0);
        assert!(!device.catalog_subscribe);
        assert_eq!(device.remote_addr(), "192.168.1.100:5060");
    }

    #[test]
    fn test_reregister_stays_online() {
        let registry = DeviceRegistry::new();
        register(&registry, 3600);
        let outcome = register(&registry, 3600);

        assert!(outcome.device.online);
        assert_eq!(registry.device_count(), 1);
    }

    #[test]
    fn test_zero_expires_marks_offline() {
        let registry = DeviceRegistry::new();
        register(&registry, 3600);
        let outcome = register(&registry, 0);

        assert!(outcome.unregistered);
        assert!(!outcome.device.online);
        // 记录保留，不删除
        assert!(registry.get("34020000001320000001").is_some());
    }

    #[test]
    fn test_update_preserves_identity_fields() {
        let registry = DeviceRegistry::new();
        register(&registry, 3600);
        registry.apply_device_info(
            "34020000001320000001",
            "NVR-1",
            "Hikvision",
            "DS-7608N",
            "V4.30",
            Some(8),
        );

        let outcome = register(&registry, 3600);
        assert_eq!(outcome.device.name, "NVR-1");
        assert_eq!(outcome.device.channel_count, 8);
    }

    #[test]
    fn test_channel_upsert_replaces_by_id() {
        let registry = DeviceRegistry::new();
        let channel = |id: &str, name: &str| DeviceChannel {
            device_id: "34020000001320000001".to_string(),
            channel_id: id.to_string(),
            name: name.to_string(),
            manufacturer: String::new(),
            model: String::new(),
            owner: String::new(),
            civil_code: String::new(),
            address: String::new(),
            parental: 0,
            parent_id: String::new(),
            safety_way: 0,
            register_way: 1,
            secrecy: 0,
            status: "ON".to_string(),
            longitude: None,
            latitude: None,
        };

        registry.upsert_channels(vec![
            channel("34020000001310000001", "cam-1"),
            channel("34020000001310000002", "cam-2"),
        ]);
        // 部分批次只覆盖出现的通道
        registry.upsert_channels(vec![channel("34020000001310000001", "cam-1-renamed")]);

        let channels = registry.channels_of("34020000001320000001");
        assert_eq!(channels.len(), 2);
        let renamed = registry
            .channel_of("34020000001320000001", "34020000001310000001")
            .unwrap();
        assert_eq!(renamed.name, "cam-1-renamed");
    }
}
