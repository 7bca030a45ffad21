// 邀请对话簿
// 邀请成功后按 `设备编号@通道编号` 记录对话上下文（路由与寻址状态），
// 供后续 BYE 复用；对话缺失时挂断无从谈起

use crate::sip::transport::TransportKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// 一次已建立邀请的对话上下文
#[derive(Debug, Clone)]
pub struct Dialog {
    pub device_id: String,
    pub channel_id: String,

    pub call_id: String,
    pub from_tag: String,
    pub to_tag: String,

    /// 对话内下一请求的 CSeq 基数
    pub cseq: u32,

    /// 对话建立所用的传输类型，BYE 走同一传输
    pub transport: TransportKind,

    /// 设备远端地址
    pub remote_addr: String,

    /// 原始邀请的请求 URI
    pub request_uri: String,

    pub established_at: DateTime<Utc>,
}

/// 对话存储
pub struct DialogStore {
    dialogs: DashMap<String, Dialog>,
}

fn key(device_id: &str, channel_id: &str) -> String {
    format!("{}@{}", device_id, channel_id)
}

impl DialogStore {
    pub fn new() -> Self {
        Self {
            dialogs: DashMap::new(),
        }
    }

    pub fn put(&self, dialog: Dialog) {
        self.dialogs
            .insert(key(&dialog.device_id, &dialog.channel_id), dialog);
    }

    pub fn get(&self, device_id: &str, channel_id: &str) -> Option<Dialog> {
        self.dialogs.get(&key(device_id, channel_id)).map(|d| d.clone())
    }

    pub fn remove(&self, device_id: &str, channel_id: &str) -> Option<Dialog> {
        self.dialogs
            .remove(&key(device_id, channel_id))
            .map(|(_, d)| d)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }
}

impl Default for DialogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = DialogStore::new();
        store.put(Dialog {
            device_id: "34020000001320000001".to_string(),
            channel_id: "34020000001310000001".to_string(),
            call_id: "abc".to_string(),
            from_tag: "f1".to_string(),
            to_tag: "t1".to_string(),
            cseq: 1,
            transport: TransportKind::Udp,
            remote_addr: "192.168.1.100:5060".to_string(),
            request_uri: "sip:34020000001310000001@192.168.1.100:5060".to_string(),
            established_at: Utc::now(),
        });

        assert!(store
            .get("34020000001320000001", "34020000001310000001")
            .is_some());
        assert!(store.get("34020000001320000001", "other").is_none());

        let removed = store
            .remove("34020000001320000001", "34020000001310000001")
            .unwrap();
        assert_eq!(removed.call_id, "abc");
        assert!(store.is_empty());
    }
}
