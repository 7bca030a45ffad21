// 异步响应关联中枢
// 每个未决请求对应一个槽位，键为（类别, 关联编号）。槽位状态与分片累积
// 是普通数据，完成通知走独立的 oneshot 通道，二者不混用同一类型。
//
// 约束：
// - 同键重复注册视为放弃前次等待，后写者胜
// - resolve 不存在的槽位是幂等空操作
// - 等待超时先移除槽位再返回，迟到的响应被静默丢弃

use crate::device::DeviceChannel;
use crate::error::{Result, SignalError};
use crate::stream::StreamInfo;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// 目录查询交换
pub const CALLBACK_CATALOG: &str = "catalog";
/// 点播邀请交换
pub const CALLBACK_PLAY: &str = "play";

/// 槽位完成值
#[derive(Debug)]
pub enum SlotValue {
    Channels(Vec<DeviceChannel>),
    Stream(StreamInfo),
}

struct Slot {
    token: u64,
    tx: oneshot::Sender<SlotValue>,
    /// 分片累积结果（目录响应专用）
    partials: Vec<DeviceChannel>,
    /// 首个分片声明的总数
    expected: Option<u32>,
}

/// 注册返回的等待凭据
pub struct PendingResponse {
    category: String,
    id: String,
    token: u64,
    rx: oneshot::Receiver<SlotValue>,
}

/// 响应关联中枢
pub struct ResponseHolder {
    /// 类别 -> 关联编号 -> 槽位
    slots: DashMap<String, DashMap<String, Slot>>,
    next_token: AtomicU64,
}

impl ResponseHolder {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_token: AtomicU64::new(1),
        }
    }

    /// 注册一个未决槽位，同键旧槽位被替换
    pub fn register(&self, category: &str, id: &str) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let slot = Slot {
            token,
            tx,
            partials: Vec::new(),
            expected: None,
        };

        self.slots
            .entry(category.to_string())
            .or_default()
            .insert(id.to_string(), slot);

        PendingResponse {
            category: category.to_string(),
            id: id.to_string(),
            token,
            rx,
        }
    }

    /// 完成并移除槽位；不存在时为空操作
    pub fn resolve(&self, category: &str, id: &str, value: SlotValue) {
        let Some(inner) = self.slots.get(category) else {
            return;
        };
        let Some((_, slot)) = inner.remove(id) else {
            return;
        };
        drop(inner);

        // 等待方可能已超时离开，发送失败即丢弃
        let _ = slot.tx.send(value);
        self.cleanup_category(category);
    }

    /// 追加一批分片结果，返回累积数是否已达首个分片声明的总数
    ///
    /// 分片可能乱序或重复投递，按通道编号去重后再与总数比较
    pub fn accumulate(
        &self,
        category: &str,
        id: &str,
        batch: Vec<DeviceChannel>,
        declared_total: u32,
    ) -> bool {
        let Some(inner) = self.slots.get(category) else {
            return false;
        };
        let Some(mut slot) = inner.get_mut(id) else {
            return false;
        };

        if slot.expected.is_none() {
            slot.expected = Some(declared_total);
        }

        let seen: HashSet<String> = slot
            .partials
            .iter()
            .map(|c| c.channel_id.clone())
            .collect();
        slot.partials
            .extend(batch.into_iter().filter(|c| !seen.contains(&c.channel_id)));

        let expected = slot.expected.unwrap_or(0) as usize;
        slot.partials.len() >= expected
    }

    /// 以累积的分片结果完成槽位
    pub fn resolve_accumulated(&self, category: &str, id: &str) {
        let Some(inner) = self.slots.get(category) else {
            return;
        };
        let Some((_, slot)) = inner.remove(id) else {
            return;
        };
        drop(inner);

        let _ = slot.tx.send(SlotValue::Channels(slot.partials));
        self.cleanup_category(category);
    }

    /// 等待槽位完成，超时先移除槽位再返回错误
    pub async fn wait(&self, pending: PendingResponse, timeout: Duration) -> Result<SlotValue> {
        match tokio::time::timeout(timeout, pending.rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => {
                // 同键重新注册使旧槽位被替换、发送端被丢弃
                Err(SignalError::CorrelationTimeout {
                    category: pending.category,
                    id: pending.id,
                })
            }
            Err(_) => {
                self.remove_if_token(&pending.category, &pending.id, pending.token);
                Err(SignalError::CorrelationTimeout {
                    category: pending.category,
                    id: pending.id,
                })
            }
        }
    }

    /// 槽位是否存在（测试与诊断用）
    pub fn contains(&self, category: &str, id: &str) -> bool {
        self.slots
            .get(category)
            .map(|inner| inner.contains_key(id))
            .unwrap_or(false)
    }

    /// 仅当槽位仍属于本次等待（token 匹配）时移除，
    /// 避免超时清理误删同键的新注册
    fn remove_if_token(&self, category: &str, id: &str, token: u64) {
        if let Some(inner) = self.slots.get(category) {
            inner.remove_if(id, |_, slot| slot.token == token);
        }
        self.cleanup_category(category);
    }

    /// 尽力清理空的类别层，非正确性所需
    fn cleanup_category(&self, category: &str) {
        self.slots.remove_if(category, |_, inner| inner.is_empty());
    }
}

impl Default for ResponseHolder {
    fn default() -> Self {
        Self::new()
    }
}
