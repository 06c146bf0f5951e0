use crate::{CollectionEvent, Device, DeviceId, EventBus};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock, RwLockReadGuard};
use tracing::{debug, info};

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// 设备记录句柄
///
/// 同一 ID 在集合中的生命周期内始终对应同一个句柄，合并时只覆盖字段，
/// 外部持有的句柄在轮询刷新后依然有效。
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    id: DeviceId,
    inner: Arc<RwLock<Device>>,
}

impl DeviceHandle {
    /// 创建独立句柄（不属于任何集合）
    pub fn new(device: Device) -> Self {
        Self {
            id: device.id.clone(),
            inner: Arc::new(RwLock::new(device)),
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Device> {
        self.inner.read().await
    }

    /// 原地修改记录，闭包内不得修改 `id`
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Device) -> R,
    {
        let mut device = self.inner.write().await;
        f(&mut device)
    }

    /// 当前字段的拷贝
    pub async fn snapshot(&self) -> Device {
        self.inner.read().await.clone()
    }

    /// 两个句柄是否指向同一条记录
    pub fn ptr_eq(&self, other: &DeviceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    async fn overwrite(&self, device: Device) -> bool {
        self.inner.write().await.overwrite_from(device)
    }
}

/// 一次合并的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// 新增的设备
    pub inserted: Vec<DeviceId>,
    /// 字段发生变化的设备
    pub updated: Vec<DeviceId>,
    /// 字段未变化的设备数
    pub unchanged: usize,
}

impl MergeReport {
    pub fn has_changes(&self) -> bool {
        !self.inserted.is_empty() || !self.updated.is_empty()
    }
}

/// 设备集合
///
/// 以设备 ID 为键、按首次出现顺序排列。轮询器和动作分发器共享同一个集合，
/// 展示层通过 [`DeviceCollection::subscribe`] 订阅变更。
pub struct DeviceCollection {
    devices: RwLock<IndexMap<DeviceId, DeviceHandle>>,
    events: EventBus,
}

impl Default for DeviceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCollection {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            devices: RwLock::new(IndexMap::new()),
            events: EventBus::new(capacity),
        }
    }

    /// 订阅集合变更事件
    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    /// 把一批新拉取的设备记录合并进集合
    ///
    /// 已存在的 ID 原地覆盖字段（句柄不变），新 ID 插入到末尾；
    /// 不在 `fresh` 中的记录保持原样。只有出现新增或更新时才发布事件。
    pub async fn merge(&self, fresh: Vec<Device>) -> MergeReport {
        let mut report = MergeReport::default();
        let mut existing = Vec::new();

        // 集合锁只用于插入新句柄，覆盖已有记录时不持有
        {
            let mut devices = self.devices.write().await;
            for device in fresh {
                let id = device.id.clone();
                match devices.get(&id) {
                    Some(handle) => existing.push((handle.clone(), device)),
                    None => {
                        debug!(device_id = %id, "Device discovered");
                        devices.insert(id.clone(), DeviceHandle::new(device));
                        report.inserted.push(id);
                    }
                }
            }
        }

        for (handle, device) in existing {
            if handle.overwrite(device).await {
                debug!(device_id = %handle.id(), "Device updated");
                report.updated.push(handle.id().clone());
            } else {
                report.unchanged += 1;
            }
        }

        if report.has_changes() {
            self.events.publish(CollectionEvent::Merged(report.clone()));
        }

        report
    }

    /// 合并单条记录
    pub async fn upsert(&self, device: Device) -> MergeReport {
        self.merge(vec![device]).await
    }

    /// 移除不在 `present` 中的设备，返回被移除的 ID
    pub async fn prune_missing(&self, present: &[DeviceId]) -> Vec<DeviceId> {
        let keep: HashSet<&DeviceId> = present.iter().collect();
        let mut removed = Vec::new();

        let mut devices = self.devices.write().await;
        devices.retain(|id, _| {
            if keep.contains(id) {
                true
            } else {
                removed.push(id.clone());
                false
            }
        });
        drop(devices);

        if !removed.is_empty() {
            info!(count = removed.len(), "Pruned devices missing from server");
            self.events.publish(CollectionEvent::Pruned(removed.clone()));
        }

        removed
    }

    /// 通知订阅者某条记录被本地修改
    pub fn notify_edited(&self, id: &DeviceId) {
        self.events.publish(CollectionEvent::Edited(id.clone()));
    }

    pub async fn get(&self, id: &DeviceId) -> Option<DeviceHandle> {
        self.devices.read().await.get(id).cloned()
    }

    /// 按 ID 的文本形式查找（数字 ID 与字符串 ID 都能匹配）
    pub async fn find(&self, id: &str) -> Option<DeviceHandle> {
        self.devices
            .read()
            .await
            .iter()
            .find(|(key, _)| key.to_string() == id)
            .map(|(_, handle)| handle.clone())
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn ids(&self) -> Vec<DeviceId> {
        self.devices.read().await.keys().cloned().collect()
    }

    /// 所有句柄，按首次出现顺序
    pub async fn handles(&self) -> Vec<DeviceHandle> {
        self.devices.read().await.values().cloned().collect()
    }

    /// 所有记录的拷贝，按首次出现顺序
    pub async fn snapshot(&self) -> Vec<Device> {
        let handles = self.handles().await;
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.snapshot().await);
        }
        out
    }
}
