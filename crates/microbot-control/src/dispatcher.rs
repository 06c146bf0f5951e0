use crate::{parse_calibration, ActionFilter, MicrobotApi, Result};
use microbot_device::{Calibration, Device, DeviceCollection, DeviceHandle, DeviceId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 校准更新结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationUpdate {
    /// 已写入并保存，附带解析出的数值
    Applied(f64),
    /// 输入不合法，未做任何修改
    Rejected,
}

/// 动作分发器
///
/// 向单个设备下发一次性指令，以及改名、校准这两类字段更新。
/// 与轮询周期相互独立。
pub struct ActionDispatcher {
    api: Arc<dyn MicrobotApi>,
    filter: ActionFilter,
    collection: Option<Arc<DeviceCollection>>,
}

impl ActionDispatcher {
    pub fn new(api: Arc<dyn MicrobotApi>) -> Self {
        Self {
            api,
            filter: ActionFilter::default(),
            collection: None,
        }
    }

    pub fn with_filter(mut self, filter: ActionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// 关联设备集合：本地编辑会发布事件，单设备刷新会合并进集合
    pub fn with_collection(mut self, collection: Arc<DeviceCollection>) -> Self {
        self.collection = Some(collection);
        self
    }

    /// 触发设备动作，响应内容被忽略
    pub async fn dispatch(&self, device_id: &DeviceId, action: &str) -> Result<()> {
        self.dispatch_with_args(device_id, action, &[]).await
    }

    /// 触发带位置参数的设备动作
    pub async fn dispatch_with_args(
        &self,
        device_id: &DeviceId,
        action: &str,
        args: &[String],
    ) -> Result<()> {
        info!(device_id = %device_id, action = %action, "Dispatching action");

        if let Err(e) = self.api.trigger_action(device_id, action, args).await {
            warn!(device_id = %device_id, action = %action, error = %e, "Action dispatch failed");
            return Err(e);
        }
        Ok(())
    }

    /// 本地改名后保存完整记录
    pub async fn update_name(&self, device: &DeviceHandle, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        let snapshot = device
            .update(|d| {
                d.name = new_name;
                d.clone()
            })
            .await;
        self.notify_edited(device.id());

        self.save(snapshot).await
    }

    /// 校验并更新校准值
    ///
    /// 输入不在 `[0.1, 1]` 内或无法解析时直接丢弃：不修改记录、不发请求、不返回错误。
    /// 通过校验后记录中保存的是用户输入的原始字符串。
    pub async fn update_calibration(
        &self,
        device: &DeviceHandle,
        raw: &str,
    ) -> Result<CalibrationUpdate> {
        let value = match parse_calibration(raw) {
            Some(v) => v,
            None => {
                debug!(device_id = %device.id(), input = %raw, "Calibration input ignored");
                return Ok(CalibrationUpdate::Rejected);
            }
        };

        let snapshot = device
            .update(|d| {
                d.calibration = Some(Calibration::Raw(raw.to_string()));
                d.clone()
            })
            .await;
        self.notify_edited(device.id());

        self.save(snapshot).await?;
        Ok(CalibrationUpdate::Applied(value))
    }

    /// 重新拉取单个设备并合并进集合
    pub async fn refresh_device(&self, device_id: &DeviceId) -> Result<Device> {
        let device = self.api.get_device(device_id).await?;
        if let Some(collection) = &self.collection {
            collection.upsert(device.clone()).await;
        }
        Ok(device)
    }

    /// 过滤掉隐藏动作
    pub fn public_actions<I, S>(&self, actions: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter.public(actions)
    }

    /// 设备当前可直接触发的动作
    pub async fn public_actions_for(&self, device: &DeviceHandle) -> Vec<String> {
        let actions = device.read().await.actions();
        self.filter.public(actions)
    }

    async fn save(&self, device: Device) -> Result<()> {
        debug!(device_id = %device.id, "Saving device");
        if let Err(e) = self.api.save_device(&device).await {
            warn!(device_id = %device.id, error = %e, "Device save failed");
            return Err(e);
        }
        Ok(())
    }

    fn notify_edited(&self, id: &DeviceId) {
        if let Some(collection) = &self.collection {
            collection.notify_edited(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ControlError, MockMicrobotApi, RecordedCall};
    use microbot_device::CollectionEvent;
    use serde_json::json;

    fn setup() -> (Arc<MockMicrobotApi>, ActionDispatcher) {
        let api = Arc::new(MockMicrobotApi::new());
        let dispatcher = ActionDispatcher::new(api.clone());
        (api, dispatcher)
    }

    #[tokio::test]
    async fn test_dispatch_sends_action() {
        let (api, dispatcher) = setup();
        dispatcher.dispatch(&DeviceId::Number(7), "stop").await.unwrap();

        assert_eq!(
            api.calls().await,
            vec![RecordedCall::Action {
                id: DeviceId::Number(7),
                action: "stop".to_string(),
                args: vec![],
            }]
        );
    }

    #[tokio::test]
    async fn test_dispatch_does_not_validate_action_name() {
        let (api, dispatcher) = setup();
        dispatcher
            .dispatch_with_args(&DeviceId::from("x"), "whatever", &["1".to_string()])
            .await
            .unwrap();
        assert_eq!(api.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_failure_surfaces() {
        let (api, dispatcher) = setup();
        api.set_fail_writes(true);
        let err = dispatcher.dispatch(&DeviceId::Number(1), "blink").await.unwrap_err();
        assert!(matches!(err, ControlError::Transport(_)));
    }

    #[tokio::test]
    async fn test_update_name_mutates_in_place_and_saves() {
        let (api, dispatcher) = setup();
        let handle = DeviceHandle::new(Device::new(1, "Old").with_field("battery", json!(40)));

        dispatcher.update_name(&handle, "New").await.unwrap();

        assert_eq!(handle.read().await.name, "New");
        let saved = api.saved().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "New");
        assert_eq!(saved[0].field("battery"), Some(&json!(40)));
    }

    #[tokio::test]
    async fn test_update_name_keeps_local_change_when_save_fails() {
        let (api, dispatcher) = setup();
        api.set_fail_writes(true);
        let handle = DeviceHandle::new(Device::new(1, "Old"));

        assert!(dispatcher.update_name(&handle, "New").await.is_err());
        assert_eq!(handle.read().await.name, "New");
    }

    #[tokio::test]
    async fn test_calibration_accepted_values() {
        for input in ["0.1", "1", "0.55"] {
            let (api, dispatcher) = setup();
            let handle = DeviceHandle::new(Device::new(1, "Bot"));

            let outcome = dispatcher.update_calibration(&handle, input).await.unwrap();

            assert!(matches!(outcome, CalibrationUpdate::Applied(_)), "input {:?}", input);
            // 保存的是原始字符串
            assert_eq!(
                handle.read().await.calibration,
                Some(Calibration::Raw(input.to_string()))
            );
            assert_eq!(api.saved().await.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_calibration_rejected_values() {
        for input in ["0.05", "1.5", "abc", "", "NaN"] {
            let (api, dispatcher) = setup();
            let original = Device::new(1, "Bot").with_calibration(Calibration::Number(0.5));
            let handle = DeviceHandle::new(original.clone());

            let outcome = dispatcher.update_calibration(&handle, input).await.unwrap();

            assert_eq!(outcome, CalibrationUpdate::Rejected, "input {:?}", input);
            assert_eq!(handle.snapshot().await, original);
            assert!(api.calls().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_edits_publish_events() {
        let api = Arc::new(MockMicrobotApi::new());
        let collection = Arc::new(DeviceCollection::new());
        collection.merge(vec![Device::new(1, "Bot")]).await;
        let dispatcher = ActionDispatcher::new(api).with_collection(collection.clone());

        let mut rx = collection.subscribe();
        let handle = collection.get(&DeviceId::Number(1)).await.unwrap();
        dispatcher.update_name(&handle, "Renamed").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), CollectionEvent::Edited(DeviceId::Number(1)));
    }

    #[tokio::test]
    async fn test_refresh_device_merges_into_collection() {
        let api = Arc::new(MockMicrobotApi::new());
        api.push_list(vec![Device::new(3, "Fresh")]).await;
        api.list_devices().await.unwrap();

        let collection = Arc::new(DeviceCollection::new());
        collection.merge(vec![Device::new(3, "Stale")]).await;
        let handle = collection.get(&DeviceId::Number(3)).await.unwrap();

        let dispatcher = ActionDispatcher::new(api).with_collection(collection);
        dispatcher.refresh_device(&DeviceId::Number(3)).await.unwrap();

        assert_eq!(handle.read().await.name, "Fresh");
    }

    #[tokio::test]
    async fn test_public_actions_for_device() {
        let (_api, dispatcher) = setup();
        let handle = DeviceHandle::new(
            Device::new(1, "Bot").with_field("actions", json!(["blink", "calibrate", "extend"])),
        );
        assert_eq!(
            dispatcher.public_actions_for(&handle).await,
            vec!["blink".to_string(), "extend".to_string()]
        );
    }
}
