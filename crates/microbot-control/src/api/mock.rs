use super::MicrobotApi;
use crate::{ControlError, Result};
use async_trait::async_trait;
use microbot_device::{Device, DeviceId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// 记录下来的接口调用
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    List,
    Get(DeviceId),
    Save(Device),
    Action {
        id: DeviceId,
        action: String,
        args: Vec<String>,
    },
}

/// 脚本化的内存设备接口
///
/// `list_devices` 依次返回排队的结果；队列空了以后重复最后一次成功的列表。
#[derive(Default)]
pub struct MockMicrobotApi {
    responses: Mutex<VecDeque<std::result::Result<Vec<Device>, String>>>,
    last_list: Mutex<Vec<Device>>,
    calls: Mutex<Vec<RecordedCall>>,
    fail_writes: AtomicBool,
}

impl MockMicrobotApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// 排队一次成功的列表响应
    pub async fn push_list(&self, devices: Vec<Device>) {
        self.responses.lock().await.push_back(Ok(devices));
    }

    /// 排队一次失败的列表响应
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.responses.lock().await.push_back(Err(message.into()));
    }

    /// 让保存和动作请求全部失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn list_calls(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, RecordedCall::List))
            .count()
    }

    pub async fn saved(&self) -> Vec<Device> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Save(device) => Some(device.clone()),
                _ => None,
            })
            .collect()
    }

    fn write_result(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(ControlError::transport("write rejected by mock"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MicrobotApi for MockMicrobotApi {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        self.calls.lock().await.push(RecordedCall::List);

        let next = self.responses.lock().await.pop_front();
        match next {
            Some(Ok(devices)) => {
                *self.last_list.lock().await = devices.clone();
                Ok(devices)
            }
            Some(Err(message)) => Err(ControlError::Transport(message)),
            None => Ok(self.last_list.lock().await.clone()),
        }
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Device> {
        self.calls.lock().await.push(RecordedCall::Get(id.clone()));

        self.last_list
            .lock()
            .await
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| ControlError::Status {
                status: 404,
                url: format!("/api/microbots/{}", id),
            })
    }

    async fn save_device(&self, device: &Device) -> Result<()> {
        self.calls.lock().await.push(RecordedCall::Save(device.clone()));
        self.write_result()
    }

    async fn trigger_action(&self, id: &DeviceId, action: &str, args: &[String]) -> Result<()> {
        self.calls.lock().await.push(RecordedCall::Action {
            id: id.clone(),
            action: action.to_string(),
            args: args.to_vec(),
        });
        self.write_result()
    }
}
