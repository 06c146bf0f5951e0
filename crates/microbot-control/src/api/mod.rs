pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use crate::Result;
use async_trait::async_trait;
use microbot_device::{Device, DeviceId};
use serde::{Deserialize, Serialize};

/// 保存单个设备时使用的 HTTP 方法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMethod {
    #[default]
    Post,
    Put,
}

/// 设备 REST 接口
#[async_trait]
pub trait MicrobotApi: Send + Sync {
    /// 拉取完整设备列表
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// 拉取单个设备
    async fn get_device(&self, id: &DeviceId) -> Result<Device>;

    /// 保存完整设备记录
    async fn save_device(&self, device: &Device) -> Result<()>;

    /// 触发设备动作，响应内容被忽略
    async fn trigger_action(&self, id: &DeviceId, action: &str, args: &[String]) -> Result<()>;
}
