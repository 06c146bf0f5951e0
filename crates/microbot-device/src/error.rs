use crate::DeviceId;
use thiserror::Error;

/// 设备集合错误类型
#[derive(Error, Debug)]
pub enum DeviceError {
    /// 设备未找到
    #[error("Device not found: {0}")]
    NotFound(DeviceId),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// 设备集合结果类型
pub type Result<T> = std::result::Result<T, DeviceError>;
