use thiserror::Error;

/// 控制端错误类型
#[derive(Error, Debug)]
pub enum ControlError {
    /// HTTP 传输错误
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 服务端返回非成功状态码
    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    /// URL 解析错误
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// 端点配置无效
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 设备集合错误
    #[error(transparent)]
    Device(#[from] microbot_device::DeviceError),

    /// 其他传输错误
    #[error("Transport error: {0}")]
    Transport(String),
}

/// 控制端结果类型
pub type Result<T> = std::result::Result<T, ControlError>;

impl ControlError {
    pub fn transport(msg: impl Into<String>) -> Self {
        ControlError::Transport(msg.into())
    }

    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        ControlError::InvalidEndpoint(msg.into())
    }
}
