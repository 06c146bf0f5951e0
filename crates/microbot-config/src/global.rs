use microbot_control::{ActionFilter, SaveMethod, HIDDEN_ACTIONS};
use microbot_poller::PollerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 控制端配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub api: ApiConfig,
    pub poller: PollerSettings,
    pub actions: ActionSettings,
    pub logging: LoggingConfig,
}

/// REST 接口配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// 服务端基础地址
    pub base_url: String,
    /// 单次请求超时（毫秒）
    pub timeout_ms: u64,
    /// 保存设备时使用的方法
    pub save_method: SaveMethod,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_ms: 10_000,
            save_method: SaveMethod::Post,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 轮询配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerSettings {
    pub interval_ms: u64,
    pub prune_missing: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            prune_missing: false,
        }
    }
}

impl PollerSettings {
    pub fn to_poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.interval_ms),
            prune_missing: self.prune_missing,
        }
    }
}

/// 动作配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionSettings {
    /// 不直接暴露的动作
    pub hidden: Vec<String>,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            hidden: HIDDEN_ACTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ActionSettings {
    pub fn filter(&self) -> ActionFilter {
        ActionFilter::new(self.hidden.iter().cloned())
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令，`RUST_LOG` 优先
    pub level: String,
    /// 是否输出 JSON
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ControllerConfig {
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
