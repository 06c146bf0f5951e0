use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat};
use microbot_control::ApiEndpoint;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ControllerConfig;

/// 配置加载器
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// 加载配置，文件不存在时返回默认配置
    pub fn load(&self) -> Result<ControllerConfig> {
        if !self.config_path.exists() {
            debug!(path = %self.config_path.display(), "Config file not found, using defaults");
            return Ok(ControllerConfig::default());
        }

        let config = Config::builder()
            .add_source(File::new(
                self.config_path
                    .to_str()
                    .ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 加载并校验
    pub fn load_validated(&self) -> Result<ControllerConfig> {
        let config = self.load()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(config: &ControllerConfig) -> Result<()> {
        ApiEndpoint::parse(&config.api.base_url)
            .map_err(|e| anyhow!("api.base_url ({}) is invalid: {}", config.api.base_url, e))?;

        if config.api.timeout_ms == 0 {
            return Err(anyhow!("api.timeout_ms must be greater than 0"));
        }

        if config.poller.interval_ms == 0 {
            return Err(anyhow!("poller.interval_ms must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microbot_control::SaveMethod;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempdir().unwrap();
        let loader = ConfigLoader::new(temp_dir.path().join("microbot.toml"));

        let config = loader.load().unwrap();
        assert_eq!(config.poller.interval_ms, 5000);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("microbot.toml");
        fs::write(
            &path,
            r#"
[api]
base_url = "https://hub.local:8443"
save_method = "put"

[poller]
interval_ms = 1000
prune_missing = true

[actions]
hidden = ["calibrate", "pair"]
"#,
        )
        .unwrap();

        let config = ConfigLoader::new(&path).load_validated().unwrap();
        assert_eq!(config.api.base_url, "https://hub.local:8443");
        assert_eq!(config.api.save_method, SaveMethod::Put);
        // 未配置的字段使用默认值
        assert_eq!(config.api.timeout_ms, 10_000);
        assert_eq!(config.poller.interval_ms, 1000);
        assert!(config.poller.prune_missing);
        assert!(config.actions.filter().is_hidden("pair"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ControllerConfig::default();
        config.poller.interval_ms = 0;
        assert!(ConfigLoader::validate(&config).is_err());

        let mut config = ControllerConfig::default();
        config.api.base_url = "ftp://hub.local".to_string();
        assert!(ConfigLoader::validate(&config).is_err());

        let mut config = ControllerConfig::default();
        config.api.timeout_ms = 0;
        assert!(ConfigLoader::validate(&config).is_err());

        assert!(ConfigLoader::validate(&ControllerConfig::default()).is_ok());
    }
}
