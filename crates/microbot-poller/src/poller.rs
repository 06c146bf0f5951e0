use chrono::{DateTime, Utc};
use microbot_control::{MicrobotApi, Result};
use microbot_device::{Device, DeviceCollection, DeviceId, MergeReport};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 默认轮询间隔（从上一轮结束开始计时）
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// 轮询配置
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// 两轮之间的等待时间
    pub interval: Duration,
    /// 是否移除服务端不再返回的设备
    pub prune_missing: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            prune_missing: false,
        }
    }
}

/// 轮询统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollerStats {
    /// 已完成的轮数（含失败）
    pub cycles: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// 设备列表轮询器
///
/// 每轮拉取完整设备列表并合并进集合，结束后等待固定间隔再开始下一轮，
/// 因此任意时刻最多只有一个请求在途。拉取失败只记录日志，循环继续。
pub struct Poller {
    api: Arc<dyn MicrobotApi>,
    collection: Arc<DeviceCollection>,
    config: PollerConfig,
    stats: Arc<RwLock<PollerStats>>,
}

impl Poller {
    pub fn new(api: Arc<dyn MicrobotApi>, collection: Arc<DeviceCollection>) -> Self {
        Self {
            api,
            collection,
            config: PollerConfig::default(),
            stats: Arc::new(RwLock::new(PollerStats::default())),
        }
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn stats(&self) -> PollerStats {
        self.stats.read().await.clone()
    }

    /// 执行一轮拉取与合并
    pub async fn poll_once(&self) -> Result<MergeReport> {
        let fetched = self.api.list_devices().await;
        self.apply(fetched).await
    }

    async fn apply(&self, fetched: Result<Vec<Device>>) -> Result<MergeReport> {
        let devices = match fetched {
            Ok(devices) => devices,
            Err(e) => {
                let mut stats = self.stats.write().await;
                stats.cycles += 1;
                stats.failures += 1;
                stats.consecutive_failures += 1;
                stats.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let present: Vec<DeviceId> = if self.config.prune_missing {
            devices.iter().map(|d| d.id.clone()).collect()
        } else {
            Vec::new()
        };

        {
            let mut stats = self.stats.write().await;
            stats.cycles += 1;
            stats.consecutive_failures = 0;
            stats.last_success = Some(Utc::now());
        }

        let report = self.collection.merge(devices).await;
        if self.config.prune_missing {
            self.collection.prune_missing(&present).await;
        }

        debug!(
            inserted = report.inserted.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged,
            "Poll cycle complete"
        );
        Ok(report)
    }

    /// 启动后台轮询任务
    pub fn start(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = self.stats.clone();
        let join_handle = tokio::spawn(self.run(shutdown_rx));

        PollerHandle {
            shutdown_tx,
            join_handle,
            stats,
        }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval = ?self.config.interval, prune_missing = self.config.prune_missing, "Device poller started");

        loop {
            // 只在拉取阶段响应停止，合并一旦开始就完整执行
            let fetched = tokio::select! {
                fetched = self.api.list_devices() => fetched,
                _ = shutdown_requested(&mut shutdown_rx) => break,
            };

            if let Err(e) = self.apply(fetched).await {
                warn!(
                    error = %e,
                    retry_in = ?self.config.interval,
                    "Device poll failed"
                );
            }

            tokio::select! {
                _ = sleep(self.config.interval) => {}
                _ = shutdown_requested(&mut shutdown_rx) => break,
            }
        }

        info!("Device poller stopped");
    }
}

/// 收到停止信号或句柄被丢弃时返回
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// 轮询任务句柄
///
/// 调用 [`PollerHandle::stop`] 或直接丢弃句柄都会结束轮询循环。
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
    stats: Arc<RwLock<PollerStats>>,
}

impl PollerHandle {
    /// 停止轮询并等待任务退出，在途请求会被取消
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join_handle.await {
            warn!(error = %e, "Device poller task ended abnormally");
        }
    }

    pub async fn stats(&self) -> PollerStats {
        self.stats.read().await.clone()
    }
}
