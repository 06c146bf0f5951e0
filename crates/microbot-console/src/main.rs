mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use microbot_config::{init_logging, ConfigLoader, ControllerConfig};
use microbot_control::{
    action_url, ActionDispatcher, ApiEndpoint, CalibrationUpdate, HttpMicrobotApi,
};
use microbot_device::{CollectionEvent, DeviceCollection, DeviceError, DeviceHandle, DeviceId};
use microbot_poller::Poller;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Microbot fleet controller")]
struct Args {
    /// 配置文件路径
    #[arg(long, default_value = "config/microbot.toml")]
    config: PathBuf,

    /// 覆盖配置中的服务端地址
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 持续轮询并输出设备变化，Ctrl-C 退出
    Watch {
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// 拉取一次设备列表
    List {
        #[arg(long)]
        json: bool,
    },
    /// 触发设备动作
    Action {
        id: String,
        action: String,
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// 修改设备名称
    Rename { id: String, name: String },
    /// 修改校准值（0.1 ~ 1）
    Calibrate { id: String, value: String },
    /// 列出设备可直接触发的动作
    Actions { id: String },
    /// 输出动作地址
    Url { id: String, action: String },
    /// 输出生效的配置
    Config,
}

struct Controller {
    endpoint: ApiEndpoint,
    collection: Arc<DeviceCollection>,
    poller: Poller,
    dispatcher: ActionDispatcher,
}

impl Controller {
    fn new(config: &ControllerConfig) -> Result<Self> {
        let endpoint = ApiEndpoint::parse(&config.api.base_url)?;
        let api = Arc::new(
            HttpMicrobotApi::with_timeout(endpoint.clone(), config.api.timeout())?
                .with_save_method(config.api.save_method),
        );
        let collection = Arc::new(DeviceCollection::new());

        let poller = Poller::new(api.clone(), collection.clone())
            .with_config(config.poller.to_poller_config());
        let dispatcher = ActionDispatcher::new(api)
            .with_filter(config.actions.filter())
            .with_collection(collection.clone());

        Ok(Self {
            endpoint,
            collection,
            poller,
            dispatcher,
        })
    }

    /// 拉取一次后按 ID 查找设备
    async fn device(&self, id: &str) -> Result<DeviceHandle> {
        self.poller.poll_once().await?;
        self.collection
            .find(id)
            .await
            .ok_or_else(|| DeviceError::NotFound(DeviceId::parse_lenient(id)).into())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new(&args.config);
    let mut config = loader
        .load()
        .with_context(|| format!("failed to load {}", loader.path().display()))?;
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }
    if let Command::Watch {
        interval_ms: Some(ms),
    } = &args.command
    {
        config.poller.interval_ms = *ms;
    }
    ConfigLoader::validate(&config)?;
    init_logging(&config.logging)?;

    let controller = Controller::new(&config)?;

    match args.command {
        Command::Watch { .. } => watch(controller).await?,
        Command::List { json } => {
            controller.poller.poll_once().await?;
            let devices = controller.collection.snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else {
                for device in &devices {
                    println!("{}", render::device_line(device));
                }
            }
        }
        Command::Action { id, action, args } => {
            let device_id = match controller.device(&id).await {
                Ok(handle) => handle.id().clone(),
                Err(e) => {
                    warn!(error = %e, "Dispatching to unknown device");
                    DeviceId::parse_lenient(&id)
                }
            };
            controller
                .dispatcher
                .dispatch_with_args(&device_id, &action, &args)
                .await?;
            println!("{} -> {}", device_id, action);
        }
        Command::Rename { id, name } => {
            let handle = controller.device(&id).await?;
            controller.dispatcher.update_name(&handle, name).await?;
            println!("{}", render::device_line(&handle.snapshot().await));
        }
        Command::Calibrate { id, value } => {
            let handle = controller.device(&id).await?;
            match controller.dispatcher.update_calibration(&handle, &value).await? {
                CalibrationUpdate::Applied(v) => println!("{} calibration set to {}", id, v),
                CalibrationUpdate::Rejected => {
                    println!("{} calibration unchanged: {:?} is not within 0.1..=1", id, value)
                }
            }
        }
        Command::Actions { id } => {
            let handle = controller.device(&id).await?;
            for action in controller.dispatcher.public_actions_for(&handle).await {
                println!("{}", action);
            }
        }
        Command::Url { id, action } => {
            let origin = controller.endpoint.origin()?;
            println!("{}", action_url(&origin, &DeviceId::parse_lenient(&id), &action)?);
        }
        Command::Config => print!("{}", config.to_toml_string()?),
    }

    Ok(())
}

async fn watch(controller: Controller) -> Result<()> {
    let Controller {
        collection, poller, ..
    } = controller;

    let mut events = collection.subscribe();
    let handle = poller.start();
    info!("Watching devices, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(CollectionEvent::Merged(report)) => {
                    for id in report.inserted.iter().chain(report.updated.iter()) {
                        if let Some(device) = collection.get(id).await {
                            println!("{}", render::device_line(&device.snapshot().await));
                        }
                    }
                }
                Ok(CollectionEvent::Pruned(ids)) => {
                    for id in ids {
                        println!("{} removed", id);
                    }
                }
                Ok(CollectionEvent::Edited(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event receiver lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let stats = handle.stats().await;
    handle.stop().await;
    info!(cycles = stats.cycles, failures = stats.failures, "Watch finished");
    Ok(())
}
