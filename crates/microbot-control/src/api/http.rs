use super::{MicrobotApi, SaveMethod};
use crate::{ApiEndpoint, ControlError, Result};
use async_trait::async_trait;
use microbot_device::{Device, DeviceId};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// 基于 reqwest 的设备 REST 客户端
pub struct HttpMicrobotApi {
    client: Client,
    endpoint: ApiEndpoint,
    save_method: SaveMethod,
}

impl HttpMicrobotApi {
    pub fn new(endpoint: ApiEndpoint) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            save_method: SaveMethod::default(),
        }
    }

    /// 创建带请求超时的客户端
    pub fn with_timeout(endpoint: ApiEndpoint, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            save_method: SaveMethod::default(),
        })
    }

    pub fn with_save_method(mut self, method: SaveMethod) -> Self {
        self.save_method = method;
        self
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ControlError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }
}

#[async_trait]
impl MicrobotApi for HttpMicrobotApi {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        let url = self.endpoint.devices_url()?;
        debug!(target: "microbot_api", "GET {}", url);

        let response = Self::check(self.client.get(url).send().await?)?;
        let records: Vec<Value> = response.json().await?;
        Ok(Device::decode_list(records))
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Device> {
        let url = self.endpoint.device_url(id)?;
        debug!(target: "microbot_api", "GET {}", url);

        let response = Self::check(self.client.get(url).send().await?)?;
        Ok(response.json().await?)
    }

    async fn save_device(&self, device: &Device) -> Result<()> {
        let url = self.endpoint.device_url(&device.id)?;
        debug!(target: "microbot_api", method = ?self.save_method, "Saving device to {}", url);

        let request = match self.save_method {
            SaveMethod::Post => self.client.post(url),
            SaveMethod::Put => self.client.put(url),
        };
        Self::check(request.json(device).send().await?)?;
        Ok(())
    }

    async fn trigger_action(&self, id: &DeviceId, action: &str, args: &[String]) -> Result<()> {
        let mut url = self.endpoint.action_url(id, action)?;
        if !args.is_empty() {
            let mut query = url.query_pairs_mut();
            for arg in args {
                query.append_pair("args", arg);
            }
        }
        debug!(target: "microbot_api", "GET {}", url);

        Self::check(self.client.get(url).send().await?)?;
        Ok(())
    }
}
