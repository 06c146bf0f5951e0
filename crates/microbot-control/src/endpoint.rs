use crate::{ControlError, Result};
use microbot_device::DeviceId;
use url::Url;

/// 所有设备接口的固定路径前缀
const API_PREFIX: [&str; 2] = ["api", "microbots"];

/// 服务端来源（协议、主机、端口）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl Origin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// 从任意 URL 中取出来源部分
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| ControlError::invalid_endpoint(format!("{} has no host", url)))?;
        Ok(Self::new(url.scheme(), host, url.port()))
    }

    pub fn to_url(&self) -> Result<Url> {
        let raw = match self.port {
            Some(port) => format!("{}://{}:{}/", self.scheme, self.host, port),
            None => format!("{}://{}/", self.scheme, self.host),
        };
        Ok(Url::parse(&raw)?)
    }
}

/// 构建设备动作的绝对地址：`{scheme}://{host}[:{port}]/api/microbots/{id}/{action}`
pub fn action_url(origin: &Origin, device_id: &DeviceId, action: &str) -> Result<Url> {
    let base = origin.to_url()?;
    join(&base, &[&device_id.to_string(), action])
}

fn join(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| ControlError::invalid_endpoint(format!("{} cannot be a base", base)))?
        .pop_if_empty()
        .extend(API_PREFIX)
        .extend(segments);
    Ok(url)
}

/// REST 接口地址
///
/// 基础地址可以带路径前缀（例如反向代理挂载在 `/pushbot/` 下），
/// 设备接口统一拼接在其后。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    base: Url,
}

impl ApiEndpoint {
    pub fn new(base: Url) -> Result<Self> {
        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ControlError::invalid_endpoint(format!(
                    "unsupported scheme: {}",
                    other
                )))
            }
        }
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(ControlError::invalid_endpoint(format!(
                "{} is not a valid base URL",
                base
            )));
        }
        Ok(Self { base })
    }

    pub fn parse(base: &str) -> Result<Self> {
        Self::new(Url::parse(base)?)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn origin(&self) -> Result<Origin> {
        Origin::from_url(&self.base)
    }

    /// `GET /api/microbots`
    pub fn devices_url(&self) -> Result<Url> {
        join(&self.base, &[])
    }

    /// `GET|POST|PUT /api/microbots/{id}`
    pub fn device_url(&self, id: &DeviceId) -> Result<Url> {
        join(&self.base, &[&id.to_string()])
    }

    /// `GET /api/microbots/{id}/{action}`
    pub fn action_url(&self, id: &DeviceId, action: &str) -> Result<Url> {
        join(&self.base, &[&id.to_string(), action])
    }
}
