use crate::Result;
use chrono::{DateTime, NaiveDateTime};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// 设备 ID
///
/// 服务端分配，可能是数字也可能是字符串（例如 UUID），记录存续期间不变。
/// 数字 ID 与字符串 ID 即使文本相同也是不同的键。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceId {
    Number(i64),
    Text(String),
    /// 超出 i64 的整数或小数，保存规范化后的数字文本
    OtherNumber(String),
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DeviceId::Number(n) => serializer.serialize_i64(*n),
            DeviceId::Text(s) => serializer.serialize_str(s),
            DeviceId::OtherNumber(raw) => match raw.parse::<serde_json::Number>() {
                Ok(n) => n.serialize(serializer),
                Err(_) => serializer.serialize_str(raw),
            },
        }
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => Ok(match n.as_i64() {
                Some(v) => DeviceId::Number(v),
                None => DeviceId::OtherNumber(n.to_string()),
            }),
            Value::String(s) => Ok(DeviceId::Text(s)),
            other => Err(de::Error::custom(format!(
                "device id must be a string or number, got {}",
                other
            ))),
        }
    }
}

impl DeviceId {
    /// 按命令行/路径参数解析：纯整数视为数字 ID，其余视为字符串 ID
    pub fn parse_lenient(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) => DeviceId::Number(n),
            Err(_) => DeviceId::Text(s.to_string()),
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Number(n) => write!(f, "{}", n),
            DeviceId::Text(s) | DeviceId::OtherNumber(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DeviceId {
    fn from(n: i64) -> Self {
        DeviceId::Number(n)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::Text(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::Text(s)
    }
}

/// 校准值
///
/// 服务端下发的是数字；本地通过校准流程写入时保存用户输入的原始字符串。
/// 其他类型的值原样保留。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Calibration {
    Number(f64),
    Raw(String),
    Other(Value),
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calibration::Number(v) => write!(f, "{}", v),
            Calibration::Raw(s) => f.write_str(s),
            Calibration::Other(v) => write!(f, "{}", v),
        }
    }
}

/// 设备连接状态（服务端 `status` 字段）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// 未配对
    NotPaired,
    /// 已配对但未连接
    NotConnected,
    /// 已连接
    Connected,
    /// 其他服务端状态
    Unknown(String),
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionStatus::NotPaired => "not_paired",
            ConnectionStatus::NotConnected => "not_connected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Unknown(s) => s.as_str(),
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "not_paired" => ConnectionStatus::NotPaired,
            "not_connected" => ConnectionStatus::NotConnected,
            "connected" => ConnectionStatus::Connected,
            _ => ConnectionStatus::Unknown(s.to_string()),
        }
    }
}

/// 设备记录
///
/// 固定字段只有 `id`、`name`、`calibration`，其余服务端字段原样保存在
/// `extra` 中并在保存时原样回传。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// 设备 ID
    pub id: DeviceId,

    /// 设备名称
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    /// 校准值
    #[serde(default)]
    pub calibration: Option<Calibration>,

    /// 服务端附加字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Device {
    /// 创建只有必填字段的设备记录
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            calibration: None,
            extra: Map::new(),
        }
    }

    /// 解码单条服务端记录
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// 逐条解码设备列表，无法解码的记录记日志后跳过
    pub fn decode_list(records: Vec<Value>) -> Vec<Device> {
        let mut devices = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match Device::from_value(record) {
                Ok(device) => devices.push(device),
                Err(e) => warn!(index, error = %e, "Skipping undecodable device record"),
            }
        }
        devices
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// 用新记录覆盖当前记录的全部字段
    ///
    /// 字段完全相同时不做任何写入并返回 false。
    pub fn overwrite_from(&mut self, other: Device) -> bool {
        if *self == other {
            return false;
        }
        *self = other;
        true
    }

    /// 读取附加字段
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn status(&self) -> Option<ConnectionStatus> {
        self.field("status")
            .and_then(Value::as_str)
            .map(ConnectionStatus::from_str)
    }

    /// 设备当前支持的动作列表
    pub fn actions(&self) -> Vec<String> {
        match self.field("actions") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn battery(&self) -> Option<f64> {
        self.field("battery").and_then(Value::as_f64)
    }

    pub fn firmware_version(&self) -> Option<&str> {
        self.field("firmware_version").and_then(Value::as_str)
    }

    /// 最近一次被看到的时间（服务端 ISO 8601，可能不带时区）
    pub fn last_seen(&self) -> Option<NaiveDateTime> {
        let raw = self.field("last_seen")?.as_str()?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
    }

    /// 最近一次设备错误
    pub fn error(&self) -> Option<&str> {
        self.field("error").and_then(Value::as_str)
    }
}
