// common_models/src/ws_payloads.rs

//! 设备与采集端之间 WebSocket 通信的消息类型定义。
//!
//! 线上格式为文本帧，每帧一个 JSON 对象，对象中的 `type` 字段是类型判别符。
//! 出站方向 (设备 → 采集端) 由 `OutboundEnvelope` 表示，
//! 入站方向 (采集端 → 设备) 由 `InboundMessage` 表示。

use serde::{Deserialize, Serialize};

use crate::device::DeviceIdentity;
use crate::enums::LogLevel;
use crate::scalar::TelemetryMap;

/// 出站：设备注册。
pub const REGISTER_MESSAGE_TYPE: &str = "register";
/// 出站：遥测数据快照。
pub const DATA_MESSAGE_TYPE: &str = "data";
/// 出站：日志。
pub const LOG_MESSAGE_TYPE: &str = "log";
/// 出站：事件。
pub const EVENT_MESSAGE_TYPE: &str = "event";
/// 入站：注册确认。
pub const REGISTERED_MESSAGE_TYPE: &str = "registered";
/// 入站：命令。
pub const COMMAND_MESSAGE_TYPE: &str = "command";

/// 出站消息信封。
///
/// 序列化时 `type` 字段在前，其余字段按变体展开：
/// - `Register` → `device_id`, `info`
/// - `Data` → `payload`
/// - `Log` → `level`, `message`
/// - `Event` → `event_type`, `data`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEnvelope {
    /// 设备注册，每个连接实例上发送的第一条消息。
    Register(DeviceIdentity),
    /// 一次遥测快照。
    Data { payload: TelemetryMap },
    /// 一条日志。`level` 在线上是普通字符串，不限于 `LogLevel` 中的取值。
    Log { level: String, message: String },
    /// 带附加数据的事件。
    Event { event_type: String, data: TelemetryMap },
}

impl OutboundEnvelope {
    pub fn data(payload: TelemetryMap) -> Self {
        Self::Data { payload }
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level: level.as_str().to_string(),
            message: message.into(),
        }
    }

    /// 构造事件消息。未提供附加数据时传入空映射即可 (`TelemetryMap::new()`)。
    pub fn event(event_type: impl Into<String>, data: TelemetryMap) -> Self {
        Self::Event {
            event_type: event_type.into(),
            data,
        }
    }

    /// 线上 `type` 判别符。
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Register(_) => REGISTER_MESSAGE_TYPE,
            Self::Data { .. } => DATA_MESSAGE_TYPE,
            Self::Log { .. } => LOG_MESSAGE_TYPE,
            Self::Event { .. } => EVENT_MESSAGE_TYPE,
        }
    }
}

/// 入站消息。
///
/// 解析永远不会失败：无法识别的内容统一归为 `Unknown`，携带原始 `type` 标签 (若存在)。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// 采集端确认注册。
    Registered,
    /// 采集端下发的命令，内容对本层不透明。
    Command(String),
    /// 未知或无法解析的消息。
    Unknown(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceInfo;
    use crate::scalar::ScalarValue;

    #[test]
    /// `Register` 应把设备身份字段平铺到信封顶层。
    fn test_register_envelope_shape() {
        let identity = DeviceIdentity::new(
            "dev-1",
            DeviceInfo {
                device_name: "n".to_string(),
                model: "m".to_string(),
                manufacturer: "f".to_string(),
                os_version: "14".to_string(),
                platform_version: 34,
            },
        );
        let json = serde_json::to_string(&OutboundEnvelope::Register(identity)).expect("序列化失败");
        assert_eq!(
            json,
            r#"{"type":"register","device_id":"dev-1","info":{"device_name":"n","model":"m","manufacturer":"f","android_version":"14","sdk_version":34}}"#
        );
    }

    #[test]
    fn test_log_and_event_envelope_shape() {
        let log = OutboundEnvelope::log(LogLevel::Warn, "磁盘空间不足");
        assert_eq!(
            serde_json::to_string(&log).unwrap(),
            r#"{"type":"log","level":"WARN","message":"磁盘空间不足"}"#
        );

        let mut data = TelemetryMap::new();
        data.insert("from".to_string(), ScalarValue::from("wifi"));
        let event = OutboundEnvelope::event("network_changed", data);
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"event","event_type":"network_changed","data":{"from":"wifi"}}"#
        );

        let empty = OutboundEnvelope::event("boot", TelemetryMap::new());
        assert_eq!(
            serde_json::to_string(&empty).unwrap(),
            r#"{"type":"event","event_type":"boot","data":{}}"#
        );
    }

    #[test]
    fn test_message_type_matches_serialized_tag() {
        let envelopes = [
            OutboundEnvelope::data(TelemetryMap::new()),
            OutboundEnvelope::log(LogLevel::Info, "x"),
            OutboundEnvelope::event("e", TelemetryMap::new()),
        ];
        for envelope in envelopes {
            let value = serde_json::to_value(&envelope).unwrap();
            assert_eq!(value["type"], envelope.message_type());
        }
    }
}
