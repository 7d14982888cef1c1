// telemetry_link/src/codec.rs

//! 消息编解码。
//!
//! 出站方向把 `OutboundEnvelope` 编码为一帧 JSON 文本；入站方向把收到的文本解析为
//! `InboundMessage`。解码对调用方永不失败：非 JSON 文本、缺少 `type` 字段、未知类型
//! 都会得到 `InboundMessage::Unknown`，并只记录一条日志。

use common_models::ws_payloads::{
    InboundMessage, OutboundEnvelope, COMMAND_MESSAGE_TYPE, REGISTERED_MESSAGE_TYPE,
};
use log::{debug, warn};
use serde::Deserialize;

use crate::error::LinkError;

/// 入站帧的宽松视图。其他字段一律忽略。
#[derive(Deserialize, Debug)]
struct InboundFrame {
    #[serde(rename = "type")]
    message_type: Option<serde_json::Value>,
    command: Option<serde_json::Value>,
}

/// 日志中最多打印的原始文本长度 (按字符计)。
const LOG_PREVIEW_CHARS: usize = 120;

pub(crate) fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}

/// 将出站信封编码为线上文本。
///
/// 输出是确定的：负载映射按键排序，`type` 判别符总在第一个字段。
pub fn encode(envelope: &OutboundEnvelope) -> Result<String, LinkError> {
    serde_json::to_string(envelope).map_err(|e| {
        LinkError::SerializationError(format!(
            "编码 {} 消息失败: {}",
            envelope.message_type(),
            e
        ))
    })
}

/// 将入站文本解析为 `InboundMessage`。
pub fn decode(text: &str) -> InboundMessage {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("[消息编解码] 入站文本不是合法的消息对象，已丢弃: {} (原文: '{}')", e, preview(text));
            return InboundMessage::Unknown(None);
        }
    };

    let message_type = match frame.message_type {
        Some(serde_json::Value::String(t)) => t,
        Some(other) => {
            warn!("[消息编解码] 入站消息的 type 字段不是字符串: {}", other);
            return InboundMessage::Unknown(None);
        }
        None => {
            warn!("[消息编解码] 入站消息缺少 type 字段 (原文: '{}')", preview(text));
            return InboundMessage::Unknown(None);
        }
    };

    match message_type.as_str() {
        REGISTERED_MESSAGE_TYPE => InboundMessage::Registered,
        COMMAND_MESSAGE_TYPE => match frame.command {
            Some(serde_json::Value::String(command)) => InboundMessage::Command(command),
            _ => {
                warn!("[消息编解码] command 消息缺少字符串类型的 command 字段，按未知消息处理");
                InboundMessage::Unknown(Some(message_type))
            }
        },
        _ => {
            debug!("[消息编解码] 未识别的入站消息类型: '{}'", message_type);
            InboundMessage::Unknown(Some(message_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::scalar::{ScalarValue, TelemetryMap};
    use common_models::LogLevel;

    #[test]
    /// 数据消息的编码必须逐字节匹配约定的线上格式。
    fn test_encode_data_exact() {
        let mut payload = TelemetryMap::new();
        payload.insert("level".to_string(), ScalarValue::from(87));
        let text = encode(&OutboundEnvelope::data(payload)).expect("编码失败");
        assert_eq!(text, r#"{"type":"data","payload":{"level":87}}"#);
    }

    #[test]
    fn test_encode_log() {
        let text = encode(&OutboundEnvelope::log(LogLevel::Info, "x")).unwrap();
        assert_eq!(text, r#"{"type":"log","level":"INFO","message":"x"}"#);
    }

    #[test]
    /// 非 JSON、空对象、未知类型都解析为 `Unknown`，且不会 panic。
    fn test_decode_is_robust() {
        assert_eq!(decode("not json"), InboundMessage::Unknown(None));
        assert_eq!(decode("{}"), InboundMessage::Unknown(None));
        assert_eq!(decode(r#"{"type":"bogus"}"#), InboundMessage::Unknown(Some("bogus".to_string())));
        assert_eq!(decode(r#"{"type":42}"#), InboundMessage::Unknown(None));
        assert_eq!(decode("[1,2,3]"), InboundMessage::Unknown(None));
        assert_eq!(decode(""), InboundMessage::Unknown(None));
    }

    #[test]
    fn test_decode_known_types() {
        assert_eq!(decode(r#"{"type":"registered"}"#), InboundMessage::Registered);
        assert_eq!(
            decode(r#"{"type":"command","command":"reboot","extra":1}"#),
            InboundMessage::Command("reboot".to_string())
        );
        // 缺少 command 字段的命令消息不会被当作空命令执行
        assert_eq!(
            decode(r#"{"type":"command"}"#),
            InboundMessage::Unknown(Some("command".to_string()))
        );
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "遥".repeat(LOG_PREVIEW_CHARS + 10);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), LOG_PREVIEW_CHARS + 3);
        assert_eq!(preview("短"), "短");
    }
}
