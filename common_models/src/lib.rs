//! `common_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了设备遥测链路中各组件 (`telemetry_link` 连接库、`monitor_agent` 监控代理)
//! 共享的数据结构和枚举类型。
//!
//! 主要包含：
//! - **设备身份 (`device`)**: `DeviceIdentity` 与 `DeviceInfo`。
//! - **标量值 (`scalar`)**: 遥测负载中允许的标量类型及其有损强制转换规则。
//! - **WebSocket 消息 (`ws_payloads`)**: 出站信封 `OutboundEnvelope`、入站消息 `InboundMessage` 以及类型常量。
//! - **通用枚举 (`enums`)**: 连接状态 `ConnectionState`、日志级别 `LogLevel`。
//!
//! 所有跨进程传输的模型都派生 `serde::Serialize`/`Deserialize`，以及 `Debug` 和 `Clone`。

pub mod device;
pub mod enums;
pub mod scalar;
pub mod ws_payloads;

pub use device::{DeviceIdentity, DeviceInfo};
pub use enums::{ConnectionState, LogLevel};
pub use scalar::{ScalarValue, TelemetryMap};
pub use ws_payloads::{InboundMessage, OutboundEnvelope};
