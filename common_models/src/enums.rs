//! 通用枚举模块。
//!
//! 本模块定义了在遥测链路各组件之间共享的通用枚举类型。
//! 所有枚举都派生 `Serialize`, `Deserialize`, `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`，
//! 以支持状态上报、调试输出和比较。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 与采集端之间单一逻辑连接的状态。
///
/// 每个连接管理器只持有一个该状态实例，它是连接状态的唯一事实来源：
/// 不存在另一个独立的 "正在连接" 布尔标志。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// 未连接。可能有一个重连定时器在等待触发。
    #[default]
    Disconnected,
    /// 已发起连接尝试，等待传输层打开。
    Connecting,
    /// 连接已打开，注册消息已发送。
    Connected,
}

impl ConnectionState {
    /// 是否已连接。
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// 是否存在进行中或已建立的连接 (此时 `connect()` 不应再打开新的套接字)。
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// `log` 消息的级别。
///
/// 线上格式中级别是一个普通字符串 (例如 `"INFO"`)，此枚举只是构造消息时的便捷写法。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// 线上使用的字符串表示。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verbose => "VERBOSE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
