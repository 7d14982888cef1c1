// telemetry_link/src/error.rs

//! 遥测链路库的错误类型。
//!
//! 链路运行期间的传输错误 (连接超时、套接字重置、写入失败) 在库内部恢复，
//! 只通过 `on_error` 回调上报，不会以 `Result` 的形式返回给调用方。
//! 因此 `LinkError` 主要出现在构造阶段 (地址校验、设备身份解析) 和传输层内部。

use thiserror::Error;

/// 遥测链路库的统一错误类型。
#[derive(Error, Debug)]
pub enum LinkError {
    /// 无效的采集端地址 (无法解析，或协议不是 `ws`/`wss`)。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 出站信封序列化失败。
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// WebSocket 协议相关的错误。
    #[error("WebSocket协议错误: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    /// 底层 I/O 错误。
    #[error("I/O错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 连接在配置的超时时间内未能建立。
    #[error("连接超时")]
    ConnectionTimeout,

    /// 当尝试写入一个已关闭的套接字通道时发生。
    #[error("发送错误: 通道已关闭")]
    SendErrorClosed,

    /// 设备身份无法解析 (例如设备 ID 文件损坏)。
    #[error("设备身份错误: {0}")]
    Identity(String),
}
