// monitor_agent/src/error.rs

use telemetry_link::LinkError;
use thiserror::Error;

/// 监控代理的错误类型
///
/// 只在启动阶段出现：配置不合法、链路构造失败、文件读写失败。
/// 运行期间的传输错误由链路库自行恢复，不会变成 `AppError`。
#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("遥测链路错误: {0}")]
    Link(#[from] LinkError),

    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}
