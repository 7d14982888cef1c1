// telemetry_link/src/dispatch.rs

//! 入站消息分发。
//!
//! `DispatchRouter` 把解码后的 `InboundMessage` 转换为宿主可见的副作用：
//! - `Registered` → 记录日志并置位 "注册已确认" 标志；
//! - `Command` → 交给宿主提供的命令处理器 (字符串对本层不透明)；
//! - `Unknown` → 记录日志后忽略。
//!
//! 入站消息永远不会影响连接状态。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common_models::ws_payloads::InboundMessage;
use log::{info, warn};

/// 宿主提供的命令处理器。
pub type CommandHandler = Arc<dyn Fn(String) + Send + Sync>;

pub struct DispatchRouter {
    registered: AtomicBool,
    command_handler: Option<CommandHandler>,
}

impl DispatchRouter {
    pub fn new(command_handler: Option<CommandHandler>) -> Self {
        Self {
            registered: AtomicBool::new(false),
            command_handler,
        }
    }

    pub fn on_inbound(&self, message: InboundMessage) {
        match message {
            InboundMessage::Registered => {
                self.registered.store(true, Ordering::SeqCst);
                info!("[消息分发] 采集端已确认设备注册");
            }
            InboundMessage::Command(command) => {
                info!("[消息分发] 收到采集端命令: {}", command);
                match &self.command_handler {
                    Some(handler) => handler(command),
                    None => warn!("[消息分发] 未设置命令处理器，命令被忽略"),
                }
            }
            InboundMessage::Unknown(tag) => {
                warn!("[消息分发] 忽略未知入站消息 (type: {:?})", tag);
            }
        }
    }

    /// 当前连接实例上的注册是否已被采集端确认。
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// 每次发送新的注册消息前清除确认标志。
    pub(crate) fn reset(&self) {
        self.registered.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for DispatchRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRouter")
            .field("registered", &self.is_registered())
            .field("has_command_handler", &self.command_handler.is_some())
            .finish()
    }
}
