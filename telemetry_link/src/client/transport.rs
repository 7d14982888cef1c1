// telemetry_link/src/client/transport.rs

//! 客户端传输层。
//!
//! 连接管理器不直接持有 WebSocket 流，而是通过 `Connector`/`Socket` 两个 trait 与传输层交互：
//! - `Connector::open` 立即返回一个 `Socket` 句柄，真正的连接在后台异步进行；
//! - 传输层把打开、消息、关闭、错误等事件通过 `SocketEvents` 投递到管理器的事件队列，
//!   每个事件都带有所属的连接尝试编号，过期尝试的事件会被管理器忽略。
//!
//! 生产实现 `WsConnector` 基于 `tokio-tungstenite`；测试可以注入假的传输层。

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    tungstenite::Error as TungsteniteError,
};
use url::Url;

use super::config::LinkConfig;
use super::state::LinkEvent;
use crate::codec::preview;
use crate::error::LinkError;

/// 传输层上报给连接管理器的事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// 连接已打开 (握手完成)。
    Opened,
    /// 收到一帧文本消息。
    Message(String),
    /// 连接被关闭。`by_server` 表示由对端发起。
    Closed { by_server: bool, reason: String },
    /// 传输错误 (连接失败、超时、读写失败)，携带错误描述。
    Error(String),
}

/// 某一次连接尝试的事件投递端。
///
/// 传输层对同一次尝试最多投递一个终止事件 (`Closed` 或 `Error`)；
/// 管理器本身也会忽略终止之后的任何事件。
#[derive(Debug, Clone)]
pub struct SocketEvents {
    attempt: u64,
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl SocketEvents {
    pub(crate) fn new(attempt: u64, tx: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self { attempt, tx }
    }

    /// 本次连接尝试的编号。
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    fn emit(&self, event: SocketEvent) {
        // 管理器已被销毁时发送失败，事件直接丢弃即可
        let _ = self.tx.send(LinkEvent::Socket {
            attempt: self.attempt,
            event,
        });
    }

    pub fn opened(&self) {
        self.emit(SocketEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(SocketEvent::Message(text.into()));
    }

    pub fn closed(&self, by_server: bool, reason: impl Into<String>) {
        self.emit(SocketEvent::Closed {
            by_server,
            reason: reason.into(),
        });
    }

    pub fn error(&self, description: impl Into<String>) {
        self.emit(SocketEvent::Error(description.into()));
    }
}

/// 一个已发起的连接的写入句柄。
pub trait Socket: Send {
    /// 写入一帧文本。失败时管理器按意外断开处理。
    fn send_text(&mut self, text: String) -> Result<(), LinkError>;

    /// 主动关闭连接。关闭后传输层不应再投递事件 (即使投递也会被忽略)。
    fn close(&mut self);
}

/// 打开连接的工厂。
pub trait Connector: Send + Sync + 'static {
    /// 发起一次连接尝试并立即返回，不得阻塞调用方。
    fn open(&self, config: &LinkConfig, events: SocketEvents) -> Box<dyn Socket>;
}

/// 写任务的输入。
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// 基于 `tokio-tungstenite` 的生产传输层。
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, config: &LinkConfig, events: SocketEvents) -> Box<dyn Socket> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(
            config.endpoint().clone(),
            config.connect_timeout(),
            events,
            rx,
        ));
        Box::new(WsSocket { tx })
    }
}

/// `WsConnector` 返回的句柄。写入只是把帧交给后台任务；后台任务退出后写入失败。
struct WsSocket {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Socket for WsSocket {
    fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        self.tx
            .send(Outgoing::Text(text))
            .map_err(|_| LinkError::SendErrorClosed)
    }

    fn close(&mut self) {
        let _ = self.tx.send(Outgoing::Close);
    }
}

/// 单个连接实例的后台任务：建立连接，然后在一个 `select!` 循环里同时处理写入与读取。
async fn run_socket(
    url: Url,
    connect_timeout: Duration,
    events: SocketEvents,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    let attempt = events.attempt();
    info!("[传输层] 尝试 #{} 开始连接 {}", attempt, url);

    // 握手期间同样监听关闭指令：被取消的尝试直接丢弃未完成的握手，不再占用采集端连接
    let connect = tokio::time::timeout(connect_timeout, connect_async(url.as_str()));
    tokio::pin!(connect);
    let connected = loop {
        tokio::select! {
            result = &mut connect => break result,
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(text)) => {
                    warn!("[传输层] 尝试 #{} 尚未连接，丢弃: {}", attempt, preview(&text));
                }
                Some(Outgoing::Close) | None => {
                    info!("[传输层] 尝试 #{} 在握手完成前被取消", attempt);
                    return;
                }
            },
        }
    };

    let ws_stream = match connected {
        Ok(Ok((ws_stream, response))) => {
            info!("[传输层] 尝试 #{} 已连接到 {} (HTTP 状态码: {})", attempt, url, response.status());
            ws_stream
        }
        Ok(Err(e)) => {
            error!("[传输层] 尝试 #{} 连接 {} 失败: {}", attempt, url, e);
            events.error(LinkError::from(e).to_string());
            return;
        }
        Err(_) => {
            error!("[传输层] 尝试 #{} 连接 {} 超时 ({:?})", attempt, url, connect_timeout);
            events.error(LinkError::ConnectionTimeout.to_string());
            return;
        }
    };

    events.opened();
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(text)) => {
                    debug!("[传输层] 尝试 #{} 发送: {}", attempt, preview(&text));
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        error!("[传输层] 尝试 #{} 写入失败: {}", attempt, e);
                        events.error(LinkError::from(e).to_string());
                        return;
                    }
                }
                // 主动关闭，或句柄已被丢弃
                Some(Outgoing::Close) | None => {
                    debug!("[传输层] 尝试 #{} 主动关闭连接", attempt);
                    let _ = ws_sender.send(Message::Close(None)).await;
                    let _ = ws_sender.close().await;
                    return;
                }
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!("[传输层] 尝试 #{} 收到: {}", attempt, preview(&text));
                    events.message(text);
                }
                Some(Ok(Message::Binary(bin))) => {
                    warn!("[传输层] 尝试 #{} 收到非预期的二进制消息 ({} 字节)，已忽略", attempt, bin.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "无关闭帧".to_string());
                    info!("[传输层] 尝试 #{} 对端关闭连接: {}", attempt, reason);
                    events.closed(true, reason);
                    return;
                }
                // Ping/Pong 由 tungstenite 自动处理
                Some(Ok(_)) => {}
                Some(Err(TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed)) | None => {
                    info!("[传输层] 尝试 #{} 连接已结束", attempt);
                    events.closed(true, "连接已结束");
                    return;
                }
                Some(Err(e)) => {
                    error!("[传输层] 尝试 #{} 读取失败: {}", attempt, e);
                    events.error(LinkError::from(e).to_string());
                    return;
                }
            },
        }
    }
}
