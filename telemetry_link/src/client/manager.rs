// telemetry_link/src/client/manager.rs

//! 连接管理器。
//!
//! `ConnectionManager` 持有唯一的套接字句柄、连接状态机和重连定时器，对外提供
//! `connect` / `disconnect` / `send` 以及状态查询。
//!
//! 并发模型：
//! - 一个长期运行的事件循环任务消费传输层事件和定时器事件；
//! - 重连定时器是一个可中止的任务，任何时刻最多只有一个；
//! - 所有状态转换和套接字写入都在同一个 `tokio::sync::Mutex` 下进行，
//!   因此注册消息总是在任何其他出站消息之前写入新连接；
//! - 宿主回调和入站分发在释放锁之后执行，回调中可以安全地再次调用管理器。

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use common_models::device::DeviceIdentity;
use common_models::enums::{ConnectionState, LogLevel};
use common_models::scalar::TelemetryMap;
use common_models::ws_payloads::OutboundEnvelope;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::config::LinkConfig;
use super::state::{Action, LinkCore, LinkEvent, Notice};
use super::transport::{Connector, Socket, SocketEvents, WsConnector};
use crate::codec;
use crate::dispatch::{CommandHandler, DispatchRouter};
use crate::error::LinkError;
use crate::identity::IdentityProvider;

pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// 宿主注册的回调集合。
#[derive(Clone, Default)]
pub struct LinkCallbacks {
    on_connected: Option<LifecycleCallback>,
    on_disconnected: Option<LifecycleCallback>,
    on_error: Option<ErrorCallback>,
    on_command: Option<CommandHandler>,
}

impl LinkCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接打开且注册消息已发送后调用。
    pub fn on_connected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(f));
        self
    }

    /// 已建立的连接断开时调用 (包括主动断开)。
    pub fn on_disconnected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(f));
        self
    }

    /// 传输错误时调用，参数为错误描述。
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// 收到采集端命令时调用。
    pub fn on_command(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_command = Some(Arc::new(f));
        self
    }
}

/// 链路状态快照。
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LinkStatus {
    pub state: ConnectionState,
    /// 当前连接上的注册是否已被采集端确认。
    pub registered: bool,
    pub connect_attempts: u64,
    pub reconnects_scheduled: u64,
    pub reconnect_pending: bool,
    pub last_connected_at: Option<DateTime<Utc>>,
}

struct Link {
    core: LinkCore,
    socket: Option<Box<dyn Socket>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(mut socket) = self.socket.take() {
            socket.close();
        }
    }
}

struct Inner {
    config: LinkConfig,
    identity: DeviceIdentity,
    connector: Arc<dyn Connector>,
    link: Mutex<Link>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    router: DispatchRouter,
    callbacks: LinkCallbacks,
}

/// 与采集端之间单一逻辑连接的管理器。克隆得到的是同一个管理器的新句柄。
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// 使用 `tokio-tungstenite` 传输层创建管理器。必须在 Tokio 运行时内调用。
    ///
    /// 设备身份在此处解析一次，之后在管理器生命周期内保持不变。
    pub fn new(
        config: LinkConfig,
        identity: &dyn IdentityProvider,
        callbacks: LinkCallbacks,
    ) -> Result<Self, LinkError> {
        Self::with_connector(config, identity, callbacks, Arc::new(WsConnector))
    }

    /// 使用自定义传输层创建管理器。
    pub fn with_connector(
        config: LinkConfig,
        identity: &dyn IdentityProvider,
        callbacks: LinkCallbacks,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, LinkError> {
        let identity = identity.identity()?;
        info!(
            "[连接管理器] 设备 {} 将连接到 {}",
            identity.device_id,
            config.endpoint()
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            config: config.clone(),
            identity,
            connector,
            link: Mutex::new(Link {
                core: LinkCore::new(config.reconnect_policy().clone()),
                socket: None,
                reconnect_timer: None,
            }),
            events_tx,
            router: DispatchRouter::new(callbacks.on_command.clone()),
            callbacks,
        });
        spawn_event_loop(Arc::downgrade(&inner), events_rx);
        Ok(Self { inner })
    }

    /// 发起连接。已在连接中或已连接时立即返回，不会打开第二个套接字。
    ///
    /// 只负责启动异步连接尝试，不等待连接结果；失败通过 `on_error` 回调上报并自动重连。
    pub async fn connect(&self) {
        self.inner.apply(|core| core.connect()).await;
    }

    /// 主动断开。取消等待中的重连，关闭套接字，并抑制随后的自动重连。可重复调用。
    pub async fn disconnect(&self) {
        self.inner.apply(|core| core.disconnect()).await;
    }

    /// 发送一条出站消息。
    ///
    /// 未连接时静默丢弃 (不缓冲、不报错)；写入失败按意外断开处理。
    pub async fn send(&self, envelope: OutboundEnvelope) {
        let mut deferred = Vec::new();
        {
            let mut link = self.inner.link.lock().await;
            if !link.core.state().is_connected() {
                debug!(
                    "[连接管理器] 未连接 (状态 {})，丢弃 {} 消息",
                    link.core.state(),
                    envelope.message_type()
                );
                return;
            }
            if let Err(description) = Inner::write(&mut link, &envelope) {
                warn!("[连接管理器] 发送 {} 消息失败: {}", envelope.message_type(), description);
                let actions = link.core.send_failed(description);
                self.inner.run_actions(&mut link, actions, &mut deferred);
            }
        }
        self.inner.dispatch(deferred);
    }

    pub async fn send_data(&self, payload: TelemetryMap) {
        self.send(OutboundEnvelope::data(payload)).await;
    }

    pub async fn send_log(&self, level: LogLevel, message: impl Into<String>) {
        self.send(OutboundEnvelope::log(level, message)).await;
    }

    pub async fn send_event(&self, event_type: impl Into<String>, data: TelemetryMap) {
        self.send(OutboundEnvelope::event(event_type, data)).await;
    }

    /// 遥测数据源推送一次快照。
    pub async fn push_snapshot(&self, snapshot: TelemetryMap) {
        self.send_data(snapshot).await;
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.link.lock().await.core.state()
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await.is_connected()
    }

    pub async fn status(&self) -> LinkStatus {
        let link = self.inner.link.lock().await;
        LinkStatus {
            state: link.core.state(),
            registered: self.inner.router.is_registered(),
            connect_attempts: link.core.connect_attempts(),
            reconnects_scheduled: link.core.reconnects_scheduled(),
            reconnect_pending: link.core.reconnect_pending(),
            last_connected_at: link.core.last_connected_at(),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }
}

impl Inner {
    /// 在互斥域内执行一次状态转换及其产生的全部动作，然后在锁外分发通知。
    async fn apply(&self, transition: impl FnOnce(&mut LinkCore) -> Vec<Action>) {
        let mut deferred = Vec::new();
        {
            let mut link = self.link.lock().await;
            let actions = transition(&mut link.core);
            self.run_actions(&mut link, actions, &mut deferred);
        }
        self.dispatch(deferred);
    }

    async fn handle_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::Socket { attempt, event } => {
                self.apply(|core| core.on_socket(attempt, event)).await
            }
            LinkEvent::ReconnectDue { generation } => {
                self.apply(|core| core.on_reconnect_due(generation)).await
            }
        }
    }

    fn run_actions(&self, link: &mut Link, actions: Vec<Action>, deferred: &mut Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Open { attempt } => {
                    if let Some(mut stale) = link.socket.take() {
                        stale.close();
                    }
                    let events = SocketEvents::new(attempt, self.events_tx.clone());
                    link.socket = Some(self.connector.open(&self.config, events));
                }
                Action::CloseSocket => {
                    if let Some(mut socket) = link.socket.take() {
                        socket.close();
                    }
                }
                Action::SendRegister => {
                    self.router.reset();
                    let register = OutboundEnvelope::Register(self.identity.clone());
                    match Self::write(link, &register) {
                        Ok(()) => info!("[连接管理器] 已发送设备注册 ({})", self.identity.device_id),
                        Err(description) => {
                            error!("[连接管理器] 发送设备注册失败: {}", description);
                            queue.extend(link.core.send_failed(description));
                        }
                    }
                }
                Action::ScheduleReconnect { generation, delay } => {
                    if let Some(previous) = link.reconnect_timer.take() {
                        previous.abort();
                    }
                    let tx = self.events_tx.clone();
                    link.reconnect_timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(LinkEvent::ReconnectDue { generation });
                    }));
                }
                Action::CancelReconnect => {
                    if let Some(timer) = link.reconnect_timer.take() {
                        timer.abort();
                    }
                }
                Action::Deliver(_) | Action::Notify(_) => deferred.push(action),
            }
        }
    }

    /// 编码并写入当前套接字。错误以描述字符串返回，供状态机按断开处理。
    fn write(link: &mut Link, envelope: &OutboundEnvelope) -> Result<(), String> {
        let text = codec::encode(envelope).map_err(|e| e.to_string())?;
        match link.socket.as_mut() {
            Some(socket) => socket.send_text(text).map_err(|e| e.to_string()),
            None => Err(LinkError::SendErrorClosed.to_string()),
        }
    }

    fn dispatch(&self, deferred: Vec<Action>) {
        for action in deferred {
            match action {
                Action::Notify(Notice::Connected) => {
                    if let Some(cb) = &self.callbacks.on_connected {
                        cb();
                    }
                }
                Action::Notify(Notice::Disconnected) => {
                    if let Some(cb) = &self.callbacks.on_disconnected {
                        cb();
                    }
                }
                Action::Notify(Notice::Error(description)) => {
                    if let Some(cb) = &self.callbacks.on_error {
                        cb(description.as_str());
                    }
                }
                Action::Deliver(text) => self.router.on_inbound(codec::decode(&text)),
                _ => {}
            }
        }
    }
}

fn spawn_event_loop(inner: Weak<Inner>, mut events_rx: mpsc::UnboundedReceiver<LinkEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.handle_event(event).await;
        }
        debug!("[连接管理器] 事件循环结束");
    });
}
