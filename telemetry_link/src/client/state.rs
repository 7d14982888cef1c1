// telemetry_link/src/client/state.rs

//! 连接状态机。
//!
//! `LinkCore` 是一个不做任何 I/O 的纯状态转换函数集合：每个输入 (显式调用或传输层事件)
//! 返回一组 `Action`，由连接管理器在同一个互斥域内依次执行。
//!
//! 两个单调递增的计数器保证过期输入被忽略：
//! - `attempt`：当前连接尝试编号。断开 (无论主动还是意外) 时递增，旧套接字的事件随之失效。
//! - `reconnect_generation`：重连定时器代数。每次调度、取消都会递增，旧定时器触发时不再生效。

use std::time::Duration;

use chrono::{DateTime, Utc};
use common_models::enums::ConnectionState;
use log::{debug, info, warn};

use super::config::ReconnectPolicy;
use super::transport::SocketEvent;

/// 管理器事件队列中的条目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkEvent {
    /// 来自某次连接尝试的传输层事件。
    Socket { attempt: u64, event: SocketEvent },
    /// 某一代重连定时器到期。
    ReconnectDue { generation: u64 },
}

/// 通知宿主的生命周期事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notice {
    Connected,
    Disconnected,
    Error(String),
}

/// 状态转换产生的副作用，由管理器执行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// 为指定尝试打开新的套接字。
    Open { attempt: u64 },
    /// 关闭并丢弃当前套接字。
    CloseSocket,
    /// 立即在当前套接字上发送注册消息。
    SendRegister,
    /// 替换 (而不是叠加) 重连定时器。
    ScheduleReconnect { generation: u64, delay: Duration },
    CancelReconnect,
    /// 把入站文本交给编解码和分发。
    Deliver(String),
    Notify(Notice),
}

#[derive(Debug)]
pub(crate) struct LinkCore {
    state: ConnectionState,
    attempt: u64,
    reconnect_generation: u64,
    reconnect_pending: bool,
    consecutive_failures: u32,
    policy: ReconnectPolicy,
    connect_attempts: u64,
    reconnects_scheduled: u64,
    last_connected_at: Option<DateTime<Utc>>,
}

impl LinkCore {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            reconnect_generation: 0,
            reconnect_pending: false,
            consecutive_failures: 0,
            policy,
            connect_attempts: 0,
            reconnects_scheduled: 0,
            last_connected_at: None,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    pub(crate) fn reconnects_scheduled(&self) -> u64 {
        self.reconnects_scheduled
    }

    pub(crate) fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub(crate) fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        self.last_connected_at
    }

    /// 发起连接。已有进行中或已建立的连接时什么也不做。
    pub(crate) fn connect(&mut self) -> Vec<Action> {
        if self.state.is_active() {
            debug!("[连接状态机] 当前状态为 {}，忽略重复的连接请求", self.state);
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.reconnect_pending {
            // 手动连接抢先于等待中的重连定时器
            self.reconnect_pending = false;
            self.reconnect_generation += 1;
            actions.push(Action::CancelReconnect);
        }

        self.attempt += 1;
        self.connect_attempts += 1;
        self.state = ConnectionState::Connecting;
        info!("[连接状态机] Disconnected -> Connecting (尝试 #{})", self.attempt);
        actions.push(Action::Open {
            attempt: self.attempt,
        });
        actions
    }

    /// 主动断开。总是使等待中的重连失效；已断开时除此之外什么也不做。
    pub(crate) fn disconnect(&mut self) -> Vec<Action> {
        self.reconnect_generation += 1;
        self.reconnect_pending = false;
        let mut actions = vec![Action::CancelReconnect];

        let previous = self.state;
        if previous == ConnectionState::Disconnected {
            debug!("[连接状态机] 已处于断开状态，disconnect 无需处理");
            return actions;
        }

        // 递增尝试编号，使随后到达的关闭事件被视为过期，从而不会触发重连
        self.attempt += 1;
        self.state = ConnectionState::Disconnected;
        info!("[连接状态机] {} -> Disconnected (主动断开)", previous);
        actions.push(Action::CloseSocket);
        if previous == ConnectionState::Connected {
            actions.push(Action::Notify(Notice::Disconnected));
        }
        actions
    }

    /// 当前连接上的写入失败，按意外断开处理。
    pub(crate) fn send_failed(&mut self, description: String) -> Vec<Action> {
        let attempt = self.attempt;
        self.on_socket(attempt, SocketEvent::Error(description))
    }

    pub(crate) fn on_socket(&mut self, attempt: u64, event: SocketEvent) -> Vec<Action> {
        if attempt != self.attempt {
            debug!(
                "[连接状态机] 忽略过期尝试 #{} 的事件 (当前尝试 #{}): {:?}",
                attempt, self.attempt, event
            );
            return Vec::new();
        }

        match event {
            SocketEvent::Opened => {
                if self.state != ConnectionState::Connecting {
                    warn!("[连接状态机] 状态 {} 下收到 Opened 事件，已忽略", self.state);
                    return Vec::new();
                }
                self.state = ConnectionState::Connected;
                self.consecutive_failures = 0;
                self.last_connected_at = Some(Utc::now());
                info!("[连接状态机] Connecting -> Connected (尝试 #{})", self.attempt);
                vec![Action::SendRegister, Action::Notify(Notice::Connected)]
            }
            SocketEvent::Message(text) => {
                if self.state == ConnectionState::Connected {
                    vec![Action::Deliver(text)]
                } else {
                    debug!("[连接状态机] 状态 {} 下收到消息，已丢弃", self.state);
                    Vec::new()
                }
            }
            SocketEvent::Closed { by_server, reason } => {
                info!(
                    "[连接状态机] 连接关闭 (对端发起: {}, 原因: {})",
                    by_server, reason
                );
                self.connection_lost()
            }
            SocketEvent::Error(description) => {
                warn!("[连接状态机] 传输错误: {}", description);
                let mut actions = vec![Action::Notify(Notice::Error(description))];
                actions.extend(self.connection_lost());
                actions
            }
        }
    }

    /// 重连定时器到期。只有最新一代且仍在等待的定时器有效。
    pub(crate) fn on_reconnect_due(&mut self, generation: u64) -> Vec<Action> {
        if !self.reconnect_pending || generation != self.reconnect_generation {
            debug!(
                "[连接状态机] 忽略过期的重连定时器 (代数 {}，当前 {})",
                generation, self.reconnect_generation
            );
            return Vec::new();
        }
        self.reconnect_pending = false;
        info!("[连接状态机] 重连定时器到期，重新连接");
        let mut actions = vec![Action::CancelReconnect];
        actions.extend(self.connect());
        actions
    }

    fn connection_lost(&mut self) -> Vec<Action> {
        let previous = self.state;
        if previous == ConnectionState::Disconnected {
            return Vec::new();
        }

        self.attempt += 1;
        self.state = ConnectionState::Disconnected;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        info!("[连接状态机] {} -> Disconnected", previous);

        let mut actions = vec![Action::CloseSocket];
        if previous == ConnectionState::Connected {
            actions.push(Action::Notify(Notice::Disconnected));
        }
        actions.push(self.schedule_reconnect());
        actions
    }

    fn schedule_reconnect(&mut self) -> Action {
        self.reconnect_generation += 1;
        self.reconnect_pending = true;
        self.reconnects_scheduled += 1;
        let delay = self.policy.delay(self.consecutive_failures);
        info!(
            "[连接状态机] {:?} 后重连 (连续失败 {} 次)",
            delay, self.consecutive_failures
        );
        Action::ScheduleReconnect {
            generation: self.reconnect_generation,
            delay,
        }
    }
}
