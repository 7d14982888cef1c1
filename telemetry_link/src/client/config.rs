// telemetry_link/src/client/config.rs

//! 连接管理器配置。
//!
//! 采集端地址在管理器生命周期内不可变。重连策略默认是固定 5 秒间隔、无限次重试；
//! 指数退避是可选的推广，同样没有次数上限。

use std::time::Duration;

use url::Url;

use crate::error::LinkError;

/// 默认连接超时。
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// 默认重连间隔。
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// 重连延迟策略。
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// 每次都等待相同的时间。
    Fixed(Duration),
    /// 随连续失败次数增长的延迟：`initial * multiplier^(n-1)`，不超过 `max`。
    /// 连接成功打开后失败计数清零。
    Backoff {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RECONNECT_INTERVAL)
    }
}

impl ReconnectPolicy {
    /// 第 `consecutive_failures` 次连续失败后的等待时间 (从 1 开始计数，0 按 1 处理)。
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        match self {
            Self::Fixed(interval) => *interval,
            Self::Backoff {
                initial,
                max,
                multiplier,
            } => {
                let exponent = consecutive_failures.saturating_sub(1).min(i32::MAX as u32) as i32;
                let factor = multiplier.max(1.0).powi(exponent);
                let secs = initial.as_secs_f64() * factor;
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

/// 连接管理器的配置。
#[derive(Debug, Clone)]
pub struct LinkConfig {
    endpoint: Url,
    connect_timeout: Duration,
    reconnect: ReconnectPolicy,
}

impl LinkConfig {
    /// 以默认超时和默认重连策略创建配置。地址必须是 `ws://` 或 `wss://`。
    pub fn new(endpoint: &str) -> Result<Self, LinkError> {
        let url = Url::parse(endpoint)
            .map_err(|e| LinkError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", endpoint, e)))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(LinkError::InvalidUrl(format!(
                    "不支持的协议 '{}' (仅支持 ws/wss): {}",
                    other, endpoint
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(LinkError::InvalidUrl(format!("URL 缺少主机名: {}", endpoint)));
        }
        Ok(Self {
            endpoint: url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        &self.reconnect
    }
}
