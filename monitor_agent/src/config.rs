// monitor_agent/src/config.rs

//! 监控代理的配置加载。
//!
//! 配置保存在 JSON 文件中 (默认 `agent_settings.json`，也可以由第一个命令行参数指定)。
//! 文件不存在或无法解析时使用默认配置并写回文件，程序继续运行。
//! 环境变量 `MONITOR_SERVER_URL` 会覆盖文件中的采集端地址。

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use telemetry_link::{LinkConfig, ReconnectPolicy};

use crate::error::AppError;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "agent_settings.json";
/// 覆盖采集端地址的环境变量
pub const SERVER_URL_ENV: &str = "MONITOR_SERVER_URL";
/// 默认采集端地址
pub const DEFAULT_SERVER_URL: &str = "ws://192.168.1.100:8765";

/// 设备身份相关配置。未填写的字段由宿主信息自动探测。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// 持久化设备 ID 的文件路径
    pub device_id_file: PathBuf,
    pub device_name: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub os_version: Option<String>,
    pub platform_version: Option<i64>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            device_id_file: PathBuf::from("device_id"),
            device_name: None,
            model: None,
            manufacturer: None,
            os_version: None,
            platform_version: None,
        }
    }
}

/// 监控代理的主配置结构体
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// 采集端 WebSocket 地址
    pub server_url: String,
    /// 连接超时（单位：毫秒）
    pub connect_timeout_ms: u64,
    /// 重连间隔（单位：毫秒）
    pub reconnect_interval_ms: u64,
    /// 设置后启用指数退避重连，值为最大间隔（单位：毫秒）
    pub reconnect_backoff_max_ms: Option<u64>,
    /// 遥测快照周期（单位：秒）
    pub data_interval_secs: u64,
    /// 日志批次周期（单位：秒）
    pub log_interval_secs: u64,
    /// 需要跟踪上报的日志文件，不设置则不上报日志
    pub log_file: Option<PathBuf>,
    /// 每个批次最多上报的日志行数
    pub log_batch_limit: usize,
    pub identity: IdentityConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout_ms: 5_000,
            reconnect_interval_ms: 5_000,
            reconnect_backoff_max_ms: None,
            data_interval_secs: 5,
            log_interval_secs: 30,
            log_file: None,
            log_batch_limit: 100,
            identity: IdentityConfig::default(),
        }
    }
}

impl AgentConfig {
    /// 用环境变量的值覆盖采集端地址 (空字符串视为未设置)。
    pub fn with_server_url_override(mut self, value: Option<String>) -> Self {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            info!("[配置模块] 采集端地址被环境变量 {} 覆盖为 {}", SERVER_URL_ENV, url);
            self.server_url = url;
        }
        self
    }

    /// 校验配置中无法由默认值兜底的部分。
    pub fn validate(&self) -> Result<(), AppError> {
        LinkConfig::new(&self.server_url)?;
        if self.connect_timeout_ms == 0 || self.reconnect_interval_ms == 0 {
            return Err(AppError::ConfigError(
                "connect_timeout_ms 和 reconnect_interval_ms 必须大于 0".to_string(),
            ));
        }
        if self.data_interval_secs == 0 || self.log_interval_secs == 0 {
            return Err(AppError::ConfigError(
                "data_interval_secs 和 log_interval_secs 必须大于 0".to_string(),
            ));
        }
        if self.log_batch_limit == 0 {
            return Err(AppError::ConfigError("log_batch_limit 必须大于 0".to_string()));
        }
        if let Some(max) = self.reconnect_backoff_max_ms {
            if max < self.reconnect_interval_ms {
                return Err(AppError::ConfigError(format!(
                    "reconnect_backoff_max_ms ({}) 不能小于 reconnect_interval_ms ({})",
                    max, self.reconnect_interval_ms
                )));
            }
        }
        Ok(())
    }

    /// 构造连接管理器配置。
    pub fn link_config(&self) -> Result<LinkConfig, AppError> {
        let interval = Duration::from_millis(self.reconnect_interval_ms);
        let policy = match self.reconnect_backoff_max_ms {
            Some(max) => ReconnectPolicy::Backoff {
                initial: interval,
                max: Duration::from_millis(max),
                multiplier: 2.0,
            },
            None => ReconnectPolicy::Fixed(interval),
        };
        Ok(LinkConfig::new(&self.server_url)?
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_reconnect_policy(policy))
    }

    pub fn data_interval(&self) -> Duration {
        Duration::from_secs(self.data_interval_secs)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_secs)
    }
}

/// 从命令行参数中取得配置文件路径 (第一个参数)，缺省为当前目录下的 `agent_settings.json`。
pub fn config_path_from_args(mut args: impl Iterator<Item = String>) -> PathBuf {
    args.nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// 加载或创建配置文件
pub fn load_or_create(path: &Path) -> AgentConfig {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AgentConfig>(&content) {
            Ok(config) => {
                info!("[配置模块] 已成功从配置文件 {:?} 加载代理配置。", path);
                config
            }
            Err(e) => {
                warn!(
                    "[配置模块] 警告：从 {:?} 反序列化配置失败: {}. 文件可能已损坏。将使用默认配置并尝试覆盖。",
                    path, e
                );
                let default_config = AgentConfig::default();
                save_config(&default_config, path);
                default_config
            }
        },
        Err(e) => {
            info!(
                "[配置模块] 未在 {:?} 找到配置文件或读取时发生错误 (错误: {}). 将使用默认配置并尝试创建新文件。",
                path, e
            );
            let default_config = AgentConfig::default();
            save_config(&default_config, path);
            default_config
        }
    }
}

/// 保存配置到文件。失败只记录警告。
pub fn save_config(config: &AgentConfig, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("[配置模块] 错误：创建配置目录 {:?} 失败: {}", parent, e);
                return;
            }
        }
    }

    match serde_json::to_string_pretty(config) {
        Ok(content) => {
            if let Err(e) = fs::write(path, content) {
                warn!("[配置模块] 错误：将配置写入文件 {:?} 时失败: {}", path, e);
            } else {
                info!("[配置模块] 已将当前配置保存到 {:?}.", path);
            }
        }
        Err(e) => {
            warn!("[配置模块] 错误：序列化配置信息以便保存时失败: {}", e);
        }
    }
}
