// monitor_agent/src/agent.rs

//! 监控代理：把配置、设备身份、连接管理器和数据源组装在一起。

use log::{error, info, warn};
use std::sync::Arc;
use telemetry_link::{
    ConnectionManager, Connector, FeedHandle, LinkCallbacks, LogSource, PersistentIdentity,
    SnapshotSource, TelemetryFeed, WsConnector,
};

use crate::config::AgentConfig;
use crate::device::resolve_device_info;
use crate::error::AppError;
use crate::sources::{LogTailSource, ProcSnapshotSource};

/// 长期运行的监控代理。
pub struct MonitorAgent {
    config: AgentConfig,
    manager: ConnectionManager,
    feeds: Vec<FeedHandle>,
}

impl MonitorAgent {
    /// 使用真实 WebSocket 传输层创建代理。必须在 Tokio 运行时内调用。
    pub fn new(config: AgentConfig) -> Result<Self, AppError> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(config: AgentConfig, connector: Arc<dyn Connector>) -> Result<Self, AppError> {
        config.validate()?;
        let link_config = config.link_config()?;
        let identity = PersistentIdentity::new(
            config.identity.device_id_file.clone(),
            resolve_device_info(&config.identity),
        );

        let callbacks = LinkCallbacks::new()
            .on_connected(|| info!("[监控代理] 已连接到采集端，开始上报"))
            .on_disconnected(|| warn!("[监控代理] 与采集端的连接已断开"))
            .on_error(|description| error!("[监控代理] 链路错误: {}", description))
            .on_command(|command| info!("[监控代理] 收到采集端命令 (暂不执行): {}", command));

        let manager = ConnectionManager::with_connector(link_config, &identity, callbacks, connector)?;
        info!(
            "[监控代理] 设备 {} ({} / {}) 已就绪，设备 ID 文件 {:?}，采集端 {}",
            manager.identity().device_id,
            manager.identity().info.manufacturer,
            manager.identity().info.model,
            identity.id_path(),
            manager.config().endpoint()
        );
        Ok(Self {
            config,
            manager,
            feeds: Vec::new(),
        })
    }

    /// 发起连接并启动采集任务。重复调用不会启动第二组任务。
    pub async fn start(&mut self) {
        self.manager.connect().await;
        if !self.feeds.is_empty() {
            return;
        }

        let feed = TelemetryFeed::new(self.manager.clone());
        let snapshots: Arc<dyn SnapshotSource> = Arc::new(ProcSnapshotSource::new());
        self.feeds
            .push(feed.spawn_snapshots(snapshots, self.config.data_interval()));

        match &self.config.log_file {
            Some(path) => {
                let logs: Arc<dyn LogSource> =
                    Arc::new(LogTailSource::new(path.clone(), self.config.log_batch_limit));
                self.feeds.push(feed.spawn_logs(logs, self.config.log_interval()));
            }
            None => info!("[监控代理] 未配置 log_file，不上报日志批次"),
        }
    }

    /// 停止采集任务并断开连接。
    pub async fn stop(&mut self) {
        for handle in self.feeds.drain(..) {
            if handle.is_finished() {
                warn!("[监控代理] 有采集任务在停止前已意外退出");
            }
            handle.stop();
        }
        self.manager.disconnect().await;
        info!("[监控代理] 已停止");
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}
