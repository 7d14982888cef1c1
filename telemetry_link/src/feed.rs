// telemetry_link/src/feed.rs

//! 遥测数据源适配层。
//!
//! 外部数据源按固定周期被拉取一次，结果交给连接管理器的发送路径。
//! 未连接时跳过拉取 (发送本来也会被丢弃)，不做任何缓冲。

use std::sync::Arc;
use std::time::Duration;

use common_models::scalar::TelemetryMap;
use common_models::ws_payloads::OutboundEnvelope;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::manager::ConnectionManager;

/// 周期性快照的默认间隔。
pub const DEFAULT_SNAPSHOT_PERIOD: Duration = Duration::from_secs(5);
/// 日志批次的默认间隔。
pub const DEFAULT_LOG_PERIOD: Duration = Duration::from_secs(30);

/// `interval` 不接受零周期；零值退回到该采集任务的默认周期。
fn checked_period(period: Duration, fallback: Duration, name: &str) -> Duration {
    if period.is_zero() {
        warn!("[遥测采集] {} 周期为 0，改用默认周期 {:?}", name, fallback);
        fallback
    } else {
        period
    }
}

/// 遥测快照数据源。
pub trait SnapshotSource: Send + Sync + 'static {
    fn snapshot(&self) -> TelemetryMap;
}

/// 一条待上报的日志。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: String,
    pub message: String,
}

/// 日志数据源。每次调用返回自上次调用以来的新日志。
pub trait LogSource: Send + Sync + 'static {
    fn drain(&self) -> Vec<LogRecord>;
}

/// 后台采集任务的句柄。被丢弃时任务随之中止。
#[derive(Debug)]
pub struct FeedHandle {
    name: &'static str,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// 停止采集任务。
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("[遥测采集] {} 任务已停止", self.name);
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// 把外部数据源接到连接管理器上的适配器。
#[derive(Clone)]
pub struct TelemetryFeed {
    manager: ConnectionManager,
}

impl TelemetryFeed {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// 每隔 `period` 拉取一次快照并作为 `data` 消息发送。第一次拉取立即进行。
    pub fn spawn_snapshots(&self, source: Arc<dyn SnapshotSource>, period: Duration) -> FeedHandle {
        let period = checked_period(period, DEFAULT_SNAPSHOT_PERIOD, "快照");
        let manager = self.manager.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !manager.is_connected().await {
                    debug!("[遥测采集] 未连接，跳过本次快照");
                    continue;
                }
                let snapshot = source.snapshot();
                debug!("[遥测采集] 推送快照 ({} 项)", snapshot.len());
                manager.push_snapshot(snapshot).await;
            }
        });
        info!("[遥测采集] 快照任务已启动，周期 {:?}", period);
        FeedHandle {
            name: "快照",
            task: Some(task),
        }
    }

    /// 每隔 `period` 取出一批新日志，逐条作为 `log` 消息发送。
    pub fn spawn_logs(&self, source: Arc<dyn LogSource>, period: Duration) -> FeedHandle {
        let period = checked_period(period, DEFAULT_LOG_PERIOD, "日志");
        let manager = self.manager.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !manager.is_connected().await {
                    debug!("[遥测采集] 未连接，跳过本次日志批次");
                    continue;
                }
                let records = source.drain();
                if records.is_empty() {
                    continue;
                }
                debug!("[遥测采集] 发送 {} 条日志", records.len());
                for record in records {
                    manager
                        .send(OutboundEnvelope::Log {
                            level: record.level,
                            message: record.message,
                        })
                        .await;
                }
            }
        });
        info!("[遥测采集] 日志任务已启动，周期 {:?}", period);
        FeedHandle {
            name: "日志",
            task: Some(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::config::LinkConfig;
    use crate::client::fake::FakeConnector;
    use crate::client::manager::LinkCallbacks;
    use crate::identity::StaticIdentity;
    use common_models::device::{DeviceIdentity, DeviceInfo};
    use common_models::enums::ConnectionState;
    use common_models::scalar::ScalarValue;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    struct CountingSource {
        calls: AtomicI64,
    }

    impl SnapshotSource for CountingSource {
        fn snapshot(&self) -> TelemetryMap {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut map = TelemetryMap::new();
            map.insert("tick".to_string(), ScalarValue::from(n));
            map
        }
    }

    struct QueueLogSource {
        pending: Mutex<Vec<LogRecord>>,
    }

    impl LogSource for QueueLogSource {
        fn drain(&self) -> Vec<LogRecord> {
            std::mem::take(&mut *self.pending.lock().unwrap())
        }
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    async fn connected_manager() -> (ConnectionManager, FakeConnector) {
        let fake = FakeConnector::default();
        let manager = ConnectionManager::with_connector(
            LinkConfig::new("ws://127.0.0.1:8765").unwrap(),
            &StaticIdentity(DeviceIdentity::new("dev-feed", DeviceInfo::default())),
            LinkCallbacks::new(),
            Arc::new(fake.clone()),
        )
        .unwrap();
        manager.connect().await;
        fake.events(0).opened();
        for _ in 0..200 {
            if manager.state().await == ConnectionState::Connected {
                break;
            }
            tokio::task::yield_now().await;
        }
        (manager, fake)
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshots_are_pushed_every_period() {
        let (manager, fake) = connected_manager().await;
        let source = Arc::new(CountingSource { calls: AtomicI64::new(0) });
        let handle = TelemetryFeed::new(manager).spawn_snapshots(source.clone(), DEFAULT_SNAPSHOT_PERIOD);

        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1, "第一次拉取应立即进行");
        tokio::time::advance(Duration::from_millis(5_100)).await;
        settle().await;
        tokio::time::advance(Duration::from_millis(5_000)).await;
        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        let frames = fake.frames();
        assert_eq!(frames.len(), 4, "注册 + 三次快照");
        assert_eq!(frames[1], r#"{"type":"data","payload":{"tick":1}}"#);

        handle.stop();
        tokio::time::advance(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3, "停止后不应继续拉取");
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_skips_acquisition_while_disconnected() {
        let (manager, fake) = connected_manager().await;
        manager.disconnect().await;
        let source = Arc::new(CountingSource { calls: AtomicI64::new(0) });
        let _handle = TelemetryFeed::new(manager).spawn_snapshots(source.clone(), Duration::from_secs(5));

        settle().await;
        tokio::time::advance(Duration::from_secs(16)).await;
        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.frames().len(), 1, "只有断开前的注册消息");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_falls_back_to_default() {
        let (manager, _fake) = connected_manager().await;
        let source = Arc::new(CountingSource { calls: AtomicI64::new(0) });
        let handle = TelemetryFeed::new(manager).spawn_snapshots(source.clone(), Duration::ZERO);

        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        tokio::time::advance(Duration::from_millis(2_000)).await;
        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1, "零周期不应变成忙循环");
        tokio::time::advance(Duration::from_millis(3_100)).await;
        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(!handle.is_finished(), "任务不应因零周期而退出");
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_batches_are_sent_as_log_envelopes() {
        let (manager, fake) = connected_manager().await;
        let source = Arc::new(QueueLogSource {
            pending: Mutex::new(vec![
                LogRecord { level: "INFO".to_string(), message: "boot completed".to_string() },
                LogRecord { level: "WARN".to_string(), message: "low memory".to_string() },
            ]),
        });
        let _handle = TelemetryFeed::new(manager).spawn_logs(source.clone(), DEFAULT_LOG_PERIOD);
        settle().await;

        let frames = fake.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1], r#"{"type":"log","level":"INFO","message":"boot completed"}"#);
        assert_eq!(frames[2], r#"{"type":"log","level":"WARN","message":"low memory"}"#);

        // 空批次不产生任何消息
        tokio::time::advance(Duration::from_millis(30_100)).await;
        settle().await;
        assert_eq!(fake.frames().len(), 3);
    }
}
