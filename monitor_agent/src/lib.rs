//! `monitor_agent` 设备监控代理库。
//!
//! 代理在设备上长期运行：加载配置、解析持久化的设备身份、保持与采集端的连接，
//! 并周期性地上报宿主快照和日志批次。
//!
//! 主要模块包括：
//! - `agent`: 组装连接管理器与采集任务的 `MonitorAgent`。
//! - `config`: JSON 配置文件的加载、校验与写回。
//! - `device`: 宿主设备信息探测。
//! - `error`: 代理的错误类型。
//! - `sources`: 基于 `/proc` 的快照数据源与日志文件跟踪数据源。

pub mod agent;
pub mod config;
pub mod device;
pub mod error;
pub mod sources;
