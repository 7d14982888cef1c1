//! `telemetry_link` 是设备端遥测链路的核心库。
//!
//! 它维护与远端采集端之间唯一的一条 WebSocket 逻辑连接：每次连接成功后先发送设备注册，
//! 然后传输类型化的遥测、日志和事件消息，并在网络不稳定时自动重连。
//!
//! 主要模块：
//! - `codec`: 出站信封编码、入站消息解码；
//! - `identity`: 设备身份提供者；
//! - `client`: 连接配置、传输层、连接状态机与 `ConnectionManager`；
//! - `dispatch`: 入站消息分发；
//! - `feed`: 周期性遥测数据源适配；
//! - `error`: 库错误类型 `LinkError`。

pub mod client;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod identity;

pub use client::config::{LinkConfig, ReconnectPolicy};
pub use client::manager::{ConnectionManager, LinkCallbacks, LinkStatus};
pub use client::transport::{Connector, Socket, SocketEvent, SocketEvents, WsConnector};
pub use error::LinkError;
pub use feed::{FeedHandle, LogRecord, LogSource, SnapshotSource, TelemetryFeed};
pub use identity::{IdentityProvider, PersistentIdentity, StaticIdentity};
