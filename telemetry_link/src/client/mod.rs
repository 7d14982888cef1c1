// telemetry_link/src/client/mod.rs

//! 客户端连接模块。
//!
//! - `config`: 采集端地址、连接超时、重连策略；
//! - `transport`: 传输层抽象 (`Connector`/`Socket`) 及基于 `tokio-tungstenite` 的实现；
//! - `state`: 不含 I/O 的连接状态机；
//! - `manager`: 把以上三者组合起来的 `ConnectionManager`。

pub mod config;
pub mod manager;
pub(crate) mod state;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;
