// telemetry_link/tests/common/mod.rs

//! 集成测试用的本地采集端。
//!
//! 在 `127.0.0.1:0` 上监听，完成 WebSocket 握手后把连接交给测试主流程。

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{error, info};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message, WebSocketStream};

pub type WsStream = WebSocketStream<TcpStream>;

/// 等待单个事件的默认超时。
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct TestCollector {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<(WsStream, SocketAddr)>,
    accept_task: JoinHandle<()>,
}

impl TestCollector {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
        let addr = listener.local_addr().expect("无法获取本地监听地址");
        let (tx, connections) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            loop {
                let (tcp_stream, peer_addr) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("[测试采集端] 接受 TCP 连接失败: {}", e);
                        continue;
                    }
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    match accept_async(tcp_stream).await {
                        Ok(ws_stream) => {
                            info!("[测试采集端] 与 {} 的 WebSocket 握手成功", peer_addr);
                            let _ = tx.send((ws_stream, peer_addr));
                        }
                        Err(e) => error!("[测试采集端] 与 {} 的 WebSocket 握手失败: {}", peer_addr, e),
                    }
                });
            }
        });

        info!("[测试采集端] 正在监听 {}", addr);
        Self {
            addr,
            connections,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// 等待下一个设备连接。
    pub async fn accept(&mut self) -> WsStream {
        let (stream, peer) = tokio::time::timeout(STEP_TIMEOUT, self.connections.recv())
            .await
            .expect("等待设备连接超时")
            .expect("采集端监听任务已退出");
        info!("[测试采集端] 设备 {} 已接入", peer);
        stream
    }
}

impl Drop for TestCollector {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// 读取下一帧文本，跳过控制帧。连接结束时返回 `None`。
pub async fn next_text(stream: &mut WsStream) -> Option<String> {
    loop {
        let frame = tokio::time::timeout(STEP_TIMEOUT, stream.next())
            .await
            .expect("等待设备消息超时");
        match frame {
            Some(Ok(Message::Text(text))) => return Some(text),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

pub async fn send_text(stream: &mut WsStream, text: &str) {
    stream
        .send(Message::Text(text.to_string()))
        .await
        .expect("采集端发送消息失败");
}

/// 轮询条件直到成立，超时则 panic。
pub async fn eventually<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("等待条件超时: {}", what);
}
