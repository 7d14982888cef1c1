// telemetry_link/src/client/fake.rs

//! 测试用的假传输层：记录每次打开、每帧写入和每次关闭，并允许测试注入传输层事件。

use std::sync::{Arc, Mutex};

use super::config::LinkConfig;
use super::transport::{Connector, Socket, SocketEvents};
use crate::error::LinkError;

#[derive(Default)]
struct FakeState {
    opens: Vec<SocketEvents>,
    frames: Vec<(u64, String)>,
    closes: Vec<u64>,
    fail_writes: bool,
}

#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    pub(crate) fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens.len()
    }

    /// 第 `index` 次打开 (从 0 开始) 的事件投递端。
    pub(crate) fn events(&self, index: usize) -> SocketEvents {
        self.state.lock().unwrap().opens[index].clone()
    }

    pub(crate) fn frames(&self) -> Vec<String> {
        self.state.lock().unwrap().frames.iter().map(|(_, f)| f.clone()).collect()
    }

    pub(crate) fn frames_for(&self, attempt: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .frames
            .iter()
            .filter(|(a, _)| *a == attempt)
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub(crate) fn closes(&self) -> Vec<u64> {
        self.state.lock().unwrap().closes.clone()
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }
}

impl Connector for FakeConnector {
    fn open(&self, _config: &LinkConfig, events: SocketEvents) -> Box<dyn Socket> {
        let attempt = events.attempt();
        self.state.lock().unwrap().opens.push(events);
        Box::new(FakeSocket {
            attempt,
            state: self.state.clone(),
        })
    }
}

struct FakeSocket {
    attempt: u64,
    state: Arc<Mutex<FakeState>>,
}

impl Socket for FakeSocket {
    fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(LinkError::SendErrorClosed);
        }
        state.frames.push((self.attempt, text));
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closes.push(self.attempt);
    }
}
