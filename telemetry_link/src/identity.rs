// telemetry_link/src/identity.rs

//! 设备身份提供者。
//!
//! 连接管理器在构造时向 `IdentityProvider` 请求一次身份，之后在每个连接实例上
//! 都用同一个身份发送 `register` 消息。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use common_models::device::{DeviceIdentity, DeviceInfo};
use log::{info, warn};
use uuid::Uuid;

use crate::error::LinkError;

/// 产生设备身份的抽象。
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Result<DeviceIdentity, LinkError>;
}

/// 固定身份，主要用于测试或由宿主自行管理设备 ID 的场景。
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub DeviceIdentity);

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> Result<DeviceIdentity, LinkError> {
        Ok(self.0.clone())
    }
}

/// 按安装持久化的身份。
///
/// 首次调用时生成一个 UUID v4 并写入 `id_path`，之后每次都读取同一个值，
/// 因此设备 ID 在进程重启后保持不变。
#[derive(Debug, Clone)]
pub struct PersistentIdentity {
    id_path: PathBuf,
    info: DeviceInfo,
}

impl PersistentIdentity {
    pub fn new(id_path: impl Into<PathBuf>, info: DeviceInfo) -> Self {
        Self {
            id_path: id_path.into(),
            info,
        }
    }

    pub fn id_path(&self) -> &Path {
        &self.id_path
    }

    fn load_or_create_id(&self) -> Result<String, LinkError> {
        match fs::read_to_string(&self.id_path) {
            Ok(contents) => {
                let id = contents.trim();
                if id.is_empty() {
                    warn!("[设备身份] 设备 ID 文件 {:?} 为空，将重新生成", self.id_path);
                    self.create_id()
                } else {
                    Ok(id.to_string())
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => self.create_id(),
            Err(e) => Err(LinkError::Identity(format!(
                "读取设备 ID 文件 {:?} 失败: {}",
                self.id_path, e
            ))),
        }
    }

    fn create_id(&self) -> Result<String, LinkError> {
        let id = Uuid::new_v4().to_string();
        if let Some(parent) = self.id_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.id_path, &id).map_err(|e| {
            LinkError::Identity(format!("写入设备 ID 文件 {:?} 失败: {}", self.id_path, e))
        })?;
        info!("[设备身份] 已生成新的设备 ID {} 并保存到 {:?}", id, self.id_path);
        Ok(id)
    }
}

impl IdentityProvider for PersistentIdentity {
    fn identity(&self) -> Result<DeviceIdentity, LinkError> {
        let device_id = self.load_or_create_id()?;
        Ok(DeviceIdentity::new(device_id, self.info.clone()))
    }
}
