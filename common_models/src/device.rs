// common_models/src/device.rs

//! 设备身份相关模型。
//!
//! `DeviceIdentity` 在连接管理器构造时创建一次，进程生命周期内不可变，
//! 每次连接成功后作为 `register` 消息的内容发送给采集端。

use serde::{Deserialize, Serialize};

/// 设备的静态信息记录。
///
/// 字段名在线上格式中沿用采集端既有的约定：操作系统版本序列化为 `android_version`，
/// 平台版本序列化为整数 `sdk_version`。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// 设备名称 (通常是主机名或用户可见名称)。
    pub device_name: String,
    /// 设备型号。
    pub model: String,
    /// 制造商。
    pub manufacturer: String,
    /// 操作系统版本字符串。
    #[serde(rename = "android_version")]
    pub os_version: String,
    /// 平台 API 版本号。
    #[serde(rename = "sdk_version")]
    pub platform_version: i64,
}

/// 设备身份：一个不透明的稳定标识符加上静态信息记录。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// 每次安装稳定不变的设备 ID。
    pub device_id: String,
    /// 设备静态信息。
    pub info: DeviceInfo,
}

impl DeviceIdentity {
    pub fn new(device_id: impl Into<String>, info: DeviceInfo) -> Self {
        Self {
            device_id: device_id.into(),
            info,
        }
    }
}
