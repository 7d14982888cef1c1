// monitor_agent/src/device.rs

//! 宿主设备信息探测。配置中显式填写的字段优先。

use common_models::device::DeviceInfo;
use std::fs;
use std::path::Path;

use crate::config::IdentityConfig;

const UNKNOWN: &str = "unknown";

fn read_trimmed(path: impl AsRef<Path>) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn host_name() -> String {
    read_trimmed("/etc/hostname")
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
        .or_else(|| std::env::var("COMPUTERNAME").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// 组合配置覆盖与宿主探测结果。
pub fn resolve_device_info(overrides: &IdentityConfig) -> DeviceInfo {
    DeviceInfo {
        device_name: overrides.device_name.clone().unwrap_or_else(host_name),
        model: overrides.model.clone().unwrap_or_else(|| {
            read_trimmed("/sys/devices/virtual/dmi/id/product_name")
                .unwrap_or_else(|| std::env::consts::ARCH.to_string())
        }),
        manufacturer: overrides.manufacturer.clone().unwrap_or_else(|| {
            read_trimmed("/sys/devices/virtual/dmi/id/sys_vendor").unwrap_or_else(|| UNKNOWN.to_string())
        }),
        os_version: overrides.os_version.clone().unwrap_or_else(|| {
            read_trimmed("/proc/sys/kernel/osrelease")
                .unwrap_or_else(|| std::env::consts::OS.to_string())
        }),
        platform_version: overrides.platform_version.unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = IdentityConfig {
            device_name: Some("shelf-3".to_string()),
            model: Some("X1".to_string()),
            manufacturer: Some("ACME".to_string()),
            os_version: Some("6.1".to_string()),
            platform_version: Some(33),
            ..IdentityConfig::default()
        };
        let info = resolve_device_info(&overrides);
        assert_eq!(info.device_name, "shelf-3");
        assert_eq!(info.model, "X1");
        assert_eq!(info.manufacturer, "ACME");
        assert_eq!(info.os_version, "6.1");
        assert_eq!(info.platform_version, 33);
    }

    #[test]
    fn test_probed_fields_are_never_empty() {
        let info = resolve_device_info(&IdentityConfig::default());
        assert!(!info.device_name.is_empty());
        assert!(!info.model.is_empty());
        assert!(!info.manufacturer.is_empty());
        assert!(!info.os_version.is_empty());
        assert_eq!(info.platform_version, 0);
    }
}
