use core::fmt::Display;

use crate::config::execution::HostDeviceConfig;

/// Unique identifier of a device, used to key autotune caches.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct DeviceId {
    /// Kind of device.
    pub type_id: u16,
    /// Index of the device for its kind.
    pub index_id: u32,
}

impl DeviceId {
    /// Type id of the host device.
    pub const HOST: u16 = 0;

    /// Create a new device id.
    pub fn new(type_id: u16, index_id: u32) -> Self {
        Self { type_id, index_id }
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DeviceId({}:{})", self.type_id, self.index_id)
    }
}

/// Static properties of a compute device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Identifier of the device.
    pub id: DeviceId,
    /// Architecture name, e.g. `gfx942`.
    pub arch: String,
    /// Number of compute units available for a launch.
    pub compute_units: u32,
    /// Maximum number of bytes that can be allocated.
    pub memory_capacity: u64,
}

impl DeviceProperties {
    /// Properties of the host device at the given index.
    pub fn host(index: u32, config: &HostDeviceConfig) -> Self {
        Self {
            id: DeviceId::new(DeviceId::HOST, index),
            arch: config.arch.clone(),
            compute_units: config.compute_units,
            memory_capacity: config.memory_capacity,
        }
    }

    /// Whether the device architecture matches `arch`, ignoring feature suffixes such as `:xnack-`.
    pub fn matches_arch(&self, arch: &str) -> bool {
        base_arch(&self.arch) == base_arch(arch)
    }
}

fn base_arch(arch: &str) -> &str {
    arch.split(':').next().unwrap_or(arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_match_ignores_target_features() {
        let mut config = HostDeviceConfig::default();
        config.arch = "gfx90a:xnack-".to_string();
        let props = DeviceProperties::host(0, &config);

        assert!(props.matches_arch("gfx90a"));
        assert!(!props.matches_arch("gfx942"));
    }
}
