use serde::{Deserialize, Serialize};

/// Host facts returned by `GET /libvirt`. Advisory only, every field may be
/// missing on older agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HypervisorSpecs {
    pub cpu_model: String,
    pub arch: String,
    /// Bytes.
    pub ram_total: u64,
    /// Bytes.
    pub ram_free: u64,
    pub cpu_count: u32,
    pub cpu_frequency_mhz: u32,
    pub numa_nodes: u32,
    pub cpu_sockets: u32,
    pub cpu_cores: u32,
    pub cpu_threads: u32,
    pub qemu_version: String,
    pub libvirt_version: String,
}
