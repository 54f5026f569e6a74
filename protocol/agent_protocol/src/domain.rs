use crate::state::DomainStateReport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryUnit {
    #[serde(rename = "B", alias = "bytes")]
    B,
    #[default]
    #[serde(rename = "KiB", alias = "k")]
    KiB,
    #[serde(rename = "MiB", alias = "M")]
    MiB,
    #[serde(rename = "GiB", alias = "G")]
    GiB,
}

impl MemoryUnit {
    pub fn multiplier(&self) -> u64 {
        match self {
            Self::B => 1,
            Self::KiB => 1 << 10,
            Self::MiB => 1 << 20,
            Self::GiB => 1 << 30,
        }
    }
}

/// A domain as the agent reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vcpu: u32,
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub memory_unit: MemoryUnit,
    #[serde(default)]
    pub state: Option<DomainStateReport>,
}

impl Domain {
    pub fn memory_bytes(&self) -> u64 {
        self.memory.saturating_mul(self.memory_unit.multiplier())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDefinition {
    pub id: u32,
    pub size_gib: u64,
    /// Backing image or pool path for the disk.
    #[serde(default)]
    pub disk: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub bridge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

/// Body of `PUT /libvirt/domains/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDefinition {
    pub id: Uuid,
    pub hostname: String,
    pub cpu: u32,
    pub memory_mib: u64,
    pub image: String,
    pub cloud: bool,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub os_variant: String,
    #[serde(default)]
    pub user_data: String,
    #[serde(default)]
    pub meta_data: String,
    #[serde(default)]
    pub disks: Vec<DiskDefinition>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
}
