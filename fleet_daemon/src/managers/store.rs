use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store is unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to read from store: {0}")]
    Read(String),
    #[error("Failed to write to store: {0}")]
    Write(String),
    #[error("Row with id: '{0}' doesn't exist.")]
    NotFound(Uuid),
    #[error("Row with id: '{0}' already exists.")]
    Duplicate(Uuid),
}

/// Declared hypervisor row. Values are kept as stored, validation happens
/// when the fleet is built from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypervisorRecord {
    pub id: Uuid,
    pub hostname: String,
    pub agent_url: String,
    pub agent_cert_serial: String,
    #[serde(default)]
    pub site: String,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub remarks: String,
}

/// Declared virtual machine row, authoritative for sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    pub id: Uuid,
    pub hypervisor_id: Uuid,
    pub hostname: String,
    pub owner_id: Uuid,
    pub cpu: u32,
    pub memory_bytes: u64,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub remarks: String,
}

#[async_trait]
pub trait Store {
    async fn list_hypervisors(&self) -> Result<Vec<HypervisorRecord>, StoreError>;
    async fn list_vms(&self, hypervisor_id: &Uuid) -> Result<Vec<VmRecord>, StoreError>;
    async fn insert_vm(&self, record: VmRecord) -> Result<(), StoreError>;
    async fn delete_vm(&self, vm_id: &Uuid) -> Result<(), StoreError>;
}
