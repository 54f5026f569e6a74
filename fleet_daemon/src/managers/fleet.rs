use super::hypervisor::{Hypervisor, HypervisorDescription, HypervisorError};
use super::hypervisor_backend::{BackendError, ConsoleStream};
use super::store::HypervisorRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type HypervisorHandle = Arc<Mutex<Box<dyn Hypervisor + Send + Sync>>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FleetError {
    #[error("Hypervisor with uuid: '{0}' doesn't exist.")]
    NoSuchHypervisor(Uuid),
    #[error("Can't load hypervisors, store is unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Hypervisor record '{id}' is malformed: {reason}")]
    InvalidRecord { id: Uuid, reason: String },
    #[error(transparent)]
    Hypervisor(#[from] HypervisorError),
    #[error("Failed to open console: {0}")]
    Console(#[from] BackendError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitSummary {
    pub total: usize,
    pub online: usize,
    pub failed: Vec<Uuid>,
}

/// The process wide registry of hypervisors.
#[async_trait]
pub trait Fleet {
    async fn get(&self, hypervisor_id: &Uuid) -> Result<HypervisorHandle, FleetError>;
    async fn insert(
        &self,
        hypervisor_id: Uuid,
        hypervisor: Box<dyn Hypervisor + Send + Sync>,
    ) -> HypervisorHandle;
    async fn remove(&self, hypervisor_id: &Uuid) -> Result<HypervisorHandle, FleetError>;
    async fn handles(&self) -> Vec<(Uuid, HypervisorHandle)>;
    async fn list(&self) -> Vec<HypervisorDescription>;
    async fn init_all(&self, concurrency: usize, token: &CancellationToken) -> InitSummary;
    async fn open_console(
        &self,
        hypervisor_id: &Uuid,
        vm_id: &Uuid,
        token: &CancellationToken,
    ) -> Result<ConsoleStream, FleetError>;
}

pub trait HypervisorCreator {
    fn create_hypervisor(
        &self,
        record: &HypervisorRecord,
    ) -> Result<Box<dyn Hypervisor + Send + Sync>, FleetError>;
}
