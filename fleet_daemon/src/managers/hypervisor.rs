use super::hypervisor_backend::{BackendError, HypervisorBackend};
use super::reconciliation::ReconcileReport;
use super::store::StoreError;
use super::vm::{VmCreateRequest, VmDescription, VmStateView};
use agent_protocol::{DomainState, HypervisorSpecs, StateAction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HypervisorError {
    #[error("Hypervisor '{hostname}' is unreachable: {reason}")]
    Unreachable { hostname: String, reason: String },
    #[error("Agent request failed: {0}")]
    Backend(#[from] BackendError),
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("Virtual machine with id: '{0}' doesn't exist on this hypervisor.")]
    NoSuchVm(Uuid),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Operation was cancelled.")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Unknown,
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypervisorInfo {
    pub id: Uuid,
    pub hostname: String,
    pub site: String,
    pub agent_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypervisorDescription {
    pub info: HypervisorInfo,
    pub status: Status,
    pub status_reason: String,
    pub specs: Option<HypervisorSpecs>,
    pub vm_count: usize,
    pub reachable: bool,
}

/// Live state of one hypervisor. Implementations are shared behind a mutex,
/// holding it serializes every operation on the hypervisor and its vms.
#[async_trait]
pub trait Hypervisor {
    /// Connects and reconciles. Status is never `Unknown` afterwards.
    async fn init(&mut self, token: &CancellationToken) -> Result<(), HypervisorError>;
    async fn refresh(&mut self, token: &CancellationToken) -> Result<(), HypervisorError>;
    async fn reconcile_vms(
        &mut self,
        token: &CancellationToken,
    ) -> Result<ReconcileReport, HypervisorError>;
    async fn create_vm(
        &mut self,
        request: VmCreateRequest,
        token: &CancellationToken,
    ) -> Result<Uuid, HypervisorError>;
    async fn delete_vm(
        &mut self,
        vm_id: &Uuid,
        token: &CancellationToken,
    ) -> Result<(), HypervisorError>;
    /// Live power state, or the cached one flagged unreachable when the
    /// agent can't be reached.
    async fn get_vm_state(
        &mut self,
        vm_id: &Uuid,
        token: &CancellationToken,
    ) -> Result<VmStateView, HypervisorError>;
    async fn set_vm_state(
        &mut self,
        vm_id: &Uuid,
        action: StateAction,
        token: &CancellationToken,
    ) -> Result<DomainState, HypervisorError>;
    fn describe(&self) -> HypervisorDescription;
    fn get_vm(&self, vm_id: &Uuid) -> Result<VmDescription, HypervisorError>;
    fn list_vms(&self) -> Vec<VmDescription>;
    fn last_report(&self) -> Option<ReconcileReport>;
    fn backend(&self) -> Arc<dyn HypervisorBackend + Send + Sync>;
}
