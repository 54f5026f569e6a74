use agent_protocol::{Domain, DomainDefinition, DomainStateReport, HypervisorSpecs, StateAction};
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Agent responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode agent response: {0}")]
    Decode(String),
    #[error("Tls configuration error: {0}")]
    Tls(String),
    #[error("Invalid agent url: {0}")]
    InvalidUrl(String),
    #[error("Failed to open console: {0}")]
    Console(String),
}

pub trait ConsoleIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ConsoleIo for T {}

/// Established duplex byte stream to a domain's console.
pub type ConsoleStream = Box<dyn ConsoleIo>;

/// Capability interface for reaching one hypervisor.
#[async_trait]
pub trait HypervisorBackend {
    async fn get_specs(&self) -> Result<HypervisorSpecs, BackendError>;
    async fn list_vms(&self) -> Result<Vec<Domain>, BackendError>;
    async fn get_vm(&self, vm_id: &Uuid) -> Result<Domain, BackendError>;
    async fn get_vm_state(&self, vm_id: &Uuid) -> Result<DomainStateReport, BackendError>;
    async fn set_vm_state(
        &self,
        vm_id: &Uuid,
        action: StateAction,
    ) -> Result<DomainStateReport, BackendError>;
    async fn create_vm(&self, definition: &DomainDefinition) -> Result<(), BackendError>;
    async fn delete_vm(&self, vm_id: &Uuid) -> Result<(), BackendError>;
    async fn open_console(&self, vm_id: &Uuid) -> Result<ConsoleStream, BackendError>;
}
