mod action;
mod domain;
mod host;
mod state;

pub use action::{ParseActionError, SetStateRequest, StateAction};
pub use domain::{DiskDefinition, Domain, DomainDefinition, InterfaceDefinition, MemoryUnit};
pub use host::HypervisorSpecs;
pub use state::{DomainState, DomainStateReport, PowerState, StateReason};
