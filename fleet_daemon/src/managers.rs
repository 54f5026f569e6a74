pub mod fleet;
pub mod fleet_manager;
pub mod hypervisor;
pub mod hypervisor_backend;
pub mod hypervisor_manager;
pub mod reconciliation;
pub mod store;
pub mod vm;
