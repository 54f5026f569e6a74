pub mod fleet_fabric;
pub mod hypervisor_fabric;
