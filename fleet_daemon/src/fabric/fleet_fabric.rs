use crate::managers::fleet::{Fleet, FleetError, HypervisorCreator};
use crate::managers::fleet_manager::FleetRegistry;
use crate::managers::store::Store;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;

pub struct FleetFabric {
    store: Arc<dyn Store + Send + Sync>,
}

impl FleetFabric {
    pub fn new(store: Arc<dyn Store + Send + Sync>) -> Self {
        FleetFabric { store }
    }

    /// Builds the registry from every declared hypervisor. Only an
    /// unreachable store is fatal, a bad row is skipped.
    pub async fn load_fleet(
        &self,
        hypervisor_creator: &(dyn HypervisorCreator + Send + Sync),
    ) -> Result<Arc<dyn Fleet + Send + Sync>, FleetError> {
        let records = self
            .store
            .list_hypervisors()
            .await
            .map_err(|err| FleetError::StoreUnavailable(err.to_string()))?;

        let mut hypervisors = HashMap::new();
        for record in &records {
            if hypervisors.contains_key(&record.id) {
                warn!("Skipping duplicate hypervisor row {}", record.id);
                continue;
            }
            match hypervisor_creator.create_hypervisor(record) {
                Ok(hypervisor) => {
                    hypervisors.insert(record.id, hypervisor);
                }
                Err(err) => warn!("Skipping hypervisor {}: {}", record.hostname, err),
            }
        }
        info!(
            "Loaded {} of {} declared hypervisors",
            hypervisors.len(),
            records.len()
        );
        Ok(Arc::new(FleetRegistry::new(hypervisors)))
    }
}
