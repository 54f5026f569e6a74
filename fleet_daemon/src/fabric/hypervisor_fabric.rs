use crate::client_handler::agent_client::{AgentClient, AgentTimeouts};
use crate::managers::fleet::{FleetError, HypervisorCreator};
use crate::managers::hypervisor::{Hypervisor, HypervisorInfo};
use crate::managers::hypervisor_manager::HypervisorManager;
use crate::managers::store::{HypervisorRecord, Store};
use crate::tls::pki::TlsIdentity;
use std::sync::Arc;

pub struct HypervisorFabric {
    identity: Arc<TlsIdentity>,
    store: Arc<dyn Store + Send + Sync>,
    timeouts: AgentTimeouts,
}

impl HypervisorFabric {
    pub fn new(
        identity: Arc<TlsIdentity>,
        store: Arc<dyn Store + Send + Sync>,
        timeouts: AgentTimeouts,
    ) -> Self {
        HypervisorFabric {
            identity,
            store,
            timeouts,
        }
    }
}

impl HypervisorCreator for HypervisorFabric {
    fn create_hypervisor(
        &self,
        record: &HypervisorRecord,
    ) -> Result<Box<dyn Hypervisor + Send + Sync>, FleetError> {
        let invalid = |reason: String| FleetError::InvalidRecord {
            id: record.id,
            reason,
        };
        if record.hostname.trim().is_empty() {
            return Err(invalid(String::from("hostname is empty")));
        }
        let serial = record.agent_cert_serial.trim();
        if serial.is_empty() {
            return Err(invalid(String::from("agent certificate serial is empty")));
        }
        let tls = self
            .identity
            .client_config(serial)
            .map_err(|err| invalid(err.to_string()))?;
        let client = AgentClient::new(&record.agent_url, tls, self.timeouts)
            .map_err(|err| invalid(err.to_string()))?;
        Ok(Box::new(HypervisorManager::new(
            HypervisorInfo {
                id: record.id,
                hostname: record.hostname.clone(),
                site: record.site.clone(),
                agent_url: client.base_url().to_string(),
            },
            Arc::new(client),
            self.store.clone(),
        )))
    }
}
