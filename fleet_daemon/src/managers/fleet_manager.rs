use super::fleet::{Fleet, FleetError, HypervisorHandle, InitSummary};
use super::hypervisor::{Hypervisor, HypervisorDescription, HypervisorError, Status};
use super::hypervisor_backend::ConsoleStream;
use crate::utils::cancellation::cancellable;
use async_trait::async_trait;
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Map lock is taken only to change structure or to copy handles out. Each
/// hypervisor is locked on its own afterwards, never the reverse order.
pub struct FleetRegistry {
    hypervisors: RwLock<HashMap<Uuid, HypervisorHandle>>,
}

impl FleetRegistry {
    pub fn new(hypervisors: HashMap<Uuid, Box<dyn Hypervisor + Send + Sync>>) -> Self {
        FleetRegistry {
            hypervisors: RwLock::new(
                hypervisors
                    .into_iter()
                    .map(|(id, hypervisor)| (id, Arc::new(Mutex::new(hypervisor))))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl Fleet for FleetRegistry {
    async fn get(&self, hypervisor_id: &Uuid) -> Result<HypervisorHandle, FleetError> {
        self.hypervisors
            .read()
            .await
            .get(hypervisor_id)
            .cloned()
            .ok_or(FleetError::NoSuchHypervisor(*hypervisor_id))
    }

    async fn insert(
        &self,
        hypervisor_id: Uuid,
        hypervisor: Box<dyn Hypervisor + Send + Sync>,
    ) -> HypervisorHandle {
        let handle: HypervisorHandle = Arc::new(Mutex::new(hypervisor));
        let _ = self
            .hypervisors
            .write()
            .await
            .insert(hypervisor_id, handle.clone());
        handle
    }

    async fn remove(&self, hypervisor_id: &Uuid) -> Result<HypervisorHandle, FleetError> {
        self.hypervisors
            .write()
            .await
            .remove(hypervisor_id)
            .ok_or(FleetError::NoSuchHypervisor(*hypervisor_id))
    }

    async fn handles(&self) -> Vec<(Uuid, HypervisorHandle)> {
        let mut handles: Vec<(Uuid, HypervisorHandle)> = self
            .hypervisors
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();
        handles.sort_by_key(|(id, _)| *id);
        handles
    }

    async fn list(&self) -> Vec<HypervisorDescription> {
        let mut descriptions = vec![];
        for (_, handle) in self.handles().await {
            descriptions.push(handle.lock().await.describe());
        }
        descriptions
    }

    async fn init_all(&self, concurrency: usize, token: &CancellationToken) -> InitSummary {
        let handles = self.handles().await;
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut set = JoinSet::new();
        for (id, handle) in handles.iter().cloned() {
            let permits = permits.clone();
            let token = token.clone();
            set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (id, Err(HypervisorError::Cancelled));
                };
                let mut hypervisor = handle.lock().await;
                let result = hypervisor.init(&token).await;
                if let Err(err) = &result {
                    warn!(
                        "Failed to initialize hypervisor {}: {}",
                        hypervisor.describe().info.hostname,
                        err
                    );
                }
                (id, result)
            });
        }

        let mut summary = InitSummary {
            total: handles.len(),
            ..Default::default()
        };
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(_))) => summary.failed.push(id),
                Err(err) => error!("Hypervisor initialization task failed: {}", err),
            }
        }
        for (_, handle) in &handles {
            if handle.lock().await.describe().status == Status::Online {
                summary.online += 1;
            }
        }
        summary.failed.sort();
        info!(
            "Fleet initialized, {}/{} hypervisors online",
            summary.online, summary.total
        );
        summary
    }

    async fn open_console(
        &self,
        hypervisor_id: &Uuid,
        vm_id: &Uuid,
        token: &CancellationToken,
    ) -> Result<ConsoleStream, FleetError> {
        let handle = self.get(hypervisor_id).await?;
        let backend = {
            let hypervisor = handle.lock().await;
            hypervisor.get_vm(vm_id)?;
            hypervisor.backend()
        };
        match cancellable(token, backend.open_console(vm_id)).await {
            Some(stream) => Ok(stream?),
            None => Err(FleetError::Hypervisor(HypervisorError::Cancelled)),
        }
    }
}
