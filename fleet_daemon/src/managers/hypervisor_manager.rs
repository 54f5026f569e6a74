use super::hypervisor::{
    Hypervisor, HypervisorDescription, HypervisorError, HypervisorInfo, Status,
};
use super::hypervisor_backend::{BackendError, HypervisorBackend};
use super::reconciliation::{reconcile, ReconcileReport};
use super::store::{Store, StoreError};
use super::vm::{
    DomainSnapshot, VirtualMachine, VmCreateRequest, VmDescription, VmStateView, VmStatus,
};
use crate::utils::cancellation::cancellable;
use agent_protocol::{Domain, DomainState, HypervisorSpecs, StateAction};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const CONNECTED: &str = "Connected to agent";
const CANCELLED: &str = "cancelled";

pub struct HypervisorManager {
    info: HypervisorInfo,
    status: Status,
    status_reason: String,
    specs: Option<HypervisorSpecs>,
    vms: HashMap<Uuid, VirtualMachine>,
    last_report: Option<ReconcileReport>,
    backend: Arc<dyn HypervisorBackend + Send + Sync>,
    store: Arc<dyn Store + Send + Sync>,
}

async fn call<T, E, F>(token: &CancellationToken, future: F) -> Result<T, HypervisorError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<HypervisorError>,
{
    match cancellable(token, future).await {
        Some(result) => result.map_err(Into::into),
        None => Err(HypervisorError::Cancelled),
    }
}

impl HypervisorManager {
    pub fn new(
        info: HypervisorInfo,
        backend: Arc<dyn HypervisorBackend + Send + Sync>,
        store: Arc<dyn Store + Send + Sync>,
    ) -> Self {
        HypervisorManager {
            info,
            status: Status::Unknown,
            status_reason: String::new(),
            specs: None,
            vms: HashMap::new(),
            last_report: None,
            backend,
            store,
        }
    }

    async fn connect(&mut self, token: &CancellationToken) -> Result<(), HypervisorError> {
        let backend = self.backend.clone();
        let result = cancellable(token, backend.get_specs()).await;
        match result {
            Some(Ok(specs)) => {
                info!(
                    "Connected to hypervisor {} ({}, libvirt {}, qemu {})",
                    self.info.hostname, specs.arch, specs.libvirt_version, specs.qemu_version
                );
                self.specs = Some(specs);
                self.status = Status::Online;
                self.status_reason = String::from(CONNECTED);
                Ok(())
            }
            Some(Err(err)) => {
                self.mark_offline(err.to_string());
                Err(HypervisorError::Unreachable {
                    hostname: self.info.hostname.clone(),
                    reason: err.to_string(),
                })
            }
            None => {
                self.mark_offline(String::from(CANCELLED));
                Err(HypervisorError::Cancelled)
            }
        }
    }

    async fn ensure_connected(&mut self, token: &CancellationToken) -> Result<(), HypervisorError> {
        if self.status != Status::Online {
            self.connect(token).await?;
        }
        Ok(())
    }

    fn mark_offline(&mut self, reason: String) {
        warn!("Hypervisor {} is unreachable: {}", self.info.hostname, reason);
        self.status = Status::Offline;
        self.status_reason = reason;
    }

    /// Transport failures mean the agent went away since the last connect.
    fn fail(&mut self, err: HypervisorError) -> HypervisorError {
        if let HypervisorError::Backend(BackendError::Transport(reason)) = &err {
            self.mark_offline(reason.clone());
        }
        err
    }

    async fn refresh_vms(&mut self, token: &CancellationToken) {
        if let Err(err) = self.reconcile_vms(token).await {
            warn!(
                "Failed to refresh vms of hypervisor {}: {}",
                self.info.hostname, err
            );
        }
    }

    fn known_vm(&self, vm_id: &Uuid) -> Result<(), HypervisorError> {
        if !self.vms.contains_key(vm_id) {
            return Err(HypervisorError::NoSuchVm(*vm_id));
        }
        Ok(())
    }
}

#[async_trait]
impl Hypervisor for HypervisorManager {
    async fn init(&mut self, token: &CancellationToken) -> Result<(), HypervisorError> {
        self.connect(token).await?;
        self.reconcile_vms(token).await.map(|_| ())
    }

    async fn refresh(&mut self, token: &CancellationToken) -> Result<(), HypervisorError> {
        self.connect(token).await
    }

    async fn reconcile_vms(
        &mut self,
        token: &CancellationToken,
    ) -> Result<ReconcileReport, HypervisorError> {
        self.ensure_connected(token).await?;
        let backend = self.backend.clone();
        let store = self.store.clone();
        let observed = call(token, backend.list_vms())
            .await
            .map_err(|err| self.fail(err))?;
        let declared = call(token, store.list_vms(&self.info.id)).await?;

        let report = reconcile(&declared, &observed);
        report.log(&self.info.hostname);

        let observed_by_id: HashMap<Uuid, &Domain> =
            observed.iter().map(|domain| (domain.id, domain)).collect();
        let mut vms = HashMap::with_capacity(declared.len());
        for record in &declared {
            let mut vm = VirtualMachine::from_record(record);
            match observed_by_id.get(&record.id) {
                Some(domain) => vm.observe(DomainSnapshot::from_domain(domain)),
                None => {
                    vm.snapshot = self
                        .vms
                        .get(&record.id)
                        .and_then(|previous| previous.snapshot.clone());
                    vm.status = VmStatus::Missing;
                }
            }
            vms.insert(record.id, vm);
        }
        for (vm_id, vm) in vms.iter_mut() {
            if vm.status != VmStatus::Observed || vm.cached_state().is_some() {
                continue;
            }
            match cancellable(token, backend.get_vm_state(vm_id)).await {
                Some(Ok(report)) => vm.observe_state(DomainState::decode(report)),
                Some(Err(err)) => warn!(
                    "Failed to fetch state of vm {} on hypervisor {}: {}",
                    vm_id, self.info.hostname, err
                ),
                None => return Err(HypervisorError::Cancelled),
            }
        }
        debug!(
            "Reconciled hypervisor {}: {} declared, {} observed",
            self.info.hostname, report.declared, report.observed
        );
        self.vms = vms;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    async fn create_vm(
        &mut self,
        request: VmCreateRequest,
        token: &CancellationToken,
    ) -> Result<Uuid, HypervisorError> {
        request.validate().map_err(HypervisorError::InvalidRequest)?;
        self.ensure_connected(token).await?;
        let backend = self.backend.clone();
        let store = self.store.clone();

        let vm_id = Uuid::new_v4();
        let definition = request.definition(vm_id);
        call(token, backend.create_vm(&definition))
            .await
            .map_err(|err| self.fail(err))?;
        info!(
            "Created vm {} ({}) on hypervisor {}",
            vm_id, request.hostname, self.info.hostname
        );

        let inserted = call(token, store.insert_vm(request.record(vm_id, self.info.id))).await;
        if let Err(err) = &inserted {
            warn!(
                "Vm {} exists on hypervisor {} but was not recorded in store: {}",
                vm_id, self.info.hostname, err
            );
        }
        self.refresh_vms(token).await;
        inserted.map(|_| vm_id)
    }

    async fn delete_vm(
        &mut self,
        vm_id: &Uuid,
        token: &CancellationToken,
    ) -> Result<(), HypervisorError> {
        self.ensure_connected(token).await?;
        let backend = self.backend.clone();
        let store = self.store.clone();

        call(token, backend.delete_vm(vm_id))
            .await
            .map_err(|err| self.fail(err))?;
        info!("Deleted vm {} on hypervisor {}", vm_id, self.info.hostname);

        let deleted = match call(token, store.delete_vm(vm_id)).await {
            Err(HypervisorError::Store(StoreError::NotFound(_))) => {
                warn!("Deleted vm {} was not declared in store", vm_id);
                Ok(())
            }
            other => other,
        };
        if let Err(err) = &deleted {
            warn!(
                "Vm {} was deleted on hypervisor {} but is still declared in store: {}",
                vm_id, self.info.hostname, err
            );
        }
        self.refresh_vms(token).await;
        deleted
    }

    async fn get_vm_state(
        &mut self,
        vm_id: &Uuid,
        token: &CancellationToken,
    ) -> Result<VmStateView, HypervisorError> {
        self.known_vm(vm_id)?;
        let live = match self.ensure_connected(token).await {
            Ok(()) => {
                let backend = self.backend.clone();
                call(token, backend.get_vm_state(vm_id))
                    .await
                    .map_err(|err| self.fail(err))
            }
            Err(err) => Err(err),
        };
        match live {
            Ok(report) => {
                let state = DomainState::decode(report);
                if let Some(vm) = self.vms.get_mut(vm_id) {
                    vm.observe_state(state);
                }
                Ok(VmStateView {
                    state: Some(state),
                    reachable: true,
                })
            }
            Err(HypervisorError::Unreachable { .. })
            | Err(HypervisorError::Backend(BackendError::Transport(_))) => {
                debug!(
                    "Serving cached state of vm {}, hypervisor {} is unreachable",
                    vm_id, self.info.hostname
                );
                Ok(VmStateView {
                    state: self.vms.get(vm_id).and_then(VirtualMachine::cached_state),
                    reachable: false,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn set_vm_state(
        &mut self,
        vm_id: &Uuid,
        action: StateAction,
        token: &CancellationToken,
    ) -> Result<DomainState, HypervisorError> {
        self.known_vm(vm_id)?;
        self.ensure_connected(token).await?;
        let backend = self.backend.clone();
        let report = call(token, backend.set_vm_state(vm_id, action))
            .await
            .map_err(|err| self.fail(err))?;
        let state = DomainState::decode(report);
        info!(
            "Requested {} for vm {} on hypervisor {}, now {}",
            action, vm_id, self.info.hostname, state
        );
        if let Some(vm) = self.vms.get_mut(vm_id) {
            vm.observe_state(state);
        }
        Ok(state)
    }

    fn describe(&self) -> HypervisorDescription {
        HypervisorDescription {
            info: self.info.clone(),
            status: self.status,
            status_reason: self.status_reason.clone(),
            specs: self.specs.clone(),
            vm_count: self.vms.len(),
            reachable: self.status == Status::Online,
        }
    }

    fn get_vm(&self, vm_id: &Uuid) -> Result<VmDescription, HypervisorError> {
        let reachable = self.status == Status::Online;
        self.vms
            .get(vm_id)
            .map(|vm| vm.describe(reachable))
            .ok_or(HypervisorError::NoSuchVm(*vm_id))
    }

    fn list_vms(&self) -> Vec<VmDescription> {
        let reachable = self.status == Status::Online;
        let mut vms: Vec<VmDescription> = self
            .vms
            .values()
            .map(|vm| vm.describe(reachable))
            .collect();
        vms.sort_by_key(|vm| vm.id);
        vms
    }

    fn last_report(&self) -> Option<ReconcileReport> {
        self.last_report.clone()
    }

    fn backend(&self) -> Arc<dyn HypervisorBackend + Send + Sync> {
        self.backend.clone()
    }
}
