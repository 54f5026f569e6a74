use super::store::VmRecord;
use agent_protocol::{
    DiskDefinition, Domain, DomainDefinition, DomainState, InterfaceDefinition,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MIB: u64 = 1024 * 1024;
const HOSTNAME_LENGTH: std::ops::RangeInclusive<usize> = 2..=20;

/// Last observation of a domain as reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSnapshot {
    pub vcpu: Option<u32>,
    pub memory_bytes: Option<u64>,
    pub state: Option<DomainState>,
    pub observed_at: DateTime<Utc>,
}

impl DomainSnapshot {
    pub fn from_domain(domain: &Domain) -> Self {
        Self {
            vcpu: Some(domain.vcpu),
            memory_bytes: Some(domain.memory_bytes()),
            state: domain.state.map(DomainState::decode),
            observed_at: Utc::now(),
        }
    }

    pub fn from_state(state: DomainState) -> Self {
        Self {
            vcpu: None,
            memory_bytes: None,
            state: Some(state),
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmStatus {
    /// Not reconciled against the agent yet.
    Unknown,
    /// Paired with an agent reported domain.
    Observed,
    /// Declared in the store but unknown to the agent.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachine {
    pub id: Uuid,
    pub hypervisor_id: Uuid,
    pub owner_id: Uuid,
    pub hostname: String,
    pub cpu: u32,
    pub memory_bytes: u64,
    pub snapshot: Option<DomainSnapshot>,
    pub status: VmStatus,
    pub remarks: String,
}

impl VirtualMachine {
    pub fn from_record(record: &VmRecord) -> Self {
        Self {
            id: record.id,
            hypervisor_id: record.hypervisor_id,
            owner_id: record.owner_id,
            hostname: record.hostname.clone(),
            cpu: record.cpu,
            memory_bytes: record.memory_bytes,
            snapshot: None,
            status: VmStatus::Unknown,
            remarks: record.remarks.clone(),
        }
    }

    pub fn observe(&mut self, snapshot: DomainSnapshot) {
        self.snapshot = Some(snapshot);
        self.status = VmStatus::Observed;
    }

    /// Replaces only the power state, keeping the last observed sizing.
    pub fn observe_state(&mut self, state: DomainState) {
        match self.snapshot.as_mut() {
            Some(snapshot) => {
                snapshot.state = Some(state);
                snapshot.observed_at = Utc::now();
            }
            None => self.snapshot = Some(DomainSnapshot::from_state(state)),
        }
        self.status = VmStatus::Observed;
    }

    /// `reachable` reflects the owning hypervisor at the time of the call.
    pub fn describe(&self, reachable: bool) -> VmDescription {
        VmDescription {
            id: self.id,
            hypervisor_id: self.hypervisor_id,
            owner_id: self.owner_id,
            hostname: self.hostname.clone(),
            cpu: self.cpu,
            memory_bytes: self.memory_bytes,
            status: self.status,
            state: self.cached_state(),
            snapshot: self.snapshot.clone(),
            remarks: self.remarks.clone(),
            reachable,
        }
    }

    pub fn cached_state(&self) -> Option<DomainState> {
        self.snapshot.as_ref().and_then(|snapshot| snapshot.state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmDescription {
    pub id: Uuid,
    pub hypervisor_id: Uuid,
    pub owner_id: Uuid,
    pub hostname: String,
    pub cpu: u32,
    pub memory_bytes: u64,
    pub status: VmStatus,
    pub state: Option<DomainState>,
    pub snapshot: Option<DomainSnapshot>,
    pub remarks: String,
    /// False when the hypervisor is offline and `state` is the last cached one.
    pub reachable: bool,
}

/// Answer of a power state read. An unreachable agent yields the cached
/// state, which is absent if the vm was never observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStateView {
    pub state: Option<DomainState>,
    pub reachable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudInit {
    pub user_data: String,
    #[serde(default)]
    pub meta_data: String,
}

/// Provisioning request as handed over by the route layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmCreateRequest {
    pub hostname: String,
    pub owner: Uuid,
    pub cpu: u32,
    pub memory_mib: u64,
    pub image: String,
    #[serde(default)]
    pub cloud_init: Option<CloudInit>,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub os_variant: String,
    #[serde(default)]
    pub disks: Vec<DiskDefinition>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
    #[serde(default)]
    pub remarks: String,
}

impl VmCreateRequest {
    pub fn validate(&self) -> Result<(), String> {
        if !HOSTNAME_LENGTH.contains(&self.hostname.chars().count()) {
            return Err(format!(
                "Hostname must be between {} and {} characters long.",
                HOSTNAME_LENGTH.start(),
                HOSTNAME_LENGTH.end()
            ));
        }
        if self.cpu < 1 {
            return Err(String::from("At least one cpu is required."));
        }
        if self.memory_mib < 1 {
            return Err(String::from("At least one MiB of memory is required."));
        }
        self.memory_mib
            .checked_mul(MIB)
            .map(|_| ())
            .ok_or_else(|| String::from("Requested memory is too large."))
    }

    pub fn memory_bytes(&self) -> u64 {
        self.memory_mib.saturating_mul(MIB)
    }

    pub fn definition(&self, id: Uuid) -> DomainDefinition {
        let cloud_init = self.cloud_init.clone().unwrap_or_default();
        DomainDefinition {
            id,
            hostname: self.hostname.clone(),
            cpu: self.cpu,
            memory_mib: self.memory_mib,
            image: self.image.clone(),
            cloud: self.cloud_init.is_some(),
            os: self.os.clone(),
            os_variant: self.os_variant.clone(),
            user_data: cloud_init.user_data,
            meta_data: cloud_init.meta_data,
            disks: self.disks.clone(),
            interfaces: self.interfaces.clone(),
        }
    }

    pub fn record(&self, id: Uuid, hypervisor_id: Uuid) -> VmRecord {
        let now = Utc::now();
        VmRecord {
            id,
            hypervisor_id,
            hostname: self.hostname.clone(),
            owner_id: self.owner,
            cpu: self.cpu,
            memory_bytes: self.memory_bytes(),
            created: now,
            updated: now,
            remarks: self.remarks.clone(),
        }
    }
}
