use super::store::VmRecord;
use agent_protocol::Domain;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftField {
    Cpu,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drift {
    pub vm_id: Uuid,
    pub field: DriftField,
    pub declared: u64,
    pub observed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrphanSide {
    /// Declared in the store, not reported by the agent.
    Store,
    /// Reported by the agent, not declared in the store.
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orphan {
    pub vm_id: Uuid,
    pub hostname: String,
    pub side: OrphanSide,
}

/// Outcome of comparing declared and observed inventory of one hypervisor.
/// Every list is ordered by vm id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub declared: usize,
    pub observed: usize,
    pub paired: Vec<Uuid>,
    pub drifts: Vec<Drift>,
    pub orphans: Vec<Orphan>,
}

impl ReconcileReport {
    pub fn count_mismatch(&self) -> bool {
        self.declared != self.observed
    }

    pub fn orphans_on(&self, side: OrphanSide) -> impl Iterator<Item = &Orphan> {
        self.orphans.iter().filter(move |orphan| orphan.side == side)
    }

    pub fn is_consistent(&self) -> bool {
        !self.count_mismatch() && self.drifts.is_empty() && self.orphans.is_empty()
    }

    pub fn log(&self, hostname: &str) {
        if self.count_mismatch() {
            warn!(
                "{}: store declares {} vms but agent reports {}",
                hostname, self.declared, self.observed
            );
        }
        for drift in &self.drifts {
            warn!(
                "{}: vm {} {} drift, declared {} observed {}",
                hostname, drift.vm_id, drift.field, drift.declared, drift.observed
            );
        }
        for orphan in &self.orphans {
            warn!(
                "{}: orphan vm {} ({}) {}",
                hostname, orphan.vm_id, orphan.hostname, orphan.side
            );
        }
    }
}

impl fmt::Display for DriftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

impl fmt::Display for OrphanSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => f.write_str("missing on agent"),
            Self::Agent => f.write_str("missing in store"),
        }
    }
}

/// Pure comparison, neither input is modified and no value from `observed`
/// ever replaces a declared one.
pub fn reconcile(declared: &[VmRecord], observed: &[Domain]) -> ReconcileReport {
    let observed_by_id: HashMap<Uuid, &Domain> =
        observed.iter().map(|domain| (domain.id, domain)).collect();
    let declared_by_id: HashMap<Uuid, &VmRecord> =
        declared.iter().map(|record| (record.id, record)).collect();

    let mut report = ReconcileReport {
        declared: declared.len(),
        observed: observed.len(),
        ..Default::default()
    };

    for record in declared {
        match observed_by_id.get(&record.id) {
            Some(domain) => {
                report.paired.push(record.id);
                if record.cpu != domain.vcpu {
                    report.drifts.push(Drift {
                        vm_id: record.id,
                        field: DriftField::Cpu,
                        declared: u64::from(record.cpu),
                        observed: u64::from(domain.vcpu),
                    });
                }
                if record.memory_bytes != domain.memory_bytes() {
                    report.drifts.push(Drift {
                        vm_id: record.id,
                        field: DriftField::Memory,
                        declared: record.memory_bytes,
                        observed: domain.memory_bytes(),
                    });
                }
            }
            None => report.orphans.push(Orphan {
                vm_id: record.id,
                hostname: record.hostname.clone(),
                side: OrphanSide::Store,
            }),
        }
    }
    for domain in observed {
        if !declared_by_id.contains_key(&domain.id) {
            report.orphans.push(Orphan {
                vm_id: domain.id,
                hostname: domain.name.clone(),
                side: OrphanSide::Agent,
            });
        }
    }

    report.paired.sort();
    report.paired.dedup();
    report
        .drifts
        .sort_by(|a, b| (a.vm_id, a.field as u8).cmp(&(b.vm_id, b.field as u8)));
    report.drifts.dedup();
    report
        .orphans
        .sort_by(|a, b| (a.vm_id, a.side as u8).cmp(&(b.vm_id, b.side as u8)));
    report.orphans.dedup();
    report
}
