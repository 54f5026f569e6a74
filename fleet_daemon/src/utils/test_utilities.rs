use crate::managers::{
    fleet::{FleetError, HypervisorCreator},
    hypervisor::{Hypervisor, HypervisorDescription, HypervisorError, HypervisorInfo, Status},
    hypervisor_backend::{BackendError, ConsoleStream, HypervisorBackend},
    reconciliation::ReconcileReport,
    store::{HypervisorRecord, Store, StoreError, VmRecord},
    vm::{VmCreateRequest, VmDescription, VmStateView},
};
use agent_protocol::{
    Domain, DomainDefinition, DomainState, DomainStateReport, HypervisorSpecs, MemoryUnit,
    StateAction,
};
use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, SanType, SerialNumber,
};
use rustls::pki_types::CertificateDer;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub fn create_example_uuid() -> Uuid {
    Uuid::from_str("a46289a4-5902-4586-81a3-908bdd62e7a1").unwrap()
}

pub fn create_example_owner() -> Uuid {
    Uuid::from_str("0d4a7ec4-3f55-4b8e-9a33-5c1f2f6f9e10").unwrap()
}

pub fn create_example_hypervisor_info() -> HypervisorInfo {
    HypervisorInfo {
        id: create_example_uuid(),
        hostname: String::from("hv01"),
        site: String::from("lab"),
        agent_url: String::from("https://hv01.lab:8443"),
    }
}

pub fn create_example_hypervisor_record() -> HypervisorRecord {
    let info = create_example_hypervisor_info();
    HypervisorRecord {
        id: info.id,
        hostname: info.hostname,
        agent_url: info.agent_url,
        agent_cert_serial: String::from("4660"),
        site: info.site,
        created: Utc::now(),
        updated: Utc::now(),
        remarks: String::new(),
    }
}

pub fn create_example_specs() -> HypervisorSpecs {
    HypervisorSpecs {
        cpu_model: String::from("EPYC"),
        arch: String::from("x86_64"),
        ram_total: 68719476736,
        ram_free: 34359738368,
        cpu_count: 32,
        cpu_frequency_mhz: 2800,
        numa_nodes: 1,
        cpu_sockets: 1,
        cpu_cores: 16,
        cpu_threads: 2,
        qemu_version: String::from("8.2.0"),
        libvirt_version: String::from("10.0.0"),
    }
}

pub fn create_example_description(status: Status) -> HypervisorDescription {
    HypervisorDescription {
        info: create_example_hypervisor_info(),
        status,
        status_reason: String::from("example"),
        specs: None,
        vm_count: 0,
        reachable: status == Status::Online,
    }
}

/// Declared row with a fresh id on the example hypervisor.
pub fn create_example_vm_record(cpu: u32, memory_bytes: u64) -> VmRecord {
    VmRecord {
        id: Uuid::new_v4(),
        hypervisor_id: create_example_uuid(),
        hostname: String::from("vm01"),
        owner_id: create_example_owner(),
        cpu,
        memory_bytes,
        created: Utc::now(),
        updated: Utc::now(),
        remarks: String::new(),
    }
}

/// Agent reported running domain, memory in KiB.
pub fn create_example_domain(id: Uuid, vcpu: u32, memory_kib: u64) -> Domain {
    Domain {
        id,
        name: String::from("vm01"),
        vcpu,
        memory: memory_kib,
        memory_unit: MemoryUnit::KiB,
        state: Some(DomainStateReport {
            state: 1,
            reason: 1,
        }),
    }
}

pub fn create_example_vm_request() -> VmCreateRequest {
    VmCreateRequest {
        hostname: String::from("vm01"),
        owner: create_example_owner(),
        cpu: 2,
        memory_mib: 2048,
        image: String::from("debian-12"),
        cloud_init: None,
        os: String::from("linux"),
        os_variant: String::from("debian12"),
        disks: vec![],
        interfaces: vec![],
        remarks: String::new(),
    }
}

pub struct ExamplePki {
    pub ca_pem: String,
    pub ca_der: CertificateDer<'static>,
    pub server_pem: String,
    pub server_key_pem: String,
    pub server_der: CertificateDer<'static>,
    pub client_pem: String,
    pub client_key_pem: String,
}

fn sign_leaf(
    serial: Vec<u8>,
    usage: ExtendedKeyUsagePurpose,
    ca: &Certificate,
    ca_key: &KeyPair,
) -> (Certificate, KeyPair) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    params.serial_number = Some(SerialNumber::from(serial));
    params.subject_alt_names = vec![SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST))];
    params.extended_key_usages = vec![usage];
    (params.signed_by(&key, ca, ca_key).unwrap(), key)
}

/// Fresh CA with an agent certificate (serial 4660) and a controller
/// certificate (serial 22136), both valid for 127.0.0.1.
pub fn create_example_pki() -> ExamplePki {
    let ca_key = KeyPair::generate().unwrap();
    let mut ca_params = CertificateParams::default();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, format!("fleet example ca {}", Uuid::new_v4()));
    let ca = ca_params.self_signed(&ca_key).unwrap();
    let (server, server_key) =
        sign_leaf(vec![0x12, 0x34], ExtendedKeyUsagePurpose::ServerAuth, &ca, &ca_key);
    let (client, client_key) =
        sign_leaf(vec![0x56, 0x78], ExtendedKeyUsagePurpose::ClientAuth, &ca, &ca_key);
    ExamplePki {
        ca_pem: ca.pem(),
        ca_der: ca.der().clone(),
        server_pem: server.pem(),
        server_key_pem: server_key.serialize_pem(),
        server_der: server.der().clone(),
        client_pem: client.pem(),
        client_key_pem: client_key.serialize_pem(),
    }
}

mock! {
    pub HypervisorBackend {}

    #[async_trait]
    impl HypervisorBackend for HypervisorBackend {
        async fn get_specs(&self) -> Result<HypervisorSpecs, BackendError>;
        async fn list_vms(&self) -> Result<Vec<Domain>, BackendError>;
        async fn get_vm(&self, vm_id: &Uuid) -> Result<Domain, BackendError>;
        async fn get_vm_state(&self, vm_id: &Uuid) -> Result<DomainStateReport, BackendError>;
        async fn set_vm_state(&self, vm_id: &Uuid, action: StateAction) -> Result<DomainStateReport, BackendError>;
        async fn create_vm(&self, definition: &DomainDefinition) -> Result<(), BackendError>;
        async fn delete_vm(&self, vm_id: &Uuid) -> Result<(), BackendError>;
        async fn open_console(&self, vm_id: &Uuid) -> Result<ConsoleStream, BackendError>;
    }
}

mock! {
    pub Store {}

    #[async_trait]
    impl Store for Store {
        async fn list_hypervisors(&self) -> Result<Vec<HypervisorRecord>, StoreError>;
        async fn list_vms(&self, hypervisor_id: &Uuid) -> Result<Vec<VmRecord>, StoreError>;
        async fn insert_vm(&self, record: VmRecord) -> Result<(), StoreError>;
        async fn delete_vm(&self, vm_id: &Uuid) -> Result<(), StoreError>;
    }
}

mock! {
    pub Hypervisor {}

    #[async_trait]
    impl Hypervisor for Hypervisor {
        async fn init(&mut self, token: &CancellationToken) -> Result<(), HypervisorError>;
        async fn refresh(&mut self, token: &CancellationToken) -> Result<(), HypervisorError>;
        async fn reconcile_vms(&mut self, token: &CancellationToken) -> Result<ReconcileReport, HypervisorError>;
        async fn create_vm(&mut self, request: VmCreateRequest, token: &CancellationToken) -> Result<Uuid, HypervisorError>;
        async fn delete_vm(&mut self, vm_id: &Uuid, token: &CancellationToken) -> Result<(), HypervisorError>;
        async fn get_vm_state(&mut self, vm_id: &Uuid, token: &CancellationToken) -> Result<VmStateView, HypervisorError>;
        async fn set_vm_state(&mut self, vm_id: &Uuid, action: StateAction, token: &CancellationToken) -> Result<DomainState, HypervisorError>;
        fn describe(&self) -> HypervisorDescription;
        fn get_vm(&self, vm_id: &Uuid) -> Result<VmDescription, HypervisorError>;
        fn list_vms(&self) -> Vec<VmDescription>;
        fn last_report(&self) -> Option<ReconcileReport>;
        fn backend(&self) -> Arc<dyn HypervisorBackend + Send + Sync>;
    }
}

mock! {
    pub HypervisorCreator {}

    impl HypervisorCreator for HypervisorCreator {
        fn create_hypervisor(&self, record: &HypervisorRecord) -> Result<Box<dyn Hypervisor + Send + Sync>, FleetError>;
    }
}
