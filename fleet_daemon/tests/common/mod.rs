#![allow(dead_code)]

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use fleet_daemon::{
    client_handler::agent_client::{AgentClient, AgentTimeouts},
    tls::pki::TlsIdentity,
};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, SanType, SerialNumber,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};
use tokio_rustls::{
    rustls::{
        pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
        server::WebPkiClientVerifier,
        RootCertStore, ServerConfig,
    },
    TlsAcceptor,
};

pub const AGENT_SERIAL: &str = "4660";

pub struct TestAuthority {
    certificate: Certificate,
    key: KeyPair,
}

pub struct Leaf {
    pub certificate_pem: String,
    pub certificate_der: CertificateDer<'static>,
    pub key_pem: String,
    pub key_der: Vec<u8>,
}

impl TestAuthority {
    pub fn new() -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name.push(
            DnType::CommonName,
            format!("fleet integration ca {}", uuid::Uuid::new_v4()),
        );
        let certificate = params.self_signed(&key).unwrap();
        Self { certificate, key }
    }

    pub fn pem(&self) -> String {
        self.certificate.pem()
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.certificate.der().clone()
    }

    pub fn issue(&self, serial: &[u8], usage: ExtendedKeyUsagePurpose) -> Leaf {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.serial_number = Some(SerialNumber::from(serial.to_vec()));
        params.subject_alt_names = vec![SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST))];
        params.extended_key_usages = vec![usage];
        let certificate = params.signed_by(&key, &self.certificate, &self.key).unwrap();
        Leaf {
            certificate_pem: certificate.pem(),
            certificate_der: certificate.der().clone(),
            key_pem: key.serialize_pem(),
            key_der: key.serialize_der(),
        }
    }

    /// Agent certificate with serial 0x1234, i.e. `AGENT_SERIAL`.
    pub fn issue_agent(&self) -> Leaf {
        self.issue(&[0x12, 0x34], ExtendedKeyUsagePurpose::ServerAuth)
    }

    pub fn issue_controller(&self) -> Leaf {
        self.issue(&[0x56, 0x78], ExtendedKeyUsagePurpose::ClientAuth)
    }

    pub fn controller_identity(&self) -> TlsIdentity {
        let controller = self.issue_controller();
        TlsIdentity::from_pem(
            self.pem().as_bytes(),
            controller.certificate_pem.as_bytes(),
            controller.key_pem.as_bytes(),
        )
        .unwrap()
    }

    /// Writes `ca.crt`, `<hostname>.crt` and `<hostname>.key` into `dir`.
    pub fn write_controller_files(&self, dir: &Path, hostname: &str) {
        let controller = self.issue_controller();
        std::fs::write(dir.join("ca.crt"), self.pem()).unwrap();
        std::fs::write(
            dir.join(format!("{}.crt", hostname)),
            controller.certificate_pem,
        )
        .unwrap();
        std::fs::write(dir.join(format!("{}.key", hostname)), controller.key_pem).unwrap();
    }
}

pub type Handler = Arc<dyn Fn(&str, &str, &str) -> (u16, String) + Send + Sync>;

/// Status a handler returns to switch the connection into a byte echo.
pub const SWITCHING_PROTOCOLS: u16 = 101;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Minimal HTTPS agent. Records only requests that were fully received,
/// so a rejected handshake never shows up.
pub struct TestAgent {
    pub address: SocketAddr,
    requests: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|position| position + 4)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        409 => "Conflict",
        _ => "Status",
    }
}

impl TestAgent {
    pub async fn start(authority: &TestAuthority, agent: &Leaf, handler: Handler) -> Self {
        let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
        let mut roots = RootCertStore::empty();
        roots.add(authority.der()).unwrap();
        let client_verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                .build()
                .unwrap();
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_client_cert_verifier(client_verifier)
            .with_single_cert(
                vec![agent.certificate_der.clone()],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(agent.key_der.clone())),
            )
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let recorded = Arc::new(Mutex::new(Vec::new()));

        let counter = requests.clone();
        let log = recorded.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let counter = counter.clone();
                let log = log.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let Ok(mut tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let mut buffer = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let head_end = loop {
                        match tls.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
                        }
                        if let Some(end) = find_header_end(&buffer) {
                            break end;
                        }
                    };
                    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
                    let length = content_length(&head);
                    while buffer.len() < head_end + length {
                        match tls.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);

                    let body = String::from_utf8_lossy(&buffer[head_end..head_end + length]);
                    let mut request_line = head.split_whitespace();
                    let method = request_line.next().unwrap_or_default().to_string();
                    let path = request_line.next().unwrap_or_default().to_string();
                    log.lock().unwrap().push(RecordedRequest {
                        method: method.clone(),
                        path: path.clone(),
                        body: body.to_string(),
                    });
                    let (status, response) = handler(&method, &path, &body);
                    if status == SWITCHING_PROTOCOLS {
                        let switch = "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n";
                        if tls.write_all(switch.as_bytes()).await.is_err() {
                            return;
                        }
                        loop {
                            match tls.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(read) => {
                                    if tls.write_all(&chunk[..read]).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                    }
                    let message = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        reason(status),
                        response.len(),
                        response
                    );
                    let _ = tls.write_all(message.as_bytes()).await;
                    let _ = tls.shutdown().await;
                });
            }
        });
        Self {
            address,
            requests,
            recorded,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("https://{}", self.address)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }

    /// Stops accepting connections. Requests already answered stay recorded.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn create_client(agent_url: &str, identity: &TlsIdentity, serial: &str) -> AgentClient {
    AgentClient::new(
        agent_url,
        identity.client_config(serial).unwrap(),
        AgentTimeouts {
            request: Duration::from_secs(5),
            connect: Duration::from_secs(2),
        },
    )
    .unwrap()
}

pub fn specs_json() -> String {
    String::from(
        r#"{"cpu_model": "EPYC", "arch": "x86_64", "cpu_count": 32, "qemu_version": "8.2.0", "libvirt_version": "10.0.0"}"#,
    )
}
