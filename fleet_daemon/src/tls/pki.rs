use super::serial_verifier::{certificate_serial, SerialPinningVerifier};
use log::info;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const CA_FILE: &str = "ca.crt";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PkiError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("No certificate found in {0}")]
    MissingCertificate(String),
    #[error("No private key found in {0}")]
    MissingKey(String),
    #[error("Failed to parse {0}")]
    Parse(String),
    #[error("Failed to build tls configuration: {0}")]
    Config(String),
}

/// Cluster CA plus this controller's client certificate and key.
pub struct TlsIdentity {
    roots: Arc<RootCertStore>,
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    provider: Arc<CryptoProvider>,
}

async fn read(path: &Path) -> Result<Vec<u8>, PkiError> {
    tokio::fs::read(path).await.map_err(|err| PkiError::Read {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

fn parse_certificates(pem: &[u8], source: &str) -> Result<Vec<CertificateDer<'static>>, PkiError> {
    let certificates = rustls_pemfile::certs(&mut std::io::BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| PkiError::Parse(format!("{}: {}", source, err)))?;
    if certificates.is_empty() {
        return Err(PkiError::MissingCertificate(source.to_string()));
    }
    Ok(certificates)
}

impl TlsIdentity {
    /// Reads `ca.crt`, `<hostname>.crt` and `<hostname>.key` from `tls_path`.
    pub async fn load(tls_path: &Path, hostname: &str) -> Result<Self, PkiError> {
        let ca = read(&tls_path.join(CA_FILE)).await?;
        let certificate = read(&tls_path.join(format!("{}.crt", hostname))).await?;
        let key = read(&tls_path.join(format!("{}.key", hostname))).await?;
        let identity = Self::from_pem(&ca, &certificate, &key)?;
        info!(
            "Loaded tls identity for {} from {}, certificate serial {}",
            hostname,
            tls_path.display(),
            identity.serial()?
        );
        Ok(identity)
    }

    pub fn from_pem(ca: &[u8], certificate: &[u8], key: &[u8]) -> Result<Self, PkiError> {
        let mut roots = RootCertStore::empty();
        for certificate in parse_certificates(ca, CA_FILE)? {
            roots
                .add(certificate)
                .map_err(|err| PkiError::Parse(format!("{}: {}", CA_FILE, err)))?;
        }
        let chain = parse_certificates(certificate, "certificate")?;
        let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key))
            .map_err(|err| PkiError::Parse(format!("private key: {}", err)))?
            .ok_or_else(|| PkiError::MissingKey(String::from("private key")))?;
        Ok(TlsIdentity {
            roots: Arc::new(roots),
            chain,
            key,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        })
    }

    /// Serial number of this controller's own certificate.
    pub fn serial(&self) -> Result<String, PkiError> {
        let leaf = self
            .chain
            .first()
            .ok_or_else(|| PkiError::MissingCertificate(String::from("certificate")))?;
        certificate_serial(leaf).map_err(PkiError::Parse)
    }

    /// Client configuration that only completes a handshake with a server
    /// whose leaf certificate serial equals `expected_serial`.
    pub fn client_config(&self, expected_serial: &str) -> Result<ClientConfig, PkiError> {
        let inner =
            WebPkiServerVerifier::builder_with_provider(self.roots.clone(), self.provider.clone())
                .build()
                .map_err(|err| PkiError::Config(err.to_string()))?;
        ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|err| PkiError::Config(err.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SerialPinningVerifier::new(
                inner,
                expected_serial,
            )))
            .with_client_auth_cert(self.chain.clone(), self.key.clone_key())
            .map_err(|err| PkiError::Config(err.to_string()))
    }
}
