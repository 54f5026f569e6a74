use log::warn;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;

/// Decimal rendering of a certificate's serial number.
pub fn certificate_serial(certificate: &CertificateDer<'_>) -> Result<String, String> {
    let (_, parsed) = x509_parser::parse_x509_certificate(certificate.as_ref())
        .map_err(|err| err.to_string())?;
    Ok(parsed.tbs_certificate.serial.to_str_radix(10))
}

/// Accepts a server only if its chain is valid for the cluster CA and its
/// leaf certificate carries the pinned serial number.
#[derive(Debug)]
pub struct SerialPinningVerifier {
    inner: Arc<WebPkiServerVerifier>,
    expected_serial: String,
}

impl SerialPinningVerifier {
    pub fn new(inner: Arc<WebPkiServerVerifier>, expected_serial: &str) -> Self {
        SerialPinningVerifier {
            inner,
            expected_serial: expected_serial.trim().to_string(),
        }
    }
}

impl ServerCertVerifier for SerialPinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verified = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        )?;
        let serial = certificate_serial(end_entity).map_err(|err| {
            warn!("Can't read serial of certificate from {:?}: {}", server_name, err);
            rustls::Error::InvalidCertificate(CertificateError::BadEncoding)
        })?;
        if serial != self.expected_serial {
            warn!(
                "Rejected certificate from {:?}: serial {} doesn't match pinned serial {}",
                server_name, serial, self.expected_serial
            );
            return Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ));
        }
        Ok(verified)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
