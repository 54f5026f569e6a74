pub mod pki;
pub mod serial_verifier;
