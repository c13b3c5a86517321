#![forbid(unsafe_code)]

//! The signing identity: key material plus certificate chain.

use sigtuna_core::{Error, Result};
use sigtuna_crypto::sign::SigningKey;

/// A private key and its X.509 chain, leaf first.
pub struct SigningIdentity {
    key: SigningKey,
    /// DER-encoded certificates, leaf first. May be empty for bare keys.
    certificates: Vec<Vec<u8>>,
}

impl SigningIdentity {
    pub fn new(key: SigningKey, certificates: Vec<Vec<u8>>) -> Result<Self> {
        if !key.can_sign() {
            return Err(Error::Key("signing requires a private key".into()));
        }
        Ok(Self { key, certificates })
    }

    /// Load from a PKCS#12 (.pfx) file.
    pub fn from_pfx(data: &[u8], password: &str) -> Result<Self> {
        crate::loader::load_pfx(data, password)
    }

    /// Load from PEM files: a certificate chain and a private key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        crate::loader::load_pem(cert_pem, key_pem)
    }

    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    /// DER certificates, leaf first.
    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    pub fn leaf_certificate(&self) -> Option<&[u8]> {
        self.certificates.first().map(Vec::as_slice)
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SigningIdentity({:?}, {} certificate(s))",
            self.key,
            self.certificates.len()
        )
    }
}
