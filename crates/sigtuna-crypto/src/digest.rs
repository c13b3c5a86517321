#![forbid(unsafe_code)]

//! Digest (hash) algorithms.
//!
//! One enum carries the full mapping a signature needs: CLI name, digest
//! URI, matching RSA/ECDSA signature URIs, DER OID, and output length.

use digest::Digest;
use sigtuna_core::{algorithm, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Parse a CLI-style name (`sha1`, `sha256`, `sha384`, `sha512`).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(Error::UnsupportedAlgorithm(format!("digest: {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// The `DigestMethod` URI.
    pub fn digest_uri(&self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::SHA1,
            Self::Sha256 => algorithm::SHA256,
            Self::Sha384 => algorithm::SHA384,
            Self::Sha512 => algorithm::SHA512,
        }
    }

    pub fn from_digest_uri(uri: &str) -> Result<Self> {
        match uri {
            algorithm::SHA1 => Ok(Self::Sha1),
            algorithm::SHA256 => Ok(Self::Sha256),
            algorithm::SHA384 => Ok(Self::Sha384),
            algorithm::SHA512 => Ok(Self::Sha512),
            other => Err(Error::UnsupportedAlgorithm(format!("digest: {other}"))),
        }
    }

    /// The matching RSA `SignatureMethod` URI.
    pub fn rsa_signature_uri(&self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::RSA_SHA1,
            Self::Sha256 => algorithm::RSA_SHA256,
            Self::Sha384 => algorithm::RSA_SHA384,
            Self::Sha512 => algorithm::RSA_SHA512,
        }
    }

    /// The matching ECDSA `SignatureMethod` URI.
    pub fn ecdsa_signature_uri(&self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::ECDSA_SHA1,
            Self::Sha256 => algorithm::ECDSA_SHA256,
            Self::Sha384 => algorithm::ECDSA_SHA384,
            Self::Sha512 => algorithm::ECDSA_SHA512,
        }
    }

    /// DER object identifier components (for RFC 3161 message imprints).
    pub fn oid(&self) -> &'static [u64] {
        match self {
            Self::Sha1 => &[1, 3, 14, 3, 2, 26],
            Self::Sha256 => &[2, 16, 840, 1, 101, 3, 4, 2, 1],
            Self::Sha384 => &[2, 16, 840, 1, 101, 3, 4, 2, 2],
            Self::Sha512 => &[2, 16, 840, 1, 101, 3, 4, 2, 3],
        }
    }

    /// Digest output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Compute the digest of `data` in one shot.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}
