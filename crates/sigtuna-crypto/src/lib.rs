#![forbid(unsafe_code)]

//! Cryptographic primitives for OPC digital signatures: the digest
//! algorithm table and RSA/ECDSA signature algorithms, both addressed by
//! their XML-DSig URIs.

pub mod digest;
pub mod sign;

pub use digest::HashAlgorithm;
pub use sign::{SignatureAlgorithm, SigningKey};
