#![forbid(unsafe_code)]

//! XML-DSig signature engine for OPC/VSIX packages.
//!
//! The builder enumerates package parts into a `Manifest`, digests each
//! part through its transform chain, signs the canonicalized `SignedInfo`,
//! and embeds the signature part plus the origin part and relationship
//! plumbing. Existing signatures can be enumerated, removed, and
//! countersigned with RFC 3161 timestamps.

pub mod builder;
pub mod digester;
pub mod signature;
pub mod timestamp;
pub mod transforms;

pub use builder::{sign_package, Preset, SignatureBuilder};
pub use signature::{signatures, PackageSignature};
pub use timestamp::TimestampOutcome;
