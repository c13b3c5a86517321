#![forbid(unsafe_code)]

//! Signing identities for package signing: a private key plus the X.509
//! certificate chain embedded into `KeyInfo`.

pub mod identity;
pub mod loader;

pub use identity::SigningIdentity;
