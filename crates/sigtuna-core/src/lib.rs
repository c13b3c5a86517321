#![forbid(unsafe_code)]

//! Shared foundation for the Sigtuna VSIX/OPC signing library: the error
//! taxonomy, algorithm URI constants, and XML namespace constants.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
