#![forbid(unsafe_code)]

pub use sigtuna_c14n as c14n;
pub use sigtuna_core as core;
pub use sigtuna_crypto as crypto;
pub use sigtuna_dsig as dsig;
pub use sigtuna_keys as keys;
pub use sigtuna_opc as opc;
pub use sigtuna_pkcs12 as pkcs12;
pub use sigtuna_tsp as tsp;
