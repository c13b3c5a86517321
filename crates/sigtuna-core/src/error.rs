#![forbid(unsafe_code)]

/// Errors produced by the Sigtuna package-signing library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("package is read-only")]
    ReadOnly,

    #[error("malformed package: {0}")]
    MalformedPackage(String),

    #[error("no content type registered for part: {0}")]
    UnknownContentType(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("timestamp failed: {0}")]
    Timestamp(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
