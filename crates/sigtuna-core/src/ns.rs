#![forbid(unsafe_code)]

//! XML namespace constants used across the library.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XAdES namespace (qualifying properties for timestamp embedding)
pub const XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";

/// OPC content types namespace
pub const CONTENT_TYPES: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";

/// OPC relationships namespace
pub const RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// OPC digital signature namespace (SignatureTime property)
pub const OPC_DSIG: &str =
    "http://schemas.openxmlformats.org/package/2006/digital-signature";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const OBJECT: &str = "Object";
    pub const MANIFEST: &str = "Manifest";
    pub const SIGNATURE_PROPERTIES: &str = "SignatureProperties";
    pub const SIGNATURE_PROPERTY: &str = "SignatureProperty";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";

    // KeyInfo elements
    pub const KEY_INFO: &str = "KeyInfo";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";

    // OPC signature-time elements
    pub const SIGNATURE_TIME: &str = "SignatureTime";
    pub const SIGNATURE_TIME_FORMAT: &str = "Format";
    pub const SIGNATURE_TIME_VALUE: &str = "Value";

    // OPC package metadata elements
    pub const TYPES: &str = "Types";
    pub const TYPES_DEFAULT: &str = "Default";
    pub const TYPES_OVERRIDE: &str = "Override";
    pub const RELATIONSHIPS: &str = "Relationships";
    pub const RELATIONSHIP: &str = "Relationship";

    // XAdES elements (timestamp countersignature)
    pub const QUALIFYING_PROPERTIES: &str = "QualifyingProperties";
    pub const UNSIGNED_PROPERTIES: &str = "UnsignedProperties";
    pub const UNSIGNED_SIGNATURE_PROPERTIES: &str = "UnsignedSignatureProperties";
    pub const SIGNATURE_TIME_STAMP: &str = "SignatureTimeStamp";
    pub const ENCAPSULATED_TIME_STAMP: &str = "EncapsulatedTimeStamp";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const URI: &str = "URI";
    pub const TYPE: &str = "Type";
    pub const TARGET: &str = "Target";
    pub const TARGET_MODE: &str = "TargetMode";
    pub const ALGORITHM: &str = "Algorithm";
    pub const EXTENSION: &str = "Extension";
    pub const PART_NAME: &str = "PartName";
    pub const CONTENT_TYPE: &str = "ContentType";
    pub const SOURCE_ID: &str = "SourceId";
}
