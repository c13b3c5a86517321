#![forbid(unsafe_code)]

//! OPC (Open Packaging Conventions) package model.
//!
//! A VSIX package is a ZIP archive following OPC: named parts, a
//! `[Content_Types].xml` registry, and per-part relationship documents.
//! This crate exposes the package as an in-memory part store plus parsed
//! metadata registries; mutations are buffered and written back atomically
//! on flush.

mod content_types;
mod package;
mod relationships;
mod store;
pub mod uri;

pub use content_types::{ContentTypes, Entry as ContentTypeEntry, CONTENT_TYPES_PART};
pub use package::{FileMode, Package};
pub use relationships::{Relationship, Relationships};
pub use store::PartStore;

// ── Digital-signature part layout ────────────────────────────────────

/// The signature-origin part.
pub const ORIGIN_PART: &str = "/package/services/digital-signature/origin.psdsor";

/// Relationships of the signature-origin part (lists the signatures).
pub const ORIGIN_RELS_PART: &str =
    "/package/services/digital-signature/_rels/origin.psdsor.rels";

/// Directory that holds XML signature parts.
pub const SIGNATURE_DIR: &str = "/package/services/digital-signature/xml-signature";

// ── Relationship types ───────────────────────────────────────────────

/// Root → signature-origin relationship.
pub const REL_TYPE_ORIGIN: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/origin";

/// Origin → signature relationship.
pub const REL_TYPE_SIGNATURE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/signature";

// ── Content types ────────────────────────────────────────────────────

pub const MIME_RELATIONSHIPS: &str =
    "application/vnd.openxmlformats-package.relationships+xml";

pub const MIME_SIGNATURE_ORIGIN: &str =
    "application/vnd.openxmlformats-package.digital-signature-origin";

pub const MIME_XML_SIGNATURE: &str =
    "application/vnd.openxmlformats-package.digital-signature-xmlsignature+xml";
