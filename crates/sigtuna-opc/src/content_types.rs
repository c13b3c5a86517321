#![forbid(unsafe_code)]

//! The `[Content_Types].xml` registry.
//!
//! Entries keep document order so that serialization is stable across
//! parse/serialize round-trips.

use crate::uri;
use sigtuna_c14n::escape;
use sigtuna_core::{ns, Error, Result};

/// The content-types part URI.
pub const CONTENT_TYPES_PART: &str = "/[Content_Types].xml";

/// A single registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Maps a lowercased extension to a content type.
    Default {
        extension: String,
        content_type: String,
    },
    /// Maps one part URI to a content type.
    Override {
        part: String,
        content_type: String,
    },
}

/// Parsed `[Content_Types].xml`.
pub struct ContentTypes {
    entries: Vec<Entry>,
    dirty: bool,
}

impl ContentTypes {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            dirty: false,
        }
    }

    /// Parse the registry document.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| Error::MalformedPackage(format!("content types: {e}")))?;
        let root = doc.root_element();
        if root.tag_name().name() != ns::node::TYPES
            || root.tag_name().namespace() != Some(ns::CONTENT_TYPES)
        {
            return Err(Error::MalformedPackage(
                "content types: unexpected root element".into(),
            ));
        }

        let mut entries = Vec::new();
        for child in root.children().filter(|c| c.is_element()) {
            let content_type = child
                .attribute(ns::attr::CONTENT_TYPE)
                .ok_or_else(|| {
                    Error::MalformedPackage("content types: entry without ContentType".into())
                })?
                .to_owned();
            match child.tag_name().name() {
                n if n == ns::node::TYPES_DEFAULT => {
                    let extension = child.attribute(ns::attr::EXTENSION).ok_or_else(|| {
                        Error::MalformedPackage("content types: Default without Extension".into())
                    })?;
                    entries.push(Entry::Default {
                        extension: extension.to_ascii_lowercase(),
                        content_type,
                    });
                }
                n if n == ns::node::TYPES_OVERRIDE => {
                    let part = child.attribute(ns::attr::PART_NAME).ok_or_else(|| {
                        Error::MalformedPackage("content types: Override without PartName".into())
                    })?;
                    entries.push(Entry::Override {
                        part: uri::from_xml_name(part),
                        content_type,
                    });
                }
                other => {
                    return Err(Error::MalformedPackage(format!(
                        "content types: unexpected element {other}"
                    )));
                }
            }
        }
        Ok(Self {
            entries,
            dirty: false,
        })
    }

    /// Resolve a part's content type: `Override` first, then `Default` by
    /// lowercased extension.
    pub fn resolve(&self, part_uri: &str) -> Result<&str> {
        for entry in &self.entries {
            if let Entry::Override { part, content_type } = entry {
                if uri::eq_ignore_case(part, part_uri) {
                    return Ok(content_type);
                }
            }
        }
        if let Some(ext) = uri::extension(part_uri) {
            if let Some(ct) = self.default_for_extension(&ext) {
                return Ok(ct);
            }
        }
        Err(Error::UnknownContentType(part_uri.to_owned()))
    }

    pub fn default_for_extension(&self, ext: &str) -> Option<&str> {
        let ext = ext.to_ascii_lowercase();
        self.entries.iter().find_map(|entry| match entry {
            Entry::Default {
                extension,
                content_type,
            } if *extension == ext => Some(content_type.as_str()),
            _ => None,
        })
    }

    /// Register a `Default` mapping; a no-op when the same mapping exists.
    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        let extension = extension.to_ascii_lowercase();
        if self.default_for_extension(&extension) == Some(content_type) {
            return;
        }
        self.entries.push(Entry::Default {
            extension,
            content_type: content_type.to_owned(),
        });
        self.dirty = true;
    }

    /// Register an `Override` mapping, replacing a previous one for the part.
    pub fn add_override(&mut self, part: &str, content_type: &str) {
        self.remove_override(part);
        self.entries.push(Entry::Override {
            part: uri::normalize(part),
            content_type: content_type.to_owned(),
        });
        self.dirty = true;
    }

    /// Remove a `Default` entry by extension; returns whether one existed.
    pub fn remove_default(&mut self, extension: &str) -> bool {
        let ext = extension.to_ascii_lowercase();
        let before = self.entries.len();
        self.entries.retain(|entry| match entry {
            Entry::Default { extension, .. } => *extension != ext,
            Entry::Override { .. } => true,
        });
        let removed = self.entries.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Remove the `Override` entry for a part; returns whether one existed.
    pub fn remove_override(&mut self, part_uri: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| match entry {
            Entry::Override { part, .. } => !uri::eq_ignore_case(part, part_uri),
            Entry::Default { .. } => true,
        });
        let removed = self.entries.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Serialize back to `[Content_Types].xml` form.
    pub fn serialize(&self) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n",
        );
        out.push_str(&format!("<Types xmlns=\"{}\">", ns::CONTENT_TYPES));
        for entry in &self.entries {
            match entry {
                Entry::Default {
                    extension,
                    content_type,
                } => {
                    out.push_str(&format!(
                        "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                        escape::escape_attr(extension),
                        escape::escape_attr(content_type)
                    ));
                }
                Entry::Override { part, content_type } => {
                    out.push_str(&format!(
                        "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                        escape::escape_attr(&uri::percent_encode(part)),
                        escape::escape_attr(content_type)
                    ));
                }
            }
        }
        out.push_str("</Types>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="XML" ContentType="text/xml"/>
  <Override PartName="/extension.vsixmanifest" ContentType="text/xml"/>
</Types>"#;

    #[test]
    fn resolve_prefers_override() {
        let ct = ContentTypes::parse(SAMPLE).unwrap();
        assert_eq!(ct.resolve("/extension.vsixmanifest").unwrap(), "text/xml");
        assert_eq!(
            ct.resolve("/_rels/.rels").unwrap(),
            "application/vnd.openxmlformats-package.relationships+xml"
        );
    }

    #[test]
    fn resolve_by_extension_is_case_insensitive() {
        let ct = ContentTypes::parse(SAMPLE).unwrap();
        assert_eq!(ct.resolve("/doc/Data.Xml").unwrap(), "text/xml");
    }

    #[test]
    fn unknown_part_is_an_error() {
        let ct = ContentTypes::parse(SAMPLE).unwrap();
        assert!(matches!(
            ct.resolve("/unknown.bin"),
            Err(Error::UnknownContentType(_))
        ));
    }

    #[test]
    fn serialization_round_trips_stably() {
        let ct = ContentTypes::parse(SAMPLE).unwrap();
        let first = ct.serialize();
        let reparsed = ContentTypes::parse(&first).unwrap();
        assert_eq!(first, reparsed.serialize());
        assert_eq!(ct.entries(), reparsed.entries());
    }

    #[test]
    fn add_and_remove_mark_dirty() {
        let mut ct = ContentTypes::parse(SAMPLE).unwrap();
        assert!(!ct.is_dirty());
        ct.add_override("/sig.psdsxs", "application/octet-stream");
        assert!(ct.is_dirty());
        ct.mark_clean();
        assert!(ct.remove_override("/SIG.psdsxs"));
        assert!(ct.is_dirty());
        assert!(ct.resolve("/sig.psdsxs").is_err());
    }

    #[test]
    fn duplicate_default_is_not_duplicated() {
        let mut ct = ContentTypes::parse(SAMPLE).unwrap();
        let before = ct.entries().len();
        ct.add_default("rels", "application/vnd.openxmlformats-package.relationships+xml");
        assert_eq!(ct.entries().len(), before);
        assert!(!ct.is_dirty());
    }

    #[test]
    fn missing_required_attribute_is_malformed() {
        let bad = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="x"/></Types>"#;
        assert!(matches!(
            ContentTypes::parse(bad),
            Err(Error::MalformedPackage(_))
        ));
    }
}
