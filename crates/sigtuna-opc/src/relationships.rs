#![forbid(unsafe_code)]

//! Per-part relationship collections (`_rels/<name>.rels`).

use crate::uri;
use rand::RngCore;
use sigtuna_c14n::escape;
use sigtuna_core::{ns, Error, Result};

/// A typed link from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `Internal` when absent.
    pub target_mode: Option<String>,
}

/// The relationships owned by one source part (the root source is `/`).
pub struct Relationships {
    source: String,
    items: Vec<Relationship>,
    dirty: bool,
}

impl Relationships {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_owned(),
            items: Vec::new(),
            dirty: false,
        }
    }

    /// Parse a `.rels` document belonging to `source`.
    pub fn parse(source: &str, xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| Error::MalformedPackage(format!("relationships of {source}: {e}")))?;
        let root = doc.root_element();
        if root.tag_name().name() != ns::node::RELATIONSHIPS
            || root.tag_name().namespace() != Some(ns::RELATIONSHIPS)
        {
            return Err(Error::MalformedPackage(format!(
                "relationships of {source}: unexpected root element"
            )));
        }

        let mut items: Vec<Relationship> = Vec::new();
        for child in root.children().filter(|c| c.is_element()) {
            if child.tag_name().name() != ns::node::RELATIONSHIP {
                return Err(Error::MalformedPackage(format!(
                    "relationships of {source}: unexpected element {}",
                    child.tag_name().name()
                )));
            }
            let id = require_attr(&child, ns::attr::ID, source)?;
            let rel_type = require_attr(&child, ns::attr::TYPE, source)?;
            let target = require_attr(&child, ns::attr::TARGET, source)?;
            if items.iter().any(|r| r.id == id) {
                return Err(Error::MalformedPackage(format!(
                    "relationships of {source}: duplicate id {id}"
                )));
            }
            items.push(Relationship {
                id,
                rel_type,
                target: uri::percent_decode(&target),
                target_mode: child.attribute(ns::attr::TARGET_MODE).map(str::to_owned),
            });
        }
        Ok(Self {
            source: source.to_owned(),
            items,
            dirty: false,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Add a relationship with a freshly generated id (`R` + 8 uppercase
    /// hex digits), retried on collision. Returns the new id.
    pub fn add(&mut self, rel_type: &str, target: &str, rng: &mut dyn RngCore) -> String {
        let id = loop {
            let candidate = format!("R{:08X}", rng.next_u32());
            if self.by_id(&candidate).is_none() {
                break candidate;
            }
        };
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_owned(),
            target: target.to_owned(),
            target_mode: None,
        });
        self.dirty = true;
        id
    }

    /// Add a relationship with a caller-chosen id.
    pub fn add_with_id(&mut self, id: &str, rel_type: &str, target: &str) -> Result<()> {
        if self.by_id(id).is_some() {
            return Err(Error::InvalidOperation(format!(
                "duplicate relationship id {id} on {}",
                self.source
            )));
        }
        self.items.push(Relationship {
            id: id.to_owned(),
            rel_type: rel_type.to_owned(),
            target: target.to_owned(),
            target_mode: None,
        });
        self.dirty = true;
        Ok(())
    }

    /// Remove by id; returns whether the relationship existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|r| r.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn by_id(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn by_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.items.iter().filter(move |r| r.rel_type == rel_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Serialize back to `.rels` form.
    pub fn serialize(&self) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n",
        );
        out.push_str(&format!("<Relationships xmlns=\"{}\">", ns::RELATIONSHIPS));
        for rel in &self.items {
            out.push_str(&format!(
                "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"",
                escape::escape_attr(&rel.id),
                escape::escape_attr(&rel.rel_type),
                escape::escape_attr(&uri::percent_encode(&rel.target))
            ));
            if let Some(mode) = &rel.target_mode {
                out.push_str(&format!(" TargetMode=\"{}\"", escape::escape_attr(mode)));
            }
            out.push_str("/>");
        }
        out.push_str("</Relationships>");
        out
    }
}

fn require_attr(node: &roxmltree::Node<'_, '_>, name: &str, source: &str) -> Result<String> {
    node.attribute(name).map(str::to_owned).ok_or_else(|| {
        Error::MalformedPackage(format!(
            "relationships of {source}: Relationship without {name}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="R1" Type="urn:t1" Target="/a.xml"/>
  <Relationship Id="R2" Type="urn:t2" Target="http://example.com/" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn parse_reads_all_attributes() {
        let rels = Relationships::parse("/", SAMPLE).unwrap();
        assert_eq!(rels.len(), 2);
        let r2 = rels.by_id("R2").unwrap();
        assert_eq!(r2.rel_type, "urn:t2");
        assert_eq!(r2.target_mode.as_deref(), Some("External"));
    }

    #[test]
    fn generated_ids_are_r_plus_hex_and_unique() {
        let mut rels = Relationships::parse("/", SAMPLE).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let id = rels.add("urn:t3", "/b.xml", &mut rng);
        assert!(id.starts_with('R') && id.len() == 9);
        assert!(id[1..].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(
            id[1..].chars().all(|c| !c.is_ascii_lowercase()),
            "hex digits must be uppercase: {id}"
        );
        assert!(rels.by_id(&id).is_some());
    }

    #[test]
    fn duplicate_parsed_id_is_malformed() {
        let bad = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="R1" Type="t" Target="/a"/>
  <Relationship Id="R1" Type="t" Target="/b"/>
</Relationships>"#;
        assert!(matches!(
            Relationships::parse("/", bad),
            Err(Error::MalformedPackage(_))
        ));
    }

    #[test]
    fn add_with_duplicate_id_is_rejected() {
        let mut rels = Relationships::parse("/", SAMPLE).unwrap();
        assert!(matches!(
            rels.add_with_id("R1", "t", "/x"),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn remove_marks_dirty() {
        let mut rels = Relationships::parse("/", SAMPLE).unwrap();
        assert!(rels.remove("R1"));
        assert!(rels.is_dirty());
        assert!(!rels.remove("R1"));
        assert_eq!(rels.len(), 1);
    }

    #[test]
    fn serialization_round_trips() {
        let rels = Relationships::parse("/", SAMPLE).unwrap();
        let xml = rels.serialize();
        let reparsed = Relationships::parse("/", &xml).unwrap();
        assert_eq!(xml, reparsed.serialize());
        assert_eq!(reparsed.by_id("R2").unwrap().target, "http://example.com/");
    }
}
