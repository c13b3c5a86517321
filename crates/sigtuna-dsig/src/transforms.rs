#![forbid(unsafe_code)]

//! Reference transforms.
//!
//! OPC signing uses exactly two transform algorithms: C14N (either
//! variant) and the OPC Relationships Transform. Each reference applies
//! its transforms in order, and a relationships reference always ends
//! with a C14N step.

use sigtuna_c14n::{escape, C14nMode};
use sigtuna_core::{algorithm, ns, Error, Result};

/// Data flowing through a transform chain.
#[derive(Debug)]
pub enum TransformData {
    /// XML text (for XML-aware transforms).
    Xml(String),
    /// Raw binary data.
    Binary(Vec<u8>),
}

impl TransformData {
    /// Convert to bytes, canonicalizing XML that no transform flattened.
    pub fn into_binary(self) -> Result<Vec<u8>> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::Xml(text) => sigtuna_c14n::canonicalize(&text, C14nMode::Inclusive),
        }
    }
}

/// Trait for individual transforms.
pub trait Transform {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Execute the transform on the given data.
    fn execute(&self, input: TransformData) -> Result<TransformData>;
}

/// Run `input` through `transforms` in order and flatten to bytes.
pub fn run_pipeline(transforms: &[Box<dyn Transform>], input: TransformData) -> Result<Vec<u8>> {
    let mut data = input;
    for transform in transforms {
        data = transform.execute(data)?;
    }
    data.into_binary()
}

// ── C14N transform ───────────────────────────────────────────────────

pub struct C14nTransform {
    mode: C14nMode,
}

impl C14nTransform {
    pub fn new(mode: C14nMode) -> Self {
        Self { mode }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute(&self, input: TransformData) -> Result<TransformData> {
        let bytes = match input {
            TransformData::Xml(text) => sigtuna_c14n::canonicalize(&text, self.mode)?,
            TransformData::Binary(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                sigtuna_c14n::canonicalize(text, self.mode)?
            }
        };
        Ok(TransformData::Binary(bytes))
    }
}

// ── OPC Relationships Transform ──────────────────────────────────────

/// The OPC Relationships Transform (ECMA-376 part 2 §13.2.4.24).
///
/// Retains only `Relationship` elements whose `Id` is in the configured
/// set (all of them when the set is empty), sorted lexicographically by
/// `Id`, each reduced to the `Id`, `Type`, `Target`, `TargetMode`
/// attributes in that order.
pub struct RelationshipsTransform {
    source_ids: Vec<String>,
}

impl RelationshipsTransform {
    pub fn new(source_ids: Vec<String>) -> Self {
        Self { source_ids }
    }

    pub fn source_ids(&self) -> &[String] {
        &self.source_ids
    }
}

impl Transform for RelationshipsTransform {
    fn uri(&self) -> &str {
        algorithm::RELATIONSHIP_TRANSFORM
    }

    fn execute(&self, input: TransformData) -> Result<TransformData> {
        let text = match input {
            TransformData::Xml(text) => text,
            TransformData::Binary(data) => String::from_utf8(data)
                .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?,
        };

        let doc = roxmltree::Document::parse(&text)
            .map_err(|e| Error::Transform(format!("relationships transform: {e}")))?;
        let root = doc.root_element();
        if root.tag_name().name() != ns::node::RELATIONSHIPS
            || root.tag_name().namespace() != Some(ns::RELATIONSHIPS)
        {
            return Err(Error::Transform(
                "relationships transform requires a Relationships document".into(),
            ));
        }

        let mut retained: Vec<(String, String, String, Option<String>)> = Vec::new();
        for child in root.children().filter(|c| c.is_element()) {
            if child.tag_name().name() != ns::node::RELATIONSHIP {
                continue;
            }
            let id = child.attribute(ns::attr::ID).ok_or_else(|| {
                Error::Transform("relationships transform: Relationship without Id".into())
            })?;
            if !self.source_ids.is_empty() && !self.source_ids.iter().any(|s| s == id) {
                continue;
            }
            let rel_type = child.attribute(ns::attr::TYPE).unwrap_or_default();
            let target = child.attribute(ns::attr::TARGET).unwrap_or_default();
            retained.push((
                id.to_owned(),
                rel_type.to_owned(),
                target.to_owned(),
                child.attribute(ns::attr::TARGET_MODE).map(str::to_owned),
            ));
        }
        // Lexicographic (code-point) order by Id.
        retained.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = format!("<Relationships xmlns=\"{}\">", ns::RELATIONSHIPS);
        for (id, rel_type, target, target_mode) in &retained {
            out.push_str(&format!(
                "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"",
                escape::escape_attr(id),
                escape::escape_attr(rel_type),
                escape::escape_attr(target)
            ));
            if let Some(mode) = target_mode {
                out.push_str(&format!(" TargetMode=\"{}\"", escape::escape_attr(mode)));
            }
            out.push_str("/>");
        }
        out.push_str("</Relationships>");

        Ok(TransformData::Xml(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="Rb" Type="urn:b" Target="/b.xml" TargetMode="Internal"/>
  <Relationship Id="Ra" Type="urn:a" Target="/a.xml"/>
  <Relationship Id="Rc" Type="urn:c" Target="http://x/" TargetMode="External"/>
</Relationships>"#;

    fn run(transform: &RelationshipsTransform) -> String {
        match transform.execute(TransformData::Xml(RELS.to_owned())).unwrap() {
            TransformData::Xml(text) => text,
            TransformData::Binary(_) => panic!("expected XML output"),
        }
    }

    #[test]
    fn empty_id_set_keeps_all_sorted_by_id() {
        let out = run(&RelationshipsTransform::new(Vec::new()));
        let a = out.find("Id=\"Ra\"").unwrap();
        let b = out.find("Id=\"Rb\"").unwrap();
        let c = out.find("Id=\"Rc\"").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn id_set_filters_relationships() {
        let out = run(&RelationshipsTransform::new(vec!["Rc".into(), "Ra".into()]));
        assert!(out.contains("Id=\"Ra\""));
        assert!(!out.contains("Id=\"Rb\""));
        assert!(out.contains("Id=\"Rc\""));
    }

    #[test]
    fn attribute_order_is_id_type_target_mode() {
        let out = run(&RelationshipsTransform::new(vec!["Rc".into()]));
        assert!(out.contains(
            r#"<Relationship Id="Rc" Type="urn:c" Target="http://x/" TargetMode="External"/>"#
        ));
    }

    #[test]
    fn pipeline_output_is_deterministic() {
        let pipeline = || -> Vec<Box<dyn Transform>> {
            vec![
                Box::new(RelationshipsTransform::new(Vec::new())),
                Box::new(C14nTransform::new(C14nMode::Inclusive)),
            ]
        };
        let one = run_pipeline(&pipeline(), TransformData::Xml(RELS.to_owned())).unwrap();
        let two = run_pipeline(&pipeline(), TransformData::Xml(RELS.to_owned())).unwrap();
        assert_eq!(one, two);
        assert!(one.starts_with(b"<Relationships"));
    }

    #[test]
    fn non_relationships_document_is_rejected() {
        let transform = RelationshipsTransform::new(Vec::new());
        let err = transform
            .execute(TransformData::Xml("<x/>".to_owned()))
            .unwrap_err();
        assert!(matches!(err, Error::Transform(_)));
    }
}
