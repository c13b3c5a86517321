#![forbid(unsafe_code)]

//! Signature discovery and removal.
//!
//! Handles hold the signature part URI plus a copy of its bytes and are
//! resolved against the package on each operation, so the package owns
//! all mutable state (no back-references).

use base64::Engine;
use sigtuna_core::{ns, Error, Result};
use sigtuna_opc::{uri, Package, ORIGIN_PART, ORIGIN_RELS_PART, REL_TYPE_ORIGIN, REL_TYPE_SIGNATURE};

/// One discovered (or freshly created) package signature.
pub struct PackageSignature {
    part: Option<String>,
    xml: Vec<u8>,
}

/// Enumerate the package's signatures via root → origin → signature
/// relationships.
pub fn signatures(package: &Package) -> Result<Vec<PackageSignature>> {
    let Some(root) = package.relationships("/") else {
        return Ok(Vec::new());
    };

    let mut found = Vec::new();
    for origin_rel in root.by_type(REL_TYPE_ORIGIN) {
        let origin = uri::normalize(&origin_rel.target);
        let Some(origin_rels) = package.relationships(&origin) else {
            continue;
        };
        for sig_rel in origin_rels.by_type(REL_TYPE_SIGNATURE) {
            let part = uri::normalize(&sig_rel.target);
            let xml = package.read_part(&part)?.to_vec();
            found.push(PackageSignature::new(part, xml));
        }
    }
    log::debug!("discovered {} signature(s)", found.len());
    Ok(found)
}

impl PackageSignature {
    pub(crate) fn new(part: String, xml: Vec<u8>) -> Self {
        Self {
            part: Some(part),
            xml,
        }
    }

    /// The signature part URI; `None` once the signature was removed.
    pub fn part_uri(&self) -> Option<&str> {
        self.part.as_deref()
    }

    pub(crate) fn xml(&self) -> &[u8] {
        &self.xml
    }

    pub(crate) fn set_xml(&mut self, xml: Vec<u8>) {
        self.xml = xml;
    }

    fn with_doc<T>(
        &self,
        f: impl FnOnce(&roxmltree::Document<'_>) -> Result<T>,
    ) -> Result<T> {
        let text = std::str::from_utf8(&self.xml)
            .map_err(|e| Error::XmlParse(format!("signature part: {e}")))?;
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| Error::XmlParse(format!("signature part: {e}")))?;
        f(&doc)
    }

    /// The `Signature/@Id` value.
    pub fn id(&self) -> Result<String> {
        self.with_doc(|doc| {
            doc.root_element()
                .attribute(ns::attr::ID)
                .map(str::to_owned)
                .ok_or_else(|| Error::MissingAttribute("Signature/@Id".into()))
        })
    }

    /// `SignedInfo/SignatureMethod/@Algorithm`.
    pub fn signature_method(&self) -> Result<String> {
        self.with_doc(|doc| {
            find_descendant(doc, ns::node::SIGNATURE_METHOD)
                .and_then(|n| n.attribute(ns::attr::ALGORITHM))
                .map(str::to_owned)
                .ok_or_else(|| Error::MissingElement("SignatureMethod".into()))
        })
    }

    /// The digest method of the `SignedInfo` references.
    pub fn digest_method(&self) -> Result<String> {
        self.with_doc(|doc| {
            find_descendant(doc, ns::node::DIGEST_METHOD)
                .and_then(|n| n.attribute(ns::attr::ALGORITHM))
                .map(str::to_owned)
                .ok_or_else(|| Error::MissingElement("DigestMethod".into()))
        })
    }

    /// The raw (base64-decoded) `SignatureValue` bytes.
    pub fn signature_value(&self) -> Result<Vec<u8>> {
        self.with_doc(|doc| {
            let text = find_descendant(doc, ns::node::SIGNATURE_VALUE)
                .and_then(|n| n.text())
                .ok_or_else(|| Error::MissingElement("SignatureValue".into()))?;
            let compact: String = text.split_whitespace().collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| Error::Base64(format!("SignatureValue: {e}")))
        })
    }

    /// DER certificates from `KeyInfo/X509Data`, in document order.
    pub fn certificates(&self) -> Result<Vec<Vec<u8>>> {
        self.with_doc(|doc| {
            let mut certs = Vec::new();
            for node in doc
                .descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == ns::node::X509_CERTIFICATE)
            {
                let text: String = node
                    .text()
                    .unwrap_or_default()
                    .split_whitespace()
                    .collect();
                certs.push(
                    base64::engine::general_purpose::STANDARD
                        .decode(text.as_bytes())
                        .map_err(|e| Error::Base64(format!("X509Certificate: {e}")))?,
                );
            }
            Ok(certs)
        })
    }

    /// The `SignatureTime` value recorded when signing.
    pub fn signing_time(&self) -> Result<Option<String>> {
        self.with_doc(|doc| {
            Ok(doc
                .descendants()
                .find(|n| {
                    n.is_element()
                        && n.tag_name().name() == ns::node::SIGNATURE_TIME_VALUE
                        && n.tag_name().namespace() == Some(ns::OPC_DSIG)
                })
                .and_then(|n| n.text())
                .map(str::to_owned))
        })
    }

    /// Whether an RFC 3161 countersignature is embedded.
    pub fn has_timestamp(&self) -> bool {
        self.with_doc(|doc| {
            Ok(doc.descendants().any(|n| {
                n.is_element() && n.tag_name().name() == ns::node::ENCAPSULATED_TIME_STAMP
            }))
        })
        .unwrap_or(false)
    }

    /// The embedded DER `TimeStampToken`, if any.
    pub fn encapsulated_timestamp(&self) -> Result<Option<Vec<u8>>> {
        self.with_doc(|doc| {
            let Some(node) = doc.descendants().find(|n| {
                n.is_element() && n.tag_name().name() == ns::node::ENCAPSULATED_TIME_STAMP
            }) else {
                return Ok(None);
            };
            let text: String = node.text().unwrap_or_default().split_whitespace().collect();
            base64::engine::general_purpose::STANDARD
                .decode(text.as_bytes())
                .map(Some)
                .map_err(|e| Error::Base64(format!("EncapsulatedTimeStamp: {e}")))
        })
    }

    /// Delete this signature from the package. When it was the last one,
    /// the origin part and its plumbing go with it.
    pub fn remove(&mut self, package: &mut Package) -> Result<()> {
        let part = self
            .part
            .clone()
            .ok_or_else(|| Error::InvalidOperation("signature was already removed".into()))?;
        if package.is_read_only() {
            return Err(Error::ReadOnly);
        }

        package.delete_part(&part)?;
        if let Some(origin_rels) = package.relationships(ORIGIN_PART) {
            let ids: Vec<String> = origin_rels
                .by_type(REL_TYPE_SIGNATURE)
                .filter(|r| uri::eq_ignore_case(&uri::normalize(&r.target), &part))
                .map(|r| r.id.clone())
                .collect();
            for id in ids {
                package.remove_relationship(ORIGIN_PART, &id)?;
            }
        }

        let remaining = package
            .relationships(ORIGIN_PART)
            .map(|r| r.by_type(REL_TYPE_SIGNATURE).count())
            .unwrap_or(0);
        if remaining == 0 {
            package.delete_part(ORIGIN_PART)?;
            package.delete_part(ORIGIN_RELS_PART)?;
            if let Some(root) = package.relationships("/") {
                let ids: Vec<String> = root
                    .by_type(REL_TYPE_ORIGIN)
                    .map(|r| r.id.clone())
                    .collect();
                for id in ids {
                    package.remove_relationship("/", &id)?;
                }
            }
            let content_types = package.content_types_mut()?;
            content_types.remove_default("psdsor");
            content_types.remove_default("psdsxs");
        }

        log::info!("removed signature {part}");
        self.part = None;
        self.xml.clear();
        Ok(())
    }
}

fn find_descendant<'a>(
    doc: &'a roxmltree::Document<'a>,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    doc.descendants().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace() == Some(ns::DSIG)
    })
}
