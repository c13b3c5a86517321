#![forbid(unsafe_code)]

//! Part digesting.
//!
//! A reference over an XML part that carries transforms digests the
//! transformed canonical bytes; everything else digests the raw part
//! bytes. A part whose registered content type declares XML but whose
//! body does not parse is treated as a malformed package rather than
//! silently hashed.

use crate::transforms::{run_pipeline, Transform, TransformData};
use sigtuna_core::{Error, Result};
use sigtuna_crypto::HashAlgorithm;
use sigtuna_opc::Package;

/// Whether a MIME type denotes XML content.
pub fn is_xml_content_type(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    media == "text/xml" || media == "application/xml" || media.ends_with("+xml")
}

/// Digest one package part through an optional transform chain.
pub fn digest_part(
    package: &Package,
    part_uri: &str,
    transforms: &[Box<dyn Transform>],
    hash: HashAlgorithm,
) -> Result<Vec<u8>> {
    let bytes = package.read_part(part_uri)?;
    let content_type = package.content_type_of(part_uri)?;

    if transforms.is_empty() || !is_xml_content_type(content_type) {
        return Ok(hash.digest(bytes));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::MalformedPackage(format!("{part_uri}: XML part is not UTF-8")))?;
    if roxmltree::Document::parse(text).is_err() {
        return Err(Error::MalformedPackage(format!(
            "{part_uri}: content type declares XML but the part is not well-formed"
        )));
    }

    let canonical = run_pipeline(transforms, TransformData::Xml(text.to_owned()))?;
    Ok(hash.digest(&canonical))
}

/// Digest already-materialized XML (used for freshly serialized
/// relationship collections that may be newer than the stored part).
pub fn digest_xml(
    xml: &str,
    transforms: &[Box<dyn Transform>],
    hash: HashAlgorithm,
) -> Result<Vec<u8>> {
    let canonical = run_pipeline(transforms, TransformData::Xml(xml.to_owned()))?;
    Ok(hash.digest(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::C14nTransform;
    use sigtuna_c14n::C14nMode;
    use sigtuna_opc::FileMode;
    use std::io::Write;

    fn package_with(parts: &[(&str, &[u8])], content_types: &str) -> (tempfile::TempDir, Package) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.vsix");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(content_types.as_bytes()).unwrap();
        for (name, data) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        let pkg = Package::open(&path, FileMode::ReadOnly).unwrap();
        (dir, pkg)
    }

    const CT: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="text/xml"/><Default Extension="bin" ContentType="application/octet-stream"/></Types>"#;

    #[test]
    fn binary_part_digests_raw_bytes() {
        let (_dir, pkg) = package_with(&[("data.bin", &[1, 2, 3])], CT);
        let digest = digest_part(&pkg, "/data.bin", &[], HashAlgorithm::Sha256).unwrap();
        assert_eq!(digest, HashAlgorithm::Sha256.digest(&[1, 2, 3]));
    }

    #[test]
    fn xml_part_without_transforms_digests_raw_bytes() {
        let (_dir, pkg) = package_with(&[("doc.xml", b"<a  b='1'/>")], CT);
        let digest = digest_part(&pkg, "/doc.xml", &[], HashAlgorithm::Sha1).unwrap();
        assert_eq!(digest, HashAlgorithm::Sha1.digest(b"<a  b='1'/>"));
    }

    #[test]
    fn xml_part_with_transforms_digests_canonical_form() {
        let (_dir, pkg) = package_with(&[("doc.xml", b"<a b=\"2\" a=\"1\"/>")], CT);
        let transforms: Vec<Box<dyn Transform>> =
            vec![Box::new(C14nTransform::new(C14nMode::Inclusive))];
        let digest = digest_part(&pkg, "/doc.xml", &transforms, HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            digest,
            HashAlgorithm::Sha256.digest(br#"<a a="1" b="2"></a>"#)
        );
    }

    #[test]
    fn malformed_declared_xml_is_rejected() {
        let (_dir, pkg) = package_with(&[("doc.xml", b"<not-closed")], CT);
        let transforms: Vec<Box<dyn Transform>> =
            vec![Box::new(C14nTransform::new(C14nMode::Inclusive))];
        assert!(matches!(
            digest_part(&pkg, "/doc.xml", &transforms, HashAlgorithm::Sha256),
            Err(Error::MalformedPackage(_))
        ));
    }

    #[test]
    fn unknown_content_type_propagates() {
        let (_dir, pkg) = package_with(&[("mystery.ext", b"x")], CT);
        assert!(matches!(
            digest_part(&pkg, "/mystery.ext", &[], HashAlgorithm::Sha256),
            Err(Error::UnknownContentType(_))
        ));
    }
}
