#![forbid(unsafe_code)]

//! Signature emission.
//!
//! The builder enumerates references, digests them, canonicalizes and
//! signs `SignedInfo`, and writes the signature part plus the origin part
//! and relationship plumbing. All computation happens before the first
//! package mutation, and mutations stay buffered until the package is
//! flushed, so a failed sign leaves the archive untouched.

use crate::digester::{digest_part, digest_xml};
use crate::signature::{signatures, PackageSignature};
use crate::transforms::{C14nTransform, RelationshipsTransform, Transform};
use base64::Engine;
use rand::RngCore;
use sigtuna_c14n::{escape, C14nMode};
use sigtuna_core::{algorithm, ns, Error, Result};
use sigtuna_crypto::{sign, HashAlgorithm};
use sigtuna_keys::SigningIdentity;
use sigtuna_opc::{
    uri, Package, CONTENT_TYPES_PART, MIME_RELATIONSHIPS, MIME_SIGNATURE_ORIGIN,
    MIME_XML_SIGNATURE, ORIGIN_PART, REL_TYPE_ORIGIN, REL_TYPE_SIGNATURE, SIGNATURE_DIR,
};

/// A reference preset. Variants are data: each names a fixed enumeration
/// policy over the package.
#[derive(Debug, Clone, Copy)]
pub enum Preset {
    /// VSIX policy: every part except content-types, signature material,
    /// and `.rels` parts; plus one Relationships-Transform reference per
    /// non-empty relationship collection, restricted to the ids of
    /// non-signature relationships.
    Vsix,
}

enum RefEntry {
    Part { part: String },
    Rels { source: String, ids: Vec<String> },
}

/// Accumulates references, then signs.
pub struct SignatureBuilder<'a> {
    package: &'a mut Package,
    entries: Vec<RefEntry>,
}

impl<'a> SignatureBuilder<'a> {
    pub fn new(package: &'a mut Package) -> Self {
        Self {
            package,
            entries: Vec::new(),
        }
    }

    /// Add the references a preset enumerates.
    pub fn enqueue_preset(&mut self, preset: Preset) -> Result<()> {
        match preset {
            Preset::Vsix => self.enqueue_vsix(),
        }
    }

    fn enqueue_vsix(&mut self) -> Result<()> {
        for part in self.package.part_names() {
            if uri::eq_ignore_case(&part, CONTENT_TYPES_PART)
                || is_signature_material(&part)
                || uri::is_rels_part(&part)
            {
                continue;
            }
            self.entries.push(RefEntry::Part { part });
        }

        for source in self.package.relationship_sources() {
            if is_signature_material(&source) {
                continue;
            }
            let Some(rels) = self.package.relationships(&source) else {
                continue;
            };
            let ids: Vec<String> = rels
                .iter()
                .filter(|r| r.rel_type != REL_TYPE_ORIGIN && r.rel_type != REL_TYPE_SIGNATURE)
                .map(|r| r.id.clone())
                .collect();
            if ids.is_empty() {
                continue;
            }
            self.entries.push(RefEntry::Rels { source, ids });
        }

        log::debug!("enqueued {} references", self.entries.len());
        Ok(())
    }

    /// Produce the signature and store it in the package.
    pub fn sign(
        self,
        hash: HashAlgorithm,
        identity: &SigningIdentity,
    ) -> Result<PackageSignature> {
        let Self { package, entries } = self;

        if package.is_read_only() {
            return Err(Error::ReadOnly);
        }
        if entries.is_empty() {
            return Err(Error::InvalidOperation("no references enqueued".into()));
        }

        let mut guid_bytes = [0u8; 16];
        package.rng_mut().fill_bytes(&mut guid_bytes);
        let guid = uuid::Builder::from_random_bytes(guid_bytes).into_uuid();
        let signature_id = format!("xmldsig-{guid}");
        let signature_part = format!("{SIGNATURE_DIR}/{guid}.psdsxs");

        let b64 = base64::engine::general_purpose::STANDARD;

        // Manifest: one Reference per entry, digested through its
        // transform chain. No package mutation happens in this phase.
        let mut manifest = String::new();
        for entry in &entries {
            match entry {
                RefEntry::Part { part } => {
                    let content_type = package.content_type_of(part)?.to_owned();
                    let digest = digest_part(package, part, &[], hash)?;
                    manifest.push_str(&format!(
                        "<Reference URI=\"{}?ContentType={}\">\
                         <DigestMethod Algorithm=\"{}\"></DigestMethod>\
                         <DigestValue>{}</DigestValue></Reference>",
                        escape::escape_attr(&uri::percent_encode(part)),
                        escape::escape_attr(&content_type),
                        hash.digest_uri(),
                        b64.encode(&digest)
                    ));
                }
                RefEntry::Rels { source, ids } => {
                    let rels_part = uri::rels_part_for(source);
                    let rels_xml = package
                        .relationships(source)
                        .map(|r| r.serialize())
                        .ok_or_else(|| {
                            Error::InvalidOperation(format!(
                                "enqueued relationships of {source} no longer exist"
                            ))
                        })?;
                    let transforms: Vec<Box<dyn Transform>> = vec![
                        Box::new(RelationshipsTransform::new(ids.clone())),
                        Box::new(C14nTransform::new(C14nMode::Inclusive)),
                    ];
                    let digest = digest_xml(&rels_xml, &transforms, hash)?;

                    let mut transform_xml = format!(
                        "<Transform Algorithm=\"{}\">",
                        algorithm::RELATIONSHIP_TRANSFORM
                    );
                    for id in ids {
                        transform_xml.push_str(&format!(
                            "<mdssi:RelationshipReference xmlns:mdssi=\"{}\" SourceId=\"{}\">\
                             </mdssi:RelationshipReference>",
                            ns::OPC_DSIG,
                            escape::escape_attr(id)
                        ));
                    }
                    transform_xml.push_str("</Transform>");
                    transform_xml.push_str(&format!(
                        "<Transform Algorithm=\"{}\"></Transform>",
                        algorithm::C14N
                    ));

                    manifest.push_str(&format!(
                        "<Reference URI=\"{}?ContentType={}\"><Transforms>{}</Transforms>\
                         <DigestMethod Algorithm=\"{}\"></DigestMethod>\
                         <DigestValue>{}</DigestValue></Reference>",
                        escape::escape_attr(&uri::percent_encode(&rels_part)),
                        MIME_RELATIONSHIPS,
                        transform_xml,
                        hash.digest_uri(),
                        b64.encode(&digest)
                    ));
                }
            }
        }

        let object_xml = format!(
            "<Object xmlns=\"{}\" Id=\"idPackageObject\"><Manifest>{manifest}</Manifest></Object>",
            ns::DSIG
        );
        let object_digest =
            hash.digest(&sigtuna_c14n::canonicalize(&object_xml, C14nMode::Inclusive)?);

        // SignatureProperties: UTC signing time, millisecond precision.
        let signing_time = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        let property_xml = format!(
            "<SignatureProperty xmlns=\"{}\" Id=\"idSignatureTime\" Target=\"#{signature_id}\">\
             <mdssi:SignatureTime xmlns:mdssi=\"{}\">\
             <mdssi:Format>YYYY-MM-DDThh:mm:ss.sTZD</mdssi:Format>\
             <mdssi:Value>{signing_time}</mdssi:Value>\
             </mdssi:SignatureTime></SignatureProperty>",
            ns::DSIG,
            ns::OPC_DSIG
        );
        let property_digest =
            hash.digest(&sigtuna_c14n::canonicalize(&property_xml, C14nMode::Inclusive)?);

        // SignedInfo over the manifest object and the properties.
        let signature_method = identity.key().signature_uri(hash);
        let signed_info_xml = format!(
            "<SignedInfo xmlns=\"{}\">\
             <CanonicalizationMethod Algorithm=\"{}\"></CanonicalizationMethod>\
             <SignatureMethod Algorithm=\"{signature_method}\"></SignatureMethod>\
             <Reference URI=\"#idPackageObject\" Type=\"{}\">\
             <DigestMethod Algorithm=\"{}\"></DigestMethod>\
             <DigestValue>{}</DigestValue></Reference>\
             <Reference URI=\"#idSignatureTime\" Type=\"{}\">\
             <DigestMethod Algorithm=\"{}\"></DigestMethod>\
             <DigestValue>{}</DigestValue></Reference>\
             </SignedInfo>",
            ns::DSIG,
            algorithm::C14N,
            algorithm::REF_TYPE_OBJECT,
            hash.digest_uri(),
            b64.encode(&object_digest),
            algorithm::REF_TYPE_SIGNATURE_PROPERTIES,
            hash.digest_uri(),
            b64.encode(&property_digest)
        );

        let canonical_signed_info =
            sigtuna_c14n::canonicalize(&signed_info_xml, C14nMode::Inclusive)?;
        let alg = sign::from_uri(signature_method)?;
        let signature_value = alg.sign(identity.key(), &canonical_signed_info)?;

        let mut key_info = String::new();
        if !identity.certificates().is_empty() {
            key_info.push_str("<KeyInfo><X509Data>");
            for cert in identity.certificates() {
                key_info.push_str(&format!(
                    "<X509Certificate>{}</X509Certificate>",
                    b64.encode(cert)
                ));
            }
            key_info.push_str("</X509Data></KeyInfo>");
        }

        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\r\n\
             <Signature xmlns=\"{}\" Id=\"{signature_id}\">{signed_info_xml}\
             <SignatureValue>{}</SignatureValue>{key_info}{object_xml}\
             <Object><SignatureProperties>{property_xml}</SignatureProperties></Object>\
             </Signature>",
            ns::DSIG,
            b64.encode(&signature_value)
        );

        // Mutation phase: registries, origin plumbing, the part itself.
        {
            let content_types = package.content_types_mut()?;
            content_types.add_default("rels", MIME_RELATIONSHIPS);
            content_types.add_default("psdsor", MIME_SIGNATURE_ORIGIN);
            content_types.add_default("psdsxs", MIME_XML_SIGNATURE);
        }
        if !package.has_part(ORIGIN_PART) {
            package.write_part(ORIGIN_PART, Vec::new())?;
        }
        let root_has_origin = package
            .relationships("/")
            .is_some_and(|r| r.by_type(REL_TYPE_ORIGIN).next().is_some());
        if !root_has_origin {
            package.add_relationship("/", REL_TYPE_ORIGIN, ORIGIN_PART)?;
        }
        package.add_relationship(ORIGIN_PART, REL_TYPE_SIGNATURE, &signature_part)?;
        package.write_part(&signature_part, document.clone().into_bytes())?;

        log::info!(
            "signed with {} over {} reference(s) into {signature_part}",
            signature_method,
            entries.len()
        );
        Ok(PackageSignature::new(signature_part, document.into_bytes()))
    }
}

/// Sign a package with the VSIX preset, replacing any existing signature.
pub fn sign_package(
    package: &mut Package,
    identity: &SigningIdentity,
    hash: HashAlgorithm,
) -> Result<PackageSignature> {
    if package.is_read_only() {
        return Err(Error::ReadOnly);
    }
    for mut existing in signatures(package)? {
        existing.remove(package)?;
    }
    let mut builder = SignatureBuilder::new(package);
    builder.enqueue_preset(Preset::Vsix)?;
    builder.sign(hash, identity)
}

/// Origin part, origin relationships, or anything under the signature
/// directory.
fn is_signature_material(part: &str) -> bool {
    let lower = part.to_ascii_lowercase();
    uri::eq_ignore_case(part, ORIGIN_PART)
        || lower.starts_with(&format!("{}/", SIGNATURE_DIR.to_ascii_lowercase()))
        || lower.starts_with("/package/services/digital-signature/_rels/")
}
