#![forbid(unsafe_code)]

//! RFC 3161 countersigning of a stored signature.
//!
//! The token is appended as an XAdES unsigned property in a new `Object`
//! spliced in front of `</Signature>`; every byte before the splice point
//! (`SignedInfo` and `SignatureValue` included) is preserved verbatim.

use crate::signature::PackageSignature;
use base64::Engine;
use sigtuna_core::{ns, Error, Result};
use sigtuna_crypto::HashAlgorithm;
use sigtuna_opc::Package;
use sigtuna_tsp::HttpTransport;

/// Outcome of a timestamp attempt. TSA-side failures are reported, not
/// raised, so an optional timestamp step cannot fail the signing flow.
#[derive(Debug)]
pub enum TimestampOutcome {
    Success,
    Failed(String),
}

impl TimestampOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl PackageSignature {
    /// Countersign this signature with a token from the TSA at `url`.
    pub fn timestamp(
        &mut self,
        package: &mut Package,
        transport: &dyn HttpTransport,
        url: &str,
        hash: HashAlgorithm,
    ) -> Result<TimestampOutcome> {
        let part = self
            .part_uri()
            .ok_or_else(|| Error::InvalidOperation("signature was removed".into()))?
            .to_owned();
        if package.is_read_only() {
            return Err(Error::ReadOnly);
        }
        if self.has_timestamp() {
            return Err(Error::InvalidOperation(
                "signature already has a timestamp".into(),
            ));
        }

        let signature_value = self.signature_value()?;
        let signature_id = self.id()?;

        let token = match sigtuna_tsp::request_token(
            transport,
            url,
            &signature_value,
            hash,
            package.rng_mut(),
        ) {
            Ok(token) => token,
            Err(Error::Timestamp(reason)) => {
                log::warn!("timestamp attempt failed: {reason}");
                return Ok(TimestampOutcome::Failed(reason));
            }
            Err(other) => return Err(other),
        };

        let text = std::str::from_utf8(self.xml())
            .map_err(|e| Error::XmlParse(format!("signature part: {e}")))?;
        let splice_at = text
            .rfind("</Signature>")
            .ok_or_else(|| Error::MalformedPackage(format!("{part}: no Signature close tag")))?;

        let token_b64 = base64::engine::general_purpose::STANDARD.encode(&token);
        let object = format!(
            "<Object><xd:QualifyingProperties xmlns:xd=\"{}\" Target=\"#{signature_id}\">\
             <xd:UnsignedProperties><xd:UnsignedSignatureProperties>\
             <xd:SignatureTimeStamp><xd:EncapsulatedTimeStamp>{token_b64}\
             </xd:EncapsulatedTimeStamp></xd:SignatureTimeStamp>\
             </xd:UnsignedSignatureProperties></xd:UnsignedProperties>\
             </xd:QualifyingProperties></Object>",
            ns::XADES
        );

        let mut updated = String::with_capacity(text.len() + object.len());
        updated.push_str(&text[..splice_at]);
        updated.push_str(&object);
        updated.push_str(&text[splice_at..]);

        package.write_part(&part, updated.clone().into_bytes())?;
        self.set_xml(updated.into_bytes());

        log::info!("embedded {} byte timestamp token into {part}", token.len());
        Ok(TimestampOutcome::Success)
    }
}
