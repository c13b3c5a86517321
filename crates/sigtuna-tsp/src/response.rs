#![forbid(unsafe_code)]

//! `TimeStampResp` parsing and validation (RFC 3161 §2.4.2).

use crate::request::TsRequest;
use sigtuna_core::{Error, Result};
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind};

// PKIStatus values accepted from a TSA.
const STATUS_GRANTED: u32 = 0;
const STATUS_GRANTED_WITH_MODS: u32 = 1;

const OID_SIGNED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 2];
const OID_CT_TST_INFO: &[u64] = &[1, 2, 840, 113549, 1, 9, 16, 1, 4];

/// Fields extracted from the token's `TSTInfo`.
#[derive(Debug)]
pub struct TstInfo {
    pub hash_oid: ObjectIdentifier,
    pub hashed_message: Vec<u8>,
    /// Raw DER of the echoed nonce INTEGER, if present.
    pub nonce_der: Option<Vec<u8>>,
    /// `genTime` rendered as `YYYY-MM-DDThh:mm:ss…` when parseable.
    pub gen_time: Option<String>,
}

/// Validate a `TimeStampResp` body against the request that produced it
/// and return the DER `TimeStampToken`.
pub fn validate_response(body: &[u8], request: &TsRequest) -> Result<Vec<u8>> {
    let (status, token_der) = yasna::parse_ber(body, |r| {
        r.read_sequence(|r| {
            let status = r.next().read_sequence(|r| {
                let status = r.next().read_u32()?;
                // statusString and failInfo are informational only
                while r.read_optional(|r| r.read_der())?.is_some() {}
                Ok(status)
            })?;
            let token = r.read_optional(|r| r.read_der())?;
            Ok((status, token))
        })
    })
    .map_err(|e| Error::Timestamp(format!("malformed TimeStampResp: {e}")))?;

    if status != STATUS_GRANTED && status != STATUS_GRANTED_WITH_MODS {
        return Err(Error::Timestamp(format!("TSA rejected request (status {status})")));
    }
    let token_der =
        token_der.ok_or_else(|| Error::Timestamp("granted response without token".into()))?;

    let tst = parse_token(&token_der)?;
    if tst.hash_oid != ObjectIdentifier::from_slice(request.hash.oid()) {
        return Err(Error::Timestamp(format!(
            "token hash algorithm mismatch: {}",
            tst.hash_oid
        )));
    }
    if tst.hashed_message != request.imprint {
        return Err(Error::Timestamp("token message imprint mismatch".into()));
    }
    let expected_nonce = yasna::construct_der(|w| w.write_u64(request.nonce));
    match &tst.nonce_der {
        Some(echoed) if *echoed == expected_nonce => {}
        Some(_) => return Err(Error::Timestamp("token nonce mismatch".into())),
        None => return Err(Error::Timestamp("token omits the request nonce".into())),
    }

    log::debug!(
        "timestamp token accepted, genTime {}",
        tst.gen_time.as_deref().unwrap_or("unknown")
    );
    Ok(token_der)
}

/// Extract `TSTInfo` fields from a DER `TimeStampToken` (CMS SignedData).
pub fn parse_token(token_der: &[u8]) -> Result<TstInfo> {
    let tst_info_der = yasna::parse_ber(token_der, |r| {
        r.read_sequence(|r| {
            if r.next().read_oid()? != ObjectIdentifier::from_slice(OID_SIGNED_DATA) {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            r.next().read_tagged(yasna::Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let _version = r.next().read_u32()?;
                    let _digest_algorithms = r.next().read_der()?;
                    let e_content = r.next().read_sequence(|r| {
                        if r.next().read_oid()?
                            != ObjectIdentifier::from_slice(OID_CT_TST_INFO)
                        {
                            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                        }
                        r.next().read_tagged(yasna::Tag::context(0), |r| r.read_bytes())
                    })?;
                    // certificates, crls, signerInfos
                    while r.read_optional(|r| r.read_der())?.is_some() {}
                    Ok(e_content)
                })
            })
        })
    })
    .map_err(|e| Error::Timestamp(format!("malformed TimeStampToken: {e}")))?;

    yasna::parse_ber(&tst_info_der, |r| {
        r.read_sequence(|r| {
            let _version = r.next().read_u32()?;
            let _policy = r.next().read_oid()?;
            let (hash_oid, hashed_message) = r.next().read_sequence(|r| {
                let oid = r.next().read_sequence(|r| {
                    let oid = r.next().read_oid()?;
                    let _null = r.read_optional(|r| r.read_null())?;
                    Ok(oid)
                })?;
                let message = r.next().read_bytes()?;
                Ok((oid, message))
            })?;
            let _serial = r.next().read_der()?;
            let gen_time_raw = r.next().read_der()?;

            // Remaining fields (accuracy, ordering, nonce, tsa, extensions)
            // are a mix of optionals; the nonce is the only bare INTEGER.
            let mut nonce_der = None;
            while let Some(element) = r.read_optional(|r| r.read_der())? {
                if element.first() == Some(&0x02) {
                    nonce_der = Some(element);
                }
            }

            Ok(TstInfo {
                hash_oid,
                hashed_message,
                nonce_der,
                gen_time: generalized_time_string(&gen_time_raw),
            })
        })
    })
    .map_err(|e| Error::Timestamp(format!("malformed TSTInfo: {e}")))
}

/// Render a raw DER GeneralizedTime as `YYYY-MM-DDThh:mm:ss…`.
fn generalized_time_string(raw: &[u8]) -> Option<String> {
    if raw.len() < 2 || raw[0] != 0x18 {
        return None;
    }
    let len = raw[1] as usize;
    let body = raw.get(2..2 + len)?;
    let text = std::str::from_utf8(body).ok()?;
    if text.len() < 14 {
        return None;
    }
    Some(format!(
        "{}-{}-{}T{}:{}:{}{}",
        &text[0..4],
        &text[4..6],
        &text[6..8],
        &text[8..10],
        &text[10..12],
        &text[12..14],
        &text[14..]
    ))
}
