#![forbid(unsafe_code)]

//! Key and certificate loading (PKCS#12, PEM, PKCS#8 DER).

use crate::identity::SigningIdentity;
use der::{Decode, Encode};
use sigtuna_core::{Error, Result};
use sigtuna_crypto::sign::SigningKey;
use x509_cert::Certificate;

/// Load an identity from PKCS#12 data.
///
/// The certificate whose public key matches the private key becomes the
/// leaf; remaining certificates keep their original order.
pub fn load_pfx(data: &[u8], password: &str) -> Result<SigningIdentity> {
    let contents = sigtuna_pkcs12::parse_pfx(data, password)?;
    let key_der = contents
        .private_keys
        .first()
        .ok_or_else(|| Error::Key("PFX contains no private key".into()))?;
    let key = load_private_key_der(key_der)?;

    let chain = order_leaf_first(contents.certificates, &key);
    SigningIdentity::new(key, chain)
}

/// Load an identity from PEM data: certificate chain + private key.
pub fn load_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<SigningIdentity> {
    let certs = Certificate::load_pem_chain(cert_pem)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate PEM: {e}")))?;
    if certs.is_empty() {
        return Err(Error::Certificate("certificate PEM holds no certificates".into()));
    }
    let mut chain = Vec::with_capacity(certs.len());
    for cert in &certs {
        chain.push(
            cert.to_der()
                .map_err(|e| Error::Certificate(format!("failed to re-encode certificate: {e}")))?,
        );
    }

    let key = load_private_key_pem(key_pem)?;
    let chain = order_leaf_first(chain, &key);
    SigningIdentity::new(key, chain)
}

/// Load a private key from PKCS#8 DER, trying RSA then EC P-256 then P-384.
pub fn load_private_key_der(der: &[u8]) -> Result<SigningKey> {
    use pkcs8::DecodePrivateKey;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(SigningKey::Rsa(pk));
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(SigningKey::EcP256(sk));
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(SigningKey::EcP384(sk));
    }
    Err(Error::Key(
        "unsupported private key (expected RSA, P-256, or P-384 PKCS#8)".into(),
    ))
}

/// Load a private key from PEM, trying PKCS#8 first and PKCS#1 for RSA.
pub fn load_private_key_pem(pem_data: &[u8]) -> Result<SigningKey> {
    use pkcs8::DecodePrivateKey;

    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_pem(pem_str) {
        return Ok(SigningKey::Rsa(pk));
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem_str) {
        return Ok(SigningKey::EcP256(sk));
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_pem(pem_str) {
        return Ok(SigningKey::EcP384(sk));
    }

    use pkcs1::DecodeRsaPrivateKey;
    let pk = rsa::RsaPrivateKey::from_pkcs1_pem(pem_str)
        .map_err(|e| Error::Key(format!("failed to parse private key PEM: {e}")))?;
    Ok(SigningKey::Rsa(pk))
}

/// Move the certificate matching the key's public half to the front.
fn order_leaf_first(mut certs: Vec<Vec<u8>>, key: &SigningKey) -> Vec<Vec<u8>> {
    let Some(spki) = public_key_spki(key) else {
        return certs;
    };
    let leaf_idx = certs.iter().position(|der| {
        Certificate::from_der(der)
            .ok()
            .and_then(|cert| cert.tbs_certificate.subject_public_key_info.to_der().ok())
            .is_some_and(|cert_spki| cert_spki == spki)
    });
    match leaf_idx {
        Some(idx) => {
            let leaf = certs.remove(idx);
            certs.insert(0, leaf);
            certs
        }
        None => {
            if !certs.is_empty() {
                log::warn!("no certificate in the chain matches the private key");
            }
            certs
        }
    }
}

/// DER SubjectPublicKeyInfo for the key's public half.
fn public_key_spki(key: &SigningKey) -> Option<Vec<u8>> {
    use pkcs8::EncodePublicKey;
    match key {
        SigningKey::Rsa(pk) => pk
            .to_public_key()
            .to_public_key_der()
            .ok()
            .map(|d| d.as_bytes().to_vec()),
        SigningKey::RsaPublic(pk) => {
            pk.to_public_key_der().ok().map(|d| d.as_bytes().to_vec())
        }
        SigningKey::EcP256(sk) => sk
            .verifying_key()
            .to_public_key_der()
            .ok()
            .map(|d| d.as_bytes().to_vec()),
        SigningKey::EcP256Public(vk) => {
            vk.to_public_key_der().ok().map(|d| d.as_bytes().to_vec())
        }
        SigningKey::EcP384(sk) => sk
            .verifying_key()
            .to_public_key_der()
            .ok()
            .map(|d| d.as_bytes().to_vec()),
        SigningKey::EcP384Public(vk) => {
            vk.to_public_key_der().ok().map(|d| d.as_bytes().to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::EncodePrivateKey;

    #[test]
    fn pkcs8_der_round_trip_p256() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let der = sk.to_pkcs8_der().unwrap();
        let loaded = load_private_key_der(der.as_bytes()).unwrap();
        assert!(matches!(loaded, SigningKey::EcP256(_)));
    }

    #[test]
    fn pkcs8_pem_round_trip_p384() {
        let sk = p384::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let pem = sk.to_pkcs8_pem(pkcs8::LineEnding::LF).unwrap();
        let loaded = load_private_key_pem(pem.as_bytes()).unwrap();
        assert!(matches!(loaded, SigningKey::EcP384(_)));
    }

    #[test]
    fn junk_key_data_is_rejected() {
        assert!(load_private_key_der(b"junk").is_err());
        assert!(load_private_key_pem(b"-----BEGIN JUNK-----").is_err());
    }

    #[test]
    fn unmatched_chain_keeps_order() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let key = SigningKey::EcP256(sk);
        let chain = vec![vec![1u8], vec![2u8]];
        assert_eq!(order_leaf_first(chain.clone(), &key), chain);
    }
}
