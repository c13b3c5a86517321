#![forbid(unsafe_code)]

//! BER parsing of PKCS#12 (PFX) structures (RFC 7292).
//!
//! Uses `yasna::parse_ber` since PKCS#12 files use BER encoding, not
//! strict DER.

use sigtuna_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, Tag};

use crate::kdf::{self, MacDigest, Prf};
use crate::PfxContents;

// ── OID constants ──────────────────────────────────────────────────────────

// Content types (PKCS#7)
const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

// Bag types (PKCS#12)
const OID_PKCS8_SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
const OID_CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];

// Certificate type
const OID_X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

// PBE algorithms
const OID_PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
const OID_PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const OID_PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];

// Cipher
const OID_AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

// Hash / HMAC
const OID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
const OID_SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
const OID_HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
const OID_HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

// ── Parsed structures ──────────────────────────────────────────────────────

/// A password-based encryption scheme read from an AlgorithmIdentifier.
#[derive(Debug)]
enum PbeScheme {
    LegacySha1Des3 {
        salt: Vec<u8>,
        iterations: u32,
    },
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: Prf,
        iv: Vec<u8>,
    },
}

struct MacData {
    digest: MacDigest,
    digest_value: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum SafeBag {
    ShroudedKey { scheme: PbeScheme, ciphertext: Vec<u8> },
    Certificate { der: Vec<u8> },
    Other,
}

enum ContentInfo {
    Data(Vec<u8>),
    Encrypted { scheme: PbeScheme, ciphertext: Vec<u8> },
}

// ── Top-level parser ───────────────────────────────────────────────────────

pub fn parse_pfx(data: &[u8], password: &str) -> Result<PfxContents, Error> {
    let (auth_safe_data, mac_data) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            let version = r.next().read_u32()?;
            if version != 3 {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            let auth_safe_data = parse_outer_data(r.next())?;
            let mac_data = r.read_optional(parse_mac_data)?;
            Ok((auth_safe_data, mac_data))
        })
    })
    .map_err(|e| Error::Key(format!("failed to parse PKCS#12 PFX: {e}")))?;

    if let Some(ref mac) = mac_data {
        verify_mac(mac, &auth_safe_data, password)?;
    }

    let content_infos = yasna::parse_ber(&auth_safe_data, |r| {
        r.collect_sequence_of(parse_content_info)
    })
    .map_err(|e| Error::Key(format!("failed to parse authSafe contents: {e}")))?;

    let bmp_password = kdf::password_to_bmp(password);
    let mut private_keys = Vec::new();
    let mut certificates = Vec::new();

    for ci in content_infos {
        let bags_data = match ci {
            ContentInfo::Data(data) => data,
            ContentInfo::Encrypted { scheme, ciphertext } => {
                decrypt(&scheme, &ciphertext, password, &bmp_password)?
            }
        };

        let bags = yasna::parse_ber(&bags_data, |r| r.collect_sequence_of(parse_safe_bag))
            .map_err(|e| Error::Key(format!("failed to parse SafeBags: {e}")))?;

        for bag in bags {
            match bag {
                SafeBag::ShroudedKey { scheme, ciphertext } => {
                    private_keys.push(decrypt(&scheme, &ciphertext, password, &bmp_password)?);
                }
                SafeBag::Certificate { der } => certificates.push(der),
                SafeBag::Other => {}
            }
        }
    }

    Ok(PfxContents {
        private_keys,
        certificates,
    })
}

// ── ContentInfo parsing ────────────────────────────────────────────────────

/// The top-level ContentInfo wrapping the authSafe: must be `data`, with
/// the payload in a `[0] EXPLICIT OCTET STRING`.
fn parse_outer_data(r: BERReader) -> Result<Vec<u8>, ASN1Error> {
    r.read_sequence(|r| {
        if r.next().read_oid()? != oid(OID_DATA) {
            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
        }
        r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
    })
}

fn parse_content_info(r: BERReader) -> Result<ContentInfo, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;

        if content_type == oid(OID_DATA) {
            let data = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            Ok(ContentInfo::Data(data))
        } else if content_type == oid(OID_ENCRYPTED_DATA) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let _version = r.next().read_u32()?;
                    r.next().read_sequence(|r| {
                        let _inner_type = r.next().read_oid()?;
                        let scheme = parse_pbe_scheme(r.next())?;
                        let ciphertext = r
                            .next()
                            .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                        Ok(ContentInfo::Encrypted { scheme, ciphertext })
                    })
                })
            })
        } else {
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        }
    })
}

// ── SafeBag parsing ────────────────────────────────────────────────────────

fn parse_safe_bag(r: BERReader) -> Result<SafeBag, ASN1Error> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;

        let bag = if bag_type == oid(OID_PKCS8_SHROUDED_KEY_BAG) {
            // [0] EXPLICIT EncryptedPrivateKeyInfo
            let (scheme, ciphertext) = r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let scheme = parse_pbe_scheme(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok((scheme, ciphertext))
                })
            })?;
            SafeBag::ShroudedKey { scheme, ciphertext }
        } else if bag_type == oid(OID_CERT_BAG) {
            // [0] EXPLICIT CertBag
            let der = r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    if r.next().read_oid()? != oid(OID_X509_CERTIFICATE) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
                })
            })?;
            SafeBag::Certificate { der }
        } else {
            let _value = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
            SafeBag::Other
        };

        skip_bag_attributes(r)?;
        Ok(bag)
    })
}

/// Read and discard the optional `SET OF PKCS12Attribute` trailing a bag.
fn skip_bag_attributes(r: &mut yasna::BERReaderSeq<'_, '_>) -> Result<(), ASN1Error> {
    let _ = r.read_optional(|r| {
        r.read_set_of(|r| {
            r.read_sequence(|r| {
                let _oid = r.next().read_oid()?;
                r.next().read_set_of(|r| {
                    let _ = r.read_der()?;
                    Ok(())
                })?;
                Ok(())
            })
        })
    })?;
    Ok(())
}

// ── AlgorithmIdentifier parsing ────────────────────────────────────────────

fn parse_pbe_scheme(r: BERReader) -> Result<PbeScheme, ASN1Error> {
    r.read_sequence(|r| {
        let alg_oid = r.next().read_oid()?;

        if alg_oid == oid(OID_PBE_SHA1_3DES) {
            // Legacy params: SEQUENCE { salt OCTET STRING, iterations INTEGER }
            r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(PbeScheme::LegacySha1Des3 { salt, iterations })
            })
        } else if alg_oid == oid(OID_PBES2) {
            // PBES2-params: SEQUENCE { keyDerivationFunc AlgId, encryptionScheme AlgId }
            r.next().read_sequence(|r| {
                let (salt, iterations, prf) = r.next().read_sequence(|r| {
                    if r.next().read_oid()? != oid(OID_PBKDF2) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    // PBKDF2-params: SEQUENCE { salt, iterationCount, keyLength?, prf? }
                    r.next().read_sequence(|r| {
                        let salt = r.next().read_bytes()?;
                        let iterations = r.next().read_u32()?;
                        let mut prf = Prf::HmacSha1; // RFC 8018 default

                        // Both keyLength (INTEGER) and prf (SEQUENCE) are
                        // optional; disambiguate on the leading tag byte.
                        if let Some(der_bytes) = r.read_optional(|r| r.read_der())? {
                            if der_bytes.first() == Some(&0x30) {
                                prf = parse_prf(&der_bytes)?;
                            } else if let Some(prf_der) =
                                r.read_optional(|r| r.read_der())?
                            {
                                prf = parse_prf(&prf_der)?;
                            }
                        }
                        Ok((salt, iterations, prf))
                    })
                })?;

                let iv = r.next().read_sequence(|r| {
                    if r.next().read_oid()? != oid(OID_AES_256_CBC) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    r.next().read_bytes()
                })?;

                Ok(PbeScheme::Pbes2 {
                    salt,
                    iterations,
                    prf,
                    iv,
                })
            })
        } else {
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        }
    })
}

fn parse_prf(der: &[u8]) -> Result<Prf, ASN1Error> {
    yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let prf_oid = r.next().read_oid()?;
            let _null = r.read_optional(|r| r.read_null())?;
            if prf_oid == oid(OID_HMAC_SHA256) {
                Ok(Prf::HmacSha256)
            } else if prf_oid == oid(OID_HMAC_SHA1) {
                Ok(Prf::HmacSha1)
            } else {
                Err(ASN1Error::new(ASN1ErrorKind::Invalid))
            }
        })
    })
}

// ── MAC verification ───────────────────────────────────────────────────────

fn parse_mac_data(r: BERReader) -> Result<MacData, ASN1Error> {
    r.read_sequence(|r| {
        let (digest, digest_value) = r.next().read_sequence(|r| {
            let digest = r.next().read_sequence(|r| {
                let hash_oid = r.next().read_oid()?;
                let _null = r.read_optional(|r| r.read_null())?;
                if hash_oid == oid(OID_SHA256) {
                    Ok(MacDigest::Sha256)
                } else if hash_oid == oid(OID_SHA1) {
                    Ok(MacDigest::Sha1)
                } else {
                    Err(ASN1Error::new(ASN1ErrorKind::Invalid))
                }
            })?;
            let value = r.next().read_bytes()?;
            Ok((digest, value))
        })?;

        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);

        Ok(MacData {
            digest,
            digest_value,
            salt,
            iterations,
        })
    })
}

fn verify_mac(mac: &MacData, auth_safe_data: &[u8], password: &str) -> Result<(), Error> {
    let bmp_password = kdf::password_to_bmp(password);
    let key_len = match mac.digest {
        MacDigest::Sha1 => 20,
        MacDigest::Sha256 => 32,
    };
    let mac_key = kdf::pkcs12_kdf(
        mac.digest,
        kdf::ID_MAC,
        &bmp_password,
        &mac.salt,
        mac.iterations,
        key_len,
    );
    let computed = kdf::compute_mac(mac.digest, &mac_key, auth_safe_data);

    if computed != mac.digest_value {
        return Err(Error::Key(
            "PKCS#12 MAC verification failed (wrong password?)".into(),
        ));
    }
    Ok(())
}

// ── Decryption dispatch ────────────────────────────────────────────────────

fn decrypt(
    scheme: &PbeScheme,
    ciphertext: &[u8],
    password: &str,
    bmp_password: &[u8],
) -> Result<Vec<u8>, Error> {
    match scheme {
        PbeScheme::LegacySha1Des3 { salt, iterations } => {
            kdf::decrypt_pbe_sha1_3des(ciphertext, bmp_password, salt, *iterations)
        }
        PbeScheme::Pbes2 {
            salt,
            iterations,
            prf,
            iv,
        } => kdf::decrypt_pbes2_aes256cbc(ciphertext, password, *prf, salt, *iterations, iv),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_input_is_a_key_error() {
        let err = parse_pfx(b"not a pfx", "pw").unwrap_err();
        assert!(err.to_string().contains("PKCS#12"));
    }

    #[test]
    fn wrong_version_is_rejected() {
        // PFX with version 2: SEQUENCE { INTEGER 2 }
        let der = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(2);
            })
        });
        assert!(parse_pfx(&der, "pw").is_err());
    }

    #[test]
    fn mac_mismatch_fails_with_mac_error() {
        // Hand-build a PFX: version 3, authSafe = data("payload"),
        // macData computed with a DIFFERENT password.
        let payload = b"payload".to_vec();
        let bmp = kdf::password_to_bmp("other-password");
        let salt = b"12345678".to_vec();
        let mac_key = kdf::pkcs12_kdf(MacDigest::Sha256, kdf::ID_MAC, &bmp, &salt, 100, 32);
        let digest_value = kdf::compute_mac(MacDigest::Sha256, &mac_key, &payload);

        let der = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(3);
                // authSafe ContentInfo
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(OID_DATA));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_bytes(&payload);
                    });
                });
                // macData
                w.next().write_sequence(|w| {
                    w.next().write_sequence(|w| {
                        w.next().write_sequence(|w| {
                            w.next().write_oid(&oid(OID_SHA256));
                            w.next().write_null();
                        });
                        w.next().write_bytes(&digest_value);
                    });
                    w.next().write_bytes(&salt);
                    w.next().write_u32(100);
                });
            })
        });

        let err = parse_pfx(&der, "password").unwrap_err();
        assert!(err.to_string().contains("MAC verification failed"));
    }

    #[test]
    fn round_trip_unencrypted_key_and_cert_bags() {
        // Minimal PFX carrying one shrouded key (PBES2) and one cert bag,
        // MAC'd with the right password.
        let password = "test";
        let key_der = vec![0x30, 0x03, 0x02, 0x01, 0x00]; // placeholder PKCS#8 payload
        let cert_der = vec![0x30, 0x03, 0x02, 0x01, 0x01];

        // Encrypt the key payload with PBES2 / HMAC-SHA256.
        let salt = b"ssssssss";
        let iv = [9u8; 16];
        let mut kek = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), salt, 64, &mut kek);
        use cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
        let enc = cbc::Encryptor::<aes::Aes256>::new_from_slices(&kek, &iv).unwrap();
        let key_ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(&key_der);

        fn write_pbes2(w: yasna::DERWriter<'_>, salt: &[u8], iv: &[u8]) {
            w.write_sequence(|w| {
                w.next().write_oid(&oid(OID_PBES2));
                w.next().write_sequence(|w| {
                    w.next().write_sequence(|w| {
                        w.next().write_oid(&oid(OID_PBKDF2));
                        w.next().write_sequence(|w| {
                            w.next().write_bytes(salt);
                            w.next().write_u32(64);
                            w.next().write_sequence(|w| {
                                w.next().write_oid(&oid(OID_HMAC_SHA256));
                                w.next().write_null();
                            });
                        });
                    });
                    w.next().write_sequence(|w| {
                        w.next().write_oid(&oid(OID_AES_256_CBC));
                        w.next().write_bytes(iv);
                    });
                });
            });
        }

        // SafeContents: SEQUENCE OF SafeBag
        let safe_contents = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                // shrouded key bag
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(OID_PKCS8_SHROUDED_KEY_BAG));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_sequence(|w| {
                            write_pbes2(w.next(), salt, &iv);
                            w.next().write_bytes(&key_ciphertext);
                        });
                    });
                });
                // cert bag
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(OID_CERT_BAG));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_sequence(|w| {
                            w.next().write_oid(&oid(OID_X509_CERTIFICATE));
                            w.next().write_tagged(Tag::context(0), |w| {
                                w.write_bytes(&cert_der);
                            });
                        });
                    });
                });
            })
        });

        // authSafe: SEQUENCE OF ContentInfo(data(safe_contents))
        let auth_safe = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(OID_DATA));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_bytes(&safe_contents);
                    });
                });
            })
        });

        let bmp = kdf::password_to_bmp(password);
        let mac_salt = b"macmacma".to_vec();
        let mac_key = kdf::pkcs12_kdf(MacDigest::Sha256, kdf::ID_MAC, &bmp, &mac_salt, 100, 32);
        let digest_value = kdf::compute_mac(MacDigest::Sha256, &mac_key, &auth_safe);

        let pfx = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(3);
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(OID_DATA));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_bytes(&auth_safe);
                    });
                });
                w.next().write_sequence(|w| {
                    w.next().write_sequence(|w| {
                        w.next().write_sequence(|w| {
                            w.next().write_oid(&oid(OID_SHA256));
                            w.next().write_null();
                        });
                        w.next().write_bytes(&digest_value);
                    });
                    w.next().write_bytes(&mac_salt);
                    w.next().write_u32(100);
                });
            })
        });

        let contents = parse_pfx(&pfx, password).unwrap();
        assert_eq!(contents.private_keys, vec![key_der]);
        assert_eq!(contents.certificates, vec![cert_der]);
    }
}
