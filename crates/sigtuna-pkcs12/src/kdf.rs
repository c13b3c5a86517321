#![forbid(unsafe_code)]

//! Key derivation and decryption for PKCS#12.
//!
//! Two families:
//! 1. PKCS#12 KDF (RFC 7292 Appendix B) — MAC keys and the legacy
//!    pbeWithSHAAnd3-KeyTripleDES-CBC scheme
//! 2. PBES2 — PBKDF2 (HMAC-SHA1 or HMAC-SHA256) + AES-256-CBC

use cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use sigtuna_core::Error;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Des3CbcDec = cbc::Decryptor<des::TdesEde3>;

/// PKCS#12 KDF purpose ids (RFC 7292 Appendix B.3).
pub const ID_KEY: u8 = 1;
pub const ID_IV: u8 = 2;
pub const ID_MAC: u8 = 3;

/// PBKDF2 PRF selection inside PBES2 parameters.
#[derive(Debug, Clone, Copy)]
pub enum Prf {
    HmacSha1,
    HmacSha256,
}

/// MAC digest used by the PFX integrity envelope.
#[derive(Debug, Clone, Copy)]
pub enum MacDigest {
    Sha1,
    Sha256,
}

/// PKCS#12 KDF (RFC 7292 Appendix B) over SHA-1 (u=20) or SHA-256 (u=32).
///
/// `password` is BMP-encoded (UTF-16BE plus two trailing zero bytes).
pub fn pkcs12_kdf(
    digest: MacDigest,
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    match digest {
        MacDigest::Sha1 => kdf_rounds::<Sha1>(id, password, salt, iterations, output_len, 20, 64),
        MacDigest::Sha256 => {
            kdf_rounds::<Sha256>(id, password, salt, iterations, output_len, 32, 64)
        }
    }
}

fn kdf_rounds<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
    u: usize,
    v: usize,
) -> Vec<u8>
where
    D: Digest + sha2::digest::FixedOutputReset,
{
    // D = id repeated v times; I = S || P where S and P are the salt and
    // password each repeated to a multiple of v.
    let d_block = vec![id; v];
    let s = repeat_to_multiple(salt, v);
    let p = repeat_to_multiple(password, v);
    let mut i_block = Vec::with_capacity(s.len() + p.len());
    i_block.extend_from_slice(&s);
    i_block.extend_from_slice(&p);

    let num_blocks = output_len.div_ceil(u);
    let mut result = Vec::with_capacity(num_blocks * u);

    for block_idx in 0..num_blocks {
        // A = H^c(D || I)
        let mut hasher = D::new();
        Digest::update(&mut hasher, &d_block);
        Digest::update(&mut hasher, &i_block);
        let mut a = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }
        result.extend_from_slice(&a);

        if block_idx + 1 < num_blocks {
            // I_j = (I_j + B + 1) mod 2^(v*8), B = A repeated to v bytes
            let b = repeat_to_multiple(&a, v);
            for chunk in i_block.chunks_mut(v) {
                let mut carry: u16 = 1;
                for k in (0..chunk.len()).rev() {
                    let sum = chunk[k] as u16 + b[k] as u16 + carry;
                    chunk[k] = sum as u8;
                    carry = sum >> 8;
                }
            }
        }
    }

    result.truncate(output_len);
    result
}

/// Repeat `data` to the next multiple of `v` bytes; empty stays empty.
fn repeat_to_multiple(data: &[u8], v: usize) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = data.len().div_ceil(v) * v;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let take = (len - out.len()).min(data.len());
        out.extend_from_slice(&data[..take]);
    }
    out
}

/// Encode a password as BMP (UTF-16BE) with two trailing zero bytes.
pub fn password_to_bmp(password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let mut bmp = Vec::with_capacity(password.len() * 2 + 2);
    for c in password.encode_utf16() {
        bmp.push((c >> 8) as u8);
        bmp.push(c as u8);
    }
    bmp.push(0);
    bmp.push(0);
    bmp
}

/// Legacy PBE: pbeWithSHAAnd3-KeyTripleDES-CBC. The PKCS#12 KDF with SHA-1
/// derives a 24-byte key and an 8-byte IV, then 3DES-CBC decrypts.
pub fn decrypt_pbe_sha1_3des(
    ciphertext: &[u8],
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let key = pkcs12_kdf(MacDigest::Sha1, ID_KEY, bmp_password, salt, iterations, 24);
    let iv = pkcs12_kdf(MacDigest::Sha1, ID_IV, bmp_password, salt, iterations, 8);

    let decryptor = Des3CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| Error::Key(format!("3DES-CBC init failed: {e}")))?;
    let mut buf = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| Error::Key(format!("3DES-CBC decrypt/unpad failed: {e}")))?;
    Ok(plaintext.to_vec())
}

/// PBES2: PBKDF2 with the given PRF + AES-256-CBC.
pub fn decrypt_pbes2_aes256cbc(
    ciphertext: &[u8],
    password: &str,
    prf: Prf,
    salt: &[u8],
    iterations: u32,
    iv: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut key = [0u8; 32];
    match prf {
        Prf::HmacSha1 => {
            pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key)
        }
        Prf::HmacSha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key)
        }
    }

    let decryptor = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|e| Error::Key(format!("AES-256-CBC init failed: {e}")))?;
    let mut buf = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| Error::Key(format!("AES-256-CBC decrypt/unpad failed: {e}")))?;
    Ok(plaintext.to_vec())
}

/// HMAC for MAC verification of the authenticated safe.
pub fn compute_mac(digest: MacDigest, key: &[u8], data: &[u8]) -> Vec<u8> {
    match digest {
        MacDigest::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key size");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        MacDigest::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key size");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kdf_is_deterministic_and_purpose_separated() {
        let password = password_to_bmp("test");
        let salt = b"saltsalt";
        let key = pkcs12_kdf(MacDigest::Sha1, ID_KEY, &password, salt, 2048, 24);
        assert_eq!(key.len(), 24);
        assert_eq!(
            key,
            pkcs12_kdf(MacDigest::Sha1, ID_KEY, &password, salt, 2048, 24)
        );

        let iv = pkcs12_kdf(MacDigest::Sha1, ID_IV, &password, salt, 2048, 8);
        assert_eq!(iv.len(), 8);
        assert_ne!(&key[..8], &iv[..]);
    }

    #[test]
    fn kdf_sha256_output_len() {
        let password = password_to_bmp("test");
        let key = pkcs12_kdf(MacDigest::Sha256, ID_MAC, &password, b"saltsalt", 2048, 32);
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn bmp_encoding() {
        assert!(password_to_bmp("").is_empty());
        assert_eq!(password_to_bmp("A"), vec![0x00, 0x41, 0x00, 0x00]);
        assert_eq!(
            password_to_bmp("ab"),
            vec![0x00, 0x61, 0x00, 0x62, 0x00, 0x00]
        );
    }

    #[test]
    fn pbes2_prf_changes_key() {
        // Same inputs, different PRF: ciphertext that decrypts under one
        // PRF must fail padding under the other.
        let plaintext = b"0123456789abcdef";
        let mut key = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(b"pw", b"salt", 100, &mut key);
        let iv = [7u8; 16];
        use cipher::BlockEncryptMut;
        let enc = cbc::Encryptor::<aes::Aes256>::new_from_slices(&key, &iv).unwrap();
        let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let ok = decrypt_pbes2_aes256cbc(&ciphertext, "pw", Prf::HmacSha256, b"salt", 100, &iv)
            .unwrap();
        assert_eq!(ok, plaintext);
        assert!(
            decrypt_pbes2_aes256cbc(&ciphertext, "pw", Prf::HmacSha1, b"salt", 100, &iv).is_err()
        );
    }
}
