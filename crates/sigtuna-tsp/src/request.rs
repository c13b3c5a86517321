#![forbid(unsafe_code)]

//! `TimeStampReq` construction (RFC 3161 §2.4.1).

use rand::RngCore;
use sigtuna_crypto::HashAlgorithm;
use yasna::models::ObjectIdentifier;

/// A built request, kept around so the response can be validated against
/// the imprint and nonce that were sent.
pub struct TsRequest {
    /// DER-encoded `TimeStampReq`.
    pub der: Vec<u8>,
    /// The digest of the message being timestamped.
    pub imprint: Vec<u8>,
    /// The random 64-bit nonce.
    pub nonce: u64,
    pub hash: HashAlgorithm,
}

/// Build a `TimeStampReq`: version 1, a message imprint over `message`,
/// a random 64-bit nonce, `certReq = TRUE`, and no policy.
pub fn build_request(message: &[u8], hash: HashAlgorithm, rng: &mut dyn RngCore) -> TsRequest {
    let imprint = hash.digest(message);
    let nonce = rng.next_u64();

    let der = yasna::construct_der(|w| {
        w.write_sequence(|w| {
            // version
            w.next().write_u32(1);
            // messageImprint
            w.next().write_sequence(|w| {
                w.next().write_sequence(|w| {
                    w.next().write_oid(&ObjectIdentifier::from_slice(hash.oid()));
                    w.next().write_null();
                });
                w.next().write_bytes(&imprint);
            });
            // nonce
            w.next().write_u64(nonce);
            // certReq
            w.next().write_bool(true);
        })
    });

    TsRequest {
        der,
        imprint,
        nonce,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn request_has_der_sequence_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        let req = build_request(b"signature value bytes", HashAlgorithm::Sha256, &mut rng);

        // SEQUENCE wrapper
        assert_eq!(req.der[0], 0x30);
        // version INTEGER 1
        assert!(req.der.windows(3).any(|w| w == [0x02, 0x01, 0x01]));
        // certReq BOOLEAN TRUE
        assert!(req.der.windows(3).any(|w| w == [0x01, 0x01, 0xFF]));
        // the imprint bytes appear verbatim
        assert!(req
            .der
            .windows(req.imprint.len())
            .any(|w| w == req.imprint.as_slice()));
        assert_eq!(req.imprint.len(), 32);
    }

    #[test]
    fn imprint_is_hash_of_message() {
        let mut rng = StdRng::seed_from_u64(12);
        let req = build_request(b"abc", HashAlgorithm::Sha1, &mut rng);
        assert_eq!(req.imprint, HashAlgorithm::Sha1.digest(b"abc"));
    }

    #[test]
    fn different_hashes_produce_different_requests() {
        let mut rng = StdRng::seed_from_u64(13);
        let a = build_request(b"x", HashAlgorithm::Sha256, &mut rng);
        let mut rng = StdRng::seed_from_u64(13);
        let b = build_request(b"x", HashAlgorithm::Sha512, &mut rng);
        assert_ne!(a.der, b.der);
    }

    #[test]
    fn nonce_comes_from_the_injected_rng() {
        let mut rng = StdRng::seed_from_u64(14);
        let expected = {
            let mut probe = StdRng::seed_from_u64(14);
            probe.next_u64()
        };
        let req = build_request(b"x", HashAlgorithm::Sha256, &mut rng);
        assert_eq!(req.nonce, expected);
    }
}
