#![forbid(unsafe_code)]

//! RFC 3161 Time-Stamp Protocol client.
//!
//! Builds a `TimeStampReq` over a message digest, sends it through an
//! injectable HTTP transport, and validates the returned `TimeStampResp`
//! (status, message imprint, hash algorithm, nonce) before handing the DER
//! `TimeStampToken` back to the caller.

pub mod http;
pub mod request;
pub mod response;

pub use http::{HttpResponse, HttpTransport, ReqwestTransport};
pub use request::TsRequest;
pub use response::TstInfo;

use rand::RngCore;
use sigtuna_core::{Error, Result};
use sigtuna_crypto::HashAlgorithm;

/// MIME type of a timestamp query.
pub const CONTENT_TYPE_QUERY: &str = "application/timestamp-query";

/// MIME type of a timestamp reply.
pub const CONTENT_TYPE_REPLY: &str = "application/timestamp-reply";

/// Request a timestamp token over `message` from the TSA at `url`.
///
/// Returns the DER-encoded `TimeStampToken` (a CMS `SignedData`) after
/// validating the response against the request.
pub fn request_token(
    transport: &dyn HttpTransport,
    url: &str,
    message: &[u8],
    hash: HashAlgorithm,
    rng: &mut dyn RngCore,
) -> Result<Vec<u8>> {
    let request = request::build_request(message, hash, rng);
    log::debug!(
        "requesting {} timestamp from {url} ({} byte query)",
        hash.name(),
        request.der.len()
    );

    let reply = transport.post(url, CONTENT_TYPE_QUERY, &request.der)?;
    if reply.status != 200 {
        return Err(Error::Timestamp(format!(
            "TSA returned HTTP status {}",
            reply.status
        )));
    }
    let media_type = reply
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());
    if media_type.as_deref() != Some(CONTENT_TYPE_REPLY) {
        return Err(Error::Timestamp(format!(
            "TSA returned unexpected content type {:?}",
            reply.content_type
        )));
    }

    response::validate_response(&reply.body, &request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;

    struct MockTransport {
        reply: RefCell<Option<HttpResponse>>,
        seen: RefCell<Option<(String, String, Vec<u8>)>>,
    }

    impl MockTransport {
        fn replying(reply: HttpResponse) -> Self {
            Self {
                reply: RefCell::new(Some(reply)),
                seen: RefCell::new(None),
            }
        }
    }

    impl HttpTransport for MockTransport {
        fn post(&self, url: &str, content_type: &str, body: &[u8]) -> sigtuna_core::Result<HttpResponse> {
            *self.seen.borrow_mut() = Some((url.into(), content_type.into(), body.to_vec()));
            Ok(self.reply.borrow_mut().take().expect("one post expected"))
        }
    }

    fn reply_with(status: u16, content_type: &str, body: Vec<u8>) -> HttpResponse {
        HttpResponse {
            status,
            content_type: Some(content_type.to_owned()),
            body,
        }
    }

    #[test]
    fn posts_query_with_timestamp_content_type() {
        let mut rng = StdRng::seed_from_u64(1);
        let request = request::build_request(b"sig", HashAlgorithm::Sha256, &mut rng);
        let body = response::tests::granted_response(&request);

        let transport = MockTransport::replying(reply_with(200, CONTENT_TYPE_REPLY, body));
        let mut rng = StdRng::seed_from_u64(1);
        let token =
            request_token(&transport, "http://tsa.test", b"sig", HashAlgorithm::Sha256, &mut rng)
                .unwrap();
        assert!(!token.is_empty());

        let (url, ct, sent) = transport.seen.borrow().clone().unwrap();
        assert_eq!(url, "http://tsa.test");
        assert_eq!(ct, CONTENT_TYPE_QUERY);
        assert_eq!(sent, request.der);
    }

    #[test]
    fn non_200_status_is_rejected() {
        let transport =
            MockTransport::replying(reply_with(503, CONTENT_TYPE_REPLY, Vec::new()));
        let mut rng = StdRng::seed_from_u64(2);
        let err =
            request_token(&transport, "http://tsa.test", b"m", HashAlgorithm::Sha256, &mut rng)
                .unwrap_err();
        assert!(err.to_string().contains("HTTP status 503"));
    }

    #[test]
    fn wrong_reply_content_type_is_rejected() {
        let transport = MockTransport::replying(reply_with(200, "text/html", Vec::new()));
        let mut rng = StdRng::seed_from_u64(3);
        let err =
            request_token(&transport, "http://tsa.test", b"m", HashAlgorithm::Sha256, &mut rng)
                .unwrap_err();
        assert!(err.to_string().contains("content type"));
    }

    #[test]
    fn reply_content_type_parameters_are_tolerated() {
        let mut rng = StdRng::seed_from_u64(4);
        let request = request::build_request(b"m", HashAlgorithm::Sha1, &mut rng);
        let body = response::tests::granted_response(&request);
        let transport = MockTransport::replying(reply_with(
            200,
            "Application/Timestamp-Reply; charset=binary",
            body,
        ));
        let mut rng = StdRng::seed_from_u64(4);
        assert!(
            request_token(&transport, "http://tsa.test", b"m", HashAlgorithm::Sha1, &mut rng)
                .is_ok()
        );
    }
}
