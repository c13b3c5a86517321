#![forbid(unsafe_code)]

//! HTTP transport abstraction for TSA exchanges.
//!
//! The signing pipeline is synchronous end-to-end, so the default
//! transport uses reqwest's blocking client. Timeouts live here; the
//! protocol layer only sees success or failure.

use sigtuna_core::{Error, Result};
use std::time::Duration;

/// A minimal HTTP reply: status, content type, body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// POST transport used to reach a TSA.
pub trait HttpTransport {
    fn post(&self, url: &str, content_type: &str, body: &[u8]) -> Result<HttpResponse>;
}

/// Blocking reqwest-backed transport.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sigtuna/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Timestamp(format!("HTTP client setup failed: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, url: &str, content_type: &str, body: &[u8]) -> Result<HttpResponse> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .send()
            .map_err(|e| Error::Timestamp(format!("POST {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .map_err(|e| Error::Timestamp(format!("reading TSA response failed: {e}")))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
