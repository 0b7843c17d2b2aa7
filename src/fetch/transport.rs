use std::io::Write;

use url::Url;

use crate::error::HepRefError;

/// Upper bound on a buffered response body such as record metadata.
const MAX_BUFFERED_BYTES: u64 = 64 * 1024 * 1024;

/// Status and declared content type of a response.
#[derive(Clone, Debug)]
pub struct ResponseHead {
    pub status: u16,
    pub content_type: Option<String>,
}

impl ResponseHead {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The media type of the response, without parameters such as `charset`.
    pub fn media_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .map(str::trim)
    }

    /// Whether the response declares the given media type.
    pub fn has_media_type(&self, expected: &str) -> bool {
        self.media_type()
            .map(|media| media.eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    }

    /// Whether this response is a successful reply of the given media type.
    pub fn is_success_with(&self, expected: &str) -> bool {
        self.is_success() && self.has_media_type(expected)
    }
}

/// A fully buffered HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub head: ResponseHead,
    pub body: Vec<u8>,
}

/// Blocking HTTP GET.
///
/// Non-success statuses are returned as responses, not errors: the fetcher
/// inspects them to decide on diagnostics. Errors are reserved for requests
/// that produced no response at all.
pub trait Transport {
    /// GET with the body buffered in memory.
    fn get(&self, url: &Url) -> Result<HttpResponse, HepRefError>;

    /// GET copying the body of a 2xx response into `sink`.
    ///
    /// Bodies of other responses are discarded.
    fn get_to_writer(&self, url: &Url, sink: &mut dyn Write) -> Result<ResponseHead, HepRefError> {
        let response = self.get(url)?;
        if response.head.is_success() {
            sink.write_all(&response.body)
                .map_err(|source| body_error(url, source))?;
        }
        Ok(response.head)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &Url) -> Result<HttpResponse, HepRefError> {
        (**self).get(url)
    }

    fn get_to_writer(&self, url: &Url, sink: &mut dyn Write) -> Result<ResponseHead, HepRefError> {
        (**self).get_to_writer(url, sink)
    }
}

/// Production transport backed by a `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        let agent: ureq::Agent = config.into();
        Self { agent }
    }

    fn call(&self, url: &Url) -> Result<ureq::http::Response<ureq::Body>, HepRefError> {
        self.agent
            .get(url.as_str())
            .call()
            .map_err(|source| HepRefError::Transport {
                url: url.to_string(),
                message: source.to_string(),
            })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn head_of(response: &ureq::http::Response<ureq::Body>) -> ResponseHead {
    ResponseHead {
        status: response.status().as_u16(),
        content_type: response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

fn body_error(url: &Url, source: impl std::fmt::Display) -> HepRefError {
    HepRefError::Transport {
        url: url.to_string(),
        message: format!("failed reading response body: {source}"),
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &Url) -> Result<HttpResponse, HepRefError> {
        let mut response = self.call(url)?;
        let head = head_of(&response);
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BUFFERED_BYTES)
            .read_to_vec()
            .map_err(|source| body_error(url, source))?;

        Ok(HttpResponse { head, body })
    }

    fn get_to_writer(&self, url: &Url, sink: &mut dyn Write) -> Result<ResponseHead, HepRefError> {
        let mut response = self.call(url)?;
        let head = head_of(&response);
        if head.is_success() {
            std::io::copy(&mut response.body_mut().as_reader(), sink)
                .map_err(|source| body_error(url, source))?;
        }
        Ok(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(status: u16, content_type: Option<&str>) -> ResponseHead {
        ResponseHead {
            status,
            content_type: content_type.map(str::to_string),
        }
    }

    struct Canned(HttpResponse);

    impl Transport for Canned {
        fn get(&self, _url: &Url) -> Result<HttpResponse, HepRefError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn media_type_ignores_parameters() {
        let resp = head(200, Some("application/json; charset=utf-8"));
        assert_eq!(resp.media_type(), Some("application/json"));
        assert!(resp.is_success_with("application/json"));
    }

    #[test]
    fn html_is_not_json() {
        let resp = head(200, Some("text/html"));
        assert!(!resp.has_media_type("application/json"));
    }

    #[test]
    fn non_2xx_is_not_success() {
        assert!(!head(404, Some("application/json")).is_success());
        assert!(!head(301, None).is_success());
        assert!(head(204, None).is_success());
    }

    #[test]
    fn writer_receives_only_successful_bodies() {
        let url = Url::parse("http://hepdata.test/x").expect("url");

        let ok = Canned(HttpResponse {
            head: head(200, Some("application/zip")),
            body: b"PK".to_vec(),
        });
        let mut sink = Vec::new();
        let received = ok.get_to_writer(&url, &mut sink).expect("get");
        assert_eq!(received.status, 200);
        assert_eq!(sink, b"PK");

        let missing = Canned(HttpResponse {
            head: head(404, Some("text/html")),
            body: b"<html>".to_vec(),
        });
        let mut sink = Vec::new();
        let received = missing.get_to_writer(&url, &mut sink).expect("get");
        assert_eq!(received.status, 404);
        assert!(sink.is_empty());
    }
}
