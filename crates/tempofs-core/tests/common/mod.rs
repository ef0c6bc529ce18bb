//! Shared HTTP fixtures for stream integration tests.
//!
//! [`RangeFixture`] is a `wiremock` responder that serves a fixed body and
//! honours `Range: bytes=a-b` headers the way a static file server would.

// Not all tests use every helper
#![allow(dead_code)]

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Deterministic content where byte `i` is `i % 251`.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Static resource served with range support (or not).
#[derive(Clone)]
pub struct RangeFixture {
    pub body: Vec<u8>,
    pub accept_ranges: Option<String>,
    pub last_modified: Option<String>,
    /// Answer ranged GETs with `200` and the full body.
    pub ignore_ranges: bool,
}

impl RangeFixture {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            accept_ranges: Some("bytes".to_string()),
            last_modified: None,
            ignore_ranges: false,
        }
    }

    pub fn accept_ranges(mut self, value: Option<&str>) -> Self {
        self.accept_ranges = value.map(str::to_string);
        self
    }

    pub fn last_modified(mut self, value: &str) -> Self {
        self.last_modified = Some(value.to_string());
        self
    }

    pub fn ignore_ranges(mut self) -> Self {
        self.ignore_ranges = true;
        self
    }

    fn decorate(&self, mut template: ResponseTemplate) -> ResponseTemplate {
        if let Some(value) = &self.accept_ranges {
            template = template.insert_header("accept-ranges", value.as_str());
        }
        if let Some(value) = &self.last_modified {
            template = template.insert_header("last-modified", value.as_str());
        }
        template
    }
}

/// Parses `bytes=a-b` into an inclusive range.
pub fn parse_range(value: &str) -> Option<(usize, usize)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

impl Respond for RangeFixture {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let len = self.body.len();

        if request.method.as_str() == "HEAD" {
            let template = ResponseTemplate::new(200)
                .insert_header("content-length", len.to_string().as_str())
                .set_body_bytes(self.body.clone());
            return self.decorate(template);
        }

        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range);

        let template = match range {
            Some(_) if self.ignore_ranges => {
                ResponseTemplate::new(200).set_body_bytes(self.body.clone())
            }
            Some((start, _)) if start >= len => ResponseTemplate::new(416)
                .insert_header("content-range", format!("bytes */{len}").as_str()),
            Some((start, end)) => {
                let end = end.min(len - 1);
                ResponseTemplate::new(206)
                    .insert_header(
                        "content-range",
                        format!("bytes {start}-{end}/{len}").as_str(),
                    )
                    .set_body_bytes(self.body[start..=end].to_vec())
            }
            None => ResponseTemplate::new(200).set_body_bytes(self.body.clone()),
        };
        self.decorate(template)
    }
}

/// Mounts `fixture` at `route` for both HEAD and GET.
pub async fn serve(server: &MockServer, route: &str, fixture: RangeFixture) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(fixture.clone())
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(fixture)
        .mount(server)
        .await;
}
