//! Request construction for the remote repository.
//!
//! [`Transport`] owns everything that is the same for every request against
//! one remote: the base URL, credentials, the static extra headers and the
//! executor that actually talks to the network.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{debug, warn};

use crate::error::Error;
use crate::executor::HttpExecutor;
use crate::types::{HttpRequest, HttpResponse, RequestBody};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Selector suffix of the depth-1 JSON rendering.
pub const JSON_SUFFIX: &str = ".1.json";

const PROPFIND_ALLPROP: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8" ?>"#,
    r#"<D:propfind xmlns:D="DAV:"><D:allprop/></D:propfind>"#
);

/// Username and password for Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value of the `Authorization` header.
    pub fn basic_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Parse a `Name=Value` header entry.
pub fn parse_header(entry: &str) -> Result<(String, String), Error> {
    match entry.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            let name = name.trim();
            http::header::HeaderName::try_from(name)?;
            http::header::HeaderValue::try_from(value)?;
            Ok((name.to_string(), value.to_string()))
        }
        _ => Err(Error::MalformedHeader {
            entry: entry.to_string(),
        }),
    }
}

/// Percent-encode every segment of an absolute path, keeping the slashes.
pub fn encode_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Client for one remote repository.
#[derive(Clone)]
pub struct Transport {
    executor: Arc<dyn HttpExecutor>,
    base_url: String,
    credentials: Option<Credentials>,
    preemptive: bool,
    extra_headers: Vec<(String, String)>,
}

impl Transport {
    /// Create a transport for `base_url`. A trailing slash is dropped.
    pub fn new(executor: Arc<dyn HttpExecutor>, base_url: &str) -> Result<Self, Error> {
        let parsed = url::Url::parse(base_url)?;
        if parsed.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                message: format!("'{}' cannot be used as a base URL", base_url),
            });
        }

        Ok(Self {
            executor,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
            preemptive: false,
            extra_headers: Vec::new(),
        })
    }

    /// Attach credentials. With `preemptive` the `Authorization` header goes
    /// out on every request, otherwise only in answer to a 401.
    pub fn with_credentials(mut self, credentials: Credentials, preemptive: bool) -> Self {
        self.credentials = Some(credentials);
        self.preemptive = preemptive;
        self
    }

    /// Add static headers from `Name=Value` entries. Malformed entries are
    /// logged and skipped.
    pub fn with_extra_headers<S: AsRef<str>>(mut self, entries: &[S]) -> Self {
        for entry in entries {
            match parse_header(entry.as_ref()) {
                Ok(header) => self.extra_headers.push(header),
                Err(e) => warn!(entry = entry.as_ref(), error = %e, "Skipping extra header"),
            }
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn extra_headers(&self) -> &[(String, String)] {
        &self.extra_headers
    }

    /// URL of a remote resource.
    pub fn url_for(&self, remote_path: &str) -> String {
        format!("{}{}", self.base_url, encode_path(remote_path))
    }

    /// URL of the depth-1 JSON rendering of a remote resource.
    ///
    /// Literal dots are escaped so they are not read as selectors.
    pub fn json_url(&self, remote_path: &str) -> String {
        let escaped = encode_path(remote_path).replace('.', "%2E");
        if escaped == "/" {
            format!("{}/{}", self.base_url, JSON_SUFFIX)
        } else {
            format!("{}{}/{}", self.base_url, escaped, JSON_SUFFIX)
        }
    }

    /// URL of a binary property below a resource.
    pub fn property_url(&self, remote_path: &str, property: &str) -> String {
        let node = self.url_for(remote_path);
        let name = utf8_percent_encode(property, SEGMENT);
        format!("{}/{}", node.trim_end_matches('/'), name)
    }

    /// Execute a request with the configured headers and authentication.
    ///
    /// Without preemptive authentication a `401` is answered once with the
    /// credentials, if any are configured.
    pub fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        for (name, value) in &self.extra_headers {
            request.set_header(name.clone(), value.clone());
        }

        if let (Some(credentials), true) = (&self.credentials, self.preemptive) {
            request.set_header("Authorization", credentials.basic_header());
        }

        debug!(method = %request.method, url = %request.url, "Sending request");
        let response = self.executor.execute(&request)?;

        match (&self.credentials, self.preemptive, response.status) {
            (Some(credentials), false, 401) => {
                debug!(url = %request.url, "Authentication challenge, retrying with credentials");
                request.set_header("Authorization", credentials.basic_header());
                self.executor.execute(&request)
            }
            _ => Ok(response),
        }
    }

    /// GET an absolute URL.
    pub fn get_url(&self, url: &str) -> Result<HttpResponse, Error> {
        self.execute(HttpRequest::get(url))
    }

    /// GET the depth-1 JSON rendering of a resource.
    pub fn get_json(&self, remote_path: &str) -> Result<HttpResponse, Error> {
        self.execute(HttpRequest::get(self.json_url(remote_path)))
    }

    /// PROPFIND with `Depth: 1` requesting all properties.
    pub fn propfind(&self, remote_path: &str) -> Result<HttpResponse, Error> {
        let request = HttpRequest::propfind(self.url_for(remote_path))
            .with_header("Depth", "1")
            .with_body(RequestBody::Xml(PROPFIND_ALLPROP.to_string()));
        self.execute(request)
    }

    /// POST a write request to a resource.
    pub fn post(&self, remote_path: &str, body: RequestBody) -> Result<HttpResponse, Error> {
        self.execute(HttpRequest::post(self.url_for(remote_path)).with_body(body))
    }

    /// HEAD probe: true on any 2xx.
    pub fn exists(&self, remote_path: &str) -> Result<bool, Error> {
        let response = self.execute(HttpRequest::head(self.url_for(remote_path)))?;
        Ok(response.is_success())
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("preemptive", &self.preemptive)
            .field("extra_headers", &self.extra_headers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockExecutor;
    use crate::types::Method;

    fn transport(mock: &MockExecutor) -> Transport {
        Transport::new(Arc::new(mock.clone()), "http://remote:4502/").unwrap()
    }

    #[test]
    fn encode_path_escapes_segments() {
        assert_eq!(encode_path("/"), "/");
        assert_eq!(encode_path("/content/a b"), "/content/a%20b");
        assert_eq!(encode_path("/a/jcr:content"), "/a/jcr:content");
        assert_eq!(encode_path("/a/50%"), "/a/50%25");
    }

    #[test]
    fn urls() {
        let mock = MockExecutor::new();
        let t = transport(&mock);
        assert_eq!(t.base_url(), "http://remote:4502");
        assert_eq!(t.url_for("/content/a"), "http://remote:4502/content/a");
        assert_eq!(t.json_url("/"), "http://remote:4502/.1.json");
        assert_eq!(
            t.json_url("/content/site.v2"),
            "http://remote:4502/content/site%2Ev2/.1.json"
        );
        assert_eq!(
            t.property_url("/a/file", "jcr:data"),
            "http://remote:4502/a/file/jcr:data"
        );
    }

    #[test]
    fn invalid_base_url() {
        let mock = MockExecutor::new();
        assert!(Transport::new(Arc::new(mock.clone()), "not a url").is_err());
        assert!(Transport::new(Arc::new(mock), "mailto:someone@example.com").is_err());
    }

    #[test]
    fn parse_header_entries() {
        assert_eq!(
            parse_header("X-Token=abc=def").unwrap(),
            ("X-Token".to_string(), "abc=def".to_string())
        );
        assert!(matches!(
            parse_header("NoValue"),
            Err(Error::MalformedHeader { .. })
        ));
        assert!(parse_header("=value").is_err());
        assert!(parse_header("Bad Name=x").is_err());
    }

    #[test]
    fn extra_headers_are_applied_and_malformed_skipped() {
        let mock = MockExecutor::new().with_default_response(MockExecutor::ok(""));
        let t = transport(&mock).with_extra_headers(&["X-Env=stage", "broken"]);
        assert_eq!(t.extra_headers().len(), 1);

        t.get_url("http://remote:4502/x").unwrap();
        let recorded = mock.recorded_requests();
        assert_eq!(recorded[0].header("X-Env"), Some("stage"));
    }

    #[test]
    fn preemptive_auth_sends_header() {
        let mock = MockExecutor::new().with_default_response(MockExecutor::ok(""));
        let t = transport(&mock).with_credentials(Credentials::new("admin", "admin"), true);

        t.get_json("/content").unwrap();
        let recorded = mock.recorded_requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].header("Authorization"), Some("Basic YWRtaW46YWRtaW4="));
    }

    #[test]
    fn challenge_is_answered_once() {
        let mock = MockExecutor::new();
        let url = "http://remote:4502/content";
        mock.respond(Method::HEAD, url, MockExecutor::status(401));
        mock.respond(Method::HEAD, url, MockExecutor::ok(""));
        let t = transport(&mock).with_credentials(Credentials::new("u", "p"), false);

        assert!(t.exists("/content").unwrap());
        let recorded = mock.recorded_requests();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].header("Authorization"), None);
        assert!(recorded[1].header("Authorization").is_some());
    }

    #[test]
    fn no_retry_without_credentials() {
        let mock = MockExecutor::new().with_default_response(MockExecutor::status(401));
        let t = transport(&mock);
        let response = t.get_json("/a").unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn propfind_request_shape() {
        let mock = MockExecutor::new();
        let t = transport(&mock);
        t.propfind("/content").unwrap();

        let recorded = mock.requests_with(Method::PROPFIND);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].header("Depth"), Some("1"));
        match &recorded[0].body {
            RequestBody::Xml(xml) => assert!(xml.contains("allprop")),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("admin", "secret"));
        assert!(!debug.contains("secret"));
    }
}
