//! HTTP execution abstraction.
//!
//! The transport never talks to a client library directly; it hands fully
//! built requests to an [`HttpExecutor`]. Production code uses
//! [`ReqwestExecutor`], tests use the recording mock.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

use crate::error::Error;
use crate::types::{HttpRequest, HttpResponse, RequestBody};

/// Trait for executing HTTP requests.
///
/// Implementations own connection pooling, timeouts and retries; a returned
/// `Err` means the request could not be completed at all. Any HTTP status,
/// including errors, is an `Ok` response.
pub trait HttpExecutor: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error>;
}

/// Production HTTP executor using reqwest.
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// Create a new executor with the given timeout.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create with default timeout of 30 seconds.
    pub fn with_default_timeout() -> Result<Self, Error> {
        Self::new(Duration::from_secs(30))
    }

    /// Wrap an already configured client (proxies, TLS, pooling).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn multipart_form(
        fields: &[(String, String)],
        files: &[crate::types::FilePart],
    ) -> Result<multipart::Form, Error> {
        let mut form = multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in files {
            let part = multipart::Part::bytes(file.data.to_vec())
                .file_name(file.filename.clone())
                .mime_str(&file.full_content_type())?;
            form = form.part(file.name.clone(), part);
        }
        Ok(form)
    }
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let method: http::Method = request.method.into();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::try_from(name.as_str())?;
            let header_value = HeaderValue::try_from(value.as_str())?;
            headers.append(header_name, header_value);
        }

        let mut req_builder = self.client.request(method, &request.url).headers(headers);

        req_builder = match &request.body {
            RequestBody::Empty => req_builder,
            RequestBody::Xml(xml) => req_builder
                .header(CONTENT_TYPE, "application/xml; charset=utf-8")
                .body(xml.clone()),
            RequestBody::Form(fields) => req_builder.form(fields),
            RequestBody::Multipart { fields, files } => {
                req_builder.multipart(Self::multipart_form(fields, files)?)
            }
        };

        let response = req_builder.send()?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut resp_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }

        let body = response.bytes()?;

        Ok(HttpResponse {
            status,
            status_text,
            headers: resp_headers,
            body,
        })
    }
}

/// Mock HTTP executor for testing.
///
/// Returns predefined responses based on request matching.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::types::Method;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn key(method: Method, url: &str) -> String {
        format!("{} {}", method, url)
    }

    /// A mock HTTP executor that returns predefined responses.
    ///
    /// Responses are keyed by `METHOD url`. A key may hold a queue of
    /// responses; the last one is repeated once the queue is drained.
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        responses: Arc<Mutex<HashMap<String, VecDeque<HttpResponse>>>>,
        failures: Arc<Mutex<HashMap<String, String>>>,
        default_response: Arc<Mutex<Option<HttpResponse>>>,
        recorded_requests: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a response for a method and URL.
        pub fn with_response(self, method: Method, url: &str, response: HttpResponse) -> Self {
            self.respond(method, url, response);
            self
        }

        /// Add a response through a shared handle.
        pub fn respond(&self, method: Method, url: &str, response: HttpResponse) {
            self.responses
                .lock()
                .unwrap()
                .entry(key(method, url))
                .or_default()
                .push_back(response);
        }

        /// Fail requests for a method and URL with a transport error.
        pub fn fail(&self, method: Method, url: &str, message: impl Into<String>) {
            self.failures
                .lock()
                .unwrap()
                .insert(key(method, url), message.into());
        }

        /// Set a default response when nothing matches.
        pub fn with_default_response(self, response: HttpResponse) -> Self {
            *self.default_response.lock().unwrap() = Some(response);
            self
        }

        /// Get all recorded requests.
        pub fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.recorded_requests.lock().unwrap().clone()
        }

        /// Recorded requests with the given method.
        pub fn requests_with(&self, method: Method) -> Vec<HttpRequest> {
            self.recorded_requests()
                .into_iter()
                .filter(|r| r.method == method)
                .collect()
        }

        pub fn request_count(&self) -> usize {
            self.recorded_requests.lock().unwrap().len()
        }

        /// Clear recorded requests.
        pub fn clear_recorded(&self) {
            self.recorded_requests.lock().unwrap().clear();
        }

        pub fn ok(body: impl Into<bytes::Bytes>) -> HttpResponse {
            HttpResponse::new(200, body)
        }

        pub fn json(body: &str) -> HttpResponse {
            HttpResponse::new(200, body.to_string())
                .with_header("content-type", "application/json")
        }

        pub fn multi_status(xml: &str) -> HttpResponse {
            HttpResponse::new(207, xml.to_string())
                .with_header("content-type", "application/xml")
        }

        pub fn status(status: u16) -> HttpResponse {
            HttpResponse::new(status, "")
        }

        pub fn not_found() -> HttpResponse {
            Self::status(404)
        }
    }

    impl HttpExecutor for MockExecutor {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
            self.recorded_requests.lock().unwrap().push(request.clone());

            let k = key(request.method, &request.url);
            if let Some(message) = self.failures.lock().unwrap().get(&k) {
                return Err(Error::transport(message.clone()));
            }

            let mut responses = self.responses.lock().unwrap();
            if let Some(queue) = responses.get_mut(&k) {
                if queue.len() > 1 {
                    if let Some(response) = queue.pop_front() {
                        return Ok(response);
                    }
                }
                if let Some(response) = queue.front() {
                    return Ok(response.clone());
                }
            }

            if let Some(ref response) = *self.default_response.lock().unwrap() {
                return Ok(response.clone());
            }

            Ok(Self::not_found())
        }
    }
}
