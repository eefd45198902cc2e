//! # remount-http
//!
//! HTTP transport for remote mounts.
//!
//! Requests are described as plain data ([`HttpRequest`]) and handed to an
//! [`HttpExecutor`]. [`Transport`] adds what every request against one remote
//! shares: URL construction, Basic authentication and static extra headers.
//!
//! ```ignore
//! use std::sync::Arc;
//! use remount_http::{Credentials, ReqwestExecutor, Transport};
//!
//! let executor = Arc::new(ReqwestExecutor::with_default_timeout()?);
//! let transport = Transport::new(executor, "http://localhost:4502")?
//!     .with_credentials(Credentials::new("admin", "admin"), true)
//!     .with_extra_headers(&["X-Forwarded-Proto=https"]);
//!
//! let response = transport.get_json("/content")?;
//! ```
//!
//! ## Testing
//!
//! With the `test-utils` feature, [`executor::mock::MockExecutor`] replays
//! canned responses keyed by `METHOD url` and records every request.

pub mod error;
pub mod executor;
pub mod transport;
pub mod types;

pub use error::Error;
pub use executor::{HttpExecutor, ReqwestExecutor};
pub use transport::{encode_path, parse_header, Credentials, Transport, JSON_SUFFIX};
pub use types::{FilePart, HttpRequest, HttpResponse, Method, RequestBody};
