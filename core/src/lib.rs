//! Authenticated fetch client core.
//!
//! # Overview
//! Wraps a single HTTP round-trip with bearer-token injection, request body
//! normalization (JSON or multipart form) and response post-processing
//! (status handlers, content-type decoding, interceptors). Also converts
//! between multi-valued form data and flat objects.
//!
//! # Design
//! - `ApiClient` owns its token store, handler table and interceptor list;
//!   nothing is process-global.
//! - The network call sits behind the `Transport` trait. `build_request` and
//!   `handle_response` are public so a host can drive the round-trip itself.
//! - A 401 is reported as `Outcome::Unauthorized`, not as an error and not as
//!   an empty success.
//! - Types use owned `String` / `Vec` / `Bytes` fields throughout.

pub mod body;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod form;
pub mod http;
pub mod router;
pub mod token;
pub mod transport;

pub use body::{RequestBody, RequestConfig};
pub use client::{ApiClient, Navigator, NoopNavigator, Outcome, ResponseMeta};
pub use config::{ClientConfig, UnauthorizedPolicy};
pub use decode::{ContentKind, Decoded};
pub use error::{ClientError, ConfigError, TransportError};
pub use form::{Blob, FormData, FormField, FormObject, FormValue};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use router::{ResponseInterceptor, ResponseRouter, StatusHandler};
pub use token::{FileStore, InMemoryStore, KeyValueStore, StorageError, TokenStore};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::Transport;
