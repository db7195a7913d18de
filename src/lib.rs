//! A blocking and non-blocking HTTP/1.0/1.1 client: TLS, HTTP proxy
//! traversal (including `CONNECT` tunneling), chunked/identity transfer
//! encodings, persistent connections, redirects, and Basic/Digest
//! authentication for both the origin server and the proxy.
//!
//! The entry point is [`client::Client`], which vends [`channel::Channel`]s —
//! each one drives a single request/response exchange through
//! [`channel::Channel::run`], a non-blocking state machine that makes at
//! most one unit of I/O progress per call.

pub mod auth;
pub mod channel;
pub mod chunked;
pub mod client;
pub mod cookie;
pub mod date;
pub mod document_spec;
pub mod entity_tag;
pub mod error;
pub mod identity;
pub mod method;
pub mod status_code;
pub mod transport;
pub mod url;

pub use auth::Authorization;
pub use channel::{BodyStream, BodyStreamOutcome, Channel, RunOutcome};
pub use client::{Client, ClientOptions, HttpVersion, ThrottleOptions};
pub use cookie::{Cookie, CookieJar};
pub use date::HttpDate;
pub use document_spec::{CacheControl, DocumentSpec, RequestMode};
pub use entity_tag::EntityTag;
pub use error::{Error, Result};
pub use method::Method;
pub use status_code::StatusCode;
pub use transport::{ExpectedServer, VerifyMode};
pub use url::Url;
