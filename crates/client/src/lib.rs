//! HTTP backend for the governance REST API.

mod http;

pub use http::{ClientError, HttpBackend, CORRELATION_HEADER};
