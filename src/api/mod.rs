//! REST client for the demo admin backend.
//!
//! `ApiClient` covers the auth endpoints (login, refresh) and the
//! products/posts/carts/users resources, with bearer token auth and
//! status-code to error mapping.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_PAGE_SIZE};
pub use error::ApiError;
