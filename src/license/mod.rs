//! License text resolution.
//!
//! - [`normalize`] — canonical form of license text (CRLF endings, no shared
//!   indentation, no stray control characters).
//! - [`cache`] — run-scoped memo of resolved texts keyed by package id, URL or path.
//! - [`service`] — the ordered fallback pipeline that finds a dependency's license.

pub mod cache;
pub mod normalize;
pub mod service;

pub use cache::LicenseCache;
pub use service::{LicenseService, ResolveError};
