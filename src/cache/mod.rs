//! Response cache
//!
//! Whole responses keyed by request URL, stored on disk and never expired.

pub mod store;

pub use store::{CacheIoError, CacheKey, CacheStore};
