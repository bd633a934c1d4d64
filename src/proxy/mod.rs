//! Forward proxy functionality
//!
//! This module holds the pieces a request handler draws on: target
//! resolution, the origin client, and the context shared by every
//! connection.

pub mod context;
pub mod origin;
pub mod target;

pub use context::{ProxyContext, RequestCounter};
pub use origin::{OriginClient, OriginResponse};
pub use target::Target;
