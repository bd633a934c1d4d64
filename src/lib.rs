//! Larder - Caching Forward Proxy
//!
//! Core library for the request pipeline: target resolution, the on-disk
//! response cache, origin forwarding and per-connection handling.

pub mod cache;
pub mod config;
pub mod deadline;
pub mod error;
pub mod http;
pub mod proxy;
pub mod server;
pub mod telemetry;
