//! Connection dispatch.

pub mod listener;
