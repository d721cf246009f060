//! Modulith audit export.
//!
//! Streams the whole event log, in global order, as one JSON record per line.

pub mod config;
pub mod error;
pub mod export;
