//! Modulith Core: the event store contract.
//!
//! This crate defines the value types, the `EventStore` trait and the error
//! taxonomy that every engine and every domain module depends on. It
//! contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;
pub mod projection;
pub mod store;
pub mod validate;
