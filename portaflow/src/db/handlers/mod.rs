//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection, provides strongly-typed
//! operations, and returns domain models from [`crate::db::models`].

pub mod portabilities;

pub use portabilities::{Portabilities, PostgresRecordStore, RecordStore};
