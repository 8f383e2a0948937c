//! Storage layer for the coordination service.
//!
//! Uses ReDB for embedded key-value storage with ACID transactions.

pub mod redb;

pub use self::redb::Storage;
