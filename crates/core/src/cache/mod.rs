//! SQLite-backed, generation-aware response cache.
//!
//! This module provides a persistent key-value store of response snapshots
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named generations, each holding its own set of entries
//! - Request identity keys using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntryMeta;
pub use store::CacheStore;
