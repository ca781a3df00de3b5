//! Core types and shared functionality for precache.
//!
//! This crate provides:
//! - Request/response model shared by the worker and the host
//! - Generation-aware cache store with SQLite backend
//! - Unified error types
//! - Configuration structures
//! - Structured diagnostic events

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod resource;

pub use cache::{CacheDb, CacheStore, EntryMeta};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use events::{BroadcastReporter, Diagnostic, Reporter, TracingReporter};
pub use resource::{RequestMode, ResourceRequest, ResourceResponse, ResponseKind, ResponseSource, Served};
