//! Cache inspection tools.
//!
//! These read the store directly and never go through the worker's
//! strategies, so they cause no network traffic.

pub mod get;
pub mod list;

pub use get::{CacheGetParams, get_impl};
pub use list::generations_impl;
