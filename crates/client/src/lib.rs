//! Client side of precache.
//!
//! This crate provides the network fetcher and the interception worker
//! (routing, caching strategies, generation lifecycle and the sync hook)
//! driven by the host.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Network};

pub use worker::{
    ActivationReport, FetchDisposition, InstallReport, RequestClassifier, Route, ServiceWorker, SyncOutcome,
    SyncProcedure, WorkerBuilder, WorkerConfig, WorkerState,
};
