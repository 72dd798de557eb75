//! HTTP and WebSocket front end for batched vision models.
//!
//! One process serves one [`config::ServiceMode`]. Requests for its model go
//! through a [`kamado::BatchCoordinator`], so concurrent callers share
//! accelerator runs.

pub mod app;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod routes;
pub mod service;
