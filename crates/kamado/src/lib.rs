//! # Kamado
//!
//! Micro-batching for inference services that own a single accelerator.
//!
//! ## Overview
//!
//! An accelerator runs one computation at a time, but a batch of requests
//! costs little more than a single one. Kamado sits between request handlers
//! and the model and does two things:
//!
//! - It serializes every accelerator-bound call, so no two inference calls
//!   ever run at the same time.
//! - It groups requests that arrive close together into one batch, flushed
//!   when it is full or when its wait budget runs out, and hands each caller
//!   back its own slice of the result.
//!
//! ## Architecture
//!
//! ### Serialized Executor
//!
//! [`SerializedExecutor`] accepts blocking units of [`Work`] and runs them one
//! at a time, in submission order, on tokio's blocking pool. Failures and
//! panics are returned to the submitter and never stop the executor. No
//! worker exists while the queue is empty.
//!
//! ### Batch Coordinator
//!
//! [`BatchCoordinator`] accumulates items into epochs. An epoch is sealed when
//! it reaches `max_batch_size`, or when `max_wait` has passed since its first
//! item, whichever happens first. The sealed items run through a
//! [`BatchHandler`] as one executor job, and each contributor receives the
//! outcome at the index it joined with. If the batch fails, every contributor
//! receives the same error.
//!
//! ### Service Initialization
//!
//! [`ServiceCell`] guards the one-time, idempotent construction of the model
//! behind a coordinator, and reports [`Error::NotReady`] until it completes.
//!
//! ## Features
//!
//! - **candle** - batches `candle_core::Tensor` inputs through
//!   [`backend::TensorBatcher`]
//!
//! ## Runtime
//!
//! Everything here expects to run inside a tokio runtime. Coordination is
//! cheap synchronous bookkeeping; the handler itself always runs on the
//! blocking pool so it never stalls the scheduler.

mod batch;
mod config;
mod error;
mod executor;
mod service;

pub mod backend;
pub mod slot;

pub use batch::{BatchCoordinator, BatchHandler};
pub use config::BatchConfig;
pub use error::{Error, Result};
pub use executor::{FnWork, JobHandle, SerializedExecutor, Work};
pub use service::ServiceCell;
