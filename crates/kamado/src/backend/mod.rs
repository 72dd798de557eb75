//! # Tensor Backend
//!
//! Adapts tensor models to the batching core: the tensors of a sealed epoch
//! are stacked along [`BATCH_DIM`] into one model input, and the model output
//! is split back along the same dimension, one slice per contributor.
//!
//! ## Feature Flags
//!
//! - `candle`: implements [`Backend`] for `candle_core::Tensor`
//!
//! ## Usage
//!
//! 1. Implement [`Forward`] for the model (a synchronous forward pass over a
//!    batched tensor).
//! 2. Wrap it in a [`TensorBatcher`] and hand that to a
//!    [`BatchCoordinator`](crate::BatchCoordinator) as its handler.

mod batcher;
mod core_trait;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle tensor backend implementation.
///
/// This module is only available when the `candle` feature flag is enabled.
pub mod candle;

pub use batcher::TensorBatcher;
pub use core_trait::*;

/// The dimension every batched tensor reserves for the batch.
pub const BATCH_DIM: usize = 0;

#[cfg(test)]
/// Mock tensor implementation.
///
/// Operates on flat integer vectors
pub(crate) mod mock_tensor;
