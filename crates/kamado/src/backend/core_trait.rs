use std::fmt::Debug;

/// The operations a tensor type must support to be batched.
pub trait Backend: Debug + Clone + Send + Sync + 'static {
    /// Return the shape of this tensor
    fn shape(&self) -> Vec<usize>;

    /// Stack equally shaped tensors along a new leading batch dimension, in the order supplied
    fn stack(items: &[Self]) -> anyhow::Result<Self>;

    /// Split a batched tensor into its slices along the batch dimension, dropping that dimension
    fn unstack(&self) -> anyhow::Result<Vec<Self>>;
}

/// A model with a single synchronous forward pass over a batch.
///
/// The input has shape `(batch, ...)` and the output must keep the batch
/// dimension first, with slice `i` belonging to input `i`.
pub trait Forward<B>: Send + Sync + 'static
where
    B: Backend,
{
    fn forward(&self, batch: B) -> anyhow::Result<B>;
}
