use std::marker::PhantomData;
use tracing::trace;

use super::core_trait::{Backend, Forward};
use crate::batch::BatchHandler;

/// A [`BatchHandler`] that runs a tensor model over a whole epoch at once.
///
/// # Type Parameters
///
/// * `M` - The model type that implements [`Forward`]
/// * `B` - The tensor type, used for both inputs and outputs
pub struct TensorBatcher<M, B> {
    /// The model that will perform the forward pass
    model: M,

    /// Phantom data for tracking the tensor type at compile time
    _marker: PhantomData<fn() -> B>,
}

impl<M, B> TensorBatcher<M, B>
where
    M: Forward<B>,
    B: Backend,
{
    pub fn new(model: M) -> Self {
        Self {
            model,
            _marker: PhantomData,
        }
    }
}

impl<M, B> BatchHandler<B, B> for TensorBatcher<M, B>
where
    M: Forward<B>,
    B: Backend,
{
    /// Stacks the items, runs one forward pass, and slices the output back apart.
    fn run_batch(&self, items: Vec<B>) -> anyhow::Result<Vec<B>> {
        let input = B::stack(&items)?;
        trace!(shape = ?input.shape(), "forward pass");
        let output = self.model.forward(input)?;
        output.unstack()
    }
}
