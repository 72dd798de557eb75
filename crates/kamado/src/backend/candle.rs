use candle_core::Tensor;

use super::{BATCH_DIM, Backend};

impl Backend for Tensor {
    fn shape(&self) -> Vec<usize> {
        self.dims().to_vec()
    }

    fn stack(items: &[Self]) -> anyhow::Result<Self> {
        Ok(Tensor::stack(items, BATCH_DIM)?)
    }

    fn unstack(&self) -> anyhow::Result<Vec<Self>> {
        let batch = self.dim(BATCH_DIM)?;
        (0..batch).map(|i| Ok(self.get(i)?)).collect()
    }
}
