use anyhow::ensure;

use crate::backend::Backend;

// A simple row-major tensor for testing
#[derive(Clone, Debug, PartialEq)]
pub struct MockTensor {
    pub(crate) shape: Vec<usize>,
    pub(crate) data: Vec<i32>,
}

impl MockTensor {
    pub fn new(shape: Vec<usize>, data: Vec<i32>) -> Self {
        assert_eq!(shape.iter().product::<usize>(), data.len(), "shape does not match data");
        Self { shape, data }
    }

    pub fn data(&self) -> &[i32] {
        &self.data
    }

    pub fn map(&self, f: impl Fn(i32) -> i32) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().copied().map(f).collect(),
        }
    }
}

impl Backend for MockTensor {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn stack(items: &[Self]) -> anyhow::Result<Self> {
        ensure!(!items.is_empty(), "cannot stack an empty batch");
        let inner = items[0].shape.clone();
        ensure!(
            items.iter().all(|t| t.shape == inner),
            "all tensors in a batch must share a shape"
        );

        let mut shape = vec![items.len()];
        shape.extend(inner);
        let data = items.iter().flat_map(|t| t.data.iter().copied()).collect();
        Ok(Self { shape, data })
    }

    fn unstack(&self) -> anyhow::Result<Vec<Self>> {
        ensure!(!self.shape.is_empty(), "cannot unstack a scalar");
        let batch = self.shape[0];
        let inner = self.shape[1..].to_vec();
        let stride = inner.iter().product::<usize>();

        Ok((0..batch)
            .map(|i| Self {
                shape: inner.clone(),
                data: self.data[i * stride..(i + 1) * stride].to_vec(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_adds_batch_dimension() {
        let stacked = MockTensor::stack(&[
            MockTensor::new(vec![2, 2], vec![1, 2, 3, 4]),
            MockTensor::new(vec![2, 2], vec![5, 6, 7, 8]),
        ])
        .unwrap();

        assert_eq!(stacked.shape(), vec![2, 2, 2]);
        assert_eq!(stacked.unstack().unwrap()[1].data(), &[5, 6, 7, 8]);
    }

    #[test]
    fn test_stack_empty_fails() {
        assert!(MockTensor::stack(&[]).is_err());
    }
}
