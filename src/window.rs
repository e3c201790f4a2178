use tch::Tensor;

use crate::types::{FeatureVector, NUM_FEATURES};

/// Input windows paired with the reading that follows each of them.
#[derive(Debug, Clone, Default)]
pub struct WindowedDataset {
    pub window_len: usize,
    pub inputs: Vec<Vec<FeatureVector>>,
    pub targets: Vec<FeatureVector>,
}

/// Slides a window of `window_len` one step at a time over `sequence`.
/// Produces `len - window_len` pairs, or none when the sequence is too short.
///
/// The sequence is treated as one stream, so a window may straddle the
/// boundary between two sessions.
pub fn make_windows(sequence: &[FeatureVector], window_len: usize) -> WindowedDataset {
    let count = sequence.len().saturating_sub(window_len);
    let mut inputs = Vec::with_capacity(count);
    let mut targets = Vec::with_capacity(count);
    for i in 0..count {
        inputs.push(sequence[i..i + window_len].to_vec());
        targets.push(sequence[i + window_len]);
    }
    WindowedDataset {
        window_len,
        inputs,
        targets,
    }
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Index where the training part ends for a given training fraction.
    pub fn split_index(&self, train_fraction: f64) -> usize {
        (self.len() as f64 * train_fraction).floor() as usize
    }

    /// Positional split, no shuffling: every training pair precedes every
    /// validation pair.
    pub fn split(self, train_fraction: f64) -> (Self, Self) {
        let at = self.split_index(train_fraction);
        let Self {
            window_len,
            mut inputs,
            mut targets,
        } = self;
        let val_inputs = inputs.split_off(at);
        let val_targets = targets.split_off(at);
        (
            Self {
                window_len,
                inputs,
                targets,
            },
            Self {
                window_len,
                inputs: val_inputs,
                targets: val_targets,
            },
        )
    }

    /// Inputs as `[n, window_len, features]`.
    pub fn inputs_tensor(&self) -> Tensor {
        let flat: Vec<f32> = self.inputs.iter().flatten().flatten().copied().collect();
        let shape = [self.len() as i64, self.window_len as i64, NUM_FEATURES as i64];
        Tensor::from_slice(&flat).reshape(shape)
    }

    /// Targets as `[n, features]`.
    pub fn targets_tensor(&self) -> Tensor {
        let flat: Vec<f32> = self.targets.iter().flatten().copied().collect();
        Tensor::from_slice(&flat).reshape([self.len() as i64, NUM_FEATURES as i64])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<FeatureVector> {
        (0..n).map(|i| [i as f32; NUM_FEATURES]).collect()
    }

    #[test]
    fn window_count_is_len_minus_window() {
        for n in [0, 3, 5, 6, 10, 37] {
            let ds = make_windows(&ramp(n), 5);
            assert_eq!(ds.len(), n.saturating_sub(5), "n = {n}");
            assert!(ds.inputs.iter().all(|w| w.len() == 5));
        }
    }

    #[test]
    fn target_is_next_reading() {
        let ds = make_windows(&ramp(8), 5);
        for (i, (input, target)) in ds.inputs.iter().zip(&ds.targets).enumerate() {
            assert_eq!(input[0][0], i as f32);
            assert_eq!(input[4][0], (i + 4) as f32);
            assert_eq!(target[0], (i + 5) as f32);
        }
    }

    #[test]
    fn split_is_positional_at_floor_of_fraction() {
        let ds = make_windows(&ramp(18), 5);
        assert_eq!(ds.len(), 13);
        let (train, val) = ds.split(0.8);
        assert_eq!(train.len(), 10);
        assert_eq!(val.len(), 3);
        let last_train = train.targets.last().unwrap()[0];
        assert!(val.targets.iter().all(|t| t[0] > last_train));
    }

    #[test]
    fn tensors_have_expected_shapes() {
        let ds = make_windows(&ramp(9), 5);
        assert_eq!(ds.inputs_tensor().size(), vec![4, 5, 5]);
        assert_eq!(ds.targets_tensor().size(), vec![4, 5]);
    }
}
