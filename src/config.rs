use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::NUM_FEATURES;

/// Network shape. Saved as `model.json` beside the weights so the network
/// can be rebuilt before the weights are loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub input_size: usize,
    pub seq_len: usize,
    pub lstm1_units: usize,
    pub lstm2_units: usize,
    pub dense_units: usize,
    pub dropout: f64,
    pub output_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: NUM_FEATURES,
            seq_len: 5,
            lstm1_units: 64,
            lstm2_units: 32,
            dense_units: 16,
            dropout: 0.2,
            output_size: NUM_FEATURES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub train_fraction: f64,
    pub patience: usize,
    /// Smallest drop in validation loss that counts as an improvement.
    pub min_delta: f64,
    pub window_len: usize,
    pub seed: Option<i64>,
    pub models_dir: PathBuf,
    pub model_dir_name: String,
    pub scaler_file_name: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            train_fraction: 0.8,
            patience: 5,
            min_delta: 0.0,
            window_len: 5,
            seed: None,
            models_dir: PathBuf::from("models"),
            model_dir_name: "ev_charging_model".to_owned(),
            scaler_file_name: "scaler_params.npy".to_owned(),
        }
    }
}

impl TrainingConfig {
    pub fn model_dir(&self) -> PathBuf {
        self.models_dir.join(&self.model_dir_name)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.models_dir.join(&self.scaler_file_name)
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            seq_len: self.window_len,
            ..ModelConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn defaults_match_artifact_layout() {
        let cfg = TrainingConfig::default();
        assert_eq!(cfg.model_dir(), Path::new("models/ev_charging_model"));
        assert_eq!(cfg.scaler_path(), Path::new("models/scaler_params.npy"));
        assert_eq!(cfg.epochs, 50);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.patience, 5);
        assert_eq!(cfg.min_delta, 0.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: TrainingConfig =
            serde_json::from_str(r#"{"epochs": 3, "models_dir": "out"}"#).unwrap();
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.scaler_path(), Path::new("out/scaler_params.npy"));
    }
}
