use std::{fmt, fs, path::Path};

use tch::{
    nn::{self, ModuleT, RNN},
    Device, Reduction, Tensor,
};

use crate::{
    config::ModelConfig,
    error::{Error, Result},
};

pub const MODEL_CONFIG_FILE: &str = "model.json";
pub const WEIGHTS_FILE: &str = "weights.ot";

/// Stacked LSTM regressor: LSTM(64, full sequence) -> LSTM(32, last step)
/// -> Dense(16, relu) -> Dropout -> Dense(5).
pub struct ChargingForecaster {
    config: ModelConfig,
    lstm1: nn::LSTM,
    lstm2: nn::LSTM,
    hidden: nn::Linear,
    head: nn::Linear,
}

impl fmt::Debug for ChargingForecaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChargingForecaster").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ChargingForecaster {
    pub fn new(p: &nn::Path, config: &ModelConfig) -> Self {
        let rnn = nn::RNNConfig {
            batch_first: true,
            ..Default::default()
        };
        let (lstm1_units, lstm2_units) = (config.lstm1_units as i64, config.lstm2_units as i64);
        let lstm1 = nn::lstm(p / "lstm1", config.input_size as i64, lstm1_units, rnn);
        let lstm2 = nn::lstm(p / "lstm2", lstm1_units, lstm2_units, rnn);
        let hidden = nn::linear(
            p / "dense",
            config.lstm2_units as i64,
            config.dense_units as i64,
            Default::default(),
        );
        let head = nn::linear(
            p / "output",
            config.dense_units as i64,
            config.output_size as i64,
            Default::default(),
        );
        Self {
            config: config.clone(),
            lstm1,
            lstm2,
            hidden,
            head,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Writes `model.json` and `weights.ot` into `dir`, replacing any
    /// previous artifact.
    pub fn save(&self, vs: &nn::VarStore, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let config_path = dir.join(MODEL_CONFIG_FILE);
        let json = serde_json::to_string_pretty(&self.config).map_err(|source| Error::Json {
            path: config_path.clone(),
            source,
        })?;
        fs::write(&config_path, json).map_err(|source| Error::Io {
            path: config_path.clone(),
            source,
        })?;

        vs.save(dir.join(WEIGHTS_FILE))?;
        Ok(())
    }

    /// Rebuilds the network described by `model.json` and loads its weights.
    pub fn load(dir: impl AsRef<Path>, device: Device) -> Result<(nn::VarStore, Self)> {
        let dir = dir.as_ref();
        let config_path = dir.join(MODEL_CONFIG_FILE);
        let txt = fs::read_to_string(&config_path).map_err(|source| Error::Io {
            path: config_path.clone(),
            source,
        })?;
        let config: ModelConfig = serde_json::from_str(&txt).map_err(|source| Error::Json {
            path: config_path.clone(),
            source,
        })?;

        let weights = dir.join(WEIGHTS_FILE);
        if !weights.exists() {
            return Err(Error::InvalidModel(format!("missing {}", weights.display())));
        }

        let mut vs = nn::VarStore::new(device);
        let model = Self::new(&vs.root(), &config);
        vs.load(&weights)?;
        Ok((vs, model))
    }
}

impl ModuleT for ChargingForecaster {
    /// `xs`: `[batch, seq_len, input_size]` -> `[batch, output_size]`.
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let (seq, _) = self.lstm1.seq(xs);
        let (out, _) = self.lstm2.seq(&seq);
        out.select(1, -1)
            .apply(&self.hidden)
            .relu()
            .dropout(self.config.dropout, train)
            .apply(&self.head)
    }
}

pub fn mse(pred: &Tensor, target: &Tensor) -> Tensor {
    pred.mse_loss(target, Reduction::Mean)
}

pub fn mae(pred: &Tensor, target: &Tensor) -> Tensor {
    pred.l1_loss(target, Reduction::Mean)
}
