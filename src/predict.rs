//! Querying a trained model with raw telemetry.

use std::path::Path;

use tch::{nn, nn::ModuleT, Device, Kind, Tensor};

use crate::{
    error::{Error, Result},
    model::ChargingForecaster,
    scaler::{ScalerParams, StandardScaler},
    types::{FeatureVector, NUM_FEATURES},
    window::make_windows,
};

pub const DEFAULT_ANOMALY_THRESHOLD: f32 = 0.1;

pub struct Predictor {
    // owns the parameters `model` reads from
    _vs: nn::VarStore,
    model: ChargingForecaster,
    scaler: StandardScaler,
}

impl Predictor {
    pub fn new(vs: nn::VarStore, model: ChargingForecaster, scaler: StandardScaler) -> Self {
        Self { _vs: vs, model, scaler }
    }

    pub fn load(model_dir: impl AsRef<Path>, scaler_path: impl AsRef<Path>) -> Result<Self> {
        let (vs, model) = ChargingForecaster::load(model_dir, Device::Cpu)?;
        let scaler = StandardScaler::from_params(ScalerParams::load(scaler_path)?);
        tracing::debug!("loaded predictor {:?}", model.config());
        Ok(Self::new(vs, model, scaler))
    }

    fn window_len(&self) -> usize {
        self.model.config().seq_len
    }

    /// Predicts the reading that follows `recent`, in raw units. Only the
    /// last `seq_len` readings are used.
    pub fn forecast(&self, recent: &[FeatureVector]) -> Result<FeatureVector> {
        let seq_len = self.window_len();
        if recent.len() < seq_len {
            return Err(Error::NotEnoughData(format!(
                "forecast needs {seq_len} readings, got {}",
                recent.len()
            )));
        }
        let window = self.scaler.transform(&recent[recent.len() - seq_len..]);
        let flat: Vec<f32> = window.iter().flatten().copied().collect();
        let xs = Tensor::from_slice(&flat).reshape([1, seq_len as i64, NUM_FEATURES as i64]);

        let out = tch::no_grad(|| self.model.forward_t(&xs, false));
        let values = Vec::<f32>::try_from(&out.flatten(0, -1))?;
        let normalized: FeatureVector = values
            .try_into()
            .map_err(|_| Error::InvalidModel("model output is not one feature vector".into()))?;
        Ok(self.scaler.inverse_transform_one(&normalized))
    }

    /// Squared prediction error per window over a raw reading sequence,
    /// measured in normalized units. One score per reading after the first
    /// `seq_len`.
    pub fn anomaly_scores(&self, readings: &[FeatureVector]) -> Result<Vec<f32>> {
        let windows = make_windows(&self.scaler.transform(readings), self.window_len());
        if windows.is_empty() {
            return Ok(Vec::new());
        }
        let (xs, ys) = (windows.inputs_tensor(), windows.targets_tensor());
        let scores = tch::no_grad(|| {
            let pred = self.model.forward_t(&xs, false);
            (pred - ys).square().mean_dim(&[1i64][..], false, Kind::Float)
        });
        Ok(Vec::<f32>::try_from(&scores)?)
    }

    pub fn detect_anomalies(
        &self,
        readings: &[FeatureVector],
        threshold: f32,
    ) -> Result<Vec<bool>> {
        Ok(self
            .anomaly_scores(readings)?
            .into_iter()
            .map(|score| score > threshold)
            .collect())
    }
}
