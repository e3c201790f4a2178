//! Per-column standardization of feature vectors.
//!
//! Parameters are fit once over the full feature sequence and must be
//! reused unchanged when the model is queried later, so they are persisted
//! next to the model as an npz archive holding `mean` and `scale`.

use std::path::Path;

use tch::{Kind, Tensor};

use crate::{
    error::{Error, Result},
    types::{FeatureVector, FEATURE_NAMES, NUM_FEATURES},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ScalerParams {
    pub mean: [f32; NUM_FEATURES],
    pub scale: [f32; NUM_FEATURES],
}

impl ScalerParams {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mean = Tensor::from_slice(&self.mean);
        let scale = Tensor::from_slice(&self.scale);
        Tensor::write_npz(&[("mean", &mean), ("scale", &scale)], path.as_ref())?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let entries = Tensor::read_npz(path.as_ref())?;
        let column = |name: &str| -> Result<[f32; NUM_FEATURES]> {
            let (_, tensor) = entries.iter().find(|(key, _)| key == name).ok_or_else(|| {
                Error::InvalidModel(format!("scaler archive has no `{name}` entry"))
            })?;
            let values = Vec::<f32>::try_from(&tensor.to_kind(Kind::Float).flatten(0, -1))?;
            values.try_into().map_err(|v: Vec<f32>| {
                let found = v.len();
                Error::InvalidModel(format!("`{name}` has {found} values, expected {NUM_FEATURES}"))
            })
        };
        Ok(Self {
            mean: column("mean")?,
            scale: column("scale")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StandardScaler {
    params: ScalerParams,
}

impl StandardScaler {
    pub fn from_params(params: ScalerParams) -> Self {
        Self { params }
    }

    /// Fits mean and population standard deviation per column. A constant
    /// column keeps scale 1.0 so it maps to zeros instead of NaN.
    pub fn fit(features: &[FeatureVector]) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::NotEnoughData("cannot fit scaler on zero feature vectors".into()));
        }
        let n = features.len() as f64;

        let mut mean = [0.0f32; NUM_FEATURES];
        let mut scale = [1.0f32; NUM_FEATURES];
        for col in 0..NUM_FEATURES {
            let m = features.iter().map(|v| f64::from(v[col])).sum::<f64>() / n;
            let var = features
                .iter()
                .map(|v| (f64::from(v[col]) - m).powi(2))
                .sum::<f64>()
                / n;
            let std = var.sqrt();
            mean[col] = m as f32;
            if std > f64::EPSILON {
                scale[col] = std as f32;
            } else {
                tracing::debug!("{} is constant, keeping scale 1.0", FEATURE_NAMES[col]);
            }
            tracing::debug!(
                "{}: mean={:.4} scale={:.4}",
                FEATURE_NAMES[col],
                mean[col],
                scale[col]
            );
        }

        Ok(Self {
            params: ScalerParams { mean, scale },
        })
    }

    pub fn params(&self) -> &ScalerParams {
        &self.params
    }

    pub fn transform_one(&self, v: &FeatureVector) -> FeatureVector {
        std::array::from_fn(|i| (v[i] - self.params.mean[i]) / self.params.scale[i])
    }

    pub fn inverse_transform_one(&self, v: &FeatureVector) -> FeatureVector {
        std::array::from_fn(|i| v[i] * self.params.scale[i] + self.params.mean[i])
    }

    pub fn transform(&self, features: &[FeatureVector]) -> Vec<FeatureVector> {
        features.iter().map(|v| self.transform_one(v)).collect()
    }

    pub fn fit_transform(features: &[FeatureVector]) -> Result<(Self, Vec<FeatureVector>)> {
        let scaler = Self::fit(features)?;
        let normalized = scaler.transform(features);
        Ok((scaler, normalized))
    }
}
