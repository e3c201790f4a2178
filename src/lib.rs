//! Next-reading forecaster for EV charging telemetry.
//!
//! Sessions and their logs are joined, encoded as five-feature vectors,
//! standardized and cut into sliding windows that train a stacked LSTM
//! regressor on libtorch.

pub mod config;
pub mod error;
pub mod faults;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod preprocess;
pub mod report;
pub mod scaler;
pub mod trainer;
pub mod types;
pub mod window;

pub use config::{ModelConfig, TrainingConfig};
pub use error::{Error, Result};
pub use report::TrainingReport;
pub use types::{ChargingLog, ChargingSession, FeatureVector, SessionId};
