use std::{fs, path::Path};

use tch::{nn, Device};

use crate::{
    config::TrainingConfig,
    error::{Error, Result},
    faults::analyze_faults,
    loader::{load_logs, load_sessions},
    model::ChargingForecaster,
    preprocess::{flatten_features, sessions_in_time_order, SessionLogs},
    report::TrainingReport,
    scaler::StandardScaler,
    trainer::Trainer,
    window::make_windows,
};

/// Writes the model directory and the scaler archive, replacing whatever
/// is at those paths.
pub fn save_artifacts(
    config: &TrainingConfig,
    vs: &nn::VarStore,
    model: &ChargingForecaster,
    scaler: &StandardScaler,
) -> Result<()> {
    fs::create_dir_all(&config.models_dir).map_err(|source| Error::Io {
        path: config.models_dir.clone(),
        source,
    })?;
    let model_dir = config.model_dir();
    model.save(vs, &model_dir)?;
    let scaler_path = config.scaler_path();
    scaler.params().save(&scaler_path)?;
    tracing::info!(
        "saved model to {} and scaler to {}",
        model_dir.display(),
        scaler_path.display()
    );
    Ok(())
}

/// Runs the fault rules over every session and logs each finding as a
/// warning. Returns how many findings were logged.
pub fn log_fault_findings(joined: &[SessionLogs<'_>]) -> usize {
    let mut total = 0;
    for session in joined {
        for finding in analyze_faults(session) {
            tracing::warn!(
                session = %session.session.id,
                severity = ?finding.severity,
                confidence = finding.confidence,
                "{}: {}",
                finding.reason,
                finding.description
            );
            total += 1;
        }
    }
    total
}

/// Load, preprocess, normalize, window, train and persist.
pub fn run(
    sessions_path: &Path,
    logs_path: &Path,
    config: &TrainingConfig,
) -> Result<TrainingReport> {
    let sessions = load_sessions(sessions_path)?;
    let logs = load_logs(logs_path)?;

    let joined = sessions_in_time_order(&sessions, &logs)?;
    let findings = log_fault_findings(&joined);
    tracing::info!("{findings} fault findings across {} sessions", joined.len());
    let features = flatten_features(&joined);

    let (scaler, normalized) = StandardScaler::fit_transform(&features)?;
    let windows = make_windows(&normalized, config.window_len);
    let (train, val) = windows.split(config.train_fraction);
    tracing::info!("{} training and {} validation windows", train.len(), val.len());

    if let Some(seed) = config.seed {
        tch::manual_seed(seed);
    }
    let vs = nn::VarStore::new(Device::Cpu);
    let model = ChargingForecaster::new(&vs.root(), &config.model_config());
    let history = Trainer::new(config.clone()).fit(&vs, &model, &train, &val)?;

    save_artifacts(config, &vs, &model, &scaler)?;
    TrainingReport::from_history(&history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChargingLog, ChargingSession};
    use serde_json::json;

    #[test]
    fn counts_findings_across_sessions() {
        let sessions: Vec<ChargingSession> =
            serde_json::from_value(json!([{"id": 1}, {"id": 2}])).unwrap();
        let logs: Vec<ChargingLog> = serde_json::from_value(json!([
            {"session_id": 1, "created_at": "2024-05-01T10:00:00Z", "output_power": 1.0},
            {"session_id": 1, "created_at": "2024-05-01T10:05:00Z", "output_power": 1.5},
            {"session_id": 2, "created_at": "2024-05-01T11:00:00Z", "output_power": 7.0},
            {"session_id": 2, "created_at": "2024-05-01T11:05:00Z", "output_power": 7.4},
        ]))
        .unwrap();
        let joined = sessions_in_time_order(&sessions, &logs).unwrap();

        assert_eq!(log_fault_findings(&joined), 1);
        assert_eq!(log_fault_findings(&joined[1..]), 0);
    }
}
