use std::{fs, path::Path};

use serde::de::DeserializeOwned;

use crate::{
    error::{Error, Result},
    types::{ChargingLog, ChargingSession},
};

fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let txt = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&txt).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_sessions(path: impl AsRef<Path>) -> Result<Vec<ChargingSession>> {
    let sessions: Vec<ChargingSession> = read_json_array(path.as_ref())?;
    tracing::info!("loaded {} sessions from {}", sessions.len(), path.as_ref().display());
    Ok(sessions)
}

pub fn load_logs(path: impl AsRef<Path>) -> Result<Vec<ChargingLog>> {
    let logs: Vec<ChargingLog> = read_json_array(path.as_ref())?;
    tracing::info!("loaded {} logs from {}", logs.len(), path.as_ref().display());
    Ok(logs)
}
