use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{
    error::{Error, Result},
    types::{ChargingLog, ChargingSession, FeatureVector, SessionId},
};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parses an ISO-8601 timestamp. A trailing `Z` is UTC; values without an
/// offset are read as UTC as well.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let s = value.trim();
    let normalized = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => s.to_owned(),
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(ts) = DateTime::parse_from_str(&normalized, fmt) {
            return Ok(ts.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(Error::Timestamp {
        value: value.to_owned(),
        reason: "not an ISO-8601 date-time".to_owned(),
    })
}

/// Groups logs by owning session, keeping input order inside each group.
pub fn group_logs_by_session(logs: &[ChargingLog]) -> HashMap<SessionId, Vec<&ChargingLog>> {
    let mut groups: HashMap<SessionId, Vec<&ChargingLog>> = HashMap::new();
    for log in logs {
        groups.entry(log.session_id.clone()).or_default().push(log);
    }
    groups
}

/// A listed session together with its logs in ascending time order.
#[derive(Debug, Clone)]
pub struct SessionLogs<'a> {
    pub session: &'a ChargingSession,
    pub logs: Vec<&'a ChargingLog>,
}

impl SessionLogs<'_> {
    pub fn features(&self) -> Vec<FeatureVector> {
        self.logs.iter().map(|log| log.features()).collect()
    }
}

fn sort_chronologically<'a>(group: &[&'a ChargingLog]) -> Result<Vec<&'a ChargingLog>> {
    let mut stamped = group
        .iter()
        .map(|log| {
            let raw = log.created_at.as_deref().ok_or_else(|| Error::Timestamp {
                value: String::new(),
                reason: format!("log for session {} has no created_at", log.session_id),
            })?;
            Ok((parse_timestamp(raw)?, *log))
        })
        .collect::<Result<Vec<_>>>()?;
    // stable: equal timestamps keep export order
    stamped.sort_by_key(|(ts, _)| *ts);
    Ok(stamped.into_iter().map(|(_, log)| log).collect())
}

/// Joins logs to the listed sessions in listing order. Sessions without
/// logs are skipped; logs of unlisted sessions are never looked at.
pub fn sessions_in_time_order<'a>(
    sessions: &'a [ChargingSession],
    logs: &'a [ChargingLog],
) -> Result<Vec<SessionLogs<'a>>> {
    let groups = group_logs_by_session(logs);
    let mut joined = Vec::new();
    for session in sessions {
        let Some(group) = groups.get(&session.id) else {
            tracing::debug!("session {} has no logs", session.id);
            continue;
        };
        joined.push(SessionLogs {
            session,
            logs: sort_chronologically(group)?,
        });
    }
    Ok(joined)
}

/// Concatenates the sessions' feature vectors in session order.
pub fn flatten_features(joined: &[SessionLogs<'_>]) -> Vec<FeatureVector> {
    let features: Vec<FeatureVector> = joined.iter().flat_map(|s| s.features()).collect();
    tracing::info!(
        "extracted {} feature vectors from {} sessions with logs",
        features.len(),
        joined.len()
    );
    features
}

/// Flat feature sequence over all listed sessions.
pub fn extract_features(
    sessions: &[ChargingSession],
    logs: &[ChargingLog],
) -> Result<Vec<FeatureVector>> {
    let joined = sessions_in_time_order(sessions, logs)?;
    Ok(flatten_features(&joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_zulu_offset_and_naive_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T10:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T12:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T10:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01 10:30:00.000Z").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Timestamp { .. })));
    }
}
