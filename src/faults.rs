use serde::Serialize;

use crate::preprocess::{parse_timestamp, SessionLogs};

/// Average output power below this (kW) is flagged.
pub const LOW_POWER_KW: f32 = 3.0;
/// Battery gain below this (% per hour) is flagged.
pub const SLOW_CHARGE_PCT_PER_HOUR: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultFinding {
    pub severity: Severity,
    pub reason: &'static str,
    pub description: String,
    pub recommendations: &'static [&'static str],
    /// Percent.
    pub confidence: u8,
}

fn interruptions(session: &SessionLogs<'_>) -> Option<FaultFinding> {
    let interrupted = session.logs.windows(2).any(|pair| {
        let (prev, cur) = (&pair[0].status, &pair[1].status);
        cur != prev && cur.as_deref() != Some("Charging")
    });
    interrupted.then(|| FaultFinding {
        severity: Severity::Medium,
        reason: "Charging Interruptions",
        description: "Multiple charging status changes detected during session".to_owned(),
        recommendations: &[
            "Inspect charging equipment for malfunctions",
            "Check vehicle charging system",
            "Review power supply stability",
        ],
        confidence: 85,
    })
}

fn low_power(session: &SessionLogs<'_>) -> Option<FaultFinding> {
    let readings: Vec<f32> = session.logs.iter().filter_map(|log| log.output_power).collect();
    if readings.is_empty() {
        return None;
    }
    let avg = readings.iter().sum::<f32>() / readings.len() as f32;
    (avg < LOW_POWER_KW).then(|| FaultFinding {
        severity: Severity::High,
        reason: "Low Power Output",
        description: format!("Average power output ({avg:.2} kW) is below expected threshold"),
        recommendations: &[
            "Check charger specifications",
            "Verify grid connection capacity",
            "Inspect for voltage drops",
        ],
        confidence: 90,
    })
}

fn slow_charging(session: &SessionLogs<'_>) -> Option<FaultFinding> {
    let levels: Vec<f32> = session.logs.iter().filter_map(|log| log.battery_level).collect();
    let (first, last) = match levels.as_slice() {
        [first, .., last] => (*first, *last),
        _ => return None,
    };
    let started = parse_timestamp(session.session.started_at.as_deref()?).ok()?;
    let stopped = parse_timestamp(session.session.stopped_at.as_deref()?).ok()?;
    let hours = (stopped - started).num_milliseconds() as f64 / 3_600_000.0;
    if hours <= 0.0 {
        return None;
    }
    let rate = f64::from(last - first) / hours;
    (rate < SLOW_CHARGE_PCT_PER_HOUR).then(|| FaultFinding {
        severity: Severity::Medium,
        reason: "Slow Charging Rate",
        description: format!("Battery charging rate ({rate:.2}% per hour) is unusually slow"),
        recommendations: &[
            "Check vehicle charging settings",
            "Verify charger-vehicle compatibility",
            "Inspect for thermal throttling",
        ],
        confidence: 75,
    })
}

/// Rule-based findings for one session's time-ordered logs.
pub fn analyze_faults(session: &SessionLogs<'_>) -> Vec<FaultFinding> {
    [interruptions(session), low_power(session), slow_charging(session)]
        .into_iter()
        .flatten()
        .collect()
}
