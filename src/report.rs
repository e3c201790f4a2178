use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    trainer::TrainingHistory,
};

/// Final metrics printed as the single stdout line of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub training_loss: f64,
    pub validation_loss: f64,
    pub training_mae: f64,
    pub validation_mae: f64,
}

impl TrainingReport {
    /// Uses the last epoch that ran, even when early stopping restored the
    /// weights of an earlier one.
    pub fn from_history(history: &TrainingHistory) -> Result<Self> {
        let last = history
            .last()
            .ok_or_else(|| Error::NotEnoughData("no epoch completed".into()))?;
        Ok(Self {
            training_loss: last.train_loss,
            validation_loss: last.val_loss,
            training_mae: last.train_mae,
            validation_mae: last.val_mae,
        })
    }

    /// Compact single-line JSON in field order. Non-finite values render as `null`.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::EpochMetrics;

    #[test]
    fn report_takes_last_epoch_not_best() {
        let history = TrainingHistory {
            epochs: vec![
                EpochMetrics {
                    epoch: 0,
                    train_loss: 0.9,
                    train_mae: 0.8,
                    val_loss: 0.3,
                    val_mae: 0.4,
                },
                EpochMetrics {
                    epoch: 1,
                    train_loss: 0.7,
                    train_mae: 0.6,
                    val_loss: 0.5,
                    val_mae: 0.55,
                },
            ],
            best_epoch: Some(0),
            stopped_early: true,
        };
        let report = TrainingReport::from_history(&history).unwrap();
        assert_eq!(report.validation_loss, 0.5);
        assert_eq!(report.training_mae, 0.6);
    }

    #[test]
    fn json_line_has_exactly_four_numbers() {
        let report = TrainingReport {
            training_loss: 0.25,
            validation_loss: 0.5,
            training_mae: 0.125,
            validation_mae: 0.75,
        };
        let line = report.to_json_line().unwrap();
        assert!(line.starts_with(r#"{"training_loss":0.25,"validation_loss""#));
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert!(obj.values().all(serde_json::Value::is_f64));
        assert_eq!(obj["validation_mae"], 0.75);
    }

    #[test]
    fn empty_history_is_an_error() {
        assert!(TrainingReport::from_history(&TrainingHistory::default()).is_err());
    }
}
