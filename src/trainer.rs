//! Epoch loop with validation and early stopping.
//!
//! The network, autograd and Adam come from libtorch. This module owns
//! batching, the per-epoch metric bookkeeping, the stopping rule and the
//! restoration of the best weights.

use std::collections::HashMap;

use tch::{
    data::Iter2,
    nn::{self, ModuleT, OptimizerConfig},
    Tensor,
};

use crate::{
    config::TrainingConfig,
    error::{Error, Result},
    model::{mae, mse, ChargingForecaster},
    window::WindowedDataset,
};

/// Metrics for one completed epoch. Training values are sample-weighted
/// means over that epoch's batches, taken with dropout active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_mae: f64,
    pub val_loss: f64,
    pub val_mae: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    pub best_epoch: Option<usize>,
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Metrics of the last epoch that ran, which is not necessarily the
    /// epoch whose weights were restored.
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn best_val_loss(&self) -> Option<f64> {
        self.epochs.iter().map(|m| m.val_loss).reduce(f64::min)
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    Improved,
    Wait,
    Stop,
}

/// Stops once validation loss has not improved for `patience` epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    wait: usize,
    best: f64,
    best_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            min_delta: 0.0,
            wait: 0,
            best: f64::INFINITY,
            best_epoch: None,
        }
    }

    pub fn min_delta(mut self, delta: f64) -> Self {
        self.min_delta = delta;
        self
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn update(&mut self, epoch: usize, val_loss: f64) -> StopDecision {
        if val_loss < self.best - self.min_delta {
            self.best = val_loss;
            self.best_epoch = Some(epoch);
            self.wait = 0;
            return StopDecision::Improved;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            StopDecision::Stop
        } else {
            StopDecision::Wait
        }
    }
}

fn snapshot(vs: &nn::VarStore) -> HashMap<String, Tensor> {
    tch::no_grad(|| vs.variables().into_iter().map(|(name, t)| (name, t.copy())).collect())
}

fn restore(vs: &nn::VarStore, weights: &HashMap<String, Tensor>) {
    tch::no_grad(|| {
        for (name, mut var) in vs.variables() {
            if let Some(saved) = weights.get(&name) {
                var.copy_(saved);
            }
        }
    });
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    fn evaluate(model: &ChargingForecaster, xs: &Tensor, ys: &Tensor) -> (f64, f64) {
        tch::no_grad(|| {
            let pred = model.forward_t(xs, false);
            (mse(&pred, ys).double_value(&[]), mae(&pred, ys).double_value(&[]))
        })
    }

    /// Fits `model`, whose parameters live in `vs`, on `train` while
    /// validating on `val` after every epoch.
    pub fn fit(
        &self,
        vs: &nn::VarStore,
        model: &ChargingForecaster,
        train: &WindowedDataset,
        val: &WindowedDataset,
    ) -> Result<TrainingHistory> {
        if train.is_empty() {
            return Err(Error::NotEnoughData("training split has no windows".into()));
        }
        if val.is_empty() {
            return Err(Error::NotEnoughData("validation split has no windows".into()));
        }
        let mut opt = nn::Adam::default().build(vs, self.config.learning_rate)?;
        let (train_x, train_y) = (train.inputs_tensor(), train.targets_tensor());
        let (val_x, val_y) = (val.inputs_tensor(), val.targets_tensor());

        let mut stopper = EarlyStopping::new(self.config.patience).min_delta(self.config.min_delta);
        let mut best_weights = None;
        let mut history = TrainingHistory::default();

        tracing::info!(
            "training on {} windows, validating on {} (max {} epochs, batch {})",
            train.len(),
            val.len(),
            self.config.epochs,
            self.config.batch_size
        );

        for epoch in 0..self.config.epochs {
            let mut loss_sum = 0.0;
            let mut mae_sum = 0.0;
            let mut seen = 0.0;

            let mut batches = Iter2::new(&train_x, &train_y, self.config.batch_size as i64);
            batches.shuffle().return_smaller_last_batch();
            for (xs, ys) in &mut batches {
                let pred = model.forward_t(&xs, true);
                let loss = mse(&pred, &ys);
                opt.backward_step(&loss);

                let n = xs.size()[0] as f64;
                loss_sum += loss.double_value(&[]) * n;
                mae_sum += tch::no_grad(|| mae(&pred, &ys)).double_value(&[]) * n;
                seen += n;
            }

            let (val_loss, val_mae) = Self::evaluate(model, &val_x, &val_y);
            let metrics = EpochMetrics {
                epoch,
                train_loss: loss_sum / seen,
                train_mae: mae_sum / seen,
                val_loss,
                val_mae,
            };
            history.epochs.push(metrics);
            tracing::info!(
                "epoch {}/{}: loss={:.4} mae={:.4} val_loss={:.4} val_mae={:.4}",
                epoch + 1,
                self.config.epochs,
                metrics.train_loss,
                metrics.train_mae,
                metrics.val_loss,
                metrics.val_mae
            );

            match stopper.update(epoch, val_loss) {
                StopDecision::Improved => best_weights = Some(snapshot(vs)),
                StopDecision::Wait => {}
                StopDecision::Stop => {
                    history.stopped_early = true;
                    if let Some(weights) = &best_weights {
                        restore(vs, weights);
                    }
                    tracing::info!(
                        "early stop after epoch {}, restored weights of epoch {}",
                        epoch + 1,
                        stopper.best_epoch().map_or(0, |e| e + 1)
                    );
                    break;
                }
            }
        }

        history.best_epoch = stopper.best_epoch();
        Ok(history)
    }
}
