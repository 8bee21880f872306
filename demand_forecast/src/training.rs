//! Epoch loop with validation-based checkpoint selection.

use crate::config::TrainingConfig;
use crate::dataset::{WindowDataset, WindowSample};
use crate::error::{ForecastError, Result};
use crate::models::lstm::{backend_rng, LstmNetwork, TrainBackend};
use crate::models::LstmForecaster;
use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Optimizer and loop settings for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub patience: Option<usize>,
    pub seed: u64,
    pub grad_clip: Option<f64>,
}

impl From<&TrainingConfig> for TrainerConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            epochs: config.epochs,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            patience: config.patience,
            seed: config.seed,
            grad_clip: config.grad_clip,
        }
    }
}

/// Where a trainer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainerState {
    Init,
    /// Running the given (1-based) epoch
    Epoch(usize),
    Converged,
    Diverged { epoch: usize, loss: f64 },
}

/// Losses observed at the end of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_trained: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub stopped_early: bool,
    #[serde(skip)]
    pub history: Vec<EpochRecord>,
}

pub struct Trainer {
    config: TrainerConfig,
    state: TrainerState,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        if config.epochs == 0 || config.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "epochs and batch_size must be greater than zero".to_string(),
            ));
        }
        if !config.learning_rate.is_finite() || config.learning_rate < 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "learning rate must be finite and non-negative, got {}",
                config.learning_rate
            )));
        }
        Ok(Self {
            config,
            state: TrainerState::Init,
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Adam with the usual moment decay, clipping the global gradient norm
    /// when `grad_clip` is set.
    fn optimizer(&self) -> AdamConfig {
        let adam = AdamConfig::new()
            .with_beta_1(0.9)
            .with_beta_2(0.999)
            .with_epsilon(1e-8);
        match self.config.grad_clip {
            Some(max_norm) => {
                adam.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm as f32)))
            }
            None => adam,
        }
    }

    /// Train `model` in place on `dataset.train`.
    ///
    /// After every epoch the validation MSE is compared with the best so far
    /// and the weights are snapshotted on strict improvement. On success the
    /// model holds the best snapshot, which need not be the last epoch's
    /// weights. A non-finite loss stops the run with `TrainingDiverged` and
    /// leaves `model` untouched.
    pub fn fit(
        &mut self,
        model: &mut LstmForecaster,
        dataset: &WindowDataset,
    ) -> Result<TrainingReport> {
        if dataset.train.is_empty() {
            return Err(ForecastError::InsufficientData(
                "no training samples".to_string(),
            ));
        }
        let use_train_for_selection = dataset.validation.is_empty();
        if use_train_for_selection {
            warn!("validation split has no samples, selecting checkpoint on train loss");
        }
        let selection_set: Vec<&WindowSample> = if use_train_for_selection {
            dataset.train.iter().collect()
        } else {
            dataset.validation.iter().collect()
        };

        // Dropout masks come from the backend generator.
        let _rng = backend_rng();
        TrainBackend::seed(self.config.seed);
        let device = Default::default();

        let mut network: LstmNetwork<TrainBackend> = model.training_network()?;
        let mut optimizer = self
            .optimizer()
            .init::<TrainBackend, LstmNetwork<TrainBackend>>();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..dataset.train.len()).collect();

        let mut best = network.valid();
        let mut best_val = f64::INFINITY;
        let mut best_epoch = 0;
        let mut since_improvement = 0;
        let mut stopped_early = false;
        let mut history = Vec::with_capacity(self.config.epochs);

        for epoch in 1..=self.config.epochs {
            self.state = TrainerState::Epoch(epoch);
            order.shuffle(&mut rng);

            let mut weighted_loss = 0.0;
            for chunk in order.chunks(self.config.batch_size) {
                let batch: Vec<&WindowSample> = chunk.iter().map(|&i| &dataset.train[i]).collect();
                let loss = network.mse(&batch, &device);
                let value = loss.clone().into_scalar().elem::<f64>();
                if !value.is_finite() {
                    return Err(self.diverge(epoch, value));
                }

                let grads = GradientsParams::from_grads(loss.backward(), &network);
                network = optimizer.step(self.config.learning_rate, network, grads);
                weighted_loss += value * batch.len() as f64;
            }
            let train_loss = weighted_loss / dataset.train.len() as f64;

            let current = network.valid();
            let val_loss = current
                .mse(&selection_set, &device)
                .into_scalar()
                .elem::<f64>();
            if !val_loss.is_finite() {
                return Err(self.diverge(epoch, val_loss));
            }
            history.push(EpochRecord {
                epoch,
                train_loss,
                val_loss,
            });

            if epoch % 10 == 0 || epoch == 1 {
                info!(epoch, train_loss, val_loss, "epoch finished");
            } else {
                debug!(epoch, train_loss, val_loss, "epoch finished");
            }

            if val_loss < best_val {
                best_val = val_loss;
                best_epoch = epoch;
                best = current;
                since_improvement = 0;
            } else {
                since_improvement += 1;
                if let Some(patience) = self.config.patience {
                    if since_improvement >= patience {
                        info!(epoch, patience, best_epoch, "early stopping");
                        stopped_early = true;
                        break;
                    }
                }
            }
        }

        model.set_network(best);
        self.state = TrainerState::Converged;
        info!(best_epoch, best_val_loss = best_val, "restored best checkpoint");

        Ok(TrainingReport {
            epochs_trained: history.len(),
            best_epoch,
            best_val_loss: best_val,
            stopped_early,
            history,
        })
    }

    fn diverge(&mut self, epoch: usize, loss: f64) -> ForecastError {
        warn!(epoch, loss, "training diverged");
        self.state = TrainerState::Diverged { epoch, loss };
        ForecastError::TrainingDiverged { epoch, loss }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(learning_rate: f64, grad_clip: Option<f64>) -> TrainerConfig {
        TrainerConfig {
            epochs: 1,
            batch_size: 4,
            learning_rate,
            patience: None,
            seed: 1,
            grad_clip,
        }
    }

    #[test]
    fn test_trainer_rejects_bad_learning_rate() {
        assert!(Trainer::new(config(-0.1, None)).is_err());
        assert!(Trainer::new(config(f64::NAN, None)).is_err());
        assert!(Trainer::new(config(0.0, None)).is_ok());
    }

    #[test]
    fn test_trainer_rejects_zero_batch() {
        let zero_batch = TrainerConfig {
            batch_size: 0,
            ..config(0.01, None)
        };
        assert!(Trainer::new(zero_batch).is_err());
    }
}
