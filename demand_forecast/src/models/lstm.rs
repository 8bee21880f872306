//! Stacked LSTM regressor for one-step-ahead prediction.
//!
//! Input is a window of `W` normalized values fed one per timestep; the last
//! hidden state of the top layer goes through a linear head to produce the
//! next normalized value.
//!
//! The network is a `burn` module. Training runs on [`TrainBackend`] (CPU
//! with autodiff), everything else on [`InferBackend`]. Dropout sits between
//! stacked layers and is inert on the inference backend, so a trained model
//! always answers deterministically.

use crate::dataset::WindowSample;
use crate::error::{ForecastError, Result};
use crate::models::OneStepModel;
use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig as LstmLayerConfig};
use burn::record::{BinBytesRecorder, BinFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use std::fs::File;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Backend used while fitting weights.
pub type TrainBackend = Autodiff<NdArray>;

/// Backend used for evaluation and serving.
pub type InferBackend = NdArray;

static BACKEND_RNG: Mutex<()> = Mutex::new(());

/// Exclusive access to the backend's global random generator.
///
/// Seeding, lazy parameter initialization and dropout masks all draw from
/// it, so seeded work holds this guard to stay reproducible when other
/// threads build or train models at the same time.
pub(crate) fn backend_rng() -> MutexGuard<'static, ()> {
    BACKEND_RNG.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shape of an LSTM forecaster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LstmConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    /// Drop probability between stacked layers, training only
    pub dropout: f64,
}

impl LstmConfig {
    /// Univariate configuration without dropout.
    pub fn new(hidden_size: usize, num_layers: usize) -> Self {
        Self {
            input_size: 1,
            hidden_size,
            num_layers,
            dropout: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Build an untrained network on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmNetwork<B> {
        let layers = (0..self.num_layers)
            .map(|layer| {
                let input = if layer == 0 {
                    self.input_size
                } else {
                    self.hidden_size
                };
                LstmLayerConfig::new(input, self.hidden_size, true).init(device)
            })
            .collect();

        LstmNetwork {
            layers,
            dropout: DropoutConfig::new(self.dropout).init(),
            head: LinearConfig::new(self.hidden_size, 1).init(device),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.hidden_size == 0 || self.num_layers == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "LSTM sizes must be positive, got {:?}",
                self
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Stacked LSTM layers followed by a linear head.
#[derive(Module, Debug)]
pub struct LstmNetwork<B: Backend> {
    pub layers: Vec<Lstm<B>>,
    pub dropout: Dropout,
    pub head: Linear<B>,
}

impl<B: Backend> LstmNetwork<B> {
    /// `[batch, steps, input]` to `[batch, 1]`.
    pub fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let mut x = inputs;
        for (index, layer) in self.layers.iter().enumerate() {
            if index > 0 {
                x = self.dropout.forward(x);
            }
            let (output, _state) = layer.forward(x, None);
            x = output;
        }

        let [batch, steps, hidden] = x.dims();
        let last = x
            .slice([0..batch, steps - 1..steps, 0..hidden])
            .reshape([batch, hidden]);
        self.head.forward(last)
    }

    /// Mean squared error over `samples` as a one-element tensor.
    pub fn mse(&self, samples: &[&WindowSample], device: &B::Device) -> Tensor<B, 1> {
        let (inputs, targets) = batch_tensors(samples, device);
        MseLoss::new().forward(self.forward(inputs), targets, Reduction::Mean)
    }
}

/// Inputs `[n, W, 1]` and targets `[n, 1]` for a batch of windows.
fn batch_tensors<B: Backend>(
    samples: &[&WindowSample],
    device: &B::Device,
) -> (Tensor<B, 3>, Tensor<B, 2>) {
    let steps = samples.first().map_or(0, |s| s.input.len());
    let inputs: Vec<f32> = samples
        .iter()
        .flat_map(|s| s.input.iter().map(|&v| v as f32))
        .collect();
    let targets: Vec<f32> = samples.iter().map(|s| s.target as f32).collect();

    (
        Tensor::from_data(TensorData::new(inputs, [samples.len(), steps, 1]), device),
        Tensor::from_data(TensorData::new(targets, [samples.len(), 1]), device),
    )
}

/// Trained or trainable LSTM weights.
///
/// The network sits behind a mutex: burn modules are `Send` but the
/// serving cache shares one forecaster between request threads.
#[derive(Debug)]
pub struct LstmForecaster {
    config: LstmConfig,
    network: Mutex<LstmNetwork<InferBackend>>,
}

impl Clone for LstmForecaster {
    fn clone(&self) -> Self {
        Self::from_network(self.config, self.network())
    }
}

impl LstmForecaster {
    /// Fresh weights drawn from the backend generator seeded with `seed`.
    pub fn new(config: LstmConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let device = Default::default();

        let network = {
            let _rng = backend_rng();
            InferBackend::seed(seed);
            let network = config.init::<InferBackend>(&device);
            // Parameters are initialized lazily; draw them while the seed is held.
            let _ = network.forward(Tensor::zeros([1, 1, config.input_size], &device));
            network
        };

        Ok(Self::from_network(config, network))
    }

    /// Wrap an already built network.
    pub fn from_network(config: LstmConfig, network: LstmNetwork<InferBackend>) -> Self {
        Self {
            config,
            network: Mutex::new(network),
        }
    }

    pub fn config(&self) -> LstmConfig {
        self.config
    }

    pub fn network(&self) -> LstmNetwork<InferBackend> {
        self.lock().clone()
    }

    pub(crate) fn set_network(&mut self, network: LstmNetwork<InferBackend>) {
        *self.network.get_mut().unwrap_or_else(PoisonError::into_inner) = network;
    }

    fn lock(&self) -> MutexGuard<'_, LstmNetwork<InferBackend>> {
        self.network.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the weights on the autodiff backend. Callers hold
    /// [`backend_rng`].
    pub(crate) fn training_network(&self) -> Result<LstmNetwork<TrainBackend>> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::new();
        let bytes = Recorder::<InferBackend>::record(&recorder, self.network().into_record(), ())?;

        let device = Default::default();
        let record = Recorder::<TrainBackend>::load(&recorder, bytes, &device)?;
        Ok(self.config.init::<TrainBackend>(&device).load_record(record))
    }

    /// Mean squared error over `samples` in normalized units, `None` if empty.
    pub fn mse(&self, samples: &[WindowSample]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let batch: Vec<&WindowSample> = samples.iter().collect();
        let loss = self.lock().mse(&batch, &Default::default());
        Some(loss.into_scalar().elem::<f64>())
    }

    /// Write the weights to `path` with a full-precision binary recorder.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.network().save_file(path.to_path_buf(), &recorder)?;
        File::open(path)?.sync_all()?;
        Ok(())
    }

    /// Read weights written by [`save_file`](Self::save_file) for a network
    /// of shape `config`.
    pub fn load_file(config: LstmConfig, path: &Path) -> Result<Self> {
        config.validate()?;
        let device = Default::default();
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();

        let record: LstmNetworkRecord<InferBackend> =
            Recorder::<InferBackend>::load(&recorder, path.to_path_buf(), &device)?;
        if record.layers.len() != config.num_layers {
            return Err(ForecastError::Model(format!(
                "weights hold {} layers, {:?} needs {}",
                record.layers.len(),
                config,
                config.num_layers
            )));
        }

        let _rng = backend_rng();
        let expected = config.init::<InferBackend>(&device).num_params();
        let network = config.init::<InferBackend>(&device).load_record(record);
        let found = network.num_params();
        if found != expected {
            return Err(ForecastError::Model(format!(
                "weights hold {} parameters, {:?} needs {}",
                found, config, expected
            )));
        }

        Ok(Self::from_network(config, network))
    }
}

impl OneStepModel for LstmForecaster {
    fn predict_next(&self, window: &[f64]) -> f64 {
        if window.is_empty() {
            return f64::NAN;
        }
        let values: Vec<f32> = window.iter().map(|&v| v as f32).collect();
        let input = Tensor::<InferBackend, 3>::from_data(
            TensorData::new(values, [1, window.len(), 1]),
            &Default::default(),
        );

        let output = self.lock().forward(input);
        output
            .into_data()
            .to_vec::<f32>()
            .ok()
            .and_then(|values| values.first().copied())
            .map_or(f64::NAN, f64::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::AutodiffModule;
    use tempfile::TempDir;

    const WINDOW: [f64; 4] = [0.1, -0.4, 0.7, 0.2];

    #[test]
    fn test_same_seed_same_weights() {
        let config = LstmConfig::new(4, 2);
        let a = LstmForecaster::new(config, 7).unwrap();
        let b = LstmForecaster::new(config, 7).unwrap();
        let c = LstmForecaster::new(config, 8).unwrap();
        assert_eq!(a.predict_next(&WINDOW), b.predict_next(&WINDOW));
        assert_ne!(a.predict_next(&WINDOW), c.predict_next(&WINDOW));
    }

    #[test]
    fn test_dropout_is_inert_at_inference() {
        let model = LstmForecaster::new(LstmConfig::new(6, 3).with_dropout(0.5), 5).unwrap();
        let first = model.predict_next(&WINDOW);
        for _ in 0..5 {
            assert_eq!(model.predict_next(&WINDOW), first);
        }
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        assert!(LstmForecaster::new(LstmConfig::new(0, 1), 1).is_err());
        assert!(LstmForecaster::new(LstmConfig::new(2, 0), 1).is_err());
        assert!(LstmForecaster::new(LstmConfig::new(2, 2).with_dropout(1.0), 1).is_err());
        assert!(LstmForecaster::new(LstmConfig::new(2, 2).with_dropout(-0.1), 1).is_err());
    }

    #[test]
    fn test_training_copy_matches_weights() {
        let model = LstmForecaster::new(LstmConfig::new(3, 2), 11).unwrap();
        let copy = {
            let _rng = backend_rng();
            model.training_network().unwrap().valid()
        };
        let restored = LstmForecaster::from_network(model.config(), copy);
        assert_eq!(restored.predict_next(&WINDOW), model.predict_next(&WINDOW));
    }

    #[test]
    fn test_weights_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weights.bin");
        let config = LstmConfig::new(3, 2);
        let model = LstmForecaster::new(config, 3).unwrap();
        model.save_file(&path).unwrap();

        let loaded = LstmForecaster::load_file(config, &path).unwrap();
        assert_eq!(loaded.predict_next(&WINDOW), model.predict_next(&WINDOW));

        let wider = LstmForecaster::load_file(LstmConfig::new(5, 2), &path);
        assert!(matches!(wider, Err(ForecastError::Model(_))));
        let deeper = LstmForecaster::load_file(LstmConfig::new(3, 3), &path);
        assert!(matches!(deeper, Err(ForecastError::Model(_))));
    }

    #[test]
    fn test_mse_of_empty_set_is_none() {
        let model = LstmForecaster::new(LstmConfig::new(2, 1), 1).unwrap();
        assert_eq!(model.mse(&[]), None);
    }
}
