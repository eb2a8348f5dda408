//! Online fill-probability learner.
//!
//! Logistic regression over (qty, queue-ahead, latency µs) predicting whether a
//! passive order fills completely.
//!
//! # Single writer
//!
//! The learner task owns every per-symbol sample buffer and is the only code
//! that fits models. Fill callbacks send samples through a bounded channel with
//! `try_send` (fire-and-forget; a full channel drops the sample). Fitted models
//! are published to a `DashMap` that the decision path reads synchronously.
//!
//! Before the first fit for a symbol, `predict` returns 0.5.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use sentinel_core::Symbol;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::FillModelConfig;

/// Probability returned before any fit.
pub const COLD_START_PROBABILITY: f64 = 0.5;

const FEATURES: usize = 3;

/// Model inputs for one order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillFeatures {
    pub qty: f64,
    pub queue_ahead: f64,
    pub latency_us: f64,
}

impl FillFeatures {
    fn as_array(&self) -> [f64; FEATURES] {
        [self.qty, self.queue_ahead, self.latency_us]
    }
}

/// Labelled observation sent by a fill callback.
#[derive(Debug, Clone)]
pub struct FillSample {
    pub symbol: Symbol,
    pub features: FillFeatures,
    pub filled: bool,
}

/// Fitted logistic regression with per-feature standardization.
#[derive(Debug, Clone, Default)]
pub struct FillModel {
    fitted: Option<Coefficients>,
}

#[derive(Debug, Clone)]
struct Coefficients {
    weights: [f64; FEATURES],
    bias: f64,
    mean: [f64; FEATURES],
    scale: [f64; FEATURES],
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl FillModel {
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Probability in [0, 1] that the order fills; 0.5 when not yet fitted.
    #[must_use]
    pub fn predict(&self, features: &FillFeatures) -> f64 {
        let Some(c) = &self.fitted else {
            return COLD_START_PROBABILITY;
        };
        let x = features.as_array();
        let mut z = c.bias;
        for i in 0..FEATURES {
            z += c.weights[i] * (x[i] - c.mean[i]) / c.scale[i];
        }
        let p = sigmoid(z);
        if p.is_finite() {
            p
        } else {
            COLD_START_PROBABILITY
        }
    }

    /// Full-batch gradient descent on `samples`. Replaces any previous fit.
    ///
    /// Returns `None` for an empty batch.
    #[must_use]
    pub fn fit(samples: &[(FillFeatures, bool)], learning_rate: f64, epochs: usize) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;

        let mut mean = [0.0; FEATURES];
        for (f, _) in samples {
            for (m, v) in mean.iter_mut().zip(f.as_array()) {
                *m += v / n;
            }
        }
        let mut scale = [0.0; FEATURES];
        for (f, _) in samples {
            for i in 0..FEATURES {
                scale[i] += (f.as_array()[i] - mean[i]).powi(2) / n;
            }
        }
        for s in scale.iter_mut() {
            *s = s.sqrt();
            if !s.is_normal() {
                *s = 1.0;
            }
        }

        let standardized: Vec<([f64; FEATURES], f64)> = samples
            .iter()
            .map(|(f, y)| {
                let x = f.as_array();
                let mut z = [0.0; FEATURES];
                for i in 0..FEATURES {
                    z[i] = (x[i] - mean[i]) / scale[i];
                }
                (z, if *y { 1.0 } else { 0.0 })
            })
            .collect();

        let mut weights = [0.0; FEATURES];
        let mut bias = 0.0;
        for _ in 0..epochs {
            let mut grad_w = [0.0; FEATURES];
            let mut grad_b = 0.0;
            for (x, y) in &standardized {
                let mut z = bias;
                for i in 0..FEATURES {
                    z += weights[i] * x[i];
                }
                let err = sigmoid(z) - y;
                for i in 0..FEATURES {
                    grad_w[i] += err * x[i] / n;
                }
                grad_b += err / n;
            }
            for i in 0..FEATURES {
                weights[i] -= learning_rate * grad_w[i];
            }
            bias -= learning_rate * grad_b;
        }

        Some(Self {
            fitted: Some(Coefficients {
                weights,
                bias,
                mean,
                scale,
            }),
        })
    }
}

// ============================================================================
// Learner Actor
// ============================================================================

struct FillLearnerTask {
    rx: mpsc::Receiver<FillSample>,
    config: FillModelConfig,
    buffers: HashMap<Symbol, Vec<(FillFeatures, bool)>>,
    models: Arc<DashMap<Symbol, FillModel>>,
}

impl FillLearnerTask {
    async fn run(mut self) {
        debug!("FillLearnerTask started");
        while let Some(sample) = self.rx.recv().await {
            self.on_sample(sample);
        }
        debug!("FillLearnerTask terminated");
    }

    fn on_sample(&mut self, sample: FillSample) {
        let buffer = self.buffers.entry(sample.symbol.clone()).or_default();
        buffer.push((sample.features, sample.filled));
        if buffer.len() < self.config.batch_size {
            return;
        }

        let batch = std::mem::take(buffer);
        match FillModel::fit(&batch, self.config.learning_rate, self.config.epochs) {
            Some(model) => {
                info!(symbol = %sample.symbol, samples = batch.len(), "Fill model refitted");
                self.models.insert(sample.symbol, model);
            }
            None => warn!(symbol = %sample.symbol, "Fill model fit skipped: empty batch"),
        }
    }
}

/// Cloneable handle for recording fills and reading predictions.
#[derive(Clone)]
pub struct FillLearnerHandle {
    tx: mpsc::Sender<FillSample>,
    models: Arc<DashMap<Symbol, FillModel>>,
}

impl FillLearnerHandle {
    /// Fire-and-forget: a full or closed channel drops the sample.
    pub fn record(&self, sample: FillSample) {
        if let Err(e) = self.tx.try_send(sample) {
            warn!(error = %e, "Fill sample dropped");
        }
    }

    /// Latest published prediction for `symbol`.
    #[must_use]
    pub fn predict(&self, symbol: &Symbol, features: &FillFeatures) -> f64 {
        self.models
            .get(symbol)
            .map(|m| m.predict(features))
            .unwrap_or(COLD_START_PROBABILITY)
    }

    #[must_use]
    pub fn is_fitted(&self, symbol: &Symbol) -> bool {
        self.models.get(symbol).is_some_and(|m| m.is_fitted())
    }
}

/// Spawn the learner task.
///
/// The task ends when every handle is dropped.
#[must_use]
pub fn spawn_fill_learner(config: FillModelConfig) -> (FillLearnerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let models = Arc::new(DashMap::new());

    let task = FillLearnerTask {
        rx,
        config,
        buffers: HashMap::new(),
        models: models.clone(),
    };
    let handle = FillLearnerHandle { tx, models };
    let join_handle = tokio::spawn(task.run());

    (handle, join_handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(qty: f64, queue_ahead: f64) -> FillFeatures {
        FillFeatures {
            qty,
            queue_ahead,
            latency_us: 200.0,
        }
    }

    /// Small orders behind a short queue fill; large ones behind a long queue don't.
    fn separable_batch(n: usize) -> Vec<(FillFeatures, bool)> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    (features(10.0 + (i % 7) as f64, 50.0), true)
                } else {
                    (features(400.0 + (i % 11) as f64, 900.0), false)
                }
            })
            .collect()
    }

    #[test]
    fn test_cold_start_returns_half() {
        let model = FillModel::default();
        assert!(!model.is_fitted());
        assert_eq!(model.predict(&features(100.0, 100.0)), 0.5);
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let model = FillModel::fit(&separable_batch(200), 0.5, 300).unwrap();
        assert!(model.predict(&features(12.0, 50.0)) > 0.8);
        assert!(model.predict(&features(405.0, 900.0)) < 0.2);
    }

    #[test]
    fn test_fit_constant_feature_is_finite() {
        let batch: Vec<_> = (0..20).map(|i| (features(10.0, 10.0), i % 3 == 0)).collect();
        let model = FillModel::fit(&batch, 0.1, 50).unwrap();
        let p = model.predict(&features(10.0, 10.0));
        assert!(p.is_finite() && (0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_fit_empty_batch() {
        assert!(FillModel::fit(&[], 0.1, 10).is_none());
    }

    #[tokio::test]
    async fn test_learner_fits_after_batch() {
        let config = FillModelConfig {
            batch_size: 50,
            learning_rate: 0.5,
            epochs: 200,
            channel_capacity: 128,
        };
        let (handle, join) = spawn_fill_learner(config);
        let symbol = Symbol::new("AAPL");

        for (f, filled) in separable_batch(49) {
            handle.record(FillSample {
                symbol: symbol.clone(),
                features: f,
                filled,
            });
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!handle.is_fitted(&symbol));
        assert_eq!(handle.predict(&symbol, &features(12.0, 50.0)), 0.5);

        handle.record(FillSample {
            symbol: symbol.clone(),
            features: features(11.0, 50.0),
            filled: true,
        });
        for _ in 0..100 {
            if handle.is_fitted(&symbol) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(handle.is_fitted(&symbol));
        assert!(handle.predict(&symbol, &features(12.0, 50.0)) > 0.5);
        assert_eq!(handle.predict(&Symbol::new("MSFT"), &features(1.0, 1.0)), 0.5);

        drop(handle);
        join.await.unwrap();
    }
}
