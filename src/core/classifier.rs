//! The classifier wrapper (C5): a ring-buffer training set, an atomically
//! swapped current/pending model handle, and an asynchronous background
//! training thread. The tree-booster itself is a black box behind
//! [`ClassifierBackend`] — `train(X,y) -> handle`, `predict(handle,X) -> [0,1]`.

use std::sync::{Arc, Mutex};

use rand::seq::SliceRandom;
use rand::thread_rng;

/// An opaque, cheaply-cloneable trained model handle.
pub trait ModelHandle: Send + Sync {}

/// The black-box binary classifier contract.
pub trait ClassifierBackend: Send + Sync {
    type Handle: ModelHandle + 'static;

    fn train(&self, x: &[Vec<f64>], y: &[f64]) -> Self::Handle;
    fn predict(&self, handle: &Self::Handle, x: &[Vec<f64>]) -> Vec<f64>;
}

struct Ring {
    capacity: usize,
    features_length: usize,
    rows_x: Vec<Vec<f64>>,
    rows_y: Vec<f64>,
    row_count: usize,
    full: bool,
}

impl Ring {
    fn new(capacity: usize, features_length: usize) -> Self {
        Ring {
            capacity,
            features_length,
            rows_x: Vec::with_capacity(capacity),
            rows_y: Vec::with_capacity(capacity),
            row_count: 0,
            full: false,
        }
    }

    /// Append `k` rows starting at `row_count`, wrapping around. Pre-shuffles
    /// the ring the first time it wraps, to decorrelate row order from time.
    fn append(&mut self, x: &[Vec<f64>], y: &[f64]) {
        for (features, &label) in x.iter().zip(y.iter()) {
            if self.rows_x.len() < self.capacity {
                self.rows_x.push(features.clone());
                self.rows_y.push(label);
            } else {
                self.rows_x[self.row_count] = features.clone();
                self.rows_y[self.row_count] = label;
            }
            self.row_count += 1;
            if self.row_count >= self.capacity {
                self.row_count = 0;
                if !self.full {
                    self.full = true;
                    self.shuffle_in_place();
                }
            }
        }
    }

    fn shuffle_in_place(&mut self) {
        let mut idx: Vec<usize> = (0..self.rows_x.len()).collect();
        idx.shuffle(&mut thread_rng());
        let x: Vec<Vec<f64>> = idx.iter().map(|&i| self.rows_x[i].clone()).collect();
        let y: Vec<f64> = idx.iter().map(|&i| self.rows_y[i]).collect();
        self.rows_x = x;
        self.rows_y = y;
    }

    fn snapshot(&self) -> (Vec<Vec<f64>>, Vec<f64>) {
        if self.full {
            (self.rows_x.clone(), self.rows_y.clone())
        } else {
            (
                self.rows_x[..self.row_count].to_vec(),
                self.rows_y[..self.row_count].to_vec(),
            )
        }
    }

    fn is_empty(&self) -> bool {
        !self.full && self.row_count == 0
    }
}

/// Training/prediction hyperparameters, fixed at construction time.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    pub features_length: usize,
    pub learning_rate: f64,
    pub max_boost_rounds: u32,
    pub one_time_training: bool,
    /// Upper bound, in bytes, on the ring's footprint; clamps row capacity
    /// into `[100_000, 1_000_000]`.
    pub train_budget_bytes: u64,
}

impl ClassifierConfig {
    pub fn ring_capacity(&self) -> usize {
        let per_row = (self.features_length as u64 + 1) * 8;
        let raw = self.train_budget_bytes / per_row.max(1);
        raw.clamp(100_000, 1_000_000) as usize
    }
}

/// The C5 wrapper: owns the ring buffer, the current/pending handle, and
/// drives training on a caller-supplied background thread (the coordinator
/// owns thread lifetime so it can join before submitting the next window).
pub struct Classifier<B: ClassifierBackend> {
    backend: Arc<B>,
    config: ClassifierConfig,
    ring: Mutex<Ring>,
    current: Mutex<Option<Arc<B::Handle>>>,
    trained_once: Mutex<bool>,
}

impl<B: ClassifierBackend> Classifier<B> {
    pub fn new(backend: B, config: ClassifierConfig) -> Self {
        let capacity = config.ring_capacity();
        Classifier {
            backend: Arc::new(backend),
            config,
            ring: Mutex::new(Ring::new(capacity, config.features_length)),
            current: Mutex::new(None),
            trained_once: Mutex::new(false),
        }
    }

    pub fn available(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    /// Append this window's sampled rows into the ring.
    pub fn ingest(&self, x: &[Vec<f64>], y: &[f64]) {
        self.ring.lock().unwrap().append(x, y);
    }

    /// Train synchronously on the current ring snapshot and publish the
    /// result as the current handle. Honors `one_time_training`: once a
    /// model has been trained, further calls are no-ops.
    pub fn train_and_publish(&self) {
        if self.config.one_time_training {
            let mut trained = self.trained_once.lock().unwrap();
            if *trained {
                return;
            }
            *trained = true;
        }

        let (x, y) = {
            let ring = self.ring.lock().unwrap();
            if ring.is_empty() {
                return;
            }
            ring.snapshot()
        };

        let handle = self.backend.train(&x, &y);
        *self.current.lock().unwrap() = Some(Arc::new(handle));
    }

    /// Predict admit probabilities for a batch, using whatever handle is
    /// currently published. Returns `None` if no model is available yet.
    pub fn predict(&self, x: &[Vec<f64>]) -> Option<Vec<f64>> {
        let handle = self.current.lock().unwrap().clone()?;
        Some(self.backend.predict(&handle, x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MeanHandle {
        mean_y: f64,
    }
    impl ModelHandle for MeanHandle {}

    struct MeanBackend;
    impl ClassifierBackend for MeanBackend {
        type Handle = MeanHandle;
        fn train(&self, _x: &[Vec<f64>], y: &[f64]) -> MeanHandle {
            let mean_y = if y.is_empty() {
                0.0
            } else {
                y.iter().sum::<f64>() / y.len() as f64
            };
            MeanHandle { mean_y }
        }
        fn predict(&self, handle: &MeanHandle, x: &[Vec<f64>]) -> Vec<f64> {
            vec![handle.mean_y; x.len()]
        }
    }

    fn cfg() -> ClassifierConfig {
        ClassifierConfig {
            features_length: 4,
            learning_rate: 0.1,
            max_boost_rounds: 10,
            one_time_training: false,
            train_budget_bytes: 100_000 * 5 * 8,
        }
    }

    #[test]
    fn unavailable_before_first_train() {
        let c = Classifier::new(MeanBackend, cfg());
        assert!(!c.available());
        assert!(c.predict(&[vec![0.0; 4]]).is_none());
    }

    #[test]
    fn trains_and_predicts_after_ingest() {
        let c = Classifier::new(MeanBackend, cfg());
        c.ingest(&[vec![1.0; 4], vec![2.0; 4]], &[1.0, 0.0]);
        c.train_and_publish();
        assert!(c.available());
        let p = c.predict(&[vec![0.0; 4]]).unwrap();
        assert_eq!(p, vec![0.5]);
    }

    #[test]
    fn one_time_training_trains_exactly_once() {
        let mut one_shot = cfg();
        one_shot.one_time_training = true;
        let c = Classifier::new(MeanBackend, one_shot);

        c.ingest(&[vec![1.0; 4]], &[1.0]);
        c.train_and_publish();
        assert_eq!(c.predict(&[vec![0.0; 4]]).unwrap(), vec![1.0]);

        c.ingest(&[vec![1.0; 4]], &[0.0]);
        c.train_and_publish(); // no-op: already trained once
        assert_eq!(c.predict(&[vec![0.0; 4]]).unwrap(), vec![1.0]);
    }

    #[test]
    fn ring_capacity_is_clamped() {
        let mut tiny_budget = cfg();
        tiny_budget.train_budget_bytes = 8;
        assert_eq!(tiny_budget.ring_capacity(), 100_000);

        let mut huge_budget = cfg();
        huge_budget.train_budget_bytes = u64::MAX / 2;
        assert_eq!(huge_budget.ring_capacity(), 1_000_000);
    }
}
