//! The coordinator (C6): the per-request pipeline that ties the window,
//! cache, classifier, and analytics together, plus the background training
//! worker.
//!
//! Prediction is resolved once per request, at batch-flush time
//! (`sync_requests`), and each request is admitted exactly once from that
//! prediction. The source's variant re-ran `lookup_and_admit` on a batch
//! that had already been eagerly admitted with `p=0`, double-counting every
//! boundary request; this coordinator defers admission for a request until
//! its batch is resolved instead of admitting early and redoing it.

use std::sync::Arc;
use std::thread::JoinHandle;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::analytics::Analytics;
use super::cache::Cache;
use super::classifier::{Classifier, ClassifierBackend, ClassifierConfig};
use super::hazard::HazardMode;
use super::metadata::ObjectMetadata;
use super::window::{FeatureConfig, RequestWindow};

pub struct CoordinatorConfig {
    pub cache_size: u64,
    pub hot_lb: f64,
    pub cold_lb: f64,
    pub evict_hot_for_cold: bool,
    pub window_size: Option<u64>,
    pub learning_rate: f64,
    pub features: FeatureConfig,
    pub decay: f64,
    pub hazard_mode: HazardMode,
    pub future_labeling: bool,
    pub concurrency: u64,
    pub classifier: ClassifierConfig,
    pub seed: u64,
}

pub struct Coordinator<B: ClassifierBackend + 'static> {
    cache: Cache,
    metadata: ObjectMetadata,
    window: RequestWindow,
    classifier: Arc<Classifier<B>>,
    pending: Vec<usize>,
    rng: StdRng,
    training_thread: Option<JoinHandle<()>>,

    cache_size: u64,
    window_size: Option<u64>,
    learning_rate: f64,
    features: FeatureConfig,
    hazard_mode: HazardMode,
    future_labeling: bool,
    concurrency: u64,
}

impl<B: ClassifierBackend + 'static> Coordinator<B> {
    pub fn new(backend: B, config: CoordinatorConfig) -> Self {
        let window = RequestWindow::new(config.window_size, config.cache_size, config.features);
        Coordinator {
            cache: Cache::new(
                config.cache_size,
                config.hot_lb,
                config.cold_lb,
                config.evict_hot_for_cold,
            ),
            metadata: ObjectMetadata::new(config.features.features_length, config.decay),
            window,
            classifier: Arc::new(Classifier::new(backend, config.classifier)),
            pending: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
            training_thread: None,
            cache_size: config.cache_size,
            window_size: config.window_size,
            learning_rate: config.learning_rate,
            features: config.features,
            hazard_mode: config.hazard_mode,
            future_labeling: config.future_labeling,
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn model_available(&self) -> bool {
        self.classifier.available()
    }

    /// Run one `(t, oid, sz)` request through the pipeline, updating
    /// `analytics` as its admission decision resolves.
    pub fn process_request(&mut self, analytics: &mut Analytics, t: f64, oid: u64, sz: u64) {
        let index = self.window.add(&mut self.metadata, oid, t, sz);
        self.pending.push(index);

        if self.window.requests_count() % self.concurrency == 0 {
            self.sync_requests(analytics);
        }

        let weight = 1.0 / self.learning_rate;
        if self.window.is_ready(weight) {
            self.sync_requests(analytics);
            self.join_training();
            self.window.flush(&mut self.metadata);
            let completed = std::mem::replace(
                &mut self.window,
                RequestWindow::new(self.window_size, self.cache_size, self.features),
            );
            self.spawn_training(completed);
            self.join_training();
        }
    }

    /// Predict (if a model is available) and admit every pending request
    /// exactly once, in arrival order.
    fn sync_requests(&mut self, analytics: &mut Analytics) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        let features: Vec<Vec<f64>> = batch
            .iter()
            .map(|&i| self.window.request(i).features.clone())
            .collect();
        let model_available = self.classifier.available();
        let probabilities = self
            .classifier
            .predict(&features)
            .unwrap_or_else(|| vec![0.0; batch.len()]);

        for (&index, &p) in batch.iter().zip(probabilities.iter()) {
            self.window.request_mut(index).admit_probability = p;
            let request = self.window.request(index);
            let (oid, t, sz) = (request.object_id, request.timestamp, request.size);
            let result = self.cache.lookup_and_admit(oid, t, sz, p);
            analytics.record(
                result.hit,
                sz,
                model_available,
                result.hot_evicted_bytes,
                result.cold_evicted_bytes,
            );
        }
    }

    fn spawn_training(&mut self, window: RequestWindow) {
        let classifier = Arc::clone(&self.classifier);
        let hazard_mode = self.hazard_mode;
        let future_labeling = self.future_labeling;
        let seed = self.rng.gen::<u64>();
        self.training_thread = Some(std::thread::spawn(move || {
            let mut window = window;
            let mut rng = StdRng::seed_from_u64(seed);
            let (sampled, rate) = window.sample_objects(&mut rng);
            window.label_requests(&sampled, rate, hazard_mode, future_labeling, &mut rng);
            let (x, y) = window.training_rows(&sampled);
            classifier.ingest(&x, &y);
            classifier.train_and_publish();
        }));
    }

    fn join_training(&mut self) {
        if let Some(handle) = self.training_thread.take() {
            let _ = handle.join();
        }
    }

    /// Drain any partial batch and join the training worker; called once at
    /// the end of a replay round.
    pub fn finish(&mut self, analytics: &mut Analytics) {
        self.sync_requests(analytics);
        self.join_training();
    }
}
