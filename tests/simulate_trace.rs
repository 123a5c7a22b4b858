use std::io::Write;

use hazard_cache_sim::core::analytics::{Analytics, RunParams};
use hazard_cache_sim::core::cache::Cache;
use hazard_cache_sim::core::classifier::{ClassifierBackend, ClassifierConfig, ModelHandle};
use hazard_cache_sim::core::coordinator::{Coordinator, CoordinatorConfig};
use hazard_cache_sim::core::hazard::HazardMode;
use hazard_cache_sim::core::trace::TraceReader;
use hazard_cache_sim::core::window::FeatureConfig;

struct ConstHandle(f64);
impl ModelHandle for ConstHandle {}

struct ConstBackend;
impl ClassifierBackend for ConstBackend {
    type Handle = ConstHandle;
    fn train(&self, _x: &[Vec<f64>], y: &[f64]) -> ConstHandle {
        let mean = if y.is_empty() {
            0.0
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        };
        ConstHandle(mean)
    }
    fn predict(&self, handle: &ConstHandle, x: &[Vec<f64>]) -> Vec<f64> {
        vec![handle.0; x.len()]
    }
}

fn run_params() -> RunParams {
    RunParams {
        key: "trace".into(),
        cache_size: 200,
        hot_lb: 0.5,
        cold_lb: 0.0,
        evict_hot_for_cold: true,
        window_size: Some(20),
        learning_rate: 3.0,
        features_length: 4,
        feature_size: true,
        feature_frequency: true,
        feature_decayed_frequency: false,
        hazard_bandwidth: 3.0,
        hazard_discrete: true,
        future_labeling: true,
        one_time_training: false,
        max_boost_rounds: 10,
        report_interval: 1_000_000,
    }
}

#[test]
fn replays_a_small_trace_without_panicking() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..40u64 {
        writeln!(file, "{} {} {}", i, i % 5, 20).unwrap();
    }

    let reader = TraceReader::open(file.path()).unwrap();
    let mut coordinator = Coordinator::new(
        ConstBackend,
        CoordinatorConfig {
            cache_size: 200,
            hot_lb: 0.5,
            cold_lb: 0.0,
            evict_hot_for_cold: true,
            window_size: Some(20),
            learning_rate: 3.0,
            features: FeatureConfig {
                features_length: 4,
                size: true,
                frequency: true,
                decayed_frequency: false,
            },
            decay: 0.0,
            hazard_mode: HazardMode::Discrete,
            future_labeling: true,
            concurrency: 5,
            classifier: ClassifierConfig {
                features_length: 4,
                learning_rate: 0.1,
                max_boost_rounds: 10,
                one_time_training: false,
                train_budget_bytes: 100_000 * 5 * 8,
            },
            seed: 42,
        },
    );

    let mut analytics = Analytics::new(run_params(), false, None).unwrap();
    for request in reader {
        let request = request.unwrap();
        coordinator.process_request(
            &mut analytics,
            request.timestamp,
            request.object_id,
            request.size,
        );
    }
    coordinator.finish(&mut analytics);
    analytics.close().unwrap();

    assert!(coordinator.model_available());
}

#[test]
fn malformed_trace_line_surfaces_as_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "0 1 10").unwrap();
    writeln!(file, "not-a-line").unwrap();

    let mut reader = TraceReader::open(file.path()).unwrap();
    assert!(reader.next().unwrap().is_ok());
    assert!(reader.next().unwrap().is_err());
}

#[test]
fn cache_never_exceeds_capacity_across_a_burst() {
    let mut cache = Cache::new(500, 0.5, 0.0, true);
    for i in 0..100u64 {
        let result = cache.lookup_and_admit(i % 7, i as f64, 80, if i % 2 == 0 { 0.9 } else { 0.1 });
        let _ = result;
        assert!(cache.current_size() <= 500);
    }
}
