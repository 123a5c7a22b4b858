//! Process-wide per-object metadata that outlives any single request window:
//! decayed-frequency counters and the last feature vector emitted for an
//! object, so a new window can seed a returning object's history.

use std::collections::HashMap;

/// Sentinel written into a freshly created feature slot; distinguishes
/// "never observed" history entries from a real zero inter-arrival gap.
pub const FEATURE_SENTINEL: f64 = f64::INFINITY;

struct Entry {
    frequency: f64,
    last_features: Vec<f64>,
}

/// Per-object decayed-frequency counters and cached feature vectors.
pub struct ObjectMetadata {
    decay: f64,
    global_decayed_count: f64,
    features_length: usize,
    entries: HashMap<u64, Entry>,
}

impl ObjectMetadata {
    /// `decay` is the per-arrival decay factor `alpha`; `0.0` disables decay
    /// (every arrival counts equally, forever).
    pub fn new(features_length: usize, decay: f64) -> Self {
        ObjectMetadata {
            decay,
            global_decayed_count: 0.0,
            features_length,
            entries: HashMap::new(),
        }
    }

    /// Record an arrival of `oid`, creating its entry on first sight.
    pub fn seen(&mut self, oid: u64) {
        self.global_decayed_count = self.global_decayed_count * self.decay + 1.0;
        let features_length = self.features_length;
        let entry = self.entries.entry(oid).or_insert_with(|| Entry {
            frequency: 0.0,
            last_features: vec![FEATURE_SENTINEL; features_length],
        });
        entry.frequency = entry.frequency * self.decay + 1.0;
    }

    /// `f/D`, or `0.0` if nothing has been observed yet.
    pub fn get_decayed_frequency(&self, oid: u64) -> f64 {
        if self.global_decayed_count == 0.0 {
            return 0.0;
        }
        self.entries
            .get(&oid)
            .map(|e| e.frequency / self.global_decayed_count)
            .unwrap_or(0.0)
    }

    /// The cached feature vector from the last window this object appeared
    /// in, or a vector of sentinels if this object is new to the process.
    pub fn get_features(&self, oid: u64) -> Vec<f64> {
        self.entries
            .get(&oid)
            .map(|e| e.last_features.clone())
            .unwrap_or_else(|| vec![FEATURE_SENTINEL; self.features_length])
    }

    /// Cache `features` as the most recent vector emitted for `oid`.
    pub fn update_features(&mut self, oid: u64, features: &[f64]) {
        let features_length = self.features_length;
        let entry = self.entries.entry(oid).or_insert_with(|| Entry {
            frequency: 0.0,
            last_features: vec![FEATURE_SENTINEL; features_length],
        });
        entry.last_features.clear();
        entry.last_features.extend_from_slice(features);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_object_has_zero_frequency_and_sentinel_features() {
        let meta = ObjectMetadata::new(4, 0.9);
        assert_eq!(meta.get_decayed_frequency(7), 0.0);
        assert_eq!(meta.get_features(7), vec![FEATURE_SENTINEL; 4]);
    }

    #[test]
    fn seen_updates_decayed_frequency_against_global_count() {
        let mut meta = ObjectMetadata::new(2, 0.0);
        meta.seen(1);
        meta.seen(1);
        meta.seen(2);
        // no decay: object 1 seen twice out of three global arrivals
        assert!((meta.get_decayed_frequency(1) - 2.0 / 3.0).abs() < 1e-12);
        assert!((meta.get_decayed_frequency(2) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn update_features_is_cached_across_calls() {
        let mut meta = ObjectMetadata::new(3, 0.9);
        meta.update_features(5, &[1.0, 2.0, 3.0]);
        assert_eq!(meta.get_features(5), vec![1.0, 2.0, 3.0]);
    }
}
