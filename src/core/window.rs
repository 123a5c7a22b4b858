//! The sliding request window (C3): per-object and global arrival history,
//! sliding feature-vector construction, whole-object sampling, and
//! survival-analysis-based request labeling.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use super::hazard::{nelson_aalen, scott_bandwidth, smoothed_hazard, HazardMode};
use super::metadata::ObjectMetadata;

/// One admitted-or-not decision point. Requests live in the window's arena
/// (`RequestWindow::requests`) for the lifetime of the window; the per-object
/// and global "lists" named in the design are both realized as index
/// sequences into that arena rather than pointer-linked nodes, since nothing
/// is ever spliced out of a window before it is destroyed.
#[derive(Debug, Clone)]
pub struct Request {
    pub object_id: u64,
    pub timestamp: f64,
    pub size: u64,
    pub admit_probability: f64,
    pub label: u8,
    pub features: Vec<f64>,
}

/// Per-object bookkeeping for one window: first-seen size, arrival count,
/// the dense index assigned on first sight, and the arena indices of every
/// request this object contributed, in arrival order.
pub struct Object {
    pub id: u64,
    pub size: u64,
    pub requests_count: u64,
    pub idx: usize,
    pub request_indices: Vec<usize>,
}

/// Which instantaneous, non-history features are enabled, and the decay
/// factor for `DECAYED_FREQUENCY` when it is.
#[derive(Debug, Clone, Copy)]
pub struct FeatureConfig {
    pub features_length: usize,
    pub size: bool,
    pub frequency: bool,
    pub decayed_frequency: bool,
}

impl FeatureConfig {
    pub fn custom_count(&self) -> usize {
        self.size as usize + self.frequency as usize + self.decayed_frequency as usize
    }
}

pub struct LabeledRequest {
    pub index: usize,
    pub label: u8,
}

pub struct RequestWindow {
    size: Option<u64>,
    cache_size: u64,
    features: FeatureConfig,
    requests: Vec<Request>,
    objects: HashMap<u64, Object>,
    requests_count: u64,
    objects_total_size: u64,
}

impl RequestWindow {
    pub fn new(size: Option<u64>, cache_size: u64, features: FeatureConfig) -> Self {
        RequestWindow {
            size,
            cache_size,
            features,
            requests: Vec::new(),
            objects: HashMap::new(),
            requests_count: 0,
            objects_total_size: 0,
        }
    }

    pub fn requests_count(&self) -> u64 {
        self.requests_count
    }

    pub fn objects_total_size(&self) -> u64 {
        self.objects_total_size
    }

    pub fn request(&self, index: usize) -> &Request {
        &self.requests[index]
    }

    pub fn request_mut(&mut self, index: usize) -> &mut Request {
        &mut self.requests[index]
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Append `(oid, t, sz)`, updating C2 and building its feature vector.
    /// Returns the arena index of the new request.
    pub fn add(&mut self, metadata: &mut ObjectMetadata, oid: u64, t: f64, sz: u64) -> usize {
        metadata.seen(oid);

        let is_new_object = !self.objects.contains_key(&oid);
        if is_new_object {
            let idx = self.objects.len();
            self.objects.insert(
                oid,
                Object {
                    id: oid,
                    size: sz,
                    requests_count: 0,
                    idx,
                    request_indices: Vec::new(),
                },
            );
            self.objects_total_size += sz;
        }

        let prev_index = self.objects.get(&oid).and_then(|o| o.request_indices.last().copied());

        let f = self.features.features_length;
        let fc = self.features.custom_count();
        let mut features = if let Some(prev_idx) = prev_index {
            let prev = &self.requests[prev_idx];
            let mut next = vec![0.0; f];
            // Slide the history window left by one, then write the freshest gap.
            let history_len = f - fc;
            if history_len > 1 {
                next[0..history_len - 1].copy_from_slice(&prev.features[1..history_len]);
            }
            if history_len > 0 {
                next[history_len - 1] = t - prev.timestamp;
            }
            next
        } else {
            metadata.get_features(oid)
        };

        {
            let object = self.objects.get_mut(&oid).unwrap();
            object.requests_count += 1;
        }
        self.requests_count += 1;

        self.write_custom_features(&mut features, metadata, oid, sz);

        let index = self.requests.len();
        self.requests.push(Request {
            object_id: oid,
            timestamp: t,
            size: sz,
            admit_probability: 0.0,
            label: 0,
            features,
        });
        self.objects.get_mut(&oid).unwrap().request_indices.push(index);
        index
    }

    fn write_custom_features(
        &self,
        features: &mut [f64],
        metadata: &ObjectMetadata,
        oid: u64,
        sz: u64,
    ) {
        let f = features.len();
        // Lowest priority first: SIZE, then FREQUENCY, then DECAYED_FREQUENCY.
        // The first enabled feature lands at the rightmost slot (F-1).
        let object = &self.objects[&oid];
        let candidates: [(bool, f64); 3] = [
            (self.features.size, sz as f64),
            (
                self.features.frequency,
                object.requests_count as f64 / self.requests_count.max(1) as f64,
            ),
            (self.features.decayed_frequency, metadata.get_decayed_frequency(oid)),
        ];
        let mut slot = f;
        for (enabled, value) in candidates {
            if !enabled {
                continue;
            }
            slot -= 1;
            features[slot] = value;
        }
    }

    /// Whether this window has accumulated enough to trigger training.
    /// `weight` is `1 / learning_rate`, as computed by the coordinator.
    pub fn is_ready(&self, weight: f64) -> bool {
        if let Some(size) = self.size {
            return self.requests_count >= size;
        }
        if self.requests_count >= 10_000_000 {
            return true;
        }
        if weight <= 0.0 {
            return false;
        }
        self.requests_count >= 10_000
            && self.objects_total_size as f64 >= (1.0 / weight) * self.cache_size as f64
    }

    /// Seed the metadata store with every live object's latest features, so
    /// the next window can continue each object's sliding history.
    pub fn flush(&self, metadata: &mut ObjectMetadata) {
        for object in self.objects.values() {
            if let Some(&last) = object.request_indices.last() {
                metadata.update_features(object.id, &self.requests[last].features);
            }
        }
    }

    /// Shuffle-and-greedily-accept whole objects up to two hard caps, then
    /// collect the arena indices of every request belonging to an accepted
    /// object, in arrival order. Returns `(sampled indices, sample_rate)`.
    pub fn sample_objects(&self, rng: &mut impl Rng) -> (Vec<usize>, f64) {
        let mut oids: Vec<u64> = self.objects.keys().copied().collect();
        oids.shuffle(rng);

        let max_sampled_requests = self.requests_count; // MAX_SAMPLE_RATE = 1
        let hardware_concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as u64;
        let hard_cap = 10_000_000u64.saturating_mul(hardware_concurrency);

        let mut accepted: Vec<u64> = Vec::new();
        let mut sampled_requests_count: u64 = 0;
        let mut potential_requests_count: u64 = 0;

        for oid in oids {
            let object = &self.objects[&oid];
            let next_sampled = sampled_requests_count + object.requests_count;
            if next_sampled > max_sampled_requests {
                break;
            }
            let prospective_potential =
                (potential_requests_count + object.requests_count) * (accepted.len() as u64 + 1);
            if prospective_potential > hard_cap {
                break;
            }
            accepted.push(oid);
            sampled_requests_count = next_sampled;
            potential_requests_count += object.requests_count;
        }

        let accepted_size: u64 = accepted.iter().map(|oid| self.objects[oid].size).sum();
        let sample_rate = if self.objects_total_size == 0 {
            0.0
        } else {
            accepted_size as f64 / self.objects_total_size as f64
        };

        let accepted_set: std::collections::HashSet<u64> = accepted.into_iter().collect();
        let sampled_indices: Vec<usize> = (0..self.requests.len())
            .filter(|&i| accepted_set.contains(&self.requests[i].object_id))
            .collect();

        (sampled_indices, sample_rate)
    }

    /// Run Nelson-Aalen + Scott's bandwidth on every sampled object, then
    /// label each sampled request per the survival-budget rule, writing the
    /// result back into the window's own requests. Returns the labels
    /// assigned, for testing/inspection.
    pub fn label_requests(
        &mut self,
        sampled: &[usize],
        sample_rate: f64,
        hazard_mode: HazardMode,
        future_labeling: bool,
        rng: &mut impl Rng,
    ) -> Vec<LabeledRequest> {
        let budget = (self.cache_size as f64 * sample_rate).floor();

        let mut object_ids: Vec<u64> = sampled
            .iter()
            .map(|&i| self.requests[i].object_id)
            .collect();
        object_ids.sort_unstable();
        object_ids.dedup();

        let mut hazard_curves: HashMap<u64, (Vec<super::hazard::HazardStep>, f64)> =
            HashMap::new();
        for &oid in &object_ids {
            let object = &self.objects[&oid];
            let timestamps: Vec<f64> = object
                .request_indices
                .iter()
                .map(|&i| self.requests[i].timestamp)
                .collect();
            if timestamps.len() < 2 {
                hazard_curves.insert(oid, (Vec::new(), 0.0));
                continue;
            }
            let diffs: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
            let steps = nelson_aalen(&diffs, hazard_mode);
            let bandwidth = scott_bandwidth(&diffs);
            hazard_curves.insert(oid, (steps, bandwidth));
        }

        let mut last_seen: HashMap<u64, f64> = HashMap::new();
        let mut object_sizes: HashMap<u64, u64> =
            object_ids.iter().map(|&oid| (oid, self.objects[&oid].size)).collect();
        let _ = &mut object_sizes; // sizes are read-only after construction

        let mut labeled = Vec::with_capacity(sampled.len());
        for &index in sampled {
            let oid = self.requests[index].object_id;
            let t = self.requests[index].timestamp;

            let label = match last_seen.get(&oid) {
                None => 0,
                Some(&prev_t) => {
                    let (self_steps, self_bw) = &hazard_curves[&oid];
                    let h_self = smoothed_hazard(self_steps, t - prev_t, *self_bw);

                    let mut competitor_size = 0u64;
                    for (&other_oid, &other_last) in &last_seen {
                        if other_oid == oid {
                            continue;
                        }
                        let (other_steps, other_bw) = &hazard_curves[&other_oid];
                        let h_other = smoothed_hazard(other_steps, t - other_last, *other_bw);
                        if h_other >= h_self {
                            competitor_size += object_sizes[&other_oid];
                        }
                    }

                    let s = competitor_size as f64;
                    let r_size = self.requests[index].size as f64;
                    if s + r_size <= budget {
                        1
                    } else if s < budget {
                        let p_admit = (budget - s) / r_size;
                        u8::from(rng.gen::<f64>() < p_admit)
                    } else {
                        0
                    }
                }
            };

            self.requests[index].label = label;
            labeled.push(LabeledRequest { index, label });
            last_seen.insert(oid, t);
        }

        if future_labeling {
            self.apply_future_labeling(sampled);
        }

        labeled
    }

    /// Shift every sampled request's label to the label of its next
    /// intra-window arrival for the same object, wrapping the last request
    /// around to the first (the asymmetry is intentional).
    fn apply_future_labeling(&mut self, sampled: &[usize]) {
        let sampled_set: std::collections::HashSet<usize> = sampled.iter().copied().collect();
        let object_ids: Vec<u64> = self
            .objects
            .keys()
            .copied()
            .collect();
        for oid in object_ids {
            let chain: Vec<usize> = self.objects[&oid]
                .request_indices
                .iter()
                .copied()
                .filter(|i| sampled_set.contains(i))
                .collect();
            if chain.len() < 2 {
                continue;
            }
            let labels: Vec<u8> = chain.iter().map(|&i| self.requests[i].label).collect();
            for (pos, &index) in chain.iter().enumerate() {
                let next_label = labels[(pos + 1) % labels.len()];
                self.requests[index].label = next_label;
            }
        }
    }

    /// Build the `(features, label)` training matrix for the sampled subset.
    pub fn training_rows(&self, sampled: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::with_capacity(sampled.len());
        let mut y = Vec::with_capacity(sampled.len());
        for &i in sampled {
            x.push(self.requests[i].features.clone());
            y.push(self.requests[i].label as f64);
        }
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn features(fc_size: bool, fc_freq: bool, fc_decay: bool, f: usize) -> FeatureConfig {
        FeatureConfig {
            features_length: f,
            size: fc_size,
            frequency: fc_freq,
            decayed_frequency: fc_decay,
        }
    }

    #[test]
    fn feature_layout_shifts_history_and_appends_custom_tail() {
        let cfg = features(true, true, false, 4);
        let mut meta = ObjectMetadata::new(4, 0.9);
        let mut window = RequestWindow::new(None, 1000, cfg);

        meta.update_features(42, &[10.0, 20.0, 30.0, 40.0]);
        let first = window.add(&mut meta, 42, 3.0, 99);
        assert_eq!(window.request(first).features, vec![10.0, 20.0, 30.0, 40.0]);

        let second = window.add(&mut meta, 42, 10.0, 55);
        let got = &window.request(second).features;
        // history shifted left: [20.0, 7.0(new gap)], then SIZE, FREQUENCY tail
        assert_eq!(got[0], 20.0);
        assert_eq!(got[1], 7.0);
        assert_eq!(got[2], 55.0); // FREQUENCY at F-2 (higher priority than SIZE)
        assert_eq!(got[3], 55.0); // SIZE at F-1
    }

    #[test]
    fn window_is_ready_respects_explicit_size() {
        let cfg = features(true, false, false, 4);
        let window = RequestWindow::new(Some(3), 1000, cfg);
        assert!(!window.is_ready(1.0));
    }

    #[test]
    fn dynamic_readiness_requires_both_count_and_bytes() {
        let cfg = features(true, false, false, 4);
        let mut meta = ObjectMetadata::new(4, 0.0);
        let mut window = RequestWindow::new(None, 1_000_000, cfg);
        for i in 0..9_999u64 {
            window.add(&mut meta, i, i as f64, 1_000_000_000);
        }
        // below the requests_count floor even though bytes are enormous
        assert!(!window.is_ready(1.0 / 3.0));
    }

    #[test]
    fn label_budget_matches_tie_break_math() {
        // Two objects; second request of the low-hazard object should see
        // its competitor's size compared against a floored budget.
        let cfg = features(true, false, false, 2);
        let mut meta = ObjectMetadata::new(2, 0.0);
        let mut window = RequestWindow::new(Some(10), 300, cfg);

        window.add(&mut meta, 1, 0.0, 100);
        window.add(&mut meta, 2, 0.0, 100);
        window.add(&mut meta, 1, 1.0, 40);
        window.add(&mut meta, 2, 5.0, 60);

        let mut rng = StdRng::seed_from_u64(7);
        let (sampled, rate) = window.sample_objects(&mut rng);
        assert_eq!(sampled.len(), 4);
        let labeled = window.label_requests(&sampled, rate, HazardMode::Discrete, false, &mut rng);
        assert_eq!(labeled.len(), 4);
        // first arrival of every object is always unconditionally unlabeled-admit=0
        assert_eq!(window.request(sampled[0]).label, 0);
        assert_eq!(window.request(sampled[1]).label, 0);
    }

    #[test]
    fn future_labeling_shifts_to_next_arrival_with_wraparound() {
        let cfg = features(true, false, false, 2);
        let mut meta = ObjectMetadata::new(2, 0.0);
        let mut window = RequestWindow::new(Some(10), 1000, cfg);
        window.add(&mut meta, 1, 0.0, 10);
        window.add(&mut meta, 1, 1.0, 10);
        window.add(&mut meta, 1, 2.0, 10);

        let sampled = vec![0usize, 1, 2];
        window.request_mut(0).label = 1;
        window.request_mut(1).label = 0;
        window.request_mut(2).label = 1;
        window.apply_future_labeling(&sampled);
        assert_eq!(window.request(0).label, 0);
        assert_eq!(window.request(1).label, 1);
        assert_eq!(window.request(2).label, 1); // wraps to request 0's (pre-shift) label
    }
}
