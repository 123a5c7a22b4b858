//! Nelson-Aalen cumulative hazard estimation and Epanechnikov-kernel smoothing
//! over a single object's inter-arrival durations within a request window.

/// One step of the cumulative hazard estimator: a duration value and the
/// hazard increment observed there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardStep {
    pub u: f64,
    pub delta_h: f64,
}

/// Whether ties at a duration value are treated as a pooled count (`e_j/r_j`)
/// or unrolled one at a time (`sum 1/(r_j-k)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardMode {
    Discrete,
    Continuous,
}

/// Fit a Nelson-Aalen cumulative hazard curve from a set of inter-arrival
/// durations belonging to one object. The largest duration is the censored
/// observation (it runs out at the window boundary, not at a recurrence).
///
/// Returns one step per distinct duration value, prepended with the `(0, 0)`
/// sentinel required so that `smoothed_hazard` can be queried at any `x >= 0`.
pub fn nelson_aalen(durations: &[f64], mode: HazardMode) -> Vec<HazardStep> {
    let mut steps = vec![HazardStep { u: 0.0, delta_h: 0.0 }];
    if durations.is_empty() {
        return steps;
    }

    let mut sorted: Vec<f64> = durations.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut risk = sorted.len() as f64;
    let mut i = 0;
    while i < sorted.len() {
        let u = sorted[i];
        let mut j = i;
        while j < sorted.len() && sorted[j] == u {
            j += 1;
        }
        let tie_count = (j - i) as f64;
        // The censored observation is always the single largest duration: it
        // runs out at the window end rather than recurring.
        let is_censor_group = j == sorted.len();
        let (events, censors) = if is_censor_group {
            (tie_count - 1.0, 1.0)
        } else {
            (tie_count, 0.0)
        };

        let delta_h = if events == 0.0 {
            0.0
        } else {
            match mode {
                HazardMode::Discrete => events / risk,
                HazardMode::Continuous => {
                    let mut sum = 0.0;
                    for k in 0..events as u64 {
                        sum += 1.0 / (risk - k as f64);
                    }
                    sum
                }
            }
        };

        steps.push(HazardStep { u, delta_h });
        risk -= events + censors;
        i = j;
    }

    steps
}

/// Scott's rule bandwidth for kernel-smoothing a sample of durations.
pub fn scott_bandwidth(durations: &[f64]) -> f64 {
    let n = durations.len();
    if n < 2 {
        return 0.0;
    }
    let mean = durations.iter().sum::<f64>() / n as f64;
    let variance =
        durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    let sigma = variance.sqrt();
    3.49 * sigma * (n as f64).powf(-1.0 / 3.0)
}

/// Epanechnikov-kernel-smoothed hazard at `x`, given a bandwidth `b`. Steps
/// are assumed sorted ascending by `u` (as produced by `nelson_aalen`).
///
/// Zero outside `[x-b, x+b]`; the candidate window is found with a binary
/// search so the cost is `O(log n + k)` rather than a full scan.
pub fn smoothed_hazard(steps: &[HazardStep], x: f64, b: f64) -> f64 {
    if b <= 0.0 || steps.is_empty() {
        return 0.0;
    }
    let lo = x - b;
    let hi = x + b;

    let start = steps.partition_point(|s| s.u < lo);
    let mut total = 0.0;
    for step in &steps[start..] {
        if step.u > hi {
            break;
        }
        let z = (x - step.u) / b;
        total += (3.0 / (4.0 * b)) * (1.0 - z * z) * step.delta_h;
    }
    total
}
