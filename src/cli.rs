use std::path::PathBuf;

use clap::Parser;

fn parse_bool_flag(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(format!("expected true/false, got {other:?}")),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "hrsim",
    about = "Hazard-Rate admission/eviction cache policy simulator",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Trace file: one `<timestamp> <object_id> <size>` request per line.
    #[arg(long = "file-path", value_name = "PATH")]
    pub file_path: PathBuf,

    /// Optional TOML config file; CLI flags override values found here.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Replay the trace this many times (fresh simulator state each round).
    #[arg(long = "rounds", default_value_t = 1)]
    pub rounds: u32,

    /// Prediction batch size.
    #[arg(long = "concurrency", default_value_t = 100)]
    pub concurrency: u64,

    #[arg(long = "verbose", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub verbose: Option<bool>,

    #[arg(long = "cache-size")]
    pub cache_size: Option<u64>,

    #[arg(long = "hot-lower-bound")]
    pub hot_lower_bound: Option<f64>,

    #[arg(long = "cold-lower-bound")]
    pub cold_lower_bound: Option<f64>,

    #[arg(long = "evict-hot-for-cold", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub evict_hot_for_cold: Option<bool>,

    /// Fixed window length; omit for the dynamic readiness rule.
    #[arg(long = "window-size")]
    pub window_size: Option<u64>,

    /// Governs the dynamic window-readiness weight (`weight = 1/learning_rate`).
    #[arg(long = "learning-rate")]
    pub learning_rate: Option<f64>,

    #[arg(long = "features-length")]
    pub features_length: Option<usize>,

    #[arg(long = "feature-size", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub feature_size: Option<bool>,

    #[arg(long = "feature-frequency", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub feature_frequency: Option<bool>,

    /// Enables DECAYED_FREQUENCY and sets its decay alpha (default 0.9 when passed bare).
    #[arg(long = "feature-decayed-frequency", num_args = 0..=1, default_missing_value = "0.9")]
    pub feature_decayed_frequency: Option<f64>,

    /// Informational; effective smoothing uses each object's own Scott bandwidth.
    #[arg(long = "hazard-bandwidth")]
    pub hazard_bandwidth: Option<f64>,

    #[arg(long = "hazard-discrete", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub hazard_discrete: Option<bool>,

    #[arg(long = "future-labeling", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub future_labeling: Option<bool>,

    #[arg(long = "one-time-training", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub one_time_training: Option<bool>,

    #[arg(long = "max-boost-rounds")]
    pub max_boost_rounds: Option<u32>,

    /// Emit one analytics round every N requests.
    #[arg(long = "report-interval")]
    pub report_interval: Option<u64>,

    /// Append CSV analytics rows to this file.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Append every labeled request to `requests.log` for offline inspection.
    #[arg(long = "log-requests", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool_flag)]
    pub log_requests: Option<bool>,
}
