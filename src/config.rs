use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;
use crate::core::error::SimError;
use crate::core::hazard::HazardMode;
use crate::core::window::FeatureConfig;

pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|h| h.join(".hazard_cache_sim").join("config.toml"))
}

pub fn resolve_config_path(cli_path: &Option<PathBuf>) -> Option<PathBuf> {
    if let Some(p) = cli_path {
        return Some(p.clone());
    }
    default_config_path()
}

/// Mirror of the CLI flags a TOML config file may supply; every field is
/// optional so a partial file only overrides what it mentions.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub cache_size: Option<u64>,
    pub hot_lower_bound: Option<f64>,
    pub cold_lower_bound: Option<f64>,
    pub evict_hot_for_cold: Option<bool>,
    pub window_size: Option<u64>,
    pub learning_rate: Option<f64>,
    pub features_length: Option<usize>,
    pub feature_size: Option<bool>,
    pub feature_frequency: Option<bool>,
    pub feature_decayed_frequency: Option<f64>,
    pub hazard_bandwidth: Option<f64>,
    pub hazard_discrete: Option<bool>,
    pub future_labeling: Option<bool>,
    pub one_time_training: Option<bool>,
    pub max_boost_rounds: Option<u32>,
    pub report_interval: Option<u64>,
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

/// The fully resolved, validated run configuration: CLI flags override a
/// config file, which overrides these defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_size: u64,
    pub hot_lb: f64,
    pub cold_lb: f64,
    pub evict_hot_for_cold: bool,
    pub window_size: Option<u64>,
    pub learning_rate: f64,
    pub features: FeatureConfig,
    pub decay: f64,
    pub hazard_bandwidth: f64,
    pub hazard_mode: HazardMode,
    pub future_labeling: bool,
    pub one_time_training: bool,
    pub max_boost_rounds: u32,
    pub report_interval: u64,
    pub concurrency: u64,
    pub rounds: u32,
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
    pub log_requests: bool,
}

impl Config {
    pub fn resolve(cli: &Cli, file: &FileConfig) -> Result<Config> {
        let cache_size = cli.cache_size.or(file.cache_size).unwrap_or(3_941_722);
        let hot_lb = cli.hot_lower_bound.or(file.hot_lower_bound).unwrap_or(0.5);
        let cold_lb = cli.cold_lower_bound.or(file.cold_lower_bound).unwrap_or(0.0);
        let evict_hot_for_cold = cli
            .evict_hot_for_cold
            .or(file.evict_hot_for_cold)
            .unwrap_or(true);
        let window_size = cli.window_size.or(file.window_size);
        let learning_rate = cli.learning_rate.or(file.learning_rate).unwrap_or(3.0);
        let features_length = cli.features_length.or(file.features_length).unwrap_or(32);
        let feature_size = cli.feature_size.or(file.feature_size).unwrap_or(true);
        let feature_frequency = cli
            .feature_frequency
            .or(file.feature_frequency)
            .unwrap_or(true);
        let decay_alpha = cli
            .feature_decayed_frequency
            .or(file.feature_decayed_frequency);
        let feature_decayed_frequency = decay_alpha.is_some();
        let hazard_bandwidth = cli.hazard_bandwidth.or(file.hazard_bandwidth).unwrap_or(3.0);
        let hazard_discrete = cli.hazard_discrete.or(file.hazard_discrete).unwrap_or(true);
        let future_labeling = cli.future_labeling.or(file.future_labeling).unwrap_or(true);
        let one_time_training = cli
            .one_time_training
            .or(file.one_time_training)
            .unwrap_or(false);
        let max_boost_rounds = cli
            .max_boost_rounds
            .or(file.max_boost_rounds)
            .unwrap_or(100);
        let report_interval = cli
            .report_interval
            .or(file.report_interval)
            .unwrap_or(1_000_000);

        if cache_size == 0 {
            return Err(SimError::config("cache size must be > 0").into());
        }
        if !(0.0..=1.0).contains(&hot_lb) {
            return Err(SimError::config("hot-lower-bound must be in [0,1]").into());
        }
        if !(0.0..=1.0).contains(&cold_lb) {
            return Err(SimError::config("cold-lower-bound must be in [0,1]").into());
        }
        if hot_lb < cold_lb {
            return Err(SimError::config("hot-lower-bound must be >= cold-lower-bound").into());
        }
        let custom_count =
            feature_size as usize + feature_frequency as usize + feature_decayed_frequency as usize;
        if features_length < custom_count {
            return Err(SimError::config(
                "features-length is too small to hold the enabled custom features",
            )
            .into());
        }

        Ok(Config {
            cache_size,
            hot_lb,
            cold_lb,
            evict_hot_for_cold,
            window_size,
            learning_rate,
            features: FeatureConfig {
                features_length,
                size: feature_size,
                frequency: feature_frequency,
                decayed_frequency: feature_decayed_frequency,
            },
            decay: decay_alpha.unwrap_or(0.9),
            hazard_bandwidth,
            hazard_mode: if hazard_discrete {
                HazardMode::Discrete
            } else {
                HazardMode::Continuous
            },
            future_labeling,
            one_time_training,
            max_boost_rounds,
            report_interval,
            concurrency: cli.concurrency.max(1),
            rounds: cli.rounds.max(1),
            verbose: cli.verbose.unwrap_or(false),
            log_file: cli.log_file.clone(),
            log_requests: cli.log_requests.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["hrsim"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn rejects_zero_cache_size() {
        let c = cli(&["--file-path", "t.txt", "--cache-size", "0"]);
        assert!(Config::resolve(&c, &FileConfig::default()).is_err());
    }

    #[test]
    fn rejects_bound_outside_unit_interval() {
        let c = cli(&["--file-path", "t.txt", "--hot-lower-bound", "1.5"]);
        assert!(Config::resolve(&c, &FileConfig::default()).is_err());
    }

    #[test]
    fn rejects_hot_below_cold() {
        let c = cli(&[
            "--file-path",
            "t.txt",
            "--hot-lower-bound",
            "0.2",
            "--cold-lower-bound",
            "0.5",
        ]);
        assert!(Config::resolve(&c, &FileConfig::default()).is_err());
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let c = cli(&["--file-path", "t.txt"]);
        let resolved = Config::resolve(&c, &FileConfig::default()).unwrap();
        assert_eq!(resolved.cache_size, 3_941_722);
        assert_eq!(resolved.hot_lb, 0.5);
        assert_eq!(resolved.cold_lb, 0.0);
        assert!(resolved.evict_hot_for_cold);
        assert_eq!(resolved.learning_rate, 3.0);
    }

    #[test]
    fn cli_overrides_file_config() {
        let c = cli(&["--file-path", "t.txt", "--cache-size", "500"]);
        let file = FileConfig {
            cache_size: Some(999),
            ..Default::default()
        };
        let resolved = Config::resolve(&c, &file).unwrap();
        assert_eq!(resolved.cache_size, 500);
    }
}
