//! Hazard-Rate cache simulator entry point: parse CLI/config, replay a
//! trace file `--rounds` times through a fresh coordinator each round,
//! reporting analytics as it goes.

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use hazard_cache_sim::cli::Cli;
use hazard_cache_sim::config::{self, Config, FileConfig};
use hazard_cache_sim::core::analytics::{Analytics, RunParams};
use hazard_cache_sim::core::classifier::ClassifierConfig;
use hazard_cache_sim::core::coordinator::{Coordinator, CoordinatorConfig};
use hazard_cache_sim::core::trace::TraceReader;
use hazard_cache_sim::core::tree_booster::TreeBoosterBackend;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let file_config = match config::resolve_config_path(&cli.config) {
        Some(path) if path.exists() => match config::load_file_config(&path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("{} {e:#}", "error:".red().bold());
                return ExitCode::FAILURE;
            }
        },
        _ => FileConfig::default(),
    };

    let config = match Config::resolve(&cli, &file_config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    if config.verbose {
        log_args(&cli, &config);
    }

    for round in 1..=config.rounds {
        if config.verbose {
            println!("{}", format!("Simulate Round {round}").cyan().bold());
        }
        if let Err(e) = run_round(round, &cli, &config) {
            eprintln!("{} {e:#}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn run_round(round: u32, cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let reader = TraceReader::open(&cli.file_path)?;

    let backend = TreeBoosterBackend::new(&classifier_config(config));
    let mut coordinator = Coordinator::new(
        backend,
        CoordinatorConfig {
            cache_size: config.cache_size,
            hot_lb: config.hot_lb,
            cold_lb: config.cold_lb,
            evict_hot_for_cold: config.evict_hot_for_cold,
            window_size: config.window_size,
            learning_rate: config.learning_rate,
            features: config.features,
            decay: config.decay,
            hazard_mode: config.hazard_mode,
            future_labeling: config.future_labeling,
            concurrency: config.concurrency,
            classifier: classifier_config(config),
            seed: 0x5EED_0000 ^ round as u64,
        },
    );

    let mut analytics = Analytics::new(
        RunParams {
            key: cli.file_path.display().to_string(),
            cache_size: config.cache_size,
            hot_lb: config.hot_lb,
            cold_lb: config.cold_lb,
            evict_hot_for_cold: config.evict_hot_for_cold,
            window_size: config.window_size,
            learning_rate: config.learning_rate,
            features_length: config.features.features_length,
            feature_size: config.features.size,
            feature_frequency: config.features.frequency,
            feature_decayed_frequency: config.features.decayed_frequency,
            hazard_bandwidth: config.hazard_bandwidth,
            hazard_discrete: matches!(config.hazard_mode, hazard_cache_sim::core::hazard::HazardMode::Discrete),
            future_labeling: config.future_labeling,
            one_time_training: config.one_time_training,
            max_boost_rounds: config.max_boost_rounds,
            report_interval: config.report_interval,
        },
        config.verbose,
        config.log_file.clone(),
    )?;

    let mut processed: u64 = 0;
    for request in reader {
        let request = request?;
        coordinator.process_request(
            &mut analytics,
            request.timestamp,
            request.object_id,
            request.size,
        );
        processed += 1;
        analytics.maybe_report(processed)?;
    }
    coordinator.finish(&mut analytics);
    analytics.close()?;

    Ok(())
}

fn classifier_config(config: &Config) -> ClassifierConfig {
    ClassifierConfig {
        features_length: config.features.features_length,
        learning_rate: 0.1,
        max_boost_rounds: config.max_boost_rounds,
        one_time_training: config.one_time_training,
        train_budget_bytes: 1_000_000 * (config.features.features_length as u64 + 1) * 8,
    }
}

fn log_args(cli: &Cli, config: &Config) {
    println!("{}", "resolved configuration:".cyan());
    println!("  file_path: {}", cli.file_path.display());
    println!("  cache_size: {}", config.cache_size);
    println!("  hot_lb: {}", config.hot_lb);
    println!("  cold_lb: {}", config.cold_lb);
    println!("  evict_hot_for_cold: {}", config.evict_hot_for_cold);
    println!(
        "  window_size: {}",
        config
            .window_size
            .map(|w| w.to_string())
            .unwrap_or_else(|| "dynamic".to_string())
    );
    println!("  learning_rate: {}", config.learning_rate);
    println!("  features_length: {}", config.features.features_length);
    println!(
        "  features: size={} frequency={} decayed_frequency={} (alpha={})",
        config.features.size, config.features.frequency, config.features.decayed_frequency, config.decay
    );
    println!("  hazard_bandwidth: {}", config.hazard_bandwidth);
    println!("  hazard_mode: {:?}", config.hazard_mode);
    println!("  future_labeling: {}", config.future_labeling);
    println!("  one_time_training: {}", config.one_time_training);
    println!("  max_boost_rounds: {}", config.max_boost_rounds);
    println!("  report_interval: {}", config.report_interval);
    println!("  rounds: {}", config.rounds);
    println!("  concurrency: {}", config.concurrency);
}
