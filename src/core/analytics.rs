//! Per-request counters, periodic CSV rows, and a console summary (C9).
//!
//! Bytes/requests served before the classifier ever produced a prediction
//! are tracked separately and excluded from the cumulative miss ratio,
//! since a model-less warm-up period isn't representative of steady-state
//! policy behavior.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use super::error::SimError;

/// The resolved run configuration, echoed into every CSV row so rows from
/// different invocations stay self-describing when appended to one file.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub key: String,
    pub cache_size: u64,
    pub hot_lb: f64,
    pub cold_lb: f64,
    pub evict_hot_for_cold: bool,
    pub window_size: Option<u64>,
    pub learning_rate: f64,
    pub features_length: usize,
    pub feature_size: bool,
    pub feature_frequency: bool,
    pub feature_decayed_frequency: bool,
    pub hazard_bandwidth: f64,
    pub hazard_discrete: bool,
    pub future_labeling: bool,
    pub one_time_training: bool,
    pub max_boost_rounds: u32,
    pub report_interval: u64,
}

#[derive(Default)]
struct Counters {
    requests: u64,
    misses: u64,
    bytes: u64,
    miss_bytes: u64,
}

impl Counters {
    fn record(&mut self, hit: bool, size: u64) {
        self.requests += 1;
        self.bytes += size;
        if !hit {
            self.misses += 1;
            self.miss_bytes += size;
        }
    }

    fn miss_pct(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            100.0 * self.misses as f64 / self.requests as f64
        }
    }

    fn miss_bytes_pct(&self) -> f64 {
        if self.bytes == 0 {
            0.0
        } else {
            100.0 * self.miss_bytes as f64 / self.bytes as f64
        }
    }
}

pub struct Analytics {
    params: RunParams,
    verbose: bool,
    round: u64,
    interval: Counters,
    cumulative: Counters,
    warmup: Counters,
    cumulative_started: bool,
    hot_evictions: u64,
    cold_evictions: u64,
    csv: Option<std::fs::File>,
    csv_header_written: bool,
}

impl Analytics {
    pub fn new(params: RunParams, verbose: bool, log_file: Option<PathBuf>) -> Result<Self> {
        let (csv, csv_header_written) = match log_file {
            Some(path) => {
                let existed = path.exists();
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening analytics log at {}", path.display()))?;
                (Some(file), existed)
            }
            None => (None, true),
        };
        Ok(Analytics {
            params,
            verbose,
            round: 0,
            interval: Counters::default(),
            cumulative: Counters::default(),
            warmup: Counters::default(),
            cumulative_started: false,
            hot_evictions: 0,
            cold_evictions: 0,
            csv,
            csv_header_written,
        })
    }

    pub fn record(
        &mut self,
        hit: bool,
        size: u64,
        model_available: bool,
        hot_evictions: u64,
        cold_evictions: u64,
    ) {
        self.interval.record(hit, size);
        if model_available {
            self.cumulative_started = true;
        }
        if self.cumulative_started {
            self.cumulative.record(hit, size);
        } else {
            self.warmup.record(hit, size);
        }
        self.hot_evictions += hot_evictions;
        self.cold_evictions += cold_evictions;
    }

    pub fn maybe_report(&mut self, requests_processed: u64) -> Result<()> {
        if self.params.report_interval == 0 {
            return Ok(());
        }
        if requests_processed % self.params.report_interval == 0 {
            self.report()?;
        }
        Ok(())
    }

    pub fn report(&mut self) -> Result<()> {
        self.round += 1;
        if self.verbose {
            let rss = memory_usage_mb();
            println!(
                "{} round={} miss%={:.3} bytes-miss%={:.3} cum-miss%={:.3} cum-bytes-miss%={:.3} hot-evict={} cold-evict={} rss={:.1}MB",
                "analytics".cyan(),
                self.round,
                self.interval.miss_pct(),
                self.interval.miss_bytes_pct(),
                self.cumulative.miss_pct(),
                self.cumulative.miss_bytes_pct(),
                self.hot_evictions,
                self.cold_evictions,
                rss
            );
        }
        self.write_csv_row()?;
        self.interval = Counters::default();
        Ok(())
    }

    fn write_csv_row(&mut self) -> Result<()> {
        let Some(file) = self.csv.as_mut() else {
            return Ok(());
        };
        if !self.csv_header_written {
            writeln!(
                file,
                "key,cache_size,hot_lb,cold_lb,evict_hot_for_cold,window_size,learning_rate,\
features_length,feature_size,feature_frequency,feature_decayed_frequency,hazard_bandwidth,\
hazard_discrete,future_labeling,one_time_training,max_boost_rounds,report_interval,round,\
miss_bytes_pct,miss_pct,cumulative_miss_bytes_pct,cumulative_miss_pct"
            )
            .map_err(SimError::from)?;
            self.csv_header_written = true;
        }
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{:.6},{:.6},{:.6},{:.6}",
            self.params.key,
            self.params.cache_size,
            self.params.hot_lb,
            self.params.cold_lb,
            self.params.evict_hot_for_cold,
            self.params
                .window_size
                .map(|w| w.to_string())
                .unwrap_or_else(|| "dynamic".to_string()),
            self.params.learning_rate,
            self.params.features_length,
            self.params.feature_size,
            self.params.feature_frequency,
            self.params.feature_decayed_frequency,
            self.params.hazard_bandwidth,
            self.params.hazard_discrete,
            self.params.future_labeling,
            self.params.one_time_training,
            self.params.max_boost_rounds,
            self.params.report_interval,
            self.round,
            self.interval.miss_bytes_pct(),
            self.interval.miss_pct(),
            self.cumulative.miss_bytes_pct(),
            self.cumulative.miss_pct(),
        )
        .map_err(SimError::from)?;
        Ok(())
    }

    /// Flush any partial interval and append the trailing all-comma
    /// separator row that marks the end of a run in the CSV file.
    pub fn close(&mut self) -> Result<()> {
        self.report()?;
        if let Some(file) = self.csv.as_mut() {
            writeln!(file, "{}", ",".repeat(21)).map_err(SimError::from)?;
        }
        Ok(())
    }
}

/// Best-effort process RSS in megabytes. Never fatal: returns `0.0` when the
/// probe isn't available (non-Linux, sandboxed, etc).
pub fn memory_usage_mb() -> f64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    let kb: u64 = rest
                        .trim()
                        .trim_end_matches(" kB")
                        .trim()
                        .parse()
                        .unwrap_or(0);
                    return kb as f64 / 1024.0;
                }
            }
        }
    }
    0.0
}
