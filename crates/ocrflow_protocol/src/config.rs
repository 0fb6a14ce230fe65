//! Runtime configuration (spec.md §6, SPEC_FULL.md §3.1).
//!
//! `Config::from_env` reads every recognized key via `std::env::var`,
//! applying spec.md's defaults and clamping obviously-unusable values (e.g.
//! concurrency of 0) back to a sane minimum rather than failing startup.
//! `RuntimeConfig` is the subset `POST /config` is allowed to patch; it is
//! kept as its own small struct so the mutex-guarded shared state (see the
//! orchestrator's `shared` module) only ever exposes exactly the whitelisted
//! fields to the observability server.

use crate::defaults;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Full runtime configuration, assembled once at startup from the
/// environment (spec.md §6's table).
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub prep_url: String,
    pub ocr_url: String,
    pub poll_interval_ms: u64,
    pub prep_concurrency: usize,
    pub ocr_concurrency: usize,
    pub max_jobs_in_flight: usize,
    pub max_attempts_prep: u32,
    pub max_attempts_ocr: u32,
    pub ocr_lang: String,
    pub job_timeout_seconds: u64,
    pub keep_work_dir_days: u64,
    pub min_pdf_size_bytes: u64,
    pub disk_free_factor: f64,
    pub max_input_size_mb: u64,
    /// (AMBIENT) HTTP observability bind address.
    pub control_bind_addr: String,
    /// (AMBIENT) janitor sweep period.
    pub janitor_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_dir: env_path("DATA_DIR", defaults::DEFAULT_DATA_DIR),
            prep_url: env::var("PREP_URL").unwrap_or_else(|_| "http://127.0.0.1:9001".to_string()),
            ocr_url: env::var("OCR_URL").unwrap_or_else(|_| "http://127.0.0.1:9002".to_string()),
            poll_interval_ms: env_u64("POLL_INTERVAL_MS", defaults::DEFAULT_POLL_INTERVAL_MS, 1),
            prep_concurrency: env_usize(
                "PREP_CONCURRENCY",
                defaults::DEFAULT_PREP_CONCURRENCY,
                1,
            ),
            ocr_concurrency: env_usize("OCR_CONCURRENCY", defaults::DEFAULT_OCR_CONCURRENCY, 1),
            max_jobs_in_flight: env_usize(
                "MAX_JOBS_IN_FLIGHT",
                defaults::DEFAULT_MAX_JOBS_IN_FLIGHT,
                1,
            ),
            max_attempts_prep: env_u32(
                "MAX_ATTEMPTS_PREP",
                defaults::DEFAULT_MAX_ATTEMPTS_PREP,
                1,
            ),
            max_attempts_ocr: env_u32("MAX_ATTEMPTS_OCR", defaults::DEFAULT_MAX_ATTEMPTS_OCR, 1),
            ocr_lang: env::var("OCR_LANG")
                .unwrap_or_else(|_| defaults::DEFAULT_OCR_LANG.to_string()),
            job_timeout_seconds: env_u64(
                "JOB_TIMEOUT_SECONDS",
                defaults::DEFAULT_JOB_TIMEOUT_SECONDS,
                0,
            ),
            keep_work_dir_days: env_u64(
                "KEEP_WORK_DIR_DAYS",
                defaults::DEFAULT_KEEP_WORK_DIR_DAYS,
                0,
            ),
            min_pdf_size_bytes: env_u64(
                "MIN_PDF_SIZE_BYTES",
                defaults::DEFAULT_MIN_PDF_SIZE_BYTES,
                0,
            ),
            disk_free_factor: env_f64("DISK_FREE_FACTOR", defaults::DEFAULT_DISK_FREE_FACTOR, 0.0),
            max_input_size_mb: env_u64(
                "MAX_INPUT_SIZE_MB",
                defaults::DEFAULT_MAX_INPUT_SIZE_MB,
                1,
            ),
            control_bind_addr: env::var("CONTROL_BIND_ADDR")
                .unwrap_or_else(|_| defaults::DEFAULT_CONTROL_BIND_ADDR.to_string()),
            janitor_interval_secs: env_u64(
                "JANITOR_INTERVAL_SECS",
                defaults::DEFAULT_JANITOR_INTERVAL_SECS,
                1,
            ),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    pub fn max_input_size_bytes(&self) -> u64 {
        self.max_input_size_mb * defaults::BYTES_PER_MB
    }

    /// The whitelisted slice `POST /config` is allowed to mutate.
    pub fn runtime_slice(&self) -> RuntimeConfig {
        RuntimeConfig {
            prep_concurrency: self.prep_concurrency,
            ocr_concurrency: self.ocr_concurrency,
            job_timeout_s: self.job_timeout_seconds,
            default_ocr_lang: self.ocr_lang.clone(),
        }
    }

    pub fn apply_runtime(&mut self, patch: &RuntimeConfig) {
        self.prep_concurrency = patch.prep_concurrency;
        self.ocr_concurrency = patch.ocr_concurrency;
        self.job_timeout_seconds = patch.job_timeout_s;
        self.ocr_lang = patch.default_ocr_lang.clone();
    }
}

/// The four keys `POST /config` may patch (spec.md §4.9), each independently
/// optional in the request body but always fully populated once applied.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub prep_concurrency: usize,
    pub ocr_concurrency: usize,
    pub job_timeout_s: u64,
    pub default_ocr_lang: String,
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_u64(key: &str, default: u64, min: u64) -> u64 {
    match env::var(key) {
        Err(_) => default,
        Ok(raw) => match raw.parse::<u64>() {
            Ok(v) if v >= min => v,
            Ok(v) => {
                tracing::warn!(key, value = v, min, "value below minimum, clamping");
                min
            }
            Err(_) => {
                tracing::warn!(key, raw, "unparsable value, using default");
                default
            }
        },
    }
}

fn env_u32(key: &str, default: u32, min: u32) -> u32 {
    match env::var(key) {
        Err(_) => default,
        Ok(raw) => match raw.parse::<u32>() {
            Ok(v) if v >= min => v,
            Ok(v) => {
                tracing::warn!(key, value = v, min, "value below minimum, clamping");
                min
            }
            Err(_) => {
                tracing::warn!(key, raw, "unparsable value, using default");
                default
            }
        },
    }
}

fn env_usize(key: &str, default: usize, min: usize) -> usize {
    match env::var(key) {
        Err(_) => default,
        Ok(raw) => match raw.parse::<usize>() {
            Ok(v) if v >= min => v,
            Ok(v) => {
                tracing::warn!(key, value = v, min, "value below minimum, clamping");
                min
            }
            Err(_) => {
                tracing::warn!(key, raw, "unparsable value, using default");
                default
            }
        },
    }
}

fn env_f64(key: &str, default: f64, min: f64) -> f64 {
    match env::var(key) {
        Err(_) => default,
        Ok(raw) => match raw.parse::<f64>() {
            Ok(v) if v >= min => v,
            Ok(v) => {
                tracing::warn!(key, value = v, min, "value below minimum, clamping");
                min
            }
            Err(_) => {
                tracing::warn!(key, raw, "unparsable value, using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec_table() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in [
            "DATA_DIR",
            "POLL_INTERVAL_MS",
            "PREP_CONCURRENCY",
            "OCR_CONCURRENCY",
            "MAX_JOBS_IN_FLIGHT",
            "MAX_ATTEMPTS_PREP",
            "MAX_ATTEMPTS_OCR",
            "JOB_TIMEOUT_SECONDS",
            "KEEP_WORK_DIR_DAYS",
            "MIN_PDF_SIZE_BYTES",
            "DISK_FREE_FACTOR",
            "MAX_INPUT_SIZE_MB",
        ] {
            env::remove_var(key);
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.data_dir, PathBuf::from("/data"));
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.prep_concurrency, 2);
        assert_eq!(cfg.ocr_concurrency, 1);
        assert_eq!(cfg.max_jobs_in_flight, 3);
        assert_eq!(cfg.max_attempts_prep, 3);
        assert_eq!(cfg.max_attempts_ocr, 3);
        assert_eq!(cfg.keep_work_dir_days, 7);
    }

    #[test]
    fn unparsable_value_falls_back_to_default_with_warning() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("PREP_CONCURRENCY", "not-a-number");
        let cfg = Config::from_env();
        assert_eq!(cfg.prep_concurrency, defaults::DEFAULT_PREP_CONCURRENCY);
        env::remove_var("PREP_CONCURRENCY");
    }

    #[test]
    fn zero_concurrency_clamps_to_one() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("OCR_CONCURRENCY", "0");
        let cfg = Config::from_env();
        assert_eq!(cfg.ocr_concurrency, 1);
        env::remove_var("OCR_CONCURRENCY");
    }

    #[test]
    fn runtime_slice_round_trips_through_apply() {
        let mut cfg = Config::from_env();
        let mut patch = cfg.runtime_slice();
        patch.prep_concurrency = 9;
        patch.default_ocr_lang = "fra".to_string();
        cfg.apply_runtime(&patch);
        assert_eq!(cfg.prep_concurrency, 9);
        assert_eq!(cfg.ocr_lang, "fra");
    }
}
