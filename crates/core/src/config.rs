use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::error::{Result, TelemetryError};

pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:8100/api/v1/public";

/// Tuning knobs for the scheduler and the delivery executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Buffer length that triggers an immediate flush.
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    /// Attempts made after the first one before a batch is requeued.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Hard cap on buffered events.
    pub buffer_capacity: usize,
    pub collector_url: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            flush_interval_ms: 10_000,
            max_retries: 2,
            retry_base_delay_ms: 200,
            buffer_capacity: 100,
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Load from `LERVI_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            batch_size: try_load(&lookup, "LERVI_BATCH_SIZE", defaults.batch_size),
            flush_interval_ms: try_load(
                &lookup,
                "LERVI_FLUSH_INTERVAL_MS",
                defaults.flush_interval_ms,
            ),
            max_retries: try_load(&lookup, "LERVI_MAX_RETRIES", defaults.max_retries),
            retry_base_delay_ms: try_load(
                &lookup,
                "LERVI_RETRY_DELAY_MS",
                defaults.retry_base_delay_ms,
            ),
            buffer_capacity: try_load(&lookup, "LERVI_BUFFER_CAPACITY", defaults.buffer_capacity),
            collector_url: lookup("LERVI_COLLECTOR_URL").unwrap_or(defaults.collector_url),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TelemetryError::InvalidConfig(
                "batch_size must be > 0".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(TelemetryError::InvalidConfig(
                "buffer_capacity must be > 0".to_string(),
            ));
        }
        if self.batch_size > self.buffer_capacity {
            return Err(TelemetryError::InvalidConfig(format!(
                "batch_size={} exceeds buffer_capacity={}",
                self.batch_size, self.buffer_capacity
            )));
        }
        if self.flush_interval_ms == 0 {
            return Err(TelemetryError::InvalidConfig(
                "flush_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}
