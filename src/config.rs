//! Runtime configuration.
//!
//! The library reads no environment variables and owns no defaults scattered
//! through modules. Whoever drives the pipeline (the CLI, a server, a test)
//! builds one `Config` at the edge and passes it in.

use std::time::Duration;

#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    pub rate: RateConfig,
    pub classifier: ClassifierConfig,
    pub concurrency: ConcurrencyConfig,
}

/// Token bucket parameters shared by every classifier call.
#[derive(Clone, Copy, Debug)]
pub struct RateConfig {
    /// Refill rate in tokens per second.
    pub tokens_per_second: f64,
    /// Maximum burst size.
    pub burst: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            tokens_per_second: 6.0,
            burst: 6.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ClassifierConfig {
    /// Attempts per atom before falling back to the error classification.
    pub retries: u32,
    /// Sleep between attempt `i` and `i + 1` is `backoff_factor * 2^i`.
    pub backoff_factor: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_factor: Duration::from_millis(100),
        }
    }
}

/// Upper bounds on the worker pools. The effective pool size is
/// `min(work_items, bound)`.
#[derive(Clone, Copy, Debug)]
pub struct ConcurrencyConfig {
    pub chapter_workers: usize,
    pub subsection_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            chapter_workers: 4,
            subsection_workers: 4,
        }
    }
}
