//! Memory-bounded worker pool.
//!
//! Each placement worker needs a fixed amount of memory that depends on the
//! domain (the bacterial reference tree is far larger than the archaeal
//! one), so the pool is sized by memory as well as by CPU count:
//!
//! ```text
//! workers = max(1, min(cpus, floor(available_gb / domain_min_gb)))
//! ```
//!
//! The single worker kept when memory is below the floor is reported with
//! the shortfall; it may run out of memory.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PipelineConfig;

const MEMINFO: &str = "/proc/meminfo";

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// Number of workers that fit in `available_gb`; one when memory is unknown
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn worker_count(cpus: usize, available_gb: Option<f64>, min_memory_gb: f64) -> usize {
    let Some(available) = available_gb else {
        return 1;
    };
    if !(min_memory_gb > 0.0) {
        return cpus.max(1);
    }
    let by_memory = (available / min_memory_gb).floor().max(0.0) as usize;
    cpus.min(by_memory).max(1)
}

/// GB missing for even one worker, when known memory is below the floor
#[must_use]
pub fn memory_shortfall_gb(available_gb: Option<f64>, min_memory_gb: f64) -> Option<f64> {
    available_gb
        .filter(|&available| available < min_memory_gb)
        .map(|available| min_memory_gb - available)
}

/// `MemAvailable` from `/proc/meminfo`, in GB
#[must_use]
pub fn available_memory_gb() -> Option<f64> {
    let path = Path::new(MEMINFO);
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| parse_meminfo(&text))
}

#[allow(clippy::cast_precision_loss)]
fn parse_meminfo(text: &str) -> Option<f64> {
    let line = text.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb as f64 / (1024.0 * 1024.0))
}

/// A rayon pool whose size respects a domain's memory floor
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// Pool with exactly `workers` threads (at least one)
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Build` if the threads cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("redtax-worker-{i}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    /// Pool sized for a domain whose workers each need `min_memory_gb`.
    ///
    /// Memory comes from the configuration, else from the system; CPUs are
    /// capped by `max_workers` when set.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Build` if the threads cannot be spawned.
    pub fn for_domain(min_memory_gb: f64, config: &PipelineConfig) -> Result<Self, PoolError> {
        let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let cpus = config.max_workers.map_or(cpus, |max| cpus.min(max.max(1)));
        let available = config.available_memory_gb.or_else(available_memory_gb);
        match (available, memory_shortfall_gb(available, min_memory_gb)) {
            (None, _) => warn!("Available memory unknown; using a single worker"),
            (Some(gb), Some(short)) => warn!(
                "{gb:.1} GB available but a worker needs {min_memory_gb:.1} GB \
                 ({short:.1} GB short); using a single worker, which may run out of memory"
            ),
            _ => {}
        }
        let workers = worker_count(cpus, available, min_memory_gb);
        debug!("Worker pool: {workers} workers ({cpus} CPUs, {available:?} GB, {min_memory_gb} GB each)");
        Self::new(workers)
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` inside the pool; rayon parallel iterators used by `op` are
    /// limited to this pool's threads
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}
