//! # Runtime
//!
//! Builds the [Tokio](https://tokio.rs) runtime a weave run executes on.
//!
//! The pipeline is I/O and CPU bound in roughly equal parts: containers are
//! read, decoded and copied on the blocking pool, while the async workers only
//! coordinate. The blocking pool is therefore sized to the configured worker
//! count and the async side stays small.
//!
//! There is no process-wide runtime: each invocation builds its own and drops
//! it when the build finishes.
//!
//! ## Example
//!
//! ```rust
//! use weave_runtime::{RuntimeConfig, build_runtime_with_config};
//!
//! let runtime = build_runtime_with_config(&RuntimeConfig::for_workers(4))?;
//! let answer = runtime.block_on(async { 42 });
//! assert_eq!(answer, 42);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub use anyhow::Result;

use anyhow::anyhow;
use std::num::NonZeroUsize;
use std::thread::available_parallelism;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

const DEFAULT_WORKERS: usize = 4;
/// Async workers only coordinate tasks; two are plenty.
const MAX_ASYNC_WORKERS: usize = 2;
/// Upper bound on blocking threads regardless of configuration.
const MAX_BLOCKING_THREADS: usize = 512;
/// The default stack size for threads (2 `MiB`).
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(10);
const DEFAULT_THREAD_NAME: &str = "weave-worker";

fn detected_workers() -> usize {
    available_parallelism().map_or(DEFAULT_WORKERS, NonZeroUsize::get)
}

/// Configuration for the Tokio runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub async_workers: usize,
    pub blocking_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::for_workers(detected_workers())
    }
}

impl RuntimeConfig {
    /// Sizes the runtime for `workers` containers processed at once.
    #[must_use]
    pub fn for_workers(workers: usize) -> Self {
        let workers = workers.clamp(1, MAX_BLOCKING_THREADS);
        Self {
            async_workers: workers.min(MAX_ASYNC_WORKERS),
            blocking_threads: workers,
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }

    #[must_use = "Customize the stack size for worker threads"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use = "Customize the thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.thread_name = if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name };
        self
    }

    fn normalized(&self) -> Self {
        let blocking_threads = self.blocking_threads.clamp(1, MAX_BLOCKING_THREADS);
        Self {
            async_workers: self.async_workers.clamp(1, blocking_threads.max(1)),
            blocking_threads,
            stack_size: self.stack_size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE),
            thread_name: self.thread_name.clone(),
            thread_keep_alive: self.thread_keep_alive,
        }
    }
}

/// Creates a multi-threaded runtime from `config`.
///
/// Out-of-range values are clamped rather than rejected.
///
/// # Errors
///
/// Returns an [`anyhow::Error`] if the OS refuses to create the runtime's threads.
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime> {
    let config = config.normalized();
    debug!(config = ?config, "Building tokio runtime");

    let mut builder = Builder::new_multi_thread();
    builder
        .worker_threads(config.async_workers)
        .max_blocking_threads(config.blocking_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive);

    builder.build().map_err(|e| anyhow!("Failed to initialize runtime: {e}"))
}

/// Runtime for `workers` concurrent containers.
///
/// # Errors
///
/// See [`build_runtime_with_config`].
pub fn build_pipeline_runtime(workers: usize) -> Result<Runtime> {
    build_runtime_with_config(&RuntimeConfig::for_workers(workers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_clamped() {
        let config = RuntimeConfig::for_workers(0);
        assert_eq!(config.blocking_threads, 1);
        assert_eq!(config.async_workers, 1);

        let config = RuntimeConfig::for_workers(2000);
        assert_eq!(config.blocking_threads, MAX_BLOCKING_THREADS);
        assert_eq!(config.async_workers, MAX_ASYNC_WORKERS);
    }

    #[test]
    fn stack_size_is_clamped() {
        let config = RuntimeConfig::default().with_stack_size(100);
        assert_eq!(config.stack_size, MIN_STACK_SIZE);

        let config = RuntimeConfig::default().with_stack_size(100 * 1024 * 1024);
        assert_eq!(config.stack_size, MAX_STACK_SIZE);
    }

    #[test]
    fn blank_thread_name_falls_back() {
        let config = RuntimeConfig::default().with_thread_name("  ");
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn runtime_runs_blocking_work() {
        let runtime = build_pipeline_runtime(2).unwrap();
        let value = runtime.block_on(async {
            tokio::task::spawn_blocking(|| 6 * 7).await.unwrap()
        });
        assert_eq!(value, 42);
    }
}
