//! Processing modes and the fork-join row executor

use std::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing mode for algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Invalid thread count: {0}")]
    InvalidThreadCount(usize),

    #[cfg(feature = "parallel")]
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Fork-join executor over index ranges.
///
/// `ParallelWith(n)` owns a dedicated pool that lives as long as the
/// executor; `Parallel` uses the global Rayon pool. Every call joins all of
/// its work before returning.
pub struct Executor {
    mode: ProcessingMode,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl Executor {
    pub fn new(mode: ProcessingMode) -> Result<Self, ExecutorError> {
        if let ProcessingMode::ParallelWith(0) = mode {
            return Err(ExecutorError::InvalidThreadCount(0));
        }

        #[cfg(feature = "parallel")]
        {
            let pool = match mode {
                ProcessingMode::ParallelWith(threads) => Some(
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(threads)
                        .build()?,
                ),
                _ => None,
            };
            return Ok(Self { mode, pool });
        }

        #[cfg(not(feature = "parallel"))]
        return Ok(Self { mode });
    }

    /// Single-threaded executor.
    pub fn sequential() -> Self {
        Self {
            mode: ProcessingMode::Sequential,
            #[cfg(feature = "parallel")]
            pool: None,
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Map `f` over `range`, results in index order.
    pub fn par_map<T, F>(&self, range: Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            return match (&self.mode, &self.pool) {
                (ProcessingMode::Sequential, _) => range.map(f).collect(),
                (_, Some(pool)) => pool.install(|| range.into_par_iter().map(f).collect()),
                (_, None) => range.into_par_iter().map(f).collect(),
            };
        }

        #[cfg(not(feature = "parallel"))]
        return range.map(f).collect();
    }

    /// Threads the executor may use.
    pub fn threads(&self) -> usize {
        match self.mode {
            ProcessingMode::Sequential => 1,
            ProcessingMode::ParallelWith(n) => n,
            ProcessingMode::Parallel => num_cpus(),
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("mode", &self.mode).finish()
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    #[cfg(feature = "parallel")]
    return rayon::current_num_threads();

    #[cfg(not(feature = "parallel"))]
    return 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_par_map_preserves_order() {
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(3),
        ] {
            let exec = Executor::new(mode).unwrap();
            let out = exec.par_map(0..100, |i| i * i);
            assert_eq!(out, (0..100).map(|i| i * i).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            Executor::new(ProcessingMode::ParallelWith(0)),
            Err(ExecutorError::InvalidThreadCount(0))
        ));
    }

    #[test]
    fn test_sequential_threads() {
        assert_eq!(Executor::sequential().threads(), 1);
    }
}
