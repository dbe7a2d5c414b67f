//! # Terraclass Parallel
//!
//! Row-parallel execution for raster algorithms.
//!
//! This crate provides:
//! - `ProcessingMode`: how an algorithm may use threads
//! - `Executor`: fork-join map over row indices, backed by Rayon when the
//!   `parallel` feature is enabled and sequential otherwise

pub mod strategy;

pub use strategy::{num_cpus, Executor, ExecutorError, ProcessingMode};
