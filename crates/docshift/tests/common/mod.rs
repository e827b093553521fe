//! Shared test utilities for docshift integration tests.
//!
//! This module provides:
//! - `TestHarness` for running a pipeline against temporary directories
//! - Test converters that fail, stall or panic on demand

pub mod converters;
pub mod harness;

pub use converters::*;
pub use harness::{TestHarness, WAIT};
