//! High-level operations.
//!
//! This module contains the implementation of flightdeck commands.

pub mod driver;
pub mod flightdeck_build;

pub use driver::{AggregatedOutput, BuildDriver, DriverState};
pub use flightdeck_build::{build, load_build_info, BuildInfo, BuildOptions, BuildResult};
