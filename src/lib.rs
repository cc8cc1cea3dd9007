//! Flightdeck - a multi-pass build orchestrator for Server Components
//!
//! This crate drives an external bundler through ordered build passes,
//! classifies modules by their `"use client"` / `"use server"` directives
//! and emits the manifests a runtime uses to resolve boundary-crossing
//! references to chunk files.

pub mod builder;
pub mod core;
pub mod errors;
pub mod ops;
pub mod util;

/// Test utilities for flightdeck unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides an in-memory bundler and on-disk project
/// fixtures.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    boundary::{Boundary, ReferenceId},
    entry::{Entry, EntryCategory, EntryRegistry},
    manifest::{BoundaryReference, Manifest},
    pass::{ManifestKind, PassKind},
};
pub use errors::BuildError;
pub use ops::{AggregatedOutput, BuildDriver};
pub use util::config::ProjectConfig;
