//! Core data structures for flightdeck.
//!
//! This module contains the foundational types used throughout flightdeck:
//! - Boundaries and reference ids
//! - Entries and the entry registry
//! - Build passes and chunk descriptors
//! - Reference manifests

pub mod boundary;
pub mod chunk;
pub mod entry;
pub mod manifest;
pub mod pass;

pub use boundary::{Boundary, ReferenceId};
pub use chunk::{BuildPassResult, ChunkDescriptor, PassManifest};
pub use entry::{Entry, EntryCategory, EntryRegistry};
pub use manifest::{BoundaryReference, Manifest};
pub use pass::{BuildTarget, ManifestKind, PassKind};
