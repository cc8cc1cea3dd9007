//! Bundler integration.
//!
//! This module implements everything that runs inside a bundler pass:
//! directive classification, chunk naming and tagging, and manifest
//! generation, plus the bundler seam itself.

pub mod bundler;
pub mod classifier;
pub mod events;
pub mod manifest_gen;
pub mod output;
pub mod process;

pub use bundler::{BundleOutput, BundleRequest, Bundler, PassPlugin};
pub use classifier::{ClassificationTable, DirectiveClassifier};
pub use events::BuildEvent;
pub use manifest_gen::ManifestGenerator;
pub use output::{ChunkTags, OutputMapper};
pub use process::ProcessBundler;
