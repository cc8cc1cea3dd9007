//! Build error taxonomy.
//!
//! Every variant is fatal for the invocation. Builds are deterministic, so
//! nothing here is retried.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::boundary::{Boundary, ReferenceId};
use crate::core::entry::EntryCategory;
use crate::core::pass::PassKind;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised while orchestrating a build.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error("entries file not found: {}", path.display())]
    #[diagnostic(
        code(flightdeck::preflight::entries_not_found),
        help("check `paths.entries` in Flightdeck.toml")
    )]
    EntriesNotFound { path: PathBuf },

    #[error(
        "{category} entry `{name}` is already registered for `{}`, cannot register `{}`",
        existing.display(),
        requested.display()
    )]
    #[diagnostic(code(flightdeck::entries::duplicate))]
    DuplicateEntry {
        category: EntryCategory,
        name: String,
        existing: PathBuf,
        requested: PathBuf,
    },

    #[error(
        "entry `{name}` is declared by both {first} (`{}`) and {second} (`{}`)",
        first_path.display(),
        second_path.display()
    )]
    #[diagnostic(
        code(flightdeck::entries::conflict),
        help("rename one of them or declare the module under `[entries.custom]` to override")
    )]
    ConflictingEntry {
        name: String,
        first: EntryCategory,
        first_path: PathBuf,
        second: EntryCategory,
        second_path: PathBuf,
    },

    #[error("{pass}: {boundary} module `{module}` does not appear in any emitted chunk")]
    #[diagnostic(code(flightdeck::manifest::unresolved_reference))]
    UnresolvedReference {
        pass: PassKind,
        module: String,
        boundary: Boundary,
    },

    #[error("{pass}: bundler `{bundler}` failed")]
    #[diagnostic(code(flightdeck::pass::execution))]
    PassExecution {
        pass: PassKind,
        bundler: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{pass}: unexpected bundler output: {reason}")]
    #[diagnostic(code(flightdeck::pass::output_shape))]
    UnexpectedOutputShape { pass: PassKind, reason: String },

    #[error("invalid pass order: {reason}")]
    #[diagnostic(code(flightdeck::config::pass_order))]
    InvalidPassOrder { reason: String },

    #[error(
        "reference `{id}` denotes `{first_module}` in the {first_pass} pass but `{second_module}` in the {second_pass} pass"
    )]
    #[diagnostic(code(flightdeck::manifest::collision))]
    ManifestCollision {
        id: ReferenceId,
        first_pass: PassKind,
        first_module: String,
        second_pass: PassKind,
        second_module: String,
    },
}

impl BuildError {
    /// The pass this error belongs to, if it happened inside one.
    pub fn pass(&self) -> Option<PassKind> {
        match self {
            BuildError::UnresolvedReference { pass, .. }
            | BuildError::PassExecution { pass, .. }
            | BuildError::UnexpectedOutputShape { pass, .. } => Some(*pass),
            BuildError::ManifestCollision { second_pass, .. } => Some(*second_pass),
            _ => None,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::EntriesNotFound { path } => Diagnostic::error("entries file not found")
                .with_location(path)
                .with_context("the entries module is required before the first pass starts")
                .with_suggestion(suggestions::ENTRIES_NOT_FOUND),

            BuildError::DuplicateEntry { .. } | BuildError::InvalidPassOrder { .. } => {
                Diagnostic::error(self.to_string())
            }

            BuildError::ConflictingEntry { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(suggestions::CONFLICTING_ENTRY),

            BuildError::UnresolvedReference { module, .. } => {
                Diagnostic::error(self.to_string())
                    .with_location(module)
                    .with_context("a reference to this module would fail to load at runtime")
                    .with_suggestion(suggestions::UNRESOLVED_REFERENCE)
            }

            BuildError::PassExecution { source, .. } => Diagnostic::error(self.to_string())
                .with_context(format!("{:#}", source))
                .with_suggestion(suggestions::PASS_FAILED),

            BuildError::UnexpectedOutputShape { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(suggestions::PASS_FAILED),

            BuildError::ManifestCollision { .. } => Diagnostic::error(self.to_string())
                .with_context("reference ids must denote one module across all passes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_execution_keeps_cause() {
        let err = BuildError::PassExecution {
            pass: PassKind::Client,
            bundler: "process".to_string(),
            source: anyhow::anyhow!("Could not resolve './Missing'"),
        };

        assert_eq!(err.pass(), Some(PassKind::Client));
        assert_eq!(err.to_string(), "client: bundler `process` failed");

        let rendered = err.to_diagnostic().format(false);
        assert!(rendered.contains("Could not resolve './Missing'"));
    }

    #[test]
    fn test_preflight_errors_have_no_pass() {
        let err = BuildError::EntriesNotFound {
            path: PathBuf::from("/app/src/entries.ts"),
        };
        assert_eq!(err.pass(), None);
        assert!(err.to_diagnostic().format(false).contains("--> /app/src/entries.ts"));
    }
}
