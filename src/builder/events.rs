//! Build event types for JSON output.
//!
//! These events are emitted when using `--message-format=json`, one JSON
//! object per line.
//!
//! # Event Types
//!
//! - `pass-started`: A bundler pass is about to run
//! - `pass-finished`: A bundler pass produced validated output
//! - `manifest-written`: A reference manifest was written to disk
//! - `diagnostic`: A warning or error message
//! - `build-finished`: Build completed (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::pass::{ManifestKind, PassKind};

/// A build event emitted during the build process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// A pass is about to invoke the bundler.
    #[serde(rename = "pass-started")]
    PassStarted {
        pass: PassKind,
        /// Number of entries in the pass input
        inputs: usize,
    },

    /// A pass finished and its output was validated.
    #[serde(rename = "pass-finished")]
    PassFinished {
        pass: PassKind,
        /// Number of emitted chunks
        chunks: usize,
        /// Number of manifest references produced by the pass
        #[serde(skip_serializing_if = "Option::is_none")]
        references: Option<usize>,
        duration_ms: u64,
    },

    /// A manifest file was written.
    #[serde(rename = "manifest-written")]
    ManifestWritten {
        kind: ManifestKind,
        path: PathBuf,
        references: usize,
    },

    /// A generic diagnostic message.
    #[serde(rename = "diagnostic")]
    Diagnostic {
        /// Severity level ("error", "warning", "note")
        level: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pass: Option<PassKind>,
    },

    /// Build completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        duration_ms: u64,
        /// Number of passes that completed
        passes: usize,
    },
}

impl BuildEvent {
    /// Create a pass started event.
    pub fn pass_started(pass: PassKind, inputs: usize) -> Self {
        BuildEvent::PassStarted { pass, inputs }
    }

    /// Create a warning event.
    pub fn warning(pass: Option<PassKind>, message: impl Into<String>) -> Self {
        BuildEvent::Diagnostic {
            level: "warning".to_string(),
            message: message.into(),
            pass,
        }
    }

    /// Create an error event.
    pub fn error(pass: Option<PassKind>, message: impl Into<String>) -> Self {
        BuildEvent::Diagnostic {
            level: "error".to_string(),
            message: message.into(),
            pass,
        }
    }

    /// Create a build finished event.
    pub fn finished(success: bool, duration_ms: u64, passes: usize) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            passes,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
