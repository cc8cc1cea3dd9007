//! Build passes and the manifests they produce.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::boundary::Boundary;
use crate::core::entry::EntryCategory;

/// One bundler invocation in a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassKind {
    /// Discovery-only pre-pass. Output is not written.
    Analyze,
    /// Bundle loaded by the component-rendering worker.
    ServerReference,
    /// Browser bundle.
    Client,
    /// Bundle used by the streaming HTML renderer.
    StreamingSsr,
}

/// Environment a pass bundles for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildTarget {
    Browser,
    Node,
}

impl PassKind {
    /// Pass order used when the boundary split is enabled.
    pub const DEFAULT_ORDER: [PassKind; 3] = [
        PassKind::ServerReference,
        PassKind::Client,
        PassKind::StreamingSsr,
    ];

    /// Pass order used when the boundary split is disabled.
    pub const PLAIN_ORDER: [PassKind; 2] = [PassKind::Client, PassKind::StreamingSsr];

    pub fn as_str(self) -> &'static str {
        match self {
            PassKind::Analyze => "analyze",
            PassKind::ServerReference => "server-reference",
            PassKind::Client => "client",
            PassKind::StreamingSsr => "streaming-ssr",
        }
    }

    pub fn target(self) -> BuildTarget {
        match self {
            PassKind::Client => BuildTarget::Browser,
            _ => BuildTarget::Node,
        }
    }

    /// Whether the bundler should build in SSR mode.
    pub fn is_ssr(self) -> bool {
        self.target() == BuildTarget::Node
    }

    /// Whether this pass needs the framework entries module.
    pub fn needs_entries_file(self) -> bool {
        matches!(self, PassKind::Analyze | PassKind::ServerReference)
    }

    /// Whether the bundler should write files for this pass.
    pub fn writes_output(self) -> bool {
        self != PassKind::Analyze
    }

    /// Boundary assumed for modules without a directive.
    pub fn default_boundary(self) -> Boundary {
        match self {
            PassKind::Client => Boundary::Client,
            _ => Boundary::Server,
        }
    }

    /// The manifest produced by this pass, if any.
    pub fn manifest_kind(self) -> Option<ManifestKind> {
        match self {
            PassKind::Analyze => None,
            PassKind::ServerReference => Some(ManifestKind::Server),
            PassKind::Client => Some(ManifestKind::Client),
            PassKind::StreamingSsr => Some(ManifestKind::Ssr),
        }
    }

    /// Entry categories fed to this pass.
    pub fn entry_categories(self) -> &'static [EntryCategory] {
        match self {
            PassKind::Analyze | PassKind::ServerReference => &EntryCategory::ALL,
            PassKind::Client => &[
                EntryCategory::Framework,
                EntryCategory::ClientBoundary,
                EntryCategory::Custom,
            ],
            PassKind::StreamingSsr => &[EntryCategory::Framework, EntryCategory::ClientBoundary],
        }
    }

    /// Directory name under the dist root.
    pub fn out_dir_name(self) -> &'static str {
        match self {
            PassKind::Analyze => "analyze",
            PassKind::ServerReference => "rsc",
            PassKind::Client => "client",
            PassKind::StreamingSsr => "server",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyze" => Ok(PassKind::Analyze),
            "server-reference" | "rsc" => Ok(PassKind::ServerReference),
            "client" => Ok(PassKind::Client),
            "streaming-ssr" | "ssr" => Ok(PassKind::StreamingSsr),
            _ => Err(format!(
                "unknown pass `{}`; expected analyze, server-reference, client or streaming-ssr",
                s
            )),
        }
    }
}

/// The reference manifests written by a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestKind {
    /// Client references emitted by server rendering, loaded by the browser.
    Client,
    /// Server references emitted by client code, loaded by the worker.
    Server,
    /// Client references resolved inside the streaming SSR bundle.
    Ssr,
}

impl ManifestKind {
    /// Boundary whose modules populate this manifest.
    pub fn boundary(self) -> Boundary {
        match self {
            ManifestKind::Client | ManifestKind::Ssr => Boundary::Client,
            ManifestKind::Server => Boundary::Server,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ManifestKind::Client => "client-manifest.json",
            ManifestKind::Server => "server-manifest.json",
            ManifestKind::Ssr => "ssr-manifest.json",
        }
    }

    pub const ALL: [ManifestKind; 3] = [ManifestKind::Client, ManifestKind::Server, ManifestKind::Ssr];
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestKind::Client => write!(f, "client manifest"),
            ManifestKind::Server => write!(f, "server manifest"),
            ManifestKind::Ssr => write!(f, "ssr manifest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_settings() {
        assert_eq!(PassKind::Client.target(), BuildTarget::Browser);
        assert!(PassKind::ServerReference.is_ssr());
        assert!(PassKind::StreamingSsr.is_ssr());
        assert!(!PassKind::Analyze.writes_output());
        assert_eq!(PassKind::ServerReference.manifest_kind(), Some(ManifestKind::Server));
        assert_eq!(PassKind::Analyze.manifest_kind(), None);
    }

    #[test]
    fn test_pass_from_str() {
        assert_eq!("server-reference".parse::<PassKind>(), Ok(PassKind::ServerReference));
        assert_eq!("ssr".parse::<PassKind>(), Ok(PassKind::StreamingSsr));
        assert!("rollup".parse::<PassKind>().is_err());
    }

    #[test]
    fn test_manifest_boundaries() {
        assert_eq!(ManifestKind::Client.boundary(), Boundary::Client);
        assert_eq!(ManifestKind::Ssr.boundary(), Boundary::Client);
        assert_eq!(ManifestKind::Server.boundary(), Boundary::Server);
    }
}
