//! Boundary sides and the ids of references that cross them.

use std::borrow::Borrow;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::fs::{relative_path, to_slash};

/// Directive marking a module as rendered on the client.
pub const CLIENT_DIRECTIVE: &str = "use client";

/// Directive marking a module as callable server code.
pub const SERVER_DIRECTIVE: &str = "use server";

/// The side of the server/client split a module belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Boundary {
    Client,
    Server,
}

impl Boundary {
    /// The directive string that marks this side.
    pub fn directive(self) -> &'static str {
        match self {
            Boundary::Client => CLIENT_DIRECTIVE,
            Boundary::Server => SERVER_DIRECTIVE,
        }
    }

    /// Map a directive prologue string to a boundary.
    pub fn from_directive(directive: &str) -> Option<Self> {
        match directive {
            CLIENT_DIRECTIVE => Some(Boundary::Client),
            SERVER_DIRECTIVE => Some(Boundary::Server),
            _ => None,
        }
    }

    /// The directive as an emitted statement, e.g. `"use client";`.
    pub fn banner(self) -> String {
        format!("\"{}\";", self.directive())
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Client => write!(f, "client"),
            Boundary::Server => write!(f, "server"),
        }
    }
}

/// Stable identifier of one export of a boundary module.
///
/// Formatted as `<module key>#<export>` where the module key is the module
/// path relative to the project root with `/` separators. The id only depends
/// on where the module lives and what it exports, so references issued by a
/// running server stay resolvable after a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    /// Create an id from a module key and export name.
    pub fn new(module_key: &str, export: &str) -> Self {
        ReferenceId(format!("{}#{}", module_key, export))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The module part of the id.
    pub fn module_key(&self) -> &str {
        self.0.rsplit_once('#').map_or(&self.0, |(module, _)| module)
    }

    /// The export part of the id.
    pub fn export_name(&self) -> Option<&str> {
        self.0.rsplit_once('#').map(|(_, export)| export)
    }
}

impl Borrow<str> for ReferenceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceId {
    fn from(s: &str) -> Self {
        ReferenceId(s.to_string())
    }
}

/// Derive the module key used in reference ids from a bundler module id.
///
/// Module ids under the project root become root-relative; anything else
/// (virtual modules, files outside the project) is kept verbatim.
pub fn module_key(root: &Path, module_id: &str) -> String {
    let path = Path::new(module_id);
    if path.is_absolute() && path.starts_with(root) {
        to_slash(&relative_path(root, path))
    } else {
        module_id.replace('\\', "/")
    }
}
