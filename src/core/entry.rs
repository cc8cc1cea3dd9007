//! Entry registry.
//!
//! Holds the named entry points of a build, partitioned into categories, and
//! merges them into the input map handed to a bundler pass.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::BuildError;

/// Where an entry came from.
///
/// The declaration order is also the merge precedence used by
/// [`EntryRegistry::materialize`]: later categories may only replace earlier
/// ones when flagged as overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryCategory {
    /// Fixed framework modules (the entries file, client and SSR bootstraps).
    Framework,
    /// Modules carrying the client directive.
    ClientBoundary,
    /// Modules carrying the server directive.
    ServerBoundary,
    /// Project-specific auxiliary modules.
    Custom,
}

impl EntryCategory {
    pub const ALL: [EntryCategory; 4] = [
        EntryCategory::Framework,
        EntryCategory::ClientBoundary,
        EntryCategory::ServerBoundary,
        EntryCategory::Custom,
    ];

    /// Whether entries of this category keep a stable, unhashed file name.
    pub fn is_designated(self) -> bool {
        matches!(self, EntryCategory::Framework | EntryCategory::Custom)
    }
}

impl fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryCategory::Framework => write!(f, "framework"),
            EntryCategory::ClientBoundary => write!(f, "client-boundary"),
            EntryCategory::ServerBoundary => write!(f, "server-boundary"),
            EntryCategory::Custom => write!(f, "custom"),
        }
    }
}

/// A named build input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub name: String,
    pub module_path: PathBuf,
    pub category: EntryCategory,
    /// Whether this entry shadows same-named entries of earlier categories.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_override: bool,
}

/// Registry of entries for one build invocation.
#[derive(Debug, Clone, Default)]
pub struct EntryRegistry {
    entries: Vec<Entry>,
    /// Names discovery must not hand out.
    reserved: BTreeSet<String>,
}

impl EntryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        EntryRegistry {
            entries: Vec::new(),
            reserved: BTreeSet::new(),
        }
    }

    /// Keep `name` free for an entry registered later, such as a framework
    /// entry added per pass.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.reserved.insert(name.into());
    }

    /// Register an entry.
    ///
    /// Registering the same name and path twice in one category is a no-op;
    /// the same name with a different path is a [`BuildError::DuplicateEntry`].
    pub fn register(
        &mut self,
        category: EntryCategory,
        name: impl Into<String>,
        module_path: impl Into<PathBuf>,
    ) -> Result<(), BuildError> {
        self.insert(Entry {
            name: name.into(),
            module_path: module_path.into(),
            category,
            is_override: false,
        })
    }

    /// Register an entry allowed to shadow same-named entries of earlier
    /// categories.
    pub fn register_override(
        &mut self,
        category: EntryCategory,
        name: impl Into<String>,
        module_path: impl Into<PathBuf>,
    ) -> Result<(), BuildError> {
        self.insert(Entry {
            name: name.into(),
            module_path: module_path.into(),
            category,
            is_override: true,
        })
    }

    fn insert(&mut self, entry: Entry) -> Result<(), BuildError> {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.category == entry.category && e.name == entry.name)
        {
            if existing.module_path != entry.module_path {
                return Err(BuildError::DuplicateEntry {
                    category: entry.category,
                    name: entry.name,
                    existing: existing.module_path.clone(),
                    requested: entry.module_path,
                });
            }
            existing.is_override |= entry.is_override;
            return Ok(());
        }

        self.entries.push(entry);
        Ok(())
    }

    /// Register a discovered module under a name derived from its file stem.
    ///
    /// Returns the assigned name, or `None` if the path is already registered
    /// in any category. Clashes with registered or reserved names get a
    /// numeric suffix in discovery order.
    pub fn discover(
        &mut self,
        category: EntryCategory,
        module_path: &Path,
    ) -> Result<Option<String>, BuildError> {
        if self.contains_path(module_path) {
            return Ok(None);
        }

        let stem = module_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "module".to_string());

        let mut name = stem.clone();
        let mut suffix = 1;
        while self.contains_name(&name) || self.reserved.contains(&name) {
            name = format!("{}{}", stem, suffix);
            suffix += 1;
        }

        self.register(category, name.clone(), module_path)?;
        Ok(Some(name))
    }

    /// Merge all categories into a single input map.
    pub fn materialize(&self) -> Result<BTreeMap<String, PathBuf>, BuildError> {
        self.materialize_for(&EntryCategory::ALL)
    }

    /// Merge the given categories into a single input map.
    ///
    /// A name present in several categories is a
    /// [`BuildError::ConflictingEntry`] unless the later entry is an override.
    /// An overridden entry is left out even when the overriding category is
    /// not selected, so a name never denotes two modules in one build.
    pub fn materialize_for(
        &self,
        categories: &[EntryCategory],
    ) -> Result<BTreeMap<String, PathBuf>, BuildError> {
        let mut merged: BTreeMap<String, &Entry> = BTreeMap::new();

        for category in EntryCategory::ALL {
            if !categories.contains(&category) {
                continue;
            }

            for entry in self.entries.iter().filter(|e| e.category == category) {
                if self.is_shadowed(entry) {
                    continue;
                }
                match merged.get(&entry.name) {
                    None => {
                        merged.insert(entry.name.clone(), entry);
                    }
                    Some(previous) if entry.is_override => {
                        tracing::debug!(
                            "{} entry `{}` overrides {} entry ({} -> {})",
                            entry.category,
                            entry.name,
                            previous.category,
                            previous.module_path.display(),
                            entry.module_path.display()
                        );
                        merged.insert(entry.name.clone(), entry);
                    }
                    Some(previous) => {
                        return Err(BuildError::ConflictingEntry {
                            name: entry.name.clone(),
                            first: previous.category,
                            first_path: previous.module_path.clone(),
                            second: entry.category,
                            second_path: entry.module_path.clone(),
                        });
                    }
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|(name, entry)| (name, entry.module_path.clone()))
            .collect())
    }

    /// Whether an override of a later category replaces `entry`.
    fn is_shadowed(&self, entry: &Entry) -> bool {
        self.entries
            .iter()
            .any(|e| e.is_override && e.name == entry.name && e.category > entry.category)
    }

    /// All entries in registration order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries of one category in registration order.
    pub fn by_category(&self, category: EntryCategory) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Look up an entry by name, preferring the highest-precedence category.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().rev().find(|e| e.name == name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn contains_path(&self, module_path: &Path) -> bool {
        self.entries.iter().any(|e| e.module_path == module_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_merges_categories() {
        let mut registry = EntryRegistry::new();
        registry
            .register(EntryCategory::Framework, "entries", "/app/src/entries.ts")
            .unwrap();
        registry
            .register(EntryCategory::ClientBoundary, "Button", "/app/src/Button.tsx")
            .unwrap();

        let input = registry.materialize().unwrap();
        assert_eq!(input.len(), 2);
        assert_eq!(input["entries"], PathBuf::from("/app/src/entries.ts"));
        assert_eq!(input["Button"], PathBuf::from("/app/src/Button.tsx"));
    }

    #[test]
    fn test_duplicate_entry_in_category() {
        let mut registry = EntryRegistry::new();
        registry
            .register(EntryCategory::ClientBoundary, "Button", "/app/src/Button.tsx")
            .unwrap();

        // Same path again is fine
        registry
            .register(EntryCategory::ClientBoundary, "Button", "/app/src/Button.tsx")
            .unwrap();
        assert_eq!(registry.len(), 1);

        let err = registry
            .register(EntryCategory::ClientBoundary, "Button", "/app/src/ui/Button.tsx")
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateEntry { .. }));
    }

    #[test]
    fn test_conflicting_entry_across_categories() {
        let mut registry = EntryRegistry::new();
        registry
            .register(EntryCategory::ClientBoundary, "Widget", "/app/src/Widget.tsx")
            .unwrap();
        registry
            .register(EntryCategory::ServerBoundary, "Widget", "/app/src/actions/Widget.ts")
            .unwrap();

        let err = registry.materialize().unwrap_err();
        match err {
            BuildError::ConflictingEntry {
                name,
                first,
                second,
                ..
            } => {
                assert_eq!(name, "Widget");
                assert_eq!(first, EntryCategory::ClientBoundary);
                assert_eq!(second, EntryCategory::ServerBoundary);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_override_shadows_discovered_entry() {
        let mut registry = EntryRegistry::new();
        registry
            .register(EntryCategory::ClientBoundary, "Chart", "/app/src/Chart.tsx")
            .unwrap();
        registry
            .register_override(EntryCategory::Custom, "Chart", "/app/src/custom/Chart.tsx")
            .unwrap();

        let input = registry.materialize().unwrap();
        assert_eq!(input["Chart"], PathBuf::from("/app/src/custom/Chart.tsx"));
    }

    #[test]
    fn test_materialize_for_filters_categories() {
        let mut registry = EntryRegistry::new();
        registry
            .register(EntryCategory::Framework, "entries", "/app/src/entries.ts")
            .unwrap();
        registry
            .register(EntryCategory::ServerBoundary, "actions", "/app/src/actions.ts")
            .unwrap();

        let input = registry
            .materialize_for(&[EntryCategory::Framework, EntryCategory::ClientBoundary])
            .unwrap();
        assert_eq!(input.keys().collect::<Vec<_>>(), vec!["entries"]);
    }

    #[test]
    fn test_discover_assigns_unique_names() {
        let mut registry = EntryRegistry::new();
        let first = registry
            .discover(EntryCategory::ClientBoundary, Path::new("/app/src/a/Button.tsx"))
            .unwrap();
        let second = registry
            .discover(EntryCategory::ClientBoundary, Path::new("/app/src/b/Button.tsx"))
            .unwrap();
        let again = registry
            .discover(EntryCategory::ClientBoundary, Path::new("/app/src/a/Button.tsx"))
            .unwrap();

        assert_eq!(first.as_deref(), Some("Button"));
        assert_eq!(second.as_deref(), Some("Button1"));
        assert_eq!(again, None);
        assert!(registry.materialize().is_ok());
    }

    #[test]
    fn test_discover_skips_reserved_names() {
        let mut registry = EntryRegistry::new();
        registry.reserve("entries");

        let name = registry
            .discover(EntryCategory::ClientBoundary, Path::new("/app/src/ui/entries.tsx"))
            .unwrap();
        assert_eq!(name.as_deref(), Some("entries1"));

        registry
            .register(EntryCategory::Framework, "entries", "/app/src/entries.ts")
            .unwrap();
        assert!(registry.materialize().is_ok());
    }

    #[test]
    fn test_override_shadows_outside_selected_categories() {
        let mut registry = EntryRegistry::new();
        registry
            .register(EntryCategory::ClientBoundary, "worker", "/app/src/Button.tsx")
            .unwrap();
        registry
            .register(EntryCategory::ClientBoundary, "Chart", "/app/src/Chart.tsx")
            .unwrap();
        registry
            .register_override(EntryCategory::Custom, "worker", "/app/src/worker.ts")
            .unwrap();

        let input = registry
            .materialize_for(&[EntryCategory::Framework, EntryCategory::ClientBoundary])
            .unwrap();
        assert_eq!(input.keys().collect::<Vec<_>>(), vec!["Chart"]);
    }
}
