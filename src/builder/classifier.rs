//! Directive classification.
//!
//! Modules opt into a side of the boundary with a directive in their
//! directive prologue, the run of string-literal statements at the very top
//! of the file. Directives anywhere else are ordinary expressions and are
//! ignored.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::builder::bundler::ModuleSource;
use crate::core::boundary::Boundary;

/// Whitespace, comments and a leading hashbang.
static TRIVIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A(?:\s+|//[^\n]*|/\*(?s:.*?)\*/)*").unwrap());

static HASHBANG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\A#![^\n]*").unwrap());

/// A string literal without escapes or line breaks.
static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\A(?:"([^"\\\r\n]*)"|'([^'\\\r\n]*)')"#).unwrap());

/// What may follow a directive for it to be a complete statement.
static STATEMENT_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[ \t]*(?:/\*(?s:.*?)\*/[ \t]*)*(?:;|\r?\n|//|\z)").unwrap());

/// A token that continues the expression across a line break.
static CONTINUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?:[(\[`.,?:=<>&|^%*/]|!=|\+[^+]|-[^-]|in\b|instanceof\b)").unwrap()
});

/// Return the directives of a module's prologue, in source order.
pub fn scan_directives(code: &str) -> Vec<&str> {
    let mut directives = Vec::new();
    let mut rest = code.strip_prefix('\u{feff}').unwrap_or(code);

    if let Some(m) = HASHBANG.find(rest) {
        rest = &rest[m.end()..];
    }

    loop {
        rest = &rest[TRIVIA.find(rest).map_or(0, |m| m.end())..];

        let Some(caps) = STRING_LITERAL.captures(rest) else {
            break;
        };
        let literal_end = caps.get(0).map_or(0, |m| m.end());
        let Some(end) = STATEMENT_END.find(&rest[literal_end..]) else {
            // `"use client".length` and friends are expressions
            break;
        };
        // No automatic semicolon before a token that continues the literal
        let tail = &rest[literal_end..];
        let next = &tail[TRIVIA.find(tail).map_or(0, |m| m.end())..];
        if !next.starts_with(';') && CONTINUATION.is_match(next) {
            break;
        }

        if let Some(value) = caps.get(1).or_else(|| caps.get(2)) {
            directives.push(value.as_str());
        }

        // Leave a line comment for the trivia skip
        let comment = if end.as_str().ends_with("//") { 2 } else { 0 };
        let consumed = literal_end + end.end() - comment;
        rest = &rest[consumed..];
        if rest.starts_with(';') {
            rest = &rest[1..];
        }
    }

    directives
}

/// Detect the boundary directive of a module, if any.
///
/// The first boundary directive in the prologue wins.
pub fn detect_boundary(code: &str) -> Option<Boundary> {
    scan_directives(code)
        .into_iter()
        .find_map(Boundary::from_directive)
}

/// Classification of one module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    /// Directive found in the prologue, `None` when unclassified.
    pub directive: Option<Boundary>,
    /// Export names, sorted and deduplicated.
    pub exports: Vec<String>,
}

impl Classification {
    pub fn new(directive: Option<Boundary>, exports: impl IntoIterator<Item = String>) -> Self {
        let mut exports: Vec<String> = exports.into_iter().collect();
        exports.sort();
        exports.dedup();
        Classification { directive, exports }
    }

    pub fn is_classified(&self) -> bool {
        self.directive.is_some()
    }

    /// The boundary the module belongs to in a pass whose default is
    /// `pass_default`.
    pub fn effective_boundary(&self, pass_default: Boundary) -> Boundary {
        self.directive.unwrap_or(pass_default)
    }
}

/// Classifications of every module seen during one build invocation.
#[derive(Debug, Clone, Default)]
pub struct ClassificationTable {
    modules: BTreeMap<String, Classification>,
}

impl ClassificationTable {
    pub fn new() -> Self {
        ClassificationTable {
            modules: BTreeMap::new(),
        }
    }

    /// Record a classification and return the one now in effect.
    ///
    /// A recorded directive is never cleared by a later observation without
    /// one, since later passes may see the module after it was transformed.
    /// A conflicting directive keeps the first.
    pub fn record(&mut self, module_id: &str, classification: Classification) -> &Classification {
        use std::collections::btree_map::Entry;

        match self.modules.entry(module_id.to_string()) {
            Entry::Vacant(slot) => slot.insert(classification),
            Entry::Occupied(slot) => {
                let existing = slot.into_mut();
                match (existing.directive, classification.directive) {
                    (None, Some(_)) => *existing = classification,
                    (Some(previous), Some(next)) if previous != next => {
                        tracing::warn!(
                            "`{}` was classified {} earlier in this build, ignoring its {} directive",
                            module_id,
                            previous,
                            next
                        );
                    }
                    (Some(_), _) => {
                        if existing.exports.is_empty() && !classification.exports.is_empty() {
                            existing.exports = classification.exports;
                        }
                    }
                    (None, None) => *existing = classification,
                }
                existing
            }
        }
    }

    pub fn get(&self, module_id: &str) -> Option<&Classification> {
        self.modules.get(module_id)
    }

    /// Directive of a module, if it has been classified.
    pub fn directive_of(&self, module_id: &str) -> Option<Boundary> {
        self.modules.get(module_id).and_then(|c| c.directive)
    }

    /// Boundary of a module in a pass whose default is `pass_default`.
    pub fn boundary_of(&self, module_id: &str, pass_default: Boundary) -> Boundary {
        self.directive_of(module_id).unwrap_or(pass_default)
    }

    /// Modules carrying the directive of `boundary`, ordered by id.
    pub fn modules_with(
        &self,
        boundary: Boundary,
    ) -> impl Iterator<Item = (&str, &Classification)> + '_ {
        self.modules
            .iter()
            .filter(move |(_, c)| c.directive == Some(boundary))
            .map(|(id, c)| (id.as_str(), c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Classification)> + '_ {
        self.modules.iter().map(|(id, c)| (id.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Classifies modules reported by the bundler's parse hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveClassifier;

impl DirectiveClassifier {
    pub fn new() -> Self {
        DirectiveClassifier
    }

    /// Classify a module without recording it.
    pub fn classify(&self, module: &ModuleSource) -> Classification {
        Classification::new(detect_boundary(&module.code), module.exports.iter().cloned())
    }

    /// Classify a module and record it in `table`.
    pub fn classify_into(
        &self,
        module: &ModuleSource,
        table: &mut ClassificationTable,
    ) -> Classification {
        let classification = self.classify(module);
        if let Some(boundary) = classification.directive {
            tracing::debug!("classified `{}` as {}", module.id, boundary);
            if classification.exports.is_empty() {
                tracing::warn!("{} module `{}` has no exports", boundary, module.id);
            }
        }
        table.record(&module.id, classification).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str, code: &str, exports: &[&str]) -> ModuleSource {
        ModuleSource {
            id: id.to_string(),
            code: code.to_string(),
            exports: exports.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_detects_leading_directive() {
        assert_eq!(detect_boundary("'use client'\nexport default 1"), Some(Boundary::Client));
        assert_eq!(
            detect_boundary("\"use server\";\nexport async function save() {}"),
            Some(Boundary::Server)
        );
        assert_eq!(detect_boundary("export default 1"), None);
    }

    #[test]
    fn test_skips_comments_and_other_directives() {
        let code = "#!/usr/bin/env node\n// Button\n/* license */\n'use strict';\n\"use client\";\nexport default 1";
        assert_eq!(scan_directives(code), vec!["use strict", "use client"]);
        assert_eq!(detect_boundary(code), Some(Boundary::Client));

        let code = "'use strict' // strict\n'use client'\nexport default 1";
        assert_eq!(scan_directives(code), vec!["use strict", "use client"]);
    }

    #[test]
    fn test_ignores_directives_after_first_statement() {
        let code = "import React from 'react'\n'use client'\nexport default 1";
        assert_eq!(detect_boundary(code), None);
    }

    #[test]
    fn test_string_expression_is_not_a_directive() {
        assert_eq!(detect_boundary("'use client'.length\n"), None);
        assert_eq!(detect_boundary("'use client' + x;"), None);
    }

    #[test]
    fn test_line_break_before_continuation_is_not_a_statement_end() {
        assert_eq!(detect_boundary("'use client'\n(foo)"), None);
        assert_eq!(detect_boundary("'use client'\n+ x"), None);
        assert_eq!(detect_boundary("'use client' // note\n[a].map(f)"), None);
        assert_eq!(detect_boundary("'use client'\n  instanceof Foo"), None);

        assert_eq!(detect_boundary("'use client'\nexport default 1"), Some(Boundary::Client));
        assert_eq!(detect_boundary("'use client'\n++count"), Some(Boundary::Client));
        assert_eq!(detect_boundary("'use client';\n(foo)"), Some(Boundary::Client));
        assert_eq!(detect_boundary("'use client'\nimport x from 'x'"), Some(Boundary::Client));
    }

    #[test]
    fn test_first_boundary_directive_wins() {
        assert_eq!(
            detect_boundary("'use server';\n'use client';\n"),
            Some(Boundary::Server)
        );
    }

    #[test]
    fn test_classification_is_idempotent() {
        let classifier = DirectiveClassifier::new();
        let mut table = ClassificationTable::new();
        let button = module("/app/src/Button.tsx", "'use client'\n", &["default", "Icon", "default"]);

        let first = classifier.classify_into(&button, &mut table);
        let second = classifier.classify_into(&button, &mut table);

        assert_eq!(first, second);
        assert_eq!(first.directive, Some(Boundary::Client));
        assert_eq!(first.exports, vec!["Icon", "default"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_directive_is_sticky() {
        let classifier = DirectiveClassifier::new();
        let mut table = ClassificationTable::new();

        classifier.classify_into(&module("/app/src/a.ts", "'use client'\n", &["a"]), &mut table);
        // A later pass sees the module after a transform removed the directive
        classifier.classify_into(&module("/app/src/a.ts", "export const a = 1", &["a"]), &mut table);
        // A conflicting directive keeps the first
        classifier.classify_into(&module("/app/src/a.ts", "'use server'\n", &["a"]), &mut table);

        assert_eq!(table.directive_of("/app/src/a.ts"), Some(Boundary::Client));
    }

    #[test]
    fn test_unclassified_uses_pass_default() {
        let classifier = DirectiveClassifier::new();
        let mut table = ClassificationTable::new();
        let c = classifier.classify_into(&module("/app/src/util.ts", "export const x = 1", &["x"]), &mut table);

        assert!(!c.is_classified());
        assert_eq!(c.effective_boundary(Boundary::Server), Boundary::Server);
        assert_eq!(table.boundary_of("/app/src/util.ts", Boundary::Client), Boundary::Client);
        assert_eq!(table.modules_with(Boundary::Client).count(), 0);
    }

    #[test]
    fn test_zero_exports_is_recorded() {
        let classifier = DirectiveClassifier::new();
        let mut table = ClassificationTable::new();
        let c = classifier.classify_into(&module("/app/src/side.ts", "'use client'\nimport './x'", &[]), &mut table);

        assert_eq!(c.directive, Some(Boundary::Client));
        assert!(c.exports.is_empty());
        assert_eq!(table.modules_with(Boundary::Client).count(), 1);
    }
}
