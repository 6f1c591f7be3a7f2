//! Language alias table for the Confluence `code` macro.
//!
//! Confluence's syntax highlighter accepts a fixed set of language names,
//! while markdown authors type whatever their editor suggests (`py`, `sh`,
//! `c++`). This crate maps user-typed fence tags to the canonical names via
//! a bundled dataset, built once per process and read-only afterwards.
//!
//! Lookups never fail: an unknown tag resolves to [`DEFAULT_LANGUAGE`], and
//! a missing or malformed dataset degrades to pass-through behavior.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Deserialize;

/// Language emitted when a fence tag is not a known alias.
pub const DEFAULT_LANGUAGE: &str = "plain";

/// Bundled alias dataset, embedded at compile time.
const BUNDLED_DATASET: &str = include_str!("../data/confluence_languages.json");

static BUNDLED: LazyLock<LanguageMap> =
    LazyLock::new(
        || match serde_json::from_str::<Vec<LanguageEntry>>(BUNDLED_DATASET) {
            Ok(entries) => LanguageMap::from_entries(entries),
            Err(err) => {
                tracing::warn!("failed to parse bundled language dataset: {err}");
                LanguageMap::absent()
            }
        },
    );

/// One record of the alias dataset: a canonical highlighter language name
/// and the aliases that resolve to it.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageEntry {
    /// Canonical name as Confluence's highlighter expects it.
    pub name: String,
    /// Alternate spellings users may type in a fence tag.
    pub aliases: Vec<String>,
}

/// Immutable alias → canonical-name table.
///
/// The table is either present (built from a dataset) or absent (the
/// dataset failed to load). An absent table passes tags through unchanged
/// instead of defaulting them, so rendering works without the dataset.
#[derive(Debug, Clone)]
pub struct LanguageMap {
    aliases: Option<HashMap<String, String>>,
}

impl LanguageMap {
    /// The table built from the bundled dataset, constructed on first use
    /// and shared for the rest of the process.
    pub fn bundled() -> &'static LanguageMap {
        &BUNDLED
    }

    /// Build a table from explicit entries. Alias keys are lowercased so
    /// lookups are case-insensitive.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = LanguageEntry>,
    {
        let mut aliases = HashMap::new();
        for entry in entries {
            for alias in &entry.aliases {
                aliases.insert(alias.to_lowercase(), entry.name.clone());
            }
        }
        Self {
            aliases: Some(aliases),
        }
    }

    /// The degraded table used when no dataset is available.
    pub fn absent() -> Self {
        Self { aliases: None }
    }

    /// Whether this table was built without a dataset.
    pub fn is_absent(&self) -> bool {
        self.aliases.is_none()
    }

    /// Resolve a fence tag to a usable highlighter language name.
    ///
    /// Case-insensitive. Known aliases resolve to their canonical name;
    /// unknown tags resolve to [`DEFAULT_LANGUAGE`] with a logged warning.
    /// On an absent table the lowercased tag is returned unchanged. The
    /// result is never empty.
    pub fn lookup(&self, tag: &str) -> String {
        let tag = tag.to_lowercase();
        let Some(aliases) = &self.aliases else {
            if tag.is_empty() {
                return DEFAULT_LANGUAGE.to_owned();
            }
            return tag;
        };
        aliases.get(&tag).cloned().unwrap_or_else(|| {
            tracing::warn!("unsupported code block language: {tag}, using {DEFAULT_LANGUAGE}");
            DEFAULT_LANGUAGE.to_owned()
        })
    }
}
