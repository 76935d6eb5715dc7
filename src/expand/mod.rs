//! Prompt expansion.
//!
//! Expansion runs three stages in order, each on the output of the previous:
//!
//! 1. `<...>` references: inline lists (`<a|b>`), random fragment lines
//!    (`<path>`) and sequential fragment lines (`<*path>`). Fragment lines are
//!    themselves expanded by this stage before being substituted.
//! 2. `(a/b)` groups, whose options may contain commas.
//! 3. Bare `a/b` options inside comma-separated tags.
//!
//! Malformed or unresolvable choice points are left as written. The only
//! failure is an error from the fragment store.

mod syntax;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::normalize_path;
use crate::store::FragmentStore;

use syntax::{Reference, REFERENCE};

/// Default limit on nested fragment references.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default limit on fragment lookups made by one expansion.
pub const DEFAULT_MAX_REFERENCES: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandConfig {
    /// How many fragment references may nest inside each other. A reference
    /// found deeper than this is left as written.
    pub max_depth: usize,
    /// How many fragment lookups one call to [`Expander::expand`] may make,
    /// counted across every nesting level. File references found after the
    /// budget is spent are left as written.
    pub max_references: usize,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_references: DEFAULT_MAX_REFERENCES,
        }
    }
}

/// Fragment lookups still allowed in one expansion.
struct LookupBudget {
    remaining: AtomicUsize,
    warned: AtomicBool,
}

impl LookupBudget {
    fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
            warned: AtomicBool::new(false),
        }
    }

    /// Take one lookup, or return false once the budget is spent.
    fn take(&self, literal: &str, limit: usize) -> bool {
        let taken = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if !taken && !self.warned.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                "Expansion made {} fragment lookups, leaving {} and later references as written",
                limit,
                literal
            );
        }
        taken
    }
}

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("Fragment store failed: {0:#}")]
    Store(anyhow::Error),
}

/// Whether `prompt` contains a `<...>` reference, an `(a/b)` group, or a
/// tag with bare `a/b` options. When this is false, expansion returns the
/// prompt unchanged.
pub fn has_choice_points(prompt: &str) -> bool {
    REFERENCE.is_match(prompt) || syntax::GROUP.is_match(prompt) || syntax::has_bare_options(prompt)
}

/// Expands prompts against a [`FragmentStore`].
#[derive(Debug, Clone)]
pub struct Expander<S> {
    store: S,
    config: ExpandConfig,
}

impl<S: FragmentStore> Expander<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ExpandConfig::default())
    }

    pub fn with_config(store: S, config: ExpandConfig) -> Self {
        Self { store, config }
    }

    /// Expand every choice point in `prompt`.
    ///
    /// Each choice point gets its own draw, so two references to the same
    /// fragment may resolve differently. On error nothing is returned; a
    /// prompt is never half expanded. Sequential cursors already advanced by
    /// other references in the same prompt stay advanced.
    pub async fn expand(&self, prompt: &str) -> Result<String, ExpandError> {
        if prompt.is_empty() {
            return Ok(String::new());
        }

        let budget = LookupBudget::new(self.config.max_references);
        let referenced = self.resolve_references(prompt, 0, &budget).await?;
        let grouped = syntax::resolve_groups(&referenced);
        let expanded = syntax::resolve_bare_options(&grouped);

        tracing::debug!("Expanded prompt {:?} to {:?}", prompt, expanded);
        Ok(expanded)
    }

    /// Whether `prompt` contains anything [`expand`](Self::expand) would resolve.
    ///
    /// Makes no draws and never touches the store.
    pub fn has_choice_points(&self, prompt: &str) -> bool {
        has_choice_points(prompt)
    }

    /// Reset the sequential cursor for `path`, or every cursor when `None`.
    pub async fn reset_sequential_counters(&self, path: Option<&str>) -> Result<(), ExpandError> {
        let path = path.map(normalize_path);
        self.store
            .reset_sequential_counter(path.as_deref())
            .await
            .map_err(ExpandError::Store)
    }

    /// Stage 1. All references are found in `text` first, resolved
    /// concurrently, then spliced back at their original offsets. The first
    /// store error drops the remaining lookups.
    fn resolve_references<'a>(
        &'a self,
        text: &'a str,
        depth: usize,
        budget: &'a LookupBudget,
    ) -> BoxFuture<'a, Result<String, ExpandError>> {
        async move {
            let matches: Vec<_> = REFERENCE.find_iter(text).collect();
            if matches.is_empty() {
                return Ok(text.to_string());
            }

            let replacements = future::try_join_all(matches.iter().map(|m| {
                let interior = &text[m.start() + 1..m.end() - 1];
                self.resolve_reference(m.as_str(), interior, depth, budget)
            }))
            .await?;

            let mut out = String::with_capacity(text.len());
            let mut cursor = 0;
            for (m, replacement) in matches.iter().zip(replacements) {
                out.push_str(&text[cursor..m.start()]);
                out.push_str(&replacement);
                cursor = m.end();
            }
            out.push_str(&text[cursor..]);

            Ok(out)
        }
        .boxed()
    }

    async fn resolve_reference(
        &self,
        literal: &str,
        interior: &str,
        depth: usize,
        budget: &LookupBudget,
    ) -> Result<String, ExpandError> {
        let (path, line) = match Reference::parse(interior) {
            Reference::Inline(options) => {
                return Ok(syntax::pick(&options).unwrap_or(literal).to_string());
            }
            Reference::Sequential(path) => {
                if !self.within_limits(literal, depth, budget) {
                    return Ok(literal.to_string());
                }
                let line = self.store.sequential_line(&path).await;
                (path, line)
            }
            Reference::Random(path) => {
                if !self.within_limits(literal, depth, budget) {
                    return Ok(literal.to_string());
                }
                let line = self.store.random_line(&path).await;
                (path, line)
            }
        };

        match line.map_err(ExpandError::Store)? {
            Some(line) => self.resolve_references(&line, depth + 1, budget).await,
            None => {
                tracing::warn!("Fragment not found: {}", path);
                Ok(literal.to_string())
            }
        }
    }

    fn within_limits(&self, literal: &str, depth: usize, budget: &LookupBudget) -> bool {
        if depth >= self.config.max_depth {
            tracing::warn!(
                "Fragment reference {} nested deeper than {}, leaving it as written",
                literal,
                self.config.max_depth
            );
            return false;
        }
        budget.take(literal, self.config.max_references)
    }
}
