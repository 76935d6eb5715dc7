//! Choice point syntax: patterns, classification and the two synchronous stages.

use std::sync::LazyLock;

use rand::seq::SliceRandom;
use regex::{Captures, Regex};

use crate::models::normalize_path;

/// `<...>` with no nested angle brackets.
pub(crate) static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]+>").expect("reference pattern is valid"));

/// `(...)` with no nested parentheses and at least one slash.
pub(crate) static GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*/[^()]*)\)").expect("group pattern is valid"));

/// What the interior of a `<...>` reference asks for.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Reference<'a> {
    /// `<a|b|c>`: options after trimming and dropping empties.
    Inline(Vec<&'a str>),
    /// `<*path>`: next line under the path's sequential cursor.
    Sequential(String),
    /// `<path>`: a random line.
    Random(String),
}

impl<'a> Reference<'a> {
    pub(crate) fn parse(interior: &'a str) -> Self {
        let body = interior.trim();
        if body.contains('|') {
            Reference::Inline(split_options(body, '|'))
        } else if let Some(path) = body.strip_prefix('*') {
            Reference::Sequential(normalize_path(path))
        } else {
            Reference::Random(normalize_path(body))
        }
    }
}

pub(crate) fn split_options(text: &str, separator: char) -> Vec<&str> {
    text.split(separator)
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .collect()
}

/// Uniform choice over `options`.
pub(crate) fn pick<'a>(options: &[&'a str]) -> Option<&'a str> {
    options.choose(&mut rand::thread_rng()).copied()
}

/// Replace each `(a/b/...)` group with one of its options.
///
/// A group left with fewer than two options after trimming loses its
/// parentheses but keeps its interior text.
pub(crate) fn resolve_groups(text: &str) -> String {
    GROUP
        .replace_all(text, |caps: &Captures<'_>| {
            let interior = caps.get(1).map_or("", |m| m.as_str());
            let options = split_options(interior, '/');
            if options.len() >= 2 {
                pick(&options).unwrap_or(interior).to_string()
            } else {
                interior.to_string()
            }
        })
        .into_owned()
}

/// Resolve bare `a/b/c` options inside comma-separated tags.
///
/// When at least one tag resolves, every tag is trimmed and the tags are
/// rejoined with `", "`. Otherwise the text is returned untouched.
pub(crate) fn resolve_bare_options(text: &str) -> String {
    if !has_bare_options(text) {
        return text.to_string();
    }

    text.split(',')
        .map(|segment| {
            let segment = segment.trim();
            match bare_options(segment) {
                Some(options) => pick(&options).unwrap_or(segment),
                None => segment,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn has_bare_options(text: &str) -> bool {
    text.split(',')
        .any(|segment| bare_options(segment.trim()).is_some())
}

/// Options of a tag segment that qualifies as a bare slash choice.
///
/// URLs and segments containing spaces never qualify.
fn bare_options(segment: &str) -> Option<Vec<&str>> {
    if !segment.contains('/')
        || segment.starts_with("http")
        || segment.contains("://")
        || segment.contains(' ')
    {
        return None;
    }

    let options = split_options(segment, '/');
    (options.len() >= 2).then_some(options)
}
