//! Query normalization.
//!
//! Normalization is **critical for determinism**: the same visual input must
//! always produce the same canonical form, which in turn produces the same
//! cache key.
//!
//! # Processing Pipeline
//!
//! 1. **Length check** - reject above the configured ceiling, before any work
//! 2. **Control/metacharacter stripping** - drop control characters and
//!    SQL-significant punctuation so the text is inert against the storage
//!    collaborator
//! 3. **Whitespace normalization** - collapse runs, trim
//! 4. **Lowercasing**

use serde::Serialize;

use crate::error::InvalidQuery;

/// Characters stripped because they carry meaning in SQL or FTS query syntax.
const STRIPPED: &[char] = &['\'', '"', ';', '\\', '%', '_', '`', '*', '(', ')'];

/// Canonical, sanitized form of user input. The cache key basis.
///
/// Construction only through [`normalize`], so holding one is proof the text
/// passed sanitization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedQuery {
    text: String,
}

impl NormalizedQuery {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Query words, for all-words matching and FTS term construction.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.text.split_whitespace()
    }
}

impl std::fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Canonicalize raw user input.
///
/// Deterministic and side-effect free: the same raw input always yields the
/// same normalized output. Rejects input longer than `max_len` characters
/// with [`InvalidQuery::TooLong`] before doing any other work, and input that
/// is empty after sanitization with [`InvalidQuery::Empty`].
pub fn normalize(raw: &str, max_len: usize) -> Result<NormalizedQuery, InvalidQuery> {
    let len = raw.chars().count();
    if len > max_len {
        return Err(InvalidQuery::TooLong { len, max: max_len });
    }

    let sanitized: String = raw
        .chars()
        .filter(|c| !c.is_control() && !STRIPPED.contains(c))
        .collect();

    let text = sanitized
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if text.is_empty() {
        return Err(InvalidQuery::Empty);
    }

    Ok(NormalizedQuery { text })
}
