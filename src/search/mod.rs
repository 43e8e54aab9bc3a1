//! Pure query-processing stages: normalization, fuzzy matching, ranking.
//!
//! Everything in this module is a deterministic function over its inputs and
//! requires no synchronization; shared mutable state lives in `crate::cache`
//! and `crate::analytics` only.

pub mod fuzzy;
pub mod normalize;
pub mod ranker;

pub use normalize::{NormalizedQuery, normalize};
