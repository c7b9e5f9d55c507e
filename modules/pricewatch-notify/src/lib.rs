//! Rule matching, match deduplication and digest building.
//!
//! Pure functions over the validated model: given a pack, one user's rules
//! and their favourites, produce the deduplicated match list and the digest
//! strings. No I/O happens in this crate, which keeps the matching contract
//! deterministic and trivially testable.

pub mod digest;
pub mod matcher;

pub use digest::{build_digest, Digest};
pub use matcher::{collect_matches, dedup, match_events, rule_matches};
