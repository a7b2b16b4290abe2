//! Failure pattern learning
//!
//! Commands that failed before are remembered by signature and skipped on
//! later loops instead of being sent to the executor again.

mod signature;
mod store;

pub use signature::{CoarseMatcher, ExactMatcher, MatcherKind, NormalizedMatcher, Signature, SignatureStrategy};
pub use store::{FailureRecord, FailureStore};
