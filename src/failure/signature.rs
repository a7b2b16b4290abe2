//! Command signatures
//!
//! A signature is the normalized pattern of a command plus a short hash key.
//! Strategies differ only in how aggressively they normalize.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Selectable normalization strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// Whitespace-collapsed literal command
    Exact,
    /// Quotes unified, numbers and long hex ids replaced
    #[default]
    Normalized,
    /// Normalized, plus every path segment replaced
    Coarse,
}

impl MatcherKind {
    pub fn strategy(&self) -> Box<dyn SignatureStrategy> {
        match self {
            MatcherKind::Exact => Box::new(ExactMatcher),
            MatcherKind::Normalized => Box::new(NormalizedMatcher),
            MatcherKind::Coarse => Box::new(CoarseMatcher),
        }
    }
}

/// A command's failure signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// `{first_token}:{hash}`, the store key
    pub key: String,
    /// The normalized command text the hash was taken over
    pub pattern: String,
}

impl Signature {
    pub fn from_pattern(command: &str, pattern: String) -> Self {
        let first_token = command.split_whitespace().next().unwrap_or("");
        let mut hasher = Sha256::new();
        hasher.update(pattern.as_bytes());
        let digest = hasher.finalize();
        Self {
            key: format!("{}:{}", first_token, hex::encode(&digest[..8])),
            pattern,
        }
    }
}

/// Pluggable command normalization
pub trait SignatureStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Normalized form of the command; must be deterministic
    fn pattern(&self, command: &str) -> String;

    fn signature(&self, command: &str) -> Signature {
        Signature::from_pattern(command, self.pattern(command))
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

static VOLATILE_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\b[0-9a-fA-F]{12,}\b", "<HEX>"),
        (r"\d+", "<NUM>"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

static PATH_SEGMENT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"/[\w\-.]+").ok());

fn apply_volatile_rules(s: &str) -> String {
    VOLATILE_RULES
        .iter()
        .fold(s.replace('\'', "\""), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Whitespace-collapsed literal
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl SignatureStrategy for ExactMatcher {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn pattern(&self, command: &str) -> String {
        collapse_whitespace(command)
    }
}

/// Robust to whitespace, quoting style, counters, timestamps and hashes
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedMatcher;

impl SignatureStrategy for NormalizedMatcher {
    fn name(&self) -> &'static str {
        "normalized"
    }

    fn pattern(&self, command: &str) -> String {
        apply_volatile_rules(&collapse_whitespace(command))
    }
}

/// Treats every path as the same path
#[derive(Debug, Clone, Copy, Default)]
pub struct CoarseMatcher;

impl SignatureStrategy for CoarseMatcher {
    fn name(&self) -> &'static str {
        "coarse"
    }

    fn pattern(&self, command: &str) -> String {
        let collapsed = collapse_whitespace(command);
        let without_paths = match PATH_SEGMENT.as_ref() {
            Some(re) => re.replace_all(&collapsed, "/<PATH>").into_owned(),
            None => collapsed,
        };
        apply_volatile_rules(&without_paths)
    }
}
