//! Kaizen - a self-improving loop over shell steps
//!
//! Each loop plans, reviews, gates by risk, executes, reflects and
//! publishes. Commands that failed before are skipped, and artifacts are
//! retained on a logarithmic schedule so history stays bounded.

pub mod collab;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod failure;
pub mod gate;
pub mod id;
pub mod pipeline;
pub mod retention;
pub mod server;
pub mod site;
pub mod storage;
pub mod text;

pub use error::{ErrorCategory, KaizenError, Result};
