//! Persistent failure pattern store

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signature::SignatureStrategy;
use crate::config::FailureConfig;
use crate::error::Result;
use crate::id::now_ms;
use crate::storage::write_atomic;
use crate::text::truncate_chars;

/// A learned association between a command signature and why it fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub signature: String,
    pub pattern: String,
    pub command_example: String,
    pub last_error: String,
    #[serde(default)]
    pub titles: Vec<String>,
    pub lesson: String,
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

fn lesson_for(pattern: &str, error: &str) -> String {
    format!(
        "Command pattern '{}' fails with: {}",
        truncate_chars(pattern, 50),
        truncate_chars(error.trim(), 100)
    )
}

/// Repeated-failure request handed to the self-repair collaborator
#[derive(Debug, Serialize)]
struct RepeatedFailureRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    pattern: &'a str,
    details: &'a FailureRecord,
    request: &'static str,
}

/// Failure records keyed by signature, persisted as pretty JSON
pub struct FailureStore {
    path: PathBuf,
    requests_dir: PathBuf,
    strategy: Box<dyn SignatureStrategy>,
    min_recurrence: u32,
    summary_top_n: usize,
    repeat_request_at: u32,
    records: BTreeMap<String, FailureRecord>,
}

impl std::fmt::Debug for FailureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureStore")
            .field("path", &self.path)
            .field("strategy", &self.strategy.name())
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl FailureStore {
    /// Open the store at `path`; a missing or corrupt file starts empty
    pub fn open(path: impl Into<PathBuf>, requests_dir: impl Into<PathBuf>, config: &FailureConfig) -> Self {
        let path = path.into();
        let records = load_records(&path);
        log::debug!("Loaded {} failure patterns from {}", records.len(), path.display());
        Self {
            path,
            requests_dir: requests_dir.into(),
            strategy: config.matcher.strategy(),
            min_recurrence: config.min_recurrence.max(1),
            summary_top_n: config.summary_top_n,
            repeat_request_at: config.repeat_request_at,
            records,
        }
    }

    /// Reason to skip `command`, or None when it may run
    pub fn should_skip(&self, command: &str) -> Option<String> {
        let signature = self.strategy.signature(command);
        let record = self.records.get(&signature.key)?;
        if record.count < self.min_recurrence {
            return None;
        }
        Some(format!(
            "Skipping - known failure pattern (failed {} times): {}",
            record.count, record.lesson
        ))
    }

    /// Record a failure of `command`, creating or bumping its record
    pub fn learn_failure(&mut self, command: &str, stderr: &str, title: &str) -> Result<()> {
        let signature = self.strategy.signature(command);
        let now = Utc::now();

        let record = self
            .records
            .entry(signature.key.clone())
            .and_modify(|r| {
                r.count += 1;
                r.last_seen = now;
                r.last_error = truncate_chars(stderr, 200).to_string();
                r.lesson = lesson_for(&r.pattern, stderr);
            })
            .or_insert_with(|| FailureRecord {
                signature: signature.key.clone(),
                pattern: signature.pattern.clone(),
                command_example: truncate_chars(command, 200).to_string(),
                last_error: truncate_chars(stderr, 200).to_string(),
                titles: Vec::new(),
                lesson: lesson_for(&signature.pattern, stderr),
                count: 1,
                first_seen: now,
                last_seen: now,
            });

        if !title.is_empty() && !record.titles.iter().any(|t| t == title) {
            record.titles.push(title.to_string());
        }
        let count = record.count;
        log::info!("Learned failure {} (count {})", signature.key, count);

        if count == self.repeat_request_at {
            self.request_self_repair(&signature.key)?;
        }
        self.save()
    }

    /// Top patterns by recurrence, as a bulleted list for planning context
    pub fn failure_summary(&self) -> String {
        if self.records.is_empty() {
            return "No failure patterns recorded yet.".to_string();
        }

        let mut ranked: Vec<&FailureRecord> = self.records.values().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then(b.last_seen.cmp(&a.last_seen)));

        let mut summary = String::from("Known Failure Patterns:\n");
        for record in ranked.into_iter().take(self.summary_top_n) {
            summary.push_str(&format!(
                "- {}: {} failures ({})\n",
                truncate_chars(&record.pattern, 50),
                record.count,
                truncate_chars(&record.last_error, 80)
            ));
        }
        summary
    }

    pub fn records(&self) -> impl Iterator<Item = &FailureRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, json.as_bytes())
    }

    fn request_self_repair(&self, key: &str) -> Result<()> {
        let Some(details) = self.records.get(key) else {
            return Ok(());
        };
        let request = RepeatedFailureRequest {
            kind: "repeated_failure",
            pattern: &details.pattern,
            details,
            request: "System agent needed: repeated failure pattern detected",
        };
        let path = self.requests_dir.join(format!("{}_failure.json", now_ms()));
        write_atomic(&path, serde_json::to_string_pretty(&request)?.as_bytes())?;
        log::warn!("Repeated failure {} filed for self-repair at {}", key, path.display());
        Ok(())
    }
}

fn load_records(path: &Path) -> BTreeMap<String, FailureRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            log::warn!("Failed to read failure patterns {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(records) => records,
        Err(e) => {
            log::warn!("Corrupt failure patterns {}, starting empty: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}
