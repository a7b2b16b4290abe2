//! JSONL-based storage implementation with in-memory caching.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Serialize, de::DeserializeOwned};

use super::traits::{Filter, HasId, Storage};
use super::write_atomic;
use crate::error::{KaizenError, Result};

/// JSONL-based storage with in-memory caching.
///
/// Appends go straight to the file. Upserts rewrite the whole collection
/// through a temp file so a crash never leaves a half-written ledger.
pub struct JsonlStorage {
    base_path: PathBuf,
    cache: RwLock<HashMap<String, Vec<serde_json::Value>>>,
}

impl JsonlStorage {
    /// Create a new JsonlStorage at the given path.
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    /// Load a collection into cache if not already loaded.
    ///
    /// Lines that fail to parse are skipped with a warning rather than
    /// poisoning the whole collection.
    fn ensure_loaded(&self, collection: &str) -> Result<()> {
        {
            let cache = self.cache.read().map_err(|e| KaizenError::Storage(e.to_string()))?;
            if cache.contains_key(collection) {
                return Ok(());
            }
        }

        let mut cache = self.cache.write().map_err(|e| KaizenError::Storage(e.to_string()))?;
        if cache.contains_key(collection) {
            return Ok(());
        }

        let path = self.collection_path(collection);
        let mut records = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(record) => records.push(record),
                    Err(e) => log::warn!("Skipping corrupt line {} in {}: {}", lineno + 1, path.display(), e),
                }
            }
        }

        cache.insert(collection.to_string(), records);
        Ok(())
    }

    fn append_to_file(&self, collection: &str, record: &serde_json::Value) -> Result<()> {
        let path = self.collection_path(collection);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    fn rewrite_file(&self, collection: &str, records: &[serde_json::Value]) -> Result<()> {
        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }
        write_atomic(&self.collection_path(collection), buf.as_bytes())
    }
}

fn record_id(record: &serde_json::Value) -> Option<&str> {
    record.get("id").and_then(|v| v.as_str())
}

impl Storage for JsonlStorage {
    fn create<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()> {
        self.ensure_loaded(collection)?;
        let exists = {
            let cache = self.cache.read().map_err(|e| KaizenError::Storage(e.to_string()))?;
            cache
                .get(collection)
                .is_some_and(|records| records.iter().any(|r| record_id(r) == Some(record.id())))
        };
        if exists {
            return Err(KaizenError::Storage(format!(
                "{} already has a record with id {}",
                collection,
                record.id()
            )));
        }
        let value = serde_json::to_value(record)?;

        // File first, it is the source of truth
        self.append_to_file(collection, &value)?;

        let mut cache = self.cache.write().map_err(|e| KaizenError::Storage(e.to_string()))?;
        cache.entry(collection.to_string()).or_default().push(value);
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        self.ensure_loaded(collection)?;

        let cache = self.cache.read().map_err(|e| KaizenError::Storage(e.to_string()))?;
        let found = cache
            .get(collection)
            .and_then(|records| records.iter().find(|r| record_id(r) == Some(id)));

        match found {
            Some(record) => Ok(Some(serde_json::from_value(record.clone())?)),
            None => Ok(None),
        }
    }

    fn upsert<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()> {
        self.ensure_loaded(collection)?;
        let value = serde_json::to_value(record)?;

        let mut cache = self.cache.write().map_err(|e| KaizenError::Storage(e.to_string()))?;
        let records = cache.entry(collection.to_string()).or_default();

        match records.iter_mut().find(|r| record_id(r) == Some(record.id())) {
            Some(existing) => *existing = value,
            None => records.push(value),
        }

        self.rewrite_file(collection, records)
    }

    fn query<T: DeserializeOwned>(&self, collection: &str, filters: &[Filter]) -> Result<Vec<T>> {
        self.ensure_loaded(collection)?;

        let cache = self.cache.read().map_err(|e| KaizenError::Storage(e.to_string()))?;
        let Some(records) = cache.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results = Vec::new();
        for record in records {
            if filters.iter().all(|f| f.matches(record)) {
                results.push(serde_json::from_value(record.clone())?);
            }
        }
        Ok(results)
    }

    fn remove(&self, collection: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.ensure_loaded(collection)?;

        let mut cache = self.cache.write().map_err(|e| KaizenError::Storage(e.to_string()))?;
        let Some(records) = cache.get_mut(collection) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|r| !record_id(r).is_some_and(|id| ids.iter().any(|x| x == id)));
        let removed = before - records.len();

        if removed > 0 {
            self.rewrite_file(collection, records)?;
        }
        Ok(removed)
    }
}
