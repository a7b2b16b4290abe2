//! Loop State Manager
//!
//! Enforces that at most one loop runs at a time. The persisted status
//! record is the durable truth; an in-process mutex makes the check-and-set
//! in `try_begin` atomic. The guarantee assumes a single writer process.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::domain::{LoopRun, LoopStatus, StatusRecord};
use crate::error::{KaizenError, Result};
use crate::id::{LoopId, now_ms};
use crate::storage::write_atomic;

#[derive(Debug)]
pub struct LoopStateManager {
    path: PathBuf,
    record: Mutex<StatusRecord>,
}

impl LoopStateManager {
    /// Open the status record at `path`; missing or corrupt means idle
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let record = load_record(&path);
        log::debug!(
            "Status record {}: {:?}, ordinal {}",
            path.display(),
            record.status,
            record.ordinal
        );
        Self {
            path,
            record: Mutex::new(record),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StatusRecord>> {
        self.record.lock().map_err(|e| KaizenError::Storage(e.to_string()))
    }

    fn persist(&self, record: &StatusRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&self.path, json.as_bytes())
    }

    /// Current status record
    pub fn snapshot(&self) -> Result<StatusRecord> {
        Ok(self.lock()?.clone())
    }

    /// Start a loop unless one is already running
    ///
    /// Returns None without touching state when busy. Otherwise allocates
    /// the next id and ordinal and persists the running record before
    /// returning the run.
    pub fn try_begin(&self) -> Result<Option<LoopRun>> {
        let mut record = self.lock()?;
        if record.is_running() {
            return Ok(None);
        }

        let id = LoopId::next_after(record.latest_id());
        let run = LoopRun::start(id, record.ordinal + 1);
        let next = StatusRecord::running(&run, record.last_loop_id);

        self.persist(&next)?;
        *record = next;
        log::info!("Loop {} began (ordinal {})", run.id, run.ordinal);
        Ok(Some(run))
    }

    /// Mark the run finished and the system idle
    ///
    /// The in-memory state goes idle even if the write fails, so a disk
    /// error cannot wedge the process in `running`.
    pub fn end(&self, run: &mut LoopRun) -> Result<()> {
        run.finish();
        let next = StatusRecord::idle_after(run);
        let mut record = self.lock()?;
        *record = next.clone();
        drop(record);
        self.persist(&next)?;
        log::info!("Loop {} ended", run.id);
        Ok(())
    }

    /// Reset a record left `running` by a dead process
    ///
    /// Returns the record as it was found when a reset happened.
    pub fn reset_stale(&self) -> Result<Option<StatusRecord>> {
        let mut record = self.lock()?;
        if !record.is_running() {
            return Ok(None);
        }

        let stale = record.clone();
        let next = StatusRecord {
            status: LoopStatus::Idle,
            loop_id: None,
            last_loop_id: stale.latest_id(),
            ordinal: stale.ordinal,
            start_time: stale.start_time,
            end_time: Some(now_ms()),
        };
        self.persist(&next)?;
        *record = next;
        Ok(Some(stale))
    }
}

fn load_record(path: &Path) -> StatusRecord {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return StatusRecord::default(),
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("Corrupt status record {}, treating as idle: {}", path.display(), e);
        StatusRecord::default()
    })
}
