//! Loop ledger: one JSONL entry per loop run.
//!
//! Retention needs the ordinal of every artifact's loop, and artifacts only
//! carry the loop id. The ledger is the bridge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::traits::{Filter, HasId, Storage};
use crate::domain::LoopRun;
use crate::error::Result;
use crate::id::LoopId;

/// Collection name for loops.
pub const LOOPS_COLLECTION: &str = "loops";

/// How a loop run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOutcome {
    Running,
    Completed,
    Failed { stage: String, message: String },
    Interrupted,
}

/// Ledger entry for one loop run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopEntry {
    /// Loop id rendered as a string, the ledger key
    pub id: String,
    pub ordinal: u64,
    pub started_at: u64,
    #[serde(default)]
    pub ended_at: Option<u64>,
    pub outcome: LoopOutcome,
}

impl HasId for LoopEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl LoopEntry {
    pub fn started(run: &LoopRun) -> Self {
        Self {
            id: run.id.to_string(),
            ordinal: run.ordinal,
            started_at: run.started_at,
            ended_at: None,
            outcome: LoopOutcome::Running,
        }
    }

    pub fn loop_id(&self) -> Option<LoopId> {
        self.id.parse().ok()
    }
}

/// Helper for loop-ledger queries.
pub struct LoopStore<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> LoopStore<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Record that a loop started; each loop id is recorded once
    pub fn record_start(&self, run: &LoopRun) -> Result<()> {
        self.storage.create(LOOPS_COLLECTION, &LoopEntry::started(run))
    }

    /// Record how a loop ended; unknown ids get a fresh entry
    pub fn record_end(&self, run: &LoopRun, outcome: LoopOutcome) -> Result<()> {
        let mut entry = self
            .get(run.id)?
            .unwrap_or_else(|| LoopEntry::started(run));
        entry.ended_at = Some(run.ended_at.unwrap_or_else(crate::id::now_ms));
        entry.outcome = outcome;
        self.storage.upsert(LOOPS_COLLECTION, &entry)
    }

    pub fn get(&self, id: LoopId) -> Result<Option<LoopEntry>> {
        self.storage.get(LOOPS_COLLECTION, &id.to_string())
    }

    pub fn list_all(&self) -> Result<Vec<LoopEntry>> {
        self.storage.list(LOOPS_COLLECTION)
    }

    /// Runs that did not complete
    pub fn find_unsuccessful(&self) -> Result<Vec<LoopEntry>> {
        self.storage
            .query(LOOPS_COLLECTION, &[Filter::ne("outcome", "completed")])
    }

    /// Runs that failed at the named stage
    pub fn failed_at(&self, stage: &str) -> Result<Vec<LoopEntry>> {
        self.storage
            .query(LOOPS_COLLECTION, &[Filter::eq("outcome.failed.stage", stage)])
    }

    /// Map from loop id to ordinal for every known run
    pub fn ordinals(&self) -> Result<HashMap<LoopId, u64>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter_map(|entry| entry.loop_id().map(|id| (id, entry.ordinal)))
            .collect())
    }

    /// Drop finished entries that `keep` rejects; running entries always stay
    pub fn compact(&self, keep: impl Fn(&LoopEntry) -> bool) -> Result<usize> {
        let stale: Vec<String> = self
            .list_all()?
            .into_iter()
            .filter(|entry| entry.outcome != LoopOutcome::Running && !keep(entry))
            .map(|entry| entry.id)
            .collect();
        self.storage.remove(LOOPS_COLLECTION, &stale)
    }

    /// Most recent entries first
    pub fn recent(&self, limit: usize) -> Result<Vec<LoopEntry>> {
        let mut entries = self.list_all()?;
        entries.sort_by(|a, b| b.loop_id().cmp(&a.loop_id()));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonlStorage;
    use tempfile::TempDir;

    fn create_test_storage() -> (JsonlStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonlStorage::new(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_start_then_end() {
        let (storage, _temp) = create_test_storage();
        let ledger = LoopStore::new(&storage);

        let mut run = LoopRun::start(LoopId(1000), 1);
        ledger.record_start(&run).unwrap();
        assert_eq!(ledger.get(LoopId(1000)).unwrap().unwrap().outcome, LoopOutcome::Running);

        run.finish();
        ledger.record_end(&run, LoopOutcome::Completed).unwrap();

        let entry = ledger.get(LoopId(1000)).unwrap().unwrap();
        assert_eq!(entry.outcome, LoopOutcome::Completed);
        assert!(entry.ended_at.is_some());
        assert_eq!(ledger.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_start_recorded_once() {
        let (storage, _temp) = create_test_storage();
        let ledger = LoopStore::new(&storage);
        let run = LoopRun::start(LoopId(1000), 1);

        ledger.record_start(&run).unwrap();
        assert!(ledger.record_start(&run).is_err());
    }

    #[test]
    fn test_end_without_start_creates_entry() {
        let (storage, _temp) = create_test_storage();
        let ledger = LoopStore::new(&storage);

        ledger
            .record_end(&LoopRun::start(LoopId(7), 3), LoopOutcome::Interrupted)
            .unwrap();
        let entry = ledger.get(LoopId(7)).unwrap().unwrap();
        assert_eq!(entry.ordinal, 3);
        assert_eq!(entry.outcome, LoopOutcome::Interrupted);
    }

    #[test]
    fn test_ordinals_and_unsuccessful() {
        let (storage, _temp) = create_test_storage();
        let ledger = LoopStore::new(&storage);

        for (id, ordinal) in [(100, 1), (200, 2), (300, 3)] {
            let run = LoopRun::start(LoopId(id), ordinal);
            ledger.record_start(&run).unwrap();
        }
        let failed = LoopRun::start(LoopId(200), 2);
        ledger
            .record_end(
                &failed,
                LoopOutcome::Failed {
                    stage: "plan".into(),
                    message: "timeout".into(),
                },
            )
            .unwrap();
        ledger
            .record_end(&LoopRun::start(LoopId(100), 1), LoopOutcome::Completed)
            .unwrap();

        let ordinals = ledger.ordinals().unwrap();
        assert_eq!(ordinals.get(&LoopId(300)), Some(&3));

        let unsuccessful: Vec<String> = ledger
            .find_unsuccessful()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(unsuccessful, vec!["200".to_string(), "300".to_string()]);

        assert_eq!(ledger.failed_at("plan").unwrap().len(), 1);
        assert!(ledger.failed_at("review").unwrap().is_empty());

        let recent = ledger.recent(2).unwrap();
        assert_eq!(recent[0].id, "300");
        assert_eq!(recent[1].id, "200");
    }

    #[test]
    fn test_compact_keeps_running_and_accepted() {
        let (storage, _temp) = create_test_storage();
        let ledger = LoopStore::new(&storage);

        for (id, ordinal) in [(100, 1), (200, 2), (300, 3), (400, 4)] {
            let run = LoopRun::start(LoopId(id), ordinal);
            ledger.record_start(&run).unwrap();
            if id != 300 {
                ledger.record_end(&run, LoopOutcome::Completed).unwrap();
            }
        }

        let removed = ledger.compact(|entry| entry.ordinal.is_power_of_two()).unwrap();
        assert_eq!(removed, 0);

        let removed = ledger.compact(|entry| entry.ordinal == 4).unwrap();
        assert_eq!(removed, 2);
        let ids: Vec<String> = ledger.list_all().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["300".to_string(), "400".to_string()]);
    }
}
