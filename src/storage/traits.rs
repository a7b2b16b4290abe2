//! Storage trait and record filters.

use crate::error::Result;
use serde::{Serialize, de::DeserializeOwned};

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// Match on one field of a stored record.
///
/// `field` may be a dotted path into nested objects, e.g.
/// `outcome.failed.stage`. A missing field compares as `null`.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

impl Filter {
    fn new(field: impl Into<String>, op: FilterOp, value: impl Serialize) -> Self {
        Self {
            field: field.into(),
            op,
            value: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Serialize) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Serialize) -> Self {
        Self::new(field, FilterOp::Ne, value)
    }

    fn lookup<'a>(&self, record: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        self.field
            .split('.')
            .try_fold(record, |value, key| value.get(key))
    }

    pub fn matches(&self, record: &serde_json::Value) -> bool {
        let found = self.lookup(record).unwrap_or(&serde_json::Value::Null);
        match self.op {
            FilterOp::Eq => *found == self.value,
            FilterOp::Ne => *found != self.value,
        }
    }
}

/// Records addressable by a string key.
pub trait HasId {
    fn id(&self) -> &str;
}

/// Keyed record collections.
pub trait Storage: Send + Sync {
    /// Append a record whose id is not yet present.
    fn create<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()>;

    fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>>;

    /// Replace the record with the same id, or append it if absent.
    fn upsert<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()>;

    /// Records matching every filter, in insertion order.
    fn query<T: DeserializeOwned>(&self, collection: &str, filters: &[Filter]) -> Result<Vec<T>>;

    /// Drop the records with the given ids; returns how many were present.
    fn remove(&self, collection: &str, ids: &[String]) -> Result<usize>;

    fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        self.query(collection, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_eq_matches() {
        let filter = Filter::eq("outcome", "completed");
        assert!(filter.matches(&json!({"id": "1", "outcome": "completed"})));
        assert!(!filter.matches(&json!({"id": "1", "outcome": "running"})));
    }

    #[test]
    fn test_missing_field_is_null() {
        assert!(Filter::eq("ended_at", serde_json::Value::Null).matches(&json!({"id": "1"})));
        assert!(Filter::ne("ended_at", 5).matches(&json!({"id": "1"})));
    }

    #[test]
    fn test_filter_ne() {
        let filter = Filter::ne("outcome", "completed");
        assert!(filter.matches(&json!({"id": "1", "outcome": {"failed": {"stage": "plan"}}})));
        assert!(!filter.matches(&json!({"id": "1", "outcome": "completed"})));
    }

    #[test]
    fn test_dotted_path() {
        let record = json!({"id": "1", "outcome": {"failed": {"stage": "plan", "message": "timeout"}}});
        assert!(Filter::eq("outcome.failed.stage", "plan").matches(&record));
        assert!(!Filter::eq("outcome.failed.stage", "review").matches(&record));
        assert!(!Filter::eq("outcome.failed.stage", "plan").matches(&json!({"outcome": "completed"})));
    }
}
