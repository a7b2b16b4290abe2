//! ID generation utilities for Kaizen
//!
//! Loop identifiers are wall-clock milliseconds, bumped past the previous id
//! so they stay strictly increasing even when two loops start in the same
//! millisecond or the clock steps backwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Identifier of one loop iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopId(pub u64);

impl LoopId {
    /// Next identifier after `last`, derived from the current time
    pub fn next_after(last: Option<LoopId>) -> Self {
        Self::next_at(now_ms(), last)
    }

    fn next_at(now: u64, last: Option<LoopId>) -> Self {
        match last {
            Some(LoopId(prev)) if now <= prev => LoopId(prev + 1),
            _ => LoopId(now),
        }
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LoopId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(LoopId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        assert!(ts > 1577836800000); // 2020-01-01
        assert!(ts < 4102444800000); // 2100-01-01
    }

    #[test]
    fn test_next_at_uses_clock_when_ahead() {
        assert_eq!(LoopId::next_at(5000, Some(LoopId(4000))), LoopId(5000));
        assert_eq!(LoopId::next_at(5000, None), LoopId(5000));
    }

    #[test]
    fn test_next_at_bumps_past_previous() {
        assert_eq!(LoopId::next_at(5000, Some(LoopId(5000))), LoopId(5001));
        // clock went backwards
        assert_eq!(LoopId::next_at(4000, Some(LoopId(5000))), LoopId(5001));
    }

    #[test]
    fn test_next_after_is_strictly_increasing() {
        let mut last = None;
        for _ in 0..100 {
            let id = LoopId::next_after(last);
            if let Some(prev) = last {
                assert!(id > prev);
            }
            last = Some(id);
        }
    }

    #[test]
    fn test_loop_id_display_and_parse() {
        let id = LoopId(1738300800123);
        assert_eq!(id.to_string(), "1738300800123");
        assert_eq!("1738300800123".parse::<LoopId>().unwrap(), id);
        assert!("abc".parse::<LoopId>().is_err());
    }

    #[test]
    fn test_loop_id_serializes_as_number() {
        let json = serde_json::to_string(&LoopId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
