//! Per-run bookkeeping.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// State owned by one scan run: identifiers seen so far and counters.
#[derive(Debug)]
pub struct ScanSession {
    seen_ids: HashSet<Vec<u8>>,
    started_at: DateTime<Utc>,
    started: Instant,
    cycles: u64,
    records: u64,
    skipped: u64,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            seen_ids: HashSet::new(),
            started_at: Utc::now(),
            started: Instant::now(),
            cycles: 0,
            records: 0,
            skipped: 0,
        }
    }

    /// Record `identifier` as seen. Returns `true` if it had been seen
    /// before in this session.
    ///
    /// Empty identifiers (unknown tags) are never tracked and never repeat.
    pub fn observe(&mut self, identifier: &[u8]) -> bool {
        if identifier.is_empty() {
            return false;
        }
        !self.seen_ids.insert(identifier.to_vec())
    }

    pub fn has_seen(&self, identifier: &[u8]) -> bool {
        self.seen_ids.contains(identifier)
    }

    pub(crate) fn start_cycle(&mut self) {
        self.cycles += 1;
    }

    pub(crate) fn count_record(&mut self) {
        self.records += 1;
    }

    pub(crate) fn count_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            started_at: self.started_at,
            cycles: self.cycles,
            records: self.records,
            unique_ids: self.seen_ids.len(),
            skipped: self.skipped,
            elapsed: self.elapsed(),
        }
    }
}

/// End-of-run statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub started_at: DateTime<Utc>,
    /// Sense attempts, including those that found nothing.
    pub cycles: u64,
    pub records: u64,
    pub unique_ids: usize,
    /// Cycles abandoned because activation failed.
    pub skipped: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_flags_repeats() {
        let mut session = ScanSession::new();
        let uid = [0x04, 0xA1, 0xB2, 0xC3];

        assert!(!session.observe(&uid));
        assert!(session.has_seen(&uid));
        assert!(session.observe(&uid));
        assert!(!session.observe(&[0x08, 1, 2, 3]));
        assert_eq!(session.summary().unique_ids, 2);
    }

    #[test]
    fn test_empty_identifier_never_repeats() {
        let mut session = ScanSession::new();
        assert!(!session.observe(&[]));
        assert!(!session.observe(&[]));
        assert_eq!(session.summary().unique_ids, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_counts_and_elapsed() {
        let mut session = ScanSession::new();
        session.start_cycle();
        session.start_cycle();
        session.count_skipped();
        session.start_cycle();
        session.count_record();
        tokio::time::advance(Duration::from_millis(1500)).await;

        let summary = session.summary();
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.records, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.elapsed, Duration::from_millis(1500));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["elapsed"], 1500);
    }
}
