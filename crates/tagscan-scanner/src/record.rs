//! Per-cycle output and where it goes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::identifier::Classification;
use crate::memory::MemoryUnit;

/// Everything one scan cycle learned about a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub classification: Classification,
    pub memory: Vec<MemoryUnit>,

    /// The identifier was already seen earlier in this session.
    pub repeat: bool,

    pub scanned_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Number of memory units read successfully.
    pub fn units_ok(&self) -> usize {
        self.memory.iter().filter(|unit| unit.is_ok()).count()
    }

    /// Number of memory units that failed.
    pub fn units_failed(&self) -> usize {
        self.memory.len() - self.units_ok()
    }
}

/// Receives records as the scan loop produces them.
pub trait RecordSink {
    fn emit(&mut self, record: ScanRecord);
}

impl RecordSink for Vec<ScanRecord> {
    fn emit(&mut self, record: ScanRecord) {
        self.push(record);
    }
}

/// Forwards records to a consumer task. Records are dropped once the
/// receiver is gone.
impl RecordSink for mpsc::UnboundedSender<ScanRecord> {
    fn emit(&mut self, record: ScanRecord) {
        if self.send(record).is_err() {
            tracing::debug!("Record receiver dropped");
        }
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn emit(&mut self, record: ScanRecord) {
        (**self).emit(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::TagDetails;
    use crate::memory::{UnitAddress, UnitOutcome};
    use tagscan_core::{TagFamily, Technology};

    fn record() -> ScanRecord {
        ScanRecord {
            classification: Classification {
                family: TagFamily::Type2,
                display_name: TagFamily::Type2.display_name().to_string(),
                technology: Technology::A106,
                id_bytes: vec![0x04, 0xA1, 0xB2, 0xC3].into(),
                details: TagDetails::Unknown,
            },
            memory: vec![
                MemoryUnit {
                    address: UnitAddress::Block(0),
                    outcome: UnitOutcome::Ok {
                        data: vec![0x04, 0xA1, 0xB2, 0x9E].into(),
                    },
                },
                MemoryUnit {
                    address: UnitAddress::Block(1),
                    outcome: UnitOutcome::Error {
                        reason: "Tag left the field".into(),
                    },
                },
            ],
            repeat: false,
            scanned_at: Utc::now(),
        }
    }

    #[test]
    fn test_unit_counts() {
        let record = record();
        assert_eq!(record.units_ok(), 1);
        assert_eq!(record.units_failed(), 1);
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<ScanRecord> = Vec::new();
        sink.emit(record());
        sink.emit(record());
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(record());
        assert_eq!(rx.recv().await.unwrap().units_ok(), 1);

        drop(rx);
        tx.emit(record());
    }

    #[test]
    fn test_record_serializes_as_one_json_object() {
        let json = serde_json::to_string(&record()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["repeat"], false);
        assert_eq!(value["memory"][1]["status"], "error");
        assert!(!json.contains('\n'));
    }
}
