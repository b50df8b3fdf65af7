//! Reading a tag's addressable memory with per-unit failure isolation.
//!
//! [`read_all`] returns one [`MemoryUnit`] per attempted unit, in address
//! order, whatever the tag answers for each. It never fails. A reader fault
//! stops the read at that unit and is handed back beside the units read so
//! far.

use serde::{Deserialize, Serialize};
use tagscan_hardware::{BlockReadError, ContactlessReader, HexBytes, ReaderError, TagHandle};
use tracing::{debug, warn};

use crate::error::Folded;
use crate::tag::ActivatedTag;

/// FeliCa services are read at block 0 only.
const FELICA_SERVICE_BLOCK: u16 = 0;

/// Address of one memory unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitAddress {
    /// Block index of a block-addressed tag.
    Block(u16),
    /// Service code and block number of a FeliCa tag.
    Service { code: u16, block: u16 },
}

/// Outcome of reading one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Ok { data: HexBytes },
    Error { reason: String },
}

/// One addressable read result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUnit {
    pub address: UnitAddress,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

impl MemoryUnit {
    /// Fold one read into a unit, or hand back the reader fault.
    fn from_read(
        address: UnitAddress,
        result: Result<Vec<u8>, BlockReadError>,
    ) -> Result<Self, ReaderError> {
        let outcome = match result {
            Ok(data) => UnitOutcome::Ok { data: data.into() },
            Err(BlockReadError::Reader(fault)) => return Err(fault),
            Err(e) => {
                debug!("{:?} unreadable: {}", address, e);
                UnitOutcome::Error {
                    reason: e.to_string(),
                }
            }
        };
        Ok(Self { address, outcome })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Ok { .. })
    }

    pub fn data(&self) -> Option<&[u8]> {
        match &self.outcome {
            UnitOutcome::Ok { data } => Some(data.as_slice()),
            UnitOutcome::Error { .. } => None,
        }
    }
}

async fn read_blocks<R: ContactlessReader>(
    reader: &mut R,
    handle: &TagHandle,
    block_count: usize,
) -> Folded<Vec<MemoryUnit>> {
    let mut units = Vec::with_capacity(block_count);
    for index in (0..=u16::MAX).take(block_count) {
        let result = reader.read_single_block(handle, index).await;
        match MemoryUnit::from_read(UnitAddress::Block(index), result) {
            Ok(unit) => units.push(unit),
            Err(fault) => return Folded::interrupted(units, fault),
        }
    }
    Folded::complete(units)
}

async fn read_services<R: ContactlessReader>(
    reader: &mut R,
    handle: &TagHandle,
    service_codes: &[u16],
) -> Folded<Vec<MemoryUnit>> {
    let mut units = Vec::with_capacity(service_codes.len());
    for &code in service_codes {
        let result = reader
            .read_without_encryption(handle, &[code], &[FELICA_SERVICE_BLOCK])
            .await
            .and_then(|mut blocks| {
                blocks.pop().ok_or(BlockReadError::Protocol { status: 0 })
            });
        let address = UnitAddress::Service {
            code,
            block: FELICA_SERVICE_BLOCK,
        };
        match MemoryUnit::from_read(address, result) {
            Ok(unit) => units.push(unit),
            Err(fault) => return Folded::interrupted(units, fault),
        }
    }
    Folded::complete(units)
}

/// Read every addressable unit of `tag`.
///
/// Returns no units for tags that are not dumpable and for families with no
/// addressable memory (Type 4A, Unknown).
pub async fn read_all<R: ContactlessReader>(
    reader: &mut R,
    tag: &ActivatedTag,
) -> Folded<Vec<MemoryUnit>> {
    let capabilities = tag.capabilities();
    if !capabilities.dumpable {
        return Folded::complete(Vec::new());
    }

    let folded = match tag {
        ActivatedTag::Type1 { base, .. }
        | ActivatedTag::Type2 { base, .. }
        | ActivatedTag::Type4B { base, .. }
        | ActivatedTag::Type5 { base, .. } => {
            read_blocks(reader, &base.handle, capabilities.block_count).await
        }
        ActivatedTag::Type3 {
            base,
            service_codes,
            ..
        } => read_services(reader, &base.handle, service_codes).await,
        ActivatedTag::Type4A { .. } | ActivatedTag::Unknown { .. } => Folded::complete(Vec::new()),
    };

    if let Some(fault) = &folded.reader_fault {
        warn!(
            "Reading {} stopped after {} units: {}",
            tag.family(),
            folded.value.len(),
            fault
        );
        return folded;
    }

    let failed = folded.value.iter().filter(|unit| !unit.is_ok()).count();
    if failed > 0 {
        warn!(
            "{} of {} memory units of {} unreadable",
            failed,
            folded.value.len(),
            tag.family()
        );
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagBase;
    use tagscan_core::Technology;
    use tagscan_hardware::mock::{ServiceReply, SimulatedReader, SimulatedTag, UnitReply};

    const IDM: [u8; 8] = [0x01, 0x2E, 0x4C, 0xD2, 0x11, 0x22, 0x33, 0x44];

    fn uid7() -> Vec<u8> {
        vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80]
    }

    fn handle(technology: Technology, identifier: &[u8]) -> TagBase {
        TagBase::new(TagHandle {
            technology,
            identifier: identifier.into(),
        })
    }

    fn type2(memory_size: usize, dumpable: bool) -> ActivatedTag {
        ActivatedTag::Type2 {
            base: handle(Technology::A106, &uid7()),
            memory_size,
            dumpable,
        }
    }

    #[tokio::test]
    async fn test_not_dumpable_yields_nothing() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present(SimulatedTag::type2(uid7(), vec![UnitReply::data(vec![0; 4])]))
            .await;

        let units = read_all(&mut reader, &type2(4, false)).await.value;
        assert!(units.is_empty());
    }

    #[tokio::test]
    async fn test_failing_unit_is_isolated() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present(SimulatedTag::type2(
                uid7(),
                vec![
                    UnitReply::data(vec![0x04, 0xA1, 0xB2, 0x9E]),
                    UnitReply::data(vec![0xC3, 0xD4, 0xE5, 0x80]),
                    UnitReply::error(0x01),
                    UnitReply::data(vec![0xE1, 0x10, 0x06, 0x00]),
                ],
            ))
            .await;

        let units = read_all(&mut reader, &type2(16, true)).await.value;

        assert_eq!(units.len(), 4);
        assert!(units[0].is_ok());
        assert!(units[1].is_ok());
        assert!(!units[2].is_ok());
        assert!(units[3].is_ok());
        assert_eq!(units[2].address, UnitAddress::Block(2));
        assert_eq!(units[3].data(), Some(&[0xE1, 0x10, 0x06, 0x00][..]));
    }

    #[tokio::test]
    async fn test_declared_size_beyond_memory_reports_out_of_range() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present(SimulatedTag::type2(uid7(), vec![UnitReply::data(vec![0; 4])]))
            .await;

        // 10 bytes declared: three 4-byte pages, only one stored
        let units = read_all(&mut reader, &type2(10, true)).await.value;

        assert_eq!(units.len(), 3);
        assert!(units[0].is_ok());
        assert_eq!(
            units[1].outcome,
            UnitOutcome::Error {
                reason: "Block 1 out of range".into()
            }
        );
    }

    #[tokio::test]
    async fn test_tag_removed_mid_read_is_folded() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present(SimulatedTag::type2(uid7(), vec![UnitReply::data(vec![0; 4]); 2]))
            .await;
        handle.withdraw_all().await;

        let folded = read_all(&mut reader, &type2(8, true)).await;

        assert!(folded.is_complete());
        assert_eq!(folded.value.len(), 2);
        assert!(folded.value.iter().all(|unit| {
            unit.outcome
                == UnitOutcome::Error {
                    reason: "Tag left the field".into(),
                }
        }));
    }

    #[tokio::test]
    async fn test_unplugged_reader_stops_the_read() {
        let (mut reader, handle) = SimulatedReader::with_path("usb:0");
        handle
            .present(SimulatedTag::type2(
                uid7(),
                vec![
                    UnitReply::data(vec![0x04, 0xA1, 0xB2, 0x9E]),
                    UnitReply::Unplug,
                    UnitReply::data(vec![0; 4]),
                    UnitReply::data(vec![0; 4]),
                ],
            ))
            .await;

        let folded = read_all(&mut reader, &type2(16, true)).await;

        assert_eq!(folded.value.len(), 1);
        assert!(folded.value[0].is_ok());
        assert!(matches!(
            folded.reader_fault,
            Some(ReaderError::Disconnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_unplugged_reader_stops_service_reads() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present(SimulatedTag::type3(
                IDM,
                0xFE00,
                vec![
                    ServiceReply::new(0x000B, vec![UnitReply::Unplug]),
                    ServiceReply::new(0x100B, vec![UnitReply::data(vec![0; 16])]),
                ],
            ))
            .await;
        let tag = ActivatedTag::Type3 {
            base: handle_base_f212(),
            system_code: Some(0xFE00),
            service_codes: vec![0x000B, 0x100B],
            dumpable: true,
        };

        let folded = read_all(&mut reader, &tag).await;

        assert!(folded.value.is_empty());
        assert!(folded.into_result().is_err());
    }

    #[tokio::test]
    async fn test_felica_services_read_block_zero() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present(SimulatedTag::type3(
                IDM,
                0xFE00,
                vec![
                    ServiceReply::new(0x000B, vec![UnitReply::data(vec![0x11; 16])]),
                    ServiceReply::new(0x100B, vec![UnitReply::error(0x01A6)]),
                ],
            ))
            .await;
        let tag = ActivatedTag::Type3 {
            base: handle_base_f212(),
            system_code: Some(0xFE00),
            service_codes: vec![0x000B, 0x100B],
            dumpable: true,
        };

        let units = read_all(&mut reader, &tag).await.value;

        assert_eq!(units.len(), 2);
        assert_eq!(
            units[0].address,
            UnitAddress::Service {
                code: 0x000B,
                block: 0
            }
        );
        assert_eq!(units[0].data(), Some(&[0x11; 16][..]));
        assert!(!units[1].is_ok());
        assert_eq!(
            units[1].address,
            UnitAddress::Service {
                code: 0x100B,
                block: 0
            }
        );
    }

    fn handle_base_f212() -> TagBase {
        handle(Technology::F212, &IDM)
    }

    #[tokio::test]
    async fn test_type4a_and_unknown_have_no_memory() {
        let (mut reader, _handle) = SimulatedReader::new();

        let type4a = ActivatedTag::Type4A {
            base: handle(Technology::A106, &[0x08, 1, 2, 3]),
        };
        let unknown = ActivatedTag::Unknown {
            technology: Technology::A106,
            identifier: None,
        };

        assert!(read_all(&mut reader, &type4a).await.value.is_empty());
        assert!(read_all(&mut reader, &unknown).await.value.is_empty());
    }

    #[tokio::test]
    async fn test_type5_uses_declared_block_count() {
        let uid = [0xE0, 0x04, 0x01, 0x50, 0x12, 0x34, 0x56, 0x78];
        let (mut reader, handle_) = SimulatedReader::new();
        handle_
            .present(SimulatedTag::type5(
                uid,
                4,
                vec![UnitReply::data(vec![1, 2, 3, 4]), UnitReply::data(vec![5, 6, 7, 8])],
            ))
            .await;
        let tag = ActivatedTag::Type5 {
            base: handle(Technology::vicinity(), &uid),
            block_size: 4,
            block_count: 2,
            dumpable: true,
        };

        let units = read_all(&mut reader, &tag).await.value;
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(MemoryUnit::is_ok));
    }

    #[test]
    fn test_memory_unit_json_shape() {
        let unit = MemoryUnit {
            address: UnitAddress::Block(3),
            outcome: UnitOutcome::Ok {
                data: vec![0xE1, 0x10].into(),
            },
        };
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"address": {"block": 3}, "status": "ok", "data": "E110"})
        );
    }
}
