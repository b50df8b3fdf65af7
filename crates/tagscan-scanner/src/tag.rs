//! Activated tag sessions.
//!
//! [`ActivatedTag`] is a closed union over the tag families. Every consumer
//! (classification, memory reads, presence tracking) matches it exhaustively.

use tagscan_core::{
    ResponseSignature, TagFamily, TargetProfile, Technology,
    constants::{TYPE1_BLOCK_SIZE, TYPE2_BLOCK_SIZE},
};
use tagscan_hardware::TagHandle;
use tracing::warn;

/// FeliCa blocks are always 16 bytes.
const FELICA_BLOCK_SIZE: usize = 16;

/// Blocks addressable with a 16-bit block number.
pub const MAX_BLOCK_COUNT: usize = 1 << 16;

/// What the memory reader may do with a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub dumpable: bool,
    pub block_size: usize,
    pub block_count: usize,
}

impl Capabilities {
    /// No addressable memory.
    pub const NONE: Capabilities = Capabilities {
        dumpable: false,
        block_size: 0,
        block_count: 0,
    };

    /// Block-addressed memory. Counts beyond [`MAX_BLOCK_COUNT`] are
    /// clamped, since later blocks have no address.
    pub fn blocks(dumpable: bool, block_size: usize, block_count: usize) -> Self {
        if block_count > MAX_BLOCK_COUNT {
            warn!(
                "Declared {} blocks, only the first {} are addressable",
                block_count, MAX_BLOCK_COUNT
            );
        }
        Self {
            dumpable,
            block_size,
            block_count: block_count.min(MAX_BLOCK_COUNT),
        }
    }

    /// Block count derived from a declared memory size.
    pub fn from_memory_size(dumpable: bool, memory_size: usize, block_size: usize) -> Self {
        Self::blocks(dumpable, block_size, memory_size.div_ceil(block_size))
    }
}

/// State shared by every activated family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBase {
    /// Driver reference used by every read primitive.
    pub handle: TagHandle,

    /// IC manufacturer code (ISO/IEC 7816-6).
    pub manufacturer: Option<u8>,

    /// Profile that re-senses this exact tag, if the family has one.
    pub presence: Option<TargetProfile>,
}

impl TagBase {
    pub fn new(handle: TagHandle) -> Self {
        Self {
            handle,
            manufacturer: None,
            presence: None,
        }
    }

    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: Option<u8>) -> Self {
        self.manufacturer = manufacturer;
        self
    }

    /// Attach a presence profile built from the tag's own response.
    #[must_use]
    pub fn with_presence_signature(mut self, signature: ResponseSignature) -> Self {
        self.presence = Some(TargetProfile::new(self.handle.technology).with_signature(signature));
        self
    }
}

/// A tag session after a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivatedTag {
    /// Topaz.
    Type1 {
        base: TagBase,
        header_rom: [u8; 2],
        memory_size: usize,
        dumpable: bool,
    },
    /// MIFARE Ultralight and compatible.
    Type2 {
        base: TagBase,
        memory_size: usize,
        dumpable: bool,
    },
    /// FeliCa.
    Type3 {
        base: TagBase,
        system_code: Option<u16>,
        service_codes: Vec<u16>,
        dumpable: bool,
    },
    /// ISO-DEP over Type A.
    Type4A { base: TagBase },
    /// ISO-DEP over Type B.
    Type4B {
        base: TagBase,
        memory_size: usize,
        dumpable: bool,
    },
    /// ISO 15693.
    Type5 {
        base: TagBase,
        block_size: usize,
        block_count: usize,
        dumpable: bool,
    },
    /// A tag the driver could talk to but not place in a family: the
    /// handshake completed but the discovery response had no FeliCa, select,
    /// inventory or anticollision answer.
    Unknown {
        technology: Technology,
        identifier: Option<Vec<u8>>,
    },
}

impl ActivatedTag {
    pub fn family(&self) -> TagFamily {
        match self {
            ActivatedTag::Type1 { .. } => TagFamily::Type1,
            ActivatedTag::Type2 { .. } => TagFamily::Type2,
            ActivatedTag::Type3 { .. } => TagFamily::Type3,
            ActivatedTag::Type4A { .. } => TagFamily::Type4A,
            ActivatedTag::Type4B { .. } => TagFamily::Type4B,
            ActivatedTag::Type5 { .. } => TagFamily::Type5,
            ActivatedTag::Unknown { .. } => TagFamily::Unknown,
        }
    }

    /// Shared state, absent for `Unknown`.
    pub fn base(&self) -> Option<&TagBase> {
        match self {
            ActivatedTag::Type1 { base, .. }
            | ActivatedTag::Type2 { base, .. }
            | ActivatedTag::Type3 { base, .. }
            | ActivatedTag::Type4A { base }
            | ActivatedTag::Type4B { base, .. }
            | ActivatedTag::Type5 { base, .. } => Some(base),
            ActivatedTag::Unknown { .. } => None,
        }
    }

    pub fn technology(&self) -> Technology {
        match self {
            ActivatedTag::Type1 { base, .. }
            | ActivatedTag::Type2 { base, .. }
            | ActivatedTag::Type3 { base, .. }
            | ActivatedTag::Type4A { base }
            | ActivatedTag::Type4B { base, .. }
            | ActivatedTag::Type5 { base, .. } => base.handle.technology,
            ActivatedTag::Unknown { technology, .. } => *technology,
        }
    }

    /// Identifier bytes (UID, PUPI or IDm). Empty if unknown.
    pub fn identifier(&self) -> &[u8] {
        match self {
            ActivatedTag::Unknown { identifier, .. } => identifier.as_deref().unwrap_or_default(),
            _ => self
                .base()
                .map(|base| base.handle.identifier.as_slice())
                .unwrap_or_default(),
        }
    }

    pub fn handle(&self) -> Option<&TagHandle> {
        self.base().map(|base| &base.handle)
    }

    /// Profile to re-sense this tag with, if the family has a reliable
    /// presence signature.
    pub fn presence_profile(&self) -> Option<&TargetProfile> {
        self.base().and_then(|base| base.presence.as_ref())
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            ActivatedTag::Type1 {
                memory_size,
                dumpable,
                ..
            } => Capabilities::from_memory_size(*dumpable, *memory_size, TYPE1_BLOCK_SIZE),
            ActivatedTag::Type2 {
                memory_size,
                dumpable,
                ..
            }
            | ActivatedTag::Type4B {
                memory_size,
                dumpable,
                ..
            } => Capabilities::from_memory_size(*dumpable, *memory_size, TYPE2_BLOCK_SIZE),
            ActivatedTag::Type3 {
                service_codes,
                dumpable,
                ..
            } => Capabilities {
                dumpable: *dumpable,
                block_size: FELICA_BLOCK_SIZE,
                block_count: service_codes.len(),
            },
            ActivatedTag::Type5 {
                block_size,
                block_count,
                dumpable,
                ..
            } => Capabilities::blocks(*dumpable, *block_size, *block_count),
            ActivatedTag::Type4A { .. } | ActivatedTag::Unknown { .. } => Capabilities::NONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn base(technology: Technology, uid: &[u8]) -> TagBase {
        TagBase::new(TagHandle {
            technology,
            identifier: uid.into(),
        })
    }

    #[rstest]
    #[case(0, 0)]
    #[case(4, 1)]
    #[case(48, 12)]
    #[case(50, 13)]
    fn test_type2_block_count_rounds_up(#[case] memory_size: usize, #[case] blocks: usize) {
        let tag = ActivatedTag::Type2 {
            base: base(Technology::A106, &[0x04, 1, 2, 3, 4, 5, 6]),
            memory_size,
            dumpable: true,
        };
        assert_eq!(tag.capabilities().block_count, blocks);
        assert_eq!(tag.capabilities().block_size, 4);
    }

    #[test]
    fn test_block_count_clamped_to_addressable_range() {
        let tag = ActivatedTag::Type5 {
            base: base(Technology::vicinity(), &[0xE0, 0x04, 1, 2, 3, 4, 5, 6]),
            block_size: 4,
            block_count: MAX_BLOCK_COUNT + 10,
            dumpable: true,
        };
        assert_eq!(tag.capabilities().block_count, MAX_BLOCK_COUNT);

        let huge = Capabilities::from_memory_size(true, usize::MAX, TYPE2_BLOCK_SIZE);
        assert_eq!(huge.block_count, MAX_BLOCK_COUNT);
    }

    #[test]
    fn test_type1_uses_eight_byte_blocks() {
        let tag = ActivatedTag::Type1 {
            base: base(Technology::A106, &[0x01, 2, 3, 4]),
            header_rom: [0x11, 0x48],
            memory_size: 120,
            dumpable: true,
        };
        assert_eq!(tag.capabilities().block_size, 8);
        assert_eq!(tag.capabilities().block_count, 15);
    }

    #[test]
    fn test_unknown_tag_has_no_memory_or_presence() {
        let tag = ActivatedTag::Unknown {
            technology: Technology::A106,
            identifier: None,
        };
        assert_eq!(tag.family(), TagFamily::Unknown);
        assert!(tag.identifier().is_empty());
        assert!(tag.handle().is_none());
        assert!(tag.presence_profile().is_none());
        assert_eq!(tag.capabilities(), Capabilities::NONE);
    }

    #[test]
    fn test_presence_profile_carries_signature() {
        let tag = ActivatedTag::Type4A {
            base: base(Technology::A106, &[0x08, 1, 2, 3])
                .with_presence_signature(ResponseSignature::Select(vec![0x20])),
        };
        let profile = tag.presence_profile().unwrap();
        assert_eq!(profile.to_string(), "106A sel_res=20");
        assert_eq!(tag.capabilities(), Capabilities::NONE);
    }
}
