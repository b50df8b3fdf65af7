//! Simulated tags for the mock reader.
//!
//! A [`SimulatedTag`] describes how one tag answers discovery, activation,
//! reads and APDUs. Tags are plain data so they can be loaded from a JSON
//! scenario file as well as built in tests.
//!
//! # Examples
//!
//! ```
//! use tagscan_hardware::mock::{SimulatedTag, UnitReply};
//!
//! let tag = SimulatedTag::type2(
//!     vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80],
//!     vec![UnitReply::data(vec![0x04, 0xA1, 0xB2, 0x9E]), UnitReply::error(0x01)],
//! );
//! assert_eq!(tag.technology.to_string(), "106A");
//! ```

use serde::{Deserialize, Serialize};
use tagscan_core::{
    TargetProfile, Technology,
    constants::{TYPE1_BLOCK_SIZE, TYPE2_BLOCK_SIZE},
};

use crate::types::{HexBytes, SensedTarget, TagHandshake};

/// Outcome of reading one simulated memory unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitReply {
    /// The unit reads back these bytes.
    Data(HexBytes),
    /// The tag refuses the read with this status.
    Error(u16),
    /// The reader drops off the bus while reading this unit.
    Unplug,
}

impl UnitReply {
    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Data(HexBytes(bytes.into()))
    }

    pub fn error(status: u16) -> Self {
        Self::Error(status)
    }
}

/// Blocks stored under one FeliCa service code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReply {
    pub code: u16,
    pub blocks: Vec<UnitReply>,
}

impl ServiceReply {
    pub fn new(code: u16, blocks: Vec<UnitReply>) -> Self {
        Self { code, blocks }
    }
}

/// How the simulated tag answers an APDU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApduReply {
    /// Response bytes, including the status word.
    Response(HexBytes),
    /// The exchange is refused with this status word.
    Reject(u16),
    /// The reader drops off the bus during the exchange.
    Unplug,
}

/// How the simulated tag answers the activation handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedActivation {
    /// Handshake succeeds with this data.
    Handshake(TagHandshake),
    /// Tag refuses activation with this status.
    Reject(u16),
    /// Driver has no handshake for this tag.
    #[default]
    Unsupported,
}

/// A tag the mock reader can place in its field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedTag {
    /// Technology the tag answers to.
    pub technology: Technology,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdd_res: Option<HexBytes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sel_res: Option<HexBytes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensf_res: Option<HexBytes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_res: Option<HexBytes>,

    /// FeliCa system code matched against custom polling payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_code: Option<u16>,

    #[serde(default)]
    pub activation: SimulatedActivation,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<UnitReply>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceReply>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apdu: Option<ApduReply>,
}

impl SimulatedTag {
    /// A tag that answers `technology` polls and nothing else.
    pub fn new(technology: Technology) -> Self {
        Self {
            technology,
            sdd_res: None,
            sel_res: None,
            sensf_res: None,
            inventory_res: None,
            system_code: None,
            activation: SimulatedActivation::Unsupported,
            blocks: Vec::new(),
            services: Vec::new(),
            apdu: None,
        }
    }

    /// Topaz tag with 8-byte blocks.
    pub fn type1(uid: Vec<u8>, blocks: Vec<UnitReply>) -> Self {
        let handshake = TagHandshake {
            identifier: HexBytes(uid.clone()),
            manufacturer: uid.first().copied(),
            header_rom: Some([0x11, 0x48]),
            memory_size: Some(blocks.len() * TYPE1_BLOCK_SIZE),
            dumpable: true,
            ..TagHandshake::default()
        };
        Self {
            sdd_res: Some(HexBytes(uid)),
            activation: SimulatedActivation::Handshake(handshake),
            blocks,
            ..Self::new(Technology::A106)
        }
    }

    /// NFC Forum Type 2 tag with 4-byte pages.
    pub fn type2(uid: Vec<u8>, blocks: Vec<UnitReply>) -> Self {
        let handshake = TagHandshake {
            identifier: HexBytes(uid.clone()),
            manufacturer: uid.first().copied(),
            memory_size: Some(blocks.len() * TYPE2_BLOCK_SIZE),
            dumpable: true,
            ..TagHandshake::default()
        };
        Self {
            sdd_res: Some(HexBytes(uid)),
            activation: SimulatedActivation::Handshake(handshake),
            blocks,
            ..Self::new(Technology::A106)
        }
    }

    /// FeliCa card answering polls for `system_code`.
    pub fn type3(idm: [u8; 8], system_code: u16, services: Vec<ServiceReply>) -> Self {
        let mut sensf_res = vec![0x01];
        sensf_res.extend_from_slice(&idm);
        sensf_res.extend_from_slice(&[0x03, 0x01, 0x4B, 0x02, 0x4F, 0x49, 0x93, 0xFF]);
        sensf_res.extend_from_slice(&system_code.to_be_bytes());

        let handshake = TagHandshake {
            identifier: HexBytes(idm.to_vec()),
            system_code: Some(system_code),
            service_codes: services.iter().map(|s| s.code).collect(),
            dumpable: true,
            ..TagHandshake::default()
        };
        Self {
            sensf_res: Some(HexBytes(sensf_res)),
            system_code: Some(system_code),
            activation: SimulatedActivation::Handshake(handshake),
            services,
            ..Self::new(Technology::F212)
        }
    }

    /// ISO-DEP Type A card.
    pub fn type4a(uid: Vec<u8>, apdu: ApduReply) -> Self {
        let handshake = TagHandshake {
            identifier: HexBytes(uid.clone()),
            manufacturer: uid.first().copied(),
            ..TagHandshake::default()
        };
        Self {
            sdd_res: Some(HexBytes(uid)),
            sel_res: Some(HexBytes(vec![0x20])),
            activation: SimulatedActivation::Handshake(handshake),
            apdu: Some(apdu),
            ..Self::new(Technology::A106)
        }
    }

    /// ISO-DEP Type B card with block-readable memory.
    pub fn type4b(pupi: Vec<u8>, blocks: Vec<UnitReply>) -> Self {
        let handshake = TagHandshake {
            identifier: HexBytes(pupi),
            memory_size: Some(blocks.len() * TYPE2_BLOCK_SIZE),
            dumpable: true,
            ..TagHandshake::default()
        };
        Self {
            sel_res: Some(HexBytes(vec![0x00])),
            activation: SimulatedActivation::Handshake(handshake),
            blocks,
            apdu: Some(ApduReply::Reject(0x6A82)),
            ..Self::new(Technology::B106)
        }
    }

    /// ISO 15693 tag; `uid` is in transmission order (`E0` first).
    pub fn type5(uid: [u8; 8], block_size: usize, blocks: Vec<UnitReply>) -> Self {
        let mut inventory_res = vec![0x00];
        inventory_res.extend_from_slice(&uid);

        let handshake = TagHandshake {
            identifier: HexBytes(uid.to_vec()),
            manufacturer: Some(uid[1]),
            block_size: Some(block_size),
            block_count: Some(blocks.len()),
            dumpable: true,
            ..TagHandshake::default()
        };
        Self {
            inventory_res: Some(HexBytes(inventory_res)),
            activation: SimulatedActivation::Handshake(handshake),
            blocks,
            ..Self::new(Technology::vicinity())
        }
    }

    /// Make the tag refuse activation with `status`.
    #[must_use]
    pub fn rejecting(mut self, status: u16) -> Self {
        self.activation = SimulatedActivation::Reject(status);
        self
    }

    /// Mark the tag's memory as not dumpable.
    #[must_use]
    pub fn not_dumpable(mut self) -> Self {
        if let SimulatedActivation::Handshake(handshake) = &mut self.activation {
            handshake.dumpable = false;
        }
        self
    }

    /// Identifier reported by the handshake, if the tag activates.
    pub fn identifier(&self) -> Option<&[u8]> {
        match &self.activation {
            SimulatedActivation::Handshake(handshake) => Some(handshake.identifier.as_slice()),
            _ => None,
        }
    }

    /// Answer a discovery request for `profile`, if this tag responds to it.
    pub fn answer(&self, profile: &TargetProfile) -> Option<SensedTarget> {
        if profile.technology() != self.technology {
            return None;
        }
        if let Some(poll) = profile.felica_poll() {
            let accepted = self.system_code.is_some_and(|code| poll.accepts(code));
            if !accepted {
                return None;
            }
        }

        let target = SensedTarget {
            profile: profile.clone(),
            sdd_res: self.sdd_res.as_ref().map(|b| b.0.clone()),
            sel_res: self.sel_res.as_ref().map(|b| b.0.clone()),
            sensf_res: self.sensf_res.as_ref().map(|b| b.0.clone()),
            inventory_res: self.inventory_res.as_ref().map(|b| b.0.clone()),
        };

        match profile.signature() {
            Some(signature) if !target.matches(signature) => None,
            _ => Some(target),
        }
    }
}
