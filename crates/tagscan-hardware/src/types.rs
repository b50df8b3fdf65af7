//! Data exchanged between the scanner core and a reader driver.
//!
//! These types are deliberately raw: a [`SensedTarget`] carries the opaque
//! response fields of a discovery request, and a [`TagHandshake`] carries
//! what the driver learned while activating a tag. Classifying them into a
//! tag family is the scanner's job, not the driver's.

use serde::{Deserialize, Serialize};
use std::fmt;
use tagscan_core::{ResponseSignature, TargetProfile, Technology, hex_upper};

/// Reader information.
///
/// Mirrors the details a USB reader reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Vendor name (e.g., "Sony").
    pub vendor: String,

    /// Product name (e.g., "RC-S380/P").
    pub product: String,

    /// Optional chipset name.
    pub chipset: Option<String>,

    /// Connection path the reader was opened with.
    pub path: String,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(
        vendor: impl Into<String>,
        product: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            product: product.into(),
            chipset: None,
            path: path.into(),
        }
    }

    /// Set the chipset name.
    pub fn with_chipset(mut self, chipset: impl Into<String>) -> Self {
        self.chipset = Some(chipset.into());
        self
    }
}

impl fmt::Display for ReaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} at {}", self.vendor, self.product, self.path)?;
        if let Some(chipset) = &self.chipset {
            write!(f, " ({chipset})")?;
        }
        Ok(())
    }
}

/// Byte string that serializes as upper-case hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl TryFrom<String> for HexBytes {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(compact).map(Self)
    }
}

impl From<HexBytes> for String {
    fn from(value: HexBytes) -> Self {
        hex_upper(&value.0)
    }
}

/// Raw answer to a discovery request.
///
/// Ephemeral: it is consumed by the activation attempt that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensedTarget {
    /// Profile the responder answered.
    pub profile: TargetProfile,

    /// Anticollision response (SDD_RES).
    pub sdd_res: Option<Vec<u8>>,

    /// Select response (SEL_RES) or ATTRIB answer.
    pub sel_res: Option<Vec<u8>>,

    /// FeliCa polling response (SENSF_RES).
    pub sensf_res: Option<Vec<u8>>,

    /// ISO 15693 inventory response.
    pub inventory_res: Option<Vec<u8>>,
}

impl SensedTarget {
    /// A target with no response fields set yet.
    #[must_use]
    pub fn new(profile: TargetProfile) -> Self {
        Self {
            profile,
            sdd_res: None,
            sel_res: None,
            sensf_res: None,
            inventory_res: None,
        }
    }

    #[must_use]
    pub fn technology(&self) -> Technology {
        self.profile.technology()
    }

    /// Whether `signature` identifies this responder.
    #[must_use]
    pub fn matches(&self, signature: &ResponseSignature) -> bool {
        match signature {
            ResponseSignature::Select(bytes) => self.sel_res.as_deref() == Some(bytes.as_slice()),
            ResponseSignature::Anticollision(bytes) => {
                self.sdd_res.as_deref() == Some(bytes.as_slice())
            }
        }
    }
}

impl fmt::Display for SensedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.profile.technology())?;
        let fields = [
            ("sdd_res", &self.sdd_res),
            ("sel_res", &self.sel_res),
            ("sensf_res", &self.sensf_res),
            ("inventory_res", &self.inventory_res),
        ];
        for (name, value) in fields {
            if let Some(bytes) = value {
                write!(f, " {name}={}", hex_upper(bytes))?;
            }
        }
        Ok(())
    }
}

/// Driver-side reference to an activated tag.
///
/// Every read primitive takes one so the driver knows which tag the command
/// is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagHandle {
    pub technology: Technology,
    pub identifier: HexBytes,
}

/// What the driver learned while activating a tag.
///
/// Fields that do not apply to the tag's technology stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagHandshake {
    /// UID, PUPI or IDm, in transmission order.
    pub identifier: HexBytes,

    /// IC manufacturer code (ISO/IEC 7816-6).
    pub manufacturer: Option<u8>,

    /// Topaz header ROM bytes `HR0`, `HR1`.
    pub header_rom: Option<[u8; 2]>,

    /// Declared memory size in bytes (Type 1, Type 2, Type 4B).
    pub memory_size: Option<usize>,

    /// Declared block size in bytes (Type 5).
    pub block_size: Option<usize>,

    /// Declared block count (Type 5).
    pub block_count: Option<usize>,

    /// FeliCa system code.
    pub system_code: Option<u16>,

    /// FeliCa service codes enumerated during activation.
    pub service_codes: Vec<u16>,

    /// Whether the tag's memory may be read block by block.
    pub dumpable: bool,
}
