//! Tag classification: canonical identifier and descriptive metadata.
//!
//! [`classify`] never fails. For ISO-DEP tags it sends one diagnostic
//! SELECT for the `1PAY.SYS.DDF01` payment directory. Most cards refuse it,
//! which is recorded as an informational [`ProbeOutcome::Rejected`]. A reader
//! fault during the exchange is handed back beside the classification.

use serde::{Deserialize, Serialize};
use tagscan_core::{
    TagFamily, Technology,
    constants::{SELECT_PAY_SYS_DDF01, SW_SUCCESS},
    hex_upper,
};
use tagscan_hardware::{ActivationError, ContactlessReader, HexBytes, ReaderError, TagHandle};
use tracing::debug;

use crate::error::Folded;
use crate::tag::ActivatedTag;

/// Result of the ISO-DEP liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The tag answered; `sw` is the trailing status word.
    Answered { response: HexBytes, sw: u16 },
    /// The tag refused the command.
    Rejected { status: u16 },
    /// The exchange itself failed.
    Failed { reason: String },
}

impl ProbeOutcome {
    /// Whether the tag answered with `9000`.
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Answered { sw, .. } if *sw == SW_SUCCESS)
    }
}

/// Family-specific classification details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagDetails {
    /// Type 1 and Type 2.
    Memory {
        manufacturer: Option<String>,
        memory_size: usize,
    },
    /// Type 3.
    Felica {
        system_code: Option<u16>,
        service_codes: Vec<u16>,
    },
    /// Type 4A and Type 4B.
    IsoDep {
        manufacturer: Option<String>,
        probe: ProbeOutcome,
    },
    /// Type 5.
    Vicinity {
        manufacturer: Option<String>,
        block_size: usize,
        block_count: usize,
    },
    Unknown,
}

/// Identity of a classified tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub family: TagFamily,
    pub display_name: String,
    pub technology: Technology,
    pub id_bytes: HexBytes,
    pub details: TagDetails,
}

impl Classification {
    /// Identifier as upper-case hex.
    pub fn id_hex(&self) -> String {
        hex_upper(self.id_bytes.as_slice())
    }
}

/// IC manufacturer name for an ISO/IEC 7816-6 manufacturer code.
pub fn manufacturer_name(code: u8) -> Option<&'static str> {
    let name = match code {
        0x01 => "Motorola",
        0x02 => "STMicroelectronics",
        0x03 => "Hitachi",
        0x04 => "NXP Semiconductors",
        0x05 => "Infineon Technologies",
        0x06 => "Cylink",
        0x07 => "Texas Instruments",
        0x08 => "Fujitsu",
        0x09 => "Matsushita Electronics",
        0x0A => "NEC",
        0x0B => "Oki Electric",
        0x0C => "Toshiba",
        0x0D => "Mitsubishi Electric",
        0x0E => "Samsung Electronics",
        0x0F => "Hynix",
        0x10 => "LG Semiconductors",
        0x11 => "Emosyn-EM Microelectronics",
        0x12 => "INSIDE Technology",
        0x13 => "ORGA Kartensysteme",
        0x14 => "Sharp",
        0x15 => "ATMEL",
        0x16 => "EM Microelectronic-Marin",
        0x17 => "KSW Microtec",
        0x18 => "ZMD",
        0x19 => "XICOR",
        0x1A => "Sony",
        0x1B => "Malaysia Microelectronic Solutions",
        0x1C => "Emosyn",
        0x1D => "Shanghai Fudan Microelectronics",
        0x1E => "Magellan Technology",
        0x1F => "Melexis",
        0x20 => "Renesas Technology",
        0x21 => "TAGSYS",
        0x22 => "Transcore",
        0x23 => "Shanghai Belling",
        0x24 => "Masktech",
        0x25 => "Innovision Research and Technology",
        0x26 => "Hitachi ULSI Systems",
        0x27 => "Cypak",
        0x28 => "Ricoh",
        0x29 => "ASK",
        0x2A => "Unicore Microsystems",
        0x2B => "Dallas Semiconductor/Maxim",
        0x2C => "Impinj",
        0x2D => "RightPlug Alliance",
        0x2E => "Broadcom",
        0x2F => "MStar Semiconductor",
        0x30 => "BeeDar Technology",
        0x31 => "RFIDsec",
        0x32 => "Schweizer Electronic",
        0x33 => "AMIC Technology",
        0x34 => "Mikron",
        0x35 => "Fraunhofer IPMS",
        0x36 => "IDS Microchip",
        0x37 => "Kovio",
        0x38 => "HMT Microelectronic",
        0x39 => "Silicon Craft Technology",
        0x3A => "Advanced Film Device",
        0x3B => "Nitecrest",
        0x3C => "Verayo",
        0x3D => "HID Global",
        0x3E => "Productivity Engineering",
        0x3F => "Austriamicrosystems",
        0x40 => "Gemalto",
        0x41 => "Renesas Electronics",
        0x42 => "3Alogics",
        0x43 => "Top TroniQ Asia",
        0x44 => "Gentag",
        _ => return None,
    };
    Some(name)
}

fn manufacturer_label(code: Option<u8>) -> Option<String> {
    code.map(|code| match manufacturer_name(code) {
        Some(name) => name.to_string(),
        None => format!("0x{code:02X}"),
    })
}

/// Send the diagnostic SELECT and fold every tag-level outcome into a
/// [`ProbeOutcome`].
async fn probe<R: ContactlessReader>(
    reader: &mut R,
    handle: &TagHandle,
) -> Result<ProbeOutcome, ReaderError> {
    let outcome = match reader.transceive(handle, &SELECT_PAY_SYS_DDF01).await {
        Ok(response) => {
            let sw = match response.as_slice() {
                [.., sw1, sw2] => Some(u16::from_be_bytes([*sw1, *sw2])),
                _ => None,
            };
            match sw {
                Some(sw) => ProbeOutcome::Answered {
                    response: response.into(),
                    sw,
                },
                None => ProbeOutcome::Failed {
                    reason: format!("short response {}", hex_upper(&response)),
                },
            }
        }
        Err(ActivationError::Protocol { status }) => ProbeOutcome::Rejected { status },
        Err(ActivationError::Reader(fault)) => return Err(fault),
        Err(e) => ProbeOutcome::Failed {
            reason: e.to_string(),
        },
    };
    Ok(outcome)
}

/// Classify an activated tag.
///
/// Total over every [`ActivatedTag`] shape; never fails. If the reader
/// faults during the ISO-DEP probe, the probe is recorded as failed and the
/// fault is returned alongside.
pub async fn classify<R: ContactlessReader>(
    reader: &mut R,
    tag: &ActivatedTag,
) -> Folded<Classification> {
    let mut reader_fault = None;
    let details = match tag {
        ActivatedTag::Type1 {
            base, memory_size, ..
        }
        | ActivatedTag::Type2 {
            base, memory_size, ..
        } => TagDetails::Memory {
            manufacturer: manufacturer_label(base.manufacturer),
            memory_size: *memory_size,
        },
        ActivatedTag::Type3 {
            system_code,
            service_codes,
            ..
        } => TagDetails::Felica {
            system_code: *system_code,
            service_codes: service_codes.clone(),
        },
        ActivatedTag::Type4A { base } | ActivatedTag::Type4B { base, .. } => {
            let outcome = match probe(reader, &base.handle).await {
                Ok(outcome) => outcome,
                Err(fault) => {
                    let outcome = ProbeOutcome::Failed {
                        reason: fault.to_string(),
                    };
                    reader_fault = Some(fault);
                    outcome
                }
            };
            debug!("Probe of {} returned {:?}", tag.family(), outcome);
            TagDetails::IsoDep {
                manufacturer: manufacturer_label(base.manufacturer),
                probe: outcome,
            }
        }
        ActivatedTag::Type5 {
            base,
            block_size,
            block_count,
            ..
        } => TagDetails::Vicinity {
            manufacturer: manufacturer_label(base.manufacturer),
            block_size: *block_size,
            block_count: *block_count,
        },
        ActivatedTag::Unknown { .. } => TagDetails::Unknown,
    };

    let family = tag.family();
    let classification = Classification {
        family,
        display_name: family.display_name().to_string(),
        technology: tag.technology(),
        id_bytes: tag.identifier().into(),
        details,
    };
    Folded {
        value: classification,
        reader_fault,
    }
}
