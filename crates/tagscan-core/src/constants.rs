//! Protocol and timing constants shared across the tagscan workspace.
//!
//! Values fall into three groups: FeliCa polling (SENSF_REQ) framing, the
//! ISO 7816-4 diagnostic probe, and the default timings of the scan loop.
//! Timing values are milliseconds unless the name says otherwise.
//!
//! # FeliCa polling request layout
//!
//! ```text
//! [0x00][system code hi][system code lo][0x01][time slot]
//!  cmd   big-endian system code          req   slots
//! ```
//!
//! # Examples
//!
//! ```
//! use tagscan_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(FELICA_POLL_LENGTH, 5);
//! let interval = Duration::from_millis(DEFAULT_PRESENCE_INTERVAL_MS);
//! assert_eq!(interval.as_millis(), 100);
//! ```

// ============================================================================
// FeliCa Polling (SENSF_REQ)
// ============================================================================

/// Length in bytes of a custom FeliCa polling payload.
pub const FELICA_POLL_LENGTH: usize = 5;

/// Command code byte of a FeliCa polling request.
pub const FELICA_POLL_COMMAND: u8 = 0x00;

/// Request code asking the responder to include its system code.
pub const FELICA_REQUEST_SYSTEM_CODE: u8 = 0x01;

/// Time slot byte used for every polling payload built by this crate
/// (sixteen response slots).
pub const FELICA_TIME_SLOTS: u8 = 0x0F;

/// Common area system code (transit and e-money cards).
pub const SYSTEM_CODE_FELICA: u16 = 0xFE00;

/// System code answered by phones in express-card mode.
pub const SYSTEM_CODE_EXPRESS: u16 = 0x0003;

/// Wildcard system code; any FeliCa card answers.
pub const SYSTEM_CODE_WILDCARD: u16 = 0xFFFF;

/// Length in bytes of a FeliCa manufacturing identifier (IDm).
pub const FELICA_IDM_LENGTH: usize = 8;

// ============================================================================
// Identifier Lengths
// ============================================================================

/// Accepted identifier lengths for ISO 14443 Type A and Type B tags.
///
/// Single (4), double (7), triple (10) size cascade UIDs plus the 8-byte
/// identifiers some Type B cards report.
pub const ISO14443_ID_LENGTHS: [usize; 4] = [4, 7, 8, 10];

/// Length in bytes of an ISO 15693 UID.
pub const ISO15693_UID_LENGTH: usize = 8;

// ============================================================================
// Memory Layout
// ============================================================================

/// Block size of Type 1 (Topaz) tags.
pub const TYPE1_BLOCK_SIZE: usize = 8;

/// Page size of Type 2 tags; also used for Type 4B block reads.
pub const TYPE2_BLOCK_SIZE: usize = 4;

/// High nibble of the Topaz header ROM byte `HR0` identifying Type 1 memory.
pub const TOPAZ_HR0_NIBBLE: u8 = 0x10;

// ============================================================================
// ISO 7816-4 Diagnostic Probe
// ============================================================================

/// Application identifier `1PAY.SYS.DDF01` (payment system environment).
pub const AID_PAY_SYS_DDF01: &[u8] = b"1PAY.SYS.DDF01";

/// Diagnostic SELECT by name for [`AID_PAY_SYS_DDF01`].
///
/// The header declares `Lc = 0x07` while fourteen AID bytes follow, so most
/// cards answer with a checking error.
pub const SELECT_PAY_SYS_DDF01: [u8; 20] = [
    0x00, 0xA4, 0x04, 0x00, 0x07, b'1', b'P', b'A', b'Y', b'.', b'S', b'Y', b'S', b'.', b'D',
    b'D', b'F', b'0', b'1', 0x00,
];

/// Status word of a successful APDU exchange.
pub const SW_SUCCESS: u16 = 0x9000;

// ============================================================================
// Scan Loop Timing
// ============================================================================

/// How long a single discovery request waits for a responder.
pub const DEFAULT_SENSE_TIMEOUT_MS: u64 = 500;

/// Pause between discovery requests that found nothing.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 100;

/// Maximum time spent waiting for a tag to leave the field.
pub const DEFAULT_REMOVAL_TIMEOUT_MS: u64 = 3000;

/// Interval between presence polls.
pub const DEFAULT_PRESENCE_INTERVAL_MS: u64 = 100;

/// Settle delay used when a tag family has no usable presence signature.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3000;
