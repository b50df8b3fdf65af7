use crate::{
    Result,
    constants::{
        FELICA_POLL_COMMAND, FELICA_POLL_LENGTH, FELICA_REQUEST_SYSTEM_CODE, FELICA_TIME_SLOTS,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Modulation class of a polling technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modulation {
    /// ISO 14443 Type A.
    A,
    /// ISO 14443 Type B.
    B,
    /// FeliCa (JIS X 6319-4).
    F,
    /// ISO 15693 vicinity cards.
    Vicinity,
}

impl Modulation {
    /// Single-letter suffix used in technology codes.
    #[must_use]
    pub fn letter(&self) -> &'static str {
        match self {
            Modulation::A => "A",
            Modulation::B => "B",
            Modulation::F => "F",
            Modulation::Vicinity => "V",
        }
    }
}

/// Bitrates (kbit/s) accepted for ISO 14443 and FeliCa technologies.
const PROXIMITY_BITRATES: [u16; 4] = [106, 212, 424, 848];

/// ISO 15693 high data rate, rounded down.
const VICINITY_BITRATE: u16 = 26;

const VICINITY_CODE: &str = "15693";

/// Technology code such as `106A`, `212F` or `15693`.
///
/// Combines a bitrate class with a modulation. Parsing and display use the
/// textual code form, and so does serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Technology {
    kbps: u16,
    modulation: Modulation,
}

impl Technology {
    /// Create a proximity technology (Type A, Type B or FeliCa).
    ///
    /// # Errors
    /// Returns `Error::InvalidTechnology` for bitrates other than
    /// 106/212/424/848 or for the vicinity modulation.
    pub fn new(kbps: u16, modulation: Modulation) -> Result<Self> {
        if modulation == Modulation::Vicinity || !PROXIMITY_BITRATES.contains(&kbps) {
            return Err(Error::InvalidTechnology(format!(
                "{kbps}{}",
                modulation.letter()
            )));
        }
        Ok(Self { kbps, modulation })
    }

    /// The ISO 15693 technology (`15693`).
    #[must_use]
    pub const fn vicinity() -> Self {
        Self {
            kbps: VICINITY_BITRATE,
            modulation: Modulation::Vicinity,
        }
    }

    /// `106A`, the ISO 14443-A base rate.
    pub const A106: Self = Self::proximity(106, Modulation::A);

    /// `106B`, the ISO 14443-B base rate.
    pub const B106: Self = Self::proximity(106, Modulation::B);

    /// `212F`, the FeliCa base rate.
    pub const F212: Self = Self::proximity(212, Modulation::F);

    pub(crate) const fn proximity(kbps: u16, modulation: Modulation) -> Self {
        Self { kbps, modulation }
    }

    #[must_use]
    pub fn kbps(&self) -> u16 {
        self.kbps
    }

    #[must_use]
    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    /// Whether this technology polls FeliCa responders.
    #[must_use]
    pub fn is_felica(&self) -> bool {
        self.modulation == Modulation::F
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.modulation {
            Modulation::Vicinity => f.write_str(VICINITY_CODE),
            modulation => write!(f, "{}{}", self.kbps, modulation.letter()),
        }
    }
}

impl std::str::FromStr for Technology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim();
        if code == VICINITY_CODE {
            return Ok(Self::vicinity());
        }

        let invalid = || Error::InvalidTechnology(code.to_string());
        let split = code.len().checked_sub(1).ok_or_else(invalid)?;
        if !code.is_char_boundary(split) {
            return Err(invalid());
        }
        let (rate, letter) = code.split_at(split);
        let modulation = match letter {
            "A" | "a" => Modulation::A,
            "B" | "b" => Modulation::B,
            "F" | "f" => Modulation::F,
            _ => return Err(invalid()),
        };
        let kbps: u16 = rate.parse().map_err(|_| invalid())?;
        Technology::new(kbps, modulation)
    }
}

impl TryFrom<String> for Technology {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Technology> for String {
    fn from(value: Technology) -> Self {
        value.to_string()
    }
}

/// Custom FeliCa polling payload (SENSF_REQ).
///
/// Always exactly five bytes:
/// `[0x00][system code, big-endian][0x01][time slot]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FelicaPoll([u8; FELICA_POLL_LENGTH]);

impl FelicaPoll {
    /// Build a polling request filtered by `system_code`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagscan_core::FelicaPoll;
    ///
    /// let poll = FelicaPoll::for_system_code(0xFE00);
    /// assert_eq!(poll.as_bytes(), &[0x00, 0xFE, 0x00, 0x01, 0x0F]);
    /// ```
    #[must_use]
    pub const fn for_system_code(system_code: u16) -> Self {
        let [hi, lo] = system_code.to_be_bytes();
        Self([
            FELICA_POLL_COMMAND,
            hi,
            lo,
            FELICA_REQUEST_SYSTEM_CODE,
            FELICA_TIME_SLOTS,
        ])
    }

    /// Validate a raw payload.
    ///
    /// # Errors
    /// Returns `Error::InvalidPollPayload` if the payload is not five bytes,
    /// does not start with the polling command code or does not request the
    /// system code.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; FELICA_POLL_LENGTH] = bytes.try_into().map_err(|_| {
            Error::InvalidPollPayload(format!(
                "expected {FELICA_POLL_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        if raw[0] != FELICA_POLL_COMMAND {
            return Err(Error::InvalidPollPayload(format!(
                "command code must be 0x00, got 0x{:02X}",
                raw[0]
            )));
        }
        if raw[3] != FELICA_REQUEST_SYSTEM_CODE {
            return Err(Error::InvalidPollPayload(format!(
                "request code must be 0x01, got 0x{:02X}",
                raw[3]
            )));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FELICA_POLL_LENGTH] {
        &self.0
    }

    #[must_use]
    pub fn system_code(&self) -> u16 {
        u16::from_be_bytes([self.0[1], self.0[2]])
    }

    #[must_use]
    pub fn time_slot(&self) -> u8 {
        self.0[4]
    }

    /// Whether a card with `system_code` answers this poll.
    ///
    /// `0xFF` in either byte of the requested code matches any value.
    #[must_use]
    pub fn accepts(&self, system_code: u16) -> bool {
        let [want_hi, want_lo] = self.system_code().to_be_bytes();
        let [hi, lo] = system_code.to_be_bytes();
        (want_hi == 0xFF || want_hi == hi) && (want_lo == 0xFF || want_lo == lo)
    }
}

/// Build the 5-byte FeliCa polling payload for `system_code`.
#[must_use]
pub fn build_felica_poll(system_code: u16) -> FelicaPoll {
    FelicaPoll::for_system_code(system_code)
}

impl fmt::Display for FelicaPoll {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl TryFrom<String> for FelicaPoll {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let bytes = hex::decode(value.trim())
            .map_err(|e| Error::InvalidPollPayload(format!("{value}: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl From<FelicaPoll> for String {
    fn from(value: FelicaPoll) -> Self {
        value.to_string()
    }
}

/// Response bytes a tag answered with, used to re-sense that same tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSignature {
    /// Select response (SEL_RES / ATTRIB answer) of an ISO-DEP tag.
    Select(Vec<u8>),
    /// Anticollision response (SDD_RES) of a Type 1/Type 2 tag.
    Anticollision(Vec<u8>),
}

impl fmt::Display for ResponseSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResponseSignature::Select(bytes) => write!(f, "sel_res={}", hex::encode_upper(bytes)),
            ResponseSignature::Anticollision(bytes) => {
                write!(f, "sdd_res={}", hex::encode_upper(bytes))
            }
        }
    }
}

/// One technology offered to the reader during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetProfile {
    technology: Technology,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    felica_poll: Option<FelicaPoll>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<ResponseSignature>,
}

impl TargetProfile {
    /// Profile polling `technology` with the reader's default request.
    #[must_use]
    pub fn new(technology: Technology) -> Self {
        Self {
            technology,
            felica_poll: None,
            signature: None,
        }
    }

    /// Profile polling FeliCa with a custom SENSF_REQ.
    ///
    /// # Errors
    /// Returns `Error::InvalidPollPayload` if `technology` is not a FeliCa
    /// technology.
    pub fn with_felica_poll(technology: Technology, poll: FelicaPoll) -> Result<Self> {
        if !technology.is_felica() {
            return Err(Error::InvalidPollPayload(format!(
                "custom polling payload requires a FeliCa technology, got {technology}"
            )));
        }
        Ok(Self {
            technology,
            felica_poll: Some(poll),
            signature: None,
        })
    }

    pub(crate) fn felica(kbps: u16, system_code: u16) -> Self {
        Self {
            technology: Technology::proximity(kbps, Modulation::F),
            felica_poll: Some(FelicaPoll::for_system_code(system_code)),
            signature: None,
        }
    }

    /// Restrict the profile to responders answering with `signature`.
    #[must_use]
    pub fn with_signature(mut self, signature: ResponseSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    #[must_use]
    pub fn technology(&self) -> Technology {
        self.technology
    }

    #[must_use]
    pub fn modulation(&self) -> Modulation {
        self.technology.modulation()
    }

    #[must_use]
    pub fn felica_poll(&self) -> Option<&FelicaPoll> {
        self.felica_poll.as_ref()
    }

    #[must_use]
    pub fn signature(&self) -> Option<&ResponseSignature> {
        self.signature.as_ref()
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.technology)?;
        if let Some(poll) = &self.felica_poll {
            write!(f, " sensf_req={poll}")?;
        }
        if let Some(signature) = &self.signature {
            write!(f, " {signature}")?;
        }
        Ok(())
    }
}

/// Tag family after activation.
///
/// The set is closed; every consumer matches it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagFamily {
    Type1,
    Type2,
    /// FeliCa.
    Type3,
    Type4A,
    Type4B,
    /// ISO 15693.
    Type5,
    Unknown,
}

impl TagFamily {
    /// All families in declaration order.
    pub const ALL: [TagFamily; 7] = [
        TagFamily::Type1,
        TagFamily::Type2,
        TagFamily::Type3,
        TagFamily::Type4A,
        TagFamily::Type4B,
        TagFamily::Type5,
        TagFamily::Unknown,
    ];

    /// Human-readable family name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            TagFamily::Type1 => "Topaz (Type 1)",
            TagFamily::Type2 => "MIFARE Ultralight (Type 2)",
            TagFamily::Type3 => "FeliCa (Type 3)",
            TagFamily::Type4A => "Type 4A",
            TagFamily::Type4B => "Type 4B",
            TagFamily::Type5 => "ISO/IEC 15693 (Type 5)",
            TagFamily::Unknown => "Unknown Tag",
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, TagFamily::Unknown)
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TagFamily::Type1 => "Type1Tag",
            TagFamily::Type2 => "Type2Tag",
            TagFamily::Type3 => "Type3Tag",
            TagFamily::Type4A => "Type4ATag",
            TagFamily::Type4B => "Type4BTag",
            TagFamily::Type5 => "Type5Tag",
            TagFamily::Unknown => "UnknownTag",
        };
        f.write_str(name)
    }
}

/// Upper-case hex rendering used for identifiers in logs and output.
#[must_use]
pub fn hex_upper(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("106A", 106, Modulation::A)]
    #[case("106B", 106, Modulation::B)]
    #[case("212F", 212, Modulation::F)]
    #[case("424F", 424, Modulation::F)]
    #[case("848B", 848, Modulation::B)]
    #[case("15693", 26, Modulation::Vicinity)]
    fn test_technology_valid(#[case] input: &str, #[case] kbps: u16, #[case] modulation: Modulation) {
        let tech: Technology = input.parse().unwrap();
        assert_eq!(tech.kbps(), kbps);
        assert_eq!(tech.modulation(), modulation);
        assert_eq!(tech.to_string(), input);
    }

    #[rstest]
    #[case("")]
    #[case("A")]
    #[case("100A")]
    #[case("212X")]
    #[case("abcF")]
    #[case("15692")]
    fn test_technology_invalid(#[case] input: &str) {
        let result: Result<Technology> = input.parse();
        assert!(matches!(result, Err(Error::InvalidTechnology(_))));
    }

    #[test]
    fn test_technology_serde_uses_code() {
        let tech: Technology = "212F".parse().unwrap();
        let json = serde_json::to_string(&tech).unwrap();
        assert_eq!(json, "\"212F\"");
        let back: Technology = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tech);
        assert!(serde_json::from_str::<Technology>("\"999Z\"").is_err());
    }

    #[test]
    fn test_build_felica_poll_common_area() {
        assert_eq!(
            build_felica_poll(0xFE00).as_bytes(),
            &[0x00, 0xFE, 0x00, 0x01, 0x0F]
        );
    }

    #[test]
    fn test_build_felica_poll_express() {
        assert_eq!(
            build_felica_poll(0x0003).as_bytes(),
            &[0x00, 0x00, 0x03, 0x01, 0x0F]
        );
    }

    #[rstest]
    #[case(&[0x00, 0xFE, 0x00, 0x01], "expected 5 bytes")]
    #[case(&[0x00, 0xFE, 0x00, 0x01, 0x0F, 0x00], "expected 5 bytes")]
    #[case(&[0x06, 0xFE, 0x00, 0x01, 0x0F], "command code")]
    #[case(&[0x00, 0xFE, 0x00, 0x00, 0x0F], "request code")]
    fn test_felica_poll_rejects_invalid(#[case] raw: &[u8], #[case] reason: &str) {
        let err = FelicaPoll::from_bytes(raw).unwrap_err();
        assert!(err.to_string().contains(reason), "{err}");
    }

    #[test]
    fn test_felica_poll_from_hex_string() {
        let poll: FelicaPoll = serde_json::from_str("\"00FE00010F\"").unwrap();
        assert_eq!(poll.system_code(), 0xFE00);
        assert_eq!(poll.time_slot(), 0x0F);
        assert_eq!(poll.to_string(), "00FE00010F");
    }

    #[rstest]
    #[case(0xFE00, 0xFE00, true)]
    #[case(0xFE00, 0x0003, false)]
    #[case(0xFFFF, 0x0003, true)]
    #[case(0xFEFF, 0xFE0F, true)]
    #[case(0x0003, 0x0003, true)]
    fn test_felica_poll_accepts(#[case] requested: u16, #[case] card: u16, #[case] expected: bool) {
        assert_eq!(FelicaPoll::for_system_code(requested).accepts(card), expected);
    }

    #[test]
    fn test_profile_rejects_poll_on_non_felica() {
        let tech: Technology = "106A".parse().unwrap();
        let result = TargetProfile::with_felica_poll(tech, build_felica_poll(0xFE00));
        assert!(matches!(result, Err(Error::InvalidPollPayload(_))));
    }

    #[test]
    fn test_profile_display() {
        let profile = TargetProfile::felica(212, 0xFE00);
        assert_eq!(profile.to_string(), "212F sensf_req=00FE00010F");

        let presence = TargetProfile::new("106A".parse().unwrap())
            .with_signature(ResponseSignature::Select(vec![0x20]));
        assert_eq!(presence.to_string(), "106A sel_res=20");
    }

    #[test]
    fn test_family_names() {
        assert_eq!(TagFamily::Type3.display_name(), "FeliCa (Type 3)");
        assert_eq!(TagFamily::Type4B.to_string(), "Type4BTag");
        assert!(!TagFamily::Unknown.is_known());
        assert!(TagFamily::ALL.iter().filter(|f| f.is_known()).count() == 6);
    }

    proptest! {
        #[test]
        fn prop_felica_poll_layout(system_code in any::<u16>()) {
            let poll = build_felica_poll(system_code);
            let bytes = poll.as_bytes();
            prop_assert_eq!(bytes.len(), 5);
            prop_assert_eq!(bytes[0], 0x00);
            prop_assert_eq!(bytes[3], 0x01);
            prop_assert_eq!(poll.system_code(), system_code);
            prop_assert!(FelicaPoll::from_bytes(bytes).is_ok());
        }
    }
}
