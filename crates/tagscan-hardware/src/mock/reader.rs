//! Simulated contactless reader for testing and development.
//!
//! The reader keeps a shared "field" of [`SimulatedTag`]s, each with an
//! arrival time and an optional departure time. A [`SimulatedReaderHandle`]
//! places tags in the field, takes them away, or breaks the reader, while the
//! scanner drives the [`SimulatedReader`] through the
//! [`ContactlessReader`] trait.
//!
//! Time is read from `tokio::time`, so tests running with a paused clock
//! see tags arrive and leave deterministically.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tagscan_core::TargetProfile;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{ActivationError, BlockReadError, ReaderError, Result};
use crate::mock::tag::{ApduReply, SimulatedActivation, SimulatedTag, UnitReply};
use crate::traits::ContactlessReader;
use crate::types::{ReaderInfo, SensedTarget, TagHandle, TagHandshake};

/// Status returned by the simulator when a tag has no APDU handler
/// (ISO 7816 "instruction not supported").
const SW_INS_NOT_SUPPORTED: u16 = 0x6D00;

/// FeliCa status flags for an unknown service code.
const FELICA_ILLEGAL_SERVICE: u16 = 0x01A6;

/// FeliCa status flags for a block number past the end of a service.
const FELICA_ILLEGAL_BLOCK: u16 = 0x01A8;

/// A tag scheduled to enter the field, as loaded from a scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTag {
    pub tag: SimulatedTag,

    /// Delay before the tag enters the field.
    #[serde(default)]
    pub arrive_after_ms: u64,

    /// Delay (from reader start) before the tag leaves. `None` keeps it in
    /// the field for good.
    #[serde(default)]
    pub leave_after_ms: Option<u64>,
}

/// A JSON scenario for the simulated reader.
///
/// ```json
/// {
///   "tags": [
///     { "tag": { "technology": "106A", "sdd_res": "04A1B2C3D4E580" },
///       "arrive_after_ms": 0, "leave_after_ms": 2000 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub tags: Vec<ScheduledTag>,
}

#[derive(Debug)]
struct FieldEntry {
    tag: SimulatedTag,
    arrives_at: Instant,
    leaves_at: Option<Instant>,
}

impl FieldEntry {
    fn is_present(&self, now: Instant) -> bool {
        self.arrives_at <= now && self.leaves_at.is_none_or(|leaves| now < leaves)
    }

    fn answers_handle(&self, tag: &TagHandle) -> bool {
        self.tag.technology == tag.technology
            && self.tag.identifier() == Some(tag.identifier.as_slice())
    }
}

#[derive(Debug, Default)]
struct FieldState {
    entries: Vec<FieldEntry>,
    fault: Option<String>,
    closed: bool,
    sense_calls: usize,
    apdus: Vec<Vec<u8>>,
}

impl FieldState {
    fn ensure_usable(&self) -> Result<()> {
        if self.closed {
            return Err(ReaderError::Closed);
        }
        if let Some(device) = &self.fault {
            return Err(ReaderError::disconnected(device.clone()));
        }
        Ok(())
    }

    /// First responder in profile order, then field order.
    fn respond(&self, profiles: &[TargetProfile], now: Instant) -> Option<SensedTarget> {
        profiles.iter().find_map(|profile| {
            self.entries
                .iter()
                .filter(|entry| entry.is_present(now))
                .find_map(|entry| entry.tag.answer(profile))
        })
    }

    fn unplug(&mut self, device: &str) -> ReaderError {
        self.fault = Some(device.to_string());
        ReaderError::disconnected(device)
    }

    fn next_arrival(&self, now: Instant) -> Option<Instant> {
        self.entries
            .iter()
            .map(|entry| entry.arrives_at)
            .filter(|arrives_at| *arrives_at > now)
            .min()
    }

    fn find(&self, tag: &TagHandle, now: Instant) -> Option<&SimulatedTag> {
        self.entries
            .iter()
            .find(|entry| entry.is_present(now) && entry.answers_handle(tag))
            .map(|entry| &entry.tag)
    }
}

/// Simulated contactless reader.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tagscan_core::TargetCatalog;
/// use tagscan_hardware::mock::{SimulatedReader, SimulatedTag, UnitReply};
/// use tagscan_hardware::traits::ContactlessReader;
///
/// #[tokio::main]
/// async fn main() -> tagscan_hardware::Result<()> {
///     let (mut reader, handle) = SimulatedReader::new();
///
///     let uid = vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80];
///     handle.present(SimulatedTag::type2(uid, vec![UnitReply::data(vec![0; 4])])).await;
///
///     let catalog = TargetCatalog::standard();
///     let profiles = catalog.resolve("mifare").unwrap();
///     let target = reader.sense(profiles, Duration::ZERO).await?;
///     assert!(target.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SimulatedReader {
    state: Arc<Mutex<FieldState>>,
    path: String,
}

impl SimulatedReader {
    /// Create a simulated reader with an empty field.
    ///
    /// Returns the reader and a handle that controls its field.
    pub fn new() -> (Self, SimulatedReaderHandle) {
        Self::with_path("sim")
    }

    /// Create a simulated reader reporting `path` as its connection path.
    pub fn with_path(path: impl Into<String>) -> (Self, SimulatedReaderHandle) {
        Self::with_state(FieldState::default(), path.into())
    }

    /// Create a simulated reader and schedule every tag of `scenario`,
    /// relative to now.
    pub fn from_scenario(
        scenario: Scenario,
        path: impl Into<String>,
    ) -> (Self, SimulatedReaderHandle) {
        let now = Instant::now();
        let entries = scenario
            .tags
            .into_iter()
            .map(|scheduled| FieldEntry {
                tag: scheduled.tag,
                arrives_at: now + Duration::from_millis(scheduled.arrive_after_ms),
                leaves_at: scheduled
                    .leave_after_ms
                    .map(|ms| now + Duration::from_millis(ms)),
            })
            .collect();

        let state = FieldState {
            entries,
            ..FieldState::default()
        };
        Self::with_state(state, path.into())
    }

    fn with_state(state: FieldState, path: String) -> (Self, SimulatedReaderHandle) {
        let state = Arc::new(Mutex::new(state));

        let reader = Self {
            state: Arc::clone(&state),
            path: path.clone(),
        };
        let handle = SimulatedReaderHandle { state, path };

        (reader, handle)
    }
}

impl ContactlessReader for SimulatedReader {
    async fn sense(
        &mut self,
        profiles: &[TargetProfile],
        timeout: Duration,
    ) -> Result<Option<SensedTarget>> {
        let deadline = Instant::now().checked_add(timeout);
        {
            let mut state = self.state.lock().await;
            state.ensure_usable()?;
            state.sense_calls += 1;
        }

        loop {
            let next_arrival = {
                let state = self.state.lock().await;
                state.ensure_usable()?;

                let now = Instant::now();
                if let Some(target) = state.respond(profiles, now) {
                    trace!("Simulated reader sensed {}", target);
                    return Ok(Some(target));
                }
                state.next_arrival(now)
            };

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return Ok(None);
            }
            let wake = match (next_arrival, deadline) {
                (Some(arrival), Some(deadline)) => arrival.min(deadline),
                (Some(arrival), None) => arrival,
                (None, Some(deadline)) => deadline,
                (None, None) => return Ok(None),
            };
            tokio::time::sleep_until(wake).await;
        }
    }

    async fn activate(
        &mut self,
        target: &SensedTarget,
    ) -> std::result::Result<TagHandshake, ActivationError> {
        let state = self.state.lock().await;
        state.ensure_usable()?;

        let now = Instant::now();
        let tag = state
            .entries
            .iter()
            .filter(|entry| entry.is_present(now))
            .map(|entry| &entry.tag)
            .find(|tag| tag.answer(&target.profile).as_ref() == Some(target))
            .ok_or_else(|| ActivationError::unsupported("target left the field"))?;

        match &tag.activation {
            SimulatedActivation::Handshake(handshake) => {
                debug!("Simulated reader activated {}", target);
                Ok(handshake.clone())
            }
            SimulatedActivation::Reject(status) => Err(ActivationError::protocol(*status)),
            SimulatedActivation::Unsupported => Err(ActivationError::unsupported(format!(
                "no handshake for {target}"
            ))),
        }
    }

    async fn read_single_block(
        &mut self,
        tag: &TagHandle,
        index: u16,
    ) -> std::result::Result<Vec<u8>, BlockReadError> {
        let mut state = self.state.lock().await;
        state.ensure_usable()?;

        let found = state
            .find(tag, Instant::now())
            .ok_or(BlockReadError::TagLost)?;
        match found.blocks.get(usize::from(index)).cloned() {
            Some(UnitReply::Data(bytes)) => Ok(bytes.0),
            Some(UnitReply::Error(status)) => Err(BlockReadError::Protocol { status }),
            Some(UnitReply::Unplug) => Err(state.unplug(&self.path).into()),
            None => Err(BlockReadError::OutOfRange { index }),
        }
    }

    async fn read_without_encryption(
        &mut self,
        tag: &TagHandle,
        service_codes: &[u16],
        block_indices: &[u16],
    ) -> std::result::Result<Vec<Vec<u8>>, BlockReadError> {
        let mut state = self.state.lock().await;
        state.ensure_usable()?;

        let found = state
            .find(tag, Instant::now())
            .ok_or(BlockReadError::TagLost)?;

        let mut unplugged = false;
        let mut data = Vec::with_capacity(service_codes.len() * block_indices.len());
        'services: for code in service_codes {
            let service = found
                .services
                .iter()
                .find(|service| service.code == *code)
                .ok_or(BlockReadError::Protocol {
                    status: FELICA_ILLEGAL_SERVICE,
                })?;

            for index in block_indices {
                match service.blocks.get(usize::from(*index)) {
                    Some(UnitReply::Data(bytes)) => data.push(bytes.0.clone()),
                    Some(UnitReply::Error(status)) => {
                        return Err(BlockReadError::Protocol { status: *status });
                    }
                    Some(UnitReply::Unplug) => {
                        unplugged = true;
                        break 'services;
                    }
                    None => {
                        return Err(BlockReadError::Protocol {
                            status: FELICA_ILLEGAL_BLOCK,
                        });
                    }
                }
            }
        }
        if unplugged {
            return Err(state.unplug(&self.path).into());
        }
        Ok(data)
    }

    async fn transceive(
        &mut self,
        tag: &TagHandle,
        apdu: &[u8],
    ) -> std::result::Result<Vec<u8>, ActivationError> {
        let mut state = self.state.lock().await;
        state.ensure_usable()?;
        state.apdus.push(apdu.to_vec());

        let found = state
            .find(tag, Instant::now())
            .ok_or_else(|| ActivationError::unsupported("tag left the field"))?;
        match found.apdu.clone() {
            Some(ApduReply::Response(bytes)) => Ok(bytes.0),
            Some(ApduReply::Reject(status)) => Err(ActivationError::protocol(status)),
            Some(ApduReply::Unplug) => Err(state.unplug(&self.path).into()),
            None => Err(ActivationError::protocol(SW_INS_NOT_SUPPORTED)),
        }
    }

    async fn reader_info(&self) -> Result<ReaderInfo> {
        self.state.lock().await.ensure_usable()?;
        Ok(ReaderInfo::new("tagscan", "Simulated Reader", self.path.clone())
            .with_chipset("simulated"))
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.closed {
            debug!("Closing simulated reader at {}", self.path);
            state.closed = true;
        }
        Ok(())
    }
}

/// Handle for controlling a simulated reader's field.
///
/// Cloning the handle shares the same field.
#[derive(Debug, Clone)]
pub struct SimulatedReaderHandle {
    state: Arc<Mutex<FieldState>>,
    path: String,
}

impl SimulatedReaderHandle {
    /// Place `tag` in the field until it is withdrawn.
    pub async fn present(&self, tag: SimulatedTag) {
        self.schedule(tag, Duration::ZERO, None).await;
    }

    /// Place `tag` in the field for `dwell`.
    pub async fn present_for(&self, tag: SimulatedTag, dwell: Duration) {
        self.schedule(tag, Duration::ZERO, Some(dwell)).await;
    }

    /// Place `tag` in the field after `arrive_after`, leaving `leave_after`
    /// from now (if given).
    pub async fn schedule(
        &self,
        tag: SimulatedTag,
        arrive_after: Duration,
        leave_after: Option<Duration>,
    ) {
        let now = Instant::now();
        self.state.lock().await.entries.push(FieldEntry {
            tag,
            arrives_at: now + arrive_after,
            leaves_at: leave_after.map(|after| now + after),
        });
    }

    /// Take every tag currently in the field away.
    pub async fn withdraw_all(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        for entry in state.entries.iter_mut().filter(|e| e.is_present(now)) {
            entry.leaves_at = Some(now);
        }
    }

    /// Simulate the reader being unplugged. Every later call fails with
    /// `ReaderError::Disconnected`.
    pub async fn disconnect(&self) {
        self.state.lock().await.fault = Some(self.path.clone());
    }

    /// Whether the reader has been closed.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Number of discovery requests the reader has served.
    pub async fn sense_calls(&self) -> usize {
        self.state.lock().await.sense_calls
    }

    /// APDUs the reader has forwarded, in order.
    pub async fn apdus(&self) -> Vec<Vec<u8>> {
        self.state.lock().await.apdus.clone()
    }

    /// Number of tags in the field right now.
    pub async fn tags_in_field(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().await;
        state.entries.iter().filter(|e| e.is_present(now)).count()
    }
}
