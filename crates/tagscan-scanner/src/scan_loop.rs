//! The scan cycle: sense, activate, classify, read, await removal, repeat.
//!
//! [`ScanLoop`] owns the reader for the whole run and closes it on every exit
//! path. Only reader faults and cancellation end a run; every other failure is
//! handled inside the cycle it happened in. A reader fault met while
//! classifying or reading ends the run before the record is emitted.

use chrono::Utc;
use tagscan_core::{TargetCatalog, TargetProfile};
use tagscan_hardware::{ActivationError, ContactlessReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RepeatPolicy, ScanConfig};
use crate::error::Result;
use crate::presence::PresenceMonitor;
use crate::record::{RecordSink, ScanRecord};
use crate::session::{ScanSession, ScanSummary};
use crate::state::{ScanState, ScanStateMachine};
use crate::{activator, identifier, memory, prober};

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    /// Nothing answered within the sense timeout.
    NothingSensed,
    /// A target answered but could not be activated.
    Skipped,
    /// A record was emitted and the tag handled.
    Recorded,
    /// A record was emitted and the run should end.
    Finished,
}

/// Drives a reader through repeated scan cycles.
///
/// # Example
///
/// ```
/// use tagscan_core::TargetCatalog;
/// use tagscan_hardware::mock::{SimulatedReader, SimulatedTag, UnitReply};
/// use tagscan_scanner::{ScanConfig, ScanLoop, ScanRecord};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> tagscan_scanner::Result<()> {
/// let (reader, field) = SimulatedReader::new();
/// field
///     .present(SimulatedTag::type2(
///         vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80],
///         vec![UnitReply::data(vec![0x04, 0xA1, 0xB2, 0x9E])],
///     ))
///     .await;
///
/// let config = ScanConfig {
///     max_records: Some(1),
///     ..ScanConfig::default()
/// };
/// let mut records: Vec<ScanRecord> = Vec::new();
/// let mut scan = ScanLoop::new(reader, TargetCatalog::standard(), config);
/// let summary = scan.run(&mut records, CancellationToken::new()).await?;
///
/// assert_eq!(summary.records, 1);
/// assert_eq!(records[0].classification.id_hex(), "04A1B2C3D4E580");
/// assert!(field.is_closed().await);
/// # Ok(())
/// # }
/// ```
pub struct ScanLoop<R: ContactlessReader> {
    reader: R,
    catalog: TargetCatalog,
    config: ScanConfig,
    presence: PresenceMonitor,
    machine: ScanStateMachine,
}

impl<R: ContactlessReader> ScanLoop<R> {
    pub fn new(reader: R, catalog: TargetCatalog, config: ScanConfig) -> Self {
        let presence = PresenceMonitor::new(config.presence_interval(), config.settle_delay());
        Self {
            reader,
            catalog,
            config,
            presence,
            machine: ScanStateMachine::new(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn state(&self) -> ScanState {
        *self.machine.current_state()
    }

    /// Transition history of the current or last run.
    pub fn state_machine(&self) -> &ScanStateMachine {
        &self.machine
    }

    /// Scan until cancelled, until the configured record limit or repeat
    /// policy ends the run, or until the reader fails.
    ///
    /// Cancellation is checked before each sense and after each removal
    /// wait, and interrupts the pause after an empty or skipped cycle. The
    /// reader is closed before this returns, whatever the outcome. A loop runs
    /// once; later calls fail against the closed reader.
    ///
    /// # Errors
    ///
    /// - `ScanError::Core` if the config is invalid for the catalog.
    /// - `ScanError::Reader` if the reader fails.
    pub async fn run<S: RecordSink>(
        &mut self,
        mut sink: S,
        cancel: CancellationToken,
    ) -> Result<ScanSummary> {
        let mut session = ScanSession::new();
        let outcome = self.drive(&mut session, &mut sink, &cancel).await;
        self.shutdown().await;

        let summary = session.summary();
        match outcome {
            Ok(()) => {
                info!(
                    "Scan finished: {} records, {} unique tags, {} cycles in {}ms",
                    summary.records,
                    summary.unique_ids,
                    summary.cycles,
                    summary.elapsed.as_millis()
                );
                Ok(summary)
            }
            Err(e) => {
                error!(state = %self.state(), "Scan aborted: {}", e);
                Err(e)
            }
        }
    }

    async fn drive<S: RecordSink>(
        &mut self,
        session: &mut ScanSession,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.config.validate(&self.catalog)?;
        let profiles = self.config.profiles(&self.catalog)?;

        let info = self.reader.reader_info().await?;
        info!("Scanning with {} ({} profiles)", info, profiles.len());

        loop {
            if cancel.is_cancelled() {
                info!("Scan cancelled");
                return Ok(());
            }

            match self.cycle(&profiles, session, sink).await? {
                CycleOutcome::NothingSensed | CycleOutcome::Skipped => {
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        () = tokio::time::sleep(self.config.retry_interval()) => {}
                    }
                }
                CycleOutcome::Recorded => {}
                CycleOutcome::Finished => return Ok(()),
            }
        }
    }

    async fn cycle<S: RecordSink>(
        &mut self,
        profiles: &[TargetProfile],
        session: &mut ScanSession,
        sink: &mut S,
    ) -> Result<CycleOutcome> {
        session.start_cycle();
        self.machine.transition_to(ScanState::Sensing)?;

        let sensed = prober::sense(&mut self.reader, profiles, self.config.sense_timeout()).await?;
        let Some(target) = sensed else {
            self.machine.transition_to(ScanState::Idle)?;
            return Ok(CycleOutcome::NothingSensed);
        };

        self.machine.transition_to(ScanState::Activating)?;
        let tag = match activator::activate(&mut self.reader, &target).await {
            Ok(tag) => tag,
            Err(ActivationError::Reader(e)) => return Err(e.into()),
            Err(e) => {
                warn!("Skipping {}: {}", target, e);
                session.count_skipped();
                self.machine.transition_to(ScanState::Idle)?;
                return Ok(CycleOutcome::Skipped);
            }
        };

        self.machine.transition_to(ScanState::Classifying)?;
        let classification = identifier::classify(&mut self.reader, &tag)
            .await
            .into_result()?;

        self.machine.transition_to(ScanState::Reading)?;
        let memory = memory::read_all(&mut self.reader, &tag)
            .await
            .into_result()?;

        let repeat = session.observe(classification.id_bytes.as_slice());
        session.count_record();
        info!(
            family = %classification.family,
            id = %classification.id_hex(),
            units = memory.len(),
            repeat,
            "Tag scanned"
        );
        sink.emit(ScanRecord {
            classification,
            memory,
            repeat,
            scanned_at: Utc::now(),
        });

        if self.should_finish(session, repeat) {
            return Ok(CycleOutcome::Finished);
        }

        self.machine.transition_to(ScanState::AwaitingRemoval)?;
        let removed = self
            .presence
            .wait_until_removed(
                &mut self.reader,
                tag.presence_profile(),
                self.config.removal_timeout(),
            )
            .await?;
        if !removed {
            warn!(
                "Tag still present after {}ms",
                self.config.removal_timeout().as_millis()
            );
        }

        self.machine.transition_to(ScanState::Idle)?;
        Ok(CycleOutcome::Recorded)
    }

    fn should_finish(&self, session: &ScanSession, repeat: bool) -> bool {
        if repeat && self.config.repeat_policy == RepeatPolicy::Stop {
            info!("Repeated tag, stopping");
            return true;
        }
        self.config
            .max_records
            .and_then(|max| u64::try_from(max).ok())
            .is_some_and(|max| session.records() >= max)
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.reader.close().await {
            warn!("Failed to close reader: {}", e);
        }
        if !self.machine.current_state().is_terminal() {
            if let Err(e) = self.machine.transition_to(ScanState::Stopped) {
                warn!("{}", e);
            }
        }
        debug!("Reader released");
    }
}
