//! Waiting for a tag to leave the field.

use std::slice;
use std::time::Duration;

use tagscan_core::{
    TargetProfile,
    constants::{DEFAULT_PRESENCE_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS},
};
use tagscan_hardware::{ContactlessReader, ReaderError};
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::prober;

/// Re-senses a tag with its own presence profile until it stops answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceMonitor {
    /// Pause between presence checks.
    pub interval: Duration,

    /// Fixed pause for tags with no presence profile.
    pub settle_delay: Duration,
}

impl Default for PresenceMonitor {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_PRESENCE_INTERVAL_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }
}

impl PresenceMonitor {
    pub fn new(interval: Duration, settle_delay: Duration) -> Self {
        Self {
            interval,
            settle_delay,
        }
    }

    /// Wait until the tag matching `profile` stops answering.
    ///
    /// Returns `true` once the tag is gone, `false` if it is still present
    /// after `timeout`. Without a profile the tag cannot be tracked, so this
    /// waits `settle_delay` and reports it gone.
    ///
    /// # Errors
    ///
    /// Reader faults during a presence check.
    pub async fn wait_until_removed<R: ContactlessReader>(
        &self,
        reader: &mut R,
        profile: Option<&TargetProfile>,
        timeout: Duration,
    ) -> Result<bool, ReaderError> {
        let Some(profile) = profile else {
            trace!("No presence profile, settling for {}ms", self.settle_delay.as_millis());
            sleep(self.settle_delay).await;
            return Ok(true);
        };

        let started = Instant::now();
        loop {
            let answer = prober::sense(reader, slice::from_ref(profile), Duration::ZERO).await?;
            let elapsed = started.elapsed();
            if answer.is_none() {
                debug!("Tag removed after {}ms", elapsed.as_millis());
                return Ok(true);
            }
            if elapsed >= timeout {
                debug!("Tag still present after {}ms", elapsed.as_millis());
                return Ok(false);
            }
            sleep(self.interval.min(timeout - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagscan_core::{ResponseSignature, Technology};
    use tagscan_hardware::mock::{SimulatedReader, SimulatedTag};

    fn uid7() -> Vec<u8> {
        vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80]
    }

    fn presence_of(uid: Vec<u8>) -> TargetProfile {
        TargetProfile::new(Technology::A106).with_signature(ResponseSignature::Anticollision(uid))
    }

    fn monitor() -> PresenceMonitor {
        PresenceMonitor::new(Duration::from_millis(100), Duration::from_millis(250))
    }

    #[tokio::test(start_paused = true)]
    async fn test_withdrawn_tag_reports_removed() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present_for(SimulatedTag::type2(uid7(), vec![]), Duration::from_millis(1200))
            .await;

        let started = Instant::now();
        let removed = monitor()
            .wait_until_removed(&mut reader, Some(&presence_of(uid7())), Duration::from_secs(3))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(removed);
        assert!(elapsed >= Duration::from_millis(1200));
        assert!(elapsed < Duration::from_millis(1300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_tag_times_out() {
        let (mut reader, handle) = SimulatedReader::new();
        handle.present(SimulatedTag::type2(uid7(), vec![])).await;

        let started = Instant::now();
        let removed = monitor()
            .wait_until_removed(&mut reader, Some(&presence_of(uid7())), Duration::from_secs(3))
            .await
            .unwrap();

        assert!(!removed);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_tag_does_not_count_as_present() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present(SimulatedTag::type2(vec![0x04, 9, 9, 9, 9, 9, 9], vec![]))
            .await;

        let removed = monitor()
            .wait_until_removed(&mut reader, Some(&presence_of(uid7())), Duration::from_secs(3))
            .await
            .unwrap();
        assert!(removed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untracked_tag_settles() {
        let (mut reader, handle) = SimulatedReader::new();

        let started = Instant::now();
        let removed = monitor()
            .wait_until_removed(&mut reader, None, Duration::from_secs(3))
            .await
            .unwrap();

        assert!(removed);
        assert_eq!(started.elapsed(), Duration::from_millis(250));
        assert_eq!(handle.sense_calls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_fault_propagates() {
        let (mut reader, handle) = SimulatedReader::new();
        handle.disconnect().await;

        let result = monitor()
            .wait_until_removed(&mut reader, Some(&presence_of(uid7())), Duration::from_secs(3))
            .await;
        assert!(matches!(result, Err(ReaderError::Disconnected { .. })));
    }
}
