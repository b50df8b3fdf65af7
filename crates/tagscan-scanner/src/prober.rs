//! Discovery across several technologies at once.

use std::time::Duration;

use tagscan_core::TargetProfile;
use tagscan_hardware::{ContactlessReader, ReaderError, SensedTarget};
use tracing::{debug, trace};

/// Offer every profile to the reader in one discovery request.
///
/// Returns the first responder, or `None` if nothing answered within
/// `timeout`. An empty profile list returns `None` without touching the
/// reader.
///
/// # Errors
///
/// Reader faults are returned as-is; they are never retried here.
pub async fn sense<R: ContactlessReader>(
    reader: &mut R,
    profiles: &[TargetProfile],
    timeout: Duration,
) -> Result<Option<SensedTarget>, ReaderError> {
    if profiles.is_empty() {
        return Ok(None);
    }

    trace!(
        "Sensing {} profiles for {}ms",
        profiles.len(),
        timeout.as_millis()
    );
    let target = reader.sense(profiles, timeout).await?;
    if let Some(target) = &target {
        debug!("Sensed {}", target);
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagscan_core::{TargetCatalog, Technology};
    use tagscan_hardware::mock::{SimulatedReader, SimulatedTag};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_empty_profiles_do_not_touch_reader() {
        let (mut reader, handle) = SimulatedReader::new();

        let target = sense(&mut reader, &[], Duration::from_millis(500))
            .await
            .unwrap();

        assert!(target.is_none());
        assert_eq!(handle.sense_calls().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_responder_returns_none_after_timeout() {
        let (mut reader, _handle) = SimulatedReader::new();
        let profiles: Vec<TargetProfile> = ["106A", "106B", "212F", "424F"]
            .iter()
            .map(|code| TargetProfile::new(code.parse::<Technology>().unwrap()))
            .collect();

        let started = Instant::now();
        let target = sense(&mut reader, &profiles, Duration::from_millis(500))
            .await
            .unwrap();

        assert!(target.is_none());
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_profile_in_order_wins() {
        let (mut reader, handle) = SimulatedReader::new();
        handle
            .present(SimulatedTag::type2(vec![0x04, 1, 2, 3, 4, 5, 6], vec![]))
            .await;
        handle
            .present(SimulatedTag::type3([1, 2, 3, 4, 5, 6, 7, 8], 0xFE00, vec![]))
            .await;

        let catalog = TargetCatalog::standard();
        let profiles = catalog.resolve_all(&["felica", "mifare"]).unwrap();
        let target = sense(&mut reader, &profiles, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        assert!(target.sensf_res.is_some());
        assert_eq!(target.technology().to_string(), "212F");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_fault_propagates() {
        let (mut reader, handle) = SimulatedReader::new();
        handle.disconnect().await;

        let profiles = [TargetProfile::new(Technology::A106)];
        let result = sense(&mut reader, &profiles, Duration::from_millis(500)).await;

        assert!(matches!(result, Err(ReaderError::Disconnected { .. })));
    }
}
