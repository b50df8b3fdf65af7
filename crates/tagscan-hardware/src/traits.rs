//! Reader driver trait definition.
//!
//! [`ContactlessReader`] is the contract between the scanner core and a
//! reader driver. It exposes the handful of primitives the core needs:
//! discovery, activation, block and service reads, raw APDU exchange and
//! release of the reader.
//!
//! All methods use native `async fn` (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use tagscan_core::TargetProfile;

use crate::error::{ActivationError, BlockReadError, Result};
use crate::types::{ReaderInfo, SensedTarget, TagHandle, TagHandshake};

/// Contactless reader abstraction.
///
/// Every call is bounded: `sense` by its explicit timeout, the per-tag
/// commands by the driver's own command timeout. None of them may block
/// indefinitely.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters, or
/// [`AnyReader`](crate::devices::AnyReader) for dispatch over concrete
/// drivers.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tagscan_core::TargetCatalog;
/// use tagscan_hardware::traits::ContactlessReader;
/// use tagscan_hardware::error::Result;
///
/// async fn wait_for_felica<R: ContactlessReader>(reader: &mut R) -> Result<bool> {
///     let catalog = TargetCatalog::standard();
///     let profiles = catalog.resolve("felica").unwrap();
///     let target = reader.sense(profiles, Duration::from_millis(500)).await?;
///     Ok(target.is_some())
/// }
/// ```
pub trait ContactlessReader: Send + Sync {
    /// Offer all `profiles` in one discovery request.
    ///
    /// Returns the first responder, or `None` if nothing answered before
    /// `timeout` elapsed. A zero timeout performs a single discovery attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is unreachable or closed.
    async fn sense(
        &mut self,
        profiles: &[TargetProfile],
        timeout: Duration,
    ) -> Result<Option<SensedTarget>>;

    /// Run the activation handshake for a sensed target.
    ///
    /// # Errors
    ///
    /// Returns `ActivationError::Protocol` if the tag rejects the handshake,
    /// `ActivationError::Unsupported` if the driver has no handshake for the
    /// response, and `ActivationError::Reader` on reader failure.
    async fn activate(
        &mut self,
        target: &SensedTarget,
    ) -> std::result::Result<TagHandshake, ActivationError>;

    /// Read one block of a block-addressed tag.
    ///
    /// # Errors
    ///
    /// Returns a [`BlockReadError`] for this block only.
    async fn read_single_block(
        &mut self,
        tag: &TagHandle,
        index: u16,
    ) -> std::result::Result<Vec<u8>, BlockReadError>;

    /// FeliCa Read Without Encryption.
    ///
    /// Returns one entry per requested block.
    ///
    /// # Errors
    ///
    /// Returns a [`BlockReadError`] if any requested service refuses the read.
    async fn read_without_encryption(
        &mut self,
        tag: &TagHandle,
        service_codes: &[u16],
        block_indices: &[u16],
    ) -> std::result::Result<Vec<Vec<u8>>, BlockReadError>;

    /// Exchange a raw APDU with an ISO-DEP tag.
    ///
    /// The returned bytes include the trailing status word.
    ///
    /// # Errors
    ///
    /// Returns `ActivationError::Protocol` with the tag's status if the
    /// exchange is refused.
    async fn transceive(
        &mut self,
        tag: &TagHandle,
        apdu: &[u8],
    ) -> std::result::Result<Vec<u8>, ActivationError>;

    /// Get reader information.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot be queried.
    async fn reader_info(&self) -> Result<ReaderInfo>;

    /// Release the reader. Later calls fail with `ReaderError::Closed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the release itself fails.
    async fn close(&mut self) -> Result<()>;
}
