//! Enum wrapper for reader dispatch.
//!
//! Native `async fn` in traits (RPITIT, Rust Edition 2024) is not
//! object-safe, so `Box<dyn ContactlessReader>` is not available. [`AnyReader`]
//! provides concrete dispatch over the drivers compiled into this crate, and
//! [`AnyReader::open`] picks one from a connection string.
//!
//! # Connection strings
//!
//! | String | Reader |
//! |---|---|
//! | `sim` | simulated reader with an empty field |
//! | `sim:<path>` | simulated reader populated from a JSON [`Scenario`] |
//! | `usb`, `usb:<index>` | physical USB reader (no driver compiled in) |
//!
//! # Examples
//!
//! ```
//! use tagscan_hardware::devices::AnyReader;
//! use tagscan_hardware::traits::ContactlessReader;
//!
//! #[tokio::main]
//! async fn main() -> tagscan_hardware::Result<()> {
//!     let reader = AnyReader::open("sim").await?;
//!     let info = reader.reader_info().await?;
//!     assert_eq!(info.path, "sim");
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use tagscan_core::TargetProfile;
use tracing::debug;

use crate::error::{ActivationError, BlockReadError, ReaderError, Result};
use crate::mock::{Scenario, SimulatedReader};
use crate::traits::ContactlessReader;
use crate::types::{ReaderInfo, SensedTarget, TagHandle, TagHandshake};

const SIM_SCHEME: &str = "sim";
const USB_SCHEME: &str = "usb";

/// Enum wrapper for reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyReader {
    /// Simulated reader for development and testing.
    Simulated(SimulatedReader),
}

impl AnyReader {
    /// Open the reader named by `connection`.
    ///
    /// # Errors
    ///
    /// - `ReaderError::Disconnected` for a USB reader, since no USB driver
    ///   is compiled into this build.
    /// - `ReaderError::ConfigurationError` for an unknown scheme or an
    ///   unparsable scenario file.
    /// - `ReaderError::Io` if the scenario file cannot be read.
    pub async fn open(connection: &str) -> Result<Self> {
        let (scheme, argument) = match connection.split_once(':') {
            Some((scheme, argument)) => (scheme, Some(argument)),
            None => (connection, None),
        };

        match (scheme, argument) {
            (SIM_SCHEME, None) => {
                debug!("Opening empty simulated reader");
                let (reader, _handle) = SimulatedReader::new();
                Ok(Self::Simulated(reader))
            }
            (SIM_SCHEME, Some(path)) => {
                debug!("Loading simulated reader scenario from {}", path);
                let contents = tokio::fs::read_to_string(path).await?;
                let scenario: Scenario = serde_json::from_str(&contents).map_err(|e| {
                    ReaderError::configuration(format!("invalid scenario '{path}': {e}"))
                })?;
                let (reader, _handle) = SimulatedReader::from_scenario(scenario, connection);
                Ok(Self::Simulated(reader))
            }
            (USB_SCHEME, argument) => {
                if let Some(index) = argument
                    && index.parse::<u32>().is_err()
                {
                    return Err(ReaderError::configuration(format!(
                        "invalid USB device index '{index}'"
                    )));
                }
                Err(ReaderError::disconnected(format!(
                    "{connection} (no USB driver in this build)"
                )))
            }
            _ => Err(ReaderError::configuration(format!(
                "unknown reader '{connection}'"
            ))),
        }
    }
}

impl From<SimulatedReader> for AnyReader {
    fn from(reader: SimulatedReader) -> Self {
        Self::Simulated(reader)
    }
}

impl ContactlessReader for AnyReader {
    async fn sense(
        &mut self,
        profiles: &[TargetProfile],
        timeout: Duration,
    ) -> Result<Option<SensedTarget>> {
        match self {
            Self::Simulated(reader) => reader.sense(profiles, timeout).await,
        }
    }

    async fn activate(
        &mut self,
        target: &SensedTarget,
    ) -> std::result::Result<TagHandshake, ActivationError> {
        match self {
            Self::Simulated(reader) => reader.activate(target).await,
        }
    }

    async fn read_single_block(
        &mut self,
        tag: &TagHandle,
        index: u16,
    ) -> std::result::Result<Vec<u8>, BlockReadError> {
        match self {
            Self::Simulated(reader) => reader.read_single_block(tag, index).await,
        }
    }

    async fn read_without_encryption(
        &mut self,
        tag: &TagHandle,
        service_codes: &[u16],
        block_indices: &[u16],
    ) -> std::result::Result<Vec<Vec<u8>>, BlockReadError> {
        match self {
            Self::Simulated(reader) => {
                reader
                    .read_without_encryption(tag, service_codes, block_indices)
                    .await
            }
        }
    }

    async fn transceive(
        &mut self,
        tag: &TagHandle,
        apdu: &[u8],
    ) -> std::result::Result<Vec<u8>, ActivationError> {
        match self {
            Self::Simulated(reader) => reader.transceive(tag, apdu).await,
        }
    }

    async fn reader_info(&self) -> Result<ReaderInfo> {
        match self {
            Self::Simulated(reader) => reader.reader_info().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Simulated(reader) => reader.close().await,
        }
    }
}
