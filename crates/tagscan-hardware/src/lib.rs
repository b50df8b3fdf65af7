//! Reader abstraction layer for tagscan.
//!
//! This crate is the boundary between the scanner core and a contactless
//! reader driver. It defines:
//!
//! - [`ContactlessReader`]: the primitives the core relies on (sense,
//!   activate, block and service reads, APDU exchange, reader info, close).
//! - The raw data crossing that boundary: [`SensedTarget`],
//!   [`TagHandshake`] and [`TagHandle`].
//! - Three error families, kept apart because the scanner treats them
//!   differently: [`ReaderError`] is fatal, [`ActivationError`] skips a tag,
//!   and [`BlockReadError`] is isolated to one memory unit.
//! - A simulated reader ([`mock`]) and the [`AnyReader`] dispatch enum.
//!
//! # Design
//!
//! - **Async-first**: every reader call uses native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Bounded**: `sense` takes an explicit timeout; no call blocks forever.
//! - **Thread-safe**: readers are `Send + Sync` for use with Tokio.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//! use tagscan_core::TargetCatalog;
//! use tagscan_hardware::{AnyReader, ContactlessReader, Result};
//!
//! async fn probe_once(connection: &str) -> Result<()> {
//!     let mut reader = AnyReader::open(connection).await?;
//!     let catalog = TargetCatalog::standard();
//!     let profiles = catalog.resolve_all(&["felica", "mifare"]).unwrap();
//!
//!     if let Some(target) = reader.sense(&profiles, Duration::from_millis(500)).await? {
//!         println!("sensed {target}");
//!     }
//!     reader.close().await
//! }
//! ```
//!
//! [`ContactlessReader`]: traits::ContactlessReader
//! [`AnyReader`]: devices::AnyReader
//! [`SensedTarget`]: types::SensedTarget
//! [`TagHandshake`]: types::TagHandshake
//! [`TagHandle`]: types::TagHandle

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::AnyReader;
pub use error::{ActivationError, BlockReadError, ReaderError, Result};
pub use traits::ContactlessReader;
pub use types::{HexBytes, ReaderInfo, SensedTarget, TagHandle, TagHandshake};
