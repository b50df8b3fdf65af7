//! Simulated reader and tags for testing and development.
//!
//! This module provides a contactless reader whose RF field is controlled
//! programmatically, or from a JSON scenario file, without requiring
//! physical hardware.

pub mod reader;
pub mod tag;

pub use reader::{Scenario, ScheduledTag, SimulatedReader, SimulatedReaderHandle};
pub use tag::{ApduReply, ServiceReply, SimulatedActivation, SimulatedTag, UnitReply};
