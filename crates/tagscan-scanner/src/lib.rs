//! Tag discovery and lifecycle for contactless readers.
//!
//! One scan cycle walks a tag through every stage:
//!
//! 1. [`prober::sense`] offers the configured polling profiles to the reader
//! 2. [`activator::activate`] turns the response into an [`ActivatedTag`]
//! 3. [`identifier::classify`] extracts identifier and family metadata
//! 4. [`memory::read_all`] reads addressable memory, one unit at a time
//! 5. [`PresenceMonitor`] waits for the tag to leave the field
//!
//! [`ScanLoop`] repeats the cycle, tracks it with a [`ScanStateMachine`] and
//! hands a [`ScanRecord`] per tag to a [`RecordSink`].

pub mod activator;
pub mod config;
pub mod error;
pub mod identifier;
pub mod memory;
pub mod presence;
pub mod prober;
pub mod record;
pub mod scan_loop;
pub mod session;
pub mod state;
pub mod tag;

pub use config::{RepeatPolicy, ScanConfig};
pub use error::{Folded, Result, ScanError};
pub use identifier::{Classification, ProbeOutcome, TagDetails};
pub use memory::{MemoryUnit, UnitAddress, UnitOutcome};
pub use presence::PresenceMonitor;
pub use record::{RecordSink, ScanRecord};
pub use scan_loop::ScanLoop;
pub use session::{ScanSession, ScanSummary};
pub use state::{ScanState, ScanStateMachine, StateTransition};
pub use tag::{ActivatedTag, Capabilities, TagBase};
