pub mod catalog;
pub mod constants;
pub mod error;
pub mod types;

pub use catalog::TargetCatalog;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
