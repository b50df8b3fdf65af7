//! Errors that end a scan run.
//!
//! Everything else (activation failures, block read failures, rejected
//! probes) is handled inside a cycle and never reaches the caller. Steps
//! that fold per-unit failures return a [`Folded`] so a reader fault met
//! halfway still ends the run.

use tagscan_hardware::ReaderError;
use thiserror::Error;

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Fatal scan errors.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The reader became unusable.
    #[error("Reader I/O error: {0}")]
    Reader(#[from] ReaderError),

    /// Configuration or internal state error.
    #[error(transparent)]
    Core(#[from] tagscan_core::Error),

    /// Config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON.
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A value assembled from per-unit outcomes, and the reader fault that cut it
/// short, if any.
#[derive(Debug)]
pub struct Folded<T> {
    pub value: T,
    pub reader_fault: Option<ReaderError>,
}

impl<T> Folded<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            reader_fault: None,
        }
    }

    pub fn interrupted(value: T, fault: ReaderError) -> Self {
        Self {
            value,
            reader_fault: Some(fault),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.reader_fault.is_none()
    }

    /// The value, or the reader fault that interrupted it.
    ///
    /// # Errors
    ///
    /// Returns the reader fault if there was one.
    pub fn into_result(self) -> std::result::Result<T, ReaderError> {
        match self.reader_fault {
            Some(fault) => Err(fault),
            None => Ok(self.value),
        }
    }
}

impl ScanError {
    /// Whether the error came from the reader.
    #[must_use]
    pub fn is_reader_error(&self) -> bool {
        matches!(self, Self::Reader(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_error_wraps() {
        let error: ScanError = ReaderError::disconnected("usb:0").into();
        assert!(error.is_reader_error());
        assert_eq!(
            error.to_string(),
            "Reader I/O error: Reader disconnected: usb:0"
        );
    }

    #[test]
    fn test_folded_surfaces_reader_fault() {
        let complete = Folded::complete(vec![1, 2]);
        assert!(complete.is_complete());
        assert_eq!(complete.into_result().unwrap(), vec![1, 2]);

        let interrupted = Folded::interrupted(vec![1], ReaderError::disconnected("usb:0"));
        assert!(!interrupted.is_complete());
        assert!(matches!(
            interrupted.into_result(),
            Err(ReaderError::Disconnected { .. })
        ));
    }

    #[test]
    fn test_core_error_is_transparent() {
        let error: ScanError = tagscan_core::Error::UnknownFamily("nfc-z".into()).into();
        assert!(!error.is_reader_error());
        assert_eq!(
            error.to_string(),
            tagscan_core::Error::UnknownFamily("nfc-z".into()).to_string()
        );
    }
}
