use std::collections::TryReserveError;
use std::fmt;
pub use Error::*;

/// Error codes
#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Function called with invalid arguments
    ValueOutOfRange,
    /// The image has no pixels, so there is nothing to build a palette from
    EmptyImage,
    /// Either the system/process really hit a limit, or some data like image size was ridiculously wrong. Could be a bug too
    OutOfMemory,
    /// Progress callback said to stop
    Aborted,
    /// Slice needs to be bigger, or width/height needs to be smaller
    BufferTooSmall,
    /// Congratulations, you've discovered an edge case
    Unsupported,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::ValueOutOfRange => "VALUE_OUT_OF_RANGE",
            Self::EmptyImage => "EMPTY_IMAGE",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::Aborted => "ABORTED",
            Self::BufferTooSmall => "BUFFER_TOO_SMALL",
            Self::Unsupported => "UNSUPPORTED",
        })
    }
}

impl From<TryReserveError> for Error {
    #[cold]
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

#[test]
fn display_codes() {
    assert_eq!("EMPTY_IMAGE", EmptyImage.to_string());
    assert_eq!("VALUE_OUT_OF_RANGE", ValueOutOfRange.to_string());
    let mut v: Vec<u8> = Vec::new();
    let err = v.try_reserve_exact(usize::MAX).unwrap_err();
    assert_eq!(OutOfMemory, Error::from(err));
}
