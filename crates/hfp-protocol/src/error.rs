//! Error types for HFP AT frame tokenizing and payload parsing

use thiserror::Error;

/// Errors produced while splitting a byte stream into frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A CR/LF-delimited run exceeded the maximum frame length
    #[error("frame too long: {len} bytes exceeds limit of {max}")]
    TooLong { len: usize, max: usize },

    /// Frame bytes were not valid text
    #[error("frame is not valid text: {0:02X?}")]
    NotText(Vec<u8>),
}

/// Errors that can occur while parsing AT command payloads
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame carries no payload after its delimiter
    #[error("missing value in {0:?}")]
    MissingValue(String),

    /// A numeric field contained something other than digits
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    /// An indicator group in a +CIND test response was not closed
    #[error("unbalanced indicator group at position {position}")]
    UnbalancedGroup { position: usize },

    /// A +CIEV event did not carry both an index and a value
    #[error("malformed indicator event: {0:?}")]
    MalformedEvent(String),

    /// Indicator index is zero or otherwise outside the table
    #[error("indicator index out of range: {0}")]
    IndexOutOfRange(usize),
}
