//! HFP AT Protocol Library
//!
//! This crate provides framing and parsing for the AT command dialect of
//! the Bluetooth Hands-Free Profile (HFP 1.7):
//!
//! - **Frames**: CR/LF-delimited ASCII lines, bounded in length
//! - **Commands**: a fixed vocabulary (`AT+BRSF=`, `+CIND:`, `RING`, ...)
//!   classified into the [`AtCommand`] enum
//! - **Payloads**: feature bitmasks, indicator tables, indicator values and
//!   caller-id strings
//!
//! # Architecture
//!
//! - [`frame`] splits byte streams into frames, with a streaming
//!   [`FrameCodec`] that reassembles frames split across reads
//! - [`command`] classifies frames and encodes outgoing commands
//! - [`indicators`] builds the positional indicator table from `+CIND` and
//!   decodes indicator values
//! - [`features`] decodes the `+BRSF` supported-features bitmasks
//!
//! # Example
//!
//! ```rust
//! use hfp_protocol::{AtCommand, FrameCodec, ProtocolCodec};
//!
//! let mut codec = FrameCodec::new();
//! codec.push_bytes(b"\r\n+CIEV: 2,1\r\n");
//!
//! if let Some(frame) = codec.next_command() {
//!     assert_eq!(frame.command, AtCommand::Ciev);
//!     assert_eq!(frame.value(), Some(" 2,1"));
//! }
//! ```

pub mod command;
pub mod error;
pub mod features;
pub mod frame;
pub mod indicators;
pub mod text;

pub use command::{classify, value, AgResponse, AtCommand, AtFrame, HfCommand};
pub use error::{FrameError, ParseError};
pub use features::{AgFeatures, HfFeatures};
pub use frame::{tokenize, FrameCodec, MAX_FRAME_LEN};
pub use indicators::{
    CallSetupState, CallState, Indicator, IndicatorIndex, IndicatorValue, ServiceState,
};

/// Trait for codecs that parse incoming data streams
pub trait ProtocolCodec {
    /// The command type produced by this codec
    type Command;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete command from the buffer
    fn next_command(&mut self) -> Option<Self::Command>;

    /// Try to extract the next complete command along with its raw bytes
    ///
    /// This is useful for traffic logging where we want to show the exact
    /// bytes that were parsed for each command.
    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)>;

    /// Clear the internal buffer
    fn clear(&mut self);
}

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}
