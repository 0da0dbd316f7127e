//! Events emitted by a Hands-Free connection
//!
//! The connection buffers events as it processes frames; observers drain
//! them with [`Connection::drain_events`](crate::Connection::drain_events).
//! The session adapter forwards the same events over a channel.

use std::fmt;

use hfp_protocol::{AgFeatures, AtCommand, FrameError, IndicatorIndex, IndicatorValue, ParseError};

use crate::state::ConnectionState;

/// Why a request did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// AG answered `ERROR`
    Error,
    /// AG answered `+CME ERROR: <code>`
    CmeError(u32),
    /// No final result code before the deadline
    Timeout,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("ERROR"),
            Self::CmeError(code) => write!(f, "+CME ERROR {}", code),
            Self::Timeout => f.write_str("timed out"),
        }
    }
}

/// Connection event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HfEvent {
    /// Bring-up state changed
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// AG supported features decoded from `+BRSF`
    AgFeatures(AgFeatures),
    /// Indicator table built from the `+CIND` test response
    IndicatorsDiscovered(IndicatorIndex),
    /// Snapshot of indicator values from a `+CIND` read response
    IndicatorsRead(Vec<IndicatorValue>),
    /// Single indicator change from `+CIEV`
    IndicatorChanged(IndicatorValue),
    /// Incoming call alert, with the consecutive ring count
    Ring { count: u32 },
    /// Caller id from `+CLIP`
    CallerId {
        number: String,
        number_type: Option<u8>,
    },
    /// `ATA` was issued after the ring threshold
    AutoAnswered,
    /// A request failed
    CommandFailed {
        command: AtCommand,
        reason: FailureReason,
    },
    /// The answer request failed
    AnswerFailed { reason: FailureReason },
    /// A frame was dropped before classification
    MalformedFrame(FrameError),
    /// A frame's payload could not be parsed
    ParseFailed {
        command: AtCommand,
        error: ParseError,
    },
    /// The transport closed
    Disconnected,
}
