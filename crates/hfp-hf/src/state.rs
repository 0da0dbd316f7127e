//! Connection state tracking

use std::fmt;
use std::time::Instant;

use hfp_protocol::{AtCommand, CallSetupState, CallState, HfCommand, IndicatorValue, ServiceState};

/// Service level connection bring-up state
///
/// Each awaiting state names the AG response that advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Nothing sent yet
    #[default]
    Idle,
    /// `AT+BRSF` sent, waiting for `+BRSF`
    AwaitingBrsf,
    /// `AT+CIND=?` issued, waiting for the indicator list
    AwaitingCindTest,
    /// `AT+CIND?` issued, waiting for current indicator values
    AwaitingCindRead,
    /// `AT+CMER` issued, waiting for `OK`
    AwaitingCmerAck,
    /// `AT+CLIP=1` issued, waiting for `OK`
    AwaitingClipAck,
    /// Bring-up complete; unsolicited events are handled
    Ready,
    /// A bring-up step failed
    Aborted {
        /// The request whose step failed
        step: AtCommand,
    },
}

impl ConnectionState {
    /// The request whose response this state is waiting for
    pub fn awaited_command(&self) -> Option<AtCommand> {
        match self {
            Self::AwaitingBrsf => Some(AtCommand::AtBrsf),
            Self::AwaitingCindTest => Some(AtCommand::AtCindTest),
            Self::AwaitingCindRead => Some(AtCommand::AtCindRead),
            Self::AwaitingCmerAck => Some(AtCommand::AtCmer),
            Self::AwaitingClipAck => Some(AtCommand::AtClip),
            Self::Idle | Self::Ready | Self::Aborted { .. } => None,
        }
    }

    /// Whether the bring-up sequence is still running
    pub fn is_bringing_up(&self) -> bool {
        self.awaited_command().is_some()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::AwaitingBrsf => f.write_str("awaiting +BRSF"),
            Self::AwaitingCindTest => f.write_str("awaiting indicator list"),
            Self::AwaitingCindRead => f.write_str("awaiting indicator values"),
            Self::AwaitingCmerAck => f.write_str("awaiting AT+CMER acknowledgement"),
            Self::AwaitingClipAck => f.write_str("awaiting AT+CLIP acknowledgement"),
            Self::Ready => f.write_str("ready"),
            Self::Aborted { step } => write!(f, "aborted at {}", step),
        }
    }
}

/// The single request awaiting a final result code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Command that was transmitted
    pub command: HfCommand,
    /// When the request is treated as failed
    pub deadline: Instant,
}

/// Latest known AG indicator values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndicatorSnapshot {
    pub service: Option<ServiceState>,
    pub call: Option<CallState>,
    pub call_setup: Option<CallSetupState>,
    pub signal: Option<u8>,
    pub call_held: Option<u8>,
    pub roaming: Option<bool>,
    pub battery: Option<u8>,
}

impl IndicatorSnapshot {
    /// Record a decoded indicator value
    pub fn apply(&mut self, value: IndicatorValue) {
        match value {
            IndicatorValue::Service(s) => self.service = Some(s),
            IndicatorValue::Call(c) => self.call = Some(c),
            IndicatorValue::CallSetup(s) => self.call_setup = Some(s),
            IndicatorValue::Signal(level) => self.signal = Some(level),
            IndicatorValue::CallHeld(held) => self.call_held = Some(held),
            IndicatorValue::Roam(roaming) => self.roaming = Some(roaming),
            IndicatorValue::BattChg(level) => self.battery = Some(level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_awaited_commands() {
        assert_eq!(
            ConnectionState::AwaitingBrsf.awaited_command(),
            Some(AtCommand::AtBrsf)
        );
        assert_eq!(
            ConnectionState::AwaitingCmerAck.awaited_command(),
            Some(AtCommand::AtCmer)
        );
        assert_eq!(ConnectionState::Ready.awaited_command(), None);
        assert!(!ConnectionState::Idle.is_bringing_up());
        assert!(ConnectionState::AwaitingClipAck.is_bringing_up());
    }

    #[test]
    fn test_state_display() {
        let state = ConnectionState::Aborted {
            step: AtCommand::AtCindTest,
        };
        assert_eq!(state.to_string(), "aborted at AT+CIND=?");
    }

    #[test]
    fn test_snapshot_apply() {
        let mut snapshot = IndicatorSnapshot::default();
        snapshot.apply(IndicatorValue::Service(ServiceState::Available));
        snapshot.apply(IndicatorValue::Signal(4));
        assert_eq!(snapshot.service, Some(ServiceState::Available));
        assert_eq!(snapshot.signal, Some(4));
        assert_eq!(snapshot.call, None);
    }
}
