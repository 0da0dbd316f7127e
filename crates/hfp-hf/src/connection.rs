//! Hands-Free connection engine
//!
//! [`Connection`] owns everything one service level connection needs: the
//! frame codec, the bring-up state, the single outstanding request, the AG
//! indicator table, the ring counter and the current caller id.
//!
//! It performs no I/O. Received bytes go in through
//! [`handle_recv_data`](Connection::handle_recv_data); framed commands to
//! transmit come out of [`take_output`](Connection::take_output).
//!
//! # Requests
//!
//! A bare `OK` or `ERROR` carries no transaction id, so it can only be
//! matched to a request if exactly one request is outstanding. Requests
//! issued while another is outstanding are queued and transmitted in order
//! as final result codes arrive. Each outstanding request carries a deadline;
//! [`poll_timeout`](Connection::poll_timeout) fails it once that passes.

use std::collections::VecDeque;
use std::time::Instant;

use hfp_protocol::{
    classify, AgFeatures, AtCommand, EncodeCommand, FrameCodec, HfCommand, IndicatorIndex,
    ProtocolCodec,
};
use tracing::{debug, info, warn};

use crate::config::HfConfig;
use crate::error::HfError;
use crate::events::{FailureReason, HfEvent};
use crate::state::{ConnectionState, IndicatorSnapshot, PendingRequest};

/// State of one Hands-Free service level connection
pub struct Connection {
    pub(crate) config: HfConfig,
    codec: FrameCodec,
    pub(crate) state: ConnectionState,
    pending: Option<PendingRequest>,
    queued: VecDeque<HfCommand>,
    pub(crate) indicator_index: Option<IndicatorIndex>,
    pub(crate) indicators: IndicatorSnapshot,
    pub(crate) ag_features: Option<AgFeatures>,
    pub(crate) ring_count: u32,
    pub(crate) incoming_caller_id: Option<String>,
    output: VecDeque<Vec<u8>>,
    events: Vec<HfEvent>,
}

impl Connection {
    /// Create a connection with default configuration
    pub fn new() -> Self {
        Self::with_config(HfConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: HfConfig) -> Self {
        let codec = FrameCodec::with_max_len(config.max_frame_len);
        Self {
            config,
            codec,
            state: ConnectionState::Idle,
            pending: None,
            queued: VecDeque::new(),
            indicator_index: None,
            indicators: IndicatorSnapshot::default(),
            ag_features: None,
            ring_count: 0,
            incoming_caller_id: None,
            output: VecDeque::new(),
            events: Vec::new(),
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &HfConfig {
        &self.config
    }

    /// Current bring-up state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Command awaiting a final result code, if any
    pub fn last_sent(&self) -> Option<AtCommand> {
        self.pending.as_ref().map(|p| p.command.command())
    }

    /// The outstanding request with its deadline
    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// Number of requests waiting behind the outstanding one
    pub fn queued_requests(&self) -> usize {
        self.queued.len()
    }

    /// AG indicator positions, once negotiated
    pub fn indicator_index(&self) -> Option<&IndicatorIndex> {
        self.indicator_index.as_ref()
    }

    /// Latest known indicator values
    pub fn indicators(&self) -> &IndicatorSnapshot {
        &self.indicators
    }

    /// AG supported features, once negotiated
    pub fn ag_features(&self) -> Option<AgFeatures> {
        self.ag_features
    }

    /// Consecutive unanswered RINGs
    pub fn ring_count(&self) -> u32 {
        self.ring_count
    }

    /// Caller id of the current incoming call
    pub fn incoming_caller_id(&self) -> Option<&str> {
        self.incoming_caller_id.as_deref()
    }

    /// Start the bring-up sequence by sending `AT+BRSF`
    pub fn init_connection(&mut self) -> Result<(), HfError> {
        if self.state != ConnectionState::Idle {
            return Err(HfError::AlreadyStarted(self.state));
        }

        info!(
            "Starting service level connection (HF features {})",
            self.config.hf_features
        );
        self.request(HfCommand::SupportedFeatures(self.config.hf_features))?;
        self.set_state(ConnectionState::AwaitingBrsf);
        Ok(())
    }

    /// Feed received bytes through tokenizing, classification and dispatch
    ///
    /// An unterminated trailing frame is held until the next call.
    pub fn handle_recv_data(&mut self, data: &[u8]) {
        debug!("Received {} bytes: {:?}", data.len(), String::from_utf8_lossy(data));
        self.codec.push_bytes(data);

        while let Some(frame) = self.codec.next_frame() {
            match frame {
                Ok(text) => self.process_frame(&text),
                Err(e) => {
                    warn!("Dropping malformed frame: {}", e);
                    self.events.push(HfEvent::MalformedFrame(e));
                }
            }
        }
    }

    /// Classify and dispatch a single frame
    pub fn process_frame(&mut self, frame: &str) {
        let command = classify(frame);
        debug!("<- {:?} ({})", frame, command);
        self.dispatch(command, frame);
    }

    /// Answer the incoming call
    pub fn answer(&mut self) -> Result<(), HfError> {
        self.request(HfCommand::Answer)?;
        self.ring_count = 0;
        Ok(())
    }

    /// Hang up or reject the current call
    pub fn hang_up(&mut self) -> Result<(), HfError> {
        self.request(HfCommand::HangUp)
    }

    /// Re-read all AG indicator values
    pub fn query_indicators(&mut self) -> Result<(), HfError> {
        if self.indicator_index.is_none() {
            return Err(HfError::IndicatorsUnavailable);
        }
        self.request(HfCommand::IndicatorRead)
    }

    /// Fail the outstanding request if its deadline has passed
    ///
    /// Returns `true` if a request timed out.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        match &self.pending {
            Some(pending) if pending.deadline <= now => {}
            _ => return false,
        }

        if let Some(pending) = self.pending.take() {
            self.fail_request(pending.command, FailureReason::Timeout);
            self.flush_queue();
        }
        true
    }

    /// Deadline of the outstanding request
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Discard all connection state, returning to [`ConnectionState::Idle`]
    pub fn reset(&mut self) {
        info!("Resetting connection state");
        *self = Self::with_config(self.config.clone());
    }

    /// Take the next framed command to transmit
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.output.pop_front()
    }

    /// Check if there is pending output
    pub fn has_output(&self) -> bool {
        !self.output.is_empty()
    }

    /// Drain all buffered events
    pub fn drain_events(&mut self) -> Vec<HfEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: HfEvent) {
        self.events.push(event);
    }

    pub(crate) fn set_state(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!("State {} -> {}", from, to);
        self.events.push(HfEvent::StateChanged { from, to });
    }

    /// Issue a request expecting a final result code
    ///
    /// Queued if another request is outstanding.
    pub(crate) fn request(&mut self, command: HfCommand) -> Result<(), HfError> {
        if self.pending.is_none() {
            self.transmit(command);
            return Ok(());
        }

        if self.queued.len() >= self.config.max_queued_requests {
            warn!("Cannot queue {}: {} requests waiting", command, self.queued.len());
            return Err(HfError::QueueFull(self.queued.len()));
        }
        debug!("Queueing {} behind {:?}", command, self.last_sent());
        self.queued.push_back(command);
        Ok(())
    }

    /// Acknowledge (`OK`) or reject (`ERROR`) an AG response
    pub(crate) fn reply(&mut self, command: HfCommand) {
        if self.config.acknowledge_responses {
            self.transmit(command);
        }
    }

    fn transmit(&mut self, command: HfCommand) {
        debug!("-> {}", command);
        self.output.push_back(command.encode());
        if command.expects_reply() {
            self.pending = Some(PendingRequest {
                command,
                deadline: Instant::now() + self.config.response_timeout(),
            });
        }
    }

    fn flush_queue(&mut self) {
        while self.pending.is_none() {
            let Some(command) = self.queued.pop_front() else {
                break;
            };
            self.transmit(command);
        }
    }

    /// Final result code `OK`: complete the outstanding request
    pub(crate) fn complete_request(&mut self) {
        let Some(pending) = self.pending.take() else {
            debug!("OK with no outstanding request, ignoring");
            return;
        };

        let command = pending.command.command();
        debug!("{} acknowledged", command);

        match (self.state, command) {
            (ConnectionState::AwaitingCmerAck, AtCommand::AtCmer) => {
                info!("Indicator event reporting enabled");
                match self.request(HfCommand::CallerIdNotification(true)) {
                    Ok(()) => self.set_state(ConnectionState::AwaitingClipAck),
                    Err(e) => warn!("Cannot enable caller id notification: {}", e),
                }
            }
            (ConnectionState::AwaitingClipAck, AtCommand::AtClip) => {
                info!("Service level connection established");
                self.set_state(ConnectionState::Ready);
            }
            // OK for the awaited step, but its response never arrived
            (state, command) if state.awaited_command() == Some(command) => {
                warn!("{} completed without a usable response", command);
                self.emit(HfEvent::CommandFailed {
                    command,
                    reason: FailureReason::Error,
                });
                warn!("Service level connection aborted at {}", command);
                self.set_state(ConnectionState::Aborted { step: command });
            }
            _ => {}
        }

        self.flush_queue();
    }

    /// Final result code `ERROR` or `+CME ERROR`: fail the outstanding request
    pub(crate) fn reject_request(&mut self, reason: FailureReason) {
        let Some(pending) = self.pending.take() else {
            debug!("{} with no outstanding request, ignoring", reason);
            return;
        };

        self.fail_request(pending.command, reason);
        self.flush_queue();
    }

    fn fail_request(&mut self, command: HfCommand, reason: FailureReason) {
        let command = command.command();
        if command == AtCommand::Ata {
            warn!("Attending call failed: {}", reason);
            self.emit(HfEvent::AnswerFailed { reason });
        } else {
            warn!("Command {} failed: {}", command, reason);
            self.emit(HfEvent::CommandFailed { command, reason });
        }

        if self.state.awaited_command() == Some(command) {
            warn!("Service level connection aborted at {}", command);
            self.set_state(ConnectionState::Aborted { step: command });
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
