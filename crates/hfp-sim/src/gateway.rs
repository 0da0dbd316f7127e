//! Virtual Audio Gateway
//!
//! Plays the phone side of an HFP service level connection: answers the
//! Hands-Free bring-up commands and generates unsolicited `RING`, `+CLIP`
//! and `+CIEV` notifications when its state changes.

use std::collections::{HashSet, VecDeque};

use hfp_protocol::{AgResponse, AtCommand, AtFrame, EncodeCommand, FrameCodec, ProtocolCodec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One AG indicator with its range and current value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimIndicator {
    pub name: String,
    pub min: u32,
    pub max: u32,
    pub value: u32,
}

impl SimIndicator {
    pub fn new(name: impl Into<String>, min: u32, max: u32, value: u32) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            value,
        }
    }
}

/// Configuration for creating a virtual AG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAgConfig {
    /// Display name/identifier
    pub id: String,
    /// Supported-features bitmask reported in `+BRSF`
    pub features: u32,
    /// Indicators in announcement order
    pub indicators: Vec<SimIndicator>,
}

impl Default for VirtualAgConfig {
    fn default() -> Self {
        Self {
            id: "Virtual AG".to_string(),
            features: 871,
            indicators: vec![
                SimIndicator::new("service", 0, 1, 1),
                SimIndicator::new("call", 0, 1, 0),
                SimIndicator::new("callsetup", 0, 3, 0),
                SimIndicator::new("callheld", 0, 2, 0),
                SimIndicator::new("signal", 0, 5, 4),
                SimIndicator::new("roam", 0, 1, 0),
                SimIndicator::new("battchg", 0, 5, 5),
            ],
        }
    }
}

/// A simulated Audio Gateway
#[derive(Debug)]
pub struct VirtualAudioGateway {
    id: String,
    features: u32,
    indicators: Vec<SimIndicator>,
    /// Caller presented with the next RING
    caller: Option<(String, u8)>,
    /// Set by `AT+CMER` with reporting enabled
    event_reporting: bool,
    /// Set by `AT+CLIP=1`
    caller_id_enabled: bool,
    codec: FrameCodec,
    /// Every frame received from the HF, in order
    received: Vec<AtFrame>,
    /// Commands answered with `ERROR` instead of their normal response
    rejected: HashSet<AtCommand>,
    /// Commands left unanswered
    silenced: HashSet<AtCommand>,
    pending_output: VecDeque<Vec<u8>>,
}

impl VirtualAudioGateway {
    /// Create a virtual AG with the default indicator set
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_config(VirtualAgConfig {
            id: id.into(),
            ..Default::default()
        })
    }

    /// Create a virtual AG from configuration
    pub fn from_config(config: VirtualAgConfig) -> Self {
        Self {
            id: config.id,
            features: config.features,
            indicators: config.indicators,
            caller: None,
            event_reporting: false,
            caller_id_enabled: false,
            codec: FrameCodec::new(),
            received: Vec::new(),
            rejected: HashSet::new(),
            silenced: HashSet::new(),
            pending_output: VecDeque::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether `AT+CMER` enabled indicator event reporting
    pub fn event_reporting(&self) -> bool {
        self.event_reporting
    }

    /// Whether `AT+CLIP=1` enabled caller-id notification
    pub fn caller_id_enabled(&self) -> bool {
        self.caller_id_enabled
    }

    /// Frames received from the HF so far
    pub fn received(&self) -> &[AtFrame] {
        &self.received
    }

    /// Received frame texts, for compact assertions
    pub fn received_text(&self) -> Vec<&str> {
        self.received.iter().map(|f| f.text.as_str()).collect()
    }

    /// Current value of the named indicator
    pub fn indicator(&self, name: &str) -> Option<u32> {
        self.indicators
            .iter()
            .find(|i| i.name == name)
            .map(|i| i.value)
    }

    /// Answer `command` with `ERROR` from now on
    pub fn reject(&mut self, command: AtCommand) {
        self.rejected.insert(command);
    }

    /// Leave `command` unanswered from now on
    pub fn silence(&mut self, command: AtCommand) {
        self.silenced.insert(command);
    }

    /// Feed bytes written by the HF and queue the responses
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.codec.push_bytes(data);
        while let Some(frame) = self.codec.next_command() {
            self.process_frame(frame);
        }
    }

    fn process_frame(&mut self, frame: AtFrame) {
        debug!("Virtual AG {} received {:?}", self.id, frame.text);
        let command = frame.command;
        let args = frame.value().map(str::to_string);
        self.received.push(frame);

        // HF acknowledgements need no answer
        if matches!(command, AtCommand::Ok | AtCommand::Error) {
            return;
        }
        if self.silenced.contains(&command) {
            debug!("Virtual AG {} not answering {}", self.id, command);
            return;
        }
        if self.rejected.contains(&command) {
            self.queue(AgResponse::Error);
            return;
        }

        match command {
            AtCommand::AtBrsf => {
                self.queue(AgResponse::SupportedFeatures(self.features));
                self.queue(AgResponse::Ok);
            }
            AtCommand::AtCindTest => {
                let list = self
                    .indicators
                    .iter()
                    .map(|i| (i.name.clone(), i.min, i.max))
                    .collect();
                self.queue(AgResponse::IndicatorTest(list));
                self.queue(AgResponse::Ok);
            }
            AtCommand::AtCindRead => {
                let values = self.indicators.iter().map(|i| i.value).collect();
                self.queue(AgResponse::IndicatorValues(values));
                self.queue(AgResponse::Ok);
            }
            AtCommand::AtCmer => {
                // AT+CMER=<mode>,<keyp>,<disp>,<ind>
                let ind = args.as_deref().and_then(|a| a.split(',').nth(3));
                self.event_reporting = ind.map(str::trim) == Some("1");
                info!(
                    "Virtual AG {} event reporting {}",
                    self.id,
                    if self.event_reporting { "on" } else { "off" }
                );
                self.queue(AgResponse::Ok);
            }
            AtCommand::AtClip => {
                self.caller_id_enabled = args.as_deref().map(str::trim) == Some("1");
                self.queue(AgResponse::Ok);
            }
            AtCommand::Ata => {
                if self.indicator("callsetup") == Some(1) {
                    info!("Virtual AG {} call answered", self.id);
                    self.queue(AgResponse::Ok);
                    self.set_indicator("call", 1);
                    self.set_indicator("callsetup", 0);
                    self.caller = None;
                } else {
                    self.queue(AgResponse::Error);
                }
            }
            AtCommand::AtChup => {
                info!("Virtual AG {} call ended", self.id);
                self.queue(AgResponse::Ok);
                self.set_indicator("call", 0);
                self.set_indicator("callsetup", 0);
                self.caller = None;
            }
            AtCommand::AtBac | AtCommand::AtBindSet | AtCommand::AtBiev => {
                self.queue(AgResponse::Ok);
            }
            _ => self.queue(AgResponse::Error),
        }
    }

    /// Set the caller presented with subsequent RINGs
    pub fn set_caller(&mut self, number: impl Into<String>, number_type: u8) {
        self.caller = Some((number.into(), number_type));
    }

    /// Alert an incoming call: `RING`, then `+CLIP` if caller id is enabled
    pub fn ring(&mut self) {
        if self.indicator("call") == Some(1) {
            debug!("Virtual AG {} already in a call, not ringing", self.id);
            return;
        }
        self.set_indicator("callsetup", 1);
        self.queue(AgResponse::Ring);
        if self.caller_id_enabled {
            if let Some((number, number_type)) = self.caller.clone() {
                self.queue(AgResponse::CallerId {
                    number,
                    number_type,
                });
            }
        }
    }

    /// Change an indicator, queueing `+CIEV` if event reporting is on
    ///
    /// Returns `false` for an unknown indicator or out-of-range value.
    pub fn set_indicator(&mut self, name: &str, value: u32) -> bool {
        let Some(pos) = self.indicators.iter().position(|i| i.name == name) else {
            return false;
        };
        let indicator = &mut self.indicators[pos];
        if value < indicator.min || value > indicator.max {
            return false;
        }
        if indicator.value == value {
            return true;
        }
        indicator.value = value;

        if self.event_reporting {
            self.queue(AgResponse::IndicatorEvent {
                index: pos + 1,
                value,
            });
        }
        true
    }

    /// Queue raw bytes, for feeding malformed traffic to the HF
    pub fn queue_raw(&mut self, data: &[u8]) {
        self.pending_output.push_back(data.to_vec());
    }

    fn queue(&mut self, response: AgResponse) {
        debug!("Virtual AG {} -> {}", self.id, response);
        self.pending_output.push_back(response.encode());
    }

    /// Take the next pending output
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.pending_output.pop_front()
    }

    /// Check if there is pending output
    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }

    /// Remove all pending output
    pub fn clear_output(&mut self) {
        self.pending_output.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(ag: &mut VirtualAudioGateway) -> String {
        std::iter::from_fn(|| ag.take_output())
            .map(|b| String::from_utf8(b).unwrap())
            .collect()
    }

    #[test]
    fn test_debug_shows_id() {
        let ag = VirtualAudioGateway::new("phone-a");
        assert!(format!("{:?}", ag).contains("phone-a"));
    }

    #[test]
    fn test_brsf_response() {
        let mut ag = VirtualAudioGateway::new("test");
        ag.push_bytes(b"AT+BRSF=4\r\n");
        assert_eq!(output(&mut ag), "\r\n+BRSF: 871\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_cind_responses() {
        let config = VirtualAgConfig {
            indicators: vec![
                SimIndicator::new("service", 0, 1, 1),
                SimIndicator::new("call", 0, 1, 0),
            ],
            ..Default::default()
        };
        let mut ag = VirtualAudioGateway::from_config(config);

        ag.push_bytes(b"AT+CIND=?\r\n");
        assert_eq!(
            output(&mut ag),
            "\r\n+CIND: (\"service\",(0,1)),(\"call\",(0,1))\r\n\r\nOK\r\n"
        );
        ag.push_bytes(b"AT+CIND?\r\n");
        assert_eq!(output(&mut ag), "\r\n+CIND: 1,0\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_cmer_and_clip_enable_notifications() {
        let mut ag = VirtualAudioGateway::new("test");
        ag.push_bytes(b"AT+CMER=3,0,0,1\r\nAT+CLIP=1\r\n");
        assert!(ag.event_reporting());
        assert!(ag.caller_id_enabled());
        assert_eq!(output(&mut ag), "\r\nOK\r\n\r\nOK\r\n");

        ag.set_caller("555", 129);
        ag.ring();
        assert_eq!(
            output(&mut ag),
            "\r\n+CIEV: 3,1\r\n\r\nRING\r\n\r\n+CLIP: \"555\",129\r\n"
        );
    }

    #[test]
    fn test_no_ciev_without_reporting() {
        let mut ag = VirtualAudioGateway::new("test");
        assert!(ag.set_indicator("signal", 2));
        assert_eq!(ag.indicator("signal"), Some(2));
        assert!(!ag.has_output());

        assert!(!ag.set_indicator("signal", 9));
        assert!(!ag.set_indicator("nonsense", 1));
    }

    #[test]
    fn test_answer_and_hang_up() {
        let mut ag = VirtualAudioGateway::new("test");
        ag.push_bytes(b"ATA\r\n");
        assert_eq!(output(&mut ag), "\r\nERROR\r\n");

        ag.ring();
        ag.clear_output();
        ag.push_bytes(b"ATA\r\n");
        assert_eq!(ag.indicator("call"), Some(1));
        assert_eq!(ag.indicator("callsetup"), Some(0));

        ag.push_bytes(b"AT+CHUP\r\n");
        assert_eq!(ag.indicator("call"), Some(0));
    }

    #[test]
    fn test_acknowledgements_not_answered() {
        let mut ag = VirtualAudioGateway::new("test");
        ag.push_bytes(b"OK\r\nERROR\r\n");
        assert!(!ag.has_output());
        assert_eq!(ag.received_text(), vec!["OK", "ERROR"]);
    }

    #[test]
    fn test_unknown_command_rejected() {
        let mut ag = VirtualAudioGateway::new("test");
        ag.push_bytes(b"AT+XAPL=0000-0000-0100,7\r\n");
        assert_eq!(output(&mut ag), "\r\nERROR\r\n");
    }

    #[test]
    fn test_reject_and_silence() {
        let mut ag = VirtualAudioGateway::new("test");
        ag.reject(AtCommand::AtBrsf);
        ag.silence(AtCommand::AtCindTest);

        ag.push_bytes(b"AT+BRSF=4\r\n");
        assert_eq!(output(&mut ag), "\r\nERROR\r\n");
        ag.push_bytes(b"AT+CIND=?\r\n");
        assert!(!ag.has_output());
    }
}
