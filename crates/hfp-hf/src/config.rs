//! Hands-Free connection configuration

use std::time::Duration;

use hfp_protocol::{HfFeatures, MAX_FRAME_LEN};
use serde::{Deserialize, Serialize};

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HfConfig {
    /// Supported-features bitmask sent in `AT+BRSF`
    #[serde(default = "default_hf_features")]
    pub hf_features: u32,
    /// Answer automatically after this many consecutive RINGs (None disables)
    #[serde(default = "default_auto_answer")]
    pub auto_answer_rings: Option<u32>,
    /// How long to wait for a final result code before failing a request (ms)
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Longest accepted frame in bytes
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
    /// Reply `OK`/`ERROR` to parsed AG responses and events
    #[serde(default = "default_true")]
    pub acknowledge_responses: bool,
    /// Arguments for `AT+CMER`
    #[serde(default = "default_event_reporting")]
    pub event_reporting: String,
    /// Requests allowed to wait behind the outstanding one
    #[serde(default = "default_max_queued")]
    pub max_queued_requests: usize,
}

fn default_hf_features() -> u32 {
    HfFeatures::default().0
}

fn default_auto_answer() -> Option<u32> {
    Some(3)
}

fn default_response_timeout_ms() -> u64 {
    5000
}

fn default_max_frame_len() -> usize {
    MAX_FRAME_LEN
}

fn default_true() -> bool {
    true
}

fn default_event_reporting() -> String {
    "3,0,0,1".to_string()
}

fn default_max_queued() -> usize {
    8
}

impl Default for HfConfig {
    fn default() -> Self {
        Self {
            hf_features: default_hf_features(),
            auto_answer_rings: default_auto_answer(),
            response_timeout_ms: default_response_timeout_ms(),
            max_frame_len: default_max_frame_len(),
            acknowledge_responses: true,
            event_reporting: default_event_reporting(),
            max_queued_requests: default_max_queued(),
        }
    }
}

impl HfConfig {
    /// Request deadline as a [`Duration`]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Ring threshold for auto-answer, treating zero as disabled
    pub fn auto_answer_threshold(&self) -> Option<u32> {
        self.auto_answer_rings.filter(|&n| n > 0)
    }
}
