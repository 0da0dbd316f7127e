//! Supported-features bitmasks exchanged via `AT+BRSF` / `+BRSF`
//!
//! Bit assignments follow HFP 1.7 section 4.34.1. The AG and HF masks use
//! different layouts.

/// Features announced by the Audio Gateway in `+BRSF`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgFeatures(pub u32);

impl AgFeatures {
    pub const THREE_WAY_CALLING: u32 = 1 << 0;
    pub const EC_NR: u32 = 1 << 1;
    pub const VOICE_RECOGNITION: u32 = 1 << 2;
    pub const INBAND_RINGING: u32 = 1 << 3;
    pub const VOICE_TAG: u32 = 1 << 4;
    pub const REJECT_CALL: u32 = 1 << 5;
    pub const ENHANCED_CALL_STATUS: u32 = 1 << 6;
    pub const ENHANCED_CALL_CONTROL: u32 = 1 << 7;
    pub const EXTENDED_ERROR_RESULTS: u32 = 1 << 8;
    pub const CODEC_NEGOTIATION: u32 = 1 << 9;
    pub const HF_INDICATORS: u32 = 1 << 10;

    const DESCRIPTIONS: &'static [(u32, &'static str)] = &[
        (Self::THREE_WAY_CALLING, "three way calling"),
        (Self::EC_NR, "echo cancellation and noise reduction"),
        (Self::VOICE_RECOGNITION, "voice recognition"),
        (Self::INBAND_RINGING, "in-band ringing"),
        (Self::VOICE_TAG, "attach a number to a voice tag"),
        (Self::REJECT_CALL, "ability to reject a call"),
        (Self::ENHANCED_CALL_STATUS, "enhanced call status"),
        (Self::ENHANCED_CALL_CONTROL, "enhanced call control"),
        (Self::EXTENDED_ERROR_RESULTS, "extended error result codes"),
        (Self::CODEC_NEGOTIATION, "codec negotiation"),
        (Self::HF_INDICATORS, "HF indicators"),
    ];

    /// Whether all bits of `feature` are set
    pub fn supports(&self, feature: u32) -> bool {
        self.0 & feature == feature
    }

    /// Descriptions of every supported feature, lowest bit first
    pub fn descriptions(&self) -> impl Iterator<Item = &'static str> + '_ {
        Self::DESCRIPTIONS
            .iter()
            .filter(|(bit, _)| self.supports(*bit))
            .map(|&(_, desc)| desc)
    }
}

/// Features this Hands-Free unit announces in `AT+BRSF`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HfFeatures(pub u32);

impl HfFeatures {
    pub const EC_NR: u32 = 1 << 0;
    pub const THREE_WAY_CALLING: u32 = 1 << 1;
    pub const CLI_PRESENTATION: u32 = 1 << 2;
    pub const VOICE_RECOGNITION: u32 = 1 << 3;
    pub const REMOTE_VOLUME: u32 = 1 << 4;
    pub const ENHANCED_CALL_STATUS: u32 = 1 << 5;
    pub const ENHANCED_CALL_CONTROL: u32 = 1 << 6;
    pub const CODEC_NEGOTIATION: u32 = 1 << 7;
    pub const HF_INDICATORS: u32 = 1 << 8;

    /// Whether all bits of `feature` are set
    pub fn supports(&self, feature: u32) -> bool {
        self.0 & feature == feature
    }
}

impl Default for HfFeatures {
    /// Caller-id presentation only; no audio features are offered
    fn default() -> Self {
        Self(Self::CLI_PRESENTATION)
    }
}
