//! HFP AT command vocabulary
//!
//! # Classification
//!
//! A frame's *name* is the text before its first `?`, `=` or `:`. A table
//! entry matches when its own name equals the frame's name and the frame
//! starts with the full entry text, so `AT+CIND?` and `AT+CIND=?` never
//! collide even though they share a name. When several entries match, the
//! longest one wins (`AT+BIND=?` over `AT+BIND=`).

use std::fmt;

use crate::text::find_any;
use crate::EncodeCommand;

/// Delimiters that separate a command name from its payload
pub const DELIMITERS: [char; 3] = ['?', '=', ':'];

/// Canonical HFP command identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AtCommand {
    /// Final result code: success
    Ok,
    /// Final result code: failure
    Error,
    /// Extended error result code: `+CME ERROR: <n>`
    CmeError,
    /// HF supported features: `AT+BRSF=<bitmask>`
    AtBrsf,
    /// AG supported features: `+BRSF: <bitmask>`
    Brsf,
    /// HF available codecs: `AT+BAC=<ids>`
    AtBac,
    /// Indicator test (supported indicators and ordering): `AT+CIND=?`
    AtCindTest,
    /// Indicator read (current values): `AT+CIND?`
    AtCindRead,
    /// Indicator test or read response: `+CIND: ...`
    Cind,
    /// Indicator event reporting control: `AT+CMER=3,0,0,1`
    AtCmer,
    /// Indicator event: `+CIEV: <index>,<value>`
    Ciev,
    /// HF indicators supported by the AG: `AT+BIND=?`
    AtBindTest,
    /// HF indicators enabled on the AG: `AT+BIND?`
    AtBindRead,
    /// HF indicators supported by the HF: `AT+BIND=<ids>`
    AtBindSet,
    /// HF indicator response: `+BIND: ...`
    Bind,
    /// HF indicator value: `AT+BIEV=<id>,<value>`
    AtBiev,
    /// Codec selection from the AG: `+BCS: <id>`
    Bcs,
    /// Answer incoming call
    Ata,
    /// Incoming call alert
    Ring,
    /// Hang up / reject call
    AtChup,
    /// Caller-id notification control: `AT+CLIP=1`
    AtClip,
    /// Caller-id notification: `+CLIP: "<number>",<type>`
    Clip,
    /// Frame not in the known vocabulary
    Unknown,
}

/// The known-command table: each entry is a complete, distinct prefix
pub const KNOWN_COMMANDS: &[(&str, AtCommand)] = &[
    ("OK", AtCommand::Ok),
    ("ERROR", AtCommand::Error),
    ("+CME ERROR:", AtCommand::CmeError),
    ("AT+BRSF=", AtCommand::AtBrsf),
    ("+BRSF:", AtCommand::Brsf),
    ("AT+BAC=", AtCommand::AtBac),
    ("AT+CIND=?", AtCommand::AtCindTest),
    ("AT+CIND?", AtCommand::AtCindRead),
    ("+CIND:", AtCommand::Cind),
    ("AT+CMER=", AtCommand::AtCmer),
    ("+CIEV:", AtCommand::Ciev),
    ("AT+BIND=?", AtCommand::AtBindTest),
    ("AT+BIND?", AtCommand::AtBindRead),
    ("AT+BIND=", AtCommand::AtBindSet),
    ("+BIND:", AtCommand::Bind),
    ("AT+BIEV=", AtCommand::AtBiev),
    ("+BCS:", AtCommand::Bcs),
    ("ATA", AtCommand::Ata),
    ("RING", AtCommand::Ring),
    ("AT+CHUP", AtCommand::AtChup),
    ("AT+CLIP=", AtCommand::AtClip),
    ("+CLIP:", AtCommand::Clip),
];

/// Text before the first delimiter, or the whole frame
fn name_of(text: &str) -> &str {
    match find_any(text, &DELIMITERS) {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// Map a frame to its canonical command identifier
pub fn classify(frame: &str) -> AtCommand {
    if frame.is_empty() {
        return AtCommand::Unknown;
    }

    let name = name_of(frame);
    KNOWN_COMMANDS
        .iter()
        .filter(|(prefix, _)| name_of(prefix) == name && frame.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|&(_, cmd)| cmd)
        .unwrap_or(AtCommand::Unknown)
}

/// Payload after the first `:`, `?` or `=`, if non-empty
pub fn value(frame: &str) -> Option<&str> {
    let idx = find_any(frame, &DELIMITERS)?;
    let rest = &frame[idx + 1..];
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

impl AtCommand {
    /// Canonical prefix from the known-command table
    pub fn prefix(&self) -> Option<&'static str> {
        KNOWN_COMMANDS
            .iter()
            .find(|(_, cmd)| cmd == self)
            .map(|&(prefix, _)| prefix)
    }

    /// Short human-readable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            AtCommand::Ok => "OK",
            AtCommand::Error => "ERROR",
            AtCommand::CmeError => "+CME ERROR",
            AtCommand::AtBrsf => "AT+BRSF",
            AtCommand::Brsf => "+BRSF",
            AtCommand::AtBac => "AT+BAC",
            AtCommand::AtCindTest => "AT+CIND=?",
            AtCommand::AtCindRead => "AT+CIND?",
            AtCommand::Cind => "+CIND",
            AtCommand::AtCmer => "AT+CMER",
            AtCommand::Ciev => "+CIEV",
            AtCommand::AtBindTest => "AT+BIND=?",
            AtCommand::AtBindRead => "AT+BIND?",
            AtCommand::AtBindSet => "AT+BIND",
            AtCommand::Bind => "+BIND",
            AtCommand::AtBiev => "AT+BIEV",
            AtCommand::Bcs => "+BCS",
            AtCommand::Ata => "ATA",
            AtCommand::Ring => "RING",
            AtCommand::AtChup => "AT+CHUP",
            AtCommand::AtClip => "AT+CLIP",
            AtCommand::Clip => "+CLIP",
            AtCommand::Unknown => "unknown",
        }
    }

    /// Whether this is a final result code terminating a request
    pub fn is_final_result(&self) -> bool {
        matches!(
            self,
            AtCommand::Ok | AtCommand::Error | AtCommand::CmeError
        )
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtFrame {
    /// Canonical command identifier
    pub command: AtCommand,
    /// Frame text without CR/LF
    pub text: String,
}

impl AtFrame {
    /// Classify a frame's text
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            command: classify(&text),
            text,
        }
    }

    /// Payload after the first delimiter
    pub fn value(&self) -> Option<&str> {
        value(&self.text)
    }
}

/// Commands sent by the Hands-Free unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HfCommand {
    /// `AT+BRSF=<features>`
    SupportedFeatures(u32),
    /// `AT+CIND=?`
    IndicatorTest,
    /// `AT+CIND?`
    IndicatorRead,
    /// `AT+CMER=<args>`
    EventReporting(String),
    /// `AT+CLIP=<0|1>`
    CallerIdNotification(bool),
    /// `ATA`
    Answer,
    /// `AT+CHUP`
    HangUp,
    /// `OK` acknowledgement of an AG response
    Ok,
    /// `ERROR` rejection of a malformed AG response
    Error,
}

impl HfCommand {
    /// Canonical identifier for this command
    pub fn command(&self) -> AtCommand {
        match self {
            HfCommand::SupportedFeatures(_) => AtCommand::AtBrsf,
            HfCommand::IndicatorTest => AtCommand::AtCindTest,
            HfCommand::IndicatorRead => AtCommand::AtCindRead,
            HfCommand::EventReporting(_) => AtCommand::AtCmer,
            HfCommand::CallerIdNotification(_) => AtCommand::AtClip,
            HfCommand::Answer => AtCommand::Ata,
            HfCommand::HangUp => AtCommand::AtChup,
            HfCommand::Ok => AtCommand::Ok,
            HfCommand::Error => AtCommand::Error,
        }
    }

    /// Whether the AG must answer this command with a final result code
    pub fn expects_reply(&self) -> bool {
        !matches!(self, HfCommand::Ok | HfCommand::Error)
    }
}

impl fmt::Display for HfCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HfCommand::SupportedFeatures(features) => write!(f, "AT+BRSF={}", features),
            HfCommand::IndicatorTest => f.write_str("AT+CIND=?"),
            HfCommand::IndicatorRead => f.write_str("AT+CIND?"),
            HfCommand::EventReporting(args) => write!(f, "AT+CMER={}", args),
            HfCommand::CallerIdNotification(on) => write!(f, "AT+CLIP={}", u8::from(*on)),
            HfCommand::Answer => f.write_str("ATA"),
            HfCommand::HangUp => f.write_str("AT+CHUP"),
            HfCommand::Ok => f.write_str("OK"),
            HfCommand::Error => f.write_str("ERROR"),
        }
    }
}

impl EncodeCommand for HfCommand {
    fn encode(&self) -> Vec<u8> {
        format!("{}\r\n", self).into_bytes()
    }
}

/// Responses and notifications sent by an Audio Gateway
///
/// Used by simulated peers; the Hands-Free engine itself only decodes these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgResponse {
    Ok,
    Error,
    CmeError(u32),
    /// `+BRSF: <features>`
    SupportedFeatures(u32),
    /// `+CIND: ("name",(min,max)),...`
    IndicatorTest(Vec<(String, u32, u32)>),
    /// `+CIND: v1,v2,...`
    IndicatorValues(Vec<u32>),
    /// `+CIEV: <index>,<value>`
    IndicatorEvent { index: usize, value: u32 },
    Ring,
    /// `+CLIP: "<number>",<type>`
    CallerId { number: String, number_type: u8 },
}

impl fmt::Display for AgResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgResponse::Ok => f.write_str("OK"),
            AgResponse::Error => f.write_str("ERROR"),
            AgResponse::CmeError(code) => write!(f, "+CME ERROR: {}", code),
            AgResponse::SupportedFeatures(features) => write!(f, "+BRSF: {}", features),
            AgResponse::IndicatorTest(indicators) => {
                let groups: Vec<String> = indicators
                    .iter()
                    .map(|(name, min, max)| format!("(\"{}\",({},{}))", name, min, max))
                    .collect();
                write!(f, "+CIND: {}", groups.join(","))
            }
            AgResponse::IndicatorValues(values) => {
                let values: Vec<String> = values.iter().map(u32::to_string).collect();
                write!(f, "+CIND: {}", values.join(","))
            }
            AgResponse::IndicatorEvent { index, value } => {
                write!(f, "+CIEV: {},{}", index, value)
            }
            AgResponse::Ring => f.write_str("RING"),
            AgResponse::CallerId {
                number,
                number_type,
            } => write!(f, "+CLIP: \"{}\",{}", number, number_type),
        }
    }
}

impl EncodeCommand for AgResponse {
    /// AG responses are framed as `\r\n<text>\r\n`
    fn encode(&self) -> Vec<u8> {
        format!("\r\n{}\r\n", self).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_cind_read_vs_test() {
        assert_eq!(classify("AT+CIND?"), AtCommand::AtCindRead);
        assert_eq!(classify("AT+CIND=?"), AtCommand::AtCindTest);
        assert_ne!(classify("AT+CIND?"), classify("AT+CIND=?"));
    }

    #[test]
    fn test_classify_responses() {
        assert_eq!(classify("OK"), AtCommand::Ok);
        assert_eq!(classify("ERROR"), AtCommand::Error);
        assert_eq!(classify("+CME ERROR: 30"), AtCommand::CmeError);
        assert_eq!(classify("+BRSF: 871"), AtCommand::Brsf);
        assert_eq!(classify("+BRSF:12x"), AtCommand::Brsf);
        assert_eq!(classify("+CIND: 1,0,0"), AtCommand::Cind);
        assert_eq!(classify("+CIEV: 2,1"), AtCommand::Ciev);
        assert_eq!(classify("+CLIP: \"555\",129"), AtCommand::Clip);
        assert_eq!(classify("RING"), AtCommand::Ring);
        assert_eq!(classify("+BCS: 2"), AtCommand::Bcs);
        assert_eq!(classify("+BIND: 1,1"), AtCommand::Bind);
    }

    #[test]
    fn test_classify_commands() {
        assert_eq!(classify("AT+BRSF=1023"), AtCommand::AtBrsf);
        assert_eq!(classify("AT+CMER=3,0,0,1"), AtCommand::AtCmer);
        assert_eq!(classify("AT+CLIP=1"), AtCommand::AtClip);
        assert_eq!(classify("ATA"), AtCommand::Ata);
        assert_eq!(classify("AT+CHUP"), AtCommand::AtChup);
        assert_eq!(classify("AT+BIND=?"), AtCommand::AtBindTest);
        assert_eq!(classify("AT+BIND?"), AtCommand::AtBindRead);
        assert_eq!(classify("AT+BIND=1,2"), AtCommand::AtBindSet);
        assert_eq!(classify("AT+BIEV=2,50"), AtCommand::AtBiev);
        assert_eq!(classify("AT+BAC=1,2"), AtCommand::AtBac);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify(""), AtCommand::Unknown);
        assert_eq!(classify("RINGING"), AtCommand::Unknown);
        assert_eq!(classify("ATAB"), AtCommand::Unknown);
        assert_eq!(classify("OKAY"), AtCommand::Unknown);
        assert_eq!(classify("AT+CIND"), AtCommand::Unknown);
        assert_eq!(classify("+CIEV"), AtCommand::Unknown);
        assert_eq!(classify("+COPS: 0,0,\"Carrier\""), AtCommand::Unknown);
    }

    #[test]
    fn test_table_entries_classify_to_themselves() {
        for &(prefix, cmd) in KNOWN_COMMANDS {
            assert_eq!(classify(prefix), cmd, "entry {:?}", prefix);
            assert_eq!(cmd.prefix(), Some(prefix));
        }
    }

    #[test]
    fn test_table_entries_do_not_shadow_each_other() {
        for (i, &(a, cmd_a)) in KNOWN_COMMANDS.iter().enumerate() {
            for &(b, cmd_b) in &KNOWN_COMMANDS[i + 1..] {
                assert_ne!(a, b, "duplicate entry");
                assert_ne!(cmd_a, cmd_b, "two entries for {:?}", cmd_a);
                // A shorter entry sharing a name may be a prefix of a longer
                // one only when the longer one still wins for its own text.
                if name_of(a) == name_of(b) && (a.starts_with(b) || b.starts_with(a)) {
                    let longer = if a.len() > b.len() { (a, cmd_a) } else { (b, cmd_b) };
                    assert_eq!(classify(longer.0), longer.1);
                }
            }
        }
    }

    #[test]
    fn test_value_extraction() {
        assert_eq!(value("+BRSF: 871"), Some(" 871"));
        assert_eq!(value("AT+BRSF=1023"), Some("1023"));
        assert_eq!(value("+CIND: 1,1,0"), Some(" 1,1,0"));
        assert_eq!(value("AT+CIND=?"), Some("?"));
        assert_eq!(value("AT+CIND?"), None);
        assert_eq!(value("+CLIP:"), None);
        assert_eq!(value("RING"), None);
    }

    #[test]
    fn test_frame_value() {
        let frame = AtFrame::new("+CIEV: 3,1");
        assert_eq!(frame.command, AtCommand::Ciev);
        assert_eq!(frame.value(), Some(" 3,1"));
    }

    #[test]
    fn test_encode_hf_commands() {
        assert_eq!(HfCommand::SupportedFeatures(4).encode(), b"AT+BRSF=4\r\n");
        assert_eq!(HfCommand::IndicatorTest.encode(), b"AT+CIND=?\r\n");
        assert_eq!(HfCommand::IndicatorRead.encode(), b"AT+CIND?\r\n");
        assert_eq!(
            HfCommand::EventReporting("3,0,0,1".into()).encode(),
            b"AT+CMER=3,0,0,1\r\n"
        );
        assert_eq!(HfCommand::CallerIdNotification(true).encode(), b"AT+CLIP=1\r\n");
        assert_eq!(HfCommand::Answer.encode(), b"ATA\r\n");
        assert_eq!(HfCommand::HangUp.encode(), b"AT+CHUP\r\n");
    }

    #[test]
    fn test_hf_commands_classify_back() {
        let commands = [
            HfCommand::SupportedFeatures(4),
            HfCommand::IndicatorTest,
            HfCommand::IndicatorRead,
            HfCommand::EventReporting("3,0,0,1".into()),
            HfCommand::CallerIdNotification(true),
            HfCommand::Answer,
            HfCommand::HangUp,
            HfCommand::Ok,
            HfCommand::Error,
        ];
        for cmd in commands {
            assert_eq!(classify(&cmd.to_string()), cmd.command(), "{}", cmd);
        }
    }

    #[test]
    fn test_expects_reply() {
        assert!(HfCommand::Answer.expects_reply());
        assert!(HfCommand::IndicatorRead.expects_reply());
        assert!(!HfCommand::Ok.expects_reply());
        assert!(!HfCommand::Error.expects_reply());
    }

    #[test]
    fn test_encode_ag_responses() {
        assert_eq!(AgResponse::Ok.encode(), b"\r\nOK\r\n");
        assert_eq!(
            AgResponse::SupportedFeatures(871).encode(),
            b"\r\n+BRSF: 871\r\n"
        );
        assert_eq!(
            AgResponse::IndicatorTest(vec![("service".into(), 0, 1), ("call".into(), 0, 1)])
                .encode(),
            b"\r\n+CIND: (\"service\",(0,1)),(\"call\",(0,1))\r\n"
        );
        assert_eq!(
            AgResponse::IndicatorValues(vec![1, 0, 0]).encode(),
            b"\r\n+CIND: 1,0,0\r\n"
        );
        assert_eq!(
            AgResponse::IndicatorEvent { index: 2, value: 1 }.encode(),
            b"\r\n+CIEV: 2,1\r\n"
        );
        assert_eq!(
            AgResponse::CallerId {
                number: "5551234".into(),
                number_type: 129
            }
            .encode(),
            b"\r\n+CLIP: \"5551234\",129\r\n"
        );
    }
}
