//! AG indicator table and value interpretation
//!
//! The AG announces its indicators once, in a fixed order, in response to
//! `AT+CIND=?`:
//!
//! ```text
//! +CIND: ("service",(0,1)),("call",(0,1)),("callsetup",(0-3)),("signal",(0-5))
//! ```
//!
//! Every later `+CIND:` read and `+CIEV:` event refers to indicators by
//! their 1-based position in that list.

use std::fmt;

use crate::error::ParseError;
use crate::text::{parse_decimal, strip_whitespace};

/// AG indicators the Hands-Free engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Indicator {
    Service,
    Call,
    CallSetup,
    Signal,
    CallHeld,
    Roam,
    BattChg,
}

impl Indicator {
    /// Look up an indicator by its AG name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "service" => Some(Indicator::Service),
            "call" => Some(Indicator::Call),
            "callsetup" | "call_setup" => Some(Indicator::CallSetup),
            "signal" => Some(Indicator::Signal),
            "callheld" => Some(Indicator::CallHeld),
            "roam" => Some(Indicator::Roam),
            "battchg" => Some(Indicator::BattChg),
            _ => None,
        }
    }

    /// AG name of this indicator
    pub fn name(&self) -> &'static str {
        match self {
            Indicator::Service => "service",
            Indicator::Call => "call",
            Indicator::CallSetup => "callsetup",
            Indicator::Signal => "signal",
            Indicator::CallHeld => "callheld",
            Indicator::Roam => "roam",
            Indicator::BattChg => "battchg",
        }
    }
}

/// Positions of known indicators, built from the `+CIND` test response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndicatorIndex {
    positions: Vec<(Indicator, usize)>,
    count: usize,
}

impl IndicatorIndex {
    /// 1-based position of an indicator, if the AG announced it
    pub fn position(&self, indicator: Indicator) -> Option<usize> {
        self.positions
            .iter()
            .find(|(ind, _)| *ind == indicator)
            .map(|&(_, pos)| pos)
    }

    /// Indicator at a 1-based position, if it is one we understand
    pub fn indicator_at(&self, position: usize) -> Option<Indicator> {
        self.positions
            .iter()
            .find(|(_, pos)| *pos == position)
            .map(|&(ind, _)| ind)
    }

    /// Total number of indicators announced, recognised or not
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the AG announced no indicators at all
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Parse the payload of a `+CIND` test response into an [`IndicatorIndex`]
///
/// Every top-level parenthesised group consumes one position, so
/// indicators we don't know about keep later offsets correct.
pub fn parse_indicator_test(payload: &str) -> Result<IndicatorIndex, ParseError> {
    let mut text = payload.to_string();
    strip_whitespace(&mut text);

    let mut index = IndicatorIndex::default();
    let mut rest = text.as_str();

    while let Some(open) = rest.find('(') {
        let position = index.count + 1;
        let group = &rest[open..];

        let mut depth = 0usize;
        let mut close = None;
        for (i, c) in group.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = close.ok_or(ParseError::UnbalancedGroup { position })?;

        let inner = &group[1..close];
        if let Some(indicator) = quoted_name(inner).and_then(Indicator::from_name) {
            index.positions.push((indicator, position));
        }
        index.count = position;
        rest = &group[close + 1..];
    }

    Ok(index)
}

/// Leading `"name"` of an indicator group body
fn quoted_name(group: &str) -> Option<&str> {
    let body = group.strip_prefix('"')?;
    let end = body.find('"')?;
    Some(&body[..end])
}

/// Parse the comma-separated values of a `+CIND` read response
pub fn parse_indicator_values(payload: &str) -> Result<Vec<u32>, ParseError> {
    payload
        .split(',')
        .map(|v| parse_decimal(v).ok_or_else(|| ParseError::InvalidNumber(v.trim().to_string())))
        .collect()
}

/// Parse a `+CIEV` payload into `(index, value)`
pub fn parse_indicator_event(payload: &str) -> Result<(usize, u32), ParseError> {
    let mut fields = payload.split(',');
    let (Some(index), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(ParseError::MalformedEvent(payload.trim().to_string()));
    };

    let index = parse_decimal(index)
        .ok_or_else(|| ParseError::InvalidNumber(index.trim().to_string()))?;
    let value = parse_decimal(value)
        .ok_or_else(|| ParseError::InvalidNumber(value.trim().to_string()))?;
    if index == 0 {
        return Err(ParseError::IndexOutOfRange(0));
    }
    Ok((index as usize, value))
}

/// Network service availability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ServiceState {
    Unavailable,
    Available,
}

/// Whether a call is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallState {
    None,
    Active,
}

/// Call setup progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallSetupState {
    Idle,
    Incoming,
    Outgoing,
    RemoteAlerting,
}

/// An indicator value with its meaning decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndicatorValue {
    Service(ServiceState),
    Call(CallState),
    CallSetup(CallSetupState),
    Signal(u8),
    CallHeld(u8),
    Roam(bool),
    BattChg(u8),
}

impl IndicatorValue {
    /// Decode a raw value for the given indicator
    ///
    /// Values outside the ranges HFP defines are rejected.
    pub fn decode(indicator: Indicator, raw: u32) -> Result<Self, ParseError> {
        let out_of_range = || ParseError::InvalidNumber(format!("{}={}", indicator.name(), raw));
        Ok(match (indicator, raw) {
            (Indicator::Service, 0) => IndicatorValue::Service(ServiceState::Unavailable),
            (Indicator::Service, 1) => IndicatorValue::Service(ServiceState::Available),
            (Indicator::Call, 0) => IndicatorValue::Call(CallState::None),
            (Indicator::Call, 1) => IndicatorValue::Call(CallState::Active),
            (Indicator::CallSetup, 0) => IndicatorValue::CallSetup(CallSetupState::Idle),
            (Indicator::CallSetup, 1) => IndicatorValue::CallSetup(CallSetupState::Incoming),
            (Indicator::CallSetup, 2) => IndicatorValue::CallSetup(CallSetupState::Outgoing),
            (Indicator::CallSetup, 3) => IndicatorValue::CallSetup(CallSetupState::RemoteAlerting),
            (Indicator::Signal, 0..=5) => IndicatorValue::Signal(raw as u8),
            (Indicator::CallHeld, 0..=2) => IndicatorValue::CallHeld(raw as u8),
            (Indicator::Roam, 0) => IndicatorValue::Roam(false),
            (Indicator::Roam, 1) => IndicatorValue::Roam(true),
            (Indicator::BattChg, 0..=5) => IndicatorValue::BattChg(raw as u8),
            _ => return Err(out_of_range()),
        })
    }

    /// The indicator this value belongs to
    pub fn indicator(&self) -> Indicator {
        match self {
            IndicatorValue::Service(_) => Indicator::Service,
            IndicatorValue::Call(_) => Indicator::Call,
            IndicatorValue::CallSetup(_) => Indicator::CallSetup,
            IndicatorValue::Signal(_) => Indicator::Signal,
            IndicatorValue::CallHeld(_) => Indicator::CallHeld,
            IndicatorValue::Roam(_) => Indicator::Roam,
            IndicatorValue::BattChg(_) => Indicator::BattChg,
        }
    }
}

impl fmt::Display for IndicatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorValue::Service(ServiceState::Available) => f.write_str("service available"),
            IndicatorValue::Service(ServiceState::Unavailable) => {
                f.write_str("service unavailable")
            }
            IndicatorValue::Call(CallState::Active) => f.write_str("call active"),
            IndicatorValue::Call(CallState::None) => f.write_str("no call active"),
            IndicatorValue::CallSetup(CallSetupState::Idle) => f.write_str("callsetup idle"),
            IndicatorValue::CallSetup(CallSetupState::Incoming) => {
                f.write_str("incoming call in progress")
            }
            IndicatorValue::CallSetup(CallSetupState::Outgoing) => {
                f.write_str("outgoing call setup")
            }
            IndicatorValue::CallSetup(CallSetupState::RemoteAlerting) => {
                f.write_str("remote party alerted")
            }
            IndicatorValue::Signal(level) => write!(f, "signal strength {}", level),
            IndicatorValue::CallHeld(0) => f.write_str("no call held"),
            IndicatorValue::CallHeld(1) => f.write_str("call on hold with active call"),
            IndicatorValue::CallHeld(_) => f.write_str("call on hold, no active call"),
            IndicatorValue::Roam(true) => f.write_str("roaming"),
            IndicatorValue::Roam(false) => f.write_str("home network"),
            IndicatorValue::BattChg(level) => write!(f, "battery level {}", level),
        }
    }
}
