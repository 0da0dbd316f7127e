//! Per-command handlers for frames received from the AG

use hfp_protocol::indicators::{
    parse_indicator_event, parse_indicator_test, parse_indicator_values,
};
use hfp_protocol::text::{parse_decimal, strip_quotes, strip_whitespace};
use hfp_protocol::{
    value, AgFeatures, AtCommand, CallSetupState, CallState, HfCommand, IndicatorValue,
    ParseError,
};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::events::{FailureReason, HfEvent};
use crate::state::ConnectionState;

/// Payload of `frame`, or the parse error for a frame that has none
fn payload(command: AtCommand, frame: &str) -> Result<&str, ParseError> {
    value(frame).ok_or_else(|| ParseError::MissingValue(command.name().to_string()))
}

fn decimal(field: &str) -> Result<u32, ParseError> {
    parse_decimal(field).ok_or_else(|| ParseError::InvalidNumber(field.trim().to_string()))
}

impl Connection {
    pub(crate) fn dispatch(&mut self, command: AtCommand, frame: &str) {
        match command {
            AtCommand::Ok => self.complete_request(),
            AtCommand::Error => self.reject_request(FailureReason::Error),
            AtCommand::CmeError => self.handle_cme_error(frame),
            AtCommand::Brsf => self.handle_brsf(frame),
            AtCommand::Cind => self.handle_cind(frame),
            AtCommand::Ciev => self.handle_ciev(frame),
            AtCommand::Ring => self.handle_ring(),
            AtCommand::Clip => self.handle_clip(frame),
            AtCommand::Bcs => {
                info!("AG selected codec {}", value(frame).unwrap_or("?").trim());
            }
            AtCommand::Bind => {
                debug!("AG HF indicator status: {}", value(frame).unwrap_or("").trim());
            }
            // Commands only the HF sends; an AG echoing them is ignored
            AtCommand::AtBrsf
            | AtCommand::AtBac
            | AtCommand::AtCindTest
            | AtCommand::AtCindRead
            | AtCommand::AtCmer
            | AtCommand::AtBindTest
            | AtCommand::AtBindRead
            | AtCommand::AtBindSet
            | AtCommand::AtBiev
            | AtCommand::Ata
            | AtCommand::AtChup
            | AtCommand::AtClip => {
                debug!("Ignoring HF command {} from AG", command);
            }
            AtCommand::Unknown => {
                debug!("Dropping unknown frame {:?}", frame);
            }
        }
    }

    /// Report a payload that failed to parse and reject it
    fn parse_failed(&mut self, command: AtCommand, error: ParseError) {
        warn!("Failed to parse {}: {}", command, error);
        self.emit(HfEvent::ParseFailed { command, error });
        self.reply(HfCommand::Error);
    }

    /// Abort bring-up if `step` is the request the connection is waiting on
    fn abort_step(&mut self, step: AtCommand) {
        if self.state.awaited_command() == Some(step) {
            warn!("Service level connection aborted at {}", step);
            self.set_state(ConnectionState::Aborted { step });
        }
    }

    /// Issue the next bring-up request and move to `next`
    fn advance(&mut self, command: HfCommand, next: ConnectionState) {
        match self.request(command) {
            Ok(()) => self.set_state(next),
            Err(e) => warn!("Cannot continue service level connection: {}", e),
        }
    }

    fn handle_cme_error(&mut self, frame: &str) {
        match payload(AtCommand::CmeError, frame).and_then(decimal) {
            Ok(code) => self.reject_request(FailureReason::CmeError(code)),
            Err(e) => {
                warn!("Unreadable +CME ERROR code ({}), treating as ERROR", e);
                self.reject_request(FailureReason::Error);
            }
        }
    }

    fn handle_brsf(&mut self, frame: &str) {
        let features = match payload(AtCommand::Brsf, frame).and_then(decimal) {
            Ok(bits) => AgFeatures(bits),
            Err(e) => {
                self.parse_failed(AtCommand::Brsf, e);
                return self.abort_step(AtCommand::AtBrsf);
            }
        };

        info!("AG supported features: {:#x}", features.0);
        for description in features.descriptions() {
            info!("  AG supports {}", description);
        }
        self.ag_features = Some(features);
        self.emit(HfEvent::AgFeatures(features));
        self.reply(HfCommand::Ok);

        if self.state == ConnectionState::AwaitingBrsf {
            self.advance(HfCommand::IndicatorTest, ConnectionState::AwaitingCindTest);
        }
    }

    /// `+CIND:` answers both the test and the read form; which one depends
    /// on what we are waiting for
    fn handle_cind(&mut self, frame: &str) {
        let payload = match payload(AtCommand::Cind, frame) {
            Ok(payload) => payload,
            Err(e) => return self.parse_failed(AtCommand::Cind, e),
        };

        let is_test_response = match self.state {
            ConnectionState::AwaitingCindTest => true,
            ConnectionState::AwaitingCindRead => false,
            _ => match self.last_sent() {
                Some(AtCommand::AtCindTest) => true,
                Some(AtCommand::AtCindRead) => false,
                _ => payload.contains('('),
            },
        };

        if is_test_response {
            self.handle_cind_test(payload);
        } else {
            self.handle_cind_read(payload);
        }
    }

    fn handle_cind_test(&mut self, payload: &str) {
        if self.indicator_index.is_some() {
            warn!("Indicator table already known, ignoring new +CIND list");
            return;
        }

        let index = match parse_indicator_test(payload) {
            Ok(index) => index,
            Err(e) => {
                self.parse_failed(AtCommand::Cind, e);
                return self.abort_step(AtCommand::AtCindTest);
            }
        };

        info!("AG announced {} indicators", index.len());
        self.indicator_index = Some(index.clone());
        self.emit(HfEvent::IndicatorsDiscovered(index));
        self.reply(HfCommand::Ok);

        if self.state == ConnectionState::AwaitingCindTest {
            self.advance(HfCommand::IndicatorRead, ConnectionState::AwaitingCindRead);
        }
    }

    fn handle_cind_read(&mut self, payload: &str) {
        let raw = match parse_indicator_values(payload) {
            Ok(raw) => raw,
            Err(e) => {
                self.parse_failed(AtCommand::Cind, e);
                return self.abort_step(AtCommand::AtCindRead);
            }
        };

        let Some(index) = self.indicator_index.as_ref() else {
            warn!("Indicator values received before the indicator table, ignoring");
            self.reply(HfCommand::Ok);
            return;
        };

        // Values outside an indicator's range are skipped, the rest still apply
        let values: Vec<IndicatorValue> = raw
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| index.indicator_at(i + 1).map(|ind| (ind, v)))
            .filter_map(|(ind, v)| match IndicatorValue::decode(ind, v) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Skipping indicator value: {}", e);
                    None
                }
            })
            .collect();

        for &value in &values {
            info!("Indicator: {}", value);
            self.apply_indicator(value);
        }
        self.emit(HfEvent::IndicatorsRead(values));
        self.reply(HfCommand::Ok);

        if self.state == ConnectionState::AwaitingCindRead {
            let args = self.config.event_reporting.clone();
            self.advance(
                HfCommand::EventReporting(args),
                ConnectionState::AwaitingCmerAck,
            );
        }
    }

    fn handle_ciev(&mut self, frame: &str) {
        let (position, raw) =
            match payload(AtCommand::Ciev, frame).and_then(parse_indicator_event) {
                Ok(event) => event,
                Err(e) => return self.parse_failed(AtCommand::Ciev, e),
            };

        let Some(index) = self.indicator_index.as_ref() else {
            warn!("+CIEV {} before the indicator table, ignoring", position);
            self.reply(HfCommand::Ok);
            return;
        };
        if position > index.len() {
            return self.parse_failed(AtCommand::Ciev, ParseError::IndexOutOfRange(position));
        }
        let Some(indicator) = index.indicator_at(position) else {
            debug!("Unrecognised indicator {} changed to {}", position, raw);
            self.reply(HfCommand::Ok);
            return;
        };

        let value = match IndicatorValue::decode(indicator, raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring +CIEV {}: {}", position, e);
                self.reply(HfCommand::Ok);
                return;
            }
        };

        info!("Indicator changed: {}", value);
        self.apply_indicator(value);
        self.emit(HfEvent::IndicatorChanged(value));
        self.reply(HfCommand::Ok);
    }

    /// Record an indicator value and apply its call-handling side effects
    fn apply_indicator(&mut self, value: IndicatorValue) {
        self.indicators.apply(value);

        match value {
            IndicatorValue::Call(state) => {
                if state == CallState::Active {
                    info!("Call answered");
                } else {
                    info!("Call ended");
                }
                self.ring_count = 0;
                self.incoming_caller_id = None;
            }
            IndicatorValue::CallSetup(CallSetupState::Idle) => self.ring_count = 0,
            _ => {}
        }
    }

    fn handle_ring(&mut self) {
        self.ring_count = self.ring_count.saturating_add(1);
        let count = self.ring_count;
        match self.incoming_caller_id.as_deref() {
            Some(number) => info!("RING {} from {}", count, number),
            None => info!("RING {}", count),
        }
        self.emit(HfEvent::Ring { count });

        let Some(threshold) = self.config.auto_answer_threshold() else {
            return;
        };
        if count >= threshold {
            info!("Answering call after {} rings", count);
            match self.answer() {
                Ok(()) => self.emit(HfEvent::AutoAnswered),
                Err(e) => warn!("Could not answer call: {}", e),
            }
        }
    }

    fn handle_clip(&mut self, frame: &str) {
        let payload = match payload(AtCommand::Clip, frame) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to parse {}: {}", AtCommand::Clip, e);
                self.emit(HfEvent::ParseFailed {
                    command: AtCommand::Clip,
                    error: e,
                });
                return;
            }
        };

        let mut fields = payload.split(',');
        let mut number = fields.next().unwrap_or_default().to_string();
        strip_whitespace(&mut number);
        let number = strip_quotes(&number).to_string();
        let number_type = fields
            .next()
            .and_then(parse_decimal)
            .and_then(|t| u8::try_from(t).ok());

        if number.is_empty() {
            debug!("Caller id withheld");
            return;
        }

        info!("Incoming call from {}", number);
        self.incoming_caller_id = Some(number.clone());
        self.emit(HfEvent::CallerId {
            number,
            number_type,
        });
    }
}

#[cfg(test)]
mod tests {
    use hfp_protocol::{Indicator, ServiceState};

    use super::*;
    use crate::config::HfConfig;

    fn output_lines(conn: &mut Connection) -> Vec<String> {
        std::iter::from_fn(|| conn.take_output())
            .map(|bytes| String::from_utf8(bytes).unwrap())
            .collect()
    }

    /// A connection with the three-indicator table already negotiated
    fn with_table() -> Connection {
        let mut conn = Connection::new();
        conn.process_frame("+CIND: (\"service\",(0-1)),(\"call\",(0-1)),(\"callsetup\",(0-3))");
        output_lines(&mut conn);
        conn.drain_events();
        conn
    }

    #[test]
    fn test_brsf_advances_to_indicator_test() {
        let mut conn = Connection::new();
        conn.init_connection().unwrap();
        output_lines(&mut conn);

        conn.process_frame("+BRSF: 871");
        assert_eq!(conn.ag_features(), Some(AgFeatures(871)));
        assert_eq!(conn.state(), ConnectionState::AwaitingCindTest);
        assert_eq!(output_lines(&mut conn), vec!["OK\r\n"]);

        // AT+CIND=? waits for the OK completing AT+BRSF
        conn.process_frame("OK");
        assert_eq!(output_lines(&mut conn), vec!["AT+CIND=?\r\n"]);
    }

    #[test]
    fn test_brsf_bad_number_rejected() {
        let mut conn = Connection::new();
        conn.init_connection().unwrap();
        output_lines(&mut conn);
        conn.drain_events();

        conn.process_frame("+BRSF:12x");
        assert_eq!(conn.ag_features(), None);
        assert_eq!(
            conn.state(),
            ConnectionState::Aborted {
                step: AtCommand::AtBrsf
            }
        );
        assert_eq!(output_lines(&mut conn), vec!["ERROR\r\n"]);
        assert!(!conn
            .drain_events()
            .iter()
            .any(|e| matches!(e, HfEvent::AgFeatures(_))));

        // The OK completing AT+BRSF leaves the connection aborted and idle
        conn.process_frame("OK");
        assert_eq!(
            conn.state(),
            ConnectionState::Aborted {
                step: AtCommand::AtBrsf
            }
        );
        assert_eq!(conn.last_sent(), None);
        assert_eq!(conn.next_deadline(), None);
        assert!(!conn.has_output());
    }

    #[test]
    fn test_brsf_ok_without_features_aborts() {
        let mut conn = Connection::new();
        conn.init_connection().unwrap();
        output_lines(&mut conn);
        conn.drain_events();

        conn.process_frame("OK");
        assert_eq!(
            conn.state(),
            ConnectionState::Aborted {
                step: AtCommand::AtBrsf
            }
        );
        assert!(conn.drain_events().contains(&HfEvent::CommandFailed {
            command: AtCommand::AtBrsf,
            reason: FailureReason::Error,
        }));
        assert!(!conn.has_output());
    }

    /// Run bring-up up to the point where `AT+CIND?` is outstanding
    fn awaiting_cind_read() -> Connection {
        let mut conn = Connection::new();
        conn.init_connection().unwrap();
        conn.process_frame("+BRSF: 871");
        conn.process_frame("OK");
        conn.process_frame("+CIND: (\"service\",(0-1)),(\"call\",(0-1)),(\"callsetup\",(0-3))");
        conn.process_frame("OK");
        assert_eq!(conn.state(), ConnectionState::AwaitingCindRead);
        assert_eq!(conn.last_sent(), Some(AtCommand::AtCindRead));
        output_lines(&mut conn);
        conn.drain_events();
        conn
    }

    #[test]
    fn test_cind_read_bad_number_aborts_bring_up() {
        let mut conn = awaiting_cind_read();

        conn.process_frame("+CIND: 1,1x");
        assert_eq!(output_lines(&mut conn), vec!["ERROR\r\n"]);
        assert_eq!(
            conn.state(),
            ConnectionState::Aborted {
                step: AtCommand::AtCindRead
            }
        );

        conn.process_frame("OK");
        assert_eq!(conn.last_sent(), None);
        assert_eq!(conn.next_deadline(), None);
        assert!(!conn.has_output());
    }

    #[test]
    fn test_cind_read_ok_without_values_aborts() {
        let mut conn = awaiting_cind_read();

        conn.process_frame("OK");
        assert_eq!(
            conn.state(),
            ConnectionState::Aborted {
                step: AtCommand::AtCindRead
            }
        );
        assert!(!conn.has_output());
    }

    #[test]
    fn test_cind_read_out_of_range_value_does_not_stall() {
        let mut conn = awaiting_cind_read();

        conn.process_frame("+CIND: 1,0,7");
        assert_eq!(output_lines(&mut conn), vec!["OK\r\n"]);
        assert_eq!(conn.state(), ConnectionState::AwaitingCmerAck);
        assert_eq!(conn.indicators().service, Some(ServiceState::Available));
        assert_eq!(conn.indicators().call_setup, None);
    }

    #[test]
    fn test_cind_test_builds_table() {
        let mut conn = Connection::new();
        conn.process_frame("+CIND: (\"service\",(0-1)),(\"call\",(0-1)),(\"callsetup\",(0-3))");

        let index = conn.indicator_index().unwrap();
        assert_eq!(index.position(Indicator::Service), Some(1));
        assert_eq!(index.position(Indicator::Call), Some(2));
        assert_eq!(index.position(Indicator::CallSetup), Some(3));
        assert_eq!(output_lines(&mut conn), vec!["OK\r\n"]);
    }

    #[test]
    fn test_cind_test_unbalanced_leaves_table_unset() {
        let mut conn = Connection::new();
        conn.process_frame("+CIND: (\"service\",(0-1)),(\"call\",(0-1)");

        assert!(conn.indicator_index().is_none());
        assert_eq!(output_lines(&mut conn), vec!["ERROR\r\n"]);
    }

    #[test]
    fn test_second_cind_test_ignored() {
        let mut conn = with_table();
        conn.process_frame("+CIND: (\"call\",(0-1)),(\"service\",(0-1))");

        let index = conn.indicator_index().unwrap();
        assert_eq!(index.position(Indicator::Service), Some(1));
        assert!(!conn.has_output());
    }

    #[test]
    fn test_cind_read_reports_values() {
        let mut conn = with_table();
        conn.process_frame("+CIND: 1,1,0");

        assert_eq!(conn.indicators().service, Some(ServiceState::Available));
        assert_eq!(conn.indicators().call, Some(CallState::Active));
        assert_eq!(conn.indicators().call_setup, Some(CallSetupState::Idle));
        assert_eq!(output_lines(&mut conn), vec!["OK\r\n"]);
    }

    #[test]
    fn test_cind_read_bad_value_applies_nothing() {
        let mut conn = with_table();
        conn.process_frame("+CIND: 1,x,0");
        assert_eq!(output_lines(&mut conn), vec!["ERROR\r\n"]);
        assert_eq!(conn.indicators().service, None);
    }

    #[test]
    fn test_cind_read_skips_out_of_range_value() {
        let mut conn = with_table();
        conn.process_frame("+CIND: 1,1,7");

        assert_eq!(output_lines(&mut conn), vec!["OK\r\n"]);
        assert_eq!(conn.indicators().service, Some(ServiceState::Available));
        assert_eq!(conn.indicators().call, Some(CallState::Active));
        assert_eq!(conn.indicators().call_setup, None);
        assert_eq!(
            conn.drain_events(),
            vec![HfEvent::IndicatorsRead(vec![
                IndicatorValue::Service(ServiceState::Available),
                IndicatorValue::Call(CallState::Active),
            ])]
        );
    }

    #[test]
    fn test_ciev_updates_snapshot() {
        let mut conn = with_table();
        conn.process_frame("+CIEV: 3,1");

        assert_eq!(conn.indicators().call_setup, Some(CallSetupState::Incoming));
        assert_eq!(output_lines(&mut conn), vec!["OK\r\n"]);
        assert_eq!(
            conn.drain_events(),
            vec![HfEvent::IndicatorChanged(IndicatorValue::CallSetup(
                CallSetupState::Incoming
            ))]
        );
    }

    #[test]
    fn test_ciev_malformed_rejected() {
        let mut conn = with_table();
        for frame in ["+CIEV: 2", "+CIEV: 2,1,0", "+CIEV: a,1", "+CIEV: 0,1", "+CIEV: 9,1"] {
            conn.process_frame(frame);
            assert_eq!(output_lines(&mut conn), vec!["ERROR\r\n"], "{}", frame);
        }
        assert_eq!(conn.indicators().call, None);
    }

    #[test]
    fn test_ciev_out_of_range_value_ignored() {
        let mut conn = with_table();
        conn.process_frame("+CIEV: 3,9");

        assert_eq!(output_lines(&mut conn), vec!["OK\r\n"]);
        assert_eq!(conn.indicators().call_setup, None);
        assert!(conn.drain_events().is_empty());
    }

    #[test]
    fn test_ciev_unrecognised_position_acknowledged() {
        let mut conn = Connection::new();
        conn.process_frame("+CIND: (\"service\",(0-1)),(\"message\",(0-1))");
        output_lines(&mut conn);

        conn.process_frame("+CIEV: 2,1");
        assert_eq!(output_lines(&mut conn), vec!["OK\r\n"]);
        assert!(conn.drain_events().iter().all(|e| !matches!(e, HfEvent::IndicatorChanged(_))));
    }

    #[test]
    fn test_call_end_resets_ring_and_caller() {
        let mut conn = with_table();
        conn.process_frame("+CLIP: \"555\",129");
        conn.process_frame("RING");
        assert_eq!(conn.ring_count(), 1);

        conn.process_frame("+CIEV: 2,0");
        assert_eq!(conn.ring_count(), 0);
        assert_eq!(conn.incoming_caller_id(), None);
    }

    #[test]
    fn test_callsetup_idle_resets_ring_count() {
        let mut conn = with_table();
        conn.process_frame("RING");
        conn.process_frame("RING");
        conn.process_frame("+CIEV: 3,0");
        assert_eq!(conn.ring_count(), 0);
    }

    #[test]
    fn test_three_rings_answer() {
        let mut conn = Connection::new();
        conn.process_frame("RING");
        conn.process_frame("RING");
        assert!(!conn.has_output());

        conn.process_frame("RING");
        assert_eq!(output_lines(&mut conn), vec!["ATA\r\n"]);
        assert_eq!(conn.ring_count(), 0);
        assert!(conn.drain_events().contains(&HfEvent::AutoAnswered));
    }

    #[test]
    fn test_auto_answer_disabled() {
        let config = HfConfig {
            auto_answer_rings: None,
            ..Default::default()
        };
        let mut conn = Connection::with_config(config);
        for _ in 0..5 {
            conn.process_frame("RING");
        }
        assert!(!conn.has_output());
        assert_eq!(conn.ring_count(), 5);
    }

    #[test]
    fn test_ring_count_saturates() {
        let config = HfConfig {
            auto_answer_rings: None,
            ..Default::default()
        };
        let mut conn = Connection::with_config(config);
        conn.ring_count = u32::MAX;

        conn.process_frame("RING");
        assert_eq!(conn.ring_count(), u32::MAX);
        assert_eq!(
            conn.drain_events(),
            vec![HfEvent::Ring { count: u32::MAX }]
        );
    }

    #[test]
    fn test_answer_error_reported() {
        let mut conn = Connection::new();
        for _ in 0..3 {
            conn.process_frame("RING");
        }
        conn.drain_events();

        conn.process_frame("ERROR");
        assert_eq!(
            conn.drain_events(),
            vec![HfEvent::AnswerFailed {
                reason: FailureReason::Error
            }]
        );
        // No retry
        assert_eq!(output_lines(&mut conn), vec!["ATA\r\n"]);
        assert!(!conn.has_output());
    }

    #[test]
    fn test_clip_stores_caller_id() {
        let mut conn = Connection::new();
        conn.process_frame("+CLIP: \"12345\",129");

        assert_eq!(conn.incoming_caller_id(), Some("12345"));
        assert_eq!(
            conn.drain_events(),
            vec![HfEvent::CallerId {
                number: "12345".to_string(),
                number_type: Some(129),
            }]
        );
        assert!(!conn.has_output());
    }

    #[test]
    fn test_clip_without_type() {
        let mut conn = Connection::new();
        conn.process_frame("+CLIP: \" 0612 345 \"");
        assert_eq!(conn.incoming_caller_id(), Some("0612345"));

        conn.process_frame("+CLIP: \"999\",129,,,\"Alice\"");
        assert_eq!(conn.incoming_caller_id(), Some("999"));
    }

    #[test]
    fn test_cme_error_without_code() {
        let mut conn = Connection::new();
        conn.hang_up().unwrap();
        conn.process_frame("+CME ERROR: busy");
        assert_eq!(conn.last_sent(), None);
        assert!(conn.drain_events().contains(&HfEvent::CommandFailed {
            command: AtCommand::AtChup,
            reason: FailureReason::Error,
        }));
    }

    #[test]
    fn test_unknown_and_echoed_frames_ignored() {
        let mut conn = Connection::new();
        conn.process_frame("+XAPL=iPhone,2");
        conn.process_frame("AT+BRSF=4");
        conn.process_frame("+BCS: 2");
        assert!(!conn.has_output());
        assert!(conn.drain_events().is_empty());
        assert_eq!(conn.state(), ConnectionState::Idle);
    }
}
