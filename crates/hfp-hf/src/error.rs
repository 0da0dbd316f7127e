//! Error types for the Hands-Free engine

use thiserror::Error;

use crate::state::ConnectionState;

/// Errors that can occur while driving a Hands-Free connection
#[derive(Debug, Error)]
pub enum HfError {
    /// Bring-up was requested on a connection that already started
    #[error("connection already started (state: {0})")]
    AlreadyStarted(ConnectionState),

    /// Operation needs the AG indicator table, which is not negotiated yet
    #[error("AG indicator table not negotiated")]
    IndicatorsUnavailable,

    /// Too many requests waiting behind the outstanding one
    #[error("request queue full: {0} requests waiting")]
    QueueFull(usize),

    /// Payload parse error
    #[error("parse error: {0}")]
    Parse(#[from] hfp_protocol::ParseError),

    /// I/O error on the transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session task is no longer running
    #[error("session closed")]
    SessionClosed,
}
