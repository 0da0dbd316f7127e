//! Hands-Free Profile Engine
//!
//! This crate provides the Hands-Free (HF) side of an HFP service level
//! connection: bring-up sequencing, indicator tracking, caller-id and ring
//! handling, and the auto-answer policy.
//!
//! # Architecture
//!
//! The [`Connection`] is a synchronous state machine with no I/O of its own.
//! Bytes received from the Audio Gateway are fed in with
//! [`Connection::handle_recv_data`]; commands to transmit are taken out with
//! [`Connection::take_output`]; observers drain [`HfEvent`]s.
//!
//! Bring-up proceeds through these states:
//!
//! - **AwaitingBrsf**: `AT+BRSF` sent, feature exchange
//! - **AwaitingCindTest** / **AwaitingCindRead**: indicator discovery
//! - **AwaitingCmerAck**: indicator event reporting
//! - **AwaitingClipAck**: caller-id notification
//! - **Ready**: `RING`, `+CLIP` and `+CIEV` are handled indefinitely
//!
//! [`HfSession`] wraps a connection and an async transport in a tokio task.
//!
//! # Example
//!
//! ```rust
//! use hfp_hf::{Connection, ConnectionState};
//!
//! let mut conn = Connection::new();
//! conn.init_connection().unwrap();
//! assert_eq!(conn.take_output(), Some(b"AT+BRSF=4\r\n".to_vec()));
//!
//! conn.handle_recv_data(b"\r\n+BRSF: 871\r\n\r\nOK\r\n");
//! assert_eq!(conn.state(), ConnectionState::AwaitingCindTest);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
mod handlers;
pub mod session;
pub mod state;

pub use config::HfConfig;
pub use connection::Connection;
pub use error::HfError;
pub use events::{FailureReason, HfEvent};
pub use session::{HfSession, SessionCommand, SessionHandle};
pub use state::{ConnectionState, IndicatorSnapshot, PendingRequest};
