//! HFP Simulation Library
//!
//! This crate provides a simulated Audio Gateway for exercising the
//! Hands-Free engine without a phone or a Bluetooth stack:
//!
//! - **VirtualAudioGateway**: answers the bring-up commands and generates
//!   `RING`, `+CLIP` and `+CIEV` notifications
//! - **run_virtual_ag_task**: serves a gateway over an async stream
//!
//! # Example
//!
//! ```rust
//! use hfp_sim::VirtualAudioGateway;
//!
//! let mut ag = VirtualAudioGateway::new("Phone");
//! ag.push_bytes(b"AT+BRSF=4\r\n");
//!
//! while let Some(bytes) = ag.take_output() {
//!     println!("AG output: {:?}", String::from_utf8_lossy(&bytes));
//! }
//! ```

pub mod gateway;
pub mod gateway_task;

pub use gateway::{SimIndicator, VirtualAgConfig, VirtualAudioGateway};
pub use gateway_task::{run_virtual_ag_task, spawn_virtual_ag, VirtualAgCommand};
