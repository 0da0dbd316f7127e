//! Virtual AG actor task
//!
//! Owns a [`VirtualAudioGateway`] and serves it over an async stream. The
//! task uses a select! loop to:
//! - Read HF commands from the stream and write the AG's responses
//! - Apply scripted state changes (ring, caller, indicators) from a channel

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::VirtualAudioGateway;

/// Commands that can be sent to a virtual AG actor
#[derive(Debug, Clone)]
pub enum VirtualAgCommand {
    /// Alert an incoming call
    Ring,
    /// Set the caller presented with subsequent RINGs
    SetCaller { number: String, number_type: u8 },
    /// Change an indicator value
    SetIndicator { name: String, value: u32 },
    /// Send raw bytes to the HF
    SendRaw(Vec<u8>),
    /// Shutdown the virtual AG actor
    Shutdown,
}

/// Run the virtual AG actor task
///
/// Returns the gateway once the stream closes or shutdown is requested, so
/// callers can inspect what it received.
pub async fn run_virtual_ag_task<S>(
    mut stream: S,
    mut ag: VirtualAudioGateway,
    mut cmd_rx: mpsc::Receiver<VirtualAgCommand>,
) -> io::Result<VirtualAudioGateway>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 1024];
    info!("Starting virtual AG task for {}", ag.id());

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual AG stream closed for {}", ag.id());
                        break;
                    }
                    Ok(n) => ag.push_bytes(&buf[..n]),
                    Err(e) => {
                        warn!("Virtual AG {} stream error: {}", ag.id(), e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualAgCommand::Ring) => ag.ring(),
                    Some(VirtualAgCommand::SetCaller { number, number_type }) => {
                        ag.set_caller(number, number_type);
                    }
                    Some(VirtualAgCommand::SetIndicator { name, value }) => {
                        if !ag.set_indicator(&name, value) {
                            warn!("Virtual AG {} rejected {}={}", ag.id(), name, value);
                        }
                    }
                    Some(VirtualAgCommand::SendRaw(data)) => ag.queue_raw(&data),
                    Some(VirtualAgCommand::Shutdown) => {
                        info!("Shutdown requested for virtual AG {}", ag.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual AG {}", ag.id());
                        break;
                    }
                }
            }
        }

        while let Some(data) = ag.take_output() {
            stream.write_all(&data).await?;
        }
        stream.flush().await?;
    }

    info!("Virtual AG task ended for {}", ag.id());
    Ok(ag)
}

/// Spawn a virtual AG behind an in-memory duplex stream
///
/// Returns the HF end of the stream, the command sender, and the task.
pub fn spawn_virtual_ag(
    ag: VirtualAudioGateway,
) -> (
    DuplexStream,
    mpsc::Sender<VirtualAgCommand>,
    JoinHandle<io::Result<VirtualAudioGateway>>,
) {
    let (hf_stream, ag_stream) = tokio::io::duplex(4096);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let task = tokio::spawn(run_virtual_ag_task(ag_stream, ag, cmd_rx));
    (hf_stream, cmd_tx, task)
}
