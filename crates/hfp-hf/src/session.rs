//! Async I/O adapter for a Hands-Free connection
//!
//! [`HfSession`] owns a [`Connection`] and the byte transport it talks over
//! (an RFCOMM TTY, or a `DuplexStream` for a virtual AG). It runs in its own
//! task, writes whatever the connection queues, forwards connection events
//! over a channel and wakes up for request deadlines.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::HfConfig;
use crate::connection::Connection;
use crate::error::HfError;
use crate::events::HfEvent;

/// Commands that can be sent to a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Answer the incoming call
    Answer,
    /// Hang up or reject the current call
    HangUp,
    /// Re-read AG indicator values
    QueryIndicators,
    /// Stop the session
    Shutdown,
}

/// Sender side for controlling a spawned session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: tokio_mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Send a command to the session task
    pub async fn send(&self, cmd: SessionCommand) -> Result<(), HfError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| HfError::SessionClosed)
    }

    pub async fn answer(&self) -> Result<(), HfError> {
        self.send(SessionCommand::Answer).await
    }

    pub async fn hang_up(&self) -> Result<(), HfError> {
        self.send(SessionCommand::HangUp).await
    }

    pub async fn query_indicators(&self) -> Result<(), HfError> {
        self.send(SessionCommand::QueryIndicators).await
    }

    pub async fn shutdown(&self) -> Result<(), HfError> {
        self.send(SessionCommand::Shutdown).await
    }
}

/// Hands-Free session over an async byte transport
///
/// Generic over the I/O type; tests and the simulator use `DuplexStream`
/// from `tokio::io::duplex()`.
pub struct HfSession<T> {
    name: String,
    io: T,
    connection: Connection,
    event_tx: tokio_mpsc::Sender<HfEvent>,
    buffer: Vec<u8>,
}

impl<T> HfSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        name: impl Into<String>,
        io: T,
        config: HfConfig,
        event_tx: tokio_mpsc::Sender<HfEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            io,
            connection: Connection::with_config(config),
            event_tx,
            buffer: vec![0u8; 1024],
        }
    }

    /// The connection driven by this session
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Spawn the session on the current runtime
    ///
    /// The task resolves to the final connection state once the transport
    /// closes or a shutdown is requested.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<Result<Connection, HfError>>)
    where
        T: 'static,
    {
        let (cmd_tx, cmd_rx) = tokio_mpsc::channel(16);
        let task = tokio::spawn(self.run(cmd_rx));
        (SessionHandle { cmd_tx }, task)
    }

    /// Run the session until the transport closes or shutdown is requested
    pub async fn run(
        mut self,
        mut cmd_rx: tokio_mpsc::Receiver<SessionCommand>,
    ) -> Result<Connection, HfError> {
        info!("Starting HF session on {}", self.name);

        self.connection.init_connection()?;
        if let Err(e) = self.flush().await {
            warn!("Write error on {}: {}", self.name, e);
            send_event(&self.event_tx, HfEvent::Disconnected).await;
            return Err(e);
        }

        loop {
            let deadline = self.connection.next_deadline();

            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => {
                            info!("Shutdown requested for {}", self.name);
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }

                result = self.io.read(&mut self.buffer) => {
                    match result {
                        Ok(0) => {
                            info!("Transport closed on {}", self.name);
                            break;
                        }
                        Ok(n) => self.connection.handle_recv_data(&self.buffer[..n]),
                        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                        Err(e) => {
                            warn!("Read error on {}: {}", self.name, e);
                            break;
                        }
                    }
                }

                _ = sleep_until(deadline) => {
                    let now = tokio::time::Instant::now().into_std();
                    if self.connection.poll_timeout(now) {
                        debug!("Request deadline passed on {}", self.name);
                    }
                }
            }

            if let Err(e) = self.flush().await {
                warn!("Write error on {}: {}", self.name, e);
                break;
            }
        }

        info!("HF session ended on {}", self.name);
        send_event(&self.event_tx, HfEvent::Disconnected).await;
        Ok(self.connection)
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        let result = match cmd {
            SessionCommand::Answer => self.connection.answer(),
            SessionCommand::HangUp => self.connection.hang_up(),
            SessionCommand::QueryIndicators => self.connection.query_indicators(),
            SessionCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            warn!("{:?} rejected: {}", cmd, e);
        }
    }

    /// Write queued output and forward buffered events
    async fn flush(&mut self) -> Result<(), HfError> {
        while let Some(data) = self.connection.take_output() {
            self.io.write_all(&data).await?;
        }
        self.io.flush().await?;

        for event in self.connection.drain_events() {
            send_event(&self.event_tx, event).await;
        }
        Ok(())
    }
}

async fn send_event(event_tx: &tokio_mpsc::Sender<HfEvent>, event: HfEvent) {
    let _ = event_tx.send(event).await;
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
        }
        None => std::future::pending().await,
    }
}
