//! HFP Hands-Free Daemon
//!
//! Runs the Hands-Free side of an HFP service level connection over an
//! RFCOMM TTY, logging call and indicator activity.
//!
//! Usage:
//!   hfp-daemon --device /dev/rfcomm0
//!   hfp-daemon --simulate
//!   hfp-daemon --no-auto-answer --save-settings

mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hfp_hf::{ConnectionState, HfConfig, HfEvent, HfSession};
use hfp_sim::{spawn_virtual_ag, VirtualAgCommand, VirtualAudioGateway};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

/// Hands-Free unit for a phone connected over Bluetooth RFCOMM
#[derive(Parser)]
#[command(name = "hfp-daemon", version, about)]
struct Cli {
    /// RFCOMM TTY (e.g. /dev/rfcomm0). Overrides the settings file.
    #[arg(long)]
    device: Option<String>,

    /// Baud rate for the TTY. Overrides the settings file.
    #[arg(long)]
    baud: Option<u32>,

    /// Settings file (default: $XDG_CONFIG_HOME/hfp-hf/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Never answer calls automatically.
    #[arg(long)]
    no_auto_answer: bool,

    /// Talk to a simulated phone instead of a TTY; it rings once ready.
    #[arg(long)]
    simulate: bool,

    /// Write the effective settings to the settings file and exit.
    #[arg(long)]
    save_settings: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(device) = &self.device {
            settings.device = device.clone();
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if self.no_auto_answer {
            settings.hf.auto_answer_rings = None;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hfp_daemon=info,hfp_protocol=info,hfp_hf=info,hfp_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let path = match &cli.settings {
        Some(path) => path.clone(),
        None => Settings::default_path().context("could not determine settings path")?,
    };
    let mut settings = Settings::load_from(&path)?;
    cli.apply(&mut settings);

    if cli.save_settings {
        settings.save_to(&path)?;
        info!("Settings written to {}", path.display());
        return Ok(());
    }

    if cli.simulate {
        info!("Starting against a simulated phone");
        let (stream, ag_tx, _ag_task) = spawn_virtual_ag(VirtualAudioGateway::new("Simulated phone"));
        return run_session("simulated phone", stream, settings.hf, Some(ag_tx)).await;
    }

    info!("Opening {} at {} baud", settings.device, settings.baud_rate);
    let stream = tokio_serial::new(&settings.device, settings.baud_rate)
        .timeout(Duration::from_millis(100))
        .open_native_async()
        .with_context(|| format!("failed to open {}", settings.device))?;
    run_session(&settings.device, stream, settings.hf, None).await
}

/// Run a session until the transport closes or Ctrl-C
async fn run_session<T>(
    name: &str,
    io: T,
    config: HfConfig,
    simulator: Option<mpsc::Sender<VirtualAgCommand>>,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let (handle, task) = HfSession::new(name, io, config, event_tx).spawn();

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(HfEvent::Disconnected) | None => break,
                    Some(event) => {
                        log_event(&event);
                        if let (Some(ag_tx), HfEvent::StateChanged { to: ConnectionState::Ready, .. }) =
                            (&simulator, &event)
                        {
                            tokio::spawn(ring_simulated_call(ag_tx.clone()));
                        }
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                if handle.shutdown().await.is_err() {
                    break;
                }
            }
        }
    }

    let conn = task.await.context("session task failed")??;
    info!("Session on {} ended in state: {}", name, conn.state());
    Ok(())
}

/// Ring the simulated phone with a caller until the HF answers
async fn ring_simulated_call(ag_tx: mpsc::Sender<VirtualAgCommand>) {
    let _ = ag_tx
        .send(VirtualAgCommand::SetCaller {
            number: "+15551234567".to_string(),
            number_type: 145,
        })
        .await;
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if ag_tx.send(VirtualAgCommand::Ring).await.is_err() {
            return;
        }
    }
}

fn log_event(event: &HfEvent) {
    match event {
        HfEvent::StateChanged { to, .. } => info!("Connection {}", to),
        HfEvent::AgFeatures(features) => info!("Phone features: {:#x}", features.0),
        HfEvent::IndicatorsDiscovered(index) => info!("Phone has {} indicators", index.len()),
        HfEvent::IndicatorsRead(values) => {
            for value in values {
                info!("Indicator: {}", value);
            }
        }
        HfEvent::IndicatorChanged(value) => info!("Indicator changed: {}", value),
        HfEvent::Ring { count } => info!("Ringing ({})", count),
        HfEvent::CallerId { number, .. } => info!("Call from {}", number),
        HfEvent::AutoAnswered => info!("Call answered automatically"),
        HfEvent::CommandFailed { command, reason } => warn!("{} failed: {}", command, reason),
        HfEvent::AnswerFailed { reason } => warn!("Attending call failed: {}", reason),
        HfEvent::MalformedFrame(e) => warn!("Malformed frame: {}", e),
        HfEvent::ParseFailed { command, error } => warn!("Bad {}: {}", command, error),
        HfEvent::Disconnected => info!("Disconnected"),
    }
}
