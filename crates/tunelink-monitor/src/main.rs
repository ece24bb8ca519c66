//! TuneLink monitor
//!
//! Watches for ECU endpoints and keeps a byte stream open to the configured
//! one. Every snapshot change is logged. When the `auto_connect` endpoint
//! shows up the monitor opens it and logs incoming traffic; after a
//! disconnect it reconnects once a snapshot lists the endpoint again.
//!
//! Usage: `tunelink-monitor [config.json]`

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

use tunelink_core::config::LinkConfig;
use tunelink_core::hardware::{HardwareSnapshot, PortScanner};
use tunelink_core::transport::{
    open_endpoint, resolve_auto_serial, Endpoint, ReaderHandle, StreamReader, Transport,
};

/// How often a listed but unopenable endpoint is tried again
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

enum AppEvent {
    Hardware(HardwareSnapshot),
    Data { session: u64, bytes: Vec<u8> },
    Disconnected { session: u64 },
}

struct Session {
    id: u64,
    endpoint: Endpoint,
    control: Box<dyn Transport>,
    reader: ReaderHandle,
    bytes_received: usize,
}

struct Monitor {
    config: LinkConfig,
    target: Option<Endpoint>,
    events: UnboundedSender<AppEvent>,
    latest: HardwareSnapshot,
    session: Option<Session>,
    next_session: u64,
}

impl Monitor {
    fn on_hardware(&mut self, hw: HardwareSnapshot) {
        info!(
            "Hardware changed: ports={:?} dfu={} st-link={} can={}",
            hw.ports(),
            hw.is_dfu_found(),
            hw.is_st_link_connected(),
            hw.is_can_adapter_connected()
        );
        self.latest = hw;
    }

    /// Resolve the target against the latest snapshot
    fn available_target(&self) -> Option<Endpoint> {
        let target = self.target.as_ref()?;
        let listed = self.latest.ports().iter().any(|p| *p == target.to_string());
        if !listed {
            return None;
        }
        match target {
            Endpoint::AutoSerial => resolve_auto_serial(&self.latest).ok(),
            other => Some(other.clone()),
        }
    }

    async fn try_connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let Some(endpoint) = self.available_target() else {
            return Ok(());
        };

        let transport_config = self.config.transport.clone();
        let to_open = endpoint.clone();
        let channel =
            tokio::task::spawn_blocking(move || open_endpoint(&to_open, &transport_config))
                .await?
                .with_context(|| format!("Failed to open {}", endpoint))?;
        let control = channel.try_clone()?;

        self.next_session += 1;
        let id = self.next_session;
        let data_tx = self.events.clone();
        let disconnect_tx = self.events.clone();
        let reader = StreamReader::from_config(&self.config.reader).run(
            channel,
            move |bytes| {
                let _ = data_tx.send(AppEvent::Data { session: id, bytes });
            },
            move || {
                let _ = disconnect_tx.send(AppEvent::Disconnected { session: id });
            },
        )?;

        info!("Connected to {}", endpoint);
        self.session = Some(Session {
            id,
            endpoint,
            control,
            reader,
            bytes_received: 0,
        });
        Ok(())
    }

    fn on_data(&mut self, session: u64, bytes: Vec<u8>) {
        if let Some(current) = self.session.as_mut().filter(|s| s.id == session) {
            current.bytes_received += bytes.len();
            debug!(
                "{}: {} bytes (total {})",
                current.endpoint,
                bytes.len(),
                current.bytes_received
            );
        }
    }

    async fn on_disconnected(&mut self, session: u64) {
        if self.session.as_ref().is_some_and(|s| s.id == session) {
            if let Some(ended) = self.session.take() {
                warn!(
                    "Disconnected from {} after {} bytes",
                    ended.endpoint, ended.bytes_received
                );
                close_session(ended).await;
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Closing {}", session.endpoint);
            close_session(session).await;
        }
    }
}

async fn close_session(session: Session) {
    if let Err(e) = session.control.close() {
        debug!("Close failed: {}", e);
    }
    let reader = session.reader;
    if let Ok(Err(_)) = tokio::task::spawn_blocking(move || reader.join()).await {
        warn!("Reader thread for {} panicked", session.endpoint);
    }
}

// Log to stdout, filtering according to RUST_LOG with INFO as the default.
fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config() -> Result<LinkConfig> {
    match std::env::args().nth(1) {
        Some(path) => LinkConfig::load(Path::new(&path))
            .with_context(|| format!("Failed to load config from {}", path)),
        None => Ok(LinkConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config()?;
    let target = config
        .auto_connect
        .as_deref()
        .map(Endpoint::parse)
        .transpose()
        .context("Invalid auto_connect endpoint")?;
    match &target {
        Some(endpoint) if endpoint.is_can() => {
            warn!("{} is listed but cannot be streamed; only watching", endpoint)
        }
        Some(endpoint) => info!("Waiting for {}", endpoint),
        None => info!("No auto_connect endpoint configured; only watching"),
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scanner = PortScanner::system(config.scanner.clone());
    let hw_tx = tx.clone();
    scanner.register(move |hw: &HardwareSnapshot| {
        let _ = hw_tx.send(AppEvent::Hardware(hw.clone()));
    })?;

    let mut monitor = Monitor {
        config,
        target,
        events: tx,
        latest: HardwareSnapshot::empty(),
        session: None,
        next_session: 0,
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut retry = tokio::time::interval(RETRY_INTERVAL);

    loop {
        let outcome = tokio::select! {
            _ = &mut ctrl_c => break,
            _ = retry.tick() => monitor.try_connect().await,
            event = rx.recv() => match event {
                Some(AppEvent::Hardware(hw)) => {
                    monitor.on_hardware(hw);
                    monitor.try_connect().await
                }
                Some(AppEvent::Data { session, bytes }) => {
                    monitor.on_data(session, bytes);
                    Ok(())
                }
                Some(AppEvent::Disconnected { session }) => {
                    monitor.on_disconnected(session).await;
                    monitor.try_connect().await
                }
                None => break,
            },
        };
        if let Err(e) = outcome {
            warn!("{:#}", e);
        }
    }

    info!("Shutting down");
    monitor.shutdown().await;
    tokio::task::spawn_blocking(move || scanner.shutdown()).await?;
    Ok(())
}
