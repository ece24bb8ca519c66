//! Background endpoint scanner
//!
//! One worker thread polls a [`HardwareProbe`], builds a [`HardwareSnapshot`]
//! per cycle and notifies listeners when it differs from the previous one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{filter_ports, HardwareProbe, HardwareSnapshot, ProbeError, SystemProbe};
use super::{AUTO_SERIAL, PCAN, SOCKET_CAN};
use crate::config::ScannerConfig;

/// Callback receiving changed snapshots on the scanner thread
type Listener = Arc<dyn Fn(&HardwareSnapshot) + Send + Sync>;

/// Errors from the scanner's public API
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Failed to start scanner thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The wait between two cycles was cut short
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Scanner sleep interrupted")]
pub struct SleepInterrupted;

/// Waits between scanner cycles.
///
/// An interrupted wait ends the scanner thread without a final notification.
pub trait Sleeper: Send + Sync {
    /// Block for `duration`
    fn sleep(&self, duration: Duration) -> Result<(), SleepInterrupted>;
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), SleepInterrupted> {
        thread::sleep(duration);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run one probe, turning errors and panics into `default`
fn probe_or<T>(what: &str, default: T, call: impl FnOnce() -> Result<T, ProbeError>) -> T {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            debug!("{what} probe failed, treating as not detected: {e}");
            default
        }
        Err(_) => {
            warn!("{what} probe panicked, treating as not detected");
            default
        }
    }
}

/// Build the snapshot for one cycle.
///
/// Serial enumeration always runs. The simulator, DFU, ST-Link and CAN probes
/// only run when `include_slow` is set and read as empty/false otherwise.
pub fn poll_hardware(
    probe: &dyn HardwareProbe,
    config: &ScannerConfig,
    include_slow: bool,
) -> HardwareSnapshot {
    let serial = filter_ports(
        probe_or("serial port", Vec::new(), || probe.serial_ports()),
        &config.port_filters,
    );

    let mut ports = Vec::with_capacity(serial.len() + 4);
    if !serial.is_empty() {
        ports.push(AUTO_SERIAL.to_string());
    }
    ports.extend(serial);

    let (dfu_found, st_link_connected, can_adapter_connected) = if include_slow {
        ports.extend(probe_or("simulator", Vec::new(), || probe.simulator_ports()));
        (
            probe_or("DFU", false, || probe.dfu_bootloader()),
            probe_or("ST-Link", false, || probe.st_link()),
            probe_or("CAN adapter", false, || probe.can_adapter()),
        )
    } else {
        (false, false, false)
    };

    if can_adapter_connected {
        ports.push(PCAN.to_string());
    }
    if config.show_socket_can {
        ports.push(SOCKET_CAN.to_string());
    }

    HardwareSnapshot::new(ports, dfu_found, st_link_connected, can_adapter_connected)
}

struct Shared {
    config: ScannerConfig,
    probe: Arc<dyn HardwareProbe>,
    sleeper: Arc<dyn Sleeper>,
    known: Mutex<HardwareSnapshot>,
    // Copy-on-write: writers swap in a new Vec, notifiers iterate a clone of the Arc
    listeners: Mutex<Arc<Vec<Listener>>>,
    shutdown: CancellationToken,
}

impl Shared {
    fn run(&self) {
        info!("Ports scanner started");
        let mut first_cycle = true;
        while !self.shutdown.is_cancelled() {
            // The first cycle only enumerates serial ports
            self.scan(!first_cycle);
            first_cycle = false;

            if let Err(e) = self.sleeper.sleep(self.config.poll_interval()) {
                warn!("Ports scanner exiting: {e}");
                return;
            }
        }
        info!("Ports scanner stopped");
    }

    fn scan(&self, include_slow: bool) {
        let current = poll_hardware(self.probe.as_ref(), &self.config, include_slow);

        let changed = {
            let mut known = lock(&self.known);
            let changed = *known != current;
            *known = current.clone();
            changed
        };

        if changed {
            debug!("Hardware changed: {:?}", current);
            let listeners = Arc::clone(&lock(&self.listeners));
            for listener in listeners.iter() {
                if panic::catch_unwind(AssertUnwindSafe(|| listener(&current))).is_err() {
                    error!("Hardware listener panicked");
                }
            }
        }
    }
}

/// Polls for available endpoints on a dedicated thread.
///
/// The thread starts when the first listener registers and runs until
/// [`stop`](Self::stop) is called or the scanner is dropped. Listeners are
/// called on that thread, in registration order, and only when a cycle's
/// snapshot differs from the previous cycle's. Marshaling to a UI thread is
/// up to the listener.
pub struct PortScanner {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PortScanner {
    /// Create a scanner with the given probe and sleeper
    pub fn new(
        config: ScannerConfig,
        probe: Arc<dyn HardwareProbe>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                probe,
                sleeper,
                known: Mutex::new(HardwareSnapshot::empty()),
                listeners: Mutex::new(Arc::new(Vec::new())),
                shutdown: CancellationToken::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Create a scanner that probes the real machine
    pub fn system(config: ScannerConfig) -> Self {
        let probe = Arc::new(SystemProbe::new(&config));
        Self::new(config, probe, Arc::new(ThreadSleeper))
    }

    /// Add a listener. The first registration starts the scanner thread.
    ///
    /// A listener registered while a cycle is notifying may miss that cycle
    /// and hears about the next change instead.
    pub fn register<F>(&self, listener: F) -> Result<(), ScannerError>
    where
        F: Fn(&HardwareSnapshot) + Send + Sync + 'static,
    {
        let should_start = {
            let mut listeners = lock(&self.shared.listeners);
            let should_start = listeners.is_empty();
            let mut next = Vec::clone(&listeners);
            next.push(Arc::new(listener));
            *listeners = Arc::new(next);
            should_start
        };

        if should_start {
            self.start()?;
        }
        Ok(())
    }

    fn start(&self) -> Result<(), ScannerError> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("Ports Scanner".to_string())
            .spawn(move || shared.run())?;
        *worker = Some(handle);
        Ok(())
    }

    /// Ask the scanner thread to exit. A cycle in progress finishes first.
    pub fn stop(&self) {
        self.shared.shutdown.cancel();
    }

    /// Wait for the scanner thread to exit.
    ///
    /// Returns immediately if the thread was never started. Must not be
    /// called from a listener.
    pub fn join(&self) {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Ports scanner thread panicked");
            }
        }
    }

    /// [`stop`](Self::stop) and then [`join`](Self::join)
    pub fn shutdown(&self) {
        self.stop();
        self.join();
    }

    /// Whether the scanner thread is alive
    pub fn is_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).len()
    }

    /// The most recent snapshot
    pub fn current(&self) -> HardwareSnapshot {
        lock(&self.shared.known).clone()
    }
}

impl Drop for PortScanner {
    fn drop(&mut self) {
        self.stop();
    }
}
