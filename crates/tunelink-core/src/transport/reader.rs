//! Stream reader loop
//!
//! Pulls bytes off an open transport on a dedicated thread and hands each
//! chunk to a consumer. End of stream and any read error end the loop and
//! fire the disconnect callback exactly once.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};

use super::{ByteReader, READ_BUFFER_SIZE};
use crate::config::ReaderConfig;

/// Spawns reader loops
#[derive(Debug, Clone)]
pub struct StreamReader {
    buffer_size: usize,
}

impl Default for StreamReader {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReader {
    /// Reader with a buffer of [`READ_BUFFER_SIZE`] bytes
    pub fn new() -> Self {
        Self {
            buffer_size: READ_BUFFER_SIZE,
        }
    }

    /// Reader configured from `config`
    pub fn from_config(config: &ReaderConfig) -> Self {
        Self::new().with_buffer_size(config.buffer_size)
    }

    /// Override the read buffer size. It must hold the largest single read
    /// the consumer's framing expects.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Start reading `transport` on a new thread and return immediately.
    ///
    /// `on_data` receives a copy of exactly the bytes each read produced. It
    /// runs on the reader thread, and the next read waits for it to return.
    /// `on_disconnect` runs once when the stream ends or fails; nothing is
    /// read after that. Closing the transport from another handle is how a
    /// caller stops the loop early.
    pub fn run<R, D, X>(
        &self,
        transport: R,
        on_data: D,
        on_disconnect: X,
    ) -> io::Result<ReaderHandle>
    where
        R: ByteReader + 'static,
        D: FnMut(Vec<u8>) + Send + 'static,
        X: FnOnce() + Send + 'static,
    {
        let buffer_size = self.buffer_size;
        let handle = thread::Builder::new()
            .name("Stream reader".to_string())
            .spawn(move || read_loop(transport, buffer_size, on_data, on_disconnect))?;
        Ok(ReaderHandle { handle })
    }
}

fn read_loop<R, D, X>(mut transport: R, buffer_size: usize, mut on_data: D, on_disconnect: X)
where
    R: ByteReader,
    D: FnMut(Vec<u8>),
    X: FnOnce(),
{
    info!("Running stream reader loop");

    let mut buffer = vec![0u8; buffer_size];
    loop {
        match transport.read(&mut buffer) {
            Ok(0) => {
                warn!("End of connection: end of input");
                break;
            }
            Ok(n) => {
                // Bytes past n are stale from an earlier read
                let chunk = buffer[..n.min(buffer.len())].to_vec();
                if panic::catch_unwind(AssertUnwindSafe(|| on_data(chunk))).is_err() {
                    error!("Data listener panicked, dropping connection");
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("End of connection: {}", e);
                break;
            }
        }
    }

    on_disconnect();
}

/// Owner of a running reader thread
#[derive(Debug)]
pub struct ReaderHandle {
    handle: JoinHandle<()>,
}

impl ReaderHandle {
    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to exit
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}
