use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Blocking source of bytes for the reader loop
pub trait ByteReader: Send {
    /// Read into `buf`, blocking until at least one byte is available.
    ///
    /// Returns the number of bytes placed at the start of `buf`; `Ok(0)`
    /// means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: ByteReader + ?Sized> ByteReader for Box<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// An open connection to an ECU (serial or TCP)
pub trait Transport: ByteReader + Write {
    /// Second handle to the same connection, typically kept for writing and
    /// closing while the original is handed to a reader loop
    fn try_clone(&self) -> io::Result<Box<dyn Transport>>;

    /// Close the connection. A read blocked on any handle fails afterwards.
    fn close(&self) -> io::Result<()>;
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "channel closed")
}

/// Serial port wrapper implementing [`Transport`].
///
/// The port is opened with a read timeout; reads retry on timeout so the
/// channel behaves as a blocking stream until it is closed.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    closed: Arc<AtomicBool>,
}

impl SerialChannel {
    /// Wrap an opened port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Name of the underlying port, if the platform reports one
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ByteReader for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.is_closed() {
                return Err(closed_error());
            }
            match Read::read(&mut self.port, buf) {
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                other => return other,
            }
        }
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(closed_error());
        }
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialChannel {
    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        let port = self.port.try_clone().map_err(io::Error::other)?;
        Ok(Box::new(SerialChannel {
            port,
            closed: Arc::clone(&self.closed),
        }))
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// TCP stream wrapper implementing [`Transport`]
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    /// Wrap a connected stream
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl ByteReader for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.stream, buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for TcpChannel {
    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(TcpChannel::new(self.stream.try_clone()?)))
    }

    fn close(&self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // Peer already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
