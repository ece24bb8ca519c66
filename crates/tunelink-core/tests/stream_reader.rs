//! Tests for the stream reader loop

use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use tunelink_core::transport::{
    ByteReader, StreamReader, TcpChannel, Transport, READ_BUFFER_SIZE,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Data(Vec<u8>),
    Disconnected,
}

enum Step {
    Data(Vec<u8>),
    Eof,
    Fail(io::ErrorKind),
}

/// Replays a fixed sequence of read results and counts reads
struct ScriptedReader {
    steps: VecDeque<Step>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedReader {
    fn new(steps: Vec<Step>) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                steps: steps.into(),
                reads: reads.clone(),
            },
            reads,
        )
    }
}

impl ByteReader for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(Step::Data(bytes)) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            Some(Step::Eof) => Ok(0),
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            None => Err(io::Error::new(io::ErrorKind::Other, "read after end of script")),
        }
    }
}

/// Run `reader` to completion and return every callback in order
fn run_to_end<R: ByteReader + 'static>(reader: StreamReader, transport: R) -> Vec<Event> {
    let (tx, rx) = mpsc::channel();
    let data_tx = tx.clone();
    let handle = reader
        .run(
            transport,
            move |bytes| {
                let _ = data_tx.send(Event::Data(bytes));
            },
            move || {
                let _ = tx.send(Event::Disconnected);
            },
        )
        .unwrap();
    handle.join().unwrap();
    rx.try_iter().collect()
}

fn recv(rx: &Receiver<Event>) -> Event {
    rx.recv_timeout(Duration::from_secs(2))
        .expect("reader produced no event")
}

#[test]
fn test_data_then_eof() {
    let (transport, reads) = ScriptedReader::new(vec![Step::Data(b"AB".to_vec()), Step::Eof]);

    let events = run_to_end(StreamReader::new(), transport);

    assert_eq!(events, vec![Event::Data(b"AB".to_vec()), Event::Disconnected]);
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_chunks_are_exact_then_error_disconnects() {
    let first = vec![0x11; 5];
    let second = vec![0x22; 1200];
    let (transport, reads) = ScriptedReader::new(vec![
        Step::Data(first.clone()),
        Step::Data(second.clone()),
        Step::Fail(io::ErrorKind::BrokenPipe),
    ]);

    let events = run_to_end(StreamReader::new(), transport);

    assert_eq!(
        events,
        vec![Event::Data(first), Event::Data(second), Event::Disconnected]
    );
    assert_eq!(reads.load(Ordering::SeqCst), 3);
}

#[test]
fn test_short_read_does_not_leak_stale_bytes() {
    let (transport, _) = ScriptedReader::new(vec![
        Step::Data(vec![0xff; 64]),
        Step::Data(b"xyz".to_vec()),
        Step::Eof,
    ]);

    let events = run_to_end(StreamReader::new().with_buffer_size(64), transport);

    assert_eq!(events[1], Event::Data(b"xyz".to_vec()));
}

#[test]
fn test_interrupted_read_is_retried() {
    let (transport, reads) = ScriptedReader::new(vec![
        Step::Fail(io::ErrorKind::Interrupted),
        Step::Data(b"1".to_vec()),
        Step::Eof,
    ]);

    let events = run_to_end(StreamReader::new(), transport);

    assert_eq!(events, vec![Event::Data(b"1".to_vec()), Event::Disconnected]);
    assert_eq!(reads.load(Ordering::SeqCst), 3);
}

#[test]
fn test_timeout_error_counts_as_disconnect() {
    let (transport, reads) = ScriptedReader::new(vec![
        Step::Fail(io::ErrorKind::TimedOut),
        Step::Data(b"never".to_vec()),
    ]);

    let events = run_to_end(StreamReader::new(), transport);

    assert_eq!(events, vec![Event::Disconnected]);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_consumer_still_disconnects_once() {
    let (transport, reads) = ScriptedReader::new(vec![
        Step::Data(b"boom".to_vec()),
        Step::Data(b"late".to_vec()),
    ]);
    let (tx, rx) = mpsc::channel();

    let handle = StreamReader::new()
        .run(
            transport,
            |_bytes| panic!("consumer bug"),
            move || {
                let _ = tx.send(Event::Disconnected);
            },
        )
        .unwrap();
    handle.join().unwrap();

    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Event::Disconnected]);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_default_buffer_is_twice_the_blocking_factor() {
    assert_eq!(READ_BUFFER_SIZE, 3000);
    let big = vec![0x5a; READ_BUFFER_SIZE];
    let (transport, _) = ScriptedReader::new(vec![Step::Data(big.clone()), Step::Eof]);

    let events = run_to_end(StreamReader::new(), transport);

    assert_eq!(events[0], Event::Data(big));
}

fn tcp_pair() -> (TcpChannel, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, _) = listener.accept().unwrap();
    (TcpChannel::new(client), server)
}

#[test]
fn test_tcp_peer_close_delivers_data_then_disconnects() {
    let (channel, mut server) = tcp_pair();
    let (tx, rx) = mpsc::channel();
    let data_tx = tx.clone();

    let handle = StreamReader::new()
        .run(
            channel,
            move |bytes| {
                let _ = data_tx.send(Event::Data(bytes));
            },
            move || {
                let _ = tx.send(Event::Disconnected);
            },
        )
        .unwrap();

    server.write_all(b"hello").unwrap();
    let mut received = Vec::new();
    while received.len() < 5 {
        match recv(&rx) {
            Event::Data(bytes) => received.extend(bytes),
            Event::Disconnected => panic!("disconnected before data arrived"),
        }
    }
    assert_eq!(received, b"hello");

    drop(server);
    assert_eq!(recv(&rx), Event::Disconnected);
    handle.join().unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_closing_transport_stops_blocked_reader() {
    let (channel, _server) = tcp_pair();
    let control = channel.try_clone().unwrap();
    let (tx, rx) = mpsc::channel();

    let handle = StreamReader::new()
        .run(
            channel,
            |_bytes| {},
            move || {
                let _ = tx.send(Event::Disconnected);
            },
        )
        .unwrap();

    // run() returned while the worker is parked in read()
    std::thread::sleep(Duration::from_millis(50));
    assert!(!handle.is_finished());

    control.close().unwrap();
    assert_eq!(recv(&rx), Event::Disconnected);
    handle.join().unwrap();
}
