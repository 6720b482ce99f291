//! Tests for the socket listener.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use glot_config::SocketEndpoint;
use glot_protocol::Reply;

use super::{ConnectionHandler, ConnectionStream, JsonlConnectionHandler, ListenerError, SocketListener};
use crate::tests::support::daemon_with_version;

/// Handler that counts connections and drops them.
#[derive(Default)]
struct CountingHandler {
    count: AtomicUsize,
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: ConnectionStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[fixture]
fn tcp_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", 0)
}

fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if count.load(Ordering::SeqCst) >= expected {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[rstest]
fn tcp_listener_accepts_connections(tcp_endpoint: SocketEndpoint) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener.local_addr().expect("tcp listener reports its address");
    let handler = Arc::new(CountingHandler::default());
    let handle = listener
        .start(Arc::clone(&handler) as Arc<dyn ConnectionHandler>)
        .expect("start listener");

    TcpStream::connect(addr).expect("connect first client");
    TcpStream::connect(addr).expect("connect second client");

    assert!(wait_for_count(&handler.count, 2), "expected two connections");
    handle.stop().expect("stop listener");
}

#[rstest]
fn tcp_round_trip_answers_version(tcp_endpoint: SocketEndpoint) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener.local_addr().expect("tcp listener reports its address");
    let handler = Arc::new(JsonlConnectionHandler::new(daemon_with_version("1.2.3")));
    let handle = listener.start(handler).expect("start listener");

    let mut stream = TcpStream::connect(addr).expect("connect client");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set read timeout");
    stream
        .write_all(b"{\"kind\":\"version\"}\n")
        .expect("write request");
    let mut line = String::new();
    BufReader::new(&stream)
        .read_line(&mut line)
        .expect("read reply");

    let reply: Reply = serde_json::from_str(&line).expect("decode reply");
    let Reply::Version(version) = reply else {
        panic!("expected version reply, got {reply:?}");
    };
    assert_eq!(version.version, "1.2.3");
    handle.stop().expect("stop listener");
}

#[cfg(unix)]
#[fixture]
fn unix_tempdir() -> tempfile::TempDir {
    tempfile::tempdir().expect("temp dir")
}

#[cfg(unix)]
#[rstest]
fn unix_listener_replaces_stale_socket(unix_tempdir: tempfile::TempDir) {
    let path = unix_tempdir.path().join("glotd.sock");
    drop(std::os::unix::net::UnixListener::bind(&path).expect("bind stale listener"));
    assert!(path.exists(), "stale socket should remain");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let listener = SocketListener::bind(&endpoint).expect("bind over stale socket");
    let handler = Arc::new(CountingHandler::default());
    let handle = listener
        .start(Arc::clone(&handler) as Arc<dyn ConnectionHandler>)
        .expect("start listener");

    std::os::unix::net::UnixStream::connect(&path).expect("connect unix client");
    assert!(wait_for_count(&handler.count, 1), "expected one connection");

    handle.stop().expect("stop listener");
    assert!(!path.exists(), "listener removes its socket on shutdown");
}

#[cfg(unix)]
#[rstest]
fn unix_listener_rejects_socket_in_use(unix_tempdir: tempfile::TempDir) {
    let path = unix_tempdir.path().join("glotd.sock");
    let _existing = std::os::unix::net::UnixListener::bind(&path).expect("bind live listener");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let error = SocketListener::bind(&endpoint).expect_err("bind should fail");
    assert!(matches!(error, ListenerError::UnixInUse { .. }));
}

#[cfg(unix)]
#[rstest]
fn unix_listener_refuses_regular_file(unix_tempdir: tempfile::TempDir) {
    let path = unix_tempdir.path().join("glotd.sock");
    std::fs::write(&path, b"not a socket").expect("write file");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let error = SocketListener::bind(&endpoint).expect_err("bind should fail");
    assert!(matches!(error, ListenerError::UnixNotSocket { .. }));
    assert!(path.exists(), "regular file is left alone");
}
