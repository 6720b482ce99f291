//! Connection handling for the daemon listener.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use tracing::{debug, warn};

use glot_protocol::{Reply, Request, Response};

use super::LISTENER_TARGET;
use crate::daemon::Daemon;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Longest request line accepted, excluding the newline.
const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// Stream types accepted by the daemon listener.
#[derive(Debug)]
pub enum ConnectionStream {
    /// TCP connection.
    Tcp(TcpStream),
    /// Unix domain socket connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Serves newline-delimited JSON requests against a [`Daemon`].
///
/// Each line is decoded as a [`Request`] and answered with one [`Reply`]
/// line. Undecodable lines get a [`Reply::Invalid`] and the connection stays
/// open; an oversized line gets the same reply and closes it.
#[derive(Debug, Clone)]
pub struct JsonlConnectionHandler {
    daemon: Arc<Daemon>,
}

impl JsonlConnectionHandler {
    /// Creates a handler serving `daemon`.
    #[must_use]
    pub const fn new(daemon: Arc<Daemon>) -> Self {
        Self { daemon }
    }

    fn serve<S: Read + Write>(&self, stream: S) -> io::Result<()> {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            let limit = u64::try_from(MAX_REQUEST_BYTES + 1).unwrap_or(u64::MAX);
            let read = (&mut reader).take(limit).read_until(b'\n', &mut line)?;
            if read == 0 {
                return Ok(());
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            } else if line.len() > MAX_REQUEST_BYTES {
                let reply = Reply::Invalid(Response::fatal_message(format!(
                    "request exceeds {MAX_REQUEST_BYTES} bytes"
                )));
                write_reply(reader.get_mut(), &reply)?;
                return Ok(());
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let reply = match serde_json::from_slice::<Request>(&line) {
                Ok(request) => self.daemon.handle(&request),
                Err(error) => {
                    debug!(target: LISTENER_TARGET, error = %error, "malformed request line");
                    Reply::Invalid(Response::fatal_message(format!("invalid request: {error}")))
                }
            };
            write_reply(reader.get_mut(), &reply)?;
        }
    }
}

impl ConnectionHandler for JsonlConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        if let Err(error) = self.serve(stream) {
            warn!(
                target: LISTENER_TARGET,
                error = %error,
                "connection handler error"
            );
        }
    }
}

fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> io::Result<()> {
    let mut encoded = serde_json::to_vec(reply).map_err(io::Error::other)?;
    encoded.push(b'\n');
    writer.write_all(&encoded)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use glot_protocol::Status;

    use super::*;
    use crate::tests::support::daemon_with_version;

    /// In-memory duplex stream.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Write for &mut Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for &mut Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    fn exchange(input: &[u8]) -> Vec<Reply> {
        let handler = JsonlConnectionHandler::new(daemon_with_version("9.9.9"));
        let mut duplex = Duplex {
            input: Cursor::new(input.to_vec()),
            output: Vec::new(),
        };
        handler.serve(&mut duplex).expect("serve");
        duplex
            .output
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).expect("reply json"))
            .collect()
    }

    #[test]
    fn answers_every_line_on_one_connection() {
        let replies = exchange(b"{\"kind\":\"version\"}\n\n{\"kind\":\"version\"}\n");
        assert_eq!(replies.len(), 2);
        for reply in replies {
            let Reply::Version(version) = reply else {
                panic!("expected version reply, got {reply:?}");
            };
            assert_eq!(version.version, "9.9.9");
        }
    }

    #[test]
    fn malformed_line_keeps_connection_open() {
        let replies = exchange(b"not json\n{\"kind\":\"version\"}");
        assert_eq!(replies.len(), 2);
        assert!(matches!(&replies[0], Reply::Invalid(response) if response.status == Status::Fatal));
        assert!(matches!(&replies[1], Reply::Version(_)));
    }

    #[test]
    fn empty_content_parse_is_answered_without_a_driver() {
        let replies = exchange(b"{\"kind\":\"parse\",\"filename\":\"a.py\",\"content\":\"\"}\n");
        let [Reply::Parse(parse)] = replies.as_slice() else {
            panic!("expected one parse reply, got {replies:?}");
        };
        assert_eq!(parse.response.status, Status::Ok);
        assert!(parse.uast.is_none());
    }
}
