//! `Content-Length` framed message channel.
//!
//! Each message is preceded by a header block terminated by an empty line:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{ChildStdin, ChildStdout};

use crate::error::FramingError;

/// Largest payload accepted from a driver.
pub(crate) const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Channel to a running driver process.
pub(crate) type StdioChannel = FramedChannel<BufReader<ChildStdout>, BufWriter<ChildStdin>>;

/// Reads and writes framed messages over a byte stream pair.
#[derive(Debug)]
pub struct FramedChannel<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> FramedChannel<R, W>
where
    R: BufRead,
    W: Write,
{
    /// Wraps a reader and writer.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Writes one framed message and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::Io`] if writing fails.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), FramingError> {
        write!(self.writer, "Content-Length: {}\r\n\r\n", payload.len())?;
        self.writer.write_all(payload)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Reads one framed message, blocking until it is complete.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::Closed`] at end of stream, a header error when
    /// the header block is malformed, and [`FramingError::Io`] on read
    /// failures.
    pub fn receive(&mut self) -> Result<Vec<u8>, FramingError> {
        let length = self.read_headers()?;
        let mut payload = vec![0_u8; length];
        self.reader.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Consumes the channel, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn read_headers(&mut self) -> Result<usize, FramingError> {
        let mut declared = None;
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(FramingError::Closed);
            }
            let header = line.trim();
            if header.is_empty() {
                break;
            }
            let Some((name, value)) = header.split_once(':') else {
                return Err(FramingError::InvalidHeader(header.to_owned()));
            };
            if name.trim().eq_ignore_ascii_case("content-length") {
                let parsed: usize = value
                    .trim()
                    .parse()
                    .map_err(|_| FramingError::InvalidHeader(header.to_owned()))?;
                declared = Some(parsed);
            }
        }

        let length = declared.ok_or(FramingError::MissingContentLength)?;
        if length > MAX_FRAME_BYTES {
            return Err(FramingError::FrameTooLarge {
                length,
                limit: MAX_FRAME_BYTES,
            });
        }
        Ok(length)
    }
}
