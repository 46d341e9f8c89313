//! Module `framing`
//!
//! Reassembles newline-terminated frames from a byte stream. A single read
//! from the socket may hold several frames, part of one, or nothing useful;
//! `FrameReader` buffers until a terminator arrives and only then hands the
//! frame to the parser.

use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::{FrameError, ReadError};
use crate::protocol::frames::FRAME_TERMINATOR;

/// Buffered reader yielding one complete frame per call.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
    max_frame_length: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_frame_length: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            buffer: Vec::new(),
            max_frame_length,
        }
    }

    /// Reads the next frame, without its terminator.
    ///
    /// Returns `Ok(None)` at end-of-stream. Blank lines are skipped. A frame
    /// longer than the limit is consumed up to its terminator and reported as
    /// [`ReadError::Malformed`], leaving the reader positioned at the next
    /// frame. An unterminated fragment at end-of-stream is discarded.
    pub async fn read_frame(&mut self) -> Result<Option<String>, ReadError> {
        self.buffer.clear();
        let mut oversized = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if !self.buffer.is_empty() || oversized {
                    debug!("Dropping unterminated frame fragment at end of stream");
                }
                return Ok(None);
            }

            let (chunk, used, complete) = match available.iter().position(|&b| b == FRAME_TERMINATOR)
            {
                Some(index) => (&available[..index], index + 1, true),
                None => (available, available.len(), false),
            };

            if !oversized {
                if self.buffer.len() + chunk.len() > self.max_frame_length + 1 {
                    // One spare byte tolerates a trailing '\r' at the limit.
                    oversized = true;
                    self.buffer.clear();
                } else {
                    self.buffer.extend_from_slice(chunk);
                }
            }
            self.reader.consume(used);

            if !complete {
                continue;
            }

            if oversized {
                return Err(FrameError::TooLong(self.max_frame_length).into());
            }

            if self.buffer.last() == Some(&b'\r') {
                self.buffer.pop();
            }

            if self.buffer.len() > self.max_frame_length {
                self.buffer.clear();
                return Err(FrameError::TooLong(self.max_frame_length).into());
            }

            if self.buffer.is_empty() {
                continue;
            }

            let frame = std::mem::take(&mut self.buffer);
            return String::from_utf8(frame)
                .map(Some)
                .map_err(|_| FrameError::InvalidUtf8.into());
        }
    }
}
