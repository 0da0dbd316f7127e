//! CR/LF frame tokenizing
//!
//! HFP AT traffic is line oriented: every command and response is terminated
//! by `\r\n`, and responses are additionally preceded by one. Empty lines
//! between frames carry no meaning and are skipped.
//!
//! Two entry points are provided:
//! - [`tokenize`] splits one buffer into frames without consuming it
//! - [`FrameCodec`] keeps the unterminated tail of a read so a frame split
//!   across two deliveries is reassembled

use crate::command::{classify, AtFrame};
use crate::error::FrameError;
use crate::ProtocolCodec;

/// Default maximum length of a single frame in bytes
///
/// Long enough for a full seven-indicator `+CIND` test response.
pub const MAX_FRAME_LEN: usize = 256;

fn is_eol(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

fn frame_text(bytes: &[u8]) -> Result<&str, FrameError> {
    std::str::from_utf8(bytes).map_err(|_| FrameError::NotText(bytes.to_vec()))
}

/// Split a buffer into frames, bounded by `max_len` bytes each
///
/// The final frame does not need a terminator. Runs longer than `max_len`
/// yield [`FrameError::TooLong`] rather than a truncated frame.
pub fn tokenize(data: &[u8], max_len: usize) -> Frames<'_> {
    Frames {
        data,
        pos: 0,
        max_len,
    }
}

/// Iterator returned by [`tokenize`]
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    data: &'a [u8],
    pos: usize,
    max_len: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<&'a str, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.data[self.pos..];
        let start = rest.iter().position(|&b| !is_eol(b))?;
        let rest = &rest[start..];
        let len = rest.iter().position(|&b| is_eol(b)).unwrap_or(rest.len());
        self.pos += start + len;

        if len > self.max_len {
            return Some(Err(FrameError::TooLong {
                len,
                max: self.max_len,
            }));
        }
        Some(frame_text(&rest[..len]))
    }
}

/// Streaming frame codec with cross-read reassembly
#[derive(Debug)]
pub struct FrameCodec {
    buffer: Vec<u8>,
    max_len: usize,
    /// Set after an overflow until the oversized run's terminator arrives
    discarding: bool,
}

impl FrameCodec {
    /// Create a codec with the default frame length limit
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    /// Create a codec with a custom frame length limit
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_len),
            max_len,
            discarding: false,
        }
    }

    /// Maximum accepted frame length in bytes
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Number of bytes held while waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Extract the next complete frame, or the error for a malformed one
    ///
    /// Returns `None` when no terminated frame is buffered. An oversized run
    /// is reported once; the codec then skips to the next terminator.
    pub fn next_frame(&mut self) -> Option<Result<String, FrameError>> {
        if self.discarding {
            match self.buffer.iter().position(|&b| is_eol(b)) {
                Some(end) => {
                    self.buffer.drain(..end);
                    self.discarding = false;
                }
                None => {
                    self.buffer.clear();
                    return None;
                }
            }
        }

        match self.buffer.iter().position(|&b| !is_eol(b)) {
            Some(start) => {
                self.buffer.drain(..start);
            }
            None => {
                self.buffer.clear();
                return None;
            }
        }

        match self.buffer.iter().position(|&b| is_eol(b)) {
            Some(len) => {
                let bytes: Vec<u8> = self.buffer.drain(..len).collect();
                if len > self.max_len {
                    return Some(Err(FrameError::TooLong {
                        len,
                        max: self.max_len,
                    }));
                }
                Some(frame_text(&bytes).map(str::to_owned))
            }
            None if self.buffer.len() > self.max_len => {
                let len = self.buffer.len();
                self.buffer.clear();
                self.discarding = true;
                Some(Err(FrameError::TooLong {
                    len,
                    max: self.max_len,
                }))
            }
            None => None,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for FrameCodec {
    type Command = AtFrame;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    fn next_command(&mut self) -> Option<Self::Command> {
        self.next_command_with_bytes().map(|(frame, _)| frame)
    }

    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)> {
        loop {
            match self.next_frame()? {
                Ok(text) => {
                    let bytes = text.as_bytes().to_vec();
                    let frame = AtFrame {
                        command: classify(&text),
                        text,
                    };
                    return Some((frame, bytes));
                }
                Err(e) => tracing::warn!("Dropping malformed AT frame: {}", e),
            }
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}
