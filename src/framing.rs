// src/framing.rs
//! Newline framing for tracker connections
//!
//! Unlike `LinesCodec`, a bad line never ends the stream: lines that are not
//! UTF-8 or exceed the length limit are reported as frames and reading goes on
//! with the next line.

use bytes::{Buf, BytesMut};
use std::{cmp, io};
use tokio_util::codec::Decoder;

/// Longest accepted line, excluding the terminator
pub const MAX_SENTENCE_LENGTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One line with `\n` and a trailing `\r` removed
    Sentence(String),
    NotUtf8,
    /// Line longer than the limit; its bytes are dropped up to the next `\n`
    Overlong,
}

#[derive(Debug)]
pub struct SentenceCodec {
    max_length: usize,
    // bytes before this index are known not to contain `\n`
    next_index: usize,
    discarding: bool,
}

impl SentenceCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_SENTENCE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    fn frame(line: &[u8]) -> Frame {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match std::str::from_utf8(line) {
            Ok(text) => Frame::Sentence(text.to_string()),
            Err(_) => Frame::NotUtf8,
        }
    }
}

impl Default for SentenceCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SentenceCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        loop {
            // a line of exactly max_length bytes still has its `\n` in range
            let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to].iter().position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    return Ok(Some(Self::frame(&line[..end])));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(Frame::Overlong));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        self.next_index = 0;
        if buf.is_empty() || self.discarding {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }

        let line = buf.split_to(buf.len());
        Ok(Some(Self::frame(&line)))
    }
}
