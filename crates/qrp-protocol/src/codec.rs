//! Streaming CAT frame codec
//!
//! Splits an incoming byte stream into complete frames. Plain commands end
//! at the `;` terminator; audio blocks (`US`) carry a length byte whose
//! payload may legitimately contain the terminator, so those are split by
//! length, never by a naive delimiter scan. Splitting audio-bearing data on
//! the delimiter is exactly the kind of corruption this codec exists to
//! prevent.

use crate::command::{parse_frame, CatCommand};

/// Longest legal frame: audio block verb + length byte + 255 payload bytes
/// + terminator, with headroom for ordinary commands
pub const MAX_FRAME_LEN: usize = 320;

/// Streaming frame splitter
pub struct CatCodec {
    buffer: Vec<u8>,
}

impl CatCodec {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Push raw bytes into the buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Runaway unterminated input gets trimmed to the tail
        if self.buffer.len() > MAX_FRAME_LEN * 4 {
            let start = self.buffer.len() - MAX_FRAME_LEN;
            self.buffer = self.buffer[start..].to_vec();
        }
    }

    /// Extract the next complete frame, terminator included
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.buffer.is_empty() {
                return None;
            }

            if self.buffer.starts_with(b"US") {
                if self.buffer.len() < 3 {
                    return None;
                }
                let need = 3 + self.buffer[2] as usize + 1;
                if self.buffer.len() < need {
                    return None;
                }
                if self.buffer[need - 1] == b';' {
                    return Some(self.buffer.drain(..need).collect());
                }
                // length byte did not line up with a terminator; drop one
                // byte and resynchronize on the stream
                tracing::warn!("audio block header out of sync, resynchronizing");
                self.buffer.remove(0);
                continue;
            }

            return match self.buffer.iter().position(|&b| b == b';') {
                Some(pos) => Some(self.buffer.drain(..=pos).collect()),
                None => None,
            };
        }
    }

    /// Extract and parse the next command
    ///
    /// Unparsable frames degrade to `Unknown` with a warning; callers that
    /// need to distinguish parse failures use `next_frame` + `parse_frame`.
    pub fn next_command(&mut self) -> Option<CatCommand> {
        self.next_command_with_bytes().map(|(cmd, _)| cmd)
    }

    /// Extract and parse the next command, keeping the raw frame
    pub fn next_command_with_bytes(&mut self) -> Option<(CatCommand, Vec<u8>)> {
        let frame = self.next_frame()?;
        let cmd = match parse_frame(&frame) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!("failed to parse CAT frame: {}", e);
                CatCommand::Unknown(frame.clone())
            }
        };
        Some((cmd, frame))
    }

    /// Drop any buffered partial input
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for CatCodec {
    fn default() -> Self {
        Self::new()
    }
}
