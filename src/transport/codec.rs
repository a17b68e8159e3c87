//! Newline-delimited JSON codec
//!
//! The CLI writes one JSON object per line, but a single object can arrive split
//! over several physical lines. [`JsonLineCodec`] accumulates trimmed lines until
//! the buffer parses, bounded by a maximum size.

use bytes::{Buf, BytesMut};
use serde_json::Value;
use tokio_util::codec::Decoder;

use crate::error::{ClaudeError, Result};

/// Default cap on a single reassembled frame (1 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Decoder turning a byte stream into JSON values
///
/// Frame-level problems (overflow, invalid UTF-8) are yielded as `Err` items so
/// the surrounding stream keeps going; only I/O failures end it.
#[derive(Debug)]
pub struct JsonLineCodec {
    buffer: String,
    max_buffer_size: usize,
    // Rest of an over-long line is still arriving
    discarding: bool,
}

impl JsonLineCodec {
    /// Create a codec with the given maximum frame size
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            buffer: String::new(),
            max_buffer_size,
            discarding: false,
        }
    }

    /// Bytes currently held for an incomplete frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn overflow(&mut self) -> ClaudeError {
        let err = ClaudeError::json_decode(
            &self.buffer,
            format!(
                "JSON message exceeded maximum buffer size of {} bytes",
                self.max_buffer_size
            ),
        );
        self.buffer.clear();
        err
    }

    /// Append one trimmed line and try to complete a frame
    fn push_line(&mut self, line: &str) -> Option<Result<Value>> {
        self.buffer.push_str(line);

        if self.buffer.len() > self.max_buffer_size {
            return Some(Err(self.overflow()));
        }

        match serde_json::from_str::<Value>(&self.buffer) {
            Ok(value) => {
                self.buffer.clear();
                Some(Ok(value))
            }
            Err(_) => None,
        }
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_SIZE)
    }
}

impl Decoder for JsonLineCodec {
    type Item = Result<Value>;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src.iter().position(|b| *b == b'\n');

            if self.discarding {
                match newline {
                    Some(pos) => {
                        src.advance(pos + 1);
                        self.discarding = false;
                        continue;
                    }
                    None => {
                        src.clear();
                        return Ok(None);
                    }
                }
            }

            let Some(pos) = newline else {
                if self.buffer.len() + src.len() > self.max_buffer_size {
                    src.clear();
                    self.discarding = true;
                    return Ok(Some(Err(self.overflow())));
                }
                return Ok(None);
            };

            let raw = src.split_to(pos + 1);
            let line = match std::str::from_utf8(&raw) {
                Ok(line) => line.trim(),
                Err(e) => {
                    self.buffer.clear();
                    let lossy = String::from_utf8_lossy(&raw);
                    return Ok(Some(Err(ClaudeError::json_decode(
                        lossy.trim(),
                        format!("invalid UTF-8 in output: {e}"),
                    ))));
                }
            };

            if line.is_empty() {
                continue;
            }

            if let Some(frame) = self.push_line(line) {
                return Ok(Some(frame));
            }
        }
    }

    fn decode_eof(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        self.discarding = false;
        if !src.is_empty() {
            let rest = String::from_utf8_lossy(src.chunk()).trim().to_string();
            src.clear();
            if !rest.is_empty() {
                if let Some(frame) = self.push_line(&rest) {
                    return Ok(Some(frame));
                }
            }
        }

        if !self.buffer.is_empty() {
            tracing::warn!(
                bytes = self.buffer.len(),
                "Dropping incomplete JSON at end of stream"
            );
            self.buffer.clear();
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_all(codec: &mut JsonLineCodec, input: &[u8]) -> Vec<Result<Value>> {
        let mut src = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(&mut src).unwrap() {
            out.push(frame);
        }
        while let Some(frame) = codec.decode_eof(&mut src).unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_decodes_one_object_per_line() {
        let mut codec = JsonLineCodec::default();
        let frames = decode_all(&mut codec, b"{\"a\":1}\n\n{\"b\":2}\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap(), &json!({"a": 1}));
        assert_eq!(frames[1].as_ref().unwrap(), &json!({"b": 2}));
    }

    #[test]
    fn test_reassembles_split_object() {
        let mut codec = JsonLineCodec::default();
        let frames = decode_all(&mut codec, b"{\"type\":\"user\",\n\"x\":[1,\n2]}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap()["x"], json!([1, 2]));
    }

    #[test]
    fn test_partial_chunks_wait_for_newline() {
        let mut codec = JsonLineCodec::default();
        let mut src = BytesMut::from(&b"{\"a\":"[..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(b"1}\n");
        let frame = codec.decode(&mut src).unwrap().unwrap().unwrap();
        assert_eq!(frame, json!({"a": 1}));
    }

    #[test]
    fn test_overflow_yields_error_and_recovers() {
        let mut codec = JsonLineCodec::new(16);
        let mut input = Vec::new();
        input.extend_from_slice(b"{\"data\":\"");
        input.extend_from_slice(&[b'x'; 32]);
        input.extend_from_slice(b"\n{\"ok\":true}\n");
        let frames = decode_all(&mut codec, &input);
        assert!(matches!(frames[0], Err(ClaudeError::JsonDecode { .. })));
        assert_eq!(frames.last().unwrap().as_ref().unwrap(), &json!({"ok": true}));
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_unterminated_overflow_is_reported() {
        let mut codec = JsonLineCodec::new(8);
        let mut src = BytesMut::from(&b"{\"aaaaaaaaaaaaaaaa"[..]);
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert!(frame.is_err());
        assert!(src.is_empty());
    }

    #[test]
    fn test_overflow_split_across_reads_skips_rest_of_line() {
        let mut codec = JsonLineCodec::new(16);
        let mut src = BytesMut::from(&b"{\"data\":\"xxxxxxxxxxxxxxxxxxxx"[..]);
        assert!(codec.decode(&mut src).unwrap().unwrap().is_err());

        // Tail of the same line arrives, followed by a good frame
        src.extend_from_slice(b"yyyy\"}\n{\"ok\":true}\n");
        let frame = codec.decode(&mut src).unwrap().unwrap().unwrap();
        assert_eq!(frame, json!({"ok": true}));
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_overflow_tail_spanning_several_reads() {
        let mut codec = JsonLineCodec::new(8);
        let mut src = BytesMut::from(&b"{\"aaaaaaaaaaaa"[..]);
        assert!(codec.decode(&mut src).unwrap().unwrap().is_err());
        src.extend_from_slice(b"bbbbbbbbbbbbbbbb");
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(b"cc\"}\n{\"b\":2}\n");
        let frame = codec.decode(&mut src).unwrap().unwrap().unwrap();
        assert_eq!(frame, json!({"b": 2}));
    }

    #[test]
    fn test_last_line_without_newline_is_parsed() {
        let mut codec = JsonLineCodec::default();
        let frames = decode_all(&mut codec, b"{\"a\":1}\n{\"b\":2}");
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_incomplete_tail_is_dropped() {
        let mut codec = JsonLineCodec::default();
        let frames = decode_all(&mut codec, b"{\"a\":1}\n{\"b\":");
        assert_eq!(frames.len(), 1);
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_a_decode_error() {
        let mut codec = JsonLineCodec::default();
        let frames = decode_all(&mut codec, b"\xff\xfe\n{\"a\":1}\n");
        assert!(matches!(frames[0], Err(ClaudeError::JsonDecode { .. })));
        assert!(frames[1].is_ok());
    }
}
