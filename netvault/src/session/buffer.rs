//! Output buffer with tail-only prompt search.
//!
//! Only the last `search_depth` bytes are searched for the prompt, so a
//! multi-megabyte `show running-config` does not make every read quadratic.

use bytes::BytesMut;
use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Buffer for accumulating session output and finding the trailing prompt.
pub struct PatternBuffer {
    buffer: BytesMut,
    search_depth: usize,
    parser: Parser,
}

impl PatternBuffer {
    /// Create a buffer that searches the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth,
            parser: Parser::new(),
        }
    }

    /// Append raw channel data, dropping ANSI escape sequences.
    ///
    /// The escape parser keeps its state between calls, so a sequence split
    /// across two reads is still removed.
    pub fn extend(&mut self, data: &[u8]) {
        let mut printer = Printer {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut printer, data);
    }

    /// Search only the tail of the buffer for `pattern`.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern.find(&self.buffer[start..])
    }

    /// Check if the tail contains a match for `pattern`.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Take the buffered output as a string and reset.
    pub fn take_string(&mut self) -> String {
        let data = self.buffer.split();
        String::from_utf8_lossy(&data).into_owned()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Collects printable text and line control bytes from the escape parser.
struct Printer<'a> {
    out: &'a mut BytesMut,
}

impl Perform for Printer<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.extend_from_slice(&[byte]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"r1#show clock\r\n");
        assert_eq!(buffer.as_slice(), b"r1#show clock\r\n");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[32mGreen text\x1b[0m");
        assert_eq!(buffer.as_slice(), b"Green text");
    }

    #[test]
    fn test_escape_split_across_reads() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"before\x1b[3");
        buffer.extend(b"2mafter");
        assert_eq!(buffer.as_slice(), b"beforeafter");
    }

    #[test]
    fn test_tail_search() {
        let mut buffer = PatternBuffer::new(20);
        buffer.extend(&[b'x'; 100]);
        buffer.extend(b"\nrouter#");

        let pattern = Regex::new(r"router#").unwrap();
        assert!(buffer.tail_contains(&pattern));
    }

    #[test]
    fn test_prompt_outside_tail_ignored() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"router#");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"router#").unwrap();
        assert!(buffer.search_tail(&pattern).is_none());
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(buffer.take_string(), "test data");
        assert!(buffer.is_empty());
    }
}
