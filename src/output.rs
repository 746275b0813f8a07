//! Single in-flight text output sink.
//!
//! Whatever the UI wants typed out goes through here: one fixed buffer,
//! one cursor, at most one string in flight. The HID keyboard front end
//! drains it a byte per USB poll. Producers must check [`OutputSink::is_idle`]
//! before queueing - in-flight output is never interrupted (single-producer
//! lease, enforced by `begin` refusing while busy).

use crate::config::OUTPUT_BUFFER_LEN;

pub struct OutputSink {
    buffer: [u8; OUTPUT_BUFFER_LEN],
    len: usize,
    cursor: Option<usize>,
}

impl OutputSink {
    pub const fn new() -> Self {
        Self {
            buffer: [0; OUTPUT_BUFFER_LEN],
            len: 0,
            cursor: None,
        }
    }

    /// Whether the sink is free for a new string.
    pub fn is_idle(&self) -> bool {
        self.cursor.is_none()
    }

    /// Queue `text` for output. Refuses (returns `false`) while a
    /// previous string is still draining. Text longer than the buffer
    /// is truncated.
    pub fn begin(&mut self, text: &str) -> bool {
        if !self.is_idle() {
            return false;
        }
        let bytes = text.as_bytes();
        let n = bytes.len().min(OUTPUT_BUFFER_LEN);
        self.buffer[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
        self.cursor = if n > 0 { Some(0) } else { None };
        true
    }

    /// Next byte to send, without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.cursor.map(|i| self.buffer[i])
    }

    /// Consume the byte returned by [`Self::peek`]; goes idle at
    /// end-of-string.
    pub fn advance(&mut self) {
        if let Some(i) = self.cursor {
            let next = i + 1;
            self.cursor = if next < self.len { Some(next) } else { None };
        }
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_order_then_goes_idle() {
        let mut sink = OutputSink::new();
        assert!(sink.begin("ab"));
        assert_eq!(sink.peek(), Some(b'a'));
        sink.advance();
        assert_eq!(sink.peek(), Some(b'b'));
        sink.advance();
        assert_eq!(sink.peek(), None);
        assert!(sink.is_idle());
    }

    #[test]
    fn refuses_second_producer_while_busy() {
        let mut sink = OutputSink::new();
        assert!(sink.begin("x"));
        assert!(!sink.begin("y"));
        assert_eq!(sink.peek(), Some(b'x'));
    }

    #[test]
    fn empty_string_leaves_sink_idle() {
        let mut sink = OutputSink::new();
        assert!(sink.begin(""));
        assert!(sink.is_idle());
    }

    #[test]
    fn oversized_text_is_truncated() {
        let mut sink = OutputSink::new();
        let long: heapless::String<200> =
            core::iter::repeat('z').take(200).collect();
        assert!(sink.begin(&long));
        let mut drained = 0;
        while sink.peek().is_some() {
            sink.advance();
            drained += 1;
        }
        assert_eq!(drained, OUTPUT_BUFFER_LEN);
    }
}
