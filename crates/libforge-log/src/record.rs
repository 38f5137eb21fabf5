use libforge_ring::Micros;
use std::fmt::Write as _;

/// Bounded message length, matching the router's "truncate on overflow"
/// formatting contract.
pub const MAX_MESSAGE_LEN: usize = 256;

/// A pre-allocated log record buffer.
///
/// Queued sinks own a pool of these through their out-queue: the router
/// pops one, fills it, and hands it to the sink's in-queue. Whoever drains
/// the in-queue returns the buffer to the out-queue when done, so the set
/// of buffers in circulation never grows past what the sink pre-allocated.
#[derive(Clone)]
pub struct RecordBuffer {
    pub timestamp: Micros,
    pub level: u64,
    pub mask: u64,
    pub file: &'static str,
    pub line: i32,
    message: [u8; MAX_MESSAGE_LEN],
    message_length: usize,
}

impl Default for RecordBuffer {
    fn default() -> Self {
        Self {
            timestamp: 0,
            level: 0,
            mask: 0,
            file: "",
            line: 0,
            message: [0; MAX_MESSAGE_LEN],
            message_length: 0,
        }
    }
}

impl RecordBuffer {
    pub fn message(&self) -> &str {
        std::str::from_utf8(&self.message[..self.message_length]).unwrap_or("")
    }

    pub(crate) fn fill(
        &mut self,
        timestamp: Micros,
        level: u64,
        mask: u64,
        file: &'static str,
        line: i32,
        message: &str,
    ) {
        self.timestamp = timestamp;
        self.level = level;
        self.mask = mask;
        self.file = file;
        self.line = line;
        let bytes = message.as_bytes();
        let len = bytes.len().min(MAX_MESSAGE_LEN);
        self.message[..len].copy_from_slice(&bytes[..len]);
        self.message_length = len;
    }
}

/// A read-only view of a record, handed to direct sink callbacks.
#[derive(Clone, Copy)]
pub struct LogRecord<'a> {
    pub timestamp: Micros,
    pub level: u64,
    pub mask: u64,
    pub file: &'static str,
    pub line: i32,
    pub message: &'a str,
}

impl<'a> From<&'a RecordBuffer> for LogRecord<'a> {
    fn from(buf: &'a RecordBuffer) -> Self {
        Self {
            timestamp: buf.timestamp,
            level: buf.level,
            mask: buf.mask,
            file: buf.file,
            line: buf.line,
            message: buf.message(),
        }
    }
}

/// Formats `args` into a bounded, heap-free-ish scratch buffer, truncating
/// at [`MAX_MESSAGE_LEN`] bytes (never splitting a UTF-8 code point).
pub(crate) fn format_bounded(args: std::fmt::Arguments<'_>) -> String {
    let mut s = String::with_capacity(64);
    // `write!` to a `String` never fails.
    let _ = write!(s, "{args}");
    if s.len() > MAX_MESSAGE_LEN {
        let mut end = MAX_MESSAGE_LEN;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

/// Renders `data` as a 16-bytes-per-line hex dump with an ASCII sidebar.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4);
    for (row, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}  ", row * 16);
        for b in chunk {
            let _ = write!(out, "{b:02x} ");
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push_str(" |");
        for &b in chunk {
            let c = if (0x20..0x7f).contains(&b) { b as char } else { '.' };
            out.push(c);
        }
        out.push_str("|\n");
    }
    out
}

/// Renders `data` as a plain, unbroken hex string.
pub fn binary_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_oversized_messages() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 50);
        let mut buf = RecordBuffer::default();
        buf.fill(0, 0, 0, "f.rs", 1, &long);
        assert_eq!(buf.message().len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn hex_dump_formats_rows() {
        let dump = hex_dump(b"hello world!!!!!");
        assert!(dump.starts_with("00000000"));
        assert!(dump.contains("|hello world!!!!!|"));
    }
}
