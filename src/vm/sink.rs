//! Buffered destination for `print`.
//!
//! Lines accumulate in memory and reach the underlying writer every
//! `flush_every` lines, on an explicit [`OutputSink::flush`], and when the
//! sink is dropped. The drop flush covers early returns on runtime errors.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

pub const DEFAULT_FLUSH_EVERY: usize = 100_000;

pub struct OutputSink<W: Write> {
    writer: W,
    buffer: Vec<u8>,
    pending: usize,
    flush_every: usize,
}

impl<W: Write> OutputSink<W> {
    pub fn new(writer: W) -> Self {
        Self::with_flush_every(writer, DEFAULT_FLUSH_EVERY)
    }

    /// A threshold of zero is treated as one (flush after every line).
    pub fn with_flush_every(writer: W, flush_every: usize) -> Self {
        OutputSink {
            writer,
            buffer: Vec::new(),
            pending: 0,
            flush_every: flush_every.max(1),
        }
    }

    /// Buffer one line; counts toward the flush threshold.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.buffer.extend_from_slice(line.as_bytes());
        self.buffer.push(b'\n');
        self.pending += 1;
        if self.pending >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    /// Buffer text without a newline. Does not count toward the threshold.
    pub fn write_str(&mut self, text: &str) {
        self.buffer.extend_from_slice(text.as_bytes());
    }

    /// The buffer is emptied even when the write fails part way, so a later
    /// flush never repeats bytes the writer may already have taken.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            tracing::trace!(bytes = self.buffer.len(), lines = self.pending, "flushing output");
            let written = self.writer.write_all(&self.buffer);
            self.buffer.clear();
            self.pending = 0;
            written?;
        }
        self.pending = 0;
        self.writer.flush()
    }

    /// Lines written since the last flush.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn flush_every(&self) -> usize {
        self.flush_every
    }
}

impl<W: Write> Drop for OutputSink<W> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush output on shutdown");
        }
    }
}

/// Cloneable in-memory writer. Every clone appends to the same buffer, so a
/// test can hand one clone to the VM and read the output through another.
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        CaptureBuffer::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.bytes.borrow_mut().clear();
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_stay_buffered_below_threshold() {
        let out = CaptureBuffer::new();
        let mut sink = OutputSink::with_flush_every(out.clone(), 3);
        sink.write_line("a").unwrap();
        sink.write_line("b").unwrap();
        assert_eq!(out.contents(), "");
        assert_eq!(sink.pending(), 2);
    }

    #[test]
    fn threshold_triggers_flush() {
        let out = CaptureBuffer::new();
        let mut sink = OutputSink::with_flush_every(out.clone(), 2);
        sink.write_line("a").unwrap();
        sink.write_line("b").unwrap();
        assert_eq!(out.contents(), "a\nb\n");
        assert_eq!(sink.pending(), 0);
        sink.write_line("c").unwrap();
        assert_eq!(out.contents(), "a\nb\n");
    }

    #[test]
    fn drop_flushes_remaining_lines() {
        let out = CaptureBuffer::new();
        {
            let mut sink = OutputSink::new(out.clone());
            sink.write_line("tail").unwrap();
        }
        assert_eq!(out.contents(), "tail\n");
    }

    #[test]
    fn write_str_does_not_count_toward_threshold() {
        let out = CaptureBuffer::new();
        let mut sink = OutputSink::with_flush_every(out.clone(), 1);
        sink.write_str("> ");
        assert_eq!(sink.pending(), 0);
        assert_eq!(out.contents(), "");
        sink.flush().unwrap();
        assert_eq!(out.contents(), "> ");
    }

    #[test]
    fn zero_threshold_flushes_every_line() {
        let out = CaptureBuffer::new();
        let mut sink = OutputSink::with_flush_every(out.clone(), 0);
        assert_eq!(sink.flush_every(), 1);
        sink.write_line("x").unwrap();
        assert_eq!(out.contents(), "x\n");
    }

    /// Takes two bytes, fails once, then accepts everything.
    struct FailsOnce {
        out: CaptureBuffer,
        calls: usize,
    }

    impl Write for FailsOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            match self.calls {
                1 => self.out.write(&buf[..buf.len().min(2)]),
                2 => Err(io::Error::other("disk full")),
                _ => self.out.write(buf),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_flush_does_not_repeat_written_bytes() {
        let out = CaptureBuffer::new();
        let mut sink = OutputSink::new(FailsOnce { out: out.clone(), calls: 0 });
        sink.write_line("abc").unwrap();
        assert!(sink.flush().is_err());
        assert_eq!(sink.pending(), 0);
        sink.write_line("d").unwrap();
        drop(sink);
        assert_eq!(out.contents(), "abd\n");
    }

    #[test]
    fn capture_clear_empties_buffer() {
        let out = CaptureBuffer::new();
        let mut writer = out.clone();
        writer.write_all(b"hello").unwrap();
        assert_eq!(out.contents(), "hello");
        out.clear();
        assert!(out.contents().is_empty());
    }
}
