//! Scheduling trace for the console.
//!
//! The trace is a compatibility surface: existing harnesses parse these
//! lines, so format, ordering, and tick stamps are fixed. The sink is owned
//! by the scheduler rather than being a global writer, so the embedder
//! decides where the lines go (serial console, capture buffer, nowhere).

use core::fmt;

use spin::Mutex;

/// Destination for trace lines.
pub trait TraceSink {
    /// Write one complete line. `args` carries no trailing newline.
    fn line(&self, args: fmt::Arguments<'_>);
}

/// Discards every line.
#[derive(Debug, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn line(&self, _args: fmt::Arguments<'_>) {}
}

/// Adapts any [`fmt::Write`] (a serial console in a kernel build, a
/// `String` in tests) into a sink, one newline-terminated line at a time.
pub struct WriterSink<W> {
    inner: Mutex<W>,
}

impl<W: fmt::Write> WriterSink<W> {
    pub const fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Run `f` against the underlying writer.
    pub fn with<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<W: fmt::Write> TraceSink for WriterSink<W> {
    fn line(&self, args: fmt::Arguments<'_>) {
        let mut writer = self.inner.lock();
        let _ = writer.write_fmt(args);
        let _ = writer.write_str("\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn writer_sink_captures_lines() {
        let sink = WriterSink::new(String::new());
        sink.line(format_args!("Tick {}: Thread {} is inserted into queue L3", 5, 3));
        sink.line(format_args!("second"));
        sink.with(|s| {
            assert_eq!(
                s.as_str(),
                "Tick 5: Thread 3 is inserted into queue L3\nsecond\n"
            );
        });
    }

    #[test]
    fn null_sink_discards() {
        NullSink.line(format_args!("dropped"));
    }
}
