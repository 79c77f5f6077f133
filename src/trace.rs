//! Trace formatting and output.
//!
//! Every emitted event becomes one line in the evemu replay format:
//!
//! ```text
//! E: 12.000345 0001 001e 0001    # EV_KEY / KEY_A                1
//! E: 12.000345 0000 0000 0000    # ------------ SYN_REPORT (0) ---------- +4ms
//! ```
//!
//! The numeric part (`E: <sec>.<usec> <type> <code> <value>`) is what replay tools
//! parse; everything after `#` is a human-readable comment. The sync line's comment
//! carries the time elapsed since the previous frame.
//!
//! Formatting ([`format_event`], [`format_sync`]) is pure. Output goes through a
//! [`TraceSink`], so callers decide where lines end up:
//! - [`WriterTrace`] writes to any pair of `io::Write`s (stdout + stderr in the CLI),
//! - [`MemoryTrace`] keeps everything in memory (tests, replay comparisons).

use crate::codes::{self, EventType, SYN_REPORT};
use crate::event::InputEvent;
use std::io::{self, Write};
use std::time::Duration;

/// Placeholder for types and codes the kernel headers don't name.
pub const UNKNOWN_NAME: &str = "?";

/// Render one event line.
pub fn format_event(
    timestamp: Duration,
    event_type: EventType,
    code: u16,
    value: i32,
    type_name: &str,
    code_name: &str,
) -> String {
    format!(
        "E: {}.{:06} {:04x} {:04x} {:04}    # {} / {:<20} {}",
        timestamp.as_secs(),
        timestamp.subsec_micros(),
        event_type.0,
        code,
        value,
        type_name,
        code_name,
        value,
    )
}

/// Render a frame terminator line, annotated with the elapsed time since the
/// previous frame (in whole milliseconds, always signed).
pub fn format_sync(timestamp: Duration, dt_us: i64) -> String {
    format!(
        "E: {}.{:06} {:04x} {:04x} {:04}    # ------------ {} ({}) ---------- {:+}ms",
        timestamp.as_secs(),
        timestamp.subsec_micros(),
        EventType::SYNCHRONIZATION.0,
        SYN_REPORT,
        0,
        codes::code_name(EventType::SYNCHRONIZATION, SYN_REPORT).unwrap_or(UNKNOWN_NAME),
        SYN_REPORT,
        dt_us / 1000,
    )
}

/// [`format_event`] with symbolic names looked up from the event taxonomy.
pub fn format_input_event(event: &InputEvent) -> String {
    format_event(
        event.timestamp,
        event.event_type,
        event.code,
        event.value,
        event.event_type.name().unwrap_or(UNKNOWN_NAME),
        codes::code_name(event.event_type, event.code).unwrap_or(UNKNOWN_NAME),
    )
}

/// Three-line banner announcing a new fuzzed device.
pub fn format_banner(device_name: &str) -> String {
    let rule = "#".repeat(61);
    format!("{rule}\n#################### {device_name} ########################\n{rule}")
}

/// Destination of trace output.
pub trait TraceSink {
    /// One `E:` line (no trailing newline).
    fn line(&mut self, line: &str) -> io::Result<()>;

    /// Iteration banner; goes to the trace and to the diagnostic stream.
    fn banner(&mut self, banner: &str) -> io::Result<()>;

    /// Serialized device descriptor, written before the device's events.
    fn descriptor(&mut self, text: &str) -> io::Result<()>;
}

/// Trace written to an output stream plus a diagnostic stream.
pub struct WriterTrace<O: Write, D: Write> {
    out: O,
    diag: D,
}

impl<O: Write, D: Write> WriterTrace<O, D> {
    pub fn new(out: O, diag: D) -> Self {
        Self { out, diag }
    }

    pub fn into_inner(self) -> (O, D) {
        (self.out, self.diag)
    }
}

impl WriterTrace<io::Stdout, io::Stderr> {
    /// Trace on stdout, banners duplicated to stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, D: Write> TraceSink for WriterTrace<O, D> {
    fn line(&mut self, line: &str) -> io::Result<()> {
        // Flushed before the next event reaches the device.
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    fn banner(&mut self, banner: &str) -> io::Result<()> {
        writeln!(self.out, "{banner}")?;
        self.out.flush()?;
        writeln!(self.diag, "{banner}")?;
        self.diag.flush()
    }

    fn descriptor(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }
}

/// In-memory trace, in output order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryTrace {
    /// Everything written to the trace stream, one entry per call.
    pub output: Vec<String>,
    /// Everything written to the diagnostic stream.
    pub diagnostics: Vec<String>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the `E:` lines.
    pub fn event_lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.output
            .iter()
            .map(String::as_str)
            .filter(|l| l.starts_with("E: "))
    }

    /// The trace stream as one string, newline-terminated per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.output {
            out.push_str(entry);
            if !entry.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

impl TraceSink for MemoryTrace {
    fn line(&mut self, line: &str) -> io::Result<()> {
        self.output.push(line.to_string());
        Ok(())
    }

    fn banner(&mut self, banner: &str) -> io::Result<()> {
        self.output.push(banner.to_string());
        self.diagnostics.push(banner.to_string());
        Ok(())
    }

    fn descriptor(&mut self, text: &str) -> io::Result<()> {
        self.output.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_line_layout() {
        let line = format_event(
            Duration::new(12, 345_000),
            EventType::KEY,
            0x1e,
            1,
            "EV_KEY",
            "KEY_A",
        );
        assert_eq!(
            line,
            "E: 12.000345 0001 001e 0001    # EV_KEY / KEY_A                1"
        );
    }

    #[test]
    fn negative_values_keep_width() {
        let line = format_event(Duration::ZERO, EventType::ABSOLUTE, 0, -5, "EV_ABS", "ABS_X");
        assert!(line.starts_with("E: 0.000000 0003 0000 -005    # EV_ABS / ABS_X"));
        assert!(line.ends_with(" -5"));
    }

    #[test]
    fn sync_line_is_signed_milliseconds() {
        assert_eq!(
            format_sync(Duration::new(1, 2), 0),
            "E: 1.000000 0000 0000 0000    # ------------ SYN_REPORT (0) ---------- +0ms"
        );
        assert!(format_sync(Duration::ZERO, 12_999).ends_with(" +12ms"));
        assert!(format_sync(Duration::ZERO, -3_000).ends_with(" -3ms"));
    }

    #[test]
    fn unnamed_codes_render_placeholder() {
        let ev = InputEvent::new(Duration::ZERO, EventType::KEY, 0x2ff, 0);
        let line = format_input_event(&ev);
        assert!(line.contains("# EV_KEY / ?"), "{line}");
    }

    #[test]
    fn banner_goes_to_both_streams() {
        let mut trace = WriterTrace::new(Vec::new(), Vec::new());
        let banner = format_banner("fuzzy device 3");
        trace.banner(&banner).unwrap();
        trace.line("E: 0.000000 0000 0000 0000").unwrap();
        let (out, diag) = trace.into_inner();
        let out = String::from_utf8(out).unwrap();
        let diag = String::from_utf8(diag).unwrap();

        assert!(out.starts_with(&banner));
        assert!(out.ends_with("E: 0.000000 0000 0000 0000\n"));
        assert_eq!(diag, format!("{banner}\n"));
        assert_eq!(banner.lines().count(), 3);
        assert!(banner.contains("#################### fuzzy device 3 ####"));
    }
}
