//! Line-oriented progress output.
//!
//! The trace is what an operator reads: one line per decision or failure,
//! and a terminal [`ProgressTrace::finished`] call when the run is over.
//! It is not a logging facade; library logging goes through `log`.

use std::io::Write;

/// Append-only sink for progress lines.
pub trait ProgressTrace {
    fn output(&mut self, message: &str);

    /// Marks the end of a run. Called exactly once per run.
    fn finished(&mut self);
}

impl<T: ProgressTrace + ?Sized> ProgressTrace for &mut T {
    fn output(&mut self, message: &str) {
        (**self).output(message);
    }

    fn finished(&mut self) {
        (**self).finished();
    }
}

/// Writes each line to an [`std::io::Write`] (stdout for the CLI).
///
/// Write failures are swallowed; losing a progress line must not abort a
/// run that is halfway through mutating local state.
#[derive(Debug)]
pub struct TextTrace<W: Write> {
    out: W,
}

impl<W: Write> TextTrace<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressTrace for TextTrace<W> {
    fn output(&mut self, message: &str) {
        let _ = writeln!(self.out, "{message}");
    }

    fn finished(&mut self) {
        let _ = self.out.flush();
    }
}

/// Collects lines in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryTrace {
    lines: Vec<String>,
    finished: usize,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Any line containing `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    /// How many times `finished` was called.
    pub fn finished_count(&self) -> usize {
        self.finished
    }
}

impl ProgressTrace for MemoryTrace {
    fn output(&mut self, message: &str) {
        self.lines.push(message.to_string());
    }

    fn finished(&mut self) {
        self.finished += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_trace_writes_one_line_per_output() {
        let mut trace = TextTrace::new(Vec::new());
        trace.output("Starting group synchronisation...");
        trace.output("done");
        trace.finished();
        let text = String::from_utf8(trace.into_inner()).unwrap();
        assert_eq!(text, "Starting group synchronisation...\ndone\n");
    }

    #[test]
    fn memory_trace_records_lines_and_finish() {
        let mut trace = MemoryTrace::new();
        trace.output("Creating group Alpha");
        assert!(trace.contains("Alpha"));
        assert_eq!(trace.finished_count(), 0);
        trace.finished();
        assert_eq!(trace.finished_count(), 1);
    }

    #[test]
    fn mutable_reference_forwards() {
        fn emit(mut sink: impl ProgressTrace) {
            sink.output("via ref");
        }
        let mut trace = MemoryTrace::new();
        emit(&mut trace);
        assert_eq!(trace.lines(), ["via ref".to_string()]);
    }
}
