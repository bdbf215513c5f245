#![forbid(unsafe_code)]

//! Injectable diagnostic reporting.
//!
//! Components take a `&dyn DiagnosticSink` at construction instead of
//! writing to ambient global state, so callers decide where (and whether)
//! diagnostics land.

/// Receives human-readable diagnostic notes from the pipeline stages.
/// Notes are informational only; nothing load-bearing depends on them.
pub trait DiagnosticSink {
    fn note(&self, message: &str);
}

/// Writes every note to stderr, the way the interactive CLI reports.
#[derive(Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn note(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Discards every note. Used by `--quiet` runs and tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn note(&self, _message: &str) {}
}
