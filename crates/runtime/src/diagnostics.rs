//! Diagnostics for soft script faults
//!
//! A malformed trigger must never stop the simulation. Instead of failing,
//! the interpreter stores `SFalse` and reports a [`Diagnostic`] to the
//! machine's [`DiagnosticSink`], exactly once per fault.
//!
//! Two sinks ship with the runtime:
//!
//! - [`TracingSink`] (default) forwards to `tracing`: arithmetic faults and
//!   runaway loops at `warn`, failed redirections at `debug` since scripts
//!   look up absent helpers and targets all the time.
//! - [`RecordingSink`] keeps every diagnostic in memory, for tests and tools
//!   that want to inspect them.

use crate::opcode::Redirect;
use crate::world::CharId;
use statevm_core::Fault;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// An operator produced `SFalse` (division by zero, bad logarithm, ...)
    Arithmetic { fault: Fault, at: usize },
    /// A redirection found no character; the sub-expression was skipped
    RedirectFailed { redirect: Redirect, index: i32 },
    /// A loop block hit the iteration cap and was aborted
    LoopLimit { max: u32 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Arithmetic { fault, at } => write!(f, "{} (byte {})", fault, at),
            Diagnostic::RedirectFailed { redirect, index } => {
                write!(f, "{}({}) did not resolve", redirect, index)
            }
            Diagnostic::LoopLimit { max } => {
                write!(f, "loop aborted after {} iterations", max)
            }
        }
    }
}

pub trait DiagnosticSink: Send {
    fn report(&self, who: CharId, diagnostic: &Diagnostic);
}

/// Default sink: structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, who: CharId, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::RedirectFailed { .. } => {
                tracing::debug!(char = %who, "{}", diagnostic)
            }
            _ => tracing::warn!(char = %who, "{}", diagnostic),
        }
    }
}

/// In-memory sink. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    entries: Arc<Mutex<Vec<(CharId, Diagnostic)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every recorded diagnostic, leaving the log empty
    pub fn take(&self) -> Vec<(CharId, Diagnostic)> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(CharId, Diagnostic)>> {
        // A poisoned log is still a usable log
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, who: CharId, diagnostic: &Diagnostic) {
        self.lock().push((who, diagnostic.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_shares_log() {
        let sink = RecordingSink::new();
        let clone = sink.clone();
        clone.report(CharId(3), &Diagnostic::LoopLimit { max: 5 });
        assert_eq!(sink.len(), 1);

        let entries = sink.take();
        assert_eq!(entries, vec![(CharId(3), Diagnostic::LoopLimit { max: 5 })]);
        assert!(clone.is_empty());
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::Arithmetic {
            fault: Fault::DivisionByZero,
            at: 4,
        };
        assert_eq!(d.to_string(), "division by zero (byte 4)");

        let d = Diagnostic::RedirectFailed {
            redirect: Redirect::Helper,
            index: 7,
        };
        assert_eq!(d.to_string(), "helper(7) did not resolve");
    }
}
