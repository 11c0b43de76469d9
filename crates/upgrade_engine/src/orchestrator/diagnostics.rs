use std::collections::VecDeque;
use std::fmt;

use tracing::{error, info, warn};

pub const MAX_PENDING_DIAGNOSTICS: usize = 256;
pub const DIAGNOSTIC_PREFIX: &str = "[Auto Upgrade]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl DiagnosticLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Operator-facing report sink. Oldest entries are dropped once full.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    pending: VecDeque<Diagnostic>,
}

impl DiagnosticLog {
    pub fn info(&mut self, text: impl fmt::Display) {
        self.push(DiagnosticLevel::Info, text);
    }

    pub fn warning(&mut self, text: impl fmt::Display) {
        self.push(DiagnosticLevel::Warning, text);
    }

    pub fn error(&mut self, text: impl fmt::Display) {
        self.push(DiagnosticLevel::Error, text);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain_into(&mut self, out: &mut Vec<Diagnostic>) {
        out.extend(self.pending.drain(..));
    }

    fn push(&mut self, level: DiagnosticLevel, text: impl fmt::Display) {
        let message = format!("{DIAGNOSTIC_PREFIX} {text}");
        match level {
            DiagnosticLevel::Info => info!(message = message.as_str(), "upgrade_diagnostic"),
            DiagnosticLevel::Warning => warn!(message = message.as_str(), "upgrade_diagnostic"),
            DiagnosticLevel::Error => error!(message = message.as_str(), "upgrade_diagnostic"),
        }
        push_bounded(
            &mut self.pending,
            Diagnostic { level, message },
            MAX_PENDING_DIAGNOSTICS,
        );
    }
}

pub(crate) fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, max_len: usize) {
    if queue.len() == max_len {
        queue.pop_front();
    }
    queue.push_back(value);
}
