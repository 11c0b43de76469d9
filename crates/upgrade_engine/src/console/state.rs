use std::collections::VecDeque;

use crate::orchestrator::push_bounded;

const CONSOLE_PROMPT_PREFIX: &str = "> ";

pub const MAX_OUTPUT_LINES: usize = 256;
pub const MAX_PENDING_LINES: usize = 64;
pub const MAX_LINE_CHARS: usize = 256;

/// Line-oriented operator console: submitted lines wait in a pending queue
/// until the command processor drains them; replies land in the output buffer.
#[derive(Debug, Default)]
pub struct ConsoleState {
    output_lines: VecDeque<String>,
    pending_lines: VecDeque<String>,
}

impl ConsoleState {
    /// Queues a raw line for processing and echoes it with the prompt prefix.
    pub fn submit_line(&mut self, raw_line: &str) {
        let line: String = raw_line
            .chars()
            .filter(|ch| !ch.is_control())
            .take(MAX_LINE_CHARS)
            .collect();
        push_bounded(
            &mut self.output_lines,
            format!("{CONSOLE_PROMPT_PREFIX}{line}"),
            MAX_OUTPUT_LINES,
        );
        push_bounded(&mut self.pending_lines, line, MAX_PENDING_LINES);
    }

    pub fn append_output_line(&mut self, line: impl Into<String>) {
        push_bounded(&mut self.output_lines, line.into(), MAX_OUTPUT_LINES);
    }

    pub fn clear_output_lines(&mut self) {
        self.output_lines.clear();
    }

    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.output_lines.iter().map(String::as_str)
    }

    pub fn drain_pending_lines_into(&mut self, out: &mut Vec<String>) {
        out.extend(self.pending_lines.drain(..));
    }

    pub fn drain_output_lines_into(&mut self, out: &mut Vec<String>) {
        out.extend(self.output_lines.drain(..));
    }
}
