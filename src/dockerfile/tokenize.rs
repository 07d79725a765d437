//! Instruction tokenizer.
//!
//! Turns raw Dockerfile text into a stream of logical instructions. Comments
//! and blank lines are dropped, backslash continuations are joined, and each
//! logical line is split into its keyword and remainder.

use serde::{Deserialize, Serialize};

/// One logical Dockerfile statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Upper-cased keyword (FROM, RUN, ENV, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Remainder after the keyword, trimmed.
    pub value: String,
    /// The full continuation-joined line.
    pub raw: String,
    /// 1-based line of the first physical line of this statement.
    pub line: usize,
}

impl Instruction {
    /// Check whether this instruction has the given keyword (case-insensitive).
    pub fn is(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }
}

/// Split file content into logical instructions, in source order.
pub fn tokenize(content: &str) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut buffer = String::new();
    // First line of the statement being collected, if any.
    let mut start_line: Option<usize> = None;

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let start = *start_line.get_or_insert(idx + 1);

        let (body, continues) = match continuation_body(trimmed) {
            Some(body) => (body.trim_end(), true),
            None => (trimmed, false),
        };
        // A bare `\` line contributes nothing, not even a separator.
        if !body.is_empty() {
            if !buffer.is_empty() {
                buffer.push(' ');
            }
            buffer.push_str(body);
        }
        if continues {
            continue;
        }

        if let Some(instruction) = split_logical_line(&buffer, start) {
            instructions.push(instruction);
        }
        buffer.clear();
        start_line = None;
    }

    // A continuation on the last line still closes the statement.
    if let Some(start) = start_line {
        if let Some(instruction) = split_logical_line(&buffer, start) {
            instructions.push(instruction);
        }
    }

    instructions
}

/// Returns the line without its trailing backslash if it is a continuation.
///
/// Only a single trailing backslash continues; `\\` is an escaped literal.
fn continuation_body(trimmed: &str) -> Option<&str> {
    let body = trimmed.strip_suffix('\\')?;
    if body.ends_with('\\') {
        return None;
    }
    Some(body)
}

fn split_logical_line(buffer: &str, line: usize) -> Option<Instruction> {
    let raw = buffer.trim();
    let (keyword, rest) = match raw.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (raw, ""),
    };
    if keyword.is_empty() {
        return None;
    }

    Some(Instruction {
        kind: keyword.to_ascii_uppercase(),
        value: rest.to_string(),
        raw: raw.to_string(),
        line,
    })
}
