//! Allocation-script parsing
//!
//! One operation per whitespace-separated line:
//! `<name> <numops> <type> [size]` with `type` one of `M` (perform
//! `numops` allocations of `size` bytes under handle `name`) or `F` (free
//! the allocation at 1-based index `numops` of handle `name`). Blank lines
//! are skipped; anything else is fatal to the driver.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("line {line}: expected `<name> <numops> <type> [size]`")]
    Malformed { line: usize },

    #[error("line {line}: invalid operation type `{found}`")]
    InvalidType { line: usize, found: String },

    #[error("line {line}: number of operations must be positive")]
    InvalidCount { line: usize },

    #[error("line {line}: allocation size must be positive")]
    InvalidSize { line: usize },
}

/// A single parsed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `M`: perform `count` allocations of `size` bytes under `name`
    Alloc { name: char, count: usize, size: usize },
    /// `F`: free the allocation at 1-based `index` under `name`
    Free { name: char, index: usize },
}

/// Parse one line; `Ok(None)` for blank lines. `line` is 1-based and only
/// used for error reporting.
pub fn parse_line(text: &str, line: usize) -> Result<Option<Op>, ScriptError> {
    let mut fields = text.split_whitespace();
    let Some(name_field) = fields.next() else {
        return Ok(None);
    };
    let Some(name) = name_field.chars().next() else {
        return Ok(None);
    };

    let count: i64 = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or(ScriptError::Malformed { line })?;
    let kind = fields.next().ok_or(ScriptError::Malformed { line })?;

    match kind {
        "M" => {
            if count <= 0 {
                return Err(ScriptError::InvalidCount { line });
            }
            let size: i64 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or(ScriptError::Malformed { line })?;
            if size <= 0 {
                return Err(ScriptError::InvalidSize { line });
            }
            Ok(Some(Op::Alloc {
                name,
                count: count as usize,
                size: size as usize,
            }))
        }
        "F" => {
            if count <= 0 {
                return Err(ScriptError::InvalidCount { line });
            }
            Ok(Some(Op::Free {
                name,
                index: count as usize,
            }))
        }
        other => Err(ScriptError::InvalidType {
            line,
            found: other.to_string(),
        }),
    }
}

/// Parse a whole script into its operation sequence.
pub fn parse_script(input: &str) -> Result<Vec<Op>, ScriptError> {
    let mut ops = Vec::new();
    for (idx, text) in input.lines().enumerate() {
        if let Some(op) = parse_line(text, idx + 1)? {
            ops.push(op);
        }
    }
    Ok(ops)
}
