//! Diagnostics for the component compiler.
//!
//! Two severities exist:
//! - `CompilerError`: a hard violation of the component contract. Always
//!   carries a stable code and, when a source span is available, the
//!   1-based line/column it points at.
//! - `Warning`: a best-effort fallback was taken (e.g. an inherited base
//!   file could not be read). Warnings are accumulated on the result,
//!   never printed from here.

use serde::{Deserialize, Serialize};

pub const ERR_PARSE: &str = "M-ERR-PARSE";
pub const ERR_RENDER_MISSING: &str = "M-ERR-RENDER-MISSING";
pub const ERR_REF_STRING_IN_LOOP: &str = "M-ERR-REF-STRING-IN-LOOP";
pub const ERR_REF_LOOP_NO_INDEX: &str = "M-ERR-REF-LOOP-NO-INDEX";
pub const ERR_REF_INVALID: &str = "M-ERR-REF-INVALID";
pub const ERR_PROPS_REST: &str = "M-ERR-PROPS-REST";
pub const ERR_SWITCH_CASE_BLOCK: &str = "M-ERR-SWITCH-CASE-BLOCK";
pub const ERR_SWITCH_DEFAULT_ORDER: &str = "M-ERR-SWITCH-DEFAULT-ORDER";
pub const ERR_FOR_STATEMENT_JSX: &str = "M-ERR-FOR-STATEMENT-JSX";
pub const ERR_EVENT_UNRESOLVED: &str = "M-ERR-EVENT-UNRESOLVED";
pub const ERR_JSX_REASSIGNED: &str = "M-ERR-JSX-REASSIGNED";
pub const ERR_DUPLICATE_IMPORT: &str = "M-ERR-DUPLICATE-IMPORT";
pub const ERR_ATTR_UNSUPPORTED: &str = "M-ERR-ATTR-UNSUPPORTED";
pub const ERR_INHERITANCE_CYCLE: &str = "M-ERR-INHERITANCE-CYCLE";

pub const WARN_BASE_UNRESOLVED: &str = "M-WARN-BASE-UNRESOLVED";
pub const WARN_UNKNOWN_ADAPTER: &str = "M-WARN-UNKNOWN-ADAPTER";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        CompilerError {
            code: code.to_string(),
            message: message.into(),
            file: None,
            line: 0,
            column: 0,
            context: None,
            hints: Vec::new(),
        }
    }

    /// Locate the error at a byte offset in `source`. Line and column
    /// are 1-based; the column counts characters, not bytes.
    pub fn at_offset(
        code: &str,
        message: impl Into<String>,
        source: &str,
        offset: u32,
        file: &str,
    ) -> Self {
        let (line, column) = line_column(source, offset);
        CompilerError {
            code: code.to_string(),
            message: message.into(),
            file: Some(file.to_string()),
            line,
            column,
            context: Some(context_line(source, offset)),
            hints: Vec::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) if self.line > 0 => write!(
                f,
                "[{}] {} ({}:{}:{})",
                self.code, self.message, file, self.line, self.column
            ),
            _ => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for CompilerError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub code: String,
    pub message: String,
}

impl Warning {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Warning {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// 1-based line/column of a byte offset. Offsets past the end clamp to
/// the last position.
pub fn line_column(source: &str, offset: u32) -> (u32, u32) {
    let offset = (offset as usize).min(source.len());
    let before = &source[..offset];
    let line = before.bytes().filter(|b| *b == b'\n').count() as u32 + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() as u32 + 1,
        None => before.chars().count() as u32 + 1,
    };
    (line, column)
}

fn context_line(source: &str, offset: u32) -> String {
    let offset = (offset as usize).min(source.len());
    let start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = source[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(source.len());
    source[start..end].trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_is_one_based() {
        let src = "abc\ndef\nghi";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 4), (2, 1));
        assert_eq!(line_column(src, 6), (2, 3));
        assert_eq!(line_column(src, 10), (3, 3));
    }

    #[test]
    fn located_error_captures_context() {
        let src = "let a = 1;\nlet b = oops;";
        let err = CompilerError::at_offset(ERR_PARSE, "bad", src, 19, "x.tsx");
        assert_eq!(err.line, 2);
        assert_eq!(err.context.as_deref(), Some("let b = oops;"));
    }
}
