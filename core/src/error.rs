//! The exception hierarchy used by the ThreadScript engine.
//!
//! This is a direct, idiomatic-Rust re-expression of the original engine's
//! `exception::base` hierarchy: a flat set of error *kinds*, each carrying an
//! optional [`StackTrace`]. Rather than a class hierarchy we use one
//! `thiserror`-derived enum; callers that need to distinguish "categories"
//! (value errors vs. operation errors, as the original's intermediate
//! abstract classes `exception::value`/`exception::operation` did) match on
//! the variant.

use std::fmt;

/// A location in a script's source text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SrcLocation {
    /// Name of the source file; empty if the script did not come from a
    /// file (e.g. stdin or an in-memory string).
    pub file: String,
    /// Line number, starting at 1; `0` means unknown.
    pub line: u32,
    /// Column number, starting at 1; `0` means unknown.
    pub column: u32,
}

impl SrcLocation {
    /// Creates a location with an unknown line and column.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SrcLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.file.is_empty() {
            write!(f, "{}:", self.file)?;
        }
        if self.line != 0 {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "?")
        }
    }
}

/// A single frame of a call stack: where in the source we are, and which
/// function we are in (empty if the frame is the top-level script).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameLocation {
    pub function: String,
    pub loc: SrcLocation,
}

impl FrameLocation {
    pub fn new(function: impl Into<String>, loc: SrcLocation) -> Self {
        Self {
            function: function.into(),
            loc,
        }
    }
}

impl fmt::Display for FrameLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.function.is_empty() {
            write!(f, "{}", self.loc)
        } else {
            write!(f, "{} ({})", self.loc, self.function)
        }
    }
}

/// A call stack trace. The most recently called function (the top of the
/// stack) is at index 0, matching the original engine's convention.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackTrace(pub Vec<FrameLocation>);

impl StackTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds a frame to the top of the trace (called as the exception
    /// unwinds through each stack frame).
    pub fn push(&mut self, frame: FrameLocation) {
        self.0.push(frame);
    }

    /// The innermost (most recent) frame, if any.
    pub fn top(&self) -> Option<&FrameLocation> {
        self.0.first()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.0 {
            writeln!(f, "    at {frame}")?;
        }
        Ok(())
    }
}

/// The flat ThreadScript exception taxonomy.
///
/// Every variant corresponds 1:1 to a leaf class in the original engine's
/// `exception::` namespace. Display text matches the original's message
/// text ("Allocation failed", "Symbol not found: NAME", ...) so that a
/// driver printing `to_string()` reproduces the same one-line diagnostics.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Allocation failed")]
    AllocBad,
    #[error("Allocation denied by limit")]
    AllocLimit,

    #[error("Symbol not found: {0}")]
    UnknownSymbol(String),

    #[error("Bad value")]
    ValueBad,
    #[error("Value is null")]
    ValueNull,
    #[error("Value is read-only")]
    ValueReadOnly,
    #[error("Bad value type")]
    ValueType,
    #[error("Value out of range")]
    ValueOutOfRange,
    #[error("Value is not thread-safe")]
    ValueMtUnsafe,

    #[error("Bad operation")]
    OpBad,
    #[error("Bad number of arguments")]
    OpNarg,
    #[error("Recursion too deep")]
    OpRecursion,
    #[error("Overflow")]
    OpOverflow,
    #[error("Division by zero")]
    OpDivZero,
    #[error("Library failure")]
    OpLibrary,
    #[error("Operation would block")]
    OpWouldBlock,
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("{0}")]
    ScriptException(String),

    #[error("Wrapped error: {0}")]
    Wrapped(String),
}

/// A ThreadScript exception: an [`ErrorKind`] plus the stack trace recorded
/// as it unwound through the tree walker.
///
/// The bottom-most throw site tags the trace only if it was still empty
/// (the original's `base::base(msg, trace)` behavior) — frames are appended
/// by [`ThreadScriptError::add_frame`] as the error propagates outward, so
/// the trace reads top-of-stack-first once fully unwound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadScriptError {
    pub kind: ErrorKind,
    pub trace: StackTrace,
}

impl fmt::Display for ThreadScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(frame) = self.trace.top() {
            write!(f, "{frame}: ")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for ThreadScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl ThreadScriptError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            trace: StackTrace::new(),
        }
    }

    pub fn with_trace(kind: ErrorKind, trace: StackTrace) -> Self {
        Self { kind, trace }
    }

    /// Adds a frame as the error unwinds through a stack frame. Mirrors the
    /// original's "each frame adds itself to the trace on first emission".
    pub fn add_frame(&mut self, frame: FrameLocation) {
        self.trace.push(frame);
    }

    /// Prints the one-line message followed by the full multi-line trace,
    /// the way a driver without `-q` would.
    pub fn pretty(&self) -> String {
        format!("{}\n{}", self.kind, self.trace)
    }

    pub fn is_kind(&self, kind: &ErrorKind) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(kind)
    }

    /// The kind name as used by the script-level `try` builtin's catch
    /// clause (e.g. `"value_type"`, `"op_div_zero"`).
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ErrorKind::ParseError(_) => "parse_error",
            ErrorKind::AllocBad => "alloc_bad",
            ErrorKind::AllocLimit => "alloc_limit",
            ErrorKind::UnknownSymbol(_) => "unknown_symbol",
            ErrorKind::ValueBad => "value_bad",
            ErrorKind::ValueNull => "value_null",
            ErrorKind::ValueReadOnly => "value_read_only",
            ErrorKind::ValueType => "value_type",
            ErrorKind::ValueOutOfRange => "value_out_of_range",
            ErrorKind::ValueMtUnsafe => "value_mt_unsafe",
            ErrorKind::OpBad => "op_bad",
            ErrorKind::OpNarg => "op_narg",
            ErrorKind::OpRecursion => "op_recursion",
            ErrorKind::OpOverflow => "op_overflow",
            ErrorKind::OpDivZero => "op_div_zero",
            ErrorKind::OpLibrary => "op_library",
            ErrorKind::OpWouldBlock => "op_would_block",
            ErrorKind::NotImplemented(_) => "not_implemented",
            ErrorKind::ScriptException(_) => "script_exception",
            ErrorKind::Wrapped(_) => "wrapped",
        }
    }

    pub fn parse_error(msg: impl Into<String>, loc: SrcLocation) -> Self {
        let mut trace = StackTrace::new();
        trace.push(FrameLocation::new("", loc));
        Self::with_trace(ErrorKind::ParseError(msg.into()), trace)
    }
}

macro_rules! simple_ctor {
    ($name:ident, $kind:ident) => {
        impl ThreadScriptError {
            pub fn $name() -> Self {
                Self::new(ErrorKind::$kind)
            }
        }
    };
}

simple_ctor!(alloc_bad, AllocBad);
simple_ctor!(alloc_limit, AllocLimit);
simple_ctor!(value_bad, ValueBad);
simple_ctor!(value_null, ValueNull);
simple_ctor!(value_read_only, ValueReadOnly);
simple_ctor!(value_type, ValueType);
simple_ctor!(value_out_of_range, ValueOutOfRange);
simple_ctor!(value_mt_unsafe, ValueMtUnsafe);
simple_ctor!(op_bad, OpBad);
simple_ctor!(op_narg, OpNarg);
simple_ctor!(op_recursion, OpRecursion);
simple_ctor!(op_overflow, OpOverflow);
simple_ctor!(op_div_zero, OpDivZero);
simple_ctor!(op_library, OpLibrary);
simple_ctor!(op_would_block, OpWouldBlock);

impl ThreadScriptError {
    pub fn unknown_symbol(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownSymbol(name.into()))
    }

    pub fn not_implemented(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented(name.into()))
    }

    pub fn script_exception(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ScriptException(msg.into()))
    }

    pub fn wrapped(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Wrapped(msg.into()))
    }
}

/// Convenience alias used throughout the interpreter.
pub type Result<T> = std::result::Result<T, ThreadScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_no_location_prefix_without_trace() {
        let err = ThreadScriptError::op_div_zero();
        assert_eq!(err.to_string(), "Division by zero");
    }

    #[test]
    fn display_prefixes_top_frame_location() {
        let mut err = ThreadScriptError::op_div_zero();
        err.add_frame(FrameLocation::new(
            "f",
            SrcLocation::new("test.ts", 3, 5),
        ));
        assert_eq!(err.to_string(), "test.ts:3:5 (f): Division by zero");
    }

    #[test]
    fn kind_name_matches_script_try_catch_identifiers() {
        assert_eq!(ThreadScriptError::op_narg().kind_name(), "op_narg");
        assert_eq!(
            ThreadScriptError::unknown_symbol("x").kind_name(),
            "unknown_symbol"
        );
    }

    #[test]
    fn parse_error_carries_location_as_top_frame() {
        let err = ThreadScriptError::parse_error("Expected ')'", SrcLocation::new("a.ts", 1, 9));
        assert_eq!(err.trace.top().unwrap().loc.line, 1);
        assert!(err.to_string().contains("Expected ')'"));
    }
}
