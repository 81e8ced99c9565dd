//! The canonical grammar (§4.7), the only syntax variant this workspace
//! registers (per the Non-goal against a second grammar variant).
//!
//! ```text
//! script   := space* node space* EOF
//! node     := node_val | node_fun
//! node_val := 'null' | 'false' | 'true' | uint | ('+'|'-') uint | string
//! node_fun := id space* '(' space* (')' | params)
//! params   := node space* (')' | ',' space* params)
//! string   := '"' (lit_char | esc)* '"'
//! esc      := '\' ( '0'|'t'|'n'|'r'|'"'|'\\' | ('x'|'X') hex hex )
//! id       := [_A-Za-z] [_A-Za-z0-9]*
//! uint     := [0-9]+
//! ```
//!
//! Backtrackable attempts (`try_node_val`, the `id '('` prefix of
//! `node_fun`) return `None` on mismatch without raising; once a production
//! has committed (an opening `"` or a matched `id '('`), any further
//! failure raises [`ThreadScriptError::parse_error`] carrying the file,
//! line and column of the failure.
//!
//! `\xHH` escapes decode to a single Unicode scalar value in the `0..=255`
//! range rather than a raw byte — the value model's `string` is a
//! UTF-8-validated Rust `String` (see `crate::value`), not the original
//! engine's raw `std::string`, so a `\xFF` escape becomes `U+00FF` instead
//! of an unpaired byte.

use std::sync::Arc;

use threadscript_core::{Result, SrcLocation, ThreadScriptError};

use super::combinator::{lit, Cursor};
use crate::code::{CodeNode, Script, ScriptBuilder};
use crate::value::Value;

/// Parses `src` (named `file` for diagnostics) under the canonical grammar.
pub fn parse(src: &str, file: &str) -> Result<Script> {
    let bytes = src.as_bytes();
    let cur = skip_space(Cursor::new(bytes));
    let builder = ScriptBuilder::create_script(file);
    let cur = parse_node(cur, file, &builder, None)?;
    let cur = skip_space(cur);
    if !cur.is_eof() {
        return Err(ThreadScriptError::parse_error(
            "Expected end of input",
            loc_at(cur, file),
        ));
    }
    builder.finish()
}

fn loc_at(cur: Cursor<'_>, file: &str) -> SrcLocation {
    SrcLocation::new(file, cur.line, cur.col)
}

fn skip_space(mut cur: Cursor<'_>) -> Cursor<'_> {
    loop {
        match cur.peek() {
            Some(b) if b.is_ascii_whitespace() => {
                cur.advance();
            }
            Some(b'#') => {
                while let Some(b) = cur.peek() {
                    if b == b'\n' {
                        break;
                    }
                    cur.advance();
                }
            }
            _ => break,
        }
    }
    cur
}

fn parse_id<'a>(cur: Cursor<'a>) -> Option<(Cursor<'a>, String)> {
    let mut probe = cur;
    let first = probe.peek()?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut name = String::new();
    name.push(first as char);
    probe.advance();
    while let Some(b) = probe.peek() {
        if b.is_ascii_alphanumeric() || b == b'_' {
            name.push(b as char);
            probe.advance();
        } else {
            break;
        }
    }
    Some((probe, name))
}

fn parse_uint_digits<'a>(cur: Cursor<'a>) -> Option<(Cursor<'a>, String)> {
    let mut probe = cur;
    let mut digits = String::new();
    while let Some(b) = probe.peek() {
        if b.is_ascii_digit() {
            digits.push(b as char);
            probe.advance();
        } else {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        Some((probe, digits))
    }
}

fn hex_digit(b: u8) -> Option<u32> {
    (b as char).to_digit(16)
}

fn parse_string_body<'a>(mut cur: Cursor<'a>, file: &str) -> Result<(Cursor<'a>, String)> {
    cur.advance(); // the opening quote, already peeked by the caller
    let mut out = String::new();
    loop {
        match cur.peek() {
            None => {
                return Err(ThreadScriptError::parse_error(
                    "Unterminated string literal",
                    loc_at(cur, file),
                ))
            }
            Some(b'"') => {
                cur.advance();
                break;
            }
            Some(b'\\') => {
                cur.advance();
                match cur.peek() {
                    Some(b'0') => {
                        out.push('\0');
                        cur.advance();
                    }
                    Some(b't') => {
                        out.push('\t');
                        cur.advance();
                    }
                    Some(b'n') => {
                        out.push('\n');
                        cur.advance();
                    }
                    Some(b'r') => {
                        out.push('\r');
                        cur.advance();
                    }
                    Some(b'"') => {
                        out.push('"');
                        cur.advance();
                    }
                    Some(b'\\') => {
                        out.push('\\');
                        cur.advance();
                    }
                    Some(b'x') | Some(b'X') => {
                        cur.advance();
                        let hi = cur
                            .peek()
                            .and_then(hex_digit)
                            .ok_or_else(|| ThreadScriptError::parse_error("Expected hex digit", loc_at(cur, file)))?;
                        cur.advance();
                        let lo = cur
                            .peek()
                            .and_then(hex_digit)
                            .ok_or_else(|| ThreadScriptError::parse_error("Expected hex digit", loc_at(cur, file)))?;
                        cur.advance();
                        let byte = (hi * 16 + lo) as u8;
                        out.push(byte as char);
                    }
                    _ => {
                        return Err(ThreadScriptError::parse_error(
                            "Invalid escape sequence",
                            loc_at(cur, file),
                        ))
                    }
                }
            }
            Some(b) => {
                out.push(b as char);
                cur.advance();
            }
        }
    }
    Ok((cur, out))
}

/// Tries `node_val`. Returns `Ok(None)` (no side effect) if nothing at
/// `cur` looks like a literal; raises only once a string's opening quote
/// has been consumed and something afterward goes wrong.
fn try_node_val<'a>(
    cur: Cursor<'a>,
    file: &str,
    builder: &ScriptBuilder,
) -> Result<Option<(Cursor<'a>, Value)>> {
    if let Some(next) = lit("null")(cur) {
        return Ok(Some((next, builder.create_value_null())));
    }
    if let Some(next) = lit("false")(cur) {
        return Ok(Some((next, builder.create_value_bool(false))));
    }
    if let Some(next) = lit("true")(cur) {
        return Ok(Some((next, builder.create_value_bool(true))));
    }
    if let Some((next, digits)) = parse_uint_digits(cur) {
        let n: u64 = digits
            .parse()
            .map_err(|_| ThreadScriptError::parse_error("Integer literal out of range", loc_at(cur, file)))?;
        return Ok(Some((next, builder.create_value_unsigned(n))));
    }
    if matches!(cur.peek(), Some(b'+') | Some(b'-')) {
        let neg = cur.peek() == Some(b'-');
        let mut after_sign = cur;
        after_sign.advance();
        if let Some((next, digits)) = parse_uint_digits(after_sign) {
            let magnitude: u64 = digits.parse().map_err(|_| {
                ThreadScriptError::parse_error("Integer literal out of range", loc_at(cur, file))
            })?;
            let signed: i128 = if neg {
                -(magnitude as i128)
            } else {
                magnitude as i128
            };
            if signed < i64::MIN as i128 || signed > i64::MAX as i128 {
                return Err(ThreadScriptError::parse_error(
                    "Integer literal out of range",
                    loc_at(cur, file),
                ));
            }
            return Ok(Some((next, builder.create_value_int(signed as i64))));
        }
    }
    if cur.peek() == Some(b'"') {
        let (next, s) = parse_string_body(cur, file)?;
        return Ok(Some((next, builder.create_value_string(s))));
    }
    Ok(None)
}

/// Tries `node_fun`'s `id space* '('` prefix; once matched, the call is
/// committed and any further grammar violation raises.
fn try_node_fun<'a>(
    cur: Cursor<'a>,
    file: &str,
    builder: &ScriptBuilder,
    parent: Option<&Arc<CodeNode>>,
) -> Result<Option<Cursor<'a>>> {
    let loc = loc_at(cur, file);
    let Some((after_id, name)) = parse_id(cur) else {
        return Ok(None);
    };
    let after_space = skip_space(after_id);
    let Some(after_paren) = lit("(")(after_space) else {
        return Ok(None);
    };

    let node = builder.add_node(parent, loc, name, None)?;
    let mut cur = skip_space(after_paren);
    if let Some(next) = lit(")")(cur) {
        return Ok(Some(next));
    }
    loop {
        cur = parse_node(cur, file, builder, Some(&node))?;
        cur = skip_space(cur);
        if let Some(next) = lit(")")(cur) {
            cur = next;
            break;
        } else if let Some(next) = lit(",")(cur) {
            cur = skip_space(next);
        } else {
            return Err(ThreadScriptError::parse_error("Expected ',' or ')'", loc_at(cur, file)));
        }
    }
    Ok(Some(cur))
}

fn parse_node<'a>(
    cur: Cursor<'a>,
    file: &str,
    builder: &ScriptBuilder,
    parent: Option<&Arc<CodeNode>>,
) -> Result<Cursor<'a>> {
    let loc = loc_at(cur, file);
    if let Some((next, value)) = try_node_val(cur, file, builder)? {
        builder.add_node(parent, loc, "", Some(value))?;
        return Ok(next);
    }
    if let Some(next) = try_node_fun(cur, file, builder, parent)? {
        return Ok(next);
    }
    Err(ThreadScriptError::parse_error("Expected a value or function call", loc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_literal() {
        let script = parse("42", "t.ts").unwrap();
        assert_eq!(script.root.name, "");
        let value = script.root.bound_value().unwrap();
        assert_eq!(value.type_name(), "unsigned");
        assert_eq!(value.expect_index().unwrap(), 42);
    }

    #[test]
    fn parses_signed_int() {
        let script = parse("-7", "t.ts").unwrap();
        assert_eq!(script.root.bound_value().unwrap().expect_int().unwrap(), -7);
    }

    #[test]
    fn parses_nested_call_with_whitespace_and_comments() {
        let src = "print( # greet\n  \"hi\" , 1 )";
        let script = parse(src, "t.ts").unwrap();
        assert_eq!(script.root.name, "print");
        let children = script.root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].bound_value().unwrap().expect_string().unwrap(), "hi");
        assert_eq!(children[1].bound_value().unwrap().expect_index().unwrap(), 1);
    }

    #[test]
    fn parses_hex_escape_in_string() {
        let script = parse(r#""a\x41b""#, "t.ts").unwrap();
        assert_eq!(
            script.root.bound_value().unwrap().expect_string().unwrap(),
            "aAb"
        );
    }

    #[test]
    fn missing_closing_paren_is_a_parse_error() {
        let err = parse("print(1", "t.ts").unwrap_err();
        assert!(matches!(err.kind, threadscript_core::ErrorKind::ParseError(_)));
    }

    #[test]
    fn trailing_garbage_after_script_is_a_parse_error() {
        let err = parse("1 2", "t.ts").unwrap_err();
        assert!(matches!(err.kind, threadscript_core::ErrorKind::ParseError(_)));
    }
}
