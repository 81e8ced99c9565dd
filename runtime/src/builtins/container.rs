//! Free-standing container indexing (§4.4's `at`/`size`), for the plain
//! `vector`/`hash`/`string` value variants. `shared_vector`/`shared_hash`
//! expose their own `at`/`size` through [`crate::value::ObjectValue`]
//! method dispatch (`crate::shared_vector`, `crate::shared_hash`) rather
//! than through these free functions.
//!
//! `string` is indexed and sized by Unicode scalar value, not by byte — the
//! value model's `String` is a validated Rust `String`, so byte-level
//! indexing could split a multi-byte character; char indexing keeps `at`
//! and `size` mutually consistent at the cost of exact parity with the
//! original engine's byte-oriented `std::string`.

use std::sync::Arc;

use threadscript_core::{Result, ThreadScriptError};

use crate::builtins::util::account_growth;
use crate::code::CodeNode;
use crate::state::ThreadState;
use crate::symbol::SymbolTable;
use crate::value::Value;

pub fn f_at(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let narg = node.narg();
    if narg != 2 && narg != 3 {
        return Err(ThreadScriptError::op_narg());
    }
    let container = thread.arg(l_vars, node, 0)?;
    match &container {
        Value::Vector(cell) => {
            let idx = thread.arg(l_vars, node, 1)?.expect_index()?;
            if narg == 3 {
                let value = thread.arg(l_vars, node, 2)?;
                if !value.is_null() && !value.mt_safe() {
                    return Err(ThreadScriptError::value_mt_unsafe());
                }
                let old_len = cell.with(|v| v.len());
                if idx >= old_len {
                    account_growth(thread, (idx + 1 - old_len) as u64)?;
                }
                cell.with_mut(|v| {
                    if idx >= v.len() {
                        v.resize(idx + 1, Value::Null);
                    }
                    v[idx] = value.clone();
                })?;
                Ok(value)
            } else {
                cell.with(|v| v.get(idx).cloned())
                    .ok_or_else(ThreadScriptError::value_out_of_range)
            }
        }
        Value::Hash(cell) => {
            let key = thread.arg(l_vars, node, 1)?.expect_string()?;
            if narg == 3 {
                let value = thread.arg(l_vars, node, 2)?;
                if !value.is_null() && !value.mt_safe() {
                    return Err(ThreadScriptError::value_mt_unsafe());
                }
                let is_new_key = cell.with(|h| !h.contains_key(&key));
                if is_new_key {
                    account_growth(thread, 1)?;
                }
                cell.with_mut(|h| {
                    h.insert(key, value.clone());
                })?;
                Ok(value)
            } else {
                cell.with(|h| h.get(&key).cloned())
                    .ok_or_else(ThreadScriptError::value_out_of_range)
            }
        }
        Value::String(cell) => {
            let idx = thread.arg(l_vars, node, 1)?.expect_index()?;
            if narg == 3 {
                let value = thread.arg(l_vars, node, 2)?;
                let repl = value.expect_string()?;
                if repl.chars().count() != 1 {
                    return Err(ThreadScriptError::value_type());
                }
                let repl_char = repl.chars().next().expect("checked above");
                let old_char = cell
                    .with(|s| s.chars().nth(idx))
                    .ok_or_else(ThreadScriptError::value_out_of_range)?;
                let new_bytes = repl_char.len_utf8();
                let old_bytes = old_char.len_utf8();
                if new_bytes > old_bytes {
                    account_growth(thread, (new_bytes - old_bytes) as u64)?;
                }
                let set = cell.with_mut(|s| {
                    let mut chars: Vec<char> = s.chars().collect();
                    if idx >= chars.len() {
                        return Err(ThreadScriptError::value_out_of_range());
                    }
                    chars[idx] = repl_char;
                    *s = chars.into_iter().collect();
                    Ok(())
                })?;
                set?;
                Ok(value)
            } else {
                cell.with(|s| s.chars().nth(idx))
                    .map(|c| Value::new_literal_string(c.to_string()))
                    .ok_or_else(ThreadScriptError::value_out_of_range)
            }
        }
        Value::Null => Err(ThreadScriptError::value_null()),
        _ => Err(ThreadScriptError::value_type()),
    }
}

pub fn f_size(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 1 {
        return Err(ThreadScriptError::op_narg());
    }
    let v = thread.arg(l_vars, node, 0)?;
    let n = match &v {
        Value::Vector(cell) => cell.with(|v| v.len()),
        Value::Hash(cell) => cell.with(|h| h.len()),
        Value::String(cell) => cell.with(|s| s.chars().count()),
        Value::Null => return Err(ThreadScriptError::value_null()),
        _ => return Err(ThreadScriptError::value_type()),
    };
    Ok(Value::new_unsigned(n as u64))
}
