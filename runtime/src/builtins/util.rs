//! Shared helpers for the builtin implementations: the `bool` coercion rule
//! used by `bool`/`if`/`while`/`and`/`or`/`not`, and the "optional
//! destination" result-reuse pattern used by `bool`, `is_mt_safe`, `is_null`,
//! `is_same`, `type`, and the arithmetic builtins (§4.4: "accept a first
//! argument which, if of the expected result type and writable, is reused as
//! the return slot; otherwise a fresh value is allocated").

use threadscript_core::{Result, ThreadScriptError};

use crate::state::ThreadState;
use crate::value::Value;

/// Charges `added` units (vector elements, hash entries, or string bytes)
/// of growth against the calling thread's configured memory budget
/// (`Config::memory_limit`, via [`ThreadState::allocator`]), raising
/// `alloc_limit` if the budget rejects it. A container write that shrinks
/// or replaces in place (`added == 0`) never consults the allocator.
pub fn account_growth(thread: &ThreadState, added: u64) -> Result<()> {
    if added == 0 {
        return Ok(());
    }
    if thread.allocator().allocate(added) {
        Ok(())
    } else {
        Err(ThreadScriptError::alloc_limit())
    }
}

/// `bool`'s coercion rule: `false` stays `false`, any other non-null value
/// becomes `true`, `null` is an error.
pub fn convert_to_bool(v: &Value) -> Result<bool> {
    match v {
        Value::Null => Err(ThreadScriptError::value_null()),
        Value::Bool(cell) => Ok(cell.get()),
        _ => Ok(true),
    }
}

/// Reuses `dest` as the return slot if it is a writable `bool`; otherwise
/// allocates a fresh one.
pub fn reuse_bool(dest: Value, b: bool) -> Value {
    if let Value::Bool(cell) = &dest {
        if cell.with_mut(|v| *v = b).is_ok() {
            return dest;
        }
    }
    Value::new_bool(b)
}

pub fn reuse_string(dest: Value, s: String) -> Value {
    if let Value::String(cell) = &dest {
        if cell.with_mut(|v| *v = s.clone()).is_ok() {
            return dest;
        }
    }
    Value::new_string(s)
}

pub fn reuse_int(dest: Value, i: i64) -> Value {
    if let Value::Int(cell) = &dest {
        if cell.with_mut(|v| *v = i).is_ok() {
            return dest;
        }
    }
    Value::new_int(i)
}
