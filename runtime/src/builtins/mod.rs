//! The built-in function library (§4.4) and the global symbol table it
//! populates.
//!
//! Grounded on the original engine's `add_predef_symbols`/`predef::factory`
//! pattern (`predef_impl.hpp`): a flat table of name → native-function
//! pointer, installed into a fresh root [`SymbolTable`] that becomes a
//! [`Vm`](crate::state::Vm)'s initial shared-globals snapshot.

mod arith;
mod container;
mod core;
pub(crate) mod util;

use std::sync::Arc;

use crate::symbol::SymbolTable;
use crate::value::{NativeFn, NativeFunctionValue, Value};

const BUILTINS: &[(&str, NativeFn)] = &[
    ("seq", core::f_seq),
    ("if", core::f_if),
    ("while", core::f_while),
    ("var", core::f_var),
    ("gvar", core::f_gvar),
    ("fun", core::f_fun),
    ("bool", core::f_bool),
    ("clone", core::f_clone),
    ("mt_safe", core::f_mt_safe),
    ("is_mt_safe", core::f_is_mt_safe),
    ("is_null", core::f_is_null),
    ("is_same", core::f_is_same),
    ("type", core::f_type),
    ("print", core::f_print),
    ("throw", core::f_throw),
    ("try", core::f_try),
    ("channel", core::f_channel),
    ("shared_vector", core::f_shared_vector),
    ("shared_hash", core::f_shared_hash),
    ("add", arith::f_add),
    ("sub", arith::f_sub),
    ("mul", arith::f_mul),
    ("div", arith::f_div),
    ("mod", arith::f_mod),
    ("eq", arith::f_eq),
    ("ne", arith::f_ne),
    ("lt", arith::f_lt),
    ("le", arith::f_le),
    ("gt", arith::f_gt),
    ("ge", arith::f_ge),
    ("and", arith::f_and),
    ("or", arith::f_or),
    ("not", arith::f_not),
    ("at", container::f_at),
    ("size", container::f_size),
];

/// Builds a fresh root symbol table with every required builtin bound.
/// Typically installed once via [`crate::state::Vm::publish_globals`].
pub fn predef_symbols() -> Arc<SymbolTable> {
    let table = Arc::new(SymbolTable::root());
    for (name, func) in BUILTINS {
        table.insert_or_assign(
            name.to_string(),
            Value::NativeFunction(Arc::new(NativeFunctionValue { name, func: *func })),
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predef_symbols_binds_every_builtin_name() {
        let table = predef_symbols();
        for (name, _) in BUILTINS {
            assert!(table.lookup(name, false).is_some(), "missing {name}");
        }
    }
}
