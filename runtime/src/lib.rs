//! ThreadScript: an embeddable interpreter for a small dynamically-typed
//! scripting language whose defining feature is safe cooperative
//! multithreading through a one-way, per-value "mt-safe" transition
//! (§3/§4.1). This crate is the whole engine — value model, symbol tables,
//! the parsed code tree, the tree-walking evaluator, the built-in function
//! library, `channel`/`shared_vector`/`shared_hash`, the canonical parser,
//! and the VM/thread-state types a driver calls into. There is no binary
//! here; driving a script from the command line is left to an embedder.
//!
//! Grounded throughout on the original engine's module boundaries
//! (`basic_value`/`basic_symbol_table`/`basic_code_node`/`basic_script`,
//! `predef.hpp`, `channel.hpp`, `shared_vector.hpp`/`shared_hash.hpp`,
//! `basic_virtual_machine`/`basic_state`), reworked into `Arc`/`Mutex`-based
//! shared ownership in place of the original's non-owning raw pointers.

pub mod builtins;
pub mod channel;
pub mod code;
pub mod config;
pub mod eval;
pub mod parser;
pub mod resolver;
pub mod shared_hash;
pub mod shared_vector;
pub mod state;
pub mod symbol;
pub mod value;

pub use code::{CodeNode, Script, ScriptBuilder};
pub use config::Config;
pub use parser::canon::parse;
pub use resolver::{resolve, unresolve};
pub use state::run::{run_single_phase, run_two_phase, TwoPhaseOutcome, WorkerOutcome};
pub use state::{ThreadState, Vm};
pub use value::Value;

pub use threadscript_core::{ErrorKind, Result, SrcLocation, ThreadScriptError};
