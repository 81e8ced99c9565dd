//! ThreadScript Core: allocation accounting and the exception taxonomy
//!
//! This crate provides the two foundational concerns shared by every other
//! part of the interpreter but which do not themselves depend on the value
//! model:
//!
//! - `error`: the flat exception hierarchy (`ThreadScriptError`), source
//!   locations, stack frames and stack traces.
//! - `alloc`: a quota-tracking allocator wrapper used to turn allocation
//!   failures and configured memory limits into ordinary errors instead of
//!   aborting the process.
//!
//! # Modules
//!
//! - `error`: exception kinds and stack traces
//! - `alloc`: allocation accounting and limits

pub mod alloc;
pub mod error;

pub use alloc::{AllocLimits, AllocMetrics, Allocator};
pub use error::{ErrorKind, FrameLocation, Result, SrcLocation, StackTrace, ThreadScriptError};
