//! Python interpreter execution engine
//!
//! This module provides the tree-walking interpreter the tracer drives:
//! - [`engine`]: the [`Interpreter`] with its frames, name resolution and
//!   exception plumbing
//! - [`hooks`]: the [`ExecutionHook`] observer protocol
//! - [`io`]: the [`Console`] that `print` and `input` go through
//! - [`errors`]: runtime errors, exceptions and unwinding
//! - [`format`]: `repr`/`str` rendering and format specs
//!
//! # Execution Model
//!
//! Statements execute one at a time. Before each statement the engine records
//! the line in the current frame and notifies the hook, which may stop the run.
//! Frame entries and exits are announced the same way, including the frames of
//! builtins such as `sorted` that call back into user code.
//!
//! # Built-in Functions
//!
//! Builtins, methods of builtin types and the bundled `math`, `collections`
//! and `numpy` modules are implemented directly in the engine.

mod attributes;
mod builtins;
mod calls;
pub mod constants;
mod containers;
pub mod engine;
pub mod errors;
mod expressions;
pub mod format;
pub mod hooks;
pub mod io;
mod iteration;
mod methods;
pub(crate) mod modules;
mod ops;
mod statements;

pub use engine::{EntryFrame, Interpreter};
pub use errors::{Exception, ExceptionValue, Halt, RuntimeError, TraceEntry, Unwind};
pub use hooks::{ExecutionHook, FrameRef, HookAction, InputReply};
pub use io::Console;
