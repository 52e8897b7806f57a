//! # Introduction
//!
//! pytrace runs a Python program one statement at a time and records, for
//! every line of the user's code, the console output, the variables in scope,
//! an object graph of everything they reference and the live call stack. The
//! recorded trace is then navigated forward and backward through a terminal
//! UI built with [ratatui](https://docs.rs/ratatui), or emitted as JSON.
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Lexer → Parser → AST → Interpreter ⇄ Tracer hook → Steps → TUI / JSON
//! ```
//!
//! 1. [`parser`]: tokenises the source (with INDENT/DEDENT) and builds an AST.
//! 2. [`interpreter`]: walks the AST and announces every line, call and return
//!    to an [`interpreter::ExecutionHook`].
//! 3. [`memory`]: Python values, the object heap, scopes and frames.
//! 4. [`tracer`]: the hook that records [`tracer::Step`]s, the object graph
//!    extractor, the call log and the [`tracer::Session`] that suspends on
//!    `input()` and resumes by replaying earlier answers.
//! 5. [`config`]: recording limits, loadable from TOML.
//! 6. [`ui`]: ratatui-based TUI; not part of the stable library API.
//!
//! ## Supported Python subset
//!
//! Functions with defaults, `*args`/`**kwargs` and closures, classes with
//! inheritance, `super()`, static and class methods, exceptions, comprehensions,
//! f-strings, slicing, and the builtin containers. The `math`, `collections`
//! and a small `numpy` module are built in.

pub mod config;
pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod tracer;
pub mod ui;
