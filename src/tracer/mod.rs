//! Stepwise execution tracer
//!
//! The tracer observes the interpreter through its [`ExecutionHook`] and
//! records a [`Step`] for every line of user code:
//! - [`render`]: bounded, cycle-safe text rendering of values
//! - [`graph`]: the per-step object graph of everything reachable from the
//!   visible variables
//! - [`origin`]: which frames belong to the user's code
//! - [`calls`]: the call/return event log behind the call tree
//! - [`recorder`]: the [`Tracer`] hook itself
//! - [`session`]: runs, suspension on `input()` and continuation
//! - [`sanitize`]: path-free tracebacks
//!
//! [`translate`] and [`assist`] are the two collaborator boundaries: code
//! translation for foreign-language submissions and the question stream.
//!
//! [`ExecutionHook`]: crate::interpreter::ExecutionHook

pub mod assist;
pub mod calls;
pub mod errors;
pub mod frames;
pub mod graph;
pub mod origin;
pub mod recorder;
pub mod render;
pub mod sanitize;
pub mod session;
pub mod step;
pub mod translate;

pub use calls::{CallEvent, CallId};
pub use errors::{TraceError, TranslateError};
pub use graph::{GraphNode, VizType};
pub use recorder::Tracer;
pub use session::{RunRequest, RunResponse, Session, SessionState};
pub use step::{FrameView, StackInfo, Step};
