//! TUI pane rendering modules
//!
//! Each pane renders one aspect of the current [`Step`](crate::tracer::Step):
//!
//! - [`source`]: the submitted program with the step's line highlighted
//! - [`terminal`]: console output, plus the prompt line while input is pending
//! - [`stack`]: call stack, variables and the reconstructed call tree
//! - [`graph`]: the step's object graph
//! - [`status`]: status bar with keybindings and run state
//! - `utils`: block styling, scrolling and wrapping shared by the panes

mod utils;

pub mod graph;
pub mod source;
pub mod stack;
pub mod status;
pub mod terminal;

pub use graph::render_graph_pane;
pub use source::{render_source_pane, LineMark, SourceScrollState};
pub use stack::render_stack_pane;
pub use status::{render_status_bar, RunIndicator, StatusRenderData};
pub use terminal::{render_terminal_pane, InputLine};
pub use utils::ScrollState;
