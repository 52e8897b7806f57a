// Constants for the Python interpreter

/// Address of the first heap object
/// Heap identities start at 0x10000000 so rendered addresses look like real ones
pub const HEAP_ADDRESS_START: u64 = 0x1000_0000;

/// Distance between consecutive heap identities
pub const OBJECT_ALIGN: u64 = 0x20;

/// Origin marker of frames running the submitted source
pub const USER_SUBMISSION_MARKER: &str = "<string>";

/// Directory holding the engine's own source files. Frames pushed by builtins
/// that call back into user code report an origin under this root.
pub const ENGINE_LIBRARY_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/interpreter");

/// Default limit on nested user calls before `RecursionError`
pub const DEFAULT_MAX_CALL_DEPTH: usize = 100;

/// Module name the submitted source runs as
pub const MAIN_MODULE_NAME: &str = "__main__";
