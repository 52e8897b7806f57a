//! Frame origin classification
//!
//! Every frame carries the file it comes from. Frames running the submission
//! report [`USER_SUBMISSION_MARKER`]; frames the tracer pushes (the session
//! entry frame, the input interceptor) report a file under
//! [`TRACER_LIBRARY_ROOT`]; frames the engine pushes for builtins that call back
//! into user code report a file under [`ENGINE_LIBRARY_ROOT`].

use crate::interpreter::constants::{ENGINE_LIBRARY_ROOT, USER_SUBMISSION_MARKER};

/// Directory holding the tracer's own source files
pub const TRACER_LIBRARY_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/tracer");

/// Directory holding the terminal front-end
pub const FRONTEND_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/ui");

const BINARY_ENTRY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/main.rs");

/// Tracer routines that show up as frames while a program runs
pub const INTERNAL_ROUTINES: &[&str] = &[
    "run_session",
    "read_input",
    "record_step",
    "on_line",
    "on_call",
    "on_return",
];

/// Engine files that implement the instrumentation protocol itself
const HOOK_PROTOCOL_FILES: &[&str] = &["hooks.rs", "engine.rs", "io.rs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    User,
    TracerInternal,
    EngineInternal,
    /// Anything else; hidden from user-facing views
    External,
}

impl FrameOrigin {
    pub fn classify(origin: &str, routine: &str) -> FrameOrigin {
        if origin.starts_with(TRACER_LIBRARY_ROOT) && INTERNAL_ROUTINES.contains(&routine) {
            FrameOrigin::TracerInternal
        } else if origin.starts_with(ENGINE_LIBRARY_ROOT) {
            FrameOrigin::EngineInternal
        } else if origin == USER_SUBMISSION_MARKER {
            FrameOrigin::User
        } else {
            FrameOrigin::External
        }
    }

    pub fn is_user(self) -> bool {
        self == FrameOrigin::User
    }
}

/// Generic label replacing a file reference in user-facing failure text
pub fn location_label(path: &str) -> String {
    if path == USER_SUBMISSION_MARKER {
        return "Your Code".to_string();
    }
    let file = file_name(path);
    if path.starts_with(TRACER_LIBRARY_ROOT) {
        format!("<Debugger Internals ({})>", file)
    } else if path.starts_with(ENGINE_LIBRARY_ROOT) {
        if HOOK_PROTOCOL_FILES.contains(&file) {
            format!("<Tracing Library ({})>", file)
        } else {
            format!("<Engine Internals ({})>", file)
        }
    } else if path.starts_with(FRONTEND_ROOT) || path == BINARY_ENTRY {
        format!("<Front-end Internals ({})>", file)
    } else {
        format!("<External Code ({})>", file)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let recorder = format!("{}/recorder.rs", TRACER_LIBRARY_ROOT);
        let engine = format!("{}/builtins.rs", ENGINE_LIBRARY_ROOT);
        assert_eq!(FrameOrigin::classify("<string>", "<module>"), FrameOrigin::User);
        assert_eq!(FrameOrigin::classify(&recorder, "read_input"), FrameOrigin::TracerInternal);
        assert_eq!(FrameOrigin::classify(&engine, "sorted"), FrameOrigin::EngineInternal);
        assert_eq!(FrameOrigin::classify("/usr/lib/other.rs", "f"), FrameOrigin::External);
    }

    #[test]
    fn test_tracer_file_outside_allowlist_is_external() {
        let session = format!("{}/session.rs", TRACER_LIBRARY_ROOT);
        assert_eq!(FrameOrigin::classify(&session, "helper"), FrameOrigin::External);
    }

    #[test]
    fn test_labels_hide_paths() {
        assert_eq!(location_label("<string>"), "Your Code");
        assert_eq!(
            location_label(&format!("{}/session.rs", TRACER_LIBRARY_ROOT)),
            "<Debugger Internals (session.rs)>"
        );
        assert_eq!(
            location_label(&format!("{}/hooks.rs", ENGINE_LIBRARY_ROOT)),
            "<Tracing Library (hooks.rs)>"
        );
        assert_eq!(
            location_label(&format!("{}/builtins.rs", ENGINE_LIBRARY_ROOT)),
            "<Engine Internals (builtins.rs)>"
        );
        assert_eq!(location_label("/opt/lib/thing.py"), "<External Code (thing.py)>");
    }
}
