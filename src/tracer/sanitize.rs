//! Traceback sanitizing
//!
//! Failure text handed to callers never contains file-system paths. Each
//! `File "..."` reference is replaced by a generic label (see
//! [`location_label`]) and, for failures raised by user code, the frames
//! leading into the user's code are dropped.

use super::origin::location_label;
use crate::interpreter::constants::USER_SUBMISSION_MARKER;
use regex::Regex;
use std::sync::OnceLock;

fn file_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"File "([^"]+)"(, line \d+, in .*)?"#).expect("valid file reference pattern"))
}

/// Rewrite `raw` so it reveals only user frames.
///
/// The first line is kept verbatim. With `origin_is_user`, lines before the
/// first user frame are dropped; when that would leave no frame at all the
/// whole chain is shown instead.
pub fn sanitize(raw: &str, origin_is_user: bool) -> String {
    let mut lines = raw.lines();
    let Some(first) = lines.next() else {
        return raw.to_string();
    };
    let rest: Vec<&str> = lines.collect();

    let mut out = vec![first.to_string()];
    let mut user_started = false;
    for line in &rest {
        let (line, is_user) = rewrite(line);
        if origin_is_user {
            user_started |= is_user;
            if user_started {
                out.push(line);
            }
        } else {
            out.push(line);
        }
    }

    if origin_is_user && !user_started && !rest.is_empty() {
        return sanitize(raw, false);
    }
    out.join("\n")
}

fn rewrite(line: &str) -> (String, bool) {
    if !line.trim_start().starts_with("File \"") {
        return (line.to_string(), false);
    }
    let Some(captures) = file_reference().captures(line) else {
        return (line.to_string(), false);
    };
    let path = captures.get(1).map_or("", |m| m.as_str());
    let tail = captures.get(2).map_or("", |m| m.as_str());
    let rewritten = format!("  File \"{}\"{}", location_label(path), tail);
    (rewritten, path == USER_SUBMISSION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::constants::ENGINE_LIBRARY_ROOT;
    use crate::tracer::origin::TRACER_LIBRARY_ROOT;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn raw_traceback() -> String {
        format!(
            "Traceback (most recent call last):\n  File \"{tracer}/session.rs\", line 10, in run_session\n  File \"{engine}/engine.rs\", line 20, in exec\n  File \"<string>\", line 3, in <module>\n    f()\n  File \"<string>\", line 1, in f\n    1 / 0\nZeroDivisionError: division by zero",
            tracer = TRACER_LIBRARY_ROOT,
            engine = ENGINE_LIBRARY_ROOT
        )
    }

    #[test]
    fn test_user_origin_drops_leading_frames() {
        assert_eq!(
            sanitize(&raw_traceback(), true),
            "Traceback (most recent call last):\n  File \"Your Code\", line 3, in <module>\n    f()\n  File \"Your Code\", line 1, in f\n    1 / 0\nZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn test_full_chain_is_labelled() {
        let text = sanitize(&raw_traceback(), false);
        assert!(text.contains("File \"<Debugger Internals (session.rs)>\", line 10, in run_session"));
        assert!(text.contains("File \"<Tracing Library (engine.rs)>\", line 20, in exec"));
        assert!(!text.contains(env!("CARGO_MANIFEST_DIR")));
    }

    #[test]
    fn test_falls_back_when_no_user_frame() {
        let raw = format!(
            "Tracer internal error\n  File \"{}/recorder.rs\", line 5, in record_step",
            TRACER_LIBRARY_ROOT
        );
        assert_eq!(
            sanitize(&raw, true),
            "Tracer internal error\n  File \"<Debugger Internals (recorder.rs)>\", line 5, in record_step"
        );
    }

    #[test]
    fn test_single_line_is_unchanged() {
        assert_eq!(sanitize("NameError: name 'x' is not defined", true), "NameError: name 'x' is not defined");
        assert_eq!(sanitize("", false), "");
    }

    proptest! {
        #[test]
        fn prop_never_leaks_paths(dir in "[a-z]{1,8}(/[a-z]{1,8}){1,4}", name in "[a-z]{1,8}\\.rs", line in 1usize..500) {
            let raw = format!(
                "Traceback (most recent call last):\n  File \"/{}/{}\", line {}, in f\nValueError: bad",
                dir, name, line
            );
            let text = sanitize(&raw, true);
            let leaked = format!("/{}/", dir);
            prop_assert!(!text.contains(&leaked));
            prop_assert!(text.starts_with("Traceback (most recent call last):"));
            let expected = format!("<External Code ({})>", name);
            prop_assert!(text.contains(&expected));
        }

        #[test]
        fn prop_first_line_is_verbatim(first in "[^\\n\\r]{1,40}", rest in "[a-z \\n]{0,40}") {
            let raw = format!("{}\n{}", first, rest);
            let text = sanitize(&raw, false);
            prop_assert_eq!(text.lines().next().unwrap_or(""), first.lines().next().unwrap_or(""));
        }
    }
}
