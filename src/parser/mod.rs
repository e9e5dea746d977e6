//! Runner output parsing.
//!
//! Reads a captured output file and pulls out the two things the engine
//! cares about: the completion promise and token usage. Parsing is total:
//! unreadable or malformed input degrades to `None`, never an error.

mod promise;
mod session;

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::UsageTotals;

pub use promise::extract_promise;
pub use session::extract_usage;

/// Suffix of the optional session log written next to a runner's output.
pub const SESSION_LOG_SUFFIX: &str = ".session.jsonl";

/// What was found in one runner's output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub promise: Option<String>,
    pub usage: Option<UsageTotals>,
}

/// Parse a runner output file.
///
/// Usage embedded in the output takes precedence; the companion session log
/// (`<output>.session.jsonl`) is consulted only when the output has none.
pub fn parse(output_path: &Path) -> ParsedOutput {
    let text = match read_lossy(output_path) {
        Some(text) => text,
        None => {
            debug!("No readable output at {}", output_path.display());
            return ParsedOutput::default();
        }
    };

    let promise = extract_promise(&text);
    let usage = extract_usage(&text).or_else(|| {
        read_lossy(&session_log_path(output_path)).and_then(|log| extract_usage(&log))
    });

    ParsedOutput { promise, usage }
}

/// Path of the companion session log for an output file.
pub fn session_log_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_os_string();
    name.push(SESSION_LOG_SUFFIX);
    PathBuf::from(name)
}

fn read_lossy(path: &Path) -> Option<String> {
    fs::read(path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_missing_file() {
        let parsed = parse(Path::new("/nonexistent/superloop/output.log"));
        assert_eq!(parsed, ParsedOutput::default());
    }

    #[test]
    fn test_parse_promise_and_usage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.log");
        fs::write(
            &path,
            "working...\n{\"type\":\"result\",\"usage\":{\"input_tokens\":100,\"output_tokens\":50}}\n<promise>SUPERLOOP_COMPLETE</promise>\n",
        )
        .unwrap();

        let parsed = parse(&path);
        assert_eq!(parsed.promise.as_deref(), Some("SUPERLOOP_COMPLETE"));
        assert_eq!(parsed.usage.unwrap().input_tokens, 100);
    }

    #[test]
    fn test_parse_companion_session_log() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.log");
        fs::write(&path, "no usage here\n").unwrap();
        fs::write(
            session_log_path(&path),
            "{\"usage\":{\"input_tokens\":7,\"output_tokens\":3}}\n",
        )
        .unwrap();

        let parsed = parse(&path);
        assert!(parsed.promise.is_none());
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.input_tokens, 7);
        assert_eq!(usage.output_tokens, 3);
    }

    #[test]
    fn test_parse_binary_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        fs::write(&path, [0u8, 159, 146, 150, b'<', b'p', b'r', 0xff]).unwrap();

        let parsed = parse(&path);
        assert_eq!(parsed, ParsedOutput::default());
    }

    #[test]
    fn test_session_log_path() {
        assert_eq!(
            session_log_path(Path::new("logs/iter-0-planner.log")),
            PathBuf::from("logs/iter-0-planner.log.session.jsonl")
        );
    }
}
