//! Prompt + sentinel framing for the interactive LLDB CLI backend.
//!
//! LLDB's REPL gives no machine-readable end-of-output marker, so the
//! backend asks the debugger to print a unique sentinel string after every
//! command and watches the merged stdout/stderr buffer for it.

use regex::Regex;
use std::sync::OnceLock;

pub const PROMPT: &str = "XCODEBUILDMCP_LLDB> ";
pub const SENTINEL: &str = "__XCODEBUILDMCP_DONE__";

fn sentinel_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?:^|\r?\n){}(\r?\n)", regex::escape(SENTINEL))).unwrap()
    })
}

fn error_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)error:").unwrap())
}

/// Accumulates raw bytes from the child process and extracts completed
/// command outputs once the sentinel appears.
#[derive(Default)]
pub struct SentinelBuffer {
    buf: String,
}

impl SentinelBuffer {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.push_str(&String::from_utf8_lossy(bytes));
    }

    /// If the sentinel has appeared, remove and return the sanitized output
    /// that preceded it, trimming a trailing prompt if present.
    pub fn take_completed(&mut self) -> Option<String> {
        let m = sentinel_regex().find(&self.buf)?;
        let raw_output = self.buf[..m.start()].to_string();
        let mut rest = self.buf[m.end()..].to_string();

        // Trim up to (and including) the next prompt, if one has arrived yet.
        if let Some(idx) = rest.find(PROMPT) {
            rest = rest[idx + PROMPT.len()..].to_string();
        }
        self.buf = rest;

        Some(sanitize(&raw_output))
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Drop prompt echoes, the sentinel-print command itself, lines containing
/// the sentinel, and blank lines.
fn sanitize(raw: &str) -> String {
    raw.lines()
        .filter(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return false;
            }
            if trimmed.contains(SENTINEL) {
                return false;
            }
            if trimmed.contains("script print(") {
                return false;
            }
            if trimmed == PROMPT.trim_end() {
                return false;
            }
            true
        })
        .map(|line| line.strip_prefix(PROMPT).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn looks_like_error(output: &str) -> bool {
    error_regex().is_match(output)
}

/// The command used to ask LLDB to emit the sentinel on its own line.
pub fn sentinel_print_command() -> String {
    format!("script print(\"{SENTINEL}\")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_output_before_sentinel() {
        let mut buf = SentinelBuffer::new();
        buf.push(b"Process 4321 attached\n__XCODEBUILDMCP_DONE__\nXCODEBUILDMCP_LLDB> ");
        let out = buf.take_completed().unwrap();
        assert_eq!(out, "Process 4321 attached");
        assert!(buf.is_empty());
    }

    #[test]
    fn sentinel_split_across_chunks_not_detected_until_complete() {
        let mut buf = SentinelBuffer::new();
        buf.push(b"some output\n__XCODEBUILDMCP_DO");
        assert!(buf.take_completed().is_none());
        buf.push(b"NE__\nXCODEBUILDMCP_LLDB> ");
        let out = buf.take_completed().unwrap();
        assert_eq!(out, "some output");
    }

    #[test]
    fn strips_sentinel_print_and_blank_lines() {
        let mut buf = SentinelBuffer::new();
        buf.push(b"breakpoint set --file \"/a.c\" --line 10\nBreakpoint 1: where = a.c:10\n\nscript print(\"__XCODEBUILDMCP_DONE__\")\n__XCODEBUILDMCP_DONE__\nXCODEBUILDMCP_LLDB> ");
        let out = buf.take_completed().unwrap();
        assert_eq!(out, "breakpoint set --file \"/a.c\" --line 10\nBreakpoint 1: where = a.c:10");
    }

    #[test]
    fn detects_error_case_insensitive() {
        assert!(looks_like_error("Error: unable to attach"));
        assert!(looks_like_error("error: no such process"));
        assert!(!looks_like_error("Process 4321 attached"));
    }
}
