//! Cisco IOS prompt handling.
//!
//! Prompt patterns are adapted from [scrapli](https://github.com/carlmontanari/scrapli).
//!
//! ```text
//! router>                            # exec
//! router#                            # privileged exec
//! router(config)#                    # configuration
//! router(config-if)#                 # configuration sub-mode
//! ```
//!
//! Every pattern is anchored to the very end of the buffer (`\z`), so a line
//! inside command output that happens to end in `#` is never mistaken for
//! the prompt.

use std::sync::LazyLock;

use regex::bytes::Regex;

/// Any IOS prompt at the end of the buffer.
pub static ANY_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?m)^[\w.\-@/:]{1,63}(?:\(config[\w.\-@/:+]{0,32}\))?[>#]\s?\z")
});

/// Exec (`>`) prompt at the end of the buffer.
pub static EXEC_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^[\w.\-@/:]{1,63}>\s?\z"));

/// Privileged exec (`#`, not config) prompt at the end of the buffer.
pub static PRIVILEGED_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^[\w.\-@/:]{1,63}#\s?\z"));

/// Configuration mode prompt at the end of the buffer.
pub static CONFIG_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?m)^[\w.\-@/:]{1,63}\(config[\w.\-@/:+]{0,32}\)#\s?\z")
});

/// Password prompt shown by `enable`.
pub static PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?mi)^password:\s?\z"));

/// Either a prompt or the `enable` password prompt at the end of the buffer.
pub static ENABLE_RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?mi)^(?:password:|[\w.\-@/:]{1,63}[>#])\s?\z")
});

/// Output fragments that mark a rejected command.
pub const FAILURE_MARKERS: &[&str] = &[
    "% Ambiguous command",
    "% Incomplete command",
    "% Invalid input",
    "% Unknown command",
];

/// Commands sent after reaching privileged exec.
pub const ON_OPEN_COMMANDS: &[&str] = &["terminal length 0", "terminal width 511"];

fn compile(pattern: &str) -> Regex {
    // Patterns are literals checked by the tests below.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in prompt pattern: {e}"))
}

/// Strip the command echo and the trailing prompt from raw output.
pub fn normalize_output(raw: &str, command: &str) -> String {
    let raw = raw.replace("\r\n", "\n").replace('\r', "");
    let output = raw
        .trim_start_matches('\n')
        .strip_prefix(command)
        .unwrap_or(raw.as_str())
        .trim_start_matches('\n');

    // The last line is the prompt that ended the read.
    match output.rfind('\n') {
        Some(pos) => output[..pos].trim_end().to_string(),
        None if ANY_PROMPT.is_match(output.as_bytes()) => String::new(),
        None => output.trim_end().to_string(),
    }
}

/// Return the first failure marker present in `output`.
pub fn detect_failure(output: &str) -> Option<&'static str> {
    FAILURE_MARKERS
        .iter()
        .find(|marker| output.contains(**marker))
        .copied()
}
