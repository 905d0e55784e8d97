//! Corrected-Dockerfile extraction from analysis text.

use regex::Regex;
use std::sync::OnceLock;

/// Instruction every extracted Dockerfile must start with
pub const REQUIRED_FIRST_INSTRUCTION: &str = "FROM";

/// First fenced block: an opening fence at line start with an optional label,
/// then everything up to the next fence at line start.
fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?ms)^[ \t]*```[^\n`]*\r?\n(.*?)^[ \t]*```").ok())
        .as_ref()
}

/// Extract the corrected Dockerfile from analysis text
///
/// Takes the first fenced block, trims surrounding blank lines, and returns it
/// only if it starts with `FROM`. Never fails; `None` means no usable
/// Dockerfile was produced.
pub fn extract_dockerfile(text: &str) -> Option<String> {
    let captures = fence_pattern()?.captures(text)?;
    let block = captures.get(1)?.as_str().trim();

    if block.starts_with(REQUIRED_FIRST_INSTRUCTION) {
        Some(block.to_string())
    } else {
        None
    }
}
