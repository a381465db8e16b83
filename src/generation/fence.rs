//! Removal of a markdown code fence wrapped around a backend answer.

const FENCE: &str = "```";

/// Strip one leading fence line (```` ``` ```` plus an optional language tag)
/// and one trailing closing fence. The text between them is left untouched,
/// as is an answer that carries no fence at all.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw;

    let leading = raw.trim_start();
    if let Some(after_fence) = leading.strip_prefix(FENCE) {
        if let Some(newline) = after_fence.find('\n') {
            text = &after_fence[newline + 1..];
        }
    }

    let without_newline = text.strip_suffix('\n').unwrap_or(text);
    let without_newline = without_newline.strip_suffix('\r').unwrap_or(without_newline);
    if let Some(inner) = without_newline.strip_suffix(FENCE) {
        if let Some(inner) = inner.strip_suffix('\n') {
            text = inner;
        } else if inner.is_empty() {
            text = inner;
        }
    }

    text
}
