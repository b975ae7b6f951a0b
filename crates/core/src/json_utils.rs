//! JSON helpers for model replies.

/// Strip a markdown code fence wrapped around a JSON reply.
///
/// Models asked for JSON sometimes answer with `` ```json ... ``` ``; the
/// language tag on the opening fence is discarded.
#[must_use]
pub fn strip_markdown_json(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```").and_then(|s| s.strip_suffix("```")) else {
        return trimmed;
    };
    match inner.split_once('\n') {
        Some((_lang, body)) => body.trim(),
        None => inner.trim(),
    }
}
