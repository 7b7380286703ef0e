//! Prompt construction and response clean-up for app generation.

use serde_json::Value;

/// The only CDN generated pages may load external libraries from.
pub const ALLOWED_CDN: &str = "cdnjs.cloudflare.com";

pub const SYSTEM_PROMPT: &str =
    "You are an expert web developer who writes complete, working single-page HTML applications.";

/// Build the user prompt for a task.
pub fn build_prompt(brief: &str, checks: &[String], attachments: &[Value]) -> String {
    let requirements = if checks.is_empty() {
        "- (none provided)".to_string()
    } else {
        checks
            .iter()
            .map(|check| format!("- {}", check))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let attachments =
        serde_json::to_string_pretty(attachments).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"Create a single-page HTML application based on this brief:

BRIEF: {brief}

REQUIREMENTS (These will be tested):
{requirements}

ATTACHMENTS:
{attachments}

Generate a complete, working HTML file that:
1. Includes all necessary CSS (inline or in <style> tags)
2. Includes all necessary JavaScript (inline or in <script> tags)
3. Uses CDN links for any external libraries (from {cdn} only)
4. Handles the attachments properly (they're provided as data URIs)
5. Is production-ready and fully functional
6. Meets ALL the requirements listed above

Return ONLY the complete HTML code, no explanations, no markdown formatting, just the raw HTML."#,
        cdn = ALLOWED_CDN,
    )
}

/// Strip a markdown code fence from model output.
///
/// Only the first fenced block is kept. An ```` ```html ```` fence wins over a
/// bare ```` ``` ```` fence. Text without fences is returned trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let inner = if let Some((_, rest)) = text.split_once("```html") {
        rest.split("```").next().unwrap_or(rest)
    } else if text.contains("```") {
        text.split("```").nth(1).unwrap_or(text)
    } else {
        text
    };
    inner.trim()
}
