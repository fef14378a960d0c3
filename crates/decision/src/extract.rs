//! Locating a JSON object inside free-form model output.
//!
//! Models wrap their JSON in prose, markdown fences, or both, and
//! frequently leave trailing commas. Extraction prefers a fenced code
//! block, then falls back to balancing braces from the first `{`.
//! Brace counting is string- and escape-aware so braces inside string
//! values never unbalance the scan.

/// Find the most plausible JSON object in `text`, cleaned of trailing
/// commas. Returns `None` when no balanced object exists.
pub fn extract_json_object(text: &str) -> Option<String> {
    if let Some(fenced) = fenced_block(text) {
        if let Some(object) = balanced_object(fenced) {
            return Some(strip_trailing_commas(object));
        }
    }
    balanced_object(text).map(strip_trailing_commas)
}

/// The body of the first markdown code fence, if any. The info string
/// (`json`, `JSON`, or nothing) is skipped, not matched.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Scan from the first `{` and return the slice up to its matching `}`.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove commas that directly precede a closing `}` or `]`, outside
/// of strings. serde_json rejects them; models love them.
fn strip_trailing_commas(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in json.char_indices() {
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' if in_string => {
                escaped = true;
                out.push('\\');
            }
            '"' => {
                in_string = !in_string;
                out.push('"');
            }
            ',' if !in_string => {
                let next = json[i + 1..].chars().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            _ => out.push(c),
        }
    }
    out
}
