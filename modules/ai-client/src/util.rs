/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Locate the outermost JSON array in a model response.
///
/// Models occasionally wrap the array in prose ("Here is the analysis: [...]").
/// Returns the slice from the first `[` to the last `]`, or `None` when the
/// response contains no array at all.
pub fn extract_json_array(response: &str) -> Option<&str> {
    let stripped = strip_code_blocks(response);
    let start = stripped.find('[')?;
    let end = stripped.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&stripped[start..=end])
}

pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
