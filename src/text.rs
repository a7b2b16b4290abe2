//! Small string helpers shared by the prompt and report builders

/// Longest prefix of `s` with at most `max` chars
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Like `truncate_chars`, with `...` appended when something was cut
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    let cut = truncate_chars(s, max);
    if cut.len() < s.len() {
        format!("{}...", cut)
    } else {
        cut.to_string()
    }
}
