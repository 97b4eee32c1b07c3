//! HTML entity escaping for captured values.

/// Escape `&`, `<`, `>`, `"` and `'` for direct inclusion in markup.
///
/// Single quotes become `&#039;`. Input is treated as already decoded text,
/// so percent sequences such as `%3C` pass through untouched.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}
