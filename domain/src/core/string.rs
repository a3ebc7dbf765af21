//! String helpers for previews in logs and progress lines.

/// Collapse whitespace and cut `text` to at most `max_chars` characters,
/// appending `...` when something was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let keep = max_chars.saturating_sub(3);
    let mut cut: String = collapsed.chars().take(keep).collect();
    cut.push_str("...");
    cut
}
