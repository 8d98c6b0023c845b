//! Text rendering shared by the research tools

use std::fmt::Display;

/// Render `items` under a heading, one `- item` line each.
///
/// Returns an empty string for no items so the registry can substitute its
/// no-data observation.
pub fn bullet_list<T: Display>(title: &str, items: &[T]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut out = format!("{title}:");
    for item in items {
        out.push_str("\n- ");
        out.push_str(&item.to_string());
    }
    out
}

/// Keep at most `limit` characters, marking the cut
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}\n...(truncated)", &text[..cut]),
        None => text.to_string(),
    }
}
