//! Console rendering of markdown reports
//!
//! Rendering is three passes: drop ANSI escapes, drop markdown markup, then
//! re-wrap the whole text as one paragraph broken at sentence ends.

use regex::Regex;
use std::sync::LazyLock;

/// Default maximum line width in characters
pub const DEFAULT_WIDTH: usize = 60;

/// A sentence end only breaks the line once it holds more than this
pub const MIN_SENTENCE_BREAK: usize = 30;

const SENTENCE_ENDS: &[char] = &['。', '！', '？', '；', '!', '?', ';'];

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[@-Z\\-_]").expect("static ANSI regex")
});

/// Markup rules applied in order
static MARKDOWN_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"```[\s\S]*?```", ""),
        (r"(?m)^#{1,6}\s+", ""),
        (r"(?m)^[ \t]*[-*+][ \t]+", ""),
        (r"(?m)^[ \t]*\d+\.[ \t]+", ""),
        (r"(?m)^[ \t]*>[ \t]?", ""),
        (r"\*\*(.+?)\*\*", "$1"),
        (r"__(.+?)__", "$1"),
        (r"\*(.+?)\*", "$1"),
        (r"\b_(.+?)_\b", "$1"),
        (r"~~(.+?)~~", "$1"),
        (r"`(.+?)`", "$1"),
        (r"\[(.+?)\]\(.+?\)", "$1"),
        (r"(?m)^[ \t]*\|?[ \t]*:?-+:?[ \t]*(\|[ \t]*:?-+:?[ \t]*)*\|?[ \t]*$", ""),
        (r"[ \t]*\|[ \t]*", " "),
        (r"\n\s*\n(\s*\n)*", "\n\n"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("static markdown regex"),
            replacement,
        )
    })
    .collect()
});

/// Remove ANSI escape sequences
pub fn strip_ansi(text: &str) -> String {
    ANSI.replace_all(text, "").into_owned()
}

/// Remove markdown markup, keeping the readable text
pub fn strip_markdown(text: &str) -> String {
    let stripped = MARKDOWN_RULES
        .iter()
        .fold(text.to_string(), |acc, (rule, replacement)| {
            rule.replace_all(&acc, *replacement).into_owned()
        });
    stripped.trim().to_string()
}

/// Join all lines into one paragraph and break it into lines.
///
/// A line ends after a sentence-terminal mark once it is longer than
/// `min_sentence` characters, or when it reaches `width` characters.
pub fn wrap_lines(text: &str, width: usize, min_sentence: usize) -> Vec<String> {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in joined.chars() {
        current.push(ch);
        count += 1;
        if (SENTENCE_ENDS.contains(&ch) && count > min_sentence) || count >= width {
            push_trimmed(&mut lines, &current);
            current.clear();
            count = 0;
        }
    }
    push_trimmed(&mut lines, &current);
    lines
}

fn push_trimmed(lines: &mut Vec<String>, line: &str) {
    let line = line.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
}

/// Full console rendering with the default widths
pub fn render_for_console(text: &str) -> Vec<String> {
    wrap_lines(
        &strip_markdown(&strip_ansi(text)),
        DEFAULT_WIDTH,
        MIN_SENTENCE_BREAK,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;32mgold\x1b[0m up"), "gold up");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_strip_markdown_markup() {
        let md = "## 市场趋势\n\n**上证指数**上涨，*创业板*走弱，~~旧观点~~。\n\n\
                  - 第一点 `代码`\n1. 第二点\n> 引用\n\n[报告](https://example.com)";
        assert_eq!(
            strip_markdown(md),
            "市场趋势\n\n上证指数上涨，创业板走弱，旧观点。\n\n第一点 代码\n第二点\n引用\n\n报告"
        );
    }

    #[test]
    fn test_strip_markdown_keeps_snake_case() {
        assert_eq!(strip_markdown("see _note_ in fund_map_path"), "see note in fund_map_path");
    }

    #[test]
    fn test_strip_markdown_tables_and_fences() {
        let md = "| 板块 | 涨幅 |\n|---|:---:|\n| 半导体 | 3.1% |\n\n```\nraw\n```\nend";
        assert_eq!(strip_markdown(md), "板块 涨幅 \n\n 半导体 3.1% \n\nend");
    }

    #[test]
    fn test_wrap_breaks_at_sentence_end_past_minimum() {
        let short = "短句。";
        assert_eq!(wrap_lines(short, 60, 30), vec!["短句。"]);

        let sentence = format!("{}。后续", "涨".repeat(31));
        let lines = wrap_lines(&sentence, 60, 30);
        assert_eq!(lines, vec![format!("{}。", "涨".repeat(31)), "后续".to_string()]);
    }

    #[test]
    fn test_wrap_breaks_at_width() {
        let text = "a".repeat(130);
        let lines = wrap_lines(&text, 60, 30);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].chars().count(), 60);
        assert_eq!(lines[2].chars().count(), 10);
    }

    #[test]
    fn test_wrap_ignores_period_and_joins_lines() {
        let text = format!("{}.\n{}", "x".repeat(35), "y".repeat(5));
        assert_eq!(wrap_lines(&text, 60, 30), vec![format!("{}. {}", "x".repeat(35), "y".repeat(5))]);
    }

    #[test]
    fn test_render_for_console() {
        let lines = render_for_console("\x1b[1m# 结论\x1b[0m\n\n**黄金**短期偏强！");
        assert_eq!(lines, vec!["结论 黄金短期偏强！"]);
    }
}
