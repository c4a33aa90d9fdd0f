//! Report rendering for the messaging channel.
//!
//! A report is a headline with the blocked count followed by a fixed-width
//! table inside a code block. Text is escaped for Telegram's MarkdownV2.

use serde::Serialize;

use crate::checker::{BlockStatus, ResultRow};

pub const DOMAIN_WIDTH: usize = 28;
pub const STATUS_WIDTH: usize = 19;

/// Telegram's limit on the text of one message, in characters.
pub const MESSAGE_LIMIT: usize = 4096;

const BLOCKED_MARKER: &str = "❌BLOCKED❌";
const NOT_BLOCKED_MARKER: &str = "✅NOT BLOCKED✅";

/// Characters that must be escaped in MarkdownV2 text outside entities.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Plain (unescaped) headline, e.g. `[1] BLOCKED ❌`
    pub headline: String,
    /// Plain table, one line per row
    pub table: String,
    pub blocked_count: usize,
    pub row_count: usize,
}

impl CheckReport {
    pub fn from_rows(rows: &[ResultRow]) -> Self {
        let blocked_count = blocked_count(rows);
        Self {
            headline: headline(blocked_count),
            table: format_table(rows),
            blocked_count,
            row_count: rows.len(),
        }
    }

    /// Message text ready for `parse_mode=MarkdownV2`.
    pub fn to_markdown_v2(&self) -> String {
        format!(
            "{}\n\n```\n{}\n```",
            escape_markdown_v2(&self.headline),
            escape_code_block(&self.table)
        )
    }

    /// The report as one or more MarkdownV2 messages of at most `limit`
    /// characters each. Only the first carries the headline; every part repeats
    /// the table header and footer so it reads on its own.
    pub fn to_markdown_v2_parts(&self, limit: usize) -> Vec<String> {
        let lines: Vec<String> = self.table.lines().map(escape_code_block).collect();
        if lines.len() < 4 {
            return vec![self.to_markdown_v2()];
        }
        let (head, rest) = lines.split_at(3);
        let (body, foot) = rest.split_at(rest.len() - 1);

        let frame = |prefix: &str, rows: &[String]| {
            let table: Vec<&str> = head
                .iter()
                .chain(rows)
                .chain(foot)
                .map(String::as_str)
                .collect();
            format!("{}```\n{}\n```", prefix, table.join("\n"))
        };
        // Fence, header and footer lines, each line followed by a newline but the last
        let frame_len = 8 + head
            .iter()
            .chain(foot)
            .map(|l| l.chars().count() + 1)
            .sum::<usize>()
            - 1;

        let mut prefix = format!("{}\n\n", escape_markdown_v2(&self.headline));
        let mut parts = Vec::new();
        let mut start = 0;
        let mut used = prefix.chars().count() + frame_len;
        for (i, line) in body.iter().enumerate() {
            let cost = line.chars().count() + 1;
            if used + cost > limit && i > start {
                parts.push(frame(&prefix, &body[start..i]));
                prefix.clear();
                start = i;
                used = frame_len;
            }
            used += cost;
        }
        parts.push(frame(&prefix, &body[start..]));
        parts
    }
}

pub fn blocked_count(rows: &[ResultRow]) -> usize {
    rows.iter().filter(|row| row.status.is_blocked()).count()
}

pub fn headline(blocked_count: usize) -> String {
    if blocked_count > 0 {
        format!("[{}] BLOCKED ❌", blocked_count)
    } else {
        "[0] NOT BLOCKED ✅".to_string()
    }
}

/// Status cell text: verdicts get markers, anything else passes through.
pub fn status_label(status: &BlockStatus) -> &str {
    match status {
        BlockStatus::Blocked => BLOCKED_MARKER,
        BlockStatus::NotBlocked => NOT_BLOCKED_MARKER,
        BlockStatus::Unknown(text) => text,
    }
}

pub fn format_table(rows: &[ResultRow]) -> String {
    let border = format!(
        "+{}+{}+",
        "-".repeat(DOMAIN_WIDTH + 2),
        "-".repeat(STATUS_WIDTH + 2)
    );

    let mut lines = Vec::with_capacity(rows.len() + 4);
    lines.push(border.clone());
    lines.push(table_line("DOMAIN", "RESULT"));
    lines.push(border.clone());
    for row in rows {
        lines.push(table_line(&row.domain, status_label(&row.status)));
    }
    lines.push(border);

    lines.join("\n")
}

fn table_line(domain: &str, status: &str) -> String {
    format!(
        "| {} | {} |",
        fit(domain, DOMAIN_WIDTH),
        fit(status, STATUS_WIDTH)
    )
}

/// Pad or truncate to `width` characters. Control characters become spaces so
/// a cell never spans more than one line.
fn fit(text: &str, width: usize) -> String {
    let mut cell: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(width)
        .collect();
    let len = cell.chars().count();
    cell.push_str(&" ".repeat(width - len));
    cell
}

pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inside `pre` and `code` entities only backslash and backtick are special.
pub fn escape_code_block(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || c == '`' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
