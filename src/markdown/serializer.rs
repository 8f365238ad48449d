//! Markdown serialization
//!
//! Turns a [`Root`] back into markdown text with a fixed house style:
//! ATX headings, `-` bullets, `**` strong, `_` emphasis, backtick fences and
//! list continuation indented by the marker width plus one space.
//!
//! Re-parsing the output and serializing again yields the same text for the
//! node kinds the rich-text surface supports. Delimiter runs never touch a
//! word character from outside where CommonMark would not read them as
//! emphasis; such neighbors are written as character references.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::markdown::ast::{Node, Root, TableAlignment};

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Serialize an AST to markdown text.
///
/// Blocks are separated by one blank line and the output ends with a single
/// newline. An empty document serializes to the empty string.
pub fn serialize_markdown(root: &Root) -> String {
    let body = write_blocks(&root.children, false);
    if body.is_empty() {
        body
    } else {
        body + "\n"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Block Serialization
// ─────────────────────────────────────────────────────────────────────────────

/// Marker state carried between sibling blocks so adjacent lists stay apart.
#[derive(Debug, Clone, Copy, Default)]
struct ListMarkers {
    bullet: Option<char>,
    delimiter: Option<char>,
}

impl ListMarkers {
    fn next(&mut self, ordered: bool, previous: Option<&Node>) -> char {
        let follows_same_kind =
            matches!(previous, Some(Node::List { ordered: o, .. }) if *o == ordered);

        if ordered {
            let delimiter = match (follows_same_kind, self.delimiter) {
                (true, Some('.')) => ')',
                _ => '.',
            };
            self.delimiter = Some(delimiter);
            delimiter
        } else {
            let bullet = match (follows_same_kind, self.bullet) {
                (true, Some('-')) => '*',
                _ => '-',
            };
            self.bullet = Some(bullet);
            bullet
        }
    }
}

/// Serialize a sequence of sibling blocks.
///
/// Inside list items a list directly after a paragraph is attached without a
/// blank line, which keeps the list tight. A list whose first line is a bare
/// marker is never attached: it would read back as a setext underline or as
/// paragraph continuation.
fn write_blocks(nodes: &[Node], in_list_item: bool) -> String {
    let mut out = String::new();
    let mut markers = ListMarkers::default();
    let mut previous: Option<&Node> = None;

    for node in nodes {
        let written = match node {
            Node::List { ordered, children } => {
                let marker = markers.next(*ordered, previous);
                Some(write_list(*ordered, marker, children))
            }
            _ => write_block(node),
        };

        if let Some(block) = written.filter(|b| !b.is_empty()) {
            if !out.is_empty() {
                let tight = in_list_item
                    && matches!(node, Node::List { .. })
                    && matches!(previous, Some(Node::Paragraph { .. }))
                    && !starts_with_bare_marker(&block);
                out.push_str(if tight { "\n" } else { "\n\n" });
            }
            out.push_str(&block);
        }
        previous = Some(node);
    }

    out
}

/// Serialize one block. Returns `None` for blocks that produce no output.
fn write_block(node: &Node) -> Option<String> {
    let block = match node {
        Node::Heading { depth, children } => write_heading(*depth, children),
        Node::Paragraph { children } => write_paragraph(children),
        Node::List { ordered, children } => {
            write_list(*ordered, if *ordered { '.' } else { '-' }, children)
        }
        Node::ListItem { children } => write_blocks(children, true),
        Node::Code { lang, value } => write_code_block(lang.as_deref(), value),
        Node::Blockquote { children } => write_blockquote(children),
        Node::ThematicBreak => "***".to_string(),
        Node::Html { value } => value.clone(),
        Node::Table { align, children } => write_table(align, children),
        Node::TableRow { .. } | Node::TableCell { .. } => return None,
        inline => write_paragraph(std::slice::from_ref(inline)),
    };
    Some(block)
}

fn write_heading(depth: u8, children: &[Node]) -> String {
    let hashes = "#".repeat(depth.clamp(1, 6) as usize);

    let mut content = String::new();
    write_inlines(children, false, &mut content);
    let mut content = content.replace('\n', " ").trim().to_string();

    // A trailing `#` run would be read back as a closing sequence.
    if content.ends_with('#') {
        content.pop();
        content.push_str("\\#");
    }

    if content.is_empty() {
        hashes
    } else {
        format!("{} {}", hashes, content)
    }
}

fn write_paragraph(children: &[Node]) -> String {
    let mut content = String::new();
    write_inlines(children, false, &mut content);

    // Leading indentation would turn into code, trailing double spaces into
    // hard breaks.
    let trimmed = content
        .split('\n')
        .map(|line| line.trim_matches(|c| c == ' ' || c == '\t'))
        .collect::<Vec<_>>()
        .join("\n");

    escape_line_starts(trimmed.trim_matches('\n'))
}

fn write_list(ordered: bool, marker: char, items: &[Node]) -> String {
    let mut out = String::new();

    for (index, item) in items.iter().enumerate() {
        let prefix = if ordered {
            format!("{}{}", index + 1, marker)
        } else {
            marker.to_string()
        };

        let body = match item {
            Node::ListItem { children } => write_blocks(children, true),
            other => write_blocks(std::slice::from_ref(other), true),
        };

        if index > 0 {
            out.push('\n');
        }
        out.push_str(&indent_list_item(&prefix, &body));
    }

    out
}

/// Whether the first line of a rendered list is a marker with no content.
fn starts_with_bare_marker(list: &str) -> bool {
    list.split('\n').next().is_some_and(|line| !line.contains(' '))
}

/// Attach the marker to the first line and indent continuation lines.
fn indent_list_item(prefix: &str, body: &str) -> String {
    if body.is_empty() {
        return prefix.to_string();
    }

    let continuation = " ".repeat(prefix.len() + 1);
    let mut out = String::with_capacity(body.len() + prefix.len() + 1);

    for (i, line) in body.split('\n').enumerate() {
        if i == 0 {
            out.push_str(prefix);
            out.push(' ');
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&continuation);
            }
        }
        out.push_str(line);
    }

    out
}

fn write_code_block(lang: Option<&str>, value: &str) -> String {
    let fence = "`".repeat(longest_run(value, '`').max(2) + 1);

    let mut out = String::with_capacity(value.len() + 2 * fence.len() + 8);
    out.push_str(&fence);
    out.push_str(lang.unwrap_or(""));
    out.push('\n');
    if !value.is_empty() {
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(&fence);
    out
}

fn write_blockquote(children: &[Node]) -> String {
    let body = write_blocks(children, false);
    if body.is_empty() {
        return ">".to_string();
    }

    body.split('\n')
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_table(align: &[TableAlignment], rows: &[Node]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.children()
                .iter()
                .map(|cell| {
                    let mut content = String::new();
                    write_inlines(cell.children(), true, &mut content);
                    content.replace('\n', " ").trim().to_string()
                })
                .collect()
        })
        .collect();

    let columns = cells
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(align.len()))
        .max()
        .unwrap_or(0);
    if columns == 0 || cells.is_empty() {
        return String::new();
    }

    let format_row = |row: &[String]| {
        let padded: Vec<&str> = (0..columns)
            .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let delimiter: Vec<&str> = (0..columns)
        .map(|i| match align.get(i).copied().unwrap_or_default() {
            TableAlignment::None => "---",
            TableAlignment::Left => ":--",
            TableAlignment::Center => ":-:",
            TableAlignment::Right => "--:",
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 1);
    lines.push(format_row(&cells[0]));
    lines.push(format!("| {} |", delimiter.join(" | ")));
    for row in &cells[1..] {
        lines.push(format_row(row));
    }
    lines.join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Inline Serialization
// ─────────────────────────────────────────────────────────────────────────────

/// Delimiter runs around inline content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Strong,
    Emphasis,
    Strikethrough,
}

impl Delimiter {
    fn marker(self) -> &'static str {
        match self {
            Delimiter::Strong => "**",
            Delimiter::Emphasis => "_",
            Delimiter::Strikethrough => "~~",
        }
    }

    /// Whether a word character directly outside the run must be encoded,
    /// given the character just inside it.
    ///
    /// `_` never opens or closes next to a word character. `*` and `~` runs
    /// only fail there when the inside character is punctuation.
    fn guards_outside(self, inside: char) -> bool {
        match self {
            Delimiter::Emphasis => true,
            Delimiter::Strong | Delimiter::Strikethrough => !inside.is_alphanumeric(),
        }
    }
}

fn write_inlines(nodes: &[Node], in_table: bool, out: &mut String) {
    let nodes = merge_adjacent_runs(nodes);
    // Offset just past a closing delimiter that must not touch a word character
    let mut guard: Option<usize> = None;

    for node in nodes.iter() {
        let guard_next = write_inline(node, in_table, out);
        if let Some(offset) = guard {
            if out.len() > offset {
                encode_word_char_at(out, offset);
                guard = None;
            }
        }
        if guard_next {
            guard = Some(out.len());
        }
    }
}

/// Write one inline node. Returns whether the text written next has to be
/// kept off the delimiter that closed this node.
fn write_inline(node: &Node, in_table: bool, out: &mut String) -> bool {
    match node {
        Node::Text { value } => out.push_str(&escape_text(value, in_table)),
        Node::Strong { children } => {
            return write_delimited(Delimiter::Strong, children, in_table, out);
        }
        Node::Emphasis { children } => {
            return write_delimited(Delimiter::Emphasis, children, in_table, out);
        }
        Node::Delete { children } => {
            return write_delimited(Delimiter::Strikethrough, children, in_table, out);
        }
        Node::InlineCode { value } => out.push_str(&code_span(value)),
        Node::Link { url, children } => {
            out.push('[');
            write_inlines(children, in_table, out);
            out.push_str("](");
            out.push_str(&link_destination(url));
            out.push(')');
        }
        Node::Image { url, alt } => {
            out.push_str("![");
            out.push_str(&escape_text(alt, in_table));
            out.push_str("](");
            out.push_str(&link_destination(url));
            out.push(')');
        }
        Node::Break => out.push_str("\\\n"),
        Node::Html { value } => out.push_str(value),
        // Block content has no inline rendering
        _ => {}
    }
    false
}

/// Wrap inline content in a delimiter run that reads back as the same node.
///
/// Whitespace at either edge is moved outside the delimiters and a run with
/// nothing left inside is dropped. A word character touching the outside of
/// a delimiter is written as a character reference.
fn write_delimited(
    delimiter: Delimiter,
    children: &[Node],
    in_table: bool,
    out: &mut String,
) -> bool {
    let mut content = String::new();
    write_inlines(children, in_table, &mut content);

    let (leading, body, trailing) = split_outer_whitespace(&content);
    out.push_str(leading);
    let (Some(first), Some(last)) = (body.chars().next(), body.chars().last()) else {
        out.push_str(trailing);
        return false;
    };

    if delimiter.guards_outside(first) {
        encode_last_word_char(out);
    }
    out.push_str(delimiter.marker());
    out.push_str(body);
    out.push_str(delimiter.marker());
    out.push_str(trailing);

    trailing.is_empty() && delimiter.guards_outside(last)
}

/// Merge adjacent runs of the same kind, which would otherwise fuse into one
/// longer delimiter run.
fn merge_adjacent_runs(nodes: &[Node]) -> Cow<'_, [Node]> {
    let same_kind = |a: &Node, b: &Node| {
        matches!(
            (a, b),
            (Node::Strong { .. }, Node::Strong { .. })
                | (Node::Emphasis { .. }, Node::Emphasis { .. })
                | (Node::Delete { .. }, Node::Delete { .. })
        )
    };
    if !nodes.windows(2).any(|pair| same_kind(&pair[0], &pair[1])) {
        return Cow::Borrowed(nodes);
    }

    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match (merged.last_mut(), node) {
            (Some(Node::Strong { children: into }), Node::Strong { children })
            | (Some(Node::Emphasis { children: into }), Node::Emphasis { children })
            | (Some(Node::Delete { children: into }), Node::Delete { children }) => {
                into.extend(children.iter().cloned())
            }
            _ => merged.push(node.clone()),
        }
    }
    Cow::Owned(merged)
}

/// Split rendered inline content into leading whitespace, body and trailing
/// whitespace. A hard break at the end counts as trailing whitespace.
fn split_outer_whitespace(content: &str) -> (&str, &str, &str) {
    let start = content.len() - content.trim_start().len();
    let mut end = content.trim_end().len().max(start);

    while end > start
        && content[end..].starts_with('\n')
        && longest_suffix_run(&content[start..end], '\\') % 2 == 1
    {
        end = content[..end - 1].trim_end().len().max(start);
    }

    (&content[..start], &content[start..end], &content[end..])
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !c.is_ascii_punctuation()
}

fn char_reference(c: char) -> String {
    format!("&#x{:X};", c as u32)
}

/// Replace the last character with a character reference if it is a word
/// character.
fn encode_last_word_char(out: &mut String) {
    if let Some(c) = out.chars().last().filter(|c| is_word_char(*c)) {
        out.pop();
        out.push_str(&char_reference(c));
    }
}

/// Replace the character at `offset` with a character reference if it is a
/// word character.
fn encode_word_char_at(out: &mut String, offset: usize) {
    if let Some(c) = out[offset..].chars().next().filter(|c| is_word_char(*c)) {
        out.replace_range(offset..offset + c.len_utf8(), &char_reference(c));
    }
}

/// Render inline code with a fence longer than any backtick run inside it.
fn code_span(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let fence = "`".repeat(longest_run(value, '`') + 1);
    let needs_padding = value.starts_with('`')
        || value.ends_with('`')
        || (value.starts_with(' ') && value.ends_with(' ') && !value.trim().is_empty());

    if needs_padding {
        format!("{fence} {value} {fence}")
    } else {
        format!("{fence}{value}{fence}")
    }
}

fn link_destination(url: &str) -> String {
    let needs_brackets = url
        .chars()
        .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '<' || c == '>');

    if needs_brackets {
        format!("<{}>", url.replace('<', "\\<").replace('>', "\\>"))
    } else {
        url.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Escaping
// ─────────────────────────────────────────────────────────────────────────────

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(#[0-9]{1,7};|#[xX][0-9a-fA-F]{1,6};|[A-Za-z][A-Za-z0-9]{1,31};)")
            .expect("entity pattern is valid")
    })
}

fn line_start_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^([#>+=\-]|[0-9]{1,9}[.)])").expect("line start pattern is valid")
    })
}

/// Backslash-escape characters that would otherwise start inline syntax.
fn escape_text(value: &str, in_table: bool) -> String {
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '~' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '|' if in_table => escaped.push_str("\\|"),
            _ => escaped.push(c),
        }
    }

    entity_pattern()
        .replace_all(&escaped, "\\&$1")
        .into_owned()
}

/// Escape characters at the start of a paragraph line that would begin a
/// heading, quote, list or setext underline.
fn escape_line_starts(paragraph: &str) -> String {
    line_start_pattern()
        .replace_all(paragraph, |caps: &Captures| {
            let marker = &caps[1];
            match marker.len() {
                1 if !marker.as_bytes()[0].is_ascii_digit() => format!("\\{}", marker),
                _ => {
                    let (digits, delimiter) = marker.split_at(marker.len() - 1);
                    format!("{}\\{}", digits, delimiter)
                }
            }
        })
        .into_owned()
}

fn longest_suffix_run(value: &str, target: char) -> usize {
    value.chars().rev().take_while(|c| *c == target).count()
}

fn longest_run(value: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in value.chars() {
        if c == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
