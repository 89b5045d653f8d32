//! Markdown entry parser.
//!
//! Source documents are plain Markdown where every level-3 heading opens
//! an entry:
//!
//! ```markdown
//! # Deployment FAQ
//!
//! ### How do I roll back?
//! Run the rollback job from the pipeline page.
//!
//! **Tags**: deploy, rollback
//!
//! ### Where are the logs?
//! In the `ops` bucket.
//! <!-- tags: logs -->
//! ```
//!
//! The heading text becomes the entry title (question or term). Non-empty
//! lines up to the next level-3 heading form the body, trimmed and joined
//! with `\n`. Content before the first level-3 heading, and other heading
//! lines, are ignored. Tag lines are lifted out of the body. Fenced code
//! blocks are kept verbatim.

/// One parsed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// A body line, and whether it sits inside a fenced code block (fence
/// delimiters included).
struct BodyLine<'a> {
    text: &'a str,
    fenced: bool,
}

/// An open code fence: the delimiter character and its run length.
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    /// Opens a fence if `line` starts with three or more backticks or tildes.
    fn open(line: &str) -> Option<Self> {
        let marker = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = line.chars().take_while(|c| *c == marker).count();
        (len >= 3).then_some(Self { marker, len })
    }

    /// A closing fence is a run of the same marker at least as long, with
    /// nothing after it.
    fn closes(&self, line: &str) -> bool {
        let len = line.chars().take_while(|c| *c == self.marker).count();
        len >= self.len && line[len * self.marker.len_utf8()..].trim().is_empty()
    }
}

/// Parse all level-3-heading entries from `content`, in document order.
///
/// Lines inside fenced code blocks are body text verbatim: they never open
/// an entry, and blank or `#` lines in them are kept.
pub fn parse_entries(content: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut current: Option<(String, Vec<BodyLine<'_>>)> = None;
    let mut fence: Option<Fence> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(open) = &fence {
            if open.closes(trimmed) {
                fence = None;
            }
            if let Some((_, lines)) = current.as_mut() {
                lines.push(BodyLine {
                    text: line.trim_end(),
                    fenced: true,
                });
            }
            continue;
        }

        if let Some(opened) = Fence::open(trimmed) {
            fence = Some(opened);
            if let Some((_, lines)) = current.as_mut() {
                lines.push(BodyLine {
                    text: trimmed,
                    fenced: true,
                });
            }
            continue;
        }

        if let Some(title) = level3_heading(trimmed) {
            if let Some((title, lines)) = current.take() {
                entries.push(build_entry(title, &lines));
            }
            current = Some((title.to_string(), Vec::new()));
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some((_, lines)) = current.as_mut() {
            lines.push(BodyLine {
                text: trimmed,
                fenced: false,
            });
        }
    }

    if let Some((title, lines)) = current {
        entries.push(build_entry(title, &lines));
    }

    entries
}

/// Returns the heading text if `line` is exactly a level-3 ATX heading.
fn level3_heading(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("###")?;
    if rest.starts_with('#') {
        return None;
    }
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    // Closing hashes are optional in ATX headings.
    Some(rest.trim().trim_end_matches('#').trim_end())
}

/// Lift tag lines out of the body. Fenced lines are never tag lines. When
/// several tag lines appear, the last one wins.
fn build_entry(title: String, lines: &[BodyLine<'_>]) -> Entry {
    let mut tags = Vec::new();
    let mut body = Vec::with_capacity(lines.len());

    for line in lines {
        match (line.fenced, parse_tag_line(line.text)) {
            (false, Some(parsed)) => tags = parsed,
            _ => body.push(line.text),
        }
    }

    Entry {
        title,
        body: body.join("\n"),
        tags,
    }
}

/// Recognizes `**Tags**: a, b` (label matched case-insensitively, tags kept
/// as written) and `<!-- tags: a, b -->` (tags lower-cased).
pub fn parse_tag_line(line: &str) -> Option<Vec<String>> {
    let lower = line.to_lowercase();
    if lower.starts_with("**tags**:") {
        let tag_line = line.split_once(':').map(|(_, rest)| rest).unwrap_or("");
        return Some(split_tags(tag_line));
    }
    let pos = lower.find("<!-- tags:")?;
    let after = &lower[pos + "<!-- tags:".len()..];
    Some(split_tags(after.split("-->").next().unwrap_or("")))
}

fn split_tags(tag_line: &str) -> Vec<String> {
    tag_line
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
