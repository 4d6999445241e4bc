//! Answer markup: parse the model's constrained markdown into a typed tree
//! and render it.
//!
//! DESIGN
//! ======
//! The system prompt asks for a small dialect: `# ` title, `## ` sections,
//! bullets led by `•▲★✓-*`, `**strong**`, `⟨highlight⟩` and `[Source N]`
//! citations. [`parse_document`] turns text in that dialect into a
//! [`Document`] in one pass. It never fails: an unterminated marker is kept
//! as plain text, so a half-streamed answer parses to a sensible prefix.
//! [`Render`] walks the tree; [`HtmlRenderer`] and [`TerminalRenderer`]
//! are the two outputs.

use std::fmt::Write as _;

const BULLET_MARKERS: [char; 6] = ['•', '▲', '★', '✓', '-', '*'];

// =============================================================================
// TREE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
    /// `[Source N]` or `[N]`.
    Citation(u32),
    /// `⟨…⟩`, used for dates and key figures.
    Highlight(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    Bullet { marker: char, inlines: Vec<Inline> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub title: Option<String>,
    /// Blocks before the first section.
    pub preamble: Vec<Block>,
    pub sections: Vec<Section>,
}

impl Document {
    /// Every cited source index, in order of first appearance.
    #[must_use]
    pub fn citations(&self) -> Vec<u32> {
        let mut out = Vec::new();
        let blocks = self.preamble.iter().chain(self.sections.iter().flat_map(|s| s.blocks.iter()));
        for block in blocks {
            let inlines = match block {
                Block::Paragraph(inlines) | Block::Bullet { inlines, .. } => inlines,
            };
            for inline in inlines {
                if let Inline::Citation(n) = inline {
                    if !out.contains(n) {
                        out.push(*n);
                    }
                }
            }
        }
        out
    }
}

// =============================================================================
// PARSER
// =============================================================================

/// Parse a whole answer.
#[must_use]
pub fn parse_document(text: &str) -> Document {
    let mut doc = Document::default();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(heading) = line.strip_prefix("## ") {
            doc.sections.push(Section { heading: heading_text(heading), blocks: Vec::new() });
            continue;
        }
        if let Some(title) = line.strip_prefix("# ") {
            if doc.title.is_none() && doc.sections.is_empty() {
                doc.title = Some(heading_text(title));
            } else {
                doc.sections.push(Section { heading: heading_text(title), blocks: Vec::new() });
            }
            continue;
        }
        let block = parse_block(line);
        match doc.sections.last_mut() {
            Some(section) => section.blocks.push(block),
            None => doc.preamble.push(block),
        }
    }
    doc
}

/// Headings are rendered bare; the model sometimes wraps them in `**`.
fn heading_text(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("**")
        .and_then(|s| s.strip_suffix("**"))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn parse_block(line: &str) -> Block {
    let mut chars = line.chars();
    if let (Some(marker), Some(next)) = (chars.next(), chars.next()) {
        if BULLET_MARKERS.contains(&marker) && next.is_whitespace() {
            let rest = line[marker.len_utf8()..].trim_start();
            return Block::Bullet { marker, inlines: parse_inline(rest) };
        }
    }
    Block::Paragraph(parse_inline(line))
}

/// Parse one line of inline markup.
#[must_use]
pub fn parse_inline(line: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut text = String::new();
    let mut rest = line;

    while let Some(c) = rest.chars().next() {
        let parsed = match c {
            '*' => strong(rest),
            '⟨' => highlight(rest),
            '[' => citation(rest),
            _ => None,
        };
        if let Some((inline, consumed)) = parsed {
            if !text.is_empty() {
                out.push(Inline::Text(std::mem::take(&mut text)));
            }
            out.push(inline);
            rest = &rest[consumed..];
        } else {
            text.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    if !text.is_empty() {
        out.push(Inline::Text(text));
    }
    out
}

fn strong(rest: &str) -> Option<(Inline, usize)> {
    let inner = rest.strip_prefix("**")?;
    let end = inner.find("**").filter(|&end| end > 0)?;
    Some((Inline::Strong(inner[..end].to_string()), 2 + end + 2))
}

fn highlight(rest: &str) -> Option<(Inline, usize)> {
    let open = '⟨'.len_utf8();
    let inner = &rest[open..];
    let end = inner.find('⟩')?;
    Some((Inline::Highlight(inner[..end].to_string()), open + end + '⟩'.len_utf8()))
}

fn citation(rest: &str) -> Option<(Inline, usize)> {
    let end = rest.find(']')?;
    let inner = &rest[1..end];
    let number = inner.strip_prefix("Source").map_or(inner, str::trim_start).trim();
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((Inline::Citation(number.parse().ok()?), end + 1))
}

// =============================================================================
// RENDERING
// =============================================================================

/// Tree walker. Implementors write each node kind; `render` fixes the order.
pub trait Render {
    fn title(&self, out: &mut String, title: &str);
    fn heading(&self, out: &mut String, heading: &str);
    fn paragraph(&self, out: &mut String, inlines: &str);
    fn bullet(&self, out: &mut String, marker: char, inlines: &str);
    fn inline(&self, out: &mut String, inline: &Inline);

    /// Open and close a section; no-ops by default.
    fn section_start(&self, _out: &mut String) {}
    fn section_end(&self, _out: &mut String) {}

    fn render(&self, doc: &Document) -> String {
        let mut out = String::new();
        if let Some(title) = &doc.title {
            self.title(&mut out, title);
        }
        self.blocks(&mut out, &doc.preamble);
        for section in &doc.sections {
            self.section_start(&mut out);
            self.heading(&mut out, &section.heading);
            self.blocks(&mut out, &section.blocks);
            self.section_end(&mut out);
        }
        out
    }

    fn blocks(&self, out: &mut String, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(inlines) => {
                    let body = self.inlines(inlines);
                    self.paragraph(out, &body);
                }
                Block::Bullet { marker, inlines } => {
                    let body = self.inlines(inlines);
                    self.bullet(out, *marker, &body);
                }
            }
        }
    }

    fn inlines(&self, inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            self.inline(&mut out, inline);
        }
        out
    }
}

/// Escaped HTML fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Render for HtmlRenderer {
    fn title(&self, out: &mut String, title: &str) {
        let _ = write!(out, "<h1>{}</h1>", escape_html(title));
    }

    fn heading(&self, out: &mut String, heading: &str) {
        let _ = write!(out, "<h2>{}</h2>", escape_html(heading));
    }

    fn paragraph(&self, out: &mut String, inlines: &str) {
        let _ = write!(out, "<p>{inlines}</p>");
    }

    fn bullet(&self, out: &mut String, marker: char, inlines: &str) {
        let _ = write!(out, "<p class=\"bullet\"><span class=\"marker\">{marker}</span> {inlines}</p>");
    }

    fn inline(&self, out: &mut String, inline: &Inline) {
        match inline {
            Inline::Text(text) => out.push_str(&escape_html(text)),
            Inline::Strong(text) => {
                let _ = write!(out, "<strong>{}</strong>", escape_html(text));
            }
            Inline::Citation(n) => {
                let _ = write!(out, "<sup class=\"citation\" data-source=\"{n}\">[{n}]</sup>");
            }
            Inline::Highlight(text) => {
                let _ = write!(out, "<mark>{}</mark>", escape_html(text));
            }
        }
    }

    fn section_start(&self, out: &mut String) {
        out.push_str("<section>");
    }

    fn section_end(&self, out: &mut String) {
        out.push_str("</section>");
    }
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_UNDERLINE: &str = "\x1b[4m";
const ANSI_RESET: &str = "\x1b[0m";

/// Plain text for a terminal, optionally with ANSI styling.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    pub ansi: bool,
}

impl TerminalRenderer {
    fn styled(&self, out: &mut String, style: &str, text: &str) {
        if self.ansi {
            let _ = write!(out, "{style}{text}{ANSI_RESET}");
        } else {
            out.push_str(text);
        }
    }
}

impl Render for TerminalRenderer {
    fn title(&self, out: &mut String, title: &str) {
        self.styled(out, ANSI_BOLD, &title.to_uppercase());
        out.push_str("\n\n");
    }

    fn heading(&self, out: &mut String, heading: &str) {
        self.styled(out, ANSI_UNDERLINE, heading);
        out.push('\n');
    }

    fn paragraph(&self, out: &mut String, inlines: &str) {
        out.push_str(inlines);
        out.push('\n');
    }

    fn bullet(&self, out: &mut String, marker: char, inlines: &str) {
        let _ = writeln!(out, "  {marker} {inlines}");
    }

    fn inline(&self, out: &mut String, inline: &Inline) {
        match inline {
            Inline::Text(text) => out.push_str(text),
            Inline::Strong(text) => self.styled(out, ANSI_BOLD, text),
            Inline::Citation(n) => {
                let _ = write!(out, "[{n}]");
            }
            Inline::Highlight(text) => {
                let _ = write!(out, "⟨{text}⟩");
            }
        }
    }

    fn section_end(&self, out: &mut String) {
        out.push('\n');
    }
}

#[cfg(test)]
#[path = "markup_test.rs"]
mod tests;
