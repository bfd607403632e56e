//! FB2 book model.
//!
//! A parsed FictionBook tree: bodies holding recursive sections, sections
//! holding flow items, paragraphs holding nested inline spans. The
//! converter walks this tree; it never sees raw XML.

mod parser;

pub use parser::{parse_fb2, parse_fb2_str};

/// A parsed FictionBook.
#[derive(Debug, Default, Clone)]
pub struct Book {
    /// Book title from title-info.
    pub title: Option<String>,
    pub lang: Option<String>,
    /// Cover image reference from the coverpage, `#`-stripped.
    pub cover: Option<String>,
    pub bodies: Vec<Body>,
    /// Embedded binary payloads (usually images), in document order.
    pub binaries: Vec<Binary>,
}

/// An embedded `<binary>` payload.
#[derive(Debug, Clone)]
pub struct Binary {
    pub id: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A `<body>`: optional intro material plus top-level sections.
#[derive(Debug, Default, Clone)]
pub struct Body {
    pub name: Option<String>,
    pub image: Option<Image>,
    pub title: Option<Title>,
    pub epigraphs: Vec<Epigraph>,
    pub sections: Vec<Section>,
}

impl Body {
    /// Footnote bodies are named `notes` or `comments`.
    pub fn is_notes(&self) -> bool {
        matches!(self.name.as_deref(), Some("notes") | Some("comments"))
    }
}

/// A `<section>`, recursively nested.
#[derive(Debug, Default, Clone)]
pub struct Section {
    pub id: Option<String>,
    pub title: Option<Title>,
    pub epigraphs: Vec<Epigraph>,
    pub image: Option<Image>,
    pub annotation: Vec<FlowItem>,
    pub content: Vec<FlowItem>,
}

impl Section {
    /// True when the section holds nested sections rather than flow items.
    pub fn has_subsections(&self) -> bool {
        self.content
            .iter()
            .any(|item| matches!(item, FlowItem::Section(_)))
    }
}

/// A title block: paragraphs and empty lines.
#[derive(Debug, Default, Clone)]
pub struct Title {
    pub lines: Vec<TitleLine>,
}

#[derive(Debug, Clone)]
pub enum TitleLine {
    Paragraph(Paragraph),
    EmptyLine,
}

impl Title {
    /// Collapse the title to plain text (TOC labels).
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            if let TitleLine::Paragraph(p) = line {
                let text = p.plain_text();
                let text = text.trim();
                if !text.is_empty() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(text);
                }
            }
        }
        out
    }

    /// True when any title line contains an inline image.
    pub fn has_images(&self) -> bool {
        self.lines.iter().any(|line| match line {
            TitleLine::Paragraph(p) => p.has_images(),
            TitleLine::EmptyLine => false,
        })
    }
}

/// An `<epigraph>`: flow items plus text-author lines.
#[derive(Debug, Default, Clone)]
pub struct Epigraph {
    pub items: Vec<FlowItem>,
    pub authors: Vec<Paragraph>,
}

/// One item of section-level flow content.
#[derive(Debug, Clone)]
pub enum FlowItem {
    Paragraph(Paragraph),
    Subtitle(Paragraph),
    EmptyLine,
    Poem(Poem),
    Cite(Cite),
    Table(Table),
    Image(Image),
    Section(Section),
}

/// A paragraph-like run of inline segments.
#[derive(Debug, Default, Clone)]
pub struct Paragraph {
    pub id: Option<String>,
    /// `style` attribute: an extra class for this paragraph.
    pub style: Option<String>,
    pub segments: Vec<Segment>,
}

impl Paragraph {
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.segments, &mut out);
        out
    }

    pub fn has_images(&self) -> bool {
        segments_have_images(&self.segments)
    }
}

fn collect_text(segments: &[Segment], out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Image(_) => {}
            Segment::Span(span) => collect_text(&span.segments, out),
        }
    }
}

fn segments_have_images(segments: &[Segment]) -> bool {
    segments.iter().any(|segment| match segment {
        Segment::Image(_) => true,
        Segment::Span(span) => segments_have_images(&span.segments),
        Segment::Text(_) => false,
    })
}

/// One inline segment of a paragraph.
#[derive(Debug, Clone)]
pub enum Segment {
    Text(String),
    Image(Image),
    Span(Span),
}

/// A styled inline element wrapping nested segments.
#[derive(Debug, Clone)]
pub struct Span {
    pub tag: SpanTag,
    /// Link target for `<a>`, as written (usually `#id`).
    pub href: Option<String>,
    /// `name` attribute of `<style>` spans.
    pub class: Option<String>,
    pub segments: Vec<Segment>,
}

/// FB2 inline element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanTag {
    Strong,
    Emphasis,
    Style,
    Link,
    Strikethrough,
    Sub,
    Sup,
    Code,
}

impl SpanTag {
    /// The style name this element resolves through.
    pub fn style_name(self) -> &'static str {
        match self {
            SpanTag::Strong => "strong",
            SpanTag::Emphasis => "emphasis",
            SpanTag::Style => "style",
            SpanTag::Link => "a",
            SpanTag::Strikethrough => "strikethrough",
            SpanTag::Sub => "sub",
            SpanTag::Sup => "sup",
            SpanTag::Code => "code",
        }
    }

    /// Code spans keep their whitespace verbatim.
    pub fn preserves_whitespace(self) -> bool {
        self == SpanTag::Code
    }
}

/// A `<poem>`.
#[derive(Debug, Default, Clone)]
pub struct Poem {
    pub id: Option<String>,
    pub title: Option<Title>,
    pub epigraphs: Vec<Epigraph>,
    pub stanzas: Vec<Stanza>,
    pub authors: Vec<Paragraph>,
}

/// A `<stanza>`: verse lines.
#[derive(Debug, Default, Clone)]
pub struct Stanza {
    pub title: Option<Title>,
    pub subtitle: Option<Paragraph>,
    pub lines: Vec<Paragraph>,
}

/// A `<cite>`.
#[derive(Debug, Default, Clone)]
pub struct Cite {
    pub id: Option<String>,
    pub items: Vec<FlowItem>,
    pub authors: Vec<Paragraph>,
}

/// A `<table>`.
#[derive(Debug, Default, Clone)]
pub struct Table {
    pub id: Option<String>,
    pub style: Option<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Default, Clone)]
pub struct TableRow {
    pub align: Option<String>,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone)]
pub struct TableCell {
    /// `<th>` vs `<td>`.
    pub header: bool,
    pub id: Option<String>,
    pub colspan: u32,
    pub rowspan: u32,
    pub align: Option<String>,
    pub segments: Vec<Segment>,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            header: false,
            id: None,
            colspan: 1,
            rowspan: 1,
            align: None,
            segments: Vec::new(),
        }
    }
}

/// An `<image>` reference.
#[derive(Debug, Default, Clone)]
pub struct Image {
    /// As written, usually `#binary-id`.
    pub href: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub id: Option<String>,
}

impl Image {
    /// Binary/resource id: the href with a leading `#` stripped.
    pub fn resource_id(&self) -> &str {
        self.href.strip_prefix('#').unwrap_or(&self.href)
    }
}
