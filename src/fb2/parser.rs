//! FB2 document loader.
//!
//! Streaming parse over `quick-xml` events into the [`Book`] tree.
//! FB2 files in the wild are frequently windows-1251; the byte entry
//! point sniffs the XML prolog and decodes through `encoding_rs` before
//! parsing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use encoding_rs::Encoding;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{Error, Result};

use super::{
    Binary, Body, Book, Cite, Epigraph, FlowItem, Image, Paragraph, Poem, Section, Segment, Span,
    SpanTag, Stanza, Table, TableCell, TableRow, Title, TitleLine,
};

type XmlReader<'a> = Reader<&'a [u8]>;

/// Parse an FB2 document from raw bytes, decoding the declared charset.
pub fn parse_fb2(bytes: &[u8]) -> Result<Book> {
    let text = decode_xml(bytes);
    parse_fb2_str(&text)
}

/// Parse an FB2 document from a UTF-8 string.
pub fn parse_fb2_str(xml: &str) -> Result<Book> {
    let mut reader = Reader::from_str(xml);
    let mut book = Book::default();
    let mut in_title_info = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"title-info" => in_title_info = true,
                b"book-title" if in_title_info => {
                    book.title = Some(read_text(&mut reader, b"book-title")?);
                }
                b"lang" if in_title_info && book.lang.is_none() => {
                    book.lang = Some(read_text(&mut reader, b"lang")?);
                }
                b"coverpage" if in_title_info => {
                    if let Some(image) = find_coverpage_image(&mut reader)? {
                        book.cover = Some(image.resource_id().to_string());
                    }
                }
                b"body" => {
                    let body = parse_body(&mut reader, &e)?;
                    book.bodies.push(body);
                }
                b"binary" => {
                    if let Some(binary) = parse_binary(&mut reader, &e)? {
                        book.binaries.push(binary);
                    }
                }
                _ => {}
            },
            Event::End(e) => {
                if local(e.name().as_ref()) == b"title-info" {
                    in_title_info = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if book.bodies.is_empty() {
        return Err(Error::InvalidFb2("no body element".to_string()));
    }
    Ok(book)
}

/// Decode raw bytes to UTF-8, honoring a BOM or the prolog encoding.
fn decode_xml(bytes: &[u8]) -> String {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding.decode(bytes).0.into_owned();
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).into_owned();
    if let Some(after) = head.split("encoding=").nth(1) {
        let label = after.trim_start_matches(['"', '\'']);
        let end = label.find(['"', '\'']).unwrap_or(label.len());
        if let Some(encoding) = Encoding::for_label(label[..end].as_bytes()) {
            return encoding.decode(bytes).0.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn parse_body(reader: &mut XmlReader, start: &BytesStart) -> Result<Body> {
    let mut body = Body {
        name: attr_of(start, "name"),
        ..Default::default()
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match local(&name) {
                    b"title" => body.title = Some(parse_title(reader)?),
                    b"epigraph" => body.epigraphs.push(parse_epigraph(reader)?),
                    b"image" => {
                        let image = image_from(&e);
                        skip_element(reader)?;
                        if body.sections.is_empty() && body.image.is_none() {
                            body.image = Some(image);
                        }
                    }
                    b"section" => {
                        let section = parse_section(reader, &e)?;
                        body.sections.push(section);
                    }
                    _ => skip_element(reader)?,
                }
            }
            Event::Empty(e) => {
                if local(e.name().as_ref()) == b"image"
                    && body.sections.is_empty()
                    && body.image.is_none()
                {
                    body.image = Some(image_from(&e));
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"body" => break,
            Event::Eof => return Err(unclosed("body")),
            _ => {}
        }
    }
    Ok(body)
}

fn parse_section(reader: &mut XmlReader, start: &BytesStart) -> Result<Section> {
    let mut section = Section {
        id: attr_of(start, "id"),
        ..Default::default()
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match local(&name) {
                    b"title" => section.title = Some(parse_title(reader)?),
                    b"epigraph" => section.epigraphs.push(parse_epigraph(reader)?),
                    b"annotation" => {
                        let (items, _) = parse_flow(reader, b"annotation")?;
                        section.annotation = items;
                    }
                    b"image" => {
                        let image = image_from(&e);
                        skip_element(reader)?;
                        place_section_image(&mut section, image);
                    }
                    b"section" => {
                        let nested = parse_section(reader, &e)?;
                        section.content.push(FlowItem::Section(nested));
                    }
                    b"p" => {
                        let p = parse_paragraph(reader, &e, b"p")?;
                        section.content.push(FlowItem::Paragraph(p));
                    }
                    b"subtitle" => {
                        let p = parse_paragraph(reader, &e, b"subtitle")?;
                        section.content.push(FlowItem::Subtitle(p));
                    }
                    b"poem" => {
                        let poem = parse_poem(reader, &e)?;
                        section.content.push(FlowItem::Poem(poem));
                    }
                    b"cite" => {
                        let cite = parse_cite(reader, &e)?;
                        section.content.push(FlowItem::Cite(cite));
                    }
                    b"table" => {
                        let table = parse_table(reader, &e)?;
                        section.content.push(FlowItem::Table(table));
                    }
                    other => {
                        debug!(
                            element = %String::from_utf8_lossy(other),
                            "skipping unknown section element"
                        );
                        skip_element(reader)?;
                    }
                }
            }
            Event::Empty(e) => match local(e.name().as_ref()) {
                b"empty-line" => section.content.push(FlowItem::EmptyLine),
                b"image" => place_section_image(&mut section, image_from(&e)),
                _ => {}
            },
            Event::End(e) if local(e.name().as_ref()) == b"section" => break,
            Event::Eof => return Err(unclosed("section")),
            _ => {}
        }
    }
    Ok(section)
}

/// An image before any flow content belongs to the section header.
fn place_section_image(section: &mut Section, image: Image) {
    if section.content.is_empty() && section.image.is_none() {
        section.image = Some(image);
    } else {
        section.content.push(FlowItem::Image(image));
    }
}

fn parse_title(reader: &mut XmlReader) -> Result<Title> {
    let mut title = Title::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match local(&name) {
                    b"p" => {
                        let p = parse_paragraph(reader, &e, b"p")?;
                        title.lines.push(TitleLine::Paragraph(p));
                    }
                    _ => skip_element(reader)?,
                }
            }
            Event::Empty(e) => {
                if local(e.name().as_ref()) == b"empty-line" {
                    title.lines.push(TitleLine::EmptyLine);
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"title" => break,
            Event::Eof => return Err(unclosed("title")),
            _ => {}
        }
    }
    Ok(title)
}

fn parse_epigraph(reader: &mut XmlReader) -> Result<Epigraph> {
    let (items, authors) = parse_flow(reader, b"epigraph")?;
    Ok(Epigraph { items, authors })
}

/// Parse mixed flow content until `end`. Shared by epigraph, cite and
/// annotation bodies; `text-author` lines are returned separately.
fn parse_flow(reader: &mut XmlReader, end: &[u8]) -> Result<(Vec<FlowItem>, Vec<Paragraph>)> {
    let mut items = Vec::new();
    let mut authors = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match local(&name) {
                    b"p" => items.push(FlowItem::Paragraph(parse_paragraph(reader, &e, b"p")?)),
                    b"subtitle" => {
                        items.push(FlowItem::Subtitle(parse_paragraph(reader, &e, b"subtitle")?));
                    }
                    b"poem" => items.push(FlowItem::Poem(parse_poem(reader, &e)?)),
                    b"cite" => items.push(FlowItem::Cite(parse_cite(reader, &e)?)),
                    b"table" => items.push(FlowItem::Table(parse_table(reader, &e)?)),
                    b"image" => {
                        let image = image_from(&e);
                        skip_element(reader)?;
                        items.push(FlowItem::Image(image));
                    }
                    b"text-author" => authors.push(parse_paragraph(reader, &e, b"text-author")?),
                    _ => skip_element(reader)?,
                }
            }
            Event::Empty(e) => match local(e.name().as_ref()) {
                b"empty-line" => items.push(FlowItem::EmptyLine),
                b"image" => items.push(FlowItem::Image(image_from(&e))),
                _ => {}
            },
            Event::End(e) if local(e.name().as_ref()) == end => break,
            Event::Eof => return Err(unclosed(&String::from_utf8_lossy(end))),
            _ => {}
        }
    }
    Ok((items, authors))
}

fn parse_poem(reader: &mut XmlReader, start: &BytesStart) -> Result<Poem> {
    let mut poem = Poem {
        id: attr_of(start, "id"),
        ..Default::default()
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match local(&name) {
                    b"title" => poem.title = Some(parse_title(reader)?),
                    b"epigraph" => poem.epigraphs.push(parse_epigraph(reader)?),
                    b"stanza" => poem.stanzas.push(parse_stanza(reader)?),
                    b"text-author" => {
                        poem.authors.push(parse_paragraph(reader, &e, b"text-author")?);
                    }
                    _ => skip_element(reader)?,
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"poem" => break,
            Event::Eof => return Err(unclosed("poem")),
            _ => {}
        }
    }
    Ok(poem)
}

fn parse_stanza(reader: &mut XmlReader) -> Result<Stanza> {
    let mut stanza = Stanza::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match local(&name) {
                    b"title" => stanza.title = Some(parse_title(reader)?),
                    b"subtitle" => stanza.subtitle = Some(parse_paragraph(reader, &e, b"subtitle")?),
                    b"v" => stanza.lines.push(parse_paragraph(reader, &e, b"v")?),
                    _ => skip_element(reader)?,
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"stanza" => break,
            Event::Eof => return Err(unclosed("stanza")),
            _ => {}
        }
    }
    Ok(stanza)
}

fn parse_cite(reader: &mut XmlReader, start: &BytesStart) -> Result<Cite> {
    let id = attr_of(start, "id");
    let (items, authors) = parse_flow(reader, b"cite")?;
    Ok(Cite { id, items, authors })
}

fn parse_table(reader: &mut XmlReader, start: &BytesStart) -> Result<Table> {
    let mut table = Table {
        id: attr_of(start, "id"),
        style: attr_of(start, "style"),
        ..Default::default()
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match local(&name) {
                    b"tr" => {
                        let mut row = TableRow {
                            align: attr_of(&e, "align"),
                            ..Default::default()
                        };
                        parse_table_row(reader, &mut row)?;
                        table.rows.push(row);
                    }
                    _ => skip_element(reader)?,
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"table" => break,
            Event::Eof => return Err(unclosed("table")),
            _ => {}
        }
    }
    Ok(table)
}

fn parse_table_row(reader: &mut XmlReader, row: &mut TableRow) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match local(&name) {
                    tag @ (b"td" | b"th") => {
                        let cell = TableCell {
                            header: tag == b"th",
                            id: attr_of(&e, "id"),
                            colspan: numeric_attr(&e, "colspan").unwrap_or(1),
                            rowspan: numeric_attr(&e, "rowspan").unwrap_or(1),
                            align: attr_of(&e, "align"),
                            segments: parse_segments(reader, tag)?,
                        };
                        row.cells.push(cell);
                    }
                    _ => skip_element(reader)?,
                }
            }
            Event::Empty(e) => {
                let name = e.name().as_ref().to_vec();
                if let tag @ (b"td" | b"th") = local(&name) {
                    row.cells.push(TableCell {
                        header: tag == b"th",
                        id: attr_of(&e, "id"),
                        colspan: numeric_attr(&e, "colspan").unwrap_or(1),
                        rowspan: numeric_attr(&e, "rowspan").unwrap_or(1),
                        align: attr_of(&e, "align"),
                        ..Default::default()
                    });
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"tr" => break,
            Event::Eof => return Err(unclosed("tr")),
            _ => {}
        }
    }
    Ok(())
}

fn parse_paragraph(reader: &mut XmlReader, start: &BytesStart, end: &[u8]) -> Result<Paragraph> {
    Ok(Paragraph {
        id: attr_of(start, "id"),
        style: attr_of(start, "style"),
        segments: parse_segments(reader, end)?,
    })
}

/// Parse inline content until the closing tag named `end`.
fn parse_segments(reader: &mut XmlReader, end: &[u8]) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Text(t) => {
                let raw = String::from_utf8_lossy(t.as_ref()).into_owned();
                segments.push(Segment::Text(unescape_text(&raw)));
            }
            Event::CData(t) => {
                segments.push(Segment::Text(
                    String::from_utf8_lossy(t.as_ref()).into_owned(),
                ));
            }
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match span_tag(local(&name)) {
                    Some(tag) => {
                        let span = Span {
                            tag,
                            href: attr_of(&e, "href"),
                            class: attr_of(&e, "name"),
                            segments: parse_segments(reader, local(&name))?,
                        };
                        segments.push(Segment::Span(span));
                    }
                    None => {
                        if local(&name) == b"image" {
                            let image = image_from(&e);
                            skip_element(reader)?;
                            segments.push(Segment::Image(image));
                        } else {
                            skip_element(reader)?;
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if local(e.name().as_ref()) == b"image" {
                    segments.push(Segment::Image(image_from(&e)));
                }
            }
            Event::End(e) if local(e.name().as_ref()) == end => break,
            Event::Eof => return Err(unclosed(&String::from_utf8_lossy(end))),
            _ => {}
        }
    }
    Ok(segments)
}

fn span_tag(name: &[u8]) -> Option<SpanTag> {
    match name {
        b"strong" => Some(SpanTag::Strong),
        b"emphasis" => Some(SpanTag::Emphasis),
        b"style" => Some(SpanTag::Style),
        b"a" => Some(SpanTag::Link),
        b"strikethrough" => Some(SpanTag::Strikethrough),
        b"sub" => Some(SpanTag::Sub),
        b"sup" => Some(SpanTag::Sup),
        b"code" => Some(SpanTag::Code),
        _ => None,
    }
}

fn parse_binary(reader: &mut XmlReader, start: &BytesStart) -> Result<Option<Binary>> {
    let id = attr_of(start, "id");
    let content_type = attr_of(start, "content-type").unwrap_or_default();
    let text = read_text(reader, b"binary")?;

    let Some(id) = id else {
        debug!("skipping binary without id");
        return Ok(None);
    };

    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    match BASE64.decode(cleaned.as_bytes()) {
        Ok(data) => Ok(Some(Binary {
            id,
            content_type,
            data,
        })),
        Err(err) => {
            debug!(%id, %err, "skipping undecodable binary");
            Ok(None)
        }
    }
}

fn find_coverpage_image(reader: &mut XmlReader) -> Result<Option<Image>> {
    let mut image = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if local(&name) == b"image" {
                    image.get_or_insert(image_from(&e));
                    skip_element(reader)?;
                } else {
                    skip_element(reader)?;
                }
            }
            Event::Empty(e) => {
                if local(e.name().as_ref()) == b"image" {
                    image.get_or_insert(image_from(&e));
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"coverpage" => break,
            Event::Eof => return Err(unclosed("coverpage")),
            _ => {}
        }
    }
    Ok(image)
}

fn image_from(e: &BytesStart) -> Image {
    Image {
        href: attr_of(e, "href").unwrap_or_default(),
        alt: attr_of(e, "alt"),
        title: attr_of(e, "title"),
        id: attr_of(e, "id"),
    }
}

/// Accumulate text content until the closing tag named `end`.
fn read_text(reader: &mut XmlReader, end: &[u8]) -> Result<String> {
    let mut out = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => {
                let raw = String::from_utf8_lossy(t.as_ref()).into_owned();
                out.push_str(&unescape_text(&raw));
            }
            Event::CData(t) => out.push_str(&String::from_utf8_lossy(t.as_ref())),
            Event::End(e) if local(e.name().as_ref()) == end => break,
            Event::Eof => return Err(unclosed(&String::from_utf8_lossy(end))),
            _ => {}
        }
    }
    Ok(out.trim().to_string())
}

/// Consume events until the current element's matching end tag.
fn skip_element(reader: &mut XmlReader) -> Result<()> {
    let mut depth = 1usize;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => return Err(Error::InvalidFb2("unexpected end of document".to_string())),
            _ => {}
        }
    }
    Ok(())
}

/// Local part of a possibly-prefixed element name.
fn local(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Fetch an attribute by local name (matches both `href` and `l:href`).
fn attr_of(e: &BytesStart, wanted: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if local(attr.key.as_ref()) == wanted.as_bytes() {
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            return Some(unescape_text(&raw));
        }
    }
    None
}

fn numeric_attr(e: &BytesStart, wanted: &str) -> Option<u32> {
    attr_of(e, wanted).and_then(|v| v.trim().parse().ok())
}

fn unescape_text(raw: &str) -> String {
    unescape(raw)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn unclosed(element: &str) -> Error {
    Error::InvalidFb2(format!("unclosed element: {element}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0"
             xmlns:l="http://www.w3.org/1999/xlink">
  <description>
    <title-info>
      <book-title>Тестовая книга</book-title>
      <lang>ru</lang>
      <coverpage><image l:href="#cover.jpg"/></coverpage>
    </title-info>
  </description>
  <body>
    <title><p>Test Book</p></title>
    <section id="ch1">
      <title><p>Chapter One</p></title>
      <p>First <strong>bold</strong> paragraph with a
         <a l:href="#n1" type="note">note</a>.</p>
      <empty-line/>
      <p>Second paragraph with <image l:href="#pic.png" alt="scheme"/> inline.</p>
    </section>
  </body>
  <body name="notes">
    <section id="n1"><title><p>1</p></title><p>The note text.</p></section>
  </body>
  <binary id="cover.jpg" content-type="image/jpeg">/9j/4AAQ</binary>
</FictionBook>"##;

    #[test]
    fn test_parse_sample_structure() {
        let book = parse_fb2_str(SAMPLE).unwrap();
        assert_eq!(book.title.as_deref(), Some("Тестовая книга"));
        assert_eq!(book.lang.as_deref(), Some("ru"));
        assert_eq!(book.cover.as_deref(), Some("cover.jpg"));
        assert_eq!(book.bodies.len(), 2);
        assert!(book.bodies[1].is_notes());

        let body = &book.bodies[0];
        assert_eq!(body.title.as_ref().unwrap().plain_text(), "Test Book");
        assert_eq!(body.sections.len(), 1);

        let section = &body.sections[0];
        assert_eq!(section.id.as_deref(), Some("ch1"));
        assert_eq!(section.content.len(), 3);
        assert!(matches!(section.content[1], FlowItem::EmptyLine));
    }

    #[test]
    fn test_parse_inline_spans() {
        let book = parse_fb2_str(SAMPLE).unwrap();
        let FlowItem::Paragraph(p) = &book.bodies[0].sections[0].content[0] else {
            panic!("expected paragraph");
        };
        let spans: Vec<_> = p
            .segments
            .iter()
            .filter_map(|s| match s {
                Segment::Span(span) => Some(span),
                _ => None,
            })
            .collect();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].tag, SpanTag::Strong);
        assert_eq!(spans[1].tag, SpanTag::Link);
        assert_eq!(spans[1].href.as_deref(), Some("#n1"));
    }

    #[test]
    fn test_parse_inline_image_keeps_surrounding_text() {
        let book = parse_fb2_str(SAMPLE).unwrap();
        let FlowItem::Paragraph(p) = &book.bodies[0].sections[0].content[2] else {
            panic!("expected paragraph");
        };
        assert!(p.has_images());
        let Segment::Text(before) = &p.segments[0] else {
            panic!("expected leading text");
        };
        assert!(before.ends_with(' '), "space before image must survive");
    }

    #[test]
    fn test_parse_binary_decodes_base64() {
        let book = parse_fb2_str(SAMPLE).unwrap();
        assert_eq!(book.binaries.len(), 1);
        assert_eq!(book.binaries[0].id, "cover.jpg");
        assert_eq!(book.binaries[0].content_type, "image/jpeg");
        assert!(!book.binaries[0].data.is_empty());
    }

    #[test]
    fn test_decode_windows_1251() {
        let xml = "<?xml version=\"1.0\" encoding=\"windows-1251\"?>\
                   <FictionBook><body><section><p>Привет</p></section></body></FictionBook>";
        let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode(xml);
        let book = parse_fb2(&encoded).unwrap();
        let FlowItem::Paragraph(p) = &book.bodies[0].sections[0].content[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.plain_text(), "Привет");
    }

    #[test]
    fn test_missing_body_is_invalid() {
        let err = parse_fb2_str("<FictionBook></FictionBook>").unwrap_err();
        assert!(matches!(err, Error::InvalidFb2(_)));
    }
}
