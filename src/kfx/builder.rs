//! Book conversion: the FB2 walk.
//!
//! Drives the whole pipeline: translates the stylesheet, walks bodies
//! and sections into storyline/section fragments, defers footnote bodies
//! to a final section, and closes with anchors, navigation and the
//! accumulated content fragments. Either the complete fragment graph is
//! produced or the first unrecoverable condition aborts with no output.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::css::Stylesheet;
use crate::error::{Error, Result};
use crate::fb2::{
    Body, Book, Cite, Epigraph, FlowItem, Paragraph, Poem, Section, Table, Title, TitleLine,
};

use super::content::ContentAccumulator;
use super::fragment::{Fragment, FragmentList};
use super::inline::{ParagraphWalker, StyleEventRef, segment_nested_style_events, walk_paragraph};
use super::navigation::{
    Landmarks, TocEntry, approximate_page_list, build_anchor, build_book_navigation,
    is_auto_section_name,
};
use super::storyline::{
    BuiltSection, CellContent, PageTemplate, StorylineBuilder, TableCellSpec, TableRowSpec,
    TableSpec, TextEntry,
};
use super::style::{StyleContext, StyleDef, StyleRegistry, Usage};
use super::symbols::sym;
use super::translator::translate_stylesheet;
use super::value::{PropertyMap, Value};
use super::warnings::Warnings;

/// An image resource provided by the caller.
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub resource_name: String,
    pub width: u32,
    pub height: u32,
}

/// FB2 binary id → resource.
pub type ImageResources = HashMap<String, ImageResource>;

/// Conversion knobs.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// First EID handed out; the cover (or first) section's page
    /// template takes it.
    pub start_eid: u64,
    /// Runes per approximate page; 0 disables the page list.
    pub page_size: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            start_eid: 1,
            page_size: 2300,
        }
    }
}

/// A completed conversion: the fragment graph, the styles it references,
/// and accumulated warnings.
#[derive(Debug)]
pub struct Conversion {
    pub fragments: FragmentList,
    pub styles: Vec<StyleDef>,
    pub warnings: Vec<String>,
}

/// Convert a book and its stylesheet into a KFX fragment graph.
pub fn convert(
    book: &Book,
    sheet: &Stylesheet,
    resources: &ImageResources,
    options: &ConvertOptions,
) -> Result<Conversion> {
    let mut builder = DocumentBuilder::new(book, resources, options.clone());
    translate_stylesheet(sheet, &mut builder.registry, &mut builder.warnings);
    builder.registry.post_process_for_kfx();
    builder.run()
}

struct DocumentBuilder<'a> {
    book: &'a Book,
    resources: &'a ImageResources,
    options: ConvertOptions,
    registry: StyleRegistry,
    warnings: Warnings,
    accumulator: ContentAccumulator,
    fragments: FragmentList,
    next_eid: u64,
    section_counter: usize,
    /// Footnote section ids; presence marks a link as a footnote link.
    footnotes: HashSet<String>,
    /// FB2 id → EID of the entry carrying it.
    id_eids: HashMap<String, u64>,
    /// Link targets in order of first reference.
    referenced: Vec<String>,
    referenced_seen: HashSet<String>,
    /// (EID, rune count) per text entry, for the page list.
    positions: Vec<(u64, usize)>,
    toc: Vec<TocEntry>,
    cover_eid: Option<u64>,
    srl_eid: Option<u64>,
}

impl<'a> DocumentBuilder<'a> {
    fn new(book: &'a Book, resources: &'a ImageResources, options: ConvertOptions) -> Self {
        let mut footnotes = HashSet::new();
        for body in &book.bodies {
            if body.is_notes() {
                collect_note_ids(&body.sections, &mut footnotes);
            }
        }

        Self {
            book,
            resources,
            next_eid: options.start_eid,
            options,
            registry: StyleRegistry::new(),
            warnings: Warnings::new(),
            accumulator: ContentAccumulator::new(),
            fragments: FragmentList::new(),
            section_counter: 0,
            footnotes,
            id_eids: HashMap::new(),
            referenced: Vec::new(),
            referenced_seen: HashSet::new(),
            positions: Vec::new(),
            toc: Vec::new(),
            cover_eid: None,
            srl_eid: None,
        }
    }

    fn run(mut self) -> Result<Conversion> {
        self.add_cover()?;

        let book = self.book;
        for body in &book.bodies {
            if !body.is_notes() {
                self.process_body(body)?;
            }
        }
        self.process_footnotes()?;
        self.add_anchors()?;
        self.add_navigation()?;
        self.add_content_fragments()?;

        self.registry.drop_unused();
        let styles = self.registry.styles_in_order().cloned().collect();
        Ok(Conversion {
            fragments: self.fragments,
            styles,
            warnings: self.warnings.into_vec(),
        })
    }

    fn next_section_name(&mut self) -> String {
        self.section_counter += 1;
        format!("c{}", self.section_counter)
    }

    fn reference(&mut self, id: &str) {
        if self.referenced_seen.insert(id.to_string()) {
            self.referenced.push(id.to_string());
        }
    }

    fn record_id(&mut self, id: &Option<String>, eid: u64) {
        if let Some(id) = id {
            self.id_eids.entry(id.clone()).or_insert(eid);
        }
    }

    // ------------------------------------------------------------------
    // Cover
    // ------------------------------------------------------------------

    fn add_cover(&mut self) -> Result<()> {
        let book = self.book;
        let Some(cover_id) = &book.cover else {
            return Ok(());
        };
        let resource = self
            .resources
            .get(cover_id)
            .ok_or_else(|| Error::MissingResource(cover_id.clone()))?
            .clone();

        let mut builder = StorylineBuilder::new("story-cover", "cover", self.next_eid)
            .with_page_template(PageTemplate::FixedContainer {
                width: resource.width as i64,
                height: resource.height as i64,
            });

        let ctx = StyleContext::new();
        let style = self
            .registry
            .resolve("image", &["coverpage".to_string()], &ctx);
        self.registry.mark_used(&style, Usage::Image);
        let eid = builder.add_image(resource.resource_name.clone(), Some(style), None)?;
        self.cover_eid = Some(eid);

        self.next_eid = builder.next_eid();
        let built = builder.finish();
        self.fragments.push(built.storyline)?;
        self.fragments.push(built.section)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bodies and sections
    // ------------------------------------------------------------------

    fn process_body(&mut self, body: &Body) -> Result<()> {
        let ctx = StyleContext::new();

        // Intro material (image, title block, epigraphs) forms its own
        // section ahead of the chapters.
        if body.image.is_some() || body.title.is_some() || !body.epigraphs.is_empty() {
            let section_name = self.next_section_name();
            let story_name = format!("story-{}", self.section_counter);
            let mut sb = StorylineBuilder::new(story_name, section_name, self.next_eid);

            if let Some(image) = &body.image {
                self.add_image_entry(&mut sb, image, &ctx, &[])?;
            }
            let mut title_eid = None;
            if let Some(title) = &body.title {
                title_eid = self.add_title_block(&mut sb, title, &ctx, "body-title", Some(1))?;
            }
            for epigraph in &body.epigraphs {
                self.add_epigraph(&mut sb, epigraph, &ctx)?;
            }

            let built = self.finish_section(sb)?;
            if let Some(built) = &built {
                if let (Some(title), Some(eid)) = (&body.title, title_eid.or_else(|| {
                    built.entries.first().map(|e| e.eid)
                })) {
                    self.toc.push(TocEntry::new(title.plain_text(), eid));
                }
            }
        }

        for section in &body.sections {
            let entry = self.process_chapter(section)?;
            if let Some(entry) = entry {
                self.toc.push(entry);
            }
        }
        Ok(())
    }

    /// Each top-level section becomes its own chapter: one storyline and
    /// one section fragment.
    fn process_chapter(&mut self, section: &Section) -> Result<Option<TocEntry>> {
        let section_name = self.next_section_name();
        let story_name = format!("story-{}", self.section_counter);
        let mut sb = StorylineBuilder::new(story_name, section_name, self.next_eid);

        let ctx = StyleContext::new();
        let toc = self.walk_section(&mut sb, section, &ctx, 1)?;
        let built = self.finish_section(sb)?;
        Ok(built.and(toc))
    }

    /// Close a storyline builder into fragments, unless it stayed empty.
    fn finish_section(&mut self, sb: StorylineBuilder) -> Result<Option<BuiltSection>> {
        if sb.is_empty() {
            // The reserved page-template EID is reused by the next
            // section; no gap appears in the allocated range.
            return Ok(None);
        }
        self.next_eid = sb.next_eid();
        let built = sb.finish();
        if self.srl_eid.is_none() {
            self.srl_eid = built.entries.first().map(|e| e.eid);
        }
        self.fragments.push(built.storyline.clone())?;
        self.fragments.push(built.section.clone())?;
        Ok(Some(built))
    }

    /// Walk one section's content into the current storyline; nested
    /// sections recurse for the TOC hierarchy. Returns `None` when the
    /// section subtree emitted nothing.
    fn walk_section(
        &mut self,
        sb: &mut StorylineBuilder,
        section: &Section,
        ctx: &StyleContext,
        depth: usize,
    ) -> Result<Option<TocEntry>> {
        let first_eid = sb.next_eid();

        let base_class = if depth == 1 {
            "chapter-title"
        } else {
            "section-title"
        };
        let level = if depth == 1 { 1 } else { depth.min(4) as u8 };

        let mut heading_eid = None;
        if let Some(title) = &section.title {
            heading_eid = self.add_title_block(sb, title, ctx, base_class, Some(level))?;
        }
        for epigraph in &section.epigraphs {
            self.add_epigraph(sb, epigraph, ctx)?;
        }
        if let Some(image) = &section.image {
            self.add_image_entry(sb, image, ctx, &[])?;
        }
        if !section.annotation.is_empty() {
            sb.start_block("annotation");
            let inner = ctx.push("div", &["annotation".to_string()], &self.registry);
            for item in &section.annotation {
                self.process_flow_item(sb, item, &inner)?;
            }
            let eid = sb.end_block(&mut self.registry)?;
            if let Some(eid) = eid {
                self.record_position_less_entry(eid);
            }
        }

        let mut toc = TocEntry::new(
            section
                .title
                .as_ref()
                .map(|t| t.plain_text())
                .unwrap_or_default(),
            heading_eid.unwrap_or(first_eid),
        );

        for item in &section.content {
            match item {
                FlowItem::Section(nested) => {
                    if let Some(child) = self.walk_section(sb, nested, ctx, depth + 1)? {
                        toc.children.push(child);
                    }
                }
                other => self.process_flow_item(sb, other, ctx)?,
            }
        }

        if sb.next_eid() == first_eid {
            // Nothing was emitted; a TOC target or anchor here would
            // point at an EID that is never allocated.
            return Ok(None);
        }
        self.record_id(&section.id, heading_eid.unwrap_or(first_eid));
        Ok(Some(toc))
    }

    fn process_flow_item(
        &mut self,
        sb: &mut StorylineBuilder,
        item: &FlowItem,
        ctx: &StyleContext,
    ) -> Result<()> {
        match item {
            FlowItem::Paragraph(p) => {
                self.add_paragraph(sb, p, ctx, "p", None)?;
            }
            FlowItem::Subtitle(p) => {
                self.add_paragraph(sb, p, ctx, "subtitle", None)?;
            }
            FlowItem::EmptyLine => {
                let style = self.registry.resolve("empty-line", &[], ctx);
                self.registry.mark_used(&style, Usage::Text);
                let content = self.accumulator.append(String::new());
                let eid = sb.add_text(TextEntry {
                    style: Some(style),
                    content,
                    ..Default::default()
                })?;
                self.positions.push((eid, 0));
            }
            FlowItem::Poem(poem) => self.add_poem(sb, poem, ctx)?,
            FlowItem::Cite(cite) => self.add_cite(sb, cite, ctx)?,
            FlowItem::Table(table) => self.add_table(sb, table, ctx)?,
            FlowItem::Image(image) => {
                self.add_image_entry(sb, image, ctx, &[])?;
            }
            FlowItem::Section(_) => {
                debug!("nested section outside section content; skipping");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Paragraphs
    // ------------------------------------------------------------------

    /// Walk one paragraph into a text entry (or a mixed entry when it
    /// contains inline images). Returns the entry EID, or `None` for a
    /// paragraph with no visible content.
    fn add_paragraph(
        &mut self,
        sb: &mut StorylineBuilder,
        paragraph: &Paragraph,
        ctx: &StyleContext,
        tag: &str,
        heading_level: Option<u8>,
    ) -> Result<Option<u64>> {
        let mut classes: Vec<String> = Vec::new();
        if let Some(class) = &paragraph.style {
            classes.push(class.clone());
        }

        let walked = walk_paragraph(&paragraph.segments, &mut self.registry, &self.footnotes);
        if walked.text.is_empty() && !walked.has_images {
            return Ok(None);
        }

        let mut style = self.registry.resolve(tag, &classes, ctx);
        if let Some(spanning) = &walked.spanning_style {
            style = self.registry.merge_styles(&[&style, spanning]);
        }
        self.registry.mark_used(&style, Usage::Text);

        for event in &walked.events {
            if let Some(target) = &event.link_to {
                self.reference(target);
            }
        }
        let events = segment_nested_style_events(walked.events);
        let runes = walked.text.chars().count();

        let eid = if walked.has_images {
            for item in &walked.items {
                if let super::inline::InlineItem::Image { resource, .. } = item {
                    if !self.resources.contains_key(resource) {
                        self.warnings
                            .push(format!("missing image resource: {resource}"));
                    }
                }
            }
            let items = resolve_inline_resources(&walked.items, self.resources);
            sb.add_mixed(Some(style), &items, events, heading_level)?
        } else {
            let content = self.accumulator.append(walked.text.clone());
            sb.add_text(TextEntry {
                style: Some(style),
                content,
                events,
                heading_level,
            })?
        };

        self.positions.push((eid, runes));
        self.record_id(&paragraph.id, eid);
        Ok(Some(eid))
    }

    // ------------------------------------------------------------------
    // Title blocks
    // ------------------------------------------------------------------

    /// Assemble a title block into a single heading entry: lines joined
    /// by newlines with per-line style events. Falls back to separate
    /// paragraphs when any line contains an inline image.
    fn add_title_block(
        &mut self,
        sb: &mut StorylineBuilder,
        title: &Title,
        ctx: &StyleContext,
        base_class: &str,
        level: Option<u8>,
    ) -> Result<Option<u64>> {
        if title.has_images() {
            let mut first_eid = None;
            let mut remaining_level = level;
            for line in &title.lines {
                if let TitleLine::Paragraph(p) = line {
                    let mut para = p.clone();
                    para.style
                        .get_or_insert_with(|| base_class.to_string());
                    let eid = self.add_paragraph(sb, &para, ctx, "p", remaining_level.take())?;
                    if first_eid.is_none() {
                        first_eid = eid;
                    }
                }
            }
            return Ok(first_eid);
        }

        let mut walker = ParagraphWalker::new();
        let mut stack = Vec::new();
        let mut line_index = 0usize;

        for line in &title.lines {
            match line {
                TitleLine::Paragraph(p) => {
                    if !walker.is_empty() {
                        self.add_title_separator(&mut walker, base_class, "-break");
                    }
                    let start = walker.position();
                    walker.walk_segments(
                        &p.segments,
                        &mut stack,
                        false,
                        &mut self.registry,
                        &self.footnotes,
                    );
                    let end = walker.position();
                    if end > start {
                        let suffix = if line_index == 0 { "-first" } else { "-next" };
                        let line_style = self
                            .registry
                            .resolve_style(&format!("{base_class}{suffix}"));
                        self.registry.mark_used(&line_style, Usage::Text);
                        walker.push_event(StyleEventRef {
                            offset: start,
                            length: end - start,
                            style: line_style,
                            link_to: None,
                            is_footnote_link: false,
                        });
                        line_index += 1;
                    }
                }
                TitleLine::EmptyLine => {
                    if !walker.is_empty() {
                        self.add_title_separator(&mut walker, base_class, "-emptyline");
                    }
                }
            }
        }

        let walked = walker.finish(false);
        if walked.text.is_empty() {
            return Ok(None);
        }

        let style = self.registry.resolve_style(base_class);
        self.registry.mark_used(&style, Usage::Text);
        let runes = walked.text.chars().count();
        let events = segment_nested_style_events(walked.events);
        let content = self.accumulator.append(walked.text);
        let eid = sb.add_text(TextEntry {
            style: Some(style),
            content,
            events,
            heading_level: level,
        })?;
        self.positions.push((eid, runes));
        Ok(Some(eid))
    }

    fn add_title_separator(&mut self, walker: &mut ParagraphWalker, base_class: &str, suffix: &str) {
        let offset = walker.position();
        walker.write_structural("\n");
        let style = self.registry.resolve_style(&format!("{base_class}{suffix}"));
        self.registry.mark_used(&style, Usage::Text);
        walker.push_event(StyleEventRef {
            offset,
            length: 1,
            style,
            link_to: None,
            is_footnote_link: false,
        });
    }

    // ------------------------------------------------------------------
    // Wrappers
    // ------------------------------------------------------------------

    fn add_epigraph(
        &mut self,
        sb: &mut StorylineBuilder,
        epigraph: &Epigraph,
        ctx: &StyleContext,
    ) -> Result<()> {
        sb.start_block("epigraph");
        let inner = ctx.push("div", &["epigraph".to_string()], &self.registry);
        for item in &epigraph.items {
            self.process_flow_item(sb, item, &inner)?;
        }
        for author in &epigraph.authors {
            self.add_paragraph(sb, author, &inner, "text-author", None)?;
        }
        sb.end_block(&mut self.registry)?;
        Ok(())
    }

    fn add_poem(&mut self, sb: &mut StorylineBuilder, poem: &Poem, ctx: &StyleContext) -> Result<()> {
        sb.start_block("poem");
        let inner = ctx.push("div", &["poem".to_string()], &self.registry);

        if let Some(title) = &poem.title {
            self.add_title_block(sb, title, &inner, "poem-title", None)?;
        }
        for epigraph in &poem.epigraphs {
            self.add_epigraph(sb, epigraph, &inner)?;
        }
        for stanza in &poem.stanzas {
            sb.start_block("stanza");
            let stanza_ctx = inner.push("div", &["stanza".to_string()], &self.registry);
            if let Some(title) = &stanza.title {
                self.add_title_block(sb, title, &stanza_ctx, "stanza-title", None)?;
            }
            if let Some(subtitle) = &stanza.subtitle {
                self.add_paragraph(sb, subtitle, &stanza_ctx, "subtitle", None)?;
            }
            for line in &stanza.lines {
                self.add_paragraph(sb, line, &stanza_ctx, "v", None)?;
            }
            sb.end_block(&mut self.registry)?;
        }
        for author in &poem.authors {
            self.add_paragraph(sb, author, &inner, "text-author", None)?;
        }

        let eid = sb.end_block(&mut self.registry)?;
        if let Some(eid) = eid {
            self.record_id(&poem.id, eid);
        }
        Ok(())
    }

    fn add_cite(&mut self, sb: &mut StorylineBuilder, cite: &Cite, ctx: &StyleContext) -> Result<()> {
        sb.start_block("cite");
        let inner = ctx.push("div", &["cite".to_string()], &self.registry);
        for item in &cite.items {
            self.process_flow_item(sb, item, &inner)?;
        }
        for author in &cite.authors {
            self.add_paragraph(sb, author, &inner, "text-author", None)?;
        }
        let eid = sb.end_block(&mut self.registry)?;
        if let Some(eid) = eid {
            self.record_id(&cite.id, eid);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tables and images
    // ------------------------------------------------------------------

    fn add_table(&mut self, sb: &mut StorylineBuilder, table: &Table, ctx: &StyleContext) -> Result<()> {
        let mut classes: Vec<String> = Vec::new();
        if let Some(class) = &table.style {
            classes.push(class.clone());
        }
        let style = self.registry.resolve("table", &classes, ctx);
        self.registry.mark_used(&style, Usage::Wrapper);

        // Table-level properties ride on the entry, not the style ref.
        let mut props = PropertyMap::new();
        if let Some(def) = self.registry.get("table") {
            for key in [
                sym::BORDER_COLLAPSE,
                sym::BORDER_SPACING_VERTICAL,
                sym::BORDER_SPACING_HORIZONTAL,
            ] {
                if let Some(value) = def.properties.get(&key) {
                    props.insert(key, value.clone());
                }
            }
        }

        let inner = ctx.push("table", &classes, &self.registry);
        let mut rows = Vec::new();
        for row in &table.rows {
            let mut cells = Vec::new();
            for cell in &row.cells {
                let tag = if cell.header { "th" } else { "td" };
                let cell_style = self.registry.resolve(tag, &[], &inner);
                self.registry.mark_used(&cell_style, Usage::Text);

                let walked =
                    walk_paragraph(&cell.segments, &mut self.registry, &self.footnotes);
                for event in &walked.events {
                    if let Some(target) = &event.link_to {
                        self.reference(target);
                    }
                }
                let content = if walked.has_images {
                    match walked.items.iter().find_map(|item| match item {
                        super::inline::InlineItem::Image { resource, alt } => {
                            Some((resource.clone(), alt.clone()))
                        }
                        _ => None,
                    }) {
                        Some((resource, alt)) => match self.resources.get(&resource) {
                            Some(found) => CellContent::Image {
                                resource: found.resource_name.clone(),
                                style: None,
                                alt,
                            },
                            None => {
                                self.warnings
                                    .push(format!("missing image resource: {resource}"));
                                CellContent::Empty
                            }
                        },
                        None => CellContent::Empty,
                    }
                } else if walked.text.is_empty() {
                    CellContent::Empty
                } else {
                    let events = segment_nested_style_events(walked.events);
                    CellContent::Text {
                        style: Some(cell_style.clone()),
                        content: self.accumulator.append(walked.text),
                        events,
                    }
                };

                cells.push(TableCellSpec {
                    style: Some(cell_style),
                    colspan: cell.colspan,
                    rowspan: cell.rowspan,
                    content,
                });
            }
            rows.push(TableRowSpec {
                style: None,
                cells,
            });
        }

        let eid = sb.add_table(TableSpec {
            style: Some(style),
            props,
            rows,
        })?;
        self.record_id(&table.id, eid);
        Ok(())
    }

    fn add_image_entry(
        &mut self,
        sb: &mut StorylineBuilder,
        image: &crate::fb2::Image,
        ctx: &StyleContext,
        classes: &[String],
    ) -> Result<Option<u64>> {
        let Some(resource) = self.resources.get(image.resource_id()) else {
            self.warnings.push(format!(
                "missing image resource: {}",
                image.resource_id()
            ));
            return Ok(None);
        };

        let style = self.registry.resolve("image", classes, ctx);
        self.registry.mark_used(&style, Usage::Image);
        let eid = sb.add_image(
            resource.resource_name.clone(),
            Some(style),
            image.alt.clone(),
        )?;
        self.record_id(&image.id, eid);
        Ok(Some(eid))
    }

    // ------------------------------------------------------------------
    // Footnotes
    // ------------------------------------------------------------------

    /// Footnote bodies are deferred and emitted last as one section with
    /// a `footnote` wrapper around each note.
    fn process_footnotes(&mut self) -> Result<()> {
        let book = self.book;
        let notes: Vec<&Body> = book.bodies.iter().filter(|b| b.is_notes()).collect();
        if notes.is_empty() {
            return Ok(());
        }

        let mut sb = StorylineBuilder::new("story-notes", "notes", self.next_eid);
        let ctx = StyleContext::new();

        for body in notes {
            if let Some(title) = &body.title {
                self.add_title_block(&mut sb, title, &ctx, "footnote-title", Some(1))?;
            }
            for section in &body.sections {
                self.add_footnote(&mut sb, section, &ctx)?;
            }
        }

        self.finish_section(sb)?;
        Ok(())
    }

    fn add_footnote(
        &mut self,
        sb: &mut StorylineBuilder,
        section: &Section,
        ctx: &StyleContext,
    ) -> Result<()> {
        sb.start_block("footnote");
        let inner = ctx.push("div", &["footnote".to_string()], &self.registry);
        let first_eid = sb.next_eid();

        if let Some(title) = &section.title {
            self.add_title_block(sb, title, &inner, "footnote-title", None)?;
        }
        for item in &section.content {
            match item {
                FlowItem::Section(nested) => {
                    // Nested note sections flatten into the same wrapper.
                    for inner_item in &nested.content {
                        self.process_flow_item(sb, inner_item, &inner)?;
                    }
                }
                other => self.process_flow_item(sb, other, &inner)?,
            }
        }

        let wrapper = sb.end_block(&mut self.registry)?;
        if wrapper.is_some() {
            self.record_id(&section.id, first_eid);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Closing passes
    // ------------------------------------------------------------------

    fn add_anchors(&mut self) -> Result<()> {
        for id in std::mem::take(&mut self.referenced) {
            if is_auto_section_name(&id) {
                continue;
            }
            match self.id_eids.get(&id) {
                Some(&eid) => self.fragments.push(build_anchor(&id, eid))?,
                None => debug!(%id, "link target not found; no anchor emitted"),
            }
        }
        Ok(())
    }

    fn add_navigation(&mut self) -> Result<()> {
        let pages = if self.options.page_size > 0 {
            approximate_page_list(&self.positions, self.options.page_size)
        } else {
            Vec::new()
        };
        let landmarks = Landmarks {
            cover_eid: self.cover_eid,
            toc_eid: None,
            srl_eid: self.srl_eid,
        };
        let nav = build_book_navigation(&self.toc, landmarks, &pages);
        self.fragments.push(nav)
    }

    fn add_content_fragments(&mut self) -> Result<()> {
        let accumulator = std::mem::take(&mut self.accumulator);
        for (name, texts) in accumulator.finish() {
            let value = Value::Named(vec![
                ("name".to_string(), Value::Name(name.clone())),
                (
                    "$146".to_string(),
                    Value::List(texts.into_iter().map(Value::Str).collect()),
                ),
            ]);
            self.fragments
                .push(Fragment::new(sym::CONTENT, name, value))?;
        }
        Ok(())
    }

    /// Wrapper entries carry no text; they still anchor positions.
    fn record_position_less_entry(&mut self, eid: u64) {
        self.positions.push((eid, 0));
    }
}

fn collect_note_ids(sections: &[Section], out: &mut HashSet<String>) {
    for section in sections {
        if let Some(id) = &section.id {
            out.insert(id.clone());
        }
        for item in &section.content {
            if let FlowItem::Section(nested) = item {
                collect_note_ids(std::slice::from_ref(nested), out);
            }
        }
    }
}

/// Map FB2 binary ids inside mixed items to caller resource names.
fn resolve_inline_resources(
    items: &[super::inline::InlineItem],
    resources: &ImageResources,
) -> Vec<super::inline::InlineItem> {
    items
        .iter()
        .filter_map(|item| match item {
            super::inline::InlineItem::Text(t) => {
                Some(super::inline::InlineItem::Text(t.clone()))
            }
            super::inline::InlineItem::Image { resource, alt } => resources
                .get(resource)
                .map(|found| super::inline::InlineItem::Image {
                    resource: found.resource_name.clone(),
                    alt: alt.clone(),
                }),
        })
        .collect()
}
