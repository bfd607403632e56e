//! Storyline building.
//!
//! A storyline is a linear sequence of content entries; a section
//! references its storyline by name and owns the page template EID. The
//! builder hands out EIDs strictly monotonically, defers wrapper style
//! resolution to `end_block`, and discards wrappers that end up empty.

use crate::error::{Error, Result};

use super::fragment::Fragment;
use super::inline::{InlineItem, StyleEventRef};
use super::style::{StyleRegistry, Usage};
use super::symbols::{Symbol, sym};
use super::value::{PropertyMap, Value};

/// A content entry. Exactly one content source is set: an out-of-line
/// text reference, nested children, an embedded (pre-built) content
/// list, or an image resource.
#[derive(Debug, Clone, Default)]
pub struct ContentRef {
    pub eid: u64,
    pub entry_type: Symbol,
    pub style: Option<String>,
    pub content_ref: Option<(String, usize)>,
    pub children: Option<Vec<ContentRef>>,
    pub pre_built_entry: Option<Vec<Value>>,
    pub resource_name: Option<String>,
    pub alt_text: Option<String>,
    pub render_inline: bool,
    pub heading_level: Option<u8>,
    pub style_events: Vec<StyleEventRef>,
    /// Additional entry-level properties (table features, cell spans).
    pub extra: PropertyMap,
}

impl ContentRef {
    /// Serialize to the entry struct shape.
    pub fn to_value(&self) -> Value {
        let mut map = PropertyMap::new();
        map.insert(sym::ID, Value::Int(self.eid as i64));
        map.insert(sym::TYPE, Value::Sym(self.entry_type));
        if let Some(style) = &self.style {
            map.insert(sym::STYLE, Value::Name(style.clone()));
        }
        if let Some((name, offset)) = &self.content_ref {
            let mut content = PropertyMap::new();
            content.insert(sym::LOCATION, Value::Name(name.clone()));
            content.insert(sym::INDEX, Value::Int(*offset as i64));
            map.insert(sym::CONTENT, Value::Struct(content));
        }
        if let Some(children) = &self.children {
            map.insert(
                sym::CONTENT_LIST,
                Value::List(children.iter().map(ContentRef::to_value).collect()),
            );
        }
        if let Some(items) = &self.pre_built_entry {
            map.insert(sym::CONTENT_LIST, Value::List(items.clone()));
        }
        if let Some(resource) = &self.resource_name {
            map.insert(sym::RESOURCE_NAME, Value::Name(resource.clone()));
        }
        if let Some(alt) = &self.alt_text {
            map.insert(sym::ALT_TEXT, Value::Str(alt.clone()));
        }
        if self.render_inline {
            map.insert(sym::RENDER, Value::Sym(sym::INLINE));
        }
        if let Some(level) = self.heading_level {
            map.insert(sym::HEADING_LEVEL, Value::Int(level as i64));
        }
        if !self.style_events.is_empty() {
            map.insert(
                sym::STYLE_EVENTS,
                Value::List(self.style_events.iter().map(event_value).collect()),
            );
        }
        for (&key, value) in &self.extra {
            map.insert(key, value.clone());
        }
        Value::Struct(map)
    }
}

fn event_value(event: &StyleEventRef) -> Value {
    let mut map = PropertyMap::new();
    map.insert(sym::OFFSET, Value::Int(event.offset as i64));
    map.insert(sym::LENGTH, Value::Int(event.length as i64));
    map.insert(sym::STYLE, Value::Name(event.style.clone()));
    if let Some(target) = &event.link_to {
        map.insert(sym::LINK_TO, Value::Name(target.clone()));
        if event.is_footnote_link {
            map.insert(sym::LINK_KIND, Value::Sym(sym::FOOTNOTE));
        }
    }
    Value::Struct(map)
}

/// A text entry waiting to be added.
#[derive(Debug, Default)]
pub struct TextEntry {
    pub style: Option<String>,
    pub content: (String, usize),
    pub events: Vec<StyleEventRef>,
    pub heading_level: Option<u8>,
}

/// Page template flavor for the owning section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTemplate {
    /// Reflowable text flow.
    Text,
    /// Fixed container (cover pages), with pixel dimensions.
    FixedContainer { width: i64, height: i64 },
}

/// One table cell's inner content, prepared by the caller.
#[derive(Debug)]
pub enum CellContent {
    Text {
        style: Option<String>,
        content: (String, usize),
        events: Vec<StyleEventRef>,
    },
    Image {
        resource: String,
        style: Option<String>,
        alt: Option<String>,
    },
    Empty,
}

#[derive(Debug)]
pub struct TableCellSpec {
    pub style: Option<String>,
    pub colspan: u32,
    pub rowspan: u32,
    pub content: CellContent,
}

#[derive(Debug, Default)]
pub struct TableRowSpec {
    pub style: Option<String>,
    pub cells: Vec<TableCellSpec>,
}

#[derive(Debug, Default)]
pub struct TableSpec {
    pub style: Option<String>,
    /// Table-level properties pulled from the registered `table` style
    /// (border collapse and spacing); attached to the entry itself.
    pub props: PropertyMap,
    pub rows: Vec<TableRowSpec>,
}

/// An open wrapper block collecting children.
#[derive(Debug)]
struct BlockBuilder {
    class_spec: String,
    children: Vec<ContentRef>,
}

/// Builds one storyline/section pair.
#[derive(Debug)]
pub struct StorylineBuilder {
    story_name: String,
    section_name: String,
    page_template: PageTemplate,
    page_template_eid: u64,
    next_eid: u64,
    entries: Vec<ContentRef>,
    blocks: Vec<BlockBuilder>,
}

impl StorylineBuilder {
    /// Reserve `start_eid` for the page template; content EIDs begin at
    /// `start_eid + 1`.
    pub fn new(story_name: impl Into<String>, section_name: impl Into<String>, start_eid: u64) -> Self {
        Self {
            story_name: story_name.into(),
            section_name: section_name.into(),
            page_template: PageTemplate::Text,
            page_template_eid: start_eid,
            next_eid: start_eid + 1,
            entries: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn with_page_template(mut self, template: PageTemplate) -> Self {
        self.page_template = template;
        self
    }

    pub fn story_name(&self) -> &str {
        &self.story_name
    }

    pub fn section_name(&self) -> &str {
        &self.section_name
    }

    pub fn page_template_eid(&self) -> u64 {
        self.page_template_eid
    }

    /// The next EID that will be allocated.
    pub fn next_eid(&self) -> u64 {
        self.next_eid
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.blocks.iter().all(|b| b.children.is_empty())
    }

    fn alloc_eid(&mut self) -> Result<u64> {
        let eid = self.next_eid;
        if eid > i64::MAX as u64 {
            return Err(Error::EidOverflow);
        }
        self.next_eid = self.next_eid.checked_add(1).ok_or(Error::EidOverflow)?;
        Ok(eid)
    }

    fn push_entry(&mut self, entry: ContentRef) {
        match self.blocks.last_mut() {
            Some(block) => block.children.push(entry),
            None => self.entries.push(entry),
        }
    }

    /// Add a text entry referencing accumulated content.
    pub fn add_text(&mut self, entry: TextEntry) -> Result<u64> {
        let eid = self.alloc_eid()?;
        self.push_entry(ContentRef {
            eid,
            entry_type: sym::TEXT,
            style: entry.style,
            content_ref: Some(entry.content),
            heading_level: entry.heading_level,
            style_events: entry.events,
            ..Default::default()
        });
        Ok(eid)
    }

    /// Add a text entry whose content list is embedded (mixed text and
    /// inline images).
    pub fn add_mixed(
        &mut self,
        style: Option<String>,
        items: &[InlineItem],
        events: Vec<StyleEventRef>,
        heading_level: Option<u8>,
    ) -> Result<u64> {
        let eid = self.alloc_eid()?;
        let list = items
            .iter()
            .map(|item| match item {
                InlineItem::Text(text) => Value::Str(text.clone()),
                InlineItem::Image { resource, alt } => {
                    let mut map = PropertyMap::new();
                    map.insert(sym::TYPE, Value::Sym(sym::IMAGE));
                    map.insert(sym::RESOURCE_NAME, Value::Name(resource.clone()));
                    map.insert(sym::RENDER, Value::Sym(sym::INLINE));
                    if let Some(alt) = alt {
                        map.insert(sym::ALT_TEXT, Value::Str(alt.clone()));
                    }
                    Value::Struct(map)
                }
            })
            .collect();
        self.push_entry(ContentRef {
            eid,
            entry_type: sym::TEXT,
            style,
            pre_built_entry: Some(list),
            heading_level,
            style_events: events,
            ..Default::default()
        });
        Ok(eid)
    }

    /// Add a block image entry.
    pub fn add_image(
        &mut self,
        resource: impl Into<String>,
        style: Option<String>,
        alt: Option<String>,
    ) -> Result<u64> {
        let eid = self.alloc_eid()?;
        self.push_entry(ContentRef {
            eid,
            entry_type: sym::IMAGE,
            style,
            resource_name: Some(resource.into()),
            alt_text: alt,
            ..Default::default()
        });
        Ok(eid)
    }

    /// Open a wrapper block; subsequent adds land in its children.
    pub fn start_block(&mut self, class_spec: impl Into<String>) {
        self.blocks.push(BlockBuilder {
            class_spec: class_spec.into(),
            children: Vec::new(),
        });
    }

    /// Close the innermost wrapper. The wrapper style resolves only now;
    /// a wrapper without children is discarded entirely.
    pub fn end_block(&mut self, registry: &mut StyleRegistry) -> Result<Option<u64>> {
        let Some(block) = self.blocks.pop() else {
            return Ok(None);
        };
        if block.children.is_empty() {
            return Ok(None);
        }

        let eid = self.alloc_eid()?;
        let style = registry.resolve_style(&block.class_spec);
        registry.mark_used(&style, Usage::Wrapper);
        self.push_entry(ContentRef {
            eid,
            entry_type: sym::TEXT,
            style: Some(style),
            children: Some(block.children),
            ..Default::default()
        });
        Ok(Some(eid))
    }

    /// Add a table: table → body → rows → cells, every structural node
    /// with its own EID. Cells are vertical containers.
    pub fn add_table(&mut self, spec: TableSpec) -> Result<u64> {
        let table_eid = self.alloc_eid()?;
        let body_eid = self.alloc_eid()?;

        let mut rows = Vec::new();
        for row in spec.rows {
            let row_eid = self.alloc_eid()?;
            let mut cells = Vec::new();
            for cell in row.cells {
                let cell_eid = self.alloc_eid()?;
                let inner = match cell.content {
                    CellContent::Text {
                        style,
                        content,
                        events,
                    } => {
                        let eid = self.alloc_eid()?;
                        vec![ContentRef {
                            eid,
                            entry_type: sym::TEXT,
                            style,
                            content_ref: Some(content),
                            style_events: events,
                            ..Default::default()
                        }]
                    }
                    CellContent::Image {
                        resource,
                        style,
                        alt,
                    } => {
                        let eid = self.alloc_eid()?;
                        vec![ContentRef {
                            eid,
                            entry_type: sym::IMAGE,
                            style,
                            resource_name: Some(resource),
                            alt_text: alt,
                            ..Default::default()
                        }]
                    }
                    CellContent::Empty => Vec::new(),
                };

                let mut extra = PropertyMap::new();
                extra.insert(sym::LAYOUT, Value::Sym(sym::VERTICAL));
                if cell.colspan > 1 {
                    extra.insert(sym::COLSPAN, Value::Int(cell.colspan as i64));
                }
                if cell.rowspan > 1 {
                    extra.insert(sym::ROWSPAN, Value::Int(cell.rowspan as i64));
                }
                cells.push(ContentRef {
                    eid: cell_eid,
                    entry_type: sym::CONTAINER,
                    style: cell.style,
                    children: Some(inner),
                    extra,
                    ..Default::default()
                });
            }
            rows.push(ContentRef {
                eid: row_eid,
                entry_type: sym::TABLE_ROW,
                style: row.style,
                children: Some(cells),
                ..Default::default()
            });
        }

        let body = ContentRef {
            eid: body_eid,
            entry_type: sym::TABLE_BODY,
            children: Some(rows),
            ..Default::default()
        };

        let mut extra = spec.props;
        extra.insert(
            sym::FEATURES,
            Value::List(vec![Value::Sym(sym::PAN_ZOOM), Value::Sym(sym::SCALE_FIT)]),
        );
        extra.insert(sym::SELECTION_MODE, Value::Sym(sym::REGIONAL));
        self.push_entry(ContentRef {
            eid: table_eid,
            entry_type: sym::TABLE,
            style: spec.style,
            children: Some(vec![body]),
            extra,
            ..Default::default()
        });
        Ok(table_eid)
    }

    /// Close the builder into its storyline and section fragments.
    ///
    /// Any block left open is flattened into the entry list; callers
    /// close their own blocks.
    pub fn finish(mut self) -> BuiltSection {
        while let Some(block) = self.blocks.pop() {
            self.entries.extend(block.children);
        }

        let mut storyline = PropertyMap::new();
        storyline.insert(sym::STORY_NAME, Value::Name(self.story_name.clone()));
        storyline.insert(
            sym::CONTENT_LIST,
            Value::List(self.entries.iter().map(ContentRef::to_value).collect()),
        );

        let mut template = PropertyMap::new();
        template.insert(sym::ID, Value::Int(self.page_template_eid as i64));
        match self.page_template {
            PageTemplate::Text => {
                template.insert(sym::TYPE, Value::Sym(sym::TEXT));
            }
            PageTemplate::FixedContainer { width, height } => {
                template.insert(sym::TYPE, Value::Sym(sym::CONTAINER));
                template.insert(sym::LAYOUT, Value::Sym(sym::FULL_PAGE));
                template.insert(sym::FIXED_WIDTH, Value::Int(width));
                template.insert(sym::FIXED_HEIGHT, Value::Int(height));
            }
        }
        template.insert(sym::STORY_NAME, Value::Name(self.story_name.clone()));

        let mut section = PropertyMap::new();
        section.insert(sym::SECTION_NAME, Value::Name(self.section_name.clone()));
        section.insert(
            sym::PAGE_TEMPLATES,
            Value::List(vec![Value::Struct(template)]),
        );

        BuiltSection {
            storyline: Fragment::new(sym::STORYLINE, self.story_name, Value::Struct(storyline)),
            section: Fragment::new(sym::SECTION, self.section_name, Value::Struct(section)),
            entries: self.entries,
            next_eid: self.next_eid,
        }
    }
}

/// A finished storyline/section pair.
#[derive(Debug)]
pub struct BuiltSection {
    pub storyline: Fragment,
    pub section: Fragment,
    /// Top-level entries, kept for position/navigation mapping.
    pub entries: Vec<ContentRef>,
    pub next_eid: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_entry(name: &str, offset: usize) -> TextEntry {
        TextEntry {
            content: (name.to_string(), offset),
            ..Default::default()
        }
    }

    #[test]
    fn test_page_template_eid_reserved() {
        let mut builder = StorylineBuilder::new("story-1", "c1", 100);
        assert_eq!(builder.page_template_eid(), 100);
        let first = builder.add_text(text_entry("content_1", 0)).unwrap();
        assert_eq!(first, 101);
    }

    #[test]
    fn test_eids_strictly_monotone() {
        let mut builder = StorylineBuilder::new("story-1", "c1", 1);
        let a = builder.add_text(text_entry("content_1", 0)).unwrap();
        let b = builder.add_image("img1", None, None).unwrap();
        let c = builder.add_text(text_entry("content_1", 1)).unwrap();
        assert_eq!((a, b, c), (2, 3, 4));
        assert_eq!(builder.next_eid(), 5);
    }

    #[test]
    fn test_empty_block_discarded_without_eid() {
        let mut registry = StyleRegistry::new();
        let mut builder = StorylineBuilder::new("story-1", "c1", 1);
        builder.start_block("epigraph");
        let result = builder.end_block(&mut registry).unwrap();
        assert!(result.is_none());
        // No EID consumed, no gap in the range.
        let next = builder.add_text(text_entry("content_1", 0)).unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn test_block_wraps_children_with_deferred_style() {
        let mut registry = StyleRegistry::new();
        let mut builder = StorylineBuilder::new("story-1", "c1", 1);
        builder.start_block("epigraph");
        let child = builder.add_text(text_entry("content_1", 0)).unwrap();
        let wrapper = builder.end_block(&mut registry).unwrap().unwrap();
        // Wrapper EID allocated after its children.
        assert!(wrapper > child);

        let built = builder.finish();
        assert_eq!(built.entries.len(), 1);
        let entry = &built.entries[0];
        assert_eq!(entry.entry_type, sym::TEXT);
        assert_eq!(entry.style.as_deref(), Some("epigraph"));
        assert_eq!(entry.children.as_ref().unwrap().len(), 1);
        assert!(registry.contains("epigraph"));
    }

    #[test]
    fn test_nested_blocks() {
        let mut registry = StyleRegistry::new();
        let mut builder = StorylineBuilder::new("story-1", "c1", 1);
        builder.start_block("cite");
        builder.start_block("poem");
        builder.add_text(text_entry("content_1", 0)).unwrap();
        builder.end_block(&mut registry).unwrap();
        builder.end_block(&mut registry).unwrap();

        let built = builder.finish();
        assert_eq!(built.entries.len(), 1);
        let outer = &built.entries[0];
        assert_eq!(outer.style.as_deref(), Some("cite"));
        let inner = &outer.children.as_ref().unwrap()[0];
        assert_eq!(inner.style.as_deref(), Some("poem"));
    }

    #[test]
    fn test_table_structure_and_eids() {
        let mut builder = StorylineBuilder::new("story-1", "c1", 1);
        let spec = TableSpec {
            style: Some("table".to_string()),
            props: PropertyMap::new(),
            rows: vec![TableRowSpec {
                style: None,
                cells: vec![
                    TableCellSpec {
                        style: None,
                        colspan: 2,
                        rowspan: 1,
                        content: CellContent::Text {
                            style: None,
                            content: ("content_1".to_string(), 0),
                            events: Vec::new(),
                        },
                    },
                    TableCellSpec {
                        style: None,
                        colspan: 1,
                        rowspan: 1,
                        content: CellContent::Empty,
                    },
                ],
            }],
        };
        let table_eid = builder.add_table(spec).unwrap();
        assert_eq!(table_eid, 2);
        // table=2, body=3, row=4, cell=5, inner text=6, cell=7
        assert_eq!(builder.next_eid(), 8);

        let built = builder.finish();
        let table = &built.entries[0];
        assert_eq!(table.entry_type, sym::TABLE);
        assert!(table.extra.contains_key(&sym::FEATURES));
        assert_eq!(
            table.extra.get(&sym::SELECTION_MODE),
            Some(&Value::Sym(sym::REGIONAL))
        );

        let body = &table.children.as_ref().unwrap()[0];
        assert_eq!(body.entry_type, sym::TABLE_BODY);
        let row = &body.children.as_ref().unwrap()[0];
        assert_eq!(row.entry_type, sym::TABLE_ROW);
        let cell = &row.children.as_ref().unwrap()[0];
        assert_eq!(cell.entry_type, sym::CONTAINER);
        assert_eq!(cell.extra.get(&sym::LAYOUT), Some(&Value::Sym(sym::VERTICAL)));
        assert_eq!(cell.extra.get(&sym::COLSPAN), Some(&Value::Int(2)));
        assert!(cell.extra.get(&sym::ROWSPAN).is_none());
    }

    #[test]
    fn test_mixed_entry_value_shape() {
        let mut builder = StorylineBuilder::new("story-1", "c1", 1);
        let items = vec![
            InlineItem::Text("word ".to_string()),
            InlineItem::Image {
                resource: "i1".to_string(),
                alt: None,
            },
            InlineItem::Text(" word".to_string()),
        ];
        builder.add_mixed(None, &items, Vec::new(), None).unwrap();

        let built = builder.finish();
        let entry = &built.entries[0];
        assert_eq!(entry.entry_type, sym::TEXT);
        let value = entry.to_value();
        let map = value.as_struct().unwrap();
        let list = map.get(&sym::CONTENT_LIST).unwrap().as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], Value::Str("word ".to_string()));
        let image = list[1].as_struct().unwrap();
        assert_eq!(image.get(&sym::RENDER), Some(&Value::Sym(sym::INLINE)));
        assert_eq!(list[2], Value::Str(" word".to_string()));
    }

    #[test]
    fn test_finish_fragment_shapes() {
        let mut builder = StorylineBuilder::new("story-1", "c1", 10);
        builder.add_text(text_entry("content_1", 0)).unwrap();
        let built = builder.finish();

        assert_eq!(built.storyline.ftype, sym::STORYLINE);
        assert_eq!(built.section.ftype, sym::SECTION);

        let section = built.section.value.as_struct().unwrap();
        let templates = section.get(&sym::PAGE_TEMPLATES).unwrap().as_list().unwrap();
        assert_eq!(templates.len(), 1);
        let template = templates[0].as_struct().unwrap();
        assert_eq!(template.get(&sym::ID), Some(&Value::Int(10)));
        assert_eq!(template.get(&sym::TYPE), Some(&Value::Sym(sym::TEXT)));
    }

    #[test]
    fn test_cover_template_shape() {
        let builder = StorylineBuilder::new("story-cover", "cover-section", 1)
            .with_page_template(PageTemplate::FixedContainer {
                width: 600,
                height: 800,
            });
        let built = builder.finish();
        let section = built.section.value.as_struct().unwrap();
        let templates = section.get(&sym::PAGE_TEMPLATES).unwrap().as_list().unwrap();
        let template = templates[0].as_struct().unwrap();
        assert_eq!(template.get(&sym::TYPE), Some(&Value::Sym(sym::CONTAINER)));
        assert_eq!(template.get(&sym::FIXED_WIDTH), Some(&Value::Int(600)));
        assert_eq!(template.get(&sym::LAYOUT), Some(&Value::Sym(sym::FULL_PAGE)));
    }

    #[test]
    fn test_text_entry_value_shape() {
        let mut builder = StorylineBuilder::new("s", "c", 1);
        builder
            .add_text(TextEntry {
                style: Some("p".to_string()),
                content: ("content_2".to_string(), 3),
                events: vec![StyleEventRef {
                    offset: 0,
                    length: 4,
                    style: "strong".to_string(),
                    link_to: Some("n1".to_string()),
                    is_footnote_link: true,
                }],
                heading_level: Some(2),
            })
            .unwrap();
        let built = builder.finish();
        let value = built.entries[0].to_value();
        let map = value.as_struct().unwrap();

        assert_eq!(map.get(&sym::TYPE), Some(&Value::Sym(sym::TEXT)));
        assert_eq!(map.get(&sym::STYLE), Some(&Value::Name("p".to_string())));
        assert_eq!(map.get(&sym::HEADING_LEVEL), Some(&Value::Int(2)));

        let content = map.get(&sym::CONTENT).unwrap().as_struct().unwrap();
        assert_eq!(
            content.get(&sym::LOCATION),
            Some(&Value::Name("content_2".to_string()))
        );
        assert_eq!(content.get(&sym::INDEX), Some(&Value::Int(3)));

        let events = map.get(&sym::STYLE_EVENTS).unwrap().as_list().unwrap();
        let event = events[0].as_struct().unwrap();
        assert_eq!(event.get(&sym::LENGTH), Some(&Value::Int(4)));
        assert_eq!(event.get(&sym::LINK_TO), Some(&Value::Name("n1".to_string())));
        assert_eq!(event.get(&sym::LINK_KIND), Some(&Value::Sym(sym::FOOTNOTE)));
    }
}
