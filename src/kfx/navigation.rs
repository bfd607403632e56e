//! Navigation structures: anchors, TOC, landmarks, page list.

use super::fragment::Fragment;
use super::symbols::sym;
use super::value::{PropertyMap, Value};

/// One entry of the hierarchical table of contents.
#[derive(Debug, Clone)]
pub struct TocEntry {
    pub title: String,
    pub eid: u64,
    /// Entries flagged for exclusion don't appear in the TOC; their
    /// children are promoted in their place.
    pub include: bool,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, eid: u64) -> Self {
        Self {
            title: title.into(),
            eid,
            include: true,
            children: Vec::new(),
        }
    }
}

/// Landmark EIDs, added only when known.
#[derive(Debug, Default, Clone, Copy)]
pub struct Landmarks {
    pub cover_eid: Option<u64>,
    pub toc_eid: Option<u64>,
    pub srl_eid: Option<u64>,
}

/// Auto-generated section names (`c<digits>`) would collide with section
/// fragment ids; anchors for them are skipped.
pub fn is_auto_section_name(name: &str) -> bool {
    match name.strip_prefix('c') {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Build an anchor fragment for a referenced document id.
pub fn build_anchor(id: &str, eid: u64) -> Fragment {
    let mut position = PropertyMap::new();
    position.insert(sym::ID, Value::Int(eid as i64));

    let mut anchor = PropertyMap::new();
    anchor.insert(sym::ANCHOR_NAME, Value::Name(id.to_string()));
    anchor.insert(sym::POSITION, Value::Struct(position));

    Fragment::new(sym::ANCHOR, id, Value::Struct(anchor))
}

/// Distribute page boundaries of `page_size` runes across position items
/// (`(eid, rune_count)` in reading order), yielding `(label, eid,
/// offset)` page targets.
pub fn approximate_page_list(positions: &[(u64, usize)], page_size: usize) -> Vec<(String, u64, usize)> {
    if page_size == 0 {
        return Vec::new();
    }

    let mut pages = Vec::new();
    let mut consumed = 0usize;
    let mut next_boundary = 0usize;
    let mut page_number = 1usize;

    for &(eid, runes) in positions {
        while next_boundary < consumed + runes.max(1) && next_boundary >= consumed {
            pages.push((page_number.to_string(), eid, next_boundary - consumed));
            page_number += 1;
            next_boundary += page_size;
        }
        consumed += runes;
    }
    pages
}

/// Build the book navigation singleton fragment.
pub fn build_book_navigation(
    toc: &[TocEntry],
    landmarks: Landmarks,
    pages: &[(String, u64, usize)],
) -> Fragment {
    let mut containers = Vec::new();

    let toc_entries = build_toc_entries(toc);
    if !toc_entries.is_empty() {
        let mut container = PropertyMap::new();
        container.insert(sym::NAV_TYPE, Value::Sym(sym::TOC));
        container.insert(sym::NAV_ID, Value::Name("nav-toc".to_string()));
        container.insert(sym::ENTRIES, Value::List(toc_entries));
        containers.push(Value::Struct(container));
    }

    let landmark_entries = build_landmark_entries(landmarks);
    if !landmark_entries.is_empty() {
        let mut container = PropertyMap::new();
        container.insert(sym::NAV_TYPE, Value::Sym(sym::LANDMARKS));
        container.insert(sym::NAV_ID, Value::Name("nav-landmarks".to_string()));
        container.insert(sym::ENTRIES, Value::List(landmark_entries));
        containers.push(Value::Struct(container));
    }

    if !pages.is_empty() {
        let entries = pages
            .iter()
            .map(|(label, eid, offset)| nav_entry(label, *eid, *offset, None, &[]))
            .collect();
        let mut container = PropertyMap::new();
        container.insert(sym::NAV_TYPE, Value::Sym(sym::PAGE_LIST));
        container.insert(sym::NAV_ID, Value::Name("nav-pages".to_string()));
        container.insert(sym::ENTRIES, Value::List(entries));
        containers.push(Value::Struct(container));
    }

    let mut nav = PropertyMap::new();
    nav.insert(
        sym::READING_ORDER_NAME,
        Value::Sym(sym::DEFAULT_READING_ORDER),
    );
    nav.insert(sym::NAV_CONTAINERS, Value::List(containers));

    Fragment::singleton(sym::BOOK_NAVIGATION, Value::List(vec![Value::Struct(nav)]))
}

fn build_toc_entries(entries: &[TocEntry]) -> Vec<Value> {
    let mut out = Vec::new();
    for entry in entries {
        if entry.include {
            out.push(nav_entry(
                &entry.title,
                entry.eid,
                0,
                None,
                &entry.children,
            ));
        } else {
            // Excluded entries surface their children at this level.
            out.extend(build_toc_entries(&entry.children));
        }
    }
    out
}

fn build_landmark_entries(landmarks: Landmarks) -> Vec<Value> {
    let mut entries = Vec::new();
    if let Some(eid) = landmarks.cover_eid {
        entries.push(nav_entry("cover", eid, 0, Some(sym::COVER), &[]));
    }
    if let Some(eid) = landmarks.toc_eid {
        entries.push(nav_entry("toc", eid, 0, Some(sym::TOC), &[]));
    }
    if let Some(eid) = landmarks.srl_eid {
        entries.push(nav_entry("srl", eid, 0, Some(sym::SRL), &[]));
    }
    entries
}

fn nav_entry(
    title: &str,
    eid: u64,
    offset: usize,
    landmark_type: Option<super::symbols::Symbol>,
    children: &[TocEntry],
) -> Value {
    let mut label = PropertyMap::new();
    label.insert(sym::NAV_TEXT, Value::Str(title.to_string()));

    let mut target = PropertyMap::new();
    target.insert(sym::ID, Value::Int(eid as i64));
    target.insert(sym::OFFSET, Value::Int(offset as i64));

    let mut entry = PropertyMap::new();
    entry.insert(sym::LABEL, Value::Struct(label));
    entry.insert(sym::TARGET, Value::Struct(target));
    if let Some(landmark) = landmark_type {
        entry.insert(sym::LANDMARK_TYPE, Value::Sym(landmark));
    }

    let nested = build_toc_entries(children);
    if !nested.is_empty() {
        entry.insert(sym::ENTRIES, Value::List(nested));
    }

    Value::Struct(entry)
}
