//! End-to-end conversion tests.
//!
//! Run the full pipeline over an embedded FB2 sample and verify the
//! structural invariants of the fragment graph: unique fragment keys,
//! gapless monotone EIDs, resolvable style references, valid content
//! references, and determinism across runs.

use std::collections::{BTreeSet, HashMap, HashSet};

use fb2kfx::kfx::symbols::sym;
use fb2kfx::kfx::value::Value;
use fb2kfx::{Conversion, ConvertOptions, ImageResource, convert, parse_fb2_str, parse_stylesheet};

const SAMPLE_FB2: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0"
             xmlns:l="http://www.w3.org/1999/xlink">
  <description>
    <title-info>
      <book-title>Integration Sample</book-title>
      <lang>en</lang>
      <coverpage><image l:href="#cover.jpg"/></coverpage>
    </title-info>
  </description>
  <body>
    <title><p>Integration Sample</p><p>A Test Book</p></title>
    <epigraph>
      <p>All models are wrong.</p>
      <text-author>G. Box</text-author>
    </epigraph>
    <section id="intro">
      <title><p>Introduction</p></title>
      <p>The <strong>first</strong> paragraph with a
         <a l:href="#n1" type="note">footnote</a>.</p>
      <empty-line/>
      <p>Second paragraph with <emphasis>some <strong>nested</strong> markup</emphasis>.</p>
      <section id="sub1">
        <title><p>Details</p></title>
        <p>Nested section content.</p>
        <cite>
          <p>Quoted material here.</p>
          <text-author>Someone</text-author>
        </cite>
      </section>
    </section>
    <section>
      <title><p>Data</p></title>
      <p>Mixed picture <image l:href="#pic.png" alt="a diagram"/> inline.</p>
      <table>
        <tr><th>Name</th><th>Value</th></tr>
        <tr><td colspan="2">merged</td></tr>
      </table>
      <poem>
        <title><p>Verse</p></title>
        <stanza>
          <v>Line one</v>
          <v>Line two</v>
        </stanza>
      </poem>
    </section>
  </body>
  <body name="notes">
    <title><p>Notes</p></title>
    <section id="n1">
      <title><p>1</p></title>
      <p>The footnote text.</p>
    </section>
  </body>
</FictionBook>"##;

const SAMPLE_CSS: &str = r#"
p { text-indent: 1.5em; text-align: justify; margin: 0.5em 0; }
.epigraph { margin-left: 25%; font-style: italic; }
.cite { margin: 1em 2em; }
strong { font-weight: bold; }
emphasis { font-style: italic; }
sup { font-size: smaller; vertical-align: super; }
a { text-decoration: none; }
table { border-collapse: collapse; }
th { font-weight: bold; text-align: center; }
.footnote p { font-size: 90%; }
"#;

fn sample_resources() -> HashMap<String, ImageResource> {
    let mut resources = HashMap::new();
    resources.insert(
        "cover.jpg".to_string(),
        ImageResource {
            resource_name: "resource-cover".to_string(),
            width: 600,
            height: 800,
        },
    );
    resources.insert(
        "pic.png".to_string(),
        ImageResource {
            resource_name: "resource-pic".to_string(),
            width: 200,
            height: 100,
        },
    );
    resources
}

fn run_sample() -> Conversion {
    let book = parse_fb2_str(SAMPLE_FB2).expect("sample parses");
    let sheet = parse_stylesheet(SAMPLE_CSS);
    convert(
        &book,
        &sheet,
        &sample_resources(),
        &ConvertOptions::default(),
    )
    .expect("conversion succeeds")
}

/// Collect every EID in a storyline entry tree.
fn collect_eids(value: &Value, out: &mut Vec<i64>) {
    let Some(map) = value.as_struct() else { return };
    if let Some(Value::Int(eid)) = map.get(&sym::ID) {
        out.push(*eid);
    }
    if let Some(Value::List(children)) = map.get(&sym::CONTENT_LIST) {
        for child in children {
            collect_eids(child, out);
        }
    }
}

fn all_storyline_eids(conversion: &Conversion) -> Vec<i64> {
    let mut eids = Vec::new();
    for fragment in &conversion.fragments {
        if fragment.ftype != sym::STORYLINE {
            continue;
        }
        let map = fragment.value.as_struct().unwrap();
        if let Some(Value::List(entries)) = map.get(&sym::CONTENT_LIST) {
            for entry in entries {
                collect_eids(entry, &mut eids);
            }
        }
    }
    eids
}

#[test]
fn test_produces_expected_fragment_types() {
    let conversion = run_sample();
    let types: BTreeSet<u64> = conversion.fragments.iter().map(|f| f.ftype).collect();
    assert!(types.contains(&sym::STORYLINE));
    assert!(types.contains(&sym::SECTION));
    assert!(types.contains(&sym::CONTENT));
    assert!(types.contains(&sym::ANCHOR));
    assert!(types.contains(&sym::BOOK_NAVIGATION));
}

#[test]
fn test_fragment_keys_unique() {
    let conversion = run_sample();
    let mut seen = HashSet::new();
    for fragment in &conversion.fragments {
        assert!(
            seen.insert((fragment.ftype, fragment.fid.clone())),
            "duplicate fragment {}/{}",
            fragment.ftype,
            fragment.fid
        );
    }
}

#[test]
fn test_eids_unique_and_positive() {
    let conversion = run_sample();
    let eids = all_storyline_eids(&conversion);
    assert!(!eids.is_empty());
    let unique: BTreeSet<i64> = eids.iter().copied().collect();
    assert_eq!(unique.len(), eids.len(), "EIDs must never repeat");
    assert!(*unique.iter().next().unwrap() > 0);
}

#[test]
fn test_eid_range_has_no_gaps() {
    let conversion = run_sample();

    // Page template EIDs from sections plus all content EIDs form the
    // allocated range.
    let mut eids = all_storyline_eids(&conversion);
    for fragment in &conversion.fragments {
        if fragment.ftype != sym::SECTION {
            continue;
        }
        let map = fragment.value.as_struct().unwrap();
        let templates = map.get(&sym::PAGE_TEMPLATES).unwrap().as_list().unwrap();
        for template in templates {
            if let Some(Value::Int(eid)) = template.as_struct().unwrap().get(&sym::ID) {
                eids.push(*eid);
            }
        }
    }

    let unique: BTreeSet<i64> = eids.iter().copied().collect();
    let min = *unique.iter().next().unwrap();
    let max = *unique.iter().last().unwrap();
    assert_eq!(
        unique.len() as i64,
        max - min + 1,
        "allocated EIDs must form a contiguous range"
    );
}

#[test]
fn test_style_references_resolve() {
    let conversion = run_sample();
    let style_names: HashSet<&str> = conversion.styles.iter().map(|s| s.name.as_str()).collect();

    fn check_entry(value: &Value, style_names: &HashSet<&str>) {
        let Some(map) = value.as_struct() else { return };
        if let Some(Value::Name(style)) = map.get(&sym::STYLE) {
            assert!(
                style_names.contains(style.as_str()),
                "style {style} referenced but not registered"
            );
        }
        if let Some(Value::List(events)) = map.get(&sym::STYLE_EVENTS) {
            for event in events {
                if let Some(Value::Name(style)) = event.as_struct().unwrap().get(&sym::STYLE) {
                    assert!(
                        style_names.contains(style.as_str()),
                        "event style {style} referenced but not registered"
                    );
                }
            }
        }
        if let Some(Value::List(children)) = map.get(&sym::CONTENT_LIST) {
            for child in children {
                check_entry(child, style_names);
            }
        }
    }

    for fragment in &conversion.fragments {
        if fragment.ftype != sym::STORYLINE {
            continue;
        }
        let map = fragment.value.as_struct().unwrap();
        if let Some(Value::List(entries)) = map.get(&sym::CONTENT_LIST) {
            for entry in entries {
                check_entry(entry, &style_names);
            }
        }
    }
}

#[test]
fn test_content_refs_point_at_existing_items() {
    let conversion = run_sample();

    let mut content: HashMap<String, usize> = HashMap::new();
    for fragment in &conversion.fragments {
        if fragment.ftype != sym::CONTENT {
            continue;
        }
        let Value::Named(fields) = &fragment.value else {
            panic!("content fragments are name-keyed");
        };
        let texts = fields
            .iter()
            .find(|(key, _)| key == "$146")
            .and_then(|(_, v)| v.as_list())
            .expect("content fragment has $146 list");
        content.insert(fragment.fid.to_string(), texts.len());
    }
    assert!(!content.is_empty());

    fn check_entry(value: &Value, content: &HashMap<String, usize>) {
        let Some(map) = value.as_struct() else { return };
        if let Some(reference) = map.get(&sym::CONTENT).and_then(Value::as_struct) {
            let Some(Value::Name(name)) = reference.get(&sym::LOCATION) else {
                panic!("content ref without location");
            };
            let Some(Value::Int(index)) = reference.get(&sym::INDEX) else {
                panic!("content ref without index");
            };
            let len = content
                .get(name)
                .unwrap_or_else(|| panic!("content fragment {name} missing"));
            assert!((*index as usize) < *len, "index {index} out of {len} in {name}");
        }
        if let Some(Value::List(children)) = map.get(&sym::CONTENT_LIST) {
            for child in children {
                check_entry(child, content);
            }
        }
    }

    for fragment in &conversion.fragments {
        if fragment.ftype != sym::STORYLINE {
            continue;
        }
        let map = fragment.value.as_struct().unwrap();
        if let Some(Value::List(entries)) = map.get(&sym::CONTENT_LIST) {
            for entry in entries {
                check_entry(entry, &content);
            }
        }
    }
}

#[test]
fn test_footnote_link_marked_and_anchored() {
    let conversion = run_sample();

    // The anchor for the footnote target exists.
    let anchor = conversion
        .fragments
        .iter()
        .find(|f| f.ftype == sym::ANCHOR && f.fid.to_string() == "n1")
        .expect("anchor for n1");
    let map = anchor.value.as_struct().unwrap();
    assert_eq!(map.get(&sym::ANCHOR_NAME), Some(&Value::Name("n1".to_string())));

    // Some style event carries the footnote link kind.
    let mut found = false;
    fn scan(value: &Value, found: &mut bool) {
        let Some(map) = value.as_struct() else { return };
        if let Some(Value::List(events)) = map.get(&sym::STYLE_EVENTS) {
            for event in events {
                let event = event.as_struct().unwrap();
                if event.get(&sym::LINK_TO) == Some(&Value::Name("n1".to_string())) {
                    assert_eq!(event.get(&sym::LINK_KIND), Some(&Value::Sym(sym::FOOTNOTE)));
                    *found = true;
                }
            }
        }
        if let Some(Value::List(children)) = map.get(&sym::CONTENT_LIST) {
            for child in children {
                scan(child, found);
            }
        }
    }
    for fragment in &conversion.fragments {
        if fragment.ftype == sym::STORYLINE {
            let map = fragment.value.as_struct().unwrap();
            if let Some(Value::List(entries)) = map.get(&sym::CONTENT_LIST) {
                for entry in entries {
                    scan(entry, &mut found);
                }
            }
        }
    }
    assert!(found, "footnote link event not found");
}

#[test]
fn test_cover_section_emitted() {
    let conversion = run_sample();
    let cover = conversion
        .fragments
        .iter()
        .find(|f| f.ftype == sym::SECTION && f.fid.to_string() == "cover")
        .expect("cover section");
    let map = cover.value.as_struct().unwrap();
    let templates = map.get(&sym::PAGE_TEMPLATES).unwrap().as_list().unwrap();
    let template = templates[0].as_struct().unwrap();
    assert_eq!(template.get(&sym::TYPE), Some(&Value::Sym(sym::CONTAINER)));
    assert_eq!(template.get(&sym::FIXED_WIDTH), Some(&Value::Int(600)));
    assert_eq!(template.get(&sym::FIXED_HEIGHT), Some(&Value::Int(800)));
}

#[test]
fn test_missing_cover_resource_is_hard_error() {
    let book = parse_fb2_str(SAMPLE_FB2).unwrap();
    let sheet = parse_stylesheet(SAMPLE_CSS);
    let mut resources = sample_resources();
    resources.remove("cover.jpg");

    let err = convert(&book, &sheet, &resources, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, fb2kfx::Error::MissingResource(_)));
}

#[test]
fn test_mixed_paragraph_keeps_boundary_spaces() {
    let conversion = run_sample();

    let mut checked = false;
    fn scan(value: &Value, checked: &mut bool) {
        let Some(map) = value.as_struct() else { return };
        if map.get(&sym::CONTENT).is_none()
            && let Some(Value::List(items)) = map.get(&sym::CONTENT_LIST)
        {
            let strings: Vec<&String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::Str(s) => Some(s),
                    _ => None,
                })
                .collect();
            if strings.len() == 2 && items.len() == 3 {
                assert!(strings[0].ends_with(' '), "space before image lost");
                assert!(strings[1].starts_with(' '), "space after image lost");
                *checked = true;
            }
            for item in items {
                scan(item, checked);
            }
        } else if let Some(Value::List(children)) = map.get(&sym::CONTENT_LIST) {
            for child in children {
                scan(child, checked);
            }
        }
    }
    for fragment in &conversion.fragments {
        if fragment.ftype == sym::STORYLINE {
            let map = fragment.value.as_struct().unwrap();
            if let Some(Value::List(entries)) = map.get(&sym::CONTENT_LIST) {
                for entry in entries {
                    scan(entry, &mut checked);
                }
            }
        }
    }
    assert!(checked, "mixed paragraph not found");
}

#[test]
fn test_table_structure() {
    let conversion = run_sample();

    fn find_table(value: &Value) -> Option<Value> {
        let map = value.as_struct()?;
        if map.get(&sym::TYPE) == Some(&Value::Sym(sym::TABLE)) {
            return Some(value.clone());
        }
        if let Some(Value::List(children)) = map.get(&sym::CONTENT_LIST) {
            for child in children {
                if let Some(found) = find_table(child) {
                    return Some(found);
                }
            }
        }
        None
    }

    let mut table = None;
    for fragment in &conversion.fragments {
        if fragment.ftype == sym::STORYLINE {
            let map = fragment.value.as_struct().unwrap();
            if let Some(Value::List(entries)) = map.get(&sym::CONTENT_LIST) {
                for entry in entries {
                    if let Some(found) = find_table(entry) {
                        table = Some(found);
                    }
                }
            }
        }
    }
    let table = table.expect("table entry");
    let map = table.as_struct().unwrap();
    assert!(map.contains_key(&sym::FEATURES));
    // border-collapse from the table element style rides on the entry.
    assert_eq!(map.get(&sym::BORDER_COLLAPSE), Some(&Value::Bool(true)));

    let body = &map.get(&sym::CONTENT_LIST).unwrap().as_list().unwrap()[0];
    let body_map = body.as_struct().unwrap();
    assert_eq!(body_map.get(&sym::TYPE), Some(&Value::Sym(sym::TABLE_BODY)));
    let rows = body_map.get(&sym::CONTENT_LIST).unwrap().as_list().unwrap();
    assert_eq!(rows.len(), 2);

    let second_row = rows[1].as_struct().unwrap();
    let cells = second_row.get(&sym::CONTENT_LIST).unwrap().as_list().unwrap();
    let merged = cells[0].as_struct().unwrap();
    assert_eq!(merged.get(&sym::COLSPAN), Some(&Value::Int(2)));
}

#[test]
fn test_no_content_fragment_exceeds_limit() {
    // Build a book big enough to force several content fragments.
    let mut paragraphs = String::new();
    for i in 0..200 {
        paragraphs.push_str(&format!("<p>Paragraph number {i} {}</p>", "x".repeat(100)));
    }
    let xml = format!(
        "<FictionBook><body><section>{paragraphs}</section></body></FictionBook>"
    );
    let book = parse_fb2_str(&xml).unwrap();
    let sheet = parse_stylesheet("");
    let conversion = convert(
        &book,
        &sheet,
        &HashMap::new(),
        &ConvertOptions::default(),
    )
    .unwrap();

    let mut content_count = 0;
    for fragment in &conversion.fragments {
        if fragment.ftype != sym::CONTENT {
            continue;
        }
        content_count += 1;
        let Value::Named(fields) = &fragment.value else {
            panic!("content fragments are name-keyed");
        };
        let texts = fields
            .iter()
            .find(|(key, _)| key == "$146")
            .and_then(|(_, v)| v.as_list())
            .unwrap();
        let bytes: usize = texts
            .iter()
            .map(|t| match t {
                Value::Str(s) => s.len(),
                _ => 0,
            })
            .sum();
        assert!(bytes <= 8192, "content fragment exceeds 8192 bytes");
    }
    assert!(content_count > 1, "expected multiple content fragments");
}

#[test]
fn test_unused_styles_dropped() {
    let conversion = run_sample();
    // The sample never uses subscript text, so no style named "sub"
    // should survive the usage sweep.
    assert!(conversion.styles.iter().all(|s| s.name != "sub"));
    // Every surviving style has a name.
    assert!(conversion.styles.iter().all(|s| !s.name.is_empty()));
}

#[test]
fn test_determinism() {
    let first = run_sample();
    let second = run_sample();
    assert_eq!(
        format!("{:?}", first.fragments),
        format!("{:?}", second.fragments)
    );
    assert_eq!(format!("{:?}", first.styles), format!("{:?}", second.styles));
    assert_eq!(first.warnings, second.warnings);
}

#[test]
fn test_toc_hierarchy_in_navigation() {
    let conversion = run_sample();
    let nav = conversion
        .fragments
        .iter()
        .find(|f| f.ftype == sym::BOOK_NAVIGATION)
        .expect("navigation fragment");

    let root = nav.value.as_list().unwrap()[0].as_struct().unwrap();
    let containers = root.get(&sym::NAV_CONTAINERS).unwrap().as_list().unwrap();
    let toc = containers
        .iter()
        .find(|c| c.as_struct().unwrap().get(&sym::NAV_TYPE) == Some(&Value::Sym(sym::TOC)))
        .expect("toc container")
        .as_struct()
        .unwrap();
    let entries = toc.get(&sym::ENTRIES).unwrap().as_list().unwrap();
    // Body title + two chapters.
    assert_eq!(entries.len(), 3);

    // "Introduction" has the nested "Details" entry.
    let intro = entries[1].as_struct().unwrap();
    let children = intro.get(&sym::ENTRIES).unwrap().as_list().unwrap();
    assert_eq!(children.len(), 1);
}
