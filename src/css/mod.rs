//! CSS stylesheet input model.
//!
//! The converter consumes a parsed stylesheet: an ordered list of rules
//! and media blocks plus font-face declarations. Declaration values keep
//! their raw text alongside the first parsed token so downstream
//! translation can re-tokenize shorthands without a second parser pass.

mod parser;

pub use parser::parse_stylesheet;

/// The built-in conversion stylesheet, covering the element and class
/// names the storyline builder emits.
pub const DEFAULT_CSS: &str = include_str!("../../styles/default.css");

/// Parse the built-in stylesheet, optionally appending user CSS (later
/// rules cascade over the defaults).
pub fn default_stylesheet(user_css: &str) -> Stylesheet {
    if user_css.is_empty() {
        parse_stylesheet(DEFAULT_CSS)
    } else {
        parse_stylesheet(&format!("{DEFAULT_CSS}\n{user_css}"))
    }
}

/// A parsed stylesheet in source order.
#[derive(Debug, Default, Clone)]
pub struct Stylesheet {
    pub items: Vec<StylesheetItem>,
    pub font_faces: Vec<FontFace>,
}

/// A top-level stylesheet item.
#[derive(Debug, Clone)]
pub enum StylesheetItem {
    Rule(Rule),
    Media(MediaBlock),
}

impl Stylesheet {
    /// Iterate rules in source order, keeping only those whose enclosing
    /// media block (if any) evaluates true for the given targets.
    pub fn effective_rules(&self, kf8: bool, et: bool) -> impl Iterator<Item = &Rule> {
        self.items.iter().flat_map(move |item| match item {
            StylesheetItem::Rule(rule) => std::slice::from_ref(rule).iter(),
            StylesheetItem::Media(block) => {
                if block.query.evaluate(kf8, et) {
                    block.rules.iter()
                } else {
                    block.rules[..0].iter()
                }
            }
        })
    }
}

/// A qualified rule: one selector plus its declarations.
///
/// Selector lists (`h1, h2 { … }`) are split into one `Rule` per selector
/// at parse time.
#[derive(Debug, Clone)]
pub struct Rule {
    pub selector: Selector,
    pub declarations: Vec<Declaration>,
}

impl Rule {
    /// Look up the last declaration with the given name.
    pub fn declaration(&self, name: &str) -> Option<&CssValue> {
        self.declarations
            .iter()
            .rev()
            .find(|d| d.name == name)
            .map(|d| &d.value)
    }
}

/// A single `name: value` declaration.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub value: CssValue,
}

/// A compound selector, possibly with a descendant ancestor chain.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    /// Element tag, empty for class-only selectors. `*` is kept as-is.
    pub element: String,
    /// First class name, empty if none.
    pub class: String,
    /// Ancestor part of a descendant selector (`.outer .inner`).
    pub ancestor: Option<Box<Selector>>,
    pub pseudo: Pseudo,
    pub raw: String,
}

impl Selector {
    /// Registry key for the style this selector defines.
    pub fn style_name(&self) -> String {
        match (self.element.is_empty(), self.class.is_empty()) {
            (false, false) => format!("{}.{}", self.element, self.class),
            (false, true) => self.element.clone(),
            (true, false) => self.class.clone(),
            (true, true) => self.raw.clone(),
        }
    }
}

/// Pseudo-element of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pseudo {
    #[default]
    None,
    Before,
    After,
}

/// A declaration value.
///
/// `value`/`unit` capture the first numeric token, `keyword` the first
/// identifier, `raw` the complete value text. Shorthand expansion works
/// from `raw`; single-value properties read the parsed fields.
#[derive(Debug, Clone, Default)]
pub struct CssValue {
    pub value: f64,
    pub unit: String,
    pub keyword: String,
    pub raw: String,
}

impl CssValue {
    /// True when the declaration is the literal number zero (any unit).
    pub fn is_literal_zero(&self) -> bool {
        self.keyword.is_empty() && self.value == 0.0 && {
            let mut raw = self.raw.as_str();
            raw = raw.strip_suffix(&self.unit).unwrap_or(raw);
            raw.trim().parse::<f64>() == Ok(0.0)
        }
    }

    /// True when the value carries a numeric component.
    pub fn is_numeric(&self) -> bool {
        self.keyword.is_empty() && !self.raw.is_empty()
    }
}

/// An `@media` block.
#[derive(Debug, Clone)]
pub struct MediaBlock {
    pub query: MediaQuery,
    pub rules: Vec<Rule>,
}

/// A media query prelude, matched against the Amazon target tokens.
#[derive(Debug, Clone)]
pub struct MediaQuery {
    pub raw: String,
}

impl MediaQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Evaluate against the conversion targets.
    ///
    /// `kf8` selects the reflowable Kindle target, `et` enhanced
    /// typesetting. Comma-separated queries OR together; `not` inverts a
    /// single query.
    pub fn evaluate(&self, kf8: bool, et: bool) -> bool {
        self.raw
            .split(',')
            .any(|query| evaluate_single(query.trim(), kf8, et))
    }
}

fn evaluate_single(query: &str, kf8: bool, et: bool) -> bool {
    let mut negate = false;
    let mut result = true;
    for word in query.split_whitespace() {
        match word.to_ascii_lowercase().as_str() {
            "not" => negate = true,
            "and" => {}
            "all" | "screen" => {}
            "amzn-kf8" => result = result && kf8,
            "amzn-et" => result = result && et,
            "amzn-mobi" | "amzn-mobi7" | "print" | "speech" => result = false,
            // Unknown feature terms are conservatively false.
            other if other.starts_with('(') => result = false,
            _ => result = false,
        }
    }
    if negate { !result } else { result }
}

/// An `@font-face` declaration.
#[derive(Debug, Clone, Default)]
pub struct FontFace {
    pub family: String,
    pub src: String,
    pub weight: Option<String>,
    pub style: Option<String>,
}
