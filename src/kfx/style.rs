//! Style registry and cascade.
//!
//! The translator registers one style per CSS rule; the storyline walk
//! resolves final per-element styles by merging inherited properties,
//! scope-chain classes, element defaults and element classes, then
//! registers each resolved map under a stable composite name. After
//! [`StyleRegistry::post_process_for_kfx`] the registry is read-only.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use super::symbols::{Symbol, sym};
use super::value::{PropertyMap, Value, dimension};

/// Properties that flow down the element scope chain.
pub const INHERITABLE: &[Symbol] = &[
    sym::FONT_FAMILY,
    sym::FONT_SIZE,
    sym::FONT_WEIGHT,
    sym::FONT_STYLE,
    sym::COLOR,
    sym::TEXT_ALIGN,
    sym::TEXT_INDENT,
    sym::LINE_HEIGHT,
    sym::LETTER_SPACING,
];

/// Pseudo-element text attached to a style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PseudoContent {
    pub before: Option<String>,
    pub after: Option<String>,
}

impl PseudoContent {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

/// A named style definition.
#[derive(Debug, Clone, Default)]
pub struct StyleDef {
    pub name: String,
    pub parent: Option<String>,
    pub properties: PropertyMap,
    pub pseudo: Option<PseudoContent>,
}

impl StyleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl PartialEq for StyleDef {
    /// Styles are equal iff their resolved properties and parent match;
    /// the name is identity, not content.
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties && self.parent == other.parent
    }
}

/// How a style is referenced from the storyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Usage {
    Text,
    Image,
    Wrapper,
}

/// One element scope on the context chain.
#[derive(Debug)]
pub struct Scope {
    pub tag: String,
    pub classes: Vec<String>,
    parent: Option<Rc<Scope>>,
}

/// Immutable element context: the scope chain plus accumulated inherited
/// properties. `push` shares ancestors structurally; the FB2 walk branches
/// many times per body and never copies a chain.
#[derive(Debug, Clone, Default)]
pub struct StyleContext {
    scope: Option<Rc<Scope>>,
    inherited: PropertyMap,
}

impl StyleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter an element scope, accumulating its inheritable properties.
    pub fn push(&self, tag: &str, classes: &[String], registry: &StyleRegistry) -> StyleContext {
        let mut inherited = self.inherited.clone();
        let mut absorb = |name: &str| {
            if let Some(def) = registry.get(name) {
                for (&key, value) in &def.properties {
                    if INHERITABLE.contains(&key) {
                        inherited.insert(key, value.clone());
                    }
                }
            }
        };
        absorb(tag);
        for class in classes {
            absorb(class);
            absorb(&format!("{tag}.{class}"));
        }

        StyleContext {
            scope: Some(Rc::new(Scope {
                tag: tag.to_string(),
                classes: classes.to_vec(),
                parent: self.scope.clone(),
            })),
            inherited,
        }
    }

    pub fn inherited(&self) -> &PropertyMap {
        &self.inherited
    }

    /// Scopes from the outermost ancestor down to the innermost.
    pub fn scopes_parent_first(&self) -> Vec<Rc<Scope>> {
        let mut scopes = Vec::new();
        let mut cursor = self.scope.clone();
        while let Some(scope) = cursor {
            cursor = scope.parent.clone();
            scopes.push(scope);
        }
        scopes.reverse();
        scopes
    }

    /// Stable signature for resolution caching.
    fn signature(&self) -> String {
        let mut out = String::new();
        for scope in self.scopes_parent_first() {
            out.push_str(&scope.tag);
            for class in &scope.classes {
                out.push('.');
                out.push_str(class);
            }
            out.push('/');
        }
        out
    }
}

/// The set of registered styles plus usage tracking.
#[derive(Debug, Default)]
pub struct StyleRegistry {
    styles: HashMap<String, StyleDef>,
    order: Vec<String>,
    usage: HashMap<String, BTreeSet<Usage>>,
    resolve_cache: HashMap<String, String>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a style, merging into an existing definition of the same
    /// name (repeated CSS rules cascade in source order).
    pub fn register(&mut self, def: StyleDef) {
        match self.styles.get_mut(&def.name) {
            Some(existing) => {
                for (key, value) in def.properties {
                    existing.properties.insert(key, value);
                }
                if let Some(pseudo) = def.pseudo {
                    let merged = existing.pseudo.get_or_insert_with(PseudoContent::default);
                    if pseudo.before.is_some() {
                        merged.before = pseudo.before;
                    }
                    if pseudo.after.is_some() {
                        merged.after = pseudo.after;
                    }
                }
                if def.parent.is_some() {
                    existing.parent = def.parent;
                }
            }
            None => {
                self.order.push(def.name.clone());
                self.styles.insert(def.name.clone(), def);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&StyleDef> {
        self.styles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    /// Attach pseudo-element content to a (possibly not yet registered)
    /// base style.
    pub fn attach_pseudo(&mut self, name: &str, before: Option<String>, after: Option<String>) {
        self.register(StyleDef {
            name: name.to_string(),
            pseudo: Some(PseudoContent { before, after }),
            ..Default::default()
        });
    }

    /// Record that a style is referenced from the storyline.
    pub fn mark_used(&mut self, name: &str, usage: Usage) {
        self.usage.entry(name.to_string()).or_default().insert(usage);
    }

    /// Resolve the final style for an element.
    ///
    /// Merge order, later overriding earlier: context-inherited
    /// properties, scope-chain classes (parent first), element tag
    /// defaults, descendant rules keyed by scope class, then the
    /// element's own classes left to right.
    pub fn resolve(&mut self, tag: &str, classes: &[String], ctx: &StyleContext) -> String {
        let cache_key = format!("{}|{}|{}", ctx.signature(), tag, classes.join(" "));
        if let Some(name) = self.resolve_cache.get(&cache_key) {
            return name.clone();
        }

        let mut props = ctx.inherited().clone();
        let scopes = ctx.scopes_parent_first();

        for scope in &scopes {
            for class in &scope.classes {
                self.merge_into(&mut props, class);
            }
        }

        self.merge_into(&mut props, tag);

        // Descendant rules ("footnote p") keyed by an enclosing class.
        for scope in &scopes {
            for class in &scope.classes {
                self.merge_into(&mut props, &format!("{class} {tag}"));
            }
        }

        for class in classes {
            self.merge_into(&mut props, class);
            self.merge_into(&mut props, &format!("{tag}.{class}"));
        }

        let name = self.register_resolved(compose_name(tag, classes), props);
        self.resolve_cache.insert(cache_key, name.clone());
        name
    }

    /// Resolve a space-separated style spec, merging left to right and
    /// registering the composite under the joined name.
    pub fn resolve_style(&mut self, spec: &str) -> String {
        let parts: Vec<&str> = spec.split_whitespace().collect();
        let name = parts.join(" ");
        if self.styles.contains_key(&name) {
            return name;
        }

        let mut props = PropertyMap::new();
        for part in &parts {
            self.merge_into(&mut props, part);
        }
        self.register(StyleDef {
            name: name.clone(),
            parent: None,
            properties: props,
            pseudo: None,
        });
        name
    }

    /// Merge already-registered styles by their full names, left to
    /// right, registering the composite under the joined name. Unlike
    /// [`resolve_style`](Self::resolve_style) the names may themselves
    /// contain spaces ("p quote" + "emphasis strong").
    pub fn merge_styles(&mut self, names: &[&str]) -> String {
        let name = names.join(" ");
        if self.styles.contains_key(&name) {
            return name;
        }
        let mut props = PropertyMap::new();
        for part in names {
            self.merge_into(&mut props, part);
        }
        self.register(StyleDef {
            name: name.clone(),
            parent: None,
            properties: props,
            pseudo: None,
        });
        name
    }

    fn merge_into(&self, props: &mut PropertyMap, name: &str) {
        if let Some(def) = self.styles.get(name) {
            for (&key, value) in &def.properties {
                props.insert(key, value.clone());
            }
        }
    }

    /// Register resolved properties under `base`, suffixing on a name
    /// collision with different content.
    fn register_resolved(&mut self, base: String, props: PropertyMap) -> String {
        let mut name = base.clone();
        let mut serial = 1usize;
        loop {
            match self.styles.get(&name) {
                Some(existing) if existing.properties == props => return name,
                Some(_) => {
                    serial += 1;
                    name = format!("{base}-{serial}");
                }
                None => break,
            }
        }
        self.register(StyleDef {
            name: name.clone(),
            parent: None,
            properties: props,
            pseudo: None,
        });
        name
    }

    /// KFX-specific rewrites, applied once after translation.
    pub fn post_process_for_kfx(&mut self) {
        let names: Vec<String> = self.order.clone();
        for name in &names {
            if let Some(def) = self.styles.get_mut(name) {
                rewrite_auto_margins(&mut def.properties);
            }
        }

        // Footnote titles keep no vertical spacing of their own.
        for name in ["footnote-title-first", "footnote-title-next"] {
            if let Some(def) = self.styles.get_mut(name) {
                def.properties.remove(&sym::MARGIN_TOP);
                def.properties.remove(&sym::MARGIN_BOTTOM);
            }
        }

        // Centered code or footnote titles render poorly in the viewer.
        for name in ["code", "footnote-title"] {
            if let Some(def) = self.styles.get_mut(name) {
                def.properties.remove(&sym::TEXT_ALIGN);
            }
        }

        // Footnote paragraphs never indent.
        let mut indent = PropertyMap::new();
        indent.insert(sym::TEXT_INDENT, dimension(0.0, sym::UNIT_PERCENT));
        self.register(StyleDef {
            name: "footnote p".to_string(),
            parent: None,
            properties: indent,
            pseudo: None,
        });
    }

    /// Drop styles never referenced from the storyline.
    pub fn drop_unused(&mut self) {
        let usage = &self.usage;
        self.order.retain(|name| usage.contains_key(name));
        let order = &self.order;
        self.styles.retain(|name, _| order.contains(name));
    }

    /// Registered styles in registration order.
    pub fn styles_in_order(&self) -> impl Iterator<Item = &StyleDef> {
        self.order.iter().filter_map(|name| self.styles.get(name))
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Deterministic composite name: tag plus sorted, deduplicated classes.
fn compose_name(tag: &str, classes: &[String]) -> String {
    let mut sorted: Vec<&str> = classes.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut name = tag.to_string();
    for class in sorted {
        if !name.is_empty() {
            name.push(' ');
        }
        name.push_str(class);
    }
    name
}

/// `margin: auto` becomes box alignment; KFX has no auto margins.
fn rewrite_auto_margins(props: &mut PropertyMap) {
    let is_auto = |key: Symbol, props: &PropertyMap| {
        props.get(&key).and_then(Value::as_sym) == Some(sym::AUTO)
    };

    let left = is_auto(sym::MARGIN_LEFT, props);
    let right = is_auto(sym::MARGIN_RIGHT, props);
    let align = match (left, right) {
        (true, true) => Some(sym::CENTER),
        (true, false) => Some(sym::RIGHT),
        (false, true) => Some(sym::LEFT),
        (false, false) => None,
    };
    if let Some(align) = align {
        if left {
            props.remove(&sym::MARGIN_LEFT);
        }
        if right {
            props.remove(&sym::MARGIN_RIGHT);
        }
        // An explicit box_align always wins over the derived one.
        props.entry(sym::BOX_ALIGN).or_insert(Value::Sym(align));
    }

    for key in [sym::MARGIN_TOP, sym::MARGIN_BOTTOM] {
        if is_auto(key, props) {
            props.insert(key, dimension(0.0, sym::UNIT_EM));
        }
    }
}
