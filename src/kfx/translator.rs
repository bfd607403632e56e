//! CSS-to-KFX style translation.
//!
//! Translates one CSS rule at a time into a registered [`StyleDef`]:
//! normalizes declarations, expands shorthands, maps property names to
//! symbols and converts values into the viewer's unit conventions.
//! Stylesheet-level passes handle drop-cap detection and pseudo-element
//! content.

use tracing::debug;

use crate::css::{CssValue, Pseudo, Rule, Selector, Stylesheet};

use super::style::{StyleDef, StyleRegistry};
use super::symbols::{Symbol, sym};
use super::units::{
    absolute_to_em, em_to_lh, em_to_percent_horizontal, em_to_percent_indent, ex_to_em,
    percent_to_rem, unit_symbol,
};
use super::value::{PropertyMap, Value, color_rgba, dimension};
use super::warnings::Warnings;

/// Tags whose explicit `text-decoration: none` is meaningful.
const DECORATION_PRESERVING_TAGS: &[&str] = &["u", "a", "ins", "del", "s", "strike", "br"];

/// Generic font families that stay unquoted in the KFX stack.
const GENERIC_FAMILIES: &[&str] = &["serif", "sans-serif", "monospace", "cursive", "fantasy"];

/// Translate every effective rule of a stylesheet, in source order, then
/// run the stylesheet-level passes.
pub fn translate_stylesheet(
    sheet: &Stylesheet,
    registry: &mut StyleRegistry,
    warnings: &mut Warnings,
) {
    for rule in sheet.effective_rules(true, true) {
        translate_rule(rule, registry, warnings);
    }
    attach_drop_caps(sheet, registry);
}

/// Translate a single rule into the registry.
pub fn translate_rule(rule: &Rule, registry: &mut StyleRegistry, warnings: &mut Warnings) {
    if rule.selector.pseudo != Pseudo::None {
        translate_pseudo_rule(rule, registry, warnings);
        return;
    }

    let mut props = PropertyMap::new();
    for decl in &rule.declarations {
        apply_declaration(&mut props, &decl.name, &decl.value, &rule.selector, warnings);
    }

    registry.register(StyleDef {
        name: selector_chain_name(&rule.selector),
        parent: None,
        properties: props,
        pseudo: None,
    });
}

/// Style name for a selector, including the descendant chain
/// (`.outer .inner` registers as "outer inner").
fn selector_chain_name(selector: &Selector) -> String {
    let own = selector.style_name();
    match &selector.ancestor {
        Some(ancestor) => format!("{} {}", selector_chain_name(ancestor), own),
        None => own,
    }
}

/// `::before`/`::after` rules contribute pseudo content to the base
/// style; any other declaration on them is dropped with a warning.
fn translate_pseudo_rule(rule: &Rule, registry: &mut StyleRegistry, warnings: &mut Warnings) {
    let base = selector_chain_name(&rule.selector);
    let mut content = None;
    for decl in &rule.declarations {
        if decl.name == "content" {
            content = Some(unquote(&decl.value.raw).to_string());
        } else {
            warnings.push(format!(
                "pseudo-element {}: dropping non-content property {}",
                rule.selector.raw, decl.name
            ));
        }
    }

    let Some(content) = content else { return };
    match rule.selector.pseudo {
        Pseudo::Before => registry.attach_pseudo(&base, Some(content), None),
        Pseudo::After => registry.attach_pseudo(&base, None, Some(content)),
        Pseudo::None => unreachable!(),
    }
}

/// Scan the stylesheet for `… .dropcap` descendant rules and attach
/// drop-cap properties to the outer selector's style.
fn attach_drop_caps(sheet: &Stylesheet, registry: &mut StyleRegistry) {
    for rule in sheet.effective_rules(true, true) {
        if rule.selector.class != "dropcap" || rule.selector.pseudo != Pseudo::None {
            continue;
        }
        let Some(ancestor) = &rule.selector.ancestor else {
            continue;
        };
        let Some(font_size) = rule.declaration("font-size") else {
            continue;
        };

        let lines = (font_size.value.round() as i64).clamp(2, 10);
        let mut props = PropertyMap::new();
        props.insert(sym::DROPCAP_CHARS, Value::Int(1));
        props.insert(sym::DROPCAP_LINES, Value::Int(lines));
        registry.register(StyleDef {
            name: selector_chain_name(ancestor),
            parent: None,
            properties: props,
            pseudo: None,
        });
    }
}

/// Conversion target for dimension-valued properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Vertical spacing: margins/padding top and bottom, in lh.
    Vertical,
    /// Horizontal spacing: margins/padding left and right, in %.
    Horizontal,
    /// text-indent, in %.
    TextIndent,
    /// line-height, in lh.
    LineHeight,
    /// Everything else keeps its unit.
    Generic,
}

fn apply_declaration(
    props: &mut PropertyMap,
    name: &str,
    value: &CssValue,
    selector: &Selector,
    warnings: &mut Warnings,
) {
    // Keyword-only cascade resets never translate.
    if matches!(value.keyword.as_str(), "inherit" | "initial" | "unset") {
        debug!(name, keyword = %value.keyword, "dropping cascade keyword");
        return;
    }

    // A declaration that is literally zero adds nothing for these
    // properties; zeros inside a mixed shorthand survive as explicit
    // side overrides.
    if value.is_literal_zero()
        && (name == "font-size" || name.starts_with("margin") || name.starts_with("padding"))
    {
        debug!(name, "dropping zero-valued declaration");
        return;
    }

    match name {
        "margin" => expand_box_shorthand(props, "margin", &value.raw, warnings),
        "padding" => expand_box_shorthand(props, "padding", &value.raw, warnings),
        "border" => expand_border_shorthand(props, &value.raw, warnings),
        "background" => apply_background(props, &value.raw),

        "margin-top" => set_dimension(props, sym::MARGIN_TOP, value, Axis::Vertical, warnings),
        "margin-bottom" => {
            set_dimension(props, sym::MARGIN_BOTTOM, value, Axis::Vertical, warnings);
        }
        "margin-left" => set_dimension(props, sym::MARGIN_LEFT, value, Axis::Horizontal, warnings),
        "margin-right" => {
            set_dimension(props, sym::MARGIN_RIGHT, value, Axis::Horizontal, warnings);
        }
        "padding-top" => set_dimension(props, sym::PADDING_TOP, value, Axis::Vertical, warnings),
        "padding-bottom" => {
            set_dimension(props, sym::PADDING_BOTTOM, value, Axis::Vertical, warnings);
        }
        "padding-left" => {
            set_dimension(props, sym::PADDING_LEFT, value, Axis::Horizontal, warnings);
        }
        "padding-right" => {
            set_dimension(props, sym::PADDING_RIGHT, value, Axis::Horizontal, warnings);
        }

        "font-size" => apply_font_size(props, value),
        "font-weight" => apply_font_weight(props, value, warnings),
        "font-style" => apply_enum(
            props,
            sym::FONT_STYLE,
            value,
            &[
                ("normal", sym::NORMAL),
                ("italic", sym::ITALIC),
                ("oblique", sym::OBLIQUE),
            ],
            warnings,
        ),
        "font-family" => apply_font_family(props, &value.raw),
        "font-variant" => apply_enum(
            props,
            sym::FONT_VARIANT,
            value,
            &[("normal", sym::NORMAL), ("small-caps", sym::SMALL_CAPS)],
            warnings,
        ),

        "color" => apply_color(props, sym::COLOR, &value.raw, warnings),
        "background-color" => apply_color(props, sym::BACKGROUND_COLOR, &value.raw, warnings),
        "border-color" => apply_color(props, sym::BORDER_COLOR, &value.raw, warnings),
        "text-emphasis-color" => {
            apply_color(props, sym::TEXT_EMPHASIS_COLOR, &value.raw, warnings);
        }

        "text-align" => apply_enum(
            props,
            sym::TEXT_ALIGN,
            value,
            &[
                ("left", sym::LEFT),
                ("right", sym::RIGHT),
                ("center", sym::CENTER),
                ("justify", sym::JUSTIFY),
            ],
            warnings,
        ),
        "text-indent" => set_dimension(props, sym::TEXT_INDENT, value, Axis::TextIndent, warnings),
        "line-height" => set_dimension(props, sym::LINE_HEIGHT, value, Axis::LineHeight, warnings),
        "letter-spacing" => {
            set_dimension(props, sym::LETTER_SPACING, value, Axis::Generic, warnings);
        }
        "word-spacing" => set_dimension(props, sym::WORD_SPACING, value, Axis::Generic, warnings),
        "width" => set_dimension(props, sym::WIDTH, value, Axis::Generic, warnings),
        "height" => set_dimension(props, sym::HEIGHT, value, Axis::Generic, warnings),

        "text-decoration" | "text-decoration-line" => {
            apply_text_decoration(props, &value.raw, selector);
        }
        "vertical-align" => apply_vertical_align(props, value, warnings),
        "text-transform" => apply_enum(
            props,
            sym::TEXT_TRANSFORM,
            value,
            &[
                ("none", sym::NONE),
                ("uppercase", sym::UPPERCASE),
                ("lowercase", sym::LOWERCASE),
                ("capitalize", sym::CAPITALIZE),
            ],
            warnings,
        ),
        "hyphens" => apply_enum(
            props,
            sym::HYPHENS,
            value,
            &[
                ("auto", sym::AUTO),
                ("manual", sym::MANUAL),
                ("none", sym::NONE),
            ],
            warnings,
        ),
        "writing-mode" => apply_enum(
            props,
            sym::WRITING_MODE,
            value,
            &[
                ("horizontal-tb", sym::HORIZONTAL_TB),
                ("vertical-rl", sym::VERTICAL_RL),
                ("vertical-lr", sym::VERTICAL_LR),
            ],
            warnings,
        ),
        "text-orientation" => apply_enum(
            props,
            sym::TEXT_ORIENTATION,
            value,
            &[
                ("mixed", sym::MIXED),
                ("upright", sym::UPRIGHT),
                ("sideways", sym::SIDEWAYS),
            ],
            warnings,
        ),
        "text-combine" | "text-combine-upright" => apply_enum(
            props,
            sym::TEXT_COMBINE,
            value,
            &[("none", sym::NONE), ("all", sym::ALL)],
            warnings,
        ),
        "text-emphasis-style" => apply_text_emphasis_style(props, &value.raw, warnings),
        "float" => apply_enum(
            props,
            sym::FLOAT,
            value,
            &[
                ("left", sym::LEFT),
                ("right", sym::RIGHT),
                ("none", sym::NONE),
            ],
            warnings,
        ),
        "clear" => apply_enum(
            props,
            sym::CLEAR,
            value,
            &[
                ("left", sym::LEFT),
                ("right", sym::RIGHT),
                ("both", sym::BOTH),
                ("none", sym::NONE),
            ],
            warnings,
        ),

        "break-before" | "page-break-before" => {
            apply_break(props, sym::YJ_BREAK_BEFORE, value);
        }
        "break-after" | "page-break-after" => {
            apply_break(props, sym::YJ_BREAK_AFTER, value);
        }
        "break-inside" | "page-break-inside" => {
            apply_break(props, sym::BREAK_INSIDE, value);
        }

        "border-width" => set_dimension(props, sym::BORDER_WIDTH, value, Axis::Generic, warnings),
        "border-style" => apply_border_style(props, &value.keyword),
        "border-collapse" => match value.keyword.as_str() {
            "collapse" => {
                props.insert(sym::BORDER_COLLAPSE, Value::Bool(true));
            }
            "separate" => {
                props.insert(sym::BORDER_COLLAPSE, Value::Bool(false));
            }
            other => debug!(value = other, "dropping border-collapse value"),
        },
        "border-spacing" => apply_border_spacing(props, &value.raw, warnings),

        "white-space" => match value.keyword.as_str() {
            "nowrap" => {
                props.insert(sym::WHITE_SPACE, Value::Bool(true));
            }
            "normal" => {}
            other => debug!(value = other, "dropping white-space value"),
        },

        _ => debug!(property = name, "dropping unknown property"),
    }
}

/// Set a dimension-valued property per the KP3 unit table.
fn set_dimension(
    props: &mut PropertyMap,
    property: Symbol,
    css: &CssValue,
    axis: Axis,
    warnings: &mut Warnings,
) {
    match css.keyword.as_str() {
        "auto" => {
            props.insert(property, Value::Sym(sym::AUTO));
            return;
        }
        "" => {}
        other => {
            debug!(property = ?property, keyword = other, "dropping keyword value");
            return;
        }
    }
    if !css.is_numeric() {
        return;
    }

    let is_margin = matches!(
        property,
        sym::MARGIN_TOP | sym::MARGIN_BOTTOM | sym::MARGIN_LEFT | sym::MARGIN_RIGHT
    );
    if is_margin && css.value < 0.0 {
        warnings.push(format!("dropping negative margin: {}", css.raw));
        return;
    }

    // ex normalizes to em before any axis conversion.
    let mut value = css.value;
    let mut unit = css.unit.as_str();
    if unit == "ex" {
        value = ex_to_em(value);
        unit = "em";
    }

    let converted = match axis {
        Axis::Vertical => match unit {
            "em" => Some(dimension(em_to_lh(value), sym::UNIT_LH)),
            "lh" => Some(dimension(value, sym::UNIT_LH)),
            "%" => Some(dimension(value, sym::UNIT_PERCENT)),
            "" if value == 0.0 => Some(dimension(0.0, sym::UNIT_LH)),
            other => absolute_to_em(value, other)
                .map(|em| dimension(em_to_lh(em), sym::UNIT_LH)),
        },
        Axis::Horizontal => match unit {
            "em" => Some(dimension(em_to_percent_horizontal(value), sym::UNIT_PERCENT)),
            "%" => Some(dimension(value, sym::UNIT_PERCENT)),
            "" if value == 0.0 => Some(dimension(0.0, sym::UNIT_PERCENT)),
            other => absolute_to_em(value, other)
                .map(|em| dimension(em_to_percent_horizontal(em), sym::UNIT_PERCENT)),
        },
        Axis::TextIndent => match unit {
            "%" => Some(dimension(value, sym::UNIT_PERCENT)),
            "em" => Some(dimension(em_to_percent_indent(value), sym::UNIT_PERCENT)),
            "" if value == 0.0 => Some(dimension(0.0, sym::UNIT_PERCENT)),
            other => absolute_to_em(value, other)
                .map(|em| dimension(em_to_percent_indent(em), sym::UNIT_PERCENT)),
        },
        Axis::LineHeight => match unit {
            "" => Some(dimension(value, sym::UNIT_LH)),
            "lh" => Some(dimension(value, sym::UNIT_LH)),
            "em" => Some(dimension(em_to_lh(value), sym::UNIT_LH)),
            "%" => Some(dimension(value / 100.0, sym::UNIT_LH)),
            other => absolute_to_em(value, other)
                .map(|em| dimension(em_to_lh(em), sym::UNIT_LH)),
        },
        Axis::Generic => match unit {
            "" => Some(dimension(value, sym::UNIT_PX)),
            other => unit_symbol(other).map(|unit_sym| dimension(value, unit_sym)),
        },
    };

    match converted {
        Some(dim) => {
            props.insert(property, dim);
        }
        None => debug!(property = ?property, unit, "dropping unconvertible unit"),
    }
}

fn apply_font_size(props: &mut PropertyMap, css: &CssValue) {
    match css.keyword.as_str() {
        "smaller" => {
            props.insert(sym::FONT_SIZE, dimension(0.8333, sym::UNIT_EM));
            return;
        }
        "larger" => {
            props.insert(sym::FONT_SIZE, dimension(1.2, sym::UNIT_EM));
            return;
        }
        "" => {}
        other => {
            debug!(keyword = other, "dropping font-size keyword");
            return;
        }
    }
    if !css.is_numeric() {
        return;
    }

    let dim = match css.unit.as_str() {
        // Percentages compress to rem; em stays relative so nested
        // resolutions keep multiplying.
        "%" => dimension(percent_to_rem(css.value), sym::UNIT_REM),
        "em" => dimension(css.value, sym::UNIT_EM),
        "rem" => dimension(css.value, sym::UNIT_REM),
        "ex" => dimension(ex_to_em(css.value), sym::UNIT_EM),
        other => match absolute_to_em(css.value, other) {
            Some(em) => dimension(em, sym::UNIT_EM),
            None => {
                debug!(unit = other, "dropping font-size unit");
                return;
            }
        },
    };
    props.insert(sym::FONT_SIZE, dim);
}

fn apply_font_weight(props: &mut PropertyMap, css: &CssValue, warnings: &mut Warnings) {
    let symbol = if css.keyword.is_empty() {
        match css.value as i64 {
            100 => Some(sym::WEIGHT_100),
            200 => Some(sym::WEIGHT_200),
            300 => Some(sym::WEIGHT_300),
            400 => Some(sym::NORMAL),
            500 => Some(sym::WEIGHT_500),
            600 => Some(sym::WEIGHT_600),
            700 => Some(sym::BOLD),
            800 => Some(sym::WEIGHT_800),
            900 => Some(sym::WEIGHT_900),
            _ => None,
        }
    } else {
        match css.keyword.as_str() {
            "normal" => Some(sym::NORMAL),
            "bold" | "bolder" => Some(sym::BOLD),
            "lighter" => Some(sym::WEIGHT_300),
            _ => None,
        }
    };
    match symbol {
        Some(symbol) => {
            props.insert(sym::FONT_WEIGHT, Value::Sym(symbol));
        }
        None => warnings.push(format!("unsupported font-weight value: {}", css.raw)),
    }
}

fn apply_enum(
    props: &mut PropertyMap,
    property: Symbol,
    css: &CssValue,
    table: &[(&str, Symbol)],
    warnings: &mut Warnings,
) {
    match table
        .iter()
        .find(|(keyword, _)| *keyword == css.keyword)
        .map(|&(_, symbol)| symbol)
    {
        Some(symbol) => {
            props.insert(property, Value::Sym(symbol));
        }
        None => warnings.push(format!(
            "unsupported {} value: {}",
            super::symbols::symbol_name(property).unwrap_or("property"),
            css.raw
        )),
    }
}

fn apply_font_family(props: &mut PropertyMap, raw: &str) {
    let mut families = Vec::new();
    for part in raw.split(',') {
        let family = unquote(part.trim());
        if family.is_empty() {
            continue;
        }
        let lower = family.to_lowercase();
        if GENERIC_FAMILIES.contains(&lower.as_str()) {
            families.push(lower);
        } else {
            families.push(format!("\"{family}\""));
        }
    }
    if !families.is_empty() {
        props.insert(sym::FONT_FAMILY, Value::Str(families.join(", ")));
    }
}

fn apply_color(props: &mut PropertyMap, property: Symbol, raw: &str, warnings: &mut Warnings) {
    match parse_color(raw) {
        Some(value) => {
            props.insert(property, value);
        }
        None => warnings.push(format!("unparseable color: {raw}")),
    }
}

fn apply_background(props: &mut PropertyMap, raw: &str) {
    // Only the first color token matters; image/position/repeat are
    // ignored.
    for token in split_value_tokens(raw) {
        if let Some(value) = parse_color(&token) {
            props.insert(sym::BACKGROUND_COLOR, value);
            return;
        }
    }
    debug!(raw, "background without color token");
}

fn apply_text_decoration(props: &mut PropertyMap, raw: &str, selector: &Selector) {
    for word in raw.split_whitespace() {
        match word.to_lowercase().as_str() {
            "underline" => {
                props.insert(sym::UNDERLINE, Value::Sym(sym::SOLID));
            }
            "overline" => {
                props.insert(sym::OVERLINE, Value::Sym(sym::SOLID));
            }
            "line-through" => {
                props.insert(sym::STRIKETHROUGH, Value::Sym(sym::SOLID));
            }
            "none" => {
                let tag = selector.element.as_str();
                let keep = tag.is_empty() || DECORATION_PRESERVING_TAGS.contains(&tag);
                if keep {
                    props.insert(sym::UNDERLINE, Value::Sym(sym::NONE));
                    props.insert(sym::STRIKETHROUGH, Value::Sym(sym::NONE));
                } else {
                    debug!(tag, "stripping text-decoration: none");
                }
            }
            other => debug!(value = other, "dropping text-decoration value"),
        }
    }
}

fn apply_vertical_align(props: &mut PropertyMap, css: &CssValue, warnings: &mut Warnings) {
    if css.keyword.is_empty() {
        set_dimension(props, sym::BASELINE_SHIFT, css, Axis::Generic, warnings);
        return;
    }
    let symbol = match css.keyword.as_str() {
        "baseline" => sym::NORMAL,
        "super" => sym::SUPER,
        "sub" => sym::SUB,
        "top" => sym::TOP,
        "bottom" => sym::BOTTOM,
        "middle" => sym::CENTER,
        "text-top" => sym::TEXT_TOP,
        "text-bottom" => sym::TEXT_BOTTOM,
        other => {
            warnings.push(format!("unsupported vertical-align value: {other}"));
            return;
        }
    };
    props.insert(sym::BASELINE_STYLE, Value::Sym(symbol));
}

fn apply_text_emphasis_style(props: &mut PropertyMap, raw: &str, warnings: &mut Warnings) {
    let mut open = false;
    let mut shape = None;
    for word in raw.split_whitespace() {
        match word.to_lowercase().as_str() {
            "none" => {
                props.insert(sym::TEXT_EMPHASIS_STYLE, Value::Sym(sym::NONE));
                return;
            }
            "open" => open = true,
            "filled" => open = false,
            "circle" => shape = Some((sym::FILLED_CIRCLE, sym::OPEN_CIRCLE)),
            "dot" => shape = Some((sym::FILLED_DOT, sym::OPEN_DOT)),
            "sesame" => shape = Some((sym::FILLED_SESAME, sym::OPEN_SESAME)),
            _ => {}
        }
    }
    match shape {
        Some((filled, opened)) => {
            let symbol = if open { opened } else { filled };
            props.insert(sym::TEXT_EMPHASIS_STYLE, Value::Sym(symbol));
        }
        None => warnings.push(format!("unsupported text-emphasis-style value: {raw}")),
    }
}

/// Break properties carry through only as `avoid`; page breaks come from
/// section boundaries, so `always`/`page` are no-ops in styles.
fn apply_break(props: &mut PropertyMap, property: Symbol, css: &CssValue) {
    match css.keyword.as_str() {
        "avoid" | "avoid-page" | "avoid-column" => {
            props.insert(property, Value::Sym(sym::AVOID));
        }
        "always" | "page" | "left" | "right" | "auto" | "column" => {}
        other => debug!(value = other, "dropping break value"),
    }
}

fn apply_border_style(props: &mut PropertyMap, keyword: &str) {
    match keyword {
        "none" | "hidden" => {
            props.insert(sym::BORDER_STYLE, Value::Sym(sym::NONE));
        }
        "" => {}
        other => {
            // The viewer renders every visible border style as solid.
            if other != "solid" {
                debug!(style = other, "coercing border style to solid");
            }
            props.insert(sym::BORDER_STYLE, Value::Sym(sym::SOLID));
        }
    }
}

fn apply_border_spacing(props: &mut PropertyMap, raw: &str, warnings: &mut Warnings) {
    let tokens: Vec<String> = split_value_tokens(raw);
    let mut dims = tokens.iter().map(|t| parse_numeric_token(t));
    let Some(Some(horizontal)) = dims.next() else {
        debug!(raw, "dropping border-spacing value");
        return;
    };
    let vertical = dims.next().flatten().unwrap_or_else(|| horizontal.clone());

    set_dimension(
        props,
        sym::BORDER_SPACING_HORIZONTAL,
        &horizontal,
        Axis::Generic,
        warnings,
    );
    set_dimension(
        props,
        sym::BORDER_SPACING_VERTICAL,
        &vertical,
        Axis::Generic,
        warnings,
    );
}

/// Expand `margin`/`padding` shorthand into four side properties.
///
/// Zeros that survive the whole-declaration zero check become explicit
/// `0 lh` / `0 %` overrides on their side.
fn expand_box_shorthand(
    props: &mut PropertyMap,
    prefix: &str,
    raw: &str,
    warnings: &mut Warnings,
) {
    let tokens = split_value_tokens(raw);
    let parsed: Vec<CssValue> = tokens.iter().map(|t| parse_shorthand_token(t)).collect();

    let (top, right, bottom, left) = match parsed.as_slice() {
        [all] => (all, all, all, all),
        [tb, lr] => (tb, lr, tb, lr),
        [t, lr, b] => (t, lr, b, lr),
        [t, r, b, l] => (t, r, b, l),
        _ => {
            debug!(prefix, raw, "dropping malformed box shorthand");
            return;
        }
    };

    let sides: [(Symbol, &CssValue, Axis); 4] = if prefix == "margin" {
        [
            (sym::MARGIN_TOP, top, Axis::Vertical),
            (sym::MARGIN_RIGHT, right, Axis::Horizontal),
            (sym::MARGIN_BOTTOM, bottom, Axis::Vertical),
            (sym::MARGIN_LEFT, left, Axis::Horizontal),
        ]
    } else {
        [
            (sym::PADDING_TOP, top, Axis::Vertical),
            (sym::PADDING_RIGHT, right, Axis::Horizontal),
            (sym::PADDING_BOTTOM, bottom, Axis::Vertical),
            (sym::PADDING_LEFT, left, Axis::Horizontal),
        ]
    };
    for (property, value, axis) in sides {
        set_dimension(props, property, value, axis, warnings);
    }
}

/// `border`: width, style keyword and color, in any order.
fn expand_border_shorthand(props: &mut PropertyMap, raw: &str, warnings: &mut Warnings) {
    for token in split_value_tokens(raw) {
        let lower = token.to_lowercase();
        match lower.as_str() {
            "thin" => {
                props.insert(sym::BORDER_WIDTH, dimension(1.0, sym::UNIT_PX));
                continue;
            }
            "medium" => {
                props.insert(sym::BORDER_WIDTH, dimension(3.0, sym::UNIT_PX));
                continue;
            }
            "thick" => {
                props.insert(sym::BORDER_WIDTH, dimension(5.0, sym::UNIT_PX));
                continue;
            }
            "none" | "hidden" | "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge"
            | "inset" | "outset" => {
                apply_border_style(props, &lower);
                continue;
            }
            _ => {}
        }
        if let Some(value) = parse_color(&token) {
            props.insert(sym::BORDER_COLOR, value);
        } else if let Some(width) = parse_numeric_token(&token) {
            set_dimension(props, sym::BORDER_WIDTH, &width, Axis::Generic, warnings);
        } else {
            debug!(%token, "dropping border shorthand token");
        }
    }
}

/// Split a value into whitespace-separated tokens, keeping parenthesized
/// groups (`rgb(…)`) together.
fn split_value_tokens(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parse one shorthand token into a `CssValue`.
fn parse_shorthand_token(token: &str) -> CssValue {
    if let Some(numeric) = parse_numeric_token(token) {
        return numeric;
    }
    CssValue {
        keyword: token.to_lowercase(),
        raw: token.to_string(),
        ..Default::default()
    }
}

fn parse_numeric_token(token: &str) -> Option<CssValue> {
    let split = token
        .char_indices()
        .find(|&(_, c)| c.is_alphabetic() || c == '%')
        .map(|(idx, _)| idx)
        .unwrap_or(token.len());
    let (number, unit) = token.split_at(split);
    let value: f64 = number.trim().parse().ok()?;
    Some(CssValue {
        value,
        unit: unit.to_lowercase(),
        keyword: String::new(),
        raw: token.to_string(),
    })
}

/// Parse a color literal: `#rgb`, `#rrggbb`, `rgb()`, `rgba()` or a
/// named color.
fn parse_color(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        return parse_hex_color(hex);
    }

    let lower = raw.to_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
    {
        let args = args.strip_suffix(')')?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            return None;
        }
        let channel = |part: &str| -> Option<u8> {
            if let Some(percent) = part.strip_suffix('%') {
                let v: f64 = percent.trim().parse().ok()?;
                Some((v * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8)
            } else {
                let v: f64 = part.parse().ok()?;
                Some(v.round().clamp(0.0, 255.0) as u8)
            }
        };
        let r = channel(parts[0])?;
        let g = channel(parts[1])?;
        let b = channel(parts[2])?;
        let a = match parts.get(3) {
            Some(part) => {
                let v: f64 = part.parse().ok()?;
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            }
            None => 0xFF,
        };
        return Some(color_rgba(r, g, b, a));
    }

    named_color(&lower)
}

fn parse_hex_color(hex: &str) -> Option<Value> {
    let expand = |c: u8| (c << 4) | c;
    match hex.len() {
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
            Some(color_rgba(expand(r), expand(g), expand(b), 0xFF))
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(color_rgba(r, g, b, 0xFF))
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Value> {
    let (r, g, b) = match name {
        "black" => (0x00, 0x00, 0x00),
        "silver" => (0xC0, 0xC0, 0xC0),
        "gray" | "grey" => (0x80, 0x80, 0x80),
        "white" => (0xFF, 0xFF, 0xFF),
        "maroon" => (0x80, 0x00, 0x00),
        "red" => (0xFF, 0x00, 0x00),
        "purple" => (0x80, 0x00, 0x80),
        "fuchsia" => (0xFF, 0x00, 0xFF),
        "green" => (0x00, 0x80, 0x00),
        "lime" => (0x00, 0xFF, 0x00),
        "olive" => (0x80, 0x80, 0x00),
        "yellow" => (0xFF, 0xFF, 0x00),
        "navy" => (0x00, 0x00, 0x80),
        "blue" => (0x00, 0x00, 0xFF),
        "teal" => (0x00, 0x80, 0x80),
        "aqua" => (0x00, 0xFF, 0xFF),
        "orange" => (0xFF, 0xA5, 0x00),
        "brown" => (0xA5, 0x2A, 0x2A),
        _ => return None,
    };
    Some(color_rgba(r, g, b, 0xFF))
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parse_stylesheet;
    use crate::kfx::value::as_dimension;

    fn translate(css: &str) -> (StyleRegistry, Warnings) {
        let sheet = parse_stylesheet(css);
        let mut registry = StyleRegistry::new();
        let mut warnings = Warnings::new();
        translate_stylesheet(&sheet, &mut registry, &mut warnings);
        (registry, warnings)
    }

    fn dim_of(registry: &StyleRegistry, style: &str, property: Symbol) -> (f64, Symbol) {
        let def = registry.get(style).unwrap_or_else(|| panic!("style {style} missing"));
        let value = def
            .properties
            .get(&property)
            .unwrap_or_else(|| panic!("property {property} missing on {style}"));
        as_dimension(value).expect("not a dimension")
    }

    #[test]
    fn test_font_size_percent_compression() {
        let (registry, _) = translate(".big { font-size: 140%; }");
        let (value, unit) = dim_of(&registry, "big", sym::FONT_SIZE);
        assert_eq!(value, 1.25);
        assert_eq!(unit, sym::UNIT_REM);
    }

    #[test]
    fn test_font_size_small_percent_linear() {
        let (registry, _) = translate(".small { font-size: 80%; }");
        let (value, unit) = dim_of(&registry, "small", sym::FONT_SIZE);
        assert_eq!(value, 0.8);
        assert_eq!(unit, sym::UNIT_REM);
    }

    #[test]
    fn test_font_size_em_preserved() {
        let (registry, _) = translate("sup { font-size: 0.7em; }");
        let (value, unit) = dim_of(&registry, "sup", sym::FONT_SIZE);
        assert_eq!(value, 0.7);
        assert_eq!(unit, sym::UNIT_EM);
    }

    #[test]
    fn test_font_size_keywords() {
        let (registry, _) = translate("sub { font-size: smaller; } big { font-size: larger; }");
        assert_eq!(dim_of(&registry, "sub", sym::FONT_SIZE).0, 0.833);
        assert_eq!(dim_of(&registry, "big", sym::FONT_SIZE).0, 1.2);
    }

    #[test]
    fn test_margin_shorthand_mixed_zero() {
        let (registry, _) = translate("p { margin: 1em 0 2em 0; }");
        assert_eq!(
            dim_of(&registry, "p", sym::MARGIN_TOP),
            (0.833, sym::UNIT_LH)
        );
        assert_eq!(
            dim_of(&registry, "p", sym::MARGIN_RIGHT),
            (0.0, sym::UNIT_PERCENT)
        );
        assert_eq!(
            dim_of(&registry, "p", sym::MARGIN_BOTTOM),
            (1.667, sym::UNIT_LH)
        );
        assert_eq!(
            dim_of(&registry, "p", sym::MARGIN_LEFT),
            (0.0, sym::UNIT_PERCENT)
        );
    }

    #[test]
    fn test_zero_only_declarations_dropped() {
        let (registry, _) = translate("p { margin: 0; font-size: 0; padding-top: 0pt; }");
        let def = registry.get("p").unwrap();
        assert!(def.properties.is_empty());
    }

    #[test]
    fn test_margin_auto_kept_as_symbol() {
        let (registry, _) = translate("div { margin-left: auto; }");
        let def = registry.get("div").unwrap();
        assert_eq!(
            def.properties.get(&sym::MARGIN_LEFT),
            Some(&Value::Sym(sym::AUTO))
        );
    }

    #[test]
    fn test_negative_margin_warned_and_dropped() {
        let (registry, warnings) = translate("p { margin-top: -1em; }");
        assert!(registry.get("p").unwrap().properties.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_text_indent_units() {
        let (registry, _) = translate("p { text-indent: 1.5em; } .flat { text-indent: 0%; }");
        assert_eq!(
            dim_of(&registry, "p", sym::TEXT_INDENT),
            (4.688, sym::UNIT_PERCENT)
        );
        // Explicit zero percent survives; it overrides inherited indents.
        assert_eq!(
            dim_of(&registry, "flat", sym::TEXT_INDENT),
            (0.0, sym::UNIT_PERCENT)
        );
    }

    #[test]
    fn test_line_height_unitless_direct() {
        let (registry, _) = translate("p { line-height: 1.4; } .tall { line-height: 1.8em; }");
        assert_eq!(dim_of(&registry, "p", sym::LINE_HEIGHT), (1.4, sym::UNIT_LH));
        assert_eq!(
            dim_of(&registry, "tall", sym::LINE_HEIGHT),
            (1.5, sym::UNIT_LH)
        );
    }

    #[test]
    fn test_ex_converts_to_em() {
        let (registry, _) = translate("p { letter-spacing: 1ex; }");
        assert_eq!(
            dim_of(&registry, "p", sym::LETTER_SPACING),
            (0.44, sym::UNIT_EM)
        );
    }

    #[test]
    fn test_absolute_vertical_chain() {
        // 16px == 1em == 0.833lh
        let (registry, _) = translate("p { margin-top: 16px; }");
        assert_eq!(
            dim_of(&registry, "p", sym::MARGIN_TOP),
            (0.833, sym::UNIT_LH)
        );
    }

    #[test]
    fn test_dropcap_detection() {
        let (registry, _) = translate(".has-dropcap .dropcap { font-size: 3.2em; }");
        let def = registry.get("has-dropcap").unwrap();
        assert_eq!(def.properties.get(&sym::DROPCAP_CHARS), Some(&Value::Int(1)));
        assert_eq!(def.properties.get(&sym::DROPCAP_LINES), Some(&Value::Int(3)));
    }

    #[test]
    fn test_dropcap_lines_clamped() {
        let (registry, _) = translate(".a .dropcap { font-size: 14em; } ");
        let def = registry.get("a").unwrap();
        assert_eq!(def.properties.get(&sym::DROPCAP_LINES), Some(&Value::Int(10)));
    }

    #[test]
    fn test_text_decoration_none_stripped_except_preserving() {
        let (registry, _) =
            translate("p { text-decoration: none; } a { text-decoration: none; }");
        assert!(registry.get("p").unwrap().properties.is_empty());
        let a = registry.get("a").unwrap();
        assert_eq!(a.properties.get(&sym::UNDERLINE), Some(&Value::Sym(sym::NONE)));
    }

    #[test]
    fn test_text_decoration_none_kept_for_class_only() {
        let (registry, _) = translate(".plain { text-decoration: none; }");
        let def = registry.get("plain").unwrap();
        assert_eq!(def.properties.get(&sym::UNDERLINE), Some(&Value::Sym(sym::NONE)));
    }

    #[test]
    fn test_text_decoration_decomposition() {
        let (registry, _) = translate("em { text-decoration: underline line-through; }");
        let def = registry.get("em").unwrap();
        assert_eq!(def.properties.get(&sym::UNDERLINE), Some(&Value::Sym(sym::SOLID)));
        assert_eq!(
            def.properties.get(&sym::STRIKETHROUGH),
            Some(&Value::Sym(sym::SOLID))
        );
    }

    #[test]
    fn test_border_shorthand_any_order() {
        let (registry, _) = translate(".boxed { border: solid 2px #336699; }");
        let def = registry.get("boxed").unwrap();
        assert_eq!(def.properties.get(&sym::BORDER_STYLE), Some(&Value::Sym(sym::SOLID)));
        assert_eq!(
            def.properties.get(&sym::BORDER_COLOR),
            Some(&Value::Int(0xFF336699u32 as i64))
        );
        let (width, unit) = as_dimension(def.properties.get(&sym::BORDER_WIDTH).unwrap()).unwrap();
        assert_eq!((width, unit), (2.0, sym::UNIT_PX));
    }

    #[test]
    fn test_background_extracts_first_color() {
        let (registry, _) =
            translate(".hl { background: url(x.png) no-repeat rgb(255, 0, 0) top; }");
        let def = registry.get("hl").unwrap();
        assert_eq!(
            def.properties.get(&sym::BACKGROUND_COLOR),
            Some(&Value::Int(0xFFFF0000u32 as i64))
        );
    }

    #[test]
    fn test_color_forms() {
        let (registry, warnings) = translate(
            ".a { color: #abc; } .b { color: rgba(1, 2, 3, 0.5); } .c { color: olive; } \
             .d { color: bogus; }",
        );
        assert_eq!(
            registry.get("a").unwrap().properties.get(&sym::COLOR),
            Some(&Value::Int(0xFFAABBCCu32 as i64))
        );
        assert_eq!(
            registry.get("b").unwrap().properties.get(&sym::COLOR),
            Some(&Value::Int(0x80010203))
        );
        assert_eq!(
            registry.get("c").unwrap().properties.get(&sym::COLOR),
            Some(&Value::Int(0xFF808000u32 as i64))
        );
        assert!(registry.get("d").unwrap().properties.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_vertical_align_keyword_and_length() {
        let (registry, _) =
            translate("sup { vertical-align: super; } .raised { vertical-align: 0.3em; }");
        assert_eq!(
            registry.get("sup").unwrap().properties.get(&sym::BASELINE_STYLE),
            Some(&Value::Sym(sym::SUPER))
        );
        let (value, unit) = as_dimension(
            registry
                .get("raised")
                .unwrap()
                .properties
                .get(&sym::BASELINE_SHIFT)
                .unwrap(),
        )
        .unwrap();
        assert_eq!((value, unit), (0.3, sym::UNIT_EM));
    }

    #[test]
    fn test_break_properties_only_avoid() {
        let (registry, _) = translate(
            ".keep { page-break-before: avoid; page-break-after: always; break-inside: avoid; }",
        );
        let def = registry.get("keep").unwrap();
        assert_eq!(
            def.properties.get(&sym::YJ_BREAK_BEFORE),
            Some(&Value::Sym(sym::AVOID))
        );
        assert!(def.properties.get(&sym::YJ_BREAK_AFTER).is_none());
        assert_eq!(
            def.properties.get(&sym::BREAK_INSIDE),
            Some(&Value::Sym(sym::AVOID))
        );
    }

    #[test]
    fn test_font_family_stack() {
        let (registry, _) = translate("code { font-family: \"PT Mono\", monospace; }");
        let def = registry.get("code").unwrap();
        assert_eq!(
            def.properties.get(&sym::FONT_FAMILY),
            Some(&Value::Str("\"PT Mono\", monospace".into()))
        );
    }

    #[test]
    fn test_font_weight_numeric() {
        let (registry, warnings) =
            translate(".w { font-weight: 600; } .x { font-weight: 450; }");
        assert_eq!(
            registry.get("w").unwrap().properties.get(&sym::FONT_WEIGHT),
            Some(&Value::Sym(sym::WEIGHT_600))
        );
        assert!(registry.get("x").unwrap().properties.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unknown_property_dropped_silently() {
        let (registry, warnings) = translate("p { -epub-ruby-position: over; }");
        assert!(registry.get("p").unwrap().properties.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_inherit_dropped() {
        let (registry, _) = translate("p { font-size: inherit; margin-top: initial; }");
        assert!(registry.get("p").unwrap().properties.is_empty());
    }

    #[test]
    fn test_pseudo_content_attached() {
        let (registry, warnings) = translate(
            ".epigraph::before { content: \"— \"; color: red; } .sig::after { content: '.'; }",
        );
        let def = registry.get("epigraph").unwrap();
        let pseudo = def.pseudo.as_ref().unwrap();
        assert_eq!(pseudo.before.as_deref(), Some("— "));
        assert_eq!(warnings.len(), 1);

        let sig = registry.get("sig").unwrap();
        assert_eq!(sig.pseudo.as_ref().unwrap().after.as_deref(), Some("."));
    }

    #[test]
    fn test_descendant_rule_registered_under_chain_name() {
        let (registry, _) = translate(".poem .stanza { margin-left: 2em; }");
        let def = registry.get("poem stanza").unwrap();
        assert_eq!(
            dim_of(&registry, "poem stanza", sym::MARGIN_LEFT),
            (6.25, sym::UNIT_PERCENT)
        );
        assert!(!def.properties.is_empty());
    }

    #[test]
    fn test_media_filtered_rules_skipped() {
        let (registry, _) = translate("@media amzn-mobi { p { color: red; } }");
        assert!(registry.get("p").is_none());
    }
}
