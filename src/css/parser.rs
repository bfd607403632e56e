//! CSS stylesheet loader.
//!
//! Token-level parsing on top of `cssparser`. Unparseable constructs are
//! skipped with a debug log; stylesheet loading never hard-fails.

use cssparser::{ParseError, Parser, ParserInput, Token};
use tracing::debug;

use super::{
    CssValue, Declaration, FontFace, MediaBlock, MediaQuery, Pseudo, Rule, Selector, Stylesheet,
    StylesheetItem,
};

/// Parse a stylesheet from source text.
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut sheet = Stylesheet::default();
    parse_items(&mut parser, &mut sheet);
    sheet
}

fn parse_items(parser: &mut Parser, sheet: &mut Stylesheet) {
    loop {
        parser.skip_whitespace();
        let start = parser.position();
        let tok = match parser.next() {
            Ok(t) => t.clone(),
            Err(_) => break,
        };

        match tok {
            Token::AtKeyword(name) => {
                let name = name.to_string().to_lowercase();
                parse_at_rule(&name, parser, sheet);
            }
            Token::CDC | Token::CDO => {}
            Token::CurlyBracketBlock => {
                // Block with an empty prelude; skip its contents.
                let _ = skip_block(parser);
            }
            _ => {
                if let Some((selectors, declarations)) = parse_qualified_rule(parser, start) {
                    for selector in selectors {
                        sheet.items.push(StylesheetItem::Rule(Rule {
                            selector,
                            declarations: declarations.clone(),
                        }));
                    }
                }
            }
        }
    }
}

/// Parse the remainder of a qualified rule whose prelude started at
/// `start` (the first prelude token is already consumed).
fn parse_qualified_rule(
    parser: &mut Parser,
    start: cssparser::SourcePosition,
) -> Option<(Vec<Selector>, Vec<Declaration>)> {
    loop {
        let tok = match parser.next() {
            Ok(t) => t.clone(),
            Err(_) => return None,
        };
        if tok == Token::CurlyBracketBlock {
            break;
        }
    }

    let prelude = parser
        .slice_from(start)
        .trim_end_matches('{')
        .trim()
        .to_string();

    let declarations = parse_declaration_block(parser);
    let selectors: Vec<Selector> = prelude.split(',').filter_map(parse_selector).collect();
    if selectors.is_empty() {
        debug!(%prelude, "dropping rule with unparseable selector");
        return None;
    }
    Some((selectors, declarations))
}

fn parse_at_rule(name: &str, parser: &mut Parser, sheet: &mut Stylesheet) {
    match name {
        "media" => {
            let start = parser.position();
            loop {
                let tok = match parser.next() {
                    Ok(t) => t.clone(),
                    Err(_) => return,
                };
                if tok == Token::CurlyBracketBlock {
                    break;
                }
            }
            let query = parser
                .slice_from(start)
                .trim_end_matches('{')
                .trim()
                .to_string();

            let mut inner = Stylesheet::default();
            let result: Result<(), ParseError<'_, ()>> = parser.parse_nested_block(|p| {
                parse_items(p, &mut inner);
                Ok(())
            });
            if result.is_err() {
                return;
            }

            let rules = inner
                .items
                .into_iter()
                .filter_map(|item| match item {
                    StylesheetItem::Rule(rule) => Some(rule),
                    // Nested media blocks are not meaningful for the
                    // Amazon targets; their rules are dropped.
                    StylesheetItem::Media(_) => None,
                })
                .collect();
            sheet.items.push(StylesheetItem::Media(MediaBlock {
                query: MediaQuery::new(query),
                rules,
            }));
        }
        "font-face" => {
            loop {
                let tok = match parser.next() {
                    Ok(t) => t.clone(),
                    Err(_) => return,
                };
                if tok == Token::CurlyBracketBlock {
                    break;
                }
            }
            let declarations = parse_declaration_block(parser);
            if let Some(face) = font_face_from_declarations(&declarations) {
                sheet.font_faces.push(face);
            }
        }
        _ => {
            debug!(name, "skipping at-rule");
            // Consume the prelude and, if present, the block.
            loop {
                let tok = match parser.next() {
                    Ok(t) => t.clone(),
                    Err(_) => return,
                };
                match tok {
                    Token::Semicolon => return,
                    Token::CurlyBracketBlock => {
                        let _ = skip_block(parser);
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

fn skip_block<'i>(parser: &mut Parser<'i, '_>) -> Result<(), ParseError<'i, ()>> {
    parser.parse_nested_block(|p| {
        while p.next().is_ok() {}
        Ok(())
    })
}

/// Parse `name: value; …` inside a just-opened curly block.
fn parse_declaration_block(parser: &mut Parser) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let result: Result<(), ParseError<'_, ()>> = parser.parse_nested_block(|p| {
        loop {
            p.skip_whitespace();
            let tok = match p.next() {
                Ok(t) => t.clone(),
                Err(_) => break,
            };
            let name = match tok {
                Token::Ident(name) => name.to_string().to_lowercase(),
                Token::Semicolon => continue,
                _ => {
                    skip_to_semicolon(p);
                    continue;
                }
            };

            p.skip_whitespace();
            match p.next() {
                Ok(Token::Colon) => {}
                _ => {
                    skip_to_semicolon(p);
                    continue;
                }
            }

            p.skip_whitespace();
            let value = parse_value(p);
            if value.raw.is_empty() {
                debug!(%name, "dropping declaration with empty value");
                continue;
            }
            declarations.push(Declaration { name, value });
        }
        Ok(())
    });
    let _ = result;
    declarations
}

fn skip_to_semicolon(parser: &mut Parser) {
    loop {
        match parser.next() {
            Ok(Token::Semicolon) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

/// Consume value tokens up to the next semicolon (or end of block) and
/// capture the first numeric token, the first keyword, and the raw text.
fn parse_value(parser: &mut Parser) -> CssValue {
    let start = parser.position();
    let mut out = CssValue::default();
    let mut saw_number = false;

    loop {
        let tok = match parser.next() {
            Ok(t) => t.clone(),
            Err(_) => break,
        };
        match tok {
            Token::Semicolon => break,
            Token::Number { value, .. } if !saw_number => {
                out.value = value as f64;
                saw_number = true;
            }
            Token::Percentage { unit_value, .. } if !saw_number => {
                out.value = unit_value as f64 * 100.0;
                out.unit = "%".to_string();
                saw_number = true;
            }
            Token::Dimension { value, unit, .. } if !saw_number => {
                out.value = value as f64;
                out.unit = unit.to_string().to_lowercase();
                saw_number = true;
            }
            Token::Ident(word) if !saw_number && out.keyword.is_empty() => {
                out.keyword = word.to_string().to_lowercase();
            }
            _ => {}
        }
    }

    out.raw = parser
        .slice_from(start)
        .trim_end_matches(';')
        .trim()
        .to_string();
    out
}

/// Parse one compound selector, optionally with a descendant chain.
///
/// Combinators beyond descendant/child are not used by FB2 stylesheets;
/// `>` is treated as descendant.
fn parse_selector(raw: &str) -> Option<Selector> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut chain: Option<Box<Selector>> = None;
    let mut current: Option<Selector> = None;
    for part in raw.split_whitespace().filter(|p| *p != ">") {
        if let Some(prev) = current.take() {
            chain = Some(Box::new(Selector {
                ancestor: chain,
                ..prev
            }));
        }
        current = Some(parse_simple_selector(part)?);
    }

    let mut selector = current?;
    selector.ancestor = chain;
    selector.raw = raw.to_string();
    Some(selector)
}

fn parse_simple_selector(part: &str) -> Option<Selector> {
    let mut rest = part;

    // Attribute selectors are not supported; keep the simple part.
    if let Some(idx) = rest.find('[') {
        rest = &rest[..idx];
    }

    let mut pseudo = Pseudo::None;
    for (marker, kind) in [
        ("::before", Pseudo::Before),
        ("::after", Pseudo::After),
        (":before", Pseudo::Before),
        (":after", Pseudo::After),
    ] {
        if let Some(stripped) = rest.strip_suffix(marker) {
            rest = stripped;
            pseudo = kind;
            break;
        }
    }

    // Other pseudo-classes make the selector inapplicable here.
    if rest.contains(':') {
        return None;
    }

    let (element, class) = match rest.split_once('.') {
        Some((elem, classes)) => {
            let class = classes.split('.').next().unwrap_or("").to_string();
            (elem.to_string(), class)
        }
        None => (rest.to_string(), String::new()),
    };

    if element.is_empty() && class.is_empty() {
        return None;
    }

    Some(Selector {
        element,
        class,
        ancestor: None,
        pseudo,
        raw: part.to_string(),
    })
}

fn font_face_from_declarations(declarations: &[Declaration]) -> Option<FontFace> {
    let mut face = FontFace::default();
    for decl in declarations {
        match decl.name.as_str() {
            "font-family" => face.family = unquote(&decl.value.raw).to_string(),
            "src" => face.src = decl.value.raw.clone(),
            "font-weight" => face.weight = Some(decl.value.raw.clone()),
            "font-style" => face.style = Some(decl.value.raw.clone()),
            _ => {}
        }
    }
    if face.family.is_empty() {
        None
    } else {
        Some(face)
    }
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'')
}
