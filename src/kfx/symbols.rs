//! YJ shared symbol table.
//!
//! KFX structs are keyed by integers from a well-known shared symbol table.
//! This module holds the immutable subset of that table used by the
//! converter, both for field keys (`margin_top`, `style_events`) and for
//! enum-like values (`center`, `bold`, `em`, `avoid`).

use std::collections::HashMap;
use std::sync::OnceLock;

/// A symbol id from the shared table.
pub type Symbol = u64;

/// Upper bound of the shared table; ids above this are local to a book.
pub const MAX_KNOWN_SYMBOL: Symbol = 851;

/// Well-known symbol ids.
///
/// Grouped the way they are used: style property keys, structural keys,
/// fragment types, and enum-like values.
pub mod sym {
    use super::Symbol;

    // Style property keys
    pub const LANGUAGE: Symbol = 10;
    pub const FONT_FAMILY: Symbol = 11;
    pub const FONT_STYLE: Symbol = 12;
    pub const FONT_WEIGHT: Symbol = 13;
    pub const FONT_SIZE: Symbol = 16;
    pub const COLOR: Symbol = 19;
    pub const BACKGROUND_COLOR: Symbol = 21;
    pub const UNDERLINE: Symbol = 23;
    pub const STRIKETHROUGH: Symbol = 27;
    pub const LETTER_SPACING: Symbol = 32;
    pub const WORD_SPACING: Symbol = 33;
    pub const TEXT_ALIGN: Symbol = 34;
    pub const TEXT_INDENT: Symbol = 36;
    pub const TEXT_TRANSFORM: Symbol = 41;
    pub const LINE_HEIGHT: Symbol = 42;
    pub const BASELINE_SHIFT: Symbol = 43;
    pub const BASELINE_STYLE: Symbol = 44;
    pub const WHITE_SPACE: Symbol = 45;
    pub const MARGIN_TOP: Symbol = 47;
    pub const MARGIN_LEFT: Symbol = 48;
    pub const MARGIN_BOTTOM: Symbol = 49;
    pub const MARGIN_RIGHT: Symbol = 50;
    pub const PADDING_TOP: Symbol = 52;
    pub const PADDING_RIGHT: Symbol = 53;
    pub const PADDING_BOTTOM: Symbol = 54;
    pub const PADDING_LEFT: Symbol = 55;
    pub const WIDTH: Symbol = 56;
    pub const HEIGHT: Symbol = 57;
    pub const BORDER_STYLE: Symbol = 88;
    pub const BORDER_WIDTH: Symbol = 93;
    pub const BORDER_COLOR: Symbol = 94;
    pub const LIST_TYPE: Symbol = 100;
    pub const HYPHENS: Symbol = 127;
    pub const BREAK_INSIDE: Symbol = 135;
    pub const BORDER_COLLAPSE: Symbol = 473;
    pub const BORDER_SPACING_HORIZONTAL: Symbol = 474;
    pub const BORDER_SPACING_VERTICAL: Symbol = 475;
    pub const OVERLINE: Symbol = 554;
    pub const WRITING_MODE: Symbol = 556;
    pub const TEXT_ORIENTATION: Symbol = 557;
    pub const TEXT_COMBINE: Symbol = 558;
    pub const BOX_ALIGN: Symbol = 580;
    pub const FLOAT: Symbol = 581;
    pub const FONT_VARIANT: Symbol = 583;
    pub const CLEAR: Symbol = 628;
    pub const TEXT_EMPHASIS_STYLE: Symbol = 717;
    pub const TEXT_EMPHASIS_COLOR: Symbol = 718;
    pub const DROPCAP_CHARS: Symbol = 766;
    pub const DROPCAP_LINES: Symbol = 767;
    pub const YJ_BREAK_AFTER: Symbol = 788;
    pub const YJ_BREAK_BEFORE: Symbol = 789;

    // Structural keys
    pub const PAGE_TEMPLATES: Symbol = 141;
    pub const STYLE_EVENTS: Symbol = 142;
    pub const OFFSET: Symbol = 143;
    pub const LENGTH: Symbol = 144;
    pub const CONTENT: Symbol = 145;
    pub const CONTENT_LIST: Symbol = 146;
    pub const ID: Symbol = 155;
    pub const LAYOUT: Symbol = 156;
    pub const TYPE: Symbol = 159;
    pub const LOCATION: Symbol = 165;
    pub const STYLE: Symbol = 173;
    pub const SECTION_NAME: Symbol = 174;
    pub const RESOURCE_NAME: Symbol = 175;
    pub const STORY_NAME: Symbol = 176;
    pub const READING_ORDER_NAME: Symbol = 178;
    pub const LINK_TO: Symbol = 179;
    pub const POSITION: Symbol = 183;
    pub const NAV_TYPE: Symbol = 235;
    pub const LANDMARKS: Symbol = 236;
    pub const PAGE_LIST: Symbol = 237;
    pub const LANDMARK_TYPE: Symbol = 238;
    pub const NAV_ID: Symbol = 239;
    pub const LABEL: Symbol = 241;
    pub const NAV_TEXT: Symbol = 244;
    pub const TARGET: Symbol = 246;
    pub const ENTRIES: Symbol = 247;
    pub const FIXED_WIDTH: Symbol = 66;
    pub const FIXED_HEIGHT: Symbol = 67;
    pub const INDEX: Symbol = 403;
    pub const COLSPAN: Symbol = 455;
    pub const ROWSPAN: Symbol = 456;
    pub const ALT_TEXT: Symbol = 584;
    pub const ANCHOR_NAME: Symbol = 601;
    pub const LINK_KIND: Symbol = 616;
    pub const FEATURES: Symbol = 622;
    pub const SELECTION_MODE: Symbol = 625;
    pub const RENDER: Symbol = 644;
    pub const HEADING_LEVEL: Symbol = 790;
    pub const NAV_CONTAINERS: Symbol = 392;
    pub const NAV_CONTAINER: Symbol = 391;
    pub const NAV_DEFINITION: Symbol = 393;

    // Fragment and content entry types
    pub const STORYLINE: Symbol = 259;
    pub const SECTION: Symbol = 260;
    pub const ANCHOR: Symbol = 266;
    pub const TEXT: Symbol = 269;
    pub const CONTAINER: Symbol = 270;
    pub const IMAGE: Symbol = 271;
    pub const LIST: Symbol = 276;
    pub const LIST_ITEM: Symbol = 277;
    pub const TABLE: Symbol = 278;
    pub const TABLE_ROW: Symbol = 279;
    pub const TABLE_BODY: Symbol = 454;
    pub const BOOK_NAVIGATION: Symbol = 389;
    pub const TOC: Symbol = 212;

    // Dimension struct keys and units
    pub const UNIT: Symbol = 306;
    pub const VALUE: Symbol = 307;
    pub const UNIT_EM: Symbol = 308;
    pub const UNIT_EX: Symbol = 309;
    pub const UNIT_LH: Symbol = 310;
    pub const UNIT_REM: Symbol = 311;
    pub const UNIT_PERCENT: Symbol = 314;
    pub const UNIT_CM: Symbol = 315;
    pub const UNIT_MM: Symbol = 316;
    pub const UNIT_IN: Symbol = 317;
    pub const UNIT_PX: Symbol = 318;
    pub const UNIT_PT: Symbol = 319;

    // Enum-like values
    pub const TOP: Symbol = 58;
    pub const LEFT: Symbol = 59;
    pub const BOTTOM: Symbol = 60;
    pub const RIGHT: Symbol = 61;
    pub const COVER: Symbol = 233;
    pub const CENTER: Symbol = 320;
    pub const JUSTIFY: Symbol = 321;
    pub const FULL_PAGE: Symbol = 326;
    pub const SOLID: Symbol = 328;
    pub const DECIMAL: Symbol = 343;
    pub const DISC: Symbol = 344;
    pub const NONE: Symbol = 349;
    pub const NORMAL: Symbol = 350;
    pub const DEFAULT_READING_ORDER: Symbol = 351;
    pub const AVOID: Symbol = 353;
    pub const WEIGHT_100: Symbol = 355;
    pub const WEIGHT_200: Symbol = 356;
    pub const WEIGHT_300: Symbol = 357;
    pub const WEIGHT_500: Symbol = 359;
    pub const WEIGHT_600: Symbol = 360;
    pub const BOLD: Symbol = 361;
    pub const WEIGHT_800: Symbol = 362;
    pub const WEIGHT_900: Symbol = 363;
    pub const SMALL_CAPS: Symbol = 369;
    pub const SUPER: Symbol = 370;
    pub const SUB: Symbol = 371;
    pub const UPPERCASE: Symbol = 372;
    pub const LOWERCASE: Symbol = 373;
    pub const CAPITALIZE: Symbol = 374;
    pub const OBLIQUE: Symbol = 381;
    pub const ITALIC: Symbol = 382;
    pub const AUTO: Symbol = 383;
    pub const MANUAL: Symbol = 384;
    pub const HORIZONTAL_TB: Symbol = 385;
    pub const VERTICAL_RL: Symbol = 386;
    pub const VERTICAL_LR: Symbol = 387;
    pub const VERTICAL: Symbol = 390;
    pub const SRL: Symbol = 396;
    pub const BOTH: Symbol = 421;
    pub const TEXT_TOP: Symbol = 447;
    pub const TEXT_BOTTOM: Symbol = 449;
    pub const FOOTNOTE: Symbol = 617;
    pub const PAN_ZOOM: Symbol = 623;
    pub const SCALE_FIT: Symbol = 624;
    pub const REGIONAL: Symbol = 626;
    pub const INLINE: Symbol = 645;
    pub const ALL: Symbol = 759;
    pub const FILLED_CIRCLE: Symbol = 760;
    pub const OPEN_CIRCLE: Symbol = 761;
    pub const FILLED_DOT: Symbol = 762;
    pub const OPEN_DOT: Symbol = 763;
    pub const FILLED_SESAME: Symbol = 764;
    pub const OPEN_SESAME: Symbol = 765;
    pub const MIXED: Symbol = 768;
    pub const UPRIGHT: Symbol = 769;
    pub const SIDEWAYS: Symbol = 770;
}

/// The table, sorted by id. Single source of truth for name lookups.
static TABLE: &[(Symbol, &str)] = &[
    (10, "language"),
    (11, "font_family"),
    (12, "font_style"),
    (13, "font_weight"),
    (16, "font_size"),
    (19, "color"),
    (21, "background_color"),
    (23, "underline"),
    (27, "strikethrough"),
    (32, "letter_spacing"),
    (33, "word_spacing"),
    (34, "text_align"),
    (36, "text_indent"),
    (41, "text_transform"),
    (42, "line_height"),
    (43, "baseline_shift"),
    (44, "baseline_style"),
    (45, "white_space"),
    (47, "margin_top"),
    (48, "margin_left"),
    (49, "margin_bottom"),
    (50, "margin_right"),
    (52, "padding_top"),
    (53, "padding_right"),
    (54, "padding_bottom"),
    (55, "padding_left"),
    (56, "width"),
    (57, "height"),
    (58, "top"),
    (59, "left"),
    (60, "bottom"),
    (61, "right"),
    (66, "fixed_width"),
    (67, "fixed_height"),
    (88, "border_style"),
    (93, "border_width"),
    (94, "border_color"),
    (100, "list_type"),
    (127, "hyphens"),
    (135, "break_inside"),
    (141, "page_templates"),
    (142, "style_events"),
    (143, "offset"),
    (144, "length"),
    (145, "content"),
    (146, "content_list"),
    (155, "id"),
    (156, "layout"),
    (159, "type"),
    (165, "location"),
    (173, "style"),
    (174, "section_name"),
    (175, "resource_name"),
    (176, "story_name"),
    (178, "reading_order_name"),
    (179, "link_to"),
    (183, "position"),
    (212, "toc"),
    (233, "cover"),
    (235, "nav_type"),
    (236, "landmarks"),
    (237, "page_list"),
    (238, "landmark_type"),
    (239, "nav_id"),
    (241, "label"),
    (244, "nav_text"),
    (246, "target"),
    (247, "entries"),
    (259, "storyline"),
    (260, "section"),
    (266, "anchor"),
    (269, "text"),
    (270, "container"),
    (271, "image"),
    (276, "list"),
    (277, "list_item"),
    (278, "table"),
    (279, "table_row"),
    (306, "unit"),
    (307, "value"),
    (308, "em"),
    (309, "ex"),
    (310, "lh"),
    (311, "rem"),
    (314, "percent"),
    (315, "cm"),
    (316, "mm"),
    (317, "in"),
    (318, "px"),
    (319, "pt"),
    (320, "center"),
    (321, "justify"),
    (326, "full_page"),
    (328, "solid"),
    (343, "decimal"),
    (344, "disc"),
    (349, "none"),
    (350, "normal"),
    (351, "default_reading_order"),
    (353, "avoid"),
    (355, "weight_100"),
    (356, "weight_200"),
    (357, "weight_300"),
    (359, "weight_500"),
    (360, "weight_600"),
    (361, "bold"),
    (362, "weight_800"),
    (363, "weight_900"),
    (369, "small_caps"),
    (370, "super"),
    (371, "sub"),
    (372, "uppercase"),
    (373, "lowercase"),
    (374, "capitalize"),
    (381, "oblique"),
    (382, "italic"),
    (383, "auto"),
    (384, "manual"),
    (385, "horizontal_tb"),
    (386, "vertical_rl"),
    (387, "vertical_lr"),
    (389, "book_navigation"),
    (390, "vertical"),
    (391, "nav_container"),
    (392, "nav_containers"),
    (393, "nav_definition"),
    (396, "srl"),
    (403, "index"),
    (421, "both"),
    (447, "text_top"),
    (449, "text_bottom"),
    (454, "table_body"),
    (455, "colspan"),
    (456, "rowspan"),
    (473, "border_collapse"),
    (474, "border_spacing_horizontal"),
    (475, "border_spacing_vertical"),
    (554, "overline"),
    (556, "writing_mode"),
    (557, "text_orientation"),
    (558, "text_combine"),
    (580, "box_align"),
    (581, "float"),
    (583, "font_variant"),
    (584, "alt_text"),
    (601, "anchor_name"),
    (616, "link_kind"),
    (617, "footnote"),
    (622, "features"),
    (623, "pan_zoom"),
    (624, "scale_fit"),
    (625, "selection_mode"),
    (626, "regional"),
    (628, "clear"),
    (644, "render"),
    (645, "inline"),
    (717, "text_emphasis_style"),
    (718, "text_emphasis_color"),
    (759, "all"),
    (760, "filled_circle"),
    (761, "open_circle"),
    (762, "filled_dot"),
    (763, "open_dot"),
    (764, "filled_sesame"),
    (765, "open_sesame"),
    (766, "dropcap_chars"),
    (767, "dropcap_lines"),
    (768, "mixed"),
    (769, "upright"),
    (770, "sideways"),
    (788, "yj_break_after"),
    (789, "yj_break_before"),
    (790, "heading_level"),
];

/// Look up the name for a shared symbol id.
pub fn symbol_name(id: Symbol) -> Option<&'static str> {
    TABLE
        .binary_search_by_key(&id, |&(sym, _)| sym)
        .ok()
        .map(|idx| TABLE[idx].1)
}

/// Look up the id for a symbol name. Unknown names are absent.
pub fn symbol_id(name: &str) -> Option<Symbol> {
    static REVERSE: OnceLock<HashMap<&'static str, Symbol>> = OnceLock::new();
    let map = REVERSE.get_or_init(|| TABLE.iter().map(|&(id, name)| (name, id)).collect());
    map.get(name).copied()
}
