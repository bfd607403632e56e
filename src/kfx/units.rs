//! KP3 unit conventions.
//!
//! The target viewer stores vertical spacing in line-height units,
//! horizontal spacing as percentages, and font sizes in rem with a
//! non-linear compression above 100%. All conversions bottom out in
//! [`round3`]; un-rounded values must not escape this module's callers.

use super::symbols::{Symbol, sym};

/// Decimal places kept on every dimension value.
pub const DECIMAL_PRECISION: u32 = 3;

/// em ↔ lh conversion ratio.
pub const LINE_HEIGHT_RATIO: f64 = 1.2;

/// em → % for horizontal spacing (margins, padding).
pub const EM_TO_PERCENT_HORIZONTAL: f64 = 3.125;

/// em → % for text-indent.
pub const EM_TO_PERCENT_TEXT_INDENT: f64 = 3.125;

/// Compression divisor for font-size percentages above 100.
pub const FONT_SIZE_COMPRESSION_FACTOR: f64 = 160.0;

/// ex → em normalization factor.
pub const EX_TO_EM_FACTOR: f64 = 0.44;

/// CSS reference pixels per em.
pub const PX_PER_EM: f64 = 16.0;

/// CSS points per em.
pub const PT_PER_EM: f64 = 12.0;

/// Round half-up to 3 decimal places.
pub fn round3(value: f64) -> f64 {
    let scale = 10f64.powi(DECIMAL_PRECISION as i32);
    (value * scale).round() / scale
}

/// Font-size percentage → rem, compressed above 100%.
///
/// `140%` maps to `1.25rem` rather than `1.4rem`; large print sizes are
/// squeezed toward the root size so they survive small screens.
pub fn percent_to_rem(percent: f64) -> f64 {
    if percent > 100.0 {
        round3(1.0 + (percent - 100.0) / FONT_SIZE_COMPRESSION_FACTOR)
    } else {
        round3(percent / 100.0)
    }
}

/// em → line-height units (vertical spacing, line-height itself).
pub fn em_to_lh(em: f64) -> f64 {
    round3(em / LINE_HEIGHT_RATIO)
}

/// em → percent for horizontal spacing.
pub fn em_to_percent_horizontal(em: f64) -> f64 {
    round3(em * EM_TO_PERCENT_HORIZONTAL)
}

/// em → percent for text-indent.
pub fn em_to_percent_indent(em: f64) -> f64 {
    round3(em * EM_TO_PERCENT_TEXT_INDENT)
}

/// ex → em.
pub fn ex_to_em(ex: f64) -> f64 {
    round3(ex * EX_TO_EM_FACTOR)
}

/// Absolute units → em, the intermediate step for lh/% chains.
pub fn absolute_to_em(value: f64, unit: &str) -> Option<f64> {
    let em = match unit {
        "px" => value / PX_PER_EM,
        "pt" => value / PT_PER_EM,
        "in" => value * 72.0 / PT_PER_EM,
        "cm" => value * 72.0 / 2.54 / PT_PER_EM,
        "mm" => value * 72.0 / 25.4 / PT_PER_EM,
        _ => return None,
    };
    Some(em)
}

/// Map a CSS unit string to its KFX unit symbol.
pub fn unit_symbol(unit: &str) -> Option<Symbol> {
    match unit {
        "em" => Some(sym::UNIT_EM),
        "ex" => Some(sym::UNIT_EX),
        "lh" => Some(sym::UNIT_LH),
        "rem" => Some(sym::UNIT_REM),
        "%" => Some(sym::UNIT_PERCENT),
        "px" => Some(sym::UNIT_PX),
        "pt" => Some(sym::UNIT_PT),
        "cm" => Some(sym::UNIT_CM),
        "mm" => Some(sym::UNIT_MM),
        "in" => Some(sym::UNIT_IN),
        _ => None,
    }
}
