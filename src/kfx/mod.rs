//! KFX output pipeline.
//!
//! Turns a parsed FB2 [`Book`](crate::fb2::Book) and its
//! [`Stylesheet`](crate::css::Stylesheet) into a graph of typed
//! fragments: storylines, sections, content fragments, anchors and book
//! navigation, plus the style definitions the graph references. Binary
//! Ion encoding and container packaging consume this graph downstream.

pub mod builder;
pub mod content;
pub mod fragment;
pub mod inline;
pub mod navigation;
pub mod storyline;
pub mod style;
pub mod symbols;
pub mod translator;
pub mod units;
pub mod value;
pub mod warnings;

pub use builder::{Conversion, ConvertOptions, ImageResource, ImageResources, convert};
pub use fragment::{Fragment, FragmentId, FragmentList};
pub use style::{StyleDef, StyleRegistry};
pub use symbols::{Symbol, symbol_id, symbol_name};
pub use value::{PropertyMap, Value};
