//! # fb2kfx
//!
//! A library for converting FB2 (FictionBook) ebooks into Amazon's KFX
//! publication format.
//!
//! The pipeline has three stages:
//!
//! - Parse the FB2 XML into a [`Book`] tree and the book's CSS into a
//!   [`Stylesheet`].
//! - Translate CSS rules into KFX styles and walk the book into a graph
//!   of typed fragments (storylines, sections, content, anchors,
//!   navigation).
//! - Hand the fragment graph and styles to a KFX container writer
//!   (not part of this crate).
//!
//! ## Quick start
//!
//! ```no_run
//! use fb2kfx::{convert, parse_fb2, parse_stylesheet, ConvertOptions};
//!
//! let bytes = std::fs::read("book.fb2")?;
//! let book = parse_fb2(&bytes)?;
//! let sheet = parse_stylesheet("p { text-indent: 1.5em; text-align: justify; }");
//! let resources = std::collections::HashMap::new();
//!
//! let conversion = convert(&book, &sheet, &resources, &ConvertOptions::default())?;
//! for warning in &conversion.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! println!("{} fragments", conversion.fragments.len());
//! # Ok::<(), fb2kfx::Error>(())
//! ```

pub mod css;
pub mod error;
pub mod fb2;
pub mod kfx;

pub use css::{Stylesheet, default_stylesheet, parse_stylesheet};
pub use error::{Error, Result};
pub use fb2::{Book, parse_fb2, parse_fb2_str};
pub use kfx::{Conversion, ConvertOptions, ImageResource, ImageResources, convert};
