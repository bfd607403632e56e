//! Error types for fb2kfx operations.

use thiserror::Error;

/// Errors that can abort a conversion.
///
/// Recoverable conditions (unsupported CSS values, dropped declarations)
/// never surface here; they are collected into the warnings list returned
/// alongside the fragment graph.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid FB2: {0}")]
    InvalidFb2(String),

    #[error("Missing image resource: {0}")]
    MissingResource(String),

    #[error("Duplicate fragment {ftype}/{fid}")]
    DuplicateFragment { ftype: String, fid: String },

    #[error("Element id counter overflow")]
    EidOverflow,

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
