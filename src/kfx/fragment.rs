//! KFX fragment representation.
//!
//! A fragment is the unit of KFX content: a typed, identified value in
//! the output graph. The fragment list enforces `(ftype, fid)` uniqueness;
//! a duplicate is a hard error, not a warning.

use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};

use super::symbols::{Symbol, symbol_name};
use super::value::Value;

/// Fragment identifier: a book-local name or a shared-table symbol
/// (singletons like book navigation use their own type symbol).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FragmentId {
    Name(String),
    Sym(Symbol),
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentId::Name(name) => f.write_str(name),
            FragmentId::Sym(id) => match symbol_name(*id) {
                Some(name) => f.write_str(name),
                None => write!(f, "${id}"),
            },
        }
    }
}

/// A typed fragment in the output graph.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub ftype: Symbol,
    pub fid: FragmentId,
    pub value: Value,
}

impl Fragment {
    pub fn new(ftype: Symbol, fid: impl Into<String>, value: Value) -> Self {
        Self {
            ftype,
            fid: FragmentId::Name(fid.into()),
            value,
        }
    }

    /// A singleton fragment identified by its own type symbol.
    pub fn singleton(ftype: Symbol, value: Value) -> Self {
        Self {
            ftype,
            fid: FragmentId::Sym(ftype),
            value,
        }
    }
}

/// Ordered fragment collection with `(ftype, fid)` uniqueness.
#[derive(Debug, Default)]
pub struct FragmentList {
    fragments: Vec<Fragment>,
    seen: HashSet<(Symbol, FragmentId)>,
}

impl FragmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment; a duplicate key aborts the conversion.
    pub fn push(&mut self, fragment: Fragment) -> Result<()> {
        let key = (fragment.ftype, fragment.fid.clone());
        if !self.seen.insert(key) {
            return Err(Error::DuplicateFragment {
                ftype: symbol_name(fragment.ftype)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("${}", fragment.ftype)),
                fid: fragment.fid.to_string(),
            });
        }
        self.fragments.push(fragment);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    /// Find a fragment by type and name.
    pub fn get(&self, ftype: Symbol, fid: &FragmentId) -> Option<&Fragment> {
        self.fragments
            .iter()
            .find(|f| f.ftype == ftype && &f.fid == fid)
    }
}

impl<'a> IntoIterator for &'a FragmentList {
    type Item = &'a Fragment;
    type IntoIter = std::slice::Iter<'a, Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.iter()
    }
}
