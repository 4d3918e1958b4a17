//! Resolved frame and symbol table types.

use std::fmt;
use std::ops::Index;
use std::path::{Path, PathBuf};

use super::symbols::{SourceLocation, SymbolName};
use super::Address;

/// One successfully resolved frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame
{
    /// Address that was looked up.
    pub address: Address,
    /// Function containing the address.
    pub symbol: SymbolName,
    /// Distance from the start of `symbol`, when the symbol start is known.
    pub offset: Option<u64>,
    /// File and line, only produced by precise symbolization.
    pub location: Option<SourceLocation>,
    /// Module (executable or shared object) that contains the address.
    pub module: Option<PathBuf>,
}

impl ResolvedFrame
{
    pub fn new(address: Address, symbol: SymbolName) -> Self
    {
        Self {
            address,
            symbol,
            offset: None,
            location: None,
            module: None,
        }
    }

    /// Preferred function name (demangled when possible).
    pub fn name(&self) -> &str
    {
        self.symbol.display_name()
    }

    pub fn module(&self) -> Option<&Path>
    {
        self.module.as_deref()
    }
}

/// `name at file:line` when a location is known, otherwise `name+0xoff`.
impl fmt::Display for ResolvedFrame
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match (&self.location, self.offset) {
            (Some(location), _) => write!(f, "{} at {location}", self.symbol),
            (None, Some(offset)) => write!(f, "{}+0x{offset:x}", self.symbol),
            (None, None) => write!(f, "{}", self.symbol),
        }
    }
}

/// One table slot: `None` is the "unresolved" marker for that frame.
pub type SymbolEntry = Option<ResolvedFrame>;

/// Symbolization result, index-aligned 1:1 with the frames it came from.
///
/// The table owns every string it holds. Dropping it releases all entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable
{
    entries: Vec<SymbolEntry>,
}

impl SymbolTable
{
    /// A table of `len` unresolved entries.
    pub fn unresolved(len: usize) -> Self
    {
        Self { entries: vec![None; len] }
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Entry for frame `index`; `None` when the index is out of range or the
    /// frame is unresolved.
    pub fn get(&self, index: usize) -> Option<&ResolvedFrame>
    {
        self.entries.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SymbolEntry>
    {
        self.entries.iter()
    }

    /// Number of frames that resolved to a symbol.
    pub fn resolved_count(&self) -> usize
    {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    /// Display string for frame `index`, the owned-string form of an entry.
    pub fn display(&self, index: usize) -> Option<String>
    {
        self.get(index).map(ToString::to_string)
    }

    pub(crate) fn set(&mut self, index: usize, frame: ResolvedFrame)
    {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = Some(frame);
        }
    }

    pub fn into_entries(self) -> Vec<SymbolEntry>
    {
        self.entries
    }
}

impl From<Vec<SymbolEntry>> for SymbolTable
{
    fn from(entries: Vec<SymbolEntry>) -> Self
    {
        Self { entries }
    }
}

impl Index<usize> for SymbolTable
{
    type Output = SymbolEntry;

    fn index(&self, index: usize) -> &Self::Output
    {
        &self.entries[index]
    }
}

impl<'a> IntoIterator for &'a SymbolTable
{
    type Item = &'a SymbolEntry;
    type IntoIter = std::slice::Iter<'a, SymbolEntry>;

    fn into_iter(self) -> Self::IntoIter
    {
        self.entries.iter()
    }
}
