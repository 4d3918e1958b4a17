//! Module image parsing.
//!
//! The line-mapping tool wants addresses as they appear in the file, not as
//! they appear in memory. The loader maps the lowest loadable segment at
//! `dli_fbase`, page aligned, so a runtime address converts with
//!
//! ```text
//! file_address = runtime - dli_fbase + page_floor(min segment vaddr)
//! ```
//!
//! which is `runtime - slide` for position-independent and fixed images
//! alike.

use std::fs;
use std::path::{Path, PathBuf};

use object::{Object, ObjectSegment};

use crate::error::{Result, StackscopeError};
use crate::types::Address;

/// Mapping granularity assumed for the first segment.
const PAGE_MASK: u64 = 0xfff;

/// Link-time layout of one executable or shared object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModuleImage
{
    path: PathBuf,
    /// Page-aligned virtual address of the lowest loadable segment.
    link_base: u64,
    /// Span of the loadable segments, from `link_base`.
    span: u64,
}

impl ModuleImage
{
    pub(crate) fn parse(path: &Path) -> Result<Self>
    {
        let data = fs::read(path)?;
        Self::parse_bytes(path, &data)
    }

    pub(crate) fn parse_bytes(path: &Path, data: &[u8]) -> Result<Self>
    {
        let file = object::File::parse(data).map_err(|err| StackscopeError::ImageParse {
            path: path.to_path_buf(),
            details: err.to_string(),
        })?;

        let mut low = u64::MAX;
        let mut high = 0u64;
        for segment in file.segments() {
            if segment.size() == 0 {
                continue;
            }
            let start = segment.address();
            low = low.min(start);
            high = high.max(start.saturating_add(segment.size()));
        }

        if low == u64::MAX {
            return Err(StackscopeError::ImageParse {
                path: path.to_path_buf(),
                details: "no loadable segments".to_string(),
            });
        }

        let link_base = low & !PAGE_MASK;
        Ok(Self {
            path: path.to_path_buf(),
            link_base,
            span: high - link_base,
        })
    }

    pub(crate) fn path(&self) -> &Path
    {
        &self.path
    }

    /// Convert a runtime address inside this module, loaded at `load_base`,
    /// to a file virtual address. `None` when the address lies outside the
    /// module's segments.
    pub(crate) fn file_address(&self, address: Address, load_base: Address) -> Option<u64>
    {
        let offset = address.offset_from(load_base)?;
        if offset >= self.span {
            return None;
        }
        self.link_base.checked_add(offset)
    }
}
