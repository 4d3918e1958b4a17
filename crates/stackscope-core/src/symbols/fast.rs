//! # Fast Symbolizer
//!
//! Resolves addresses with metadata already mapped into this process:
//!
//! - **Unix**: `dladdr`, i.e. the dynamic symbol table of the module that
//!   contains the address. Only exported symbols are visible; a stripped or
//!   hidden function yields an unresolved entry. glibc only reports a symbol
//!   whose extent covers the address, Apple's loader reports the nearest
//!   preceding export.
//! - **Windows**: dbghelp through [`backtrace::resolve`], which also reads PDB
//!   data when available.
//! - **Other targets**: no lookup facility; the capability is absent.
//!
//! No source locations are produced at this tier.
//!
//! [`with_symbol`] is the allocation-free primitive used by the crash
//! reporter. [`symbolize_fast`] builds an owned [`SymbolTable`] on top of it
//! for ordinary code.

use std::fmt;
use std::path::PathBuf;

use rustc_demangle::try_demangle;

use super::demangle::make_symbol_name;
use super::Symbolizer;
use crate::types::{Address, ResolvedFrame, SymbolTable};

/// Whether this build has an in-process lookup facility.
pub const SUPPORTED: bool = cfg!(any(unix, windows));

/// One lookup result, borrowed from loader or dbghelp memory.
///
/// Only valid inside the [`with_symbol`] callback.
#[derive(Debug, Clone, Copy)]
pub struct RawSymbol<'a>
{
    address: Address,
    name: &'a [u8],
    start: Option<Address>,
    module: Option<&'a [u8]>,
}

impl<'a> RawSymbol<'a>
{
    /// Address that was looked up.
    pub fn address(&self) -> Address
    {
        self.address
    }

    /// Linkage name bytes as reported by the loader.
    pub fn name_bytes(&self) -> &'a [u8]
    {
        self.name
    }

    /// Start address of the symbol, when known.
    pub fn start(&self) -> Option<Address>
    {
        self.start
    }

    /// Distance from the symbol start to the looked up address.
    pub fn offset(&self) -> Option<u64>
    {
        self.start.and_then(|start| self.address.offset_from(start))
    }

    /// Module path bytes as reported by the loader.
    pub fn module_bytes(&self) -> Option<&'a [u8]>
    {
        self.module
    }

    /// Copy into an owned frame.
    pub fn to_resolved_frame(&self) -> ResolvedFrame
    {
        let raw = String::from_utf8_lossy(self.name).into_owned();
        let mut frame = ResolvedFrame::new(self.address, make_symbol_name(raw));
        frame.offset = self.offset();
        frame.module = self.module.map(module_path);
        frame
    }
}

/// Demangled name followed by `+0x<offset>` when the offset is non-zero.
///
/// Writes straight into the formatter without allocating.
impl fmt::Display for RawSymbol<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match std::str::from_utf8(self.name) {
            Ok(name) => match try_demangle(name) {
                Ok(demangled) => write!(f, "{demangled:#}")?,
                Err(_) => f.write_str(name)?,
            },
            Err(_) => f.write_str("??")?,
        }

        match self.offset() {
            Some(offset) if offset != 0 => write!(f, "+0x{offset:x}"),
            _ => Ok(()),
        }
    }
}

/// Look up one address and hand the result to `f`.
///
/// `f` receives `None` when the address is not inside a known module or the
/// module has no symbol covering it. On Unix this neither allocates nor
/// takes locks of ours and may be called from a signal handler.
pub fn with_symbol<R>(address: Address, mut f: impl FnMut(Option<RawSymbol<'_>>) -> R) -> R
{
    #[cfg(unix)]
    {
        let symbol = super::loader::lookup(address).and_then(|record| {
            Some(RawSymbol {
                address,
                name: record.symbol?,
                start: record.symbol_start,
                module: record.module,
            })
        });
        f(symbol)
    }

    #[cfg(windows)]
    {
        let mut result = None;
        backtrace::resolve(address.as_ptr(), |symbol| {
            if result.is_some() {
                return;
            }
            let Some(name) = symbol.name() else {
                return;
            };
            let raw = RawSymbol {
                address,
                name: name.as_bytes(),
                start: symbol.addr().map(|start| Address::from_ptr(start.cast_const())),
                module: None,
            };
            result = Some(f(Some(raw)));
        });
        result.unwrap_or_else(|| f(None))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = address;
        f(None)
    }
}

/// Resolve one address into an owned frame.
pub fn resolve(address: Address) -> Option<ResolvedFrame>
{
    with_symbol(address, |symbol| symbol.map(|symbol| symbol.to_resolved_frame()))
}

/// Resolve every frame with in-process metadata.
///
/// Returns a table index-aligned with `frames`, or `None` when this build has
/// no lookup facility. An empty input yields an empty table.
pub fn symbolize_fast(frames: &[Address]) -> Option<SymbolTable>
{
    if !SUPPORTED {
        return None;
    }

    let mut table = SymbolTable::unresolved(frames.len());
    for (index, &address) in frames.iter().enumerate() {
        if let Some(frame) = resolve(address) {
            table.set(index, frame);
        }
    }
    Some(table)
}

/// In-process symbolizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastSymbolizer;

impl Symbolizer for FastSymbolizer
{
    fn symbolize(&self, frames: &[Address]) -> Option<SymbolTable>
    {
        symbolize_fast(frames)
    }

    fn is_restricted_context_safe(&self) -> bool
    {
        cfg!(unix)
    }

    fn name(&self) -> &'static str
    {
        "fast"
    }
}

#[cfg(unix)]
fn module_path(bytes: &[u8]) -> PathBuf
{
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn module_path(bytes: &[u8]) -> PathBuf
{
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn raw(name: &'static [u8], address: u64, start: Option<u64>) -> RawSymbol<'static>
    {
        RawSymbol {
            address: Address::new(address),
            name,
            start: start.map(Address::new),
            module: Some(b"/usr/lib/libdemo.so"),
        }
    }

    #[test]
    fn test_display_demangles_and_appends_offset()
    {
        let symbol = raw(b"_ZN4demo3run17h0123456789abcdefE", 0x1010, Some(0x1000));
        assert_eq!(symbol.to_string(), "demo::run+0x10");
    }

    #[test]
    fn test_display_without_offset()
    {
        assert_eq!(raw(b"getpid", 0x2000, Some(0x2000)).to_string(), "getpid");
        assert_eq!(raw(b"getpid", 0x2000, None).to_string(), "getpid");
        assert_eq!(raw(b"\xff\xfe", 0x2000, None).to_string(), "??");
    }

    #[test]
    fn test_to_resolved_frame_copies_everything()
    {
        let frame = raw(b"_ZN4demo3run17h0123456789abcdefE", 0x1010, Some(0x1000)).to_resolved_frame();
        assert_eq!(frame.name(), "demo::run");
        assert_eq!(frame.offset, Some(0x10));
        assert_eq!(frame.module(), Some(std::path::Path::new("/usr/lib/libdemo.so")));
        assert!(frame.location.is_none());
        assert_eq!(frame.to_string(), "demo::run+0x10");
    }

    #[test]
    fn test_empty_input_gives_empty_table()
    {
        if let Some(table) = symbolize_fast(&[]) {
            assert!(table.is_empty());
        }
    }
}
