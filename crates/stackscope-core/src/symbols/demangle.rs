//! Symbol demangling utilities.
//!
//! Names come from two places: raw linkage names read by the loader
//! (`dladdr`, dbghelp), and names printed by the line-mapping tool, which has
//! already demangled them. Both end up as a [`SymbolName`].
//!
//! Rust names are shown in the alternate `rustc_demangle` form, i.e. without
//! the trailing `::h<hash>`. C++ names are left as the loader reports them.

use rustc_demangle::try_demangle;

use crate::types::{SymbolLanguage, SymbolName};

/// Length of the hex digest in a legacy Rust symbol (`::h` + 16 digits).
const RUST_HASH_DIGITS: usize = 16;

/// Create a `SymbolName` from a raw mangled symbol string.
pub(crate) fn make_symbol_name(raw: String) -> SymbolName
{
    if let Ok(demangled) = try_demangle(&raw) {
        let demangled = format!("{demangled:#}");
        return SymbolName::new(raw, Some(demangled), SymbolLanguage::Rust);
    }

    let language = if raw.starts_with("_Z") || raw.starts_with("__Z") {
        SymbolLanguage::Cpp
    } else if is_c_identifier(&raw) {
        SymbolLanguage::C
    } else {
        SymbolLanguage::Unknown
    };

    SymbolName::new(raw, None, language)
}

/// Create a `SymbolName` from a name an external tool already demangled.
pub(crate) fn make_tool_symbol_name(name: &str) -> SymbolName
{
    let name = name.trim();
    let stripped = strip_rust_hash(name);
    let demangled = (stripped.len() != name.len()).then(|| stripped.to_string());
    let language = if demangled.is_some() {
        SymbolLanguage::Rust
    } else if is_c_identifier(name) {
        SymbolLanguage::C
    } else {
        SymbolLanguage::Unknown
    };

    SymbolName::new(name.to_string(), demangled, language)
}

/// Drop a trailing `::h0123456789abcdef` hash from a demangled Rust path.
pub(crate) fn strip_rust_hash(name: &str) -> &str
{
    let Some((path, hash)) = name.rsplit_once("::h") else {
        return name;
    };
    if hash.len() == RUST_HASH_DIGITS && hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        path
    } else {
        name
    }
}

fn is_c_identifier(name: &str) -> bool
{
    let mut bytes = name.bytes();
    matches!(bytes.next(), Some(b) if b == b'_' || b.is_ascii_alphabetic())
        && bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_legacy_rust_symbol_is_demangled_without_hash()
    {
        let name = make_symbol_name("_ZN4core9panicking5panic17h0123456789abcdefE".to_string());
        assert_eq!(name.language(), SymbolLanguage::Rust);
        assert_eq!(name.display_name(), "core::panicking::panic");
        assert_eq!(name.raw(), "_ZN4core9panicking5panic17h0123456789abcdefE");
    }

    #[test]
    fn test_plain_c_symbol_is_kept()
    {
        let name = make_symbol_name("getpid".to_string());
        assert_eq!(name.language(), SymbolLanguage::C);
        assert_eq!(name.display_name(), "getpid");
        assert!(name.demangled().is_none());
    }

    #[test]
    fn test_cpp_symbol_is_classified()
    {
        let name = make_symbol_name("_Z3fooi".to_string());
        assert_eq!(name.language(), SymbolLanguage::Cpp);
        assert_eq!(name.display_name(), "_Z3fooi");
    }

    #[test]
    fn test_tool_names_lose_their_hash()
    {
        let name = make_tool_symbol_name("demo::main::h5f2c1d0e9b8a7c6d");
        assert_eq!(name.display_name(), "demo::main");
        assert_eq!(name.raw(), "demo::main::h5f2c1d0e9b8a7c6d");

        let name = make_tool_symbol_name("std::vector<int>::push_back(int const&)");
        assert_eq!(name.display_name(), "std::vector<int>::push_back(int const&)");
        assert_eq!(name.language(), SymbolLanguage::Unknown);
    }

    #[test]
    fn test_strip_rust_hash_ignores_lookalikes()
    {
        assert_eq!(strip_rust_hash("a::hello"), "a::hello");
        assert_eq!(strip_rust_hash("a::h0123"), "a::h0123");
        assert_eq!(strip_rust_hash("plain"), "plain");
    }
}
