//! Tests for shared types

use std::path::PathBuf;

use stackscope_core::types::{Address, ResolvedFrame, SourceLocation, SymbolLanguage, SymbolName, SymbolTable};

fn frame(address: u64, name: &str) -> ResolvedFrame
{
    ResolvedFrame::new(
        Address::new(address),
        SymbolName::new(name.to_string(), None, SymbolLanguage::C),
    )
}

#[test]
fn test_address_display_and_arithmetic()
{
    let addr = Address::new(0x7fff_0000_1000);
    assert_eq!(addr.to_string(), "0x00007fff00001000");
    assert_eq!(format!("{addr:x}"), "7fff00001000");

    assert_eq!((addr + 0x10).value(), 0x7fff_0000_1010);
    assert_eq!((addr - 0x1000).value(), 0x7fff_0000_0000);
    assert_eq!(Address::ZERO.checked_sub(1), None);
    assert_eq!(addr.offset_from(Address::new(0x7fff_0000_0000)), Some(0x1000));
    assert_eq!(Address::new(0x10).offset_from(addr), None);

    assert!(Address::ZERO.is_null());
    assert_eq!(Address::from_usize(0x4000), Address::from(0x4000u64));
    assert_eq!(u64::from(Address::new(42)), 42);
}

#[test]
fn test_address_ordering()
{
    let mut addrs = vec![Address::new(0x3000), Address::new(0x1000), Address::new(0x2000)];
    addrs.sort();
    assert_eq!(addrs, [Address::new(0x1000), Address::new(0x2000), Address::new(0x3000)]);
}

#[test]
fn test_symbol_name_prefers_demangled()
{
    let name = SymbolName::new(
        "_ZN4demo3run17h0123456789abcdefE".to_string(),
        Some("demo::run".to_string()),
        SymbolLanguage::Rust,
    );
    assert_eq!(name.display_name(), "demo::run");
    assert_eq!(name.raw(), "_ZN4demo3run17h0123456789abcdefE");
    assert_eq!(name.to_string(), "demo::run");
    assert_eq!(name.language().to_string(), "rust");

    let plain = SymbolName::new("main".to_string(), None, SymbolLanguage::C);
    assert_eq!(plain.display_name(), "main");
    assert_eq!(plain.demangled(), None);
}

#[test]
fn test_resolved_frame_display()
{
    let mut resolved = frame(0x1010, "main");
    assert_eq!(resolved.to_string(), "main");

    resolved.offset = Some(0x10);
    assert_eq!(resolved.to_string(), "main+0x10");

    resolved.location = Some(SourceLocation::from_file("src/main.rs").with_line(12));
    assert_eq!(resolved.to_string(), "main at src/main.rs:12");

    resolved.module = Some(PathBuf::from("/usr/bin/demo"));
    assert_eq!(resolved.module(), Some(std::path::Path::new("/usr/bin/demo")));
    assert_eq!(resolved.name(), "main");
}

#[test]
fn test_source_location_display()
{
    let mut location = SourceLocation::from_file("lib.rs");
    assert_eq!(location.to_string(), "lib.rs");
    location.line = Some(3);
    assert_eq!(location.to_string(), "lib.rs:3");
}

#[test]
fn test_symbol_table_is_index_aligned()
{
    let table = SymbolTable::from(vec![Some(frame(0x1000, "a")), None, Some(frame(0x3000, "c"))]);

    assert_eq!(table.len(), 3);
    assert!(!table.is_empty());
    assert_eq!(table.resolved_count(), 2);
    assert_eq!(table.get(0).map(ResolvedFrame::name), Some("a"));
    assert!(table.get(1).is_none());
    assert!(table[1].is_none());
    assert!(table.get(7).is_none());
    assert_eq!(table.display(2).as_deref(), Some("c"));
    assert_eq!(table.display(1), None);

    let names: Vec<_> = table.iter().map(|entry| entry.as_ref().map(ResolvedFrame::name)).collect();
    assert_eq!(names, [Some("a"), None, Some("c")]);
    assert_eq!(table.into_entries().len(), 3);
}

#[test]
fn test_unresolved_table()
{
    let table = SymbolTable::unresolved(4);
    assert_eq!(table.len(), 4);
    assert_eq!(table.resolved_count(), 0);
    assert!(SymbolTable::default().is_empty());
}
