//! # Types
//!
//! Platform-agnostic types shared by the capture, symbolication, and
//! reporting layers.
//!
//! Captured frames are plain [`Address`] values in caller-owned buffers;
//! symbolication produces an owned [`SymbolTable`] whose entries line up with
//! those frames one-to-one.

pub mod address;
pub mod frames;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use frames::{ResolvedFrame, SymbolEntry, SymbolTable};
pub use symbols::{SourceLocation, SymbolLanguage, SymbolName};
