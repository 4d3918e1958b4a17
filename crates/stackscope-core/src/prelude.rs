//! Common module for library exports

pub use crate::capture::{capture, capture_from, FaultContext};
pub use crate::error::{Result, StackscopeError};
pub use crate::platform::{debug_break, is_debugger_present, platform_build_os, processor_count, PlatformOs};
pub use crate::report::{LineSink, Reporter};
pub use crate::symbols::{symbolize_fast, symbolize_precise, Symbolizer};
pub use crate::types::{Address, SymbolTable};
