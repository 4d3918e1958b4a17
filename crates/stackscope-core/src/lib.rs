//! # stackscope-core
//!
//! Runtime introspection primitives for crash-time diagnostics.
//!
//! This crate provides:
//! - Platform probing (build OS, online processor count, debugger detection)
//! - Stack capture into caller-provided storage
//! - Fast, in-process symbolication (`dladdr` / dbghelp)
//! - Precise, file:line symbolication through an external tool (`addr2line` / `atos`)
//! - A crash reporter that renders a backtrace from inside a signal handler
//!
//! ## Restricted contexts
//!
//! A signal or structured-exception handler may interrupt a thread that holds
//! the allocator lock or any other lock. The following operations avoid heap
//! allocation and lock acquisition and may be used there:
//!
//! - [`capture::capture`] and [`capture::capture_from`]
//! - [`symbols::fast::with_symbol`]
//! - [`report::Reporter::print`] (with a [`report::RawFdWriter`] or similar stream)
//! - [`report::Reporter::log`] (with a sink that does not allocate)
//!
//! Everything returning an owned [`types::SymbolTable`], and the whole of
//! [`symbols::precise`], must only be used from ordinary code.
//!
//! ## Failure model
//!
//! No public operation returns an error for an expected failure. A missing
//! capability shows up as `0` frames or a `None` table, an unresolved frame as
//! a `None` entry.
//!
//! ## Why unsafe code is needed
//!
//! Platform probing, `dladdr`, and fault-context decoding are FFI calls or raw
//! pointer reads. They are wrapped in safe functions wherever the contract can
//! be checked locally; fault contexts stay `unsafe` to construct because only
//! the caller knows the pointers are valid.

#![allow(unsafe_code)] // Required for libc / Win32 calls and fault-context decoding

pub mod capture;
pub mod config;
pub mod error;
pub mod platform;
pub mod prelude;
pub mod report;
pub mod symbols;
pub mod types;

pub use capture::{capture, capture_from, capture_vec, FaultContext};
pub use config::BacktraceConfig;
pub use error::{Result, StackscopeError};
pub use platform::{debug_break, is_debugger_present, platform_build_os, processor_count, Capabilities, PlatformOs};
pub use report::{LineSink, ReportOutcome, Reporter, TracingSink};
#[cfg(any(unix, windows))]
pub use report::RawFdWriter;
pub use symbols::{symbolize_fast, symbolize_precise, FastSymbolizer, PreciseSymbolizer, Symbolizer};
pub use types::{Address, ResolvedFrame, SymbolEntry, SymbolTable};
