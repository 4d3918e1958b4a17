//! # Symbolization
//!
//! Turns captured [`Address`]es into function names.
//!
//! Two tiers implement the [`Symbolizer`] trait:
//!
//! - [`FastSymbolizer`] ([`fast`]): in-process lookup through the dynamic
//!   loader. Cheap, restricted-context safe on Unix, names only.
//! - [`PreciseSymbolizer`] ([`precise`]): an external line-mapping tool run
//!   against each module on disk. Slow, spawns processes, adds file and line.
//!
//! Both return a [`SymbolTable`] index-aligned with the input frames, with
//! `None` entries for frames that could not be resolved, or `None` for the
//! whole call when the capability is absent.

pub mod fast;
pub mod precise;

#[cfg(all(unix, not(target_vendor = "apple")))]
mod cache;
mod demangle;
#[cfg(all(unix, not(target_vendor = "apple")))]
mod image;
#[cfg(unix)]
mod loader;
#[cfg(unix)]
mod tool;

pub use fast::{symbolize_fast, with_symbol, FastSymbolizer, RawSymbol};
pub use precise::{symbolize_precise, PreciseSymbolizer};

use crate::types::{Address, SymbolTable};

/// A symbolization tier.
///
/// ```rust
/// use stackscope_core::symbols::{FastSymbolizer, PreciseSymbolizer, Symbolizer};
///
/// fn best_effort(tiers: &[&dyn Symbolizer], frames: &[stackscope_core::Address]) -> Option<stackscope_core::SymbolTable>
/// {
///     tiers.iter().find_map(|tier| tier.symbolize(frames))
/// }
///
/// let frames = stackscope_core::capture_vec(8);
/// let table = best_effort(&[&PreciseSymbolizer::new(), &FastSymbolizer], &frames);
/// if let Some(table) = table {
///     assert_eq!(table.len(), frames.len());
/// }
/// ```
pub trait Symbolizer
{
    /// Resolve `frames`; `None` when this tier is unavailable.
    fn symbolize(&self, frames: &[Address]) -> Option<SymbolTable>;

    /// Whether [`symbolize`](Self::symbolize)'s lookups avoid allocation and
    /// locks. The returned table itself is always heap allocated.
    fn is_restricted_context_safe(&self) -> bool;

    /// Short tier name for logs.
    fn name(&self) -> &'static str;
}
