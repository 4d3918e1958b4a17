//! # Precise Symbolizer
//!
//! File and line accurate symbolization through an external line-mapping
//! tool that reads the debug information of each module on disk.
//!
//! | target | tool | address form |
//! |---|---|---|
//! | Linux and other ELF Unix | `addr2line -a -f -C -p -e <module>` | file virtual address |
//! | macOS | `atos -o <module> -l <load address>` | runtime address |
//! | Windows | none, uses the fast tier | - |
//!
//! Frames are grouped by the module that contains them and the tool runs once
//! per module.
//!
//! ## Failure policy
//!
//! - The tool cannot be started, exits unsuccessfully, outlives its timeout or
//!   prints nothing recognisable: the whole call returns `None`.
//! - A module image cannot be read, or one output line is garbled or `??`:
//!   only the affected entries stay unresolved.
//!
//! Spawns processes and allocates; never use from a signal handler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::Symbolizer;
use crate::config::{BacktraceConfig, DEFAULT_TOOL_TIMEOUT};
use crate::error::Result;
use crate::types::{Address, SymbolTable};

/// Line-mapping tool used when none is configured.
#[cfg(target_vendor = "apple")]
pub const DEFAULT_TOOL: &str = "atos";
/// Line-mapping tool used when none is configured.
#[cfg(not(target_vendor = "apple"))]
pub const DEFAULT_TOOL: &str = "addr2line";

/// External-tool symbolizer.
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use stackscope_core::symbols::PreciseSymbolizer;
///
/// let frames = stackscope_core::capture_vec(16);
/// let symbolizer = PreciseSymbolizer::new().with_timeout(Duration::from_secs(2));
/// if let Some(table) = symbolizer.symbolize(&frames) {
///     for (index, entry) in table.iter().enumerate() {
///         match entry {
///             Some(frame) => println!("#{index} {frame}"),
///             None => println!("#{index} ??"),
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreciseSymbolizer
{
    tool: PathBuf,
    timeout: Duration,
}

impl Default for PreciseSymbolizer
{
    fn default() -> Self
    {
        Self {
            tool: PathBuf::from(DEFAULT_TOOL),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

impl PreciseSymbolizer
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Tool and timeout taken from a loaded configuration.
    pub fn from_config(config: &BacktraceConfig) -> Self
    {
        Self {
            tool: config
                .symbolizer_tool
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL)),
            timeout: config.tool_timeout,
        }
    }

    /// Tool and timeout from the environment, defaults when it is invalid.
    pub fn from_env() -> Self
    {
        match BacktraceConfig::from_env() {
            Ok(config) => Self::from_config(&config),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring invalid backtrace configuration");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self
    {
        self.tool = tool.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self
    {
        self.timeout = timeout;
        self
    }

    pub fn tool(&self) -> &Path
    {
        &self.tool
    }

    pub fn timeout(&self) -> Duration
    {
        self.timeout
    }

    /// Resolve `frames` to function, file and line.
    ///
    /// Returns a table index-aligned with `frames`, or `None` when the tool
    /// is unavailable or failed. An empty input yields an empty table without
    /// running anything.
    pub fn symbolize(&self, frames: &[Address]) -> Option<SymbolTable>
    {
        if frames.is_empty() {
            return Some(SymbolTable::unresolved(0));
        }

        match self.try_symbolize(frames) {
            Ok(table) => {
                tracing::debug!(
                    tool = %self.tool.display(),
                    frames = frames.len(),
                    resolved = table.resolved_count(),
                    "precise symbolization finished"
                );
                Some(table)
            }
            Err(err) => {
                tracing::debug!(tool = %self.tool.display(), error = %err, "precise symbolization unavailable");
                None
            }
        }
    }

    /// Like [`symbolize`](Self::symbolize), reporting why the tool failed.
    pub fn try_symbolize(&self, frames: &[Address]) -> Result<SymbolTable>
    {
        imp::symbolize(self, frames)
    }
}

impl Symbolizer for PreciseSymbolizer
{
    fn symbolize(&self, frames: &[Address]) -> Option<SymbolTable>
    {
        PreciseSymbolizer::symbolize(self, frames)
    }

    fn is_restricted_context_safe(&self) -> bool
    {
        false
    }

    fn name(&self) -> &'static str
    {
        "precise"
    }
}

/// Resolve `frames` with the configured line-mapping tool.
///
/// Reads `STACKSCOPE_SYMBOLIZER` and `STACKSCOPE_SYMBOLIZER_TIMEOUT_MS`.
/// Returns `None` when the tool is unavailable.
pub fn symbolize_precise(frames: &[Address]) -> Option<SymbolTable>
{
    PreciseSymbolizer::from_env().symbolize(frames)
}

#[cfg(unix)]
mod imp
{
    use std::ffi::OsString;

    use smallvec::SmallVec;

    use super::PreciseSymbolizer;
    use crate::error::Result;
    use crate::symbols::loader::{containing_module, LoadedModule};
    use crate::symbols::tool;
    use crate::types::{Address, SymbolEntry, SymbolTable};

    /// Frames that share a module, by index into the frame slice.
    struct ModuleBatch
    {
        module: LoadedModule,
        indices: SmallVec<[usize; 16]>,
    }

    pub(super) fn symbolize(symbolizer: &PreciseSymbolizer, frames: &[Address]) -> Result<SymbolTable>
    {
        let mut table = SymbolTable::unresolved(frames.len());
        let mut ran_tool = false;

        for batch in group_by_module(frames) {
            let addresses: SmallVec<[Address; 16]> = batch.indices.iter().map(|&index| frames[index]).collect();
            tracing::trace!(
                module = %batch.module.path.display(),
                frames = addresses.len(),
                "running line-mapping tool"
            );

            let Some(entries) = run_batch(symbolizer, &batch.module, &addresses)? else {
                continue;
            };
            ran_tool = true;
            for (&index, entry) in batch.indices.iter().zip(entries) {
                if let Some(mut frame) = entry {
                    frame.address = frames[index];
                    frame.module = Some(batch.module.path.clone());
                    table.set(index, frame);
                }
            }
        }

        // A missing tool must not pass for a batch of unknown frames.
        if !ran_tool {
            tool::ensure_launchable(&symbolizer.tool)?;
        }
        Ok(table)
    }

    fn group_by_module(frames: &[Address]) -> Vec<ModuleBatch>
    {
        let mut batches: Vec<ModuleBatch> = Vec::new();
        for (index, &address) in frames.iter().enumerate() {
            let Some(module) = containing_module(address) else {
                continue;
            };
            match batches.iter_mut().find(|batch| batch.module == module) {
                Some(batch) => batch.indices.push(index),
                None => batches.push(ModuleBatch {
                    module,
                    indices: SmallVec::from_elem(index, 1),
                }),
            }
        }
        batches
    }

    /// Entries for one module, or `None` when the tool had nothing to look up.
    #[cfg(not(target_vendor = "apple"))]
    fn run_batch(
        symbolizer: &PreciseSymbolizer,
        module: &LoadedModule,
        addresses: &[Address],
    ) -> Result<Option<Vec<SymbolEntry>>>
    {
        use crate::symbols::cache;

        let image = match cache::module_image(&module.path) {
            Ok(image) => image,
            Err(err) => {
                tracing::debug!(module = %module.path.display(), error = %err, "skipping unreadable module");
                return Ok(None);
            }
        };

        // Addresses outside the image's segments cannot be asked about.
        let (slots, file_addresses): (SmallVec<[usize; 16]>, SmallVec<[u64; 16]>) = addresses
            .iter()
            .enumerate()
            .filter_map(|(slot, &address)| Some((slot, image.file_address(address, module.base)?)))
            .unzip();
        if file_addresses.is_empty() {
            return Ok(None);
        }

        let mut args: Vec<OsString> = ["-a", "-f", "-C", "-p", "-e"].iter().map(OsString::from).collect();
        args.push(image.path().as_os_str().to_os_string());
        args.extend(file_addresses.iter().map(|address| OsString::from(format!("0x{address:x}"))));

        let output = tool::run(&symbolizer.tool, &args, symbolizer.timeout)?;
        let parsed = tool::parse_addr2line(&output, &file_addresses)?;
        let mut entries = vec![None; addresses.len()];
        for (slot, entry) in slots.into_iter().zip(parsed) {
            entries[slot] = entry;
        }
        Ok(Some(entries))
    }

    #[cfg(target_vendor = "apple")]
    fn run_batch(
        symbolizer: &PreciseSymbolizer,
        module: &LoadedModule,
        addresses: &[Address],
    ) -> Result<Option<Vec<SymbolEntry>>>
    {
        let mut args: Vec<OsString> = vec![
            OsString::from("-o"),
            module.path.as_os_str().to_os_string(),
            OsString::from("-l"),
            OsString::from(format!("0x{:x}", module.base.value())),
        ];
        args.extend(addresses.iter().map(|address| OsString::from(format!("0x{:x}", address.value()))));

        let output = tool::run(&symbolizer.tool, &args, symbolizer.timeout)?;
        tool::parse_atos(&output, addresses).map(Some)
    }
}

#[cfg(windows)]
mod imp
{
    use super::PreciseSymbolizer;
    use crate::error::Result;
    use crate::symbols::fast::symbolize_fast;
    use crate::types::{Address, SymbolTable};

    /// No line-mapping tool ships with Windows; dbghelp already reads PDB
    /// line data, so the fast tier is the precise one.
    pub(super) fn symbolize(_symbolizer: &PreciseSymbolizer, frames: &[Address]) -> Result<SymbolTable>
    {
        Ok(symbolize_fast(frames).unwrap_or_else(|| SymbolTable::unresolved(frames.len())))
    }
}

#[cfg(not(any(unix, windows)))]
mod imp
{
    use super::PreciseSymbolizer;
    use crate::error::{Result, StackscopeError};
    use crate::types::{Address, SymbolTable};

    pub(super) fn symbolize(symbolizer: &PreciseSymbolizer, _frames: &[Address]) -> Result<SymbolTable>
    {
        Err(StackscopeError::ToolUnavailable {
            tool: symbolizer.tool.clone(),
            source: std::io::Error::from(std::io::ErrorKind::Unsupported),
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_config_selects_tool_and_timeout()
    {
        let config = BacktraceConfig::default()
            .with_symbolizer_tool("/opt/llvm/bin/llvm-addr2line")
            .with_tool_timeout(Duration::from_millis(750));
        let symbolizer = PreciseSymbolizer::from_config(&config);
        assert_eq!(symbolizer.tool(), Path::new("/opt/llvm/bin/llvm-addr2line"));
        assert_eq!(symbolizer.timeout(), Duration::from_millis(750));

        let symbolizer = PreciseSymbolizer::from_config(&BacktraceConfig::default());
        assert_eq!(symbolizer.tool(), Path::new(DEFAULT_TOOL));
    }

    #[test]
    fn test_empty_input_runs_nothing()
    {
        let symbolizer = PreciseSymbolizer::new().with_tool("/nonexistent/stackscope/addr2line");
        let table = symbolizer.symbolize(&[]).unwrap();
        assert!(table.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_tool_fails_whole_call()
    {
        let symbolizer = PreciseSymbolizer::new().with_tool("/nonexistent/stackscope/addr2line");
        let frames = [Address::from_usize(libc::getpid as usize)];
        assert!(symbolizer.symbolize(&frames).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_tool_fails_without_any_module()
    {
        let symbolizer = PreciseSymbolizer::new().with_tool("/nonexistent/stackscope/addr2line");
        assert!(symbolizer.symbolize(&[Address::from_usize(0x10)]).is_none());
        assert!(matches!(
            symbolizer.try_symbolize(&[Address::from_usize(0x10)]),
            Err(crate::error::StackscopeError::ToolUnavailable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_frames_outside_any_module_stay_unresolved()
    {
        // `true` starts fine but is never given anything to look up.
        let symbolizer = PreciseSymbolizer::new().with_tool("true");
        let table = symbolizer.symbolize(&[Address::from_usize(0x10)]).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table[0].is_none());
    }
}
