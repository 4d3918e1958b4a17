//! Queries against the dynamic loader's view of this process.

use std::ffi::{CStr, OsStr};
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::types::Address;

/// What `dladdr` knows about one address, borrowed from loader memory.
///
/// The strings point into the loader's tables and stay valid until the
/// module is unloaded; copy them before doing anything that could `dlclose`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoaderRecord<'a>
{
    pub module: Option<&'a [u8]>,
    pub module_base: Option<Address>,
    pub symbol: Option<&'a [u8]>,
    pub symbol_start: Option<Address>,
}

/// Look up `address` with `dladdr`. `None` when no loaded module contains it.
///
/// Does not allocate.
pub(crate) fn lookup(address: Address) -> Option<LoaderRecord<'static>>
{
    // SAFETY: Dl_info is plain old data; all-zero is a valid value.
    let mut info: libc::Dl_info = unsafe { mem::zeroed() };
    // SAFETY: dladdr only reads the address value and fills `info`.
    let found = unsafe { libc::dladdr(address.as_ptr().cast_const(), &mut info) };
    if found == 0 {
        return None;
    }

    Some(LoaderRecord {
        // SAFETY: non-null pointers from dladdr are NUL-terminated loader strings.
        module: non_empty(unsafe { c_bytes(info.dli_fname) }),
        module_base: non_null(info.dli_fbase.cast_const()),
        symbol: non_empty(unsafe { c_bytes(info.dli_sname) }),
        symbol_start: non_null(info.dli_saddr.cast_const()),
    })
}

/// A loaded module, owned, for grouping addresses before running a tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LoadedModule
{
    pub path: PathBuf,
    pub base: Address,
}

/// The module containing `address`, with its file resolved to something that
/// can be opened.
///
/// The main executable is often reported with an empty or relative name; it
/// is replaced by `current_exe()`. Apple system libraries live in the shared
/// cache rather than on disk, so their reported path is kept as is. Any other
/// module without a file on disk (the vDSO, a deleted library) is `None`.
pub(crate) fn containing_module(address: Address) -> Option<LoadedModule>
{
    let record = lookup(address)?;
    let base = record.module_base?;

    let reported = record.module.map(|bytes| Path::new(OsStr::from_bytes(bytes)));
    let path = match reported {
        Some(path) if path.is_absolute() && (cfg!(target_vendor = "apple") || path.is_file()) => path.to_path_buf(),
        _ if main_program_base() == Some(base) => std::env::current_exe().ok()?,
        _ => return None,
    };

    Some(LoadedModule { path, base })
}

/// Load base of the main executable, as `dladdr` reports it.
fn main_program_base() -> Option<Address>
{
    lookup(main_program_address()?)?.module_base
}

/// An address inside the main executable's image: its program headers.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn main_program_address() -> Option<Address>
{
    // SAFETY: getauxval has no preconditions.
    let phdr = unsafe { libc::getauxval(libc::AT_PHDR) };
    (phdr != 0).then(|| Address::new(u64::from(phdr)))
}

/// An address inside the main executable's image: its Mach-O header.
#[cfg(target_vendor = "apple")]
fn main_program_address() -> Option<Address>
{
    // SAFETY: image 0 is always the main executable.
    let header = unsafe { libc::_dyld_get_image_header(0) };
    non_null(header.cast())
}

/// An address inside the module this crate is linked into, which is the
/// executable unless the crate was built into a shared object.
#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
fn main_program_address() -> Option<Address>
{
    Some(Address::from_usize(main_program_address as usize))
}

unsafe fn c_bytes<'a>(ptr: *const libc::c_char) -> Option<&'a [u8]>
{
    if ptr.is_null() {
        None
    } else {
        // SAFETY: forwarded from the caller.
        Some(unsafe { CStr::from_ptr(ptr) }.to_bytes())
    }
}

fn non_empty(bytes: Option<&[u8]>) -> Option<&[u8]>
{
    bytes.filter(|b| !b.is_empty())
}

fn non_null(ptr: *const libc::c_void) -> Option<Address>
{
    (!ptr.is_null()).then(|| Address::from_ptr(ptr))
}
