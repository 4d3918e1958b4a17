//! Instruction pointer type.

use std::ffi::c_void;
use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed code address
///
/// Every frame captured by [`crate::capture`] is stored as an `Address`: the
/// instruction pointer of the faulting frame or the return address of an
/// outer frame. Wrapping the raw value keeps frame values from being mixed up
/// with offsets or counts, and gives them one display format everywhere.
///
/// The value is kept as `u64` on every target so that frame lists have the
/// same layout on 32-bit and 64-bit builds.
///
/// ## Example
///
/// ```rust
/// use stackscope_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100;
/// assert_eq!(next_addr.value(), 0x1100);
/// assert_eq!(addr.to_string(), "0x0000000000001000");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address, used as the "outermost frame" sentinel.
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// ```rust
    /// use stackscope_core::types::Address;
    ///
    /// const LOW: Address = Address::new(0x1000);
    /// assert_eq!(LOW.value(), 0x1000);
    /// ```
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Address from a pointer-sized integer.
    pub const fn from_usize(value: usize) -> Self
    {
        Address(value as u64)
    }

    /// Address of a pointer in this process.
    pub fn from_ptr<T>(ptr: *const T) -> Self
    {
        Address(ptr as usize as u64)
    }

    /// Raw `u64` value.
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// The address as a pointer-sized integer.
    ///
    /// Addresses always come from this process, so on 32-bit targets the
    /// upper half is zero and the truncation is lossless.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_usize(self) -> usize
    {
        self.0 as usize
    }

    /// The address as a raw pointer for FFI lookups.
    pub fn as_ptr(self) -> *mut c_void
    {
        self.as_usize() as *mut c_void
    }

    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Subtract an offset, returning `None` on underflow.
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Distance from `base` to this address, if `base` is not above it.
    pub fn offset_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
