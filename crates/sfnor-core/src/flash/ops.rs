//! Operation capability traits
//!
//! A bound flash is a [`FlashOps`] implementation plus, optionally, a
//! [`FlashLocking`] sub-capability. The descriptor dispatches every call
//! through these traits whether the implementation came from the generic
//! driver, a registry driver or direct binding.

use super::info::FlashInfo;
use crate::error::Result;

/// The mandatory flash operations
///
/// Offsets are logical and have been range checked by the caller; erase
/// ranges are additionally aligned to `info().erase_size`.
pub trait FlashOps {
    /// Descriptor record of the bound flash
    fn info(&self) -> &FlashInfo;

    /// Send `opcode` on the command lanes and read `buf.len()` bytes back
    fn read_reg(&mut self, opcode: u8, buf: &mut [u8]) -> Result<()>;

    /// Send `opcode` followed by `data`
    fn write_reg(&mut self, opcode: u8, data: &[u8]) -> Result<()>;

    /// Read `buf.len()` bytes starting at `offset`
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Program `data` starting at `offset`
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<()>;

    /// Erase `len` bytes starting at `offset`
    fn erase(&mut self, offset: u32, len: u32) -> Result<()>;

    /// Bank currently selected on the (lower) chip, if banking is used
    fn current_bank(&self) -> Option<u8> {
        None
    }

    /// Locking capability, if the chip has one
    fn locking(&mut self) -> Option<&mut dyn FlashLocking> {
        None
    }
}

/// Optional region locking
///
/// Lock, unlock and the two queries come as one capability.
pub trait FlashLocking {
    /// Protect `[offset, offset + len)` against program and erase
    ///
    /// # Errors
    /// * `LockRangeUnsupported` - The chip cannot protect exactly that range
    ///   without affecting others
    fn lock(&mut self, offset: u32, len: u32) -> Result<()>;

    /// Remove protection from `[offset, offset + len)`
    ///
    /// # Errors
    /// * `LockRangeUnsupported` - The chip cannot unprotect exactly that range
    fn unlock(&mut self, offset: u32, len: u32) -> Result<()>;

    /// Returns true if all of `[offset, offset + len)` is protected
    fn is_locked(&mut self, offset: u32, len: u32) -> Result<bool>;

    /// Returns true if no byte of `[offset, offset + len)` is protected
    fn is_unlocked(&mut self, offset: u32, len: u32) -> Result<bool>;
}
