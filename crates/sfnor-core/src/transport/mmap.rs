//! Memory-mapped flash window

use core::ptr::NonNull;

use crate::error::{Error, Result};

/// Read-only window through which the controller maps flash contents
///
/// Offset 0 of the window corresponds to offset 0 of the flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    base: NonNull<u8>,
    len: usize,
}

impl MemoryMap {
    /// Describe a mapped window
    ///
    /// # Safety
    ///
    /// `base..base + len` must stay readable for as long as any descriptor
    /// holds this map, and must reflect the flash contents whenever no
    /// program or erase is in flight on that descriptor.
    pub const unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    /// Size of the window in bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the window is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if `[offset, offset + len)` lies within the window
    pub fn covers(&self, offset: u32, len: usize) -> bool {
        (offset as u64 + len as u64) <= self.len as u64
    }

    /// Copy `buf.len()` bytes starting at `offset` out of the window
    pub fn copy_to(&self, offset: u32, buf: &mut [u8]) -> Result<()> {
        if !self.covers(offset, buf.len()) {
            return Err(Error::AddressOutOfBounds);
        }
        // SAFETY: range checked above; readability is the constructor's contract
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.base.as_ptr().add(offset as usize),
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_within_window() {
        let backing = [0x10u8, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17];
        let map = unsafe { MemoryMap::new(NonNull::from(&backing).cast(), backing.len()) };

        let mut buf = [0u8; 3];
        map.copy_to(4, &mut buf).unwrap();
        assert_eq!(buf, [0x14, 0x15, 0x16]);
    }

    #[test]
    fn test_copy_outside_window_rejected() {
        let backing = [0u8; 8];
        let map = unsafe { MemoryMap::new(NonNull::from(&backing).cast(), backing.len()) };

        let mut buf = [0u8; 4];
        assert!(!map.covers(6, 4));
        assert_eq!(map.copy_to(6, &mut buf), Err(Error::AddressOutOfBounds));
    }
}
