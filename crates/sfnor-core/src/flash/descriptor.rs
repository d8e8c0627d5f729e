//! Flash descriptor facade
//!
//! [`SpiFlash`] is what callers hold after probing. It checks arguments
//! against the descriptor, then forwards to the bound [`FlashOps`].

use alloc::boxed::Box;

use super::info::FlashInfo;
use super::ops::{FlashLocking, FlashOps};
use crate::error::{Error, Result};

/// A bound SPI flash
///
/// Offsets and lengths are always in the logical address space; dual
/// topologies are handled below this type.
///
/// # Example
///
/// ```ignore
/// let mut flash = flash::probe(&mut host, &SlaveConfig::default(), ChipDatabase::builtin())?;
/// flash.erase(0, 4096)?;
/// flash.write(0, &[0xDE, 0xAD, 0xBE, 0xEF])?;
/// let mut buf = [0u8; 4];
/// flash.read(0, &mut buf)?;
/// flash.free();
/// ```
pub struct SpiFlash {
    ops: Box<dyn FlashOps>,
}

impl SpiFlash {
    /// Wrap bound operations in a descriptor
    ///
    /// # Errors
    /// * `InvalidGeometry` - If the operations report an invalid [`FlashInfo`]
    pub fn bind(ops: Box<dyn FlashOps>) -> Result<Self> {
        ops.info().validate()?;
        Ok(Self { ops })
    }

    /// Descriptor record
    pub fn info(&self) -> &FlashInfo {
        self.ops.info()
    }

    /// Chip name
    pub fn name(&self) -> &str {
        &self.info().name
    }

    /// Total capacity in bytes
    pub fn size(&self) -> u32 {
        self.info().size
    }

    /// Bank currently selected, if banking is in effect
    pub fn current_bank(&self) -> Option<u8> {
        self.ops.current_bank()
    }

    /// Read `buf.len()` bytes of register `opcode`
    pub fn read_reg(&mut self, opcode: u8, buf: &mut [u8]) -> Result<()> {
        self.ops.read_reg(opcode, buf)
    }

    /// Send `opcode` followed by `data`
    pub fn write_reg(&mut self, opcode: u8, data: &[u8]) -> Result<()> {
        self.ops.write_reg(opcode, data)
    }

    /// Read `buf.len()` bytes starting at `offset`
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - If the range extends beyond the flash
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.info().check_range(offset, buf.len())?;
        self.ops.read(offset, buf)
    }

    /// Program `data` starting at `offset`
    ///
    /// The target should be erased. Programs are split at page and bank
    /// boundaries.
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - If the range extends beyond the flash
    /// * `RegionProtected` - If any part of the range is locked
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.info().check_range(offset, data.len())?;
        self.refuse_protected(offset, data.len() as u32)?;
        self.ops.write(offset, data)
    }

    /// Erase `len` bytes starting at `offset`
    ///
    /// # Errors
    /// * `InvalidAlignment` - If offset or length is not a multiple of the
    ///   erase size
    /// * `AddressOutOfBounds` - If the range extends beyond the flash
    /// * `RegionProtected` - If any part of the range is locked
    pub fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        self.info().check_erase_alignment(offset, len)?;
        if len == 0 {
            return Ok(());
        }
        self.info().check_range(offset, len as usize)?;
        self.refuse_protected(offset, len)?;
        self.ops.erase(offset, len)
    }

    /// Returns true if the descriptor can lock regions
    pub fn has_locking(&mut self) -> bool {
        self.ops.locking().is_some()
    }

    fn locking(&mut self) -> Result<&mut dyn FlashLocking> {
        self.ops.locking().ok_or(Error::OperationNotSupported)
    }

    /// Protect a region against program and erase
    ///
    /// # Errors
    /// * `OperationNotSupported` - If no locking is bound
    /// * `LockRangeUnsupported` - If the chip cannot lock exactly that range
    pub fn lock(&mut self, offset: u32, len: u32) -> Result<()> {
        self.info().check_range(offset, len as usize)?;
        self.locking()?.lock(offset, len)
    }

    /// Remove protection from a region
    ///
    /// # Errors
    /// * `OperationNotSupported` - If no locking is bound
    /// * `LockRangeUnsupported` - If the chip cannot unlock exactly that range
    pub fn unlock(&mut self, offset: u32, len: u32) -> Result<()> {
        self.info().check_range(offset, len as usize)?;
        self.locking()?.unlock(offset, len)
    }

    /// Returns true if the whole region is protected
    ///
    /// # Errors
    /// * `OperationNotSupported` - If no locking is bound
    pub fn is_locked(&mut self, offset: u32, len: u32) -> Result<bool> {
        self.info().check_range(offset, len as usize)?;
        self.locking()?.is_locked(offset, len)
    }

    /// Lock (`on`) or unlock a region
    ///
    /// # Errors
    /// * `OperationNotSupported` - If no locking is bound
    pub fn protect(&mut self, offset: u32, len: u32, on: bool) -> Result<()> {
        if on {
            self.lock(offset, len)
        } else {
            self.unlock(offset, len)
        }
    }

    fn refuse_protected(&mut self, offset: u32, len: u32) -> Result<()> {
        if let Some(locking) = self.ops.locking() {
            if !locking.is_unlocked(offset, len)? {
                log::warn!("{:#x}+{:#x} is protected and cannot be modified", offset, len);
                return Err(Error::RegionProtected);
            }
        }
        Ok(())
    }

    /// Release the descriptor and the slave it owns
    pub fn free(self) {
        log::debug!("releasing {}", self.name());
        drop(self);
    }
}

impl core::fmt::Debug for SpiFlash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpiFlash")
            .field("info", self.info())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    /// RAM-backed operations with no locking
    struct RamOps {
        info: FlashInfo,
        mem: Vec<u8>,
        erases: u32,
    }

    impl RamOps {
        fn new() -> Self {
            let info = FlashInfo::new("RAM", 0x1_0000, 256, 4096);
            let mem = vec![0xFF; info.size as usize];
            Self { info, mem, erases: 0 }
        }
    }

    impl FlashOps for RamOps {
        fn info(&self) -> &FlashInfo {
            &self.info
        }

        fn read_reg(&mut self, _opcode: u8, buf: &mut [u8]) -> Result<()> {
            buf.fill(0);
            Ok(())
        }

        fn write_reg(&mut self, _opcode: u8, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
            let start = offset as usize;
            buf.copy_from_slice(&self.mem[start..start + buf.len()]);
            Ok(())
        }

        fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
            for (i, b) in data.iter().enumerate() {
                self.mem[offset as usize + i] &= b;
            }
            Ok(())
        }

        fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
            self.erases += 1;
            self.mem[offset as usize..(offset + len) as usize].fill(0xFF);
            Ok(())
        }
    }

    /// RAM-backed operations whose top half is locked
    struct FencedOps {
        ram: RamOps,
        locked_from: u32,
    }

    impl FlashOps for FencedOps {
        fn info(&self) -> &FlashInfo {
            self.ram.info()
        }

        fn read_reg(&mut self, opcode: u8, buf: &mut [u8]) -> Result<()> {
            self.ram.read_reg(opcode, buf)
        }

        fn write_reg(&mut self, opcode: u8, data: &[u8]) -> Result<()> {
            self.ram.write_reg(opcode, data)
        }

        fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
            self.ram.read(offset, buf)
        }

        fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
            self.ram.write(offset, data)
        }

        fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
            self.ram.erase(offset, len)
        }

        fn locking(&mut self) -> Option<&mut dyn FlashLocking> {
            Some(self)
        }
    }

    impl FlashLocking for FencedOps {
        fn lock(&mut self, offset: u32, _len: u32) -> Result<()> {
            self.locked_from = self.locked_from.min(offset);
            Ok(())
        }

        fn unlock(&mut self, offset: u32, len: u32) -> Result<()> {
            self.locked_from = self.locked_from.max(offset + len);
            Ok(())
        }

        fn is_locked(&mut self, offset: u32, _len: u32) -> Result<bool> {
            Ok(offset >= self.locked_from)
        }

        fn is_unlocked(&mut self, offset: u32, len: u32) -> Result<bool> {
            Ok(offset + len <= self.locked_from)
        }
    }

    #[test]
    fn test_partly_locked_range_is_refused() {
        let ops = FencedOps {
            ram: RamOps::new(),
            locked_from: 0x8000,
        };
        let mut flash = SpiFlash::bind(Box::new(ops)).unwrap();
        assert_eq!(flash.is_locked(0x7000, 0x2000), Ok(false));

        assert_eq!(flash.write(0x7FFF, &[0, 0]), Err(Error::RegionProtected));
        assert_eq!(flash.erase(0x7000, 0x2000), Err(Error::RegionProtected));
        let mut buf = [0u8; 2];
        flash.read(0x7FFF, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);

        flash.write(0x7FFE, &[0, 0]).unwrap();
        flash.read(0x7FFE, &mut buf).unwrap();
        assert_eq!(buf, [0, 0]);
    }

    #[test]
    fn test_bind_rejects_bad_geometry() {
        let mut ops = RamOps::new();
        ops.info.page_size = 100;
        assert_eq!(
            SpiFlash::bind(Box::new(ops)).unwrap_err(),
            Error::InvalidGeometry
        );
    }

    #[test]
    fn test_range_checks_before_dispatch() {
        let mut flash = SpiFlash::bind(Box::new(RamOps::new())).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(flash.read(0xFFFE, &mut buf), Err(Error::AddressOutOfBounds));
        assert_eq!(flash.write(0x1_0000, &[1]), Err(Error::AddressOutOfBounds));
        assert_eq!(flash.erase(0x1_0000, 0x1000), Err(Error::AddressOutOfBounds));
        assert_eq!(flash.erase(0x800, 0x1000), Err(Error::InvalidAlignment));
    }

    #[test]
    fn test_empty_operations_are_noops() {
        let mut flash = SpiFlash::bind(Box::new(RamOps::new())).unwrap();
        flash.read(0x1_0000, &mut []).unwrap();
        flash.write(0x1_0000, &[]).unwrap();
        flash.erase(0, 0).unwrap();
    }

    #[test]
    fn test_protect_without_locking() {
        let mut flash = SpiFlash::bind(Box::new(RamOps::new())).unwrap();
        assert!(!flash.has_locking());
        assert_eq!(flash.protect(0, 0x1000, true), Err(Error::OperationNotSupported));
        assert_eq!(flash.protect(0, 0x1000, false), Err(Error::OperationNotSupported));
        assert_eq!(flash.is_locked(0, 0x1000), Err(Error::OperationNotSupported));
    }

    #[test]
    fn test_dispatch_round_trip() {
        let mut flash = SpiFlash::bind(Box::new(RamOps::new())).unwrap();
        flash.write(0x10, &[0x12, 0x34]).unwrap();
        let mut buf = [0u8; 3];
        flash.read(0x10, &mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34, 0xFF]);
        assert_eq!(flash.name(), "RAM");
        assert_eq!(flash.current_bank(), None);
        flash.free();
    }
}
