//! Flash descriptor record

use crate::chip::{chip_name, ChipName, Features};
use crate::error::{Error, Result};
use crate::spi::{opcodes, AddressWidth, Protocol};
use crate::transport::{DualFlash, MemoryMap};

/// Bytes addressable with a 3-byte address, and the size of one bank
pub const BANK_SIZE: u32 = 16 * 1024 * 1024;

/// Opcodes of the bank register on parts using it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankCmds {
    /// Bank register read opcode
    pub read_cmd: u8,
    /// Bank register write opcode
    pub write_cmd: u8,
}

/// Identity, geometry and wire parameters of a bound flash
///
/// All offsets and sizes are in the logical address space the caller sees.
/// On a dual-parallel pair page, sector and erase sizes already cover both
/// chips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashInfo {
    /// Chip name
    pub name: ChipName,
    /// Topology behind the chip-select
    pub dual_flash: DualFlash,
    /// Address shift applied on the wire (1 on dual-parallel pairs)
    pub shift: u8,
    /// Chip quirks
    pub flags: Features,
    /// Total capacity in bytes
    pub size: u32,
    /// Program granularity in bytes
    pub page_size: u32,
    /// Smallest erasable unit in bytes
    pub sector_size: u32,
    /// Unit used by erase
    pub erase_size: u32,
    /// Address bytes carried on the wire
    pub addr_width: AddressWidth,
    /// Bank register opcodes, present on large parts addressed with 3 bytes
    pub bank_cmds: Option<BankCmds>,
    /// Erase opcode
    pub erase_cmd: u8,
    /// Read opcode
    pub read_cmd: u8,
    /// Program opcode
    pub write_cmd: u8,
    /// Dummy bytes between address and data on reads
    pub dummy_byte: u8,
    /// Lanes for register commands
    pub reg_proto: Protocol,
    /// Lanes for reads
    pub read_proto: Protocol,
    /// Lanes for programs
    pub write_proto: Protocol,
    /// Lanes for erases
    pub erase_proto: Protocol,
    /// Read-only window over the flash, if mapped
    pub memory_map: Option<MemoryMap>,
}

impl FlashInfo {
    /// Plain single-lane descriptor for one chip
    ///
    /// Uses READ (0x03), PP (0x02) and 4 KiB erase (0x20) on 1-1-1 with
    /// 3-byte addresses and no dummy bytes. Adjust the public fields for
    /// anything else.
    pub fn new(name: &str, size: u32, page_size: u32, erase_size: u32) -> Self {
        Self {
            name: chip_name(name),
            dual_flash: DualFlash::Single,
            shift: 0,
            flags: Features::empty(),
            size,
            page_size,
            sector_size: erase_size,
            erase_size,
            addr_width: AddressWidth::ThreeByte,
            bank_cmds: None,
            erase_cmd: opcodes::SE_20,
            read_cmd: opcodes::READ,
            write_cmd: opcodes::PP,
            dummy_byte: 0,
            reg_proto: Protocol::Single,
            read_proto: Protocol::Single,
            write_proto: Protocol::Single,
            erase_proto: Protocol::Single,
            memory_map: None,
        }
    }

    /// Check the geometry and addressing invariants
    ///
    /// # Errors
    /// * `InvalidGeometry` - Sizes are zero, not powers of two, do not nest
    ///   (page in sector in erase unit), or a large 3-byte part lacks banking
    pub fn validate(&self) -> Result<()> {
        let pow2 = |v: u32| v != 0 && v.is_power_of_two();
        if self.size == 0
            || !pow2(self.page_size)
            || !pow2(self.sector_size)
            || !pow2(self.erase_size)
        {
            return Err(Error::InvalidGeometry);
        }
        if self.sector_size % self.page_size != 0
            || self.erase_size % self.sector_size != 0
            || self.size % self.erase_size != 0
        {
            return Err(Error::InvalidGeometry);
        }
        if self.addr_width == AddressWidth::None {
            return Err(Error::InvalidGeometry);
        }
        if self.addr_width == AddressWidth::ThreeByte
            && self.size > BANK_SIZE
            && self.bank_cmds.is_none()
        {
            return Err(Error::InvalidGeometry);
        }
        let expected_shift = match self.dual_flash {
            DualFlash::Parallel => 1,
            _ => 0,
        };
        if self.shift != expected_shift {
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }

    /// Check that `[offset, offset + len)` lies within the flash
    pub fn check_range(&self, offset: u32, len: usize) -> Result<()> {
        if offset as u64 + len as u64 > self.size as u64 {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(())
    }

    /// Check that `offset` and `len` are both multiples of the erase size
    pub fn check_erase_alignment(&self, offset: u32, len: u32) -> Result<()> {
        if offset % self.erase_size != 0 || len % self.erase_size != 0 {
            return Err(Error::InvalidAlignment);
        }
        Ok(())
    }

    /// Returns true if bank switching is in effect
    pub fn is_banked(&self) -> bool {
        self.bank_cmds.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_descriptor_is_valid() {
        let info = FlashInfo::new("TEST", 0x100_0000, 256, 4096);
        info.validate().unwrap();
        assert_eq!(info.read_cmd, 0x03);
        assert_eq!(info.write_cmd, 0x02);
        assert_eq!(info.erase_cmd, 0x20);
        assert_eq!(info.addr_width.bytes(), 3);
    }

    #[test]
    fn test_geometry_must_nest() {
        let mut info = FlashInfo::new("TEST", 0x10_0000, 256, 4096);
        info.page_size = 8192;
        assert_eq!(info.validate(), Err(Error::InvalidGeometry));

        let mut info = FlashInfo::new("TEST", 0x10_0000, 256, 4096);
        info.sector_size = 65536;
        assert_eq!(info.validate(), Err(Error::InvalidGeometry));

        let info = FlashInfo::new("TEST", 0x10_0000, 256, 3000);
        assert_eq!(info.validate(), Err(Error::InvalidGeometry));
    }

    #[test]
    fn test_large_3byte_part_needs_banking() {
        let mut info = FlashInfo::new("BIG", 0x200_0000, 256, 4096);
        assert_eq!(info.validate(), Err(Error::InvalidGeometry));

        info.bank_cmds = Some(BankCmds {
            read_cmd: opcodes::BRRD,
            write_cmd: opcodes::BRWR,
        });
        info.validate().unwrap();

        info.bank_cmds = None;
        info.addr_width = AddressWidth::FourByte;
        info.validate().unwrap();
    }

    #[test]
    fn test_parallel_needs_shift() {
        let mut info = FlashInfo::new("PAIR", 0x20_0000, 512, 8192);
        info.dual_flash = DualFlash::Parallel;
        assert_eq!(info.validate(), Err(Error::InvalidGeometry));
        info.shift = 1;
        info.validate().unwrap();
    }

    #[test]
    fn test_range_and_alignment() {
        let info = FlashInfo::new("TEST", 0x10_0000, 256, 4096);
        info.check_range(0, 0x10_0000).unwrap();
        info.check_range(0x10_0000, 0).unwrap();
        assert_eq!(info.check_range(0xF_FFFF, 2), Err(Error::AddressOutOfBounds));
        assert_eq!(info.check_range(u32::MAX, 1), Err(Error::AddressOutOfBounds));

        info.check_erase_alignment(0x1000, 0x2000).unwrap();
        assert_eq!(info.check_erase_alignment(0x0800, 0x2000), Err(Error::InvalidAlignment));
        assert_eq!(info.check_erase_alignment(0x0801, 0x1000), Err(Error::InvalidAlignment));
        assert_eq!(info.check_erase_alignment(0x1000, 0x0800), Err(Error::InvalidAlignment));
    }
}
