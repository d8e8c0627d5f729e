//! Generic SPI NOR operations
//!
//! [`SpiNorOps`] drives any JEDEC-style NOR part through a [`SpiSlave`]
//! using the opcodes, protocols and geometry recorded in its [`FlashInfo`].
//! It takes care of:
//!
//! - splitting programs at page boundaries
//! - bank register switching on large parts addressed with 3 bytes
//! - routing to the upper chip of a dual-stacked pair
//! - the address shift of a dual-parallel pair, widening odd offsets and
//!   lengths to whole byte pairs
//! - status polling after program, erase and register writes
//!
//! Every logical operation claims the bus once and releases it when done,
//! also on failure.

use alloc::vec;

use super::bank::Bank;
use super::info::{FlashInfo, BANK_SIZE};
use super::lock;
use super::ops::{FlashLocking, FlashOps};
use crate::chip::Features;
use crate::error::Result;
use crate::protocol::{self, RegAccess};
use crate::spi::{SpiCommand, XferFlags};
use crate::transport::{DualFlash, SpiSlave};

/// Page program timeout (2 s)
pub const PROG_TIMEOUT_US: u32 = 2_000_000;
/// Erase timeout (5 s)
pub const ERASE_TIMEOUT_US: u32 = 5_000_000;
/// Status and bank register write timeout (500 ms)
pub const STATUS_WRITE_TIMEOUT_US: u32 = 500_000;

/// Polling limits per operation family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Give up on a page program after this long
    pub program_us: u32,
    /// Delay between status polls while programming
    pub program_poll_us: u32,
    /// Give up on an erase after this long
    pub erase_us: u32,
    /// Delay between status polls while erasing
    pub erase_poll_us: u32,
    /// Give up on a register write after this long
    pub status_write_us: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            program_us: PROG_TIMEOUT_US,
            program_poll_us: 10,
            erase_us: ERASE_TIMEOUT_US,
            erase_poll_us: 1_000,
            status_write_us: STATUS_WRITE_TIMEOUT_US,
        }
    }
}

/// Flash operations over a SPI slave
pub struct SpiNorOps<S: SpiSlave> {
    slave: S,
    info: FlashInfo,
    bank: Option<Bank>,
    timeouts: Timeouts,
}

impl<S: SpiSlave> SpiNorOps<S> {
    /// Bind a slave to an already known descriptor, without probing
    ///
    /// Bank state, if any, starts at bank 0.
    ///
    /// # Errors
    /// * `InvalidGeometry` - If `info` fails [`FlashInfo::validate`]
    pub fn new(slave: S, info: FlashInfo) -> Result<Self> {
        info.validate()?;
        let bank = info.bank_cmds.map(|cmds| Bank::new(cmds, info.shift, [0, 0]));
        Ok(Self::from_parts(slave, info, bank))
    }

    pub(crate) fn from_parts(slave: S, info: FlashInfo, bank: Option<Bank>) -> Self {
        Self {
            slave,
            info,
            bank,
            timeouts: Timeouts::default(),
        }
    }

    /// Override the polling limits
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Current polling limits
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    fn reg(&self, upper: bool) -> RegAccess {
        RegAccess {
            proto: self.info.reg_proto,
            flags: die_flags(upper),
        }
    }

    fn die_size(&self) -> u32 {
        match self.info.dual_flash {
            DualFlash::Stacked => self.info.size / 2,
            _ => self.info.size,
        }
    }

    /// Split a logical offset into (die-local offset, upper die)
    fn route(&self, offset: u32) -> (u32, bool) {
        let half = self.info.size / 2;
        if self.info.dual_flash == DualFlash::Stacked && offset >= half {
            (offset - half, true)
        } else {
            (offset, false)
        }
    }

    /// Bytes addressed by one wire address: 2 on a parallel pair, else 1
    fn granule(&self) -> usize {
        1 << self.info.shift
    }

    /// Whole-granule span `(start, len)` enclosing `[offset, offset + len)`,
    /// or `None` if the range is already aligned
    fn widen(&self, offset: u32, len: usize) -> Option<(u32, usize)> {
        let mask = self.granule() - 1;
        if offset as usize & mask == 0 && len & mask == 0 {
            return None;
        }
        let start = offset & !(mask as u32);
        let end = (offset as usize + len + mask) & !mask;
        Some((start, end - start as usize))
    }

    /// Controller transfer limit rounded down to whole granules
    fn chunk_max(&self, max_len: usize) -> usize {
        let granule = self.granule();
        (max_len & !(granule - 1)).max(granule)
    }

    /// Address put on the wire for a die-local offset
    fn wire_addr(&self, local: u32) -> u32 {
        let addr = local >> self.info.shift;
        if self.bank.is_some() {
            addr & (BANK_SIZE - 1)
        } else {
            addr
        }
    }

    /// Bytes from `local` before the die or bank ends
    fn chunk_limit(&self, local: u32) -> u32 {
        let mut limit = self.die_size() - local;
        if let Some(bank) = &self.bank {
            limit = limit.min(bank.remaining(local));
        }
        limit
    }

    fn select_bank(&mut self, local: u32, upper: bool) -> Result<()> {
        let Some(mut bank) = self.bank else {
            return Ok(());
        };
        let Some(sel) = bank.switch_for(local, upper) else {
            return Ok(());
        };

        log::debug!("switching to bank {} (upper die: {})", sel, upper);
        let reg = self.reg(upper);
        protocol::write_register(
            &mut self.slave,
            reg,
            bank.cmds().write_cmd,
            &[sel],
            self.timeouts.status_write_us,
        )?;
        bank.set(upper, sel);
        self.bank = Some(bank);
        Ok(())
    }

    fn wait_ready(&mut self, upper: bool, poll_us: u32, timeout_us: u32) -> Result<()> {
        let reg = self.reg(upper);
        let fsr = self.info.flags.contains(Features::E_FSR);
        protocol::wait_ready(&mut self.slave, reg, fsr, poll_us, timeout_us)
    }

    /// Run `f` with the bus claimed, releasing it afterwards
    fn with_bus<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.slave.claim_bus()?;
        let result = f(self);
        self.slave.release_bus();
        result
    }
}

fn die_flags(upper: bool) -> XferFlags {
    if upper {
        XferFlags::UPPER_PAGE
    } else {
        XferFlags::empty()
    }
}

impl<S: SpiSlave> FlashOps for SpiNorOps<S> {
    fn info(&self) -> &FlashInfo {
        &self.info
    }

    fn read_reg(&mut self, opcode: u8, buf: &mut [u8]) -> Result<()> {
        let proto = self.info.reg_proto;
        self.with_bus(|this| {
            let mut cmd = SpiCommand::read_reg(opcode, buf).with_proto(proto);
            this.slave.execute(&mut cmd)
        })
    }

    fn write_reg(&mut self, opcode: u8, data: &[u8]) -> Result<()> {
        let proto = self.info.reg_proto;
        self.with_bus(|this| {
            let mut cmd = SpiCommand::write_reg(opcode, data).with_proto(proto);
            this.slave.execute(&mut cmd)
        })
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        if let Some(map) = self.info.memory_map.filter(|m| m.covers(offset, buf.len())) {
            return self.with_bus(|_| map.copy_to(offset, buf));
        }

        if let Some((start, len)) = self.widen(offset, buf.len()) {
            let mut span = vec![0u8; len];
            self.read(start, &mut span)?;
            let skip = (offset - start) as usize;
            buf.copy_from_slice(&span[skip..skip + buf.len()]);
            return Ok(());
        }

        let max_len = self.chunk_max(self.slave.max_read_len());
        self.with_bus(|this| {
            let mut done = 0;
            while done < buf.len() {
                let (local, upper) = this.route(offset + done as u32);
                this.select_bank(local, upper)?;

                let len = (buf.len() - done)
                    .min(this.chunk_limit(local) as usize)
                    .min(max_len);
                let mut cmd = SpiCommand::read(
                    this.info.read_cmd,
                    this.wire_addr(local),
                    this.info.addr_width,
                    &mut buf[done..done + len],
                )
                .with_proto(this.info.read_proto)
                .with_dummy_cycles(this.info.dummy_byte * 8)
                .with_flags(die_flags(upper));
                this.slave.execute(&mut cmd)?;

                done += len;
            }
            Ok(())
        })
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        // Programming 0xFF leaves a cell as it was
        if let Some((start, len)) = self.widen(offset, data.len()) {
            let mut span = vec![0xFF; len];
            let skip = (offset - start) as usize;
            span[skip..skip + data.len()].copy_from_slice(data);
            return self.write(start, &span);
        }

        let max_len = self.chunk_max(self.slave.max_write_len());
        let page_size = self.info.page_size;
        self.with_bus(|this| {
            let mut done = 0;
            while done < data.len() {
                let (local, upper) = this.route(offset + done as u32);
                this.select_bank(local, upper)?;

                let page_left = page_size - local % page_size;
                let len = (data.len() - done)
                    .min(page_left as usize)
                    .min(this.chunk_limit(local) as usize)
                    .min(max_len);

                let reg = this.reg(upper);
                protocol::write_enable(&mut this.slave, reg)?;
                let mut cmd = SpiCommand::program(
                    this.info.write_cmd,
                    this.wire_addr(local),
                    this.info.addr_width,
                    &data[done..done + len],
                )
                .with_proto(this.info.write_proto)
                .with_flags(die_flags(upper));
                this.slave.execute(&mut cmd)?;

                let t = this.timeouts;
                this.wait_ready(upper, t.program_poll_us, t.program_us)?;
                done += len;
            }
            log::trace!("programmed {} bytes at {:#x}", data.len(), offset);
            Ok(())
        })
    }

    fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        let erase_size = self.info.erase_size;
        self.with_bus(|this| {
            let mut done = 0;
            while done < len {
                let (local, upper) = this.route(offset + done);
                this.select_bank(local, upper)?;

                let reg = this.reg(upper);
                protocol::write_enable(&mut this.slave, reg)?;
                let mut cmd = SpiCommand::erase(
                    this.info.erase_cmd,
                    this.wire_addr(local),
                    this.info.addr_width,
                )
                .with_proto(this.info.erase_proto)
                .with_flags(die_flags(upper));
                this.slave.execute(&mut cmd)?;

                let t = this.timeouts;
                this.wait_ready(upper, t.erase_poll_us, t.erase_us)?;
                done += erase_size;
            }
            log::debug!("erased {:#x} bytes at {:#x}", len, offset);
            Ok(())
        })
    }

    fn current_bank(&self) -> Option<u8> {
        self.bank.map(|b| b.current(false))
    }

    fn locking(&mut self) -> Option<&mut dyn FlashLocking> {
        let bp = self.info.flags.contains(Features::LOCK_BP)
            && self.info.dual_flash == DualFlash::Single;
        if bp {
            Some(self)
        } else {
            None
        }
    }
}

impl<S: SpiSlave> FlashLocking for SpiNorOps<S> {
    fn lock(&mut self, offset: u32, len: u32) -> Result<()> {
        let size = self.info.size;
        self.with_bus(|this| {
            let reg = this.reg(false);
            let sr = protocol::read_status1(&mut this.slave, reg)?;
            match lock::lock_sr(size, offset, len, sr) {
                Ok(Some(new)) => {
                    log::debug!("status register {:#04x} -> {:#04x}", sr, new);
                    let timeout = this.timeouts.status_write_us;
                    protocol::write_status1(&mut this.slave, reg, new, timeout)
                }
                Ok(None) => Ok(()),
                Err(e) => {
                    log::warn!("cannot lock {:#x}+{:#x} with SR {:#04x}", offset, len, sr);
                    Err(e)
                }
            }
        })
    }

    fn unlock(&mut self, offset: u32, len: u32) -> Result<()> {
        let size = self.info.size;
        let erase_size = self.info.erase_size;
        self.with_bus(|this| {
            let reg = this.reg(false);
            let sr = protocol::read_status1(&mut this.slave, reg)?;
            match lock::unlock_sr(size, erase_size, offset, len, sr) {
                Ok(Some(new)) => {
                    log::debug!("status register {:#04x} -> {:#04x}", sr, new);
                    let timeout = this.timeouts.status_write_us;
                    protocol::write_status1(&mut this.slave, reg, new, timeout)
                }
                Ok(None) => Ok(()),
                Err(e) => {
                    log::warn!("cannot unlock {:#x}+{:#x} with SR {:#04x}", offset, len, sr);
                    Err(e)
                }
            }
        })
    }

    fn is_locked(&mut self, offset: u32, len: u32) -> Result<bool> {
        let size = self.info.size;
        self.with_bus(|this| {
            let reg = this.reg(false);
            let sr = protocol::read_status1(&mut this.slave, reg)?;
            Ok(lock::is_locked_sr(size, offset, len, sr))
        })
    }

    fn is_unlocked(&mut self, offset: u32, len: u32) -> Result<bool> {
        let size = self.info.size;
        self.with_bus(|this| {
            let reg = this.reg(false);
            let sr = protocol::read_status1(&mut this.slave, reg)?;
            Ok(lock::is_unlocked_sr(size, offset, len, sr))
        })
    }
}

impl<S: SpiSlave> core::fmt::Debug for SpiNorOps<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpiNorOps")
            .field("info", &self.info)
            .field("bank", &self.bank)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::info::BankCmds;
    use crate::spi::opcodes;
    use crate::transport::SpiFeatures;

    struct NullSlave;

    impl SpiSlave for NullSlave {
        fn features(&self) -> SpiFeatures {
            SpiFeatures::empty()
        }

        fn max_read_len(&self) -> usize {
            usize::MAX
        }

        fn max_write_len(&self) -> usize {
            usize::MAX
        }

        fn execute(&mut self, _cmd: &mut SpiCommand<'_>) -> Result<()> {
            Ok(())
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    fn banked(size: u32) -> FlashInfo {
        let mut info = FlashInfo::new("BANKED", size, 256, 4096);
        info.bank_cmds = Some(BankCmds {
            read_cmd: opcodes::BRRD,
            write_cmd: opcodes::BRWR,
        });
        info
    }

    #[test]
    fn test_stacked_routing() {
        let mut info = FlashInfo::new("STACK", 0x20_0000, 256, 4096);
        info.dual_flash = DualFlash::Stacked;
        let ops = SpiNorOps::new(NullSlave, info).unwrap();

        assert_eq!(ops.route(0x0F_FFFF), (0x0F_FFFF, false));
        assert_eq!(ops.route(0x10_0000), (0, true));
        assert_eq!(ops.chunk_limit(0x0F_FF00), 0x100);
    }

    #[test]
    fn test_parallel_wire_address() {
        let mut info = FlashInfo::new("PAIR", 0x20_0000, 512, 8192);
        info.dual_flash = DualFlash::Parallel;
        info.shift = 1;
        let ops = SpiNorOps::new(NullSlave, info).unwrap();

        assert_eq!(ops.route(0x1000), (0x1000, false));
        assert_eq!(ops.wire_addr(0x1000), 0x800);
    }

    #[test]
    fn test_parallel_widening() {
        let mut info = FlashInfo::new("PAIR", 0x20_0000, 512, 8192);
        info.dual_flash = DualFlash::Parallel;
        info.shift = 1;
        let ops = SpiNorOps::new(NullSlave, info).unwrap();

        assert_eq!(ops.widen(0x1000, 4), None);
        assert_eq!(ops.widen(0x1001, 4), Some((0x1000, 6)));
        assert_eq!(ops.widen(0x1000, 3), Some((0x1000, 4)));
        assert_eq!(ops.widen(0x1001, 1), Some((0x1000, 2)));
        assert_eq!(ops.chunk_max(63), 62);
        assert_eq!(ops.chunk_max(1), 2);

        let single = SpiNorOps::new(NullSlave, FlashInfo::new("ONE", 0x10_0000, 256, 4096)).unwrap();
        assert_eq!(single.widen(0x1001, 3), None);
        assert_eq!(single.chunk_max(63), 63);
    }

    #[test]
    fn test_banked_wire_address_and_limit() {
        let ops = SpiNorOps::new(NullSlave, banked(0x200_0000)).unwrap();
        assert_eq!(ops.wire_addr(0x0100_0010), 0x10);
        assert_eq!(ops.chunk_limit(0x00FF_FFF8), 8);
        assert_eq!(ops.current_bank(), Some(0));
    }

    #[test]
    fn test_locking_only_with_bp_flag() {
        let mut ops = SpiNorOps::new(NullSlave, FlashInfo::new("PLAIN", 0x10_0000, 256, 4096)).unwrap();
        assert!(ops.locking().is_none());

        let mut info = FlashInfo::new("BP", 0x10_0000, 256, 65536);
        info.flags = Features::LOCK_BP;
        let mut ops = SpiNorOps::new(NullSlave, info).unwrap();
        assert!(ops.locking().is_some());
    }
}
