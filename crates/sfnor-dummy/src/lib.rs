//! sfnor-dummy - In-memory SPI NOR emulator for testing
//!
//! [`DummyFlash`] answers the JEDEC command set the flash layer drives:
//! RDID, status and flag-status registers, write enable, 3- and 4-byte
//! reads in every lane arrangement, page program, the three erase sizes and
//! both bank-register dialects. It keeps a log of every transfer so tests
//! can assert on what went over the wire.
//!
//! `DummyFlash` is a cheap handle: clone it before handing it to the flash
//! layer and keep the clone to inspect the chip afterwards.
//!
//! The emulator is strict where real hardware would silently misbehave.
//! Transfers outside a bus claim, frames whose lane arrangement or address
//! width do not match the opcode, quad transfers without QE and commands
//! sent while the chip is busy all fail with `SpiTransferFailed`. Program
//! and erase inside a block-protected region are dropped without an error,
//! as on real parts.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod die;
mod host;

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use sfnor_core::chip::mfr;
use sfnor_core::error::{Error, Result};
use sfnor_core::flash::BANK_SIZE;
use sfnor_core::protocol;
use sfnor_core::spi::{check_protocol_supported, opcodes, AddressWidth, Protocol, SpiCommand, XferFlags};
use sfnor_core::transport::{DualFlash, MemoryMap, SlaveConfig, SpiFeatures, SpiSlave};

use die::Die;
pub use host::DummyHost;

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Extended ID returned in RDID bytes 3 and 4
    pub ext_id: u16,
    /// Size of one chip in bytes
    pub size: usize,
    /// Page size of one chip
    pub page_size: usize,
    /// Size erased by the 64K block erase opcodes
    pub block_size: usize,
    /// Chips behind the chip-select
    pub dual_flash: DualFlash,
    /// Lane arrangements the emulated controller frames
    pub features: SpiFeatures,
    /// Largest read per transfer
    pub max_read_len: usize,
    /// Largest write per transfer
    pub max_write_len: usize,
    /// Status polls reporting busy after each program, erase or register write
    pub busy_polls: u32,
    /// Silently drop program and erase inside the range the BP bits protect
    pub block_protect: bool,
    /// Status register 1 at power-up
    pub initial_sr1: u8,
    /// Expose a memory-mapped window over the first chip
    pub memory_mapped: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: mfr::WINBOND,
            device_id: 0x4018, // W25Q128FV
            ext_id: 0,
            size: 16 * 1024 * 1024,
            page_size: 256,
            block_size: 64 * 1024,
            dual_flash: DualFlash::Single,
            features: SpiFeatures::FOUR_BYTE_ADDR | SpiFeatures::DUAL | SpiFeatures::QUAD,
            max_read_len: 64 * 1024,
            max_write_len: 4096,
            busy_polls: 1,
            block_protect: false,
            initial_sr1: 0,
            memory_mapped: false,
        }
    }
}

impl DummyConfig {
    /// Chip answering `jedec` (manufacturer << 16 | device) with `size` bytes
    pub fn new(jedec: u32, size: usize) -> Self {
        Self {
            manufacturer_id: (jedec >> 16) as u8,
            device_id: jedec as u16,
            size,
            ..Self::default()
        }
    }

    /// Set the extended ID
    pub fn with_ext_id(mut self, ext_id: u16) -> Self {
        self.ext_id = ext_id;
        self
    }

    /// Set the 64K-opcode erase size
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Put two chips behind the chip-select
    pub fn with_dual_flash(mut self, dual_flash: DualFlash) -> Self {
        self.dual_flash = dual_flash;
        self
    }

    /// Set the controller lane arrangements
    pub fn with_features(mut self, features: SpiFeatures) -> Self {
        self.features = features;
        self
    }

    /// Limit reads per transfer
    pub fn with_max_read_len(mut self, len: usize) -> Self {
        self.max_read_len = len;
        self
    }

    /// Limit writes per transfer
    pub fn with_max_write_len(mut self, len: usize) -> Self {
        self.max_write_len = len;
        self
    }

    /// Set how long internal operations stay busy
    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Honour the block-protect bits
    pub fn with_block_protect(mut self) -> Self {
        self.block_protect = true;
        self
    }

    /// Set status register 1 at power-up
    pub fn with_initial_sr1(mut self, sr1: u8) -> Self {
        self.initial_sr1 = sr1;
        self
    }

    /// Expose a memory-mapped window
    pub fn with_memory_map(mut self) -> Self {
        self.memory_mapped = true;
        self
    }

    fn shift(&self) -> u32 {
        match self.dual_flash {
            DualFlash::Parallel => 1,
            _ => 0,
        }
    }

    /// Bytes of the logical address space all chips provide together
    pub fn total_size(&self) -> usize {
        match self.dual_flash {
            DualFlash::Single => self.size,
            DualFlash::Stacked | DualFlash::Parallel => self.size * 2,
        }
    }
}

/// One transfer as the emulator saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Opcode
    pub opcode: u8,
    /// Wire address
    pub address: Option<u32>,
    /// Address width
    pub address_width: AddressWidth,
    /// Lane arrangement
    pub proto: Protocol,
    /// Dummy clock cycles
    pub dummy_cycles: u8,
    /// Controller flags
    pub flags: XferFlags,
    /// Bytes sent after the header
    pub write_data: Vec<u8>,
    /// Bytes requested back
    pub read_len: usize,
}

impl Transfer {
    fn record(cmd: &SpiCommand<'_>) -> Self {
        Self {
            opcode: cmd.opcode,
            address: cmd.address,
            address_width: cmd.address_width,
            proto: cmd.proto,
            dummy_cycles: cmd.dummy_cycles,
            flags: cmd.flags,
            write_data: cmd.write_data.to_vec(),
            read_len: cmd.read_buf.len(),
        }
    }

    /// Returns true if the transfer went to the upper chip of a stacked pair
    pub fn is_upper(&self) -> bool {
        self.flags.contains(XferFlags::UPPER_PAGE)
    }
}

enum Access {
    Read,
    Program,
    Erase(usize),
}

/// Decode an array command into (access, protocol, 4-byte address)
fn decode(opcode: u8, block_size: usize) -> Option<(Access, Protocol, bool)> {
    use Access::*;
    let op = match opcode {
        opcodes::READ | opcodes::FAST_READ => (Read, Protocol::Single, false),
        opcodes::READ_4B | opcodes::FAST_READ_4B => (Read, Protocol::Single, true),
        opcodes::DOR => (Read, Protocol::DualOutput, false),
        opcodes::DOR_4B => (Read, Protocol::DualOutput, true),
        opcodes::DIOR => (Read, Protocol::DualIo, false),
        opcodes::DIOR_4B => (Read, Protocol::DualIo, true),
        opcodes::QOR => (Read, Protocol::QuadOutput, false),
        opcodes::QOR_4B => (Read, Protocol::QuadOutput, true),
        opcodes::QIOR => (Read, Protocol::QuadIo, false),
        opcodes::QIOR_4B => (Read, Protocol::QuadIo, true),
        opcodes::PP => (Program, Protocol::Single, false),
        opcodes::PP_4B => (Program, Protocol::Single, true),
        opcodes::QPP => (Program, Protocol::QuadOutput, false),
        opcodes::QPP_4B => (Program, Protocol::QuadOutput, true),
        opcodes::SE_20 => (Erase(4 * 1024), Protocol::Single, false),
        opcodes::SE_21 => (Erase(4 * 1024), Protocol::Single, true),
        opcodes::BE_52 => (Erase(32 * 1024), Protocol::Single, false),
        opcodes::BE_5C => (Erase(32 * 1024), Protocol::Single, true),
        opcodes::BE_D8 => (Erase(block_size), Protocol::Single, false),
        opcodes::BE_DC => (Erase(block_size), Protocol::Single, true),
        _ => return None,
    };
    Some(op)
}

struct State {
    config: DummyConfig,
    dies: Vec<Die>,
    log: Vec<Transfer>,
    claimed: bool,
    claims: u32,
    releases: u32,
    delayed_us: u64,
    fail_opcode: Option<u8>,
    fail_claim: bool,
    stuck_busy: bool,
    slave_config: Option<SlaveConfig>,
}

impl State {
    fn die_index(&self, flags: XferFlags) -> Result<usize> {
        if !flags.contains(XferFlags::UPPER_PAGE) {
            return Ok(0);
        }
        if self.config.dual_flash == DualFlash::Stacked {
            Ok(1)
        } else {
            log::warn!("upper page selected without a stacked pair");
            Err(Error::SpiTransferFailed)
        }
    }

    /// Logical offset to (die, cell index)
    fn locate(&self, offset: usize) -> (usize, usize) {
        match self.config.dual_flash {
            DualFlash::Stacked if offset >= self.config.size => (1, offset - self.config.size),
            _ => (0, offset),
        }
    }

    fn run(&mut self, die: usize, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let stuck = self.stuck_busy;
        let polls = self.config.busy_polls;
        let manufacturer = self.config.manufacturer_id;
        let (rd_bank, wr_bank) = protocol::bank_opcodes(manufacturer);
        let chip = &mut self.dies[die];

        if chip.is_busy() && !matches!(cmd.opcode, opcodes::RDSR | opcodes::RDFSR) {
            log::warn!("opcode {:#04x} sent while busy", cmd.opcode);
            return Err(Error::SpiTransferFailed);
        }

        match cmd.opcode {
            opcodes::RDID => {
                let [dev_hi, dev_lo] = self.config.device_id.to_be_bytes();
                let [ext_hi, ext_lo] = self.config.ext_id.to_be_bytes();
                let id = [manufacturer, dev_hi, dev_lo, ext_hi, ext_lo];
                cmd.read_buf.fill(0xFF);
                let n = cmd.read_buf.len().min(id.len());
                cmd.read_buf[..n].copy_from_slice(&id[..n]);
                Ok(())
            }
            opcodes::RDSR => {
                let sr = chip.poll_status1(stuck);
                cmd.read_buf.fill(sr);
                Ok(())
            }
            opcodes::RDSR2 => {
                cmd.read_buf.fill(chip.sr2);
                Ok(())
            }
            opcodes::RDFSR => {
                let fsr = chip.poll_flag_status();
                cmd.read_buf.fill(fsr);
                Ok(())
            }
            opcodes::WREN => {
                chip.wel = true;
                Ok(())
            }
            opcodes::WRDI => {
                chip.wel = false;
                Ok(())
            }
            opcodes::WRSR => {
                if chip.wel {
                    chip.write_status(cmd.write_data);
                    chip.start_busy(polls);
                }
                Ok(())
            }
            op if op == rd_bank => {
                cmd.read_buf.fill(chip.bank);
                Ok(())
            }
            op if op == wr_bank => {
                if let Some(&bank) = cmd.write_data.first() {
                    chip.bank = bank;
                }
                chip.start_busy(polls);
                Ok(())
            }
            op => match decode(op, self.config.block_size) {
                Some((access, proto, four_byte)) => self.array(die, access, proto, four_byte, cmd),
                None => {
                    log::warn!("unsupported opcode {:#04x}", op);
                    Err(Error::SpiTransferFailed)
                }
            },
        }
    }

    fn array(
        &mut self,
        die: usize,
        access: Access,
        proto: Protocol,
        four_byte: bool,
        cmd: &mut SpiCommand<'_>,
    ) -> Result<()> {
        let width = if four_byte {
            AddressWidth::FourByte
        } else {
            AddressWidth::ThreeByte
        };
        let Some(addr) = cmd.address.filter(|_| cmd.proto == proto && cmd.address_width == width)
        else {
            log::warn!(
                "opcode {:#04x} framed as {} with {:?} address",
                cmd.opcode,
                cmd.proto,
                cmd.address_width
            );
            return Err(Error::SpiTransferFailed);
        };
        if !four_byte && addr >= BANK_SIZE {
            return Err(Error::SpiTransferFailed);
        }

        let shift = self.config.shift();
        let manufacturer = self.config.manufacturer_id;
        let page = self.config.page_size << shift;
        let polls = self.config.busy_polls;
        let protect = self.config.block_protect;
        let banked = !four_byte && self.config.size > BANK_SIZE as usize;
        let chip = &mut self.dies[die];

        if proto.requires_quad() && !chip.quad_enabled(manufacturer) {
            log::warn!("quad transfer {:#04x} without QE", cmd.opcode);
            return Err(Error::SpiTransferFailed);
        }

        let mut wire = addr as usize;
        if banked {
            wire |= (chip.bank as usize) << 24;
        }
        let start = wire << shift;

        match access {
            Access::Read => {
                if start + cmd.read_buf.len() > chip.len() {
                    return Err(Error::AddressOutOfBounds);
                }
                chip.read(start, cmd.read_buf);
                Ok(())
            }
            Access::Program => {
                if start + cmd.write_data.len() > chip.len() {
                    return Err(Error::AddressOutOfBounds);
                }
                if !chip.wel {
                    return Ok(());
                }
                if protect && chip.overlaps_protected(start, cmd.write_data.len()) {
                    log::warn!("program at {:#x} ignored, region is protected", start);
                    chip.wel = false;
                    return Ok(());
                }
                chip.program(start, cmd.write_data, page);
                chip.start_busy(polls);
                Ok(())
            }
            Access::Erase(unit) => {
                let unit = unit << shift;
                if start >= chip.len() {
                    return Err(Error::AddressOutOfBounds);
                }
                if !chip.wel {
                    return Ok(());
                }
                if protect && chip.overlaps_protected(start - start % unit, unit) {
                    log::warn!("erase at {:#x} ignored, region is protected", start);
                    chip.wel = false;
                    return Ok(());
                }
                chip.erase(start, unit);
                chip.start_busy(polls);
                Ok(())
            }
        }
    }
}

/// Dummy flash chip(s) behind one chip-select
///
/// Clones share the same chip state.
#[derive(Clone)]
pub struct DummyFlash(Rc<RefCell<State>>);

impl DummyFlash {
    /// Create an erased chip (or pair) with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let dies = match config.dual_flash {
            DualFlash::Single => vec![Die::new(config.size, config.initial_sr1)],
            DualFlash::Stacked => vec![
                Die::new(config.size, config.initial_sr1),
                Die::new(config.size, config.initial_sr1),
            ],
            DualFlash::Parallel => vec![Die::new(config.size * 2, config.initial_sr1)],
        };
        Self(Rc::new(RefCell::new(State {
            config,
            dies,
            log: Vec::new(),
            claimed: false,
            claims: 0,
            releases: 0,
            delayed_us: 0,
            fail_opcode: None,
            fail_claim: false,
            stuck_busy: false,
            slave_config: None,
        })))
    }

    /// Create a dummy flash with default configuration (W25Q128FV)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> DummyConfig {
        self.0.borrow().config.clone()
    }

    /// Fill cells from logical `offset` with `data`, bypassing the command set
    pub fn load(&self, offset: usize, data: &[u8]) {
        let state = self.0.borrow();
        let mut done = 0;
        while done < data.len() {
            let (die, at) = state.locate(offset + done);
            let n = (data.len() - done).min(state.dies[die].len() - at);
            state.dies[die].load(at, &data[done..done + n]);
            done += n;
        }
    }

    /// Copy `len` bytes from logical `offset` out of the cells
    pub fn contents(&self, offset: usize, len: usize) -> Vec<u8> {
        let state = self.0.borrow();
        let mut out = vec![0u8; len];
        let mut done = 0;
        while done < len {
            let (die, at) = state.locate(offset + done);
            let n = (len - done).min(state.dies[die].len() - at);
            state.dies[die].read(at, &mut out[done..done + n]);
            done += n;
        }
        out
    }

    /// Status register 1 of the lower (`false`) or upper chip
    pub fn status1(&self, upper: bool) -> u8 {
        self.0.borrow().dies[upper as usize].sr1
    }

    /// Status register 2 of the lower (`false`) or upper chip
    pub fn status2(&self, upper: bool) -> u8 {
        self.0.borrow().dies[upper as usize].sr2
    }

    /// Overwrite status register 1, bypassing the write enable latch
    pub fn set_status1(&self, upper: bool, sr1: u8) {
        self.0.borrow_mut().dies[upper as usize].write_status(&[sr1]);
    }

    /// Overwrite status register 2, bypassing the write enable latch
    pub fn set_status2(&self, upper: bool, sr2: u8) {
        self.0.borrow_mut().dies[upper as usize].sr2 = sr2;
    }

    /// Bank register of the lower (`false`) or upper chip
    pub fn bank(&self, upper: bool) -> u8 {
        self.0.borrow().dies[upper as usize].bank
    }

    /// Preset the bank register, as a previous boot stage might leave it
    pub fn set_bank(&self, upper: bool, bank: u8) {
        self.0.borrow_mut().dies[upper as usize].bank = bank;
    }

    /// Every transfer since creation or the last [`clear_transfers`](Self::clear_transfers)
    pub fn transfers(&self) -> Vec<Transfer> {
        self.0.borrow().log.clone()
    }

    /// Opcodes of [`transfers`](Self::transfers), in order
    pub fn opcodes(&self) -> Vec<u8> {
        self.0.borrow().log.iter().map(|t| t.opcode).collect()
    }

    /// Forget the transfer log
    pub fn clear_transfers(&self) {
        self.0.borrow_mut().log.clear();
    }

    /// Number of successful bus claims
    pub fn claims(&self) -> u32 {
        self.0.borrow().claims
    }

    /// Number of bus releases
    pub fn releases(&self) -> u32 {
        self.0.borrow().releases
    }

    /// Returns true while the bus is claimed
    pub fn is_claimed(&self) -> bool {
        self.0.borrow().claimed
    }

    /// Total time spent in `delay_us`
    pub fn delayed_us(&self) -> u64 {
        self.0.borrow().delayed_us
    }

    /// Fail every transfer carrying `opcode`
    pub fn fail_on(&self, opcode: Option<u8>) {
        self.0.borrow_mut().fail_opcode = opcode;
    }

    /// Fail bus claims
    pub fn set_claim_fails(&self, fail: bool) {
        self.0.borrow_mut().fail_claim = fail;
    }

    /// Keep WIP set forever
    pub fn set_stuck_busy(&self, stuck: bool) {
        self.0.borrow_mut().stuck_busy = stuck;
    }

    /// Configuration the host last set this slave up with
    pub fn slave_config(&self) -> Option<SlaveConfig> {
        self.0.borrow().slave_config
    }

    pub(crate) fn set_slave_config(&self, config: SlaveConfig) {
        self.0.borrow_mut().slave_config = Some(config);
    }
}

impl core::fmt::Debug for DummyFlash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("DummyFlash")
            .field("config", &state.config)
            .field("transfers", &state.log.len())
            .finish_non_exhaustive()
    }
}

impl SpiSlave for DummyFlash {
    fn features(&self) -> SpiFeatures {
        self.0.borrow().config.features
    }

    fn max_read_len(&self) -> usize {
        self.0.borrow().config.max_read_len
    }

    fn max_write_len(&self) -> usize {
        self.0.borrow().config.max_write_len
    }

    fn claim_bus(&mut self) -> Result<()> {
        let mut state = self.0.borrow_mut();
        if state.fail_claim || state.claimed {
            return Err(Error::BusClaimFailed);
        }
        state.claimed = true;
        state.claims += 1;
        Ok(())
    }

    fn release_bus(&mut self) {
        let mut state = self.0.borrow_mut();
        state.claimed = false;
        state.releases += 1;
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.log.push(Transfer::record(cmd));

        if !state.claimed {
            log::warn!("opcode {:#04x} sent without claiming the bus", cmd.opcode);
            return Err(Error::SpiTransferFailed);
        }
        if state.fail_opcode == Some(cmd.opcode) {
            return Err(Error::SpiTransferFailed);
        }
        check_protocol_supported(cmd.proto, state.config.features)?;

        let die = state.die_index(cmd.flags)?;
        state.run(die, cmd)
    }

    fn memory_map(&self) -> Option<MemoryMap> {
        let state = self.0.borrow();
        state
            .config
            .memory_mapped
            .then(|| state.dies[0].memory_map())
    }

    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().delayed_us += us as u64;
    }
}
