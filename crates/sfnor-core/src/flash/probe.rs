//! Probing
//!
//! Probing acquires a slave, reads its JEDEC id, looks the part up and fills
//! in every descriptor field: geometry for the configured topology, erase,
//! read and program opcodes, the protocols the controller and wiring allow,
//! 4-byte addressing or banking for large parts, and the memory map.

use alloc::boxed::Box;

use super::bank::Bank;
use super::descriptor::SpiFlash;
use super::info::{BankCmds, FlashInfo, BANK_SIZE};
use super::registry::DriverRegistry;
use super::spi_nor::{SpiNorOps, STATUS_WRITE_TIMEOUT_US};
use crate::chip::{mfr, ChipDatabase, FlashChip, Features};
use crate::error::{Error, ErrorKind, Result};
use crate::protocol::{self, RegAccess};
use crate::spi::{check_protocol_supported, opcodes, AddressWidth, Protocol, XferFlags};
use crate::transport::{DualFlash, SlaveConfig, SlaveNode, SpiFeatures, SpiHost, SpiMode, SpiSlave};

/// Set up the slave described by `config` and probe it
///
/// # Errors
/// * `SlaveUnavailable` - If the host has no slave at those coordinates
/// * `TransportUnavailable` - If the slave cannot be claimed or talked to
/// * `ChipNotFound` - If the JEDEC id is not in `db`
/// * `QuadEnableFailed` - If a quad protocol was chosen but QE could not be set
pub fn probe<H: SpiHost>(host: &mut H, config: &SlaveConfig, db: &ChipDatabase) -> Result<SpiFlash>
where
    H::Slave: 'static,
{
    let slave = host.setup_slave(config)?;
    let ops = probe_slave(slave, config, db)?;
    SpiFlash::bind(Box::new(ops))
}

/// Probe the slave a device-tree style node describes
///
/// Uses a registry holding the built-in drivers.
///
/// # Errors
/// * `NoDriver` - If no built-in driver serves `node.compatible`
/// * Any error of [`probe`]
pub fn probe_node<H: SpiHost>(host: &mut H, node: &SlaveNode, db: &ChipDatabase) -> Result<SpiFlash>
where
    H::Slave: 'static,
{
    DriverRegistry::with_defaults().probe_node(host, node, db)
}

/// Identify the chip behind an already set up slave
///
/// The slave is dropped on failure. Transfer and bus-claim failures come
/// back as `TransportUnavailable`.
pub fn probe_slave<S: SpiSlave>(
    mut slave: S,
    config: &SlaveConfig,
    db: &ChipDatabase,
) -> Result<SpiNorOps<S>> {
    slave.claim_bus().map_err(unavailable)?;
    let result = identify(&mut slave, config, db);
    slave.release_bus();
    let (info, bank) = result.map_err(unavailable)?;

    log::info!(
        "detected {} with page size {}, erase size {}, total {} bytes",
        info.name,
        info.page_size,
        info.erase_size,
        info.size
    );
    Ok(SpiNorOps::from_parts(slave, info, bank))
}

/// Transport failures while probing mean the slave is not usable
fn unavailable(err: Error) -> Error {
    if err.kind() == ErrorKind::Transport {
        log::warn!("probe failed: {}", err);
        Error::TransportUnavailable
    } else {
        err
    }
}

fn die_flags(upper: bool) -> XferFlags {
    if upper {
        XferFlags::UPPER_PAGE
    } else {
        XferFlags::empty()
    }
}

fn identify<S: SpiSlave>(
    slave: &mut S,
    config: &SlaveConfig,
    db: &ChipDatabase,
) -> Result<(FlashInfo, Option<Bank>)> {
    let reg = RegAccess::default();

    let id = protocol::read_jedec_id(slave, reg)?;
    let chip = db.find_by_id(&id).ok_or(Error::ChipNotFound {
        manufacturer: id[0],
        device: u16::from_be_bytes([id[1], id[2]]),
    })?;
    log::debug!("JEDEC id {:02X?} is {}", id, chip.name);

    let manufacturer = chip.manufacturer_id;
    let dies: &[bool] = match config.dual_flash {
        DualFlash::Stacked => &[false, true],
        _ => &[false],
    };

    // Atmel, Macronix and SST parts power up with every block protected
    if matches!(manufacturer, mfr::ATMEL | mfr::MACRONIX | mfr::SST) {
        for &upper in dies {
            protocol::write_status1(
                slave,
                reg.with_flags(die_flags(upper)),
                0,
                STATUS_WRITE_TIMEOUT_US,
            )?;
        }
    }

    let mut info = geometry(chip, config.dual_flash)?;

    let features = slave.features();
    let (read_cmd, read_proto) = select_read(chip.features, features, config.mode);
    let (write_cmd, write_proto) = select_write(chip.features, features, config.mode);
    info.read_cmd = read_cmd;
    info.read_proto = read_proto;
    info.dummy_byte = match read_cmd {
        opcodes::READ => 0,
        opcodes::QIOR => 2,
        _ => 1,
    };
    info.write_cmd = write_cmd;
    info.write_proto = write_proto;

    if read_proto.requires_quad() || write_proto.requires_quad() {
        for &upper in dies {
            protocol::set_quad_mode(
                slave,
                reg.with_flags(die_flags(upper)),
                manufacturer,
                STATUS_WRITE_TIMEOUT_US,
            )?;
        }
        log::debug!("quad mode enabled on {}", chip.name);
    }

    let mut bank = None;
    if chip.total_size() > BANK_SIZE as u64
        && chip.features.contains(Features::ADDR_4B)
        && features.contains(SpiFeatures::FOUR_BYTE_ADDR)
    {
        info.addr_width = AddressWidth::FourByte;
        info.read_cmd = opcodes::to_4byte(info.read_cmd);
        info.write_cmd = opcodes::to_4byte(info.write_cmd);
        info.erase_cmd = opcodes::to_4byte(info.erase_cmd);
    } else if info.size > BANK_SIZE {
        let (read_cmd, write_cmd) = protocol::bank_opcodes(manufacturer);
        let cmds = BankCmds {
            read_cmd,
            write_cmd,
        };
        let mut curr = [0u8; 2];
        for &upper in dies {
            curr[upper as usize] =
                protocol::read_bank(slave, reg.with_flags(die_flags(upper)), manufacturer)?;
        }
        log::debug!("using bank register {:#04x}, current bank {:?}", write_cmd, curr);
        info.bank_cmds = Some(cmds);
        bank = Some(Bank::new(cmds, info.shift, curr));
    }

    info.memory_map = slave.memory_map();
    info.validate()?;
    Ok((info, bank))
}

/// Descriptor geometry for `chip` in the given topology
fn geometry(chip: &FlashChip, dual_flash: DualFlash) -> Result<FlashInfo> {
    let shift = match dual_flash {
        DualFlash::Parallel => 1,
        _ => 0,
    };
    let dies = match dual_flash {
        DualFlash::Single => 1,
        DualFlash::Stacked | DualFlash::Parallel => 2,
    };
    let size = u32::try_from(chip.total_size() * dies).map_err(|_| Error::InvalidGeometry)?;

    let (erase_cmd, erase_unit) = if chip.features.contains(Features::SECT_4K) {
        (opcodes::SE_20, 4 * 1024)
    } else if chip.features.contains(Features::SECT_32K) {
        (opcodes::BE_52, 32 * 1024)
    } else {
        (opcodes::BE_D8, chip.sector_size)
    };
    let erase_size = erase_unit << shift;

    let mut info = FlashInfo::new(&chip.name, size, chip.page_size << shift, erase_size);
    info.dual_flash = dual_flash;
    info.shift = shift;
    info.flags = chip.features;
    info.erase_cmd = erase_cmd;
    Ok(info)
}

fn rx_lanes(mode: SpiMode) -> u8 {
    if mode.contains(SpiMode::RX_QUAD) {
        4
    } else if mode.contains(SpiMode::RX_DUAL) {
        2
    } else {
        1
    }
}

fn tx_lanes(mode: SpiMode) -> u8 {
    if mode.contains(SpiMode::TX_QUAD) {
        4
    } else if mode.contains(SpiMode::TX_DUAL) {
        2
    } else {
        1
    }
}

/// Returns true if the wiring carries every phase of `proto`
fn wired_for(proto: Protocol, mode: SpiMode) -> bool {
    let (cmd, adr, dat) = proto.lanes();
    cmd.max(adr) <= tx_lanes(mode) && dat <= rx_lanes(mode)
}

/// Pick the widest read the chip, controller and wiring all support
fn select_read(chip: Features, features: SpiFeatures, mode: SpiMode) -> (u8, Protocol) {
    let candidates = [
        (Features::RD_QUADIO, opcodes::QIOR, Protocol::QuadIo),
        (Features::RD_QUAD, opcodes::QOR, Protocol::QuadOutput),
        (Features::RD_DUALIO, opcodes::DIOR, Protocol::DualIo),
        (Features::RD_DUAL, opcodes::DOR, Protocol::DualOutput),
    ];
    candidates
        .into_iter()
        .find(|&(flag, _, proto)| {
            chip.contains(flag)
                && check_protocol_supported(proto, features).is_ok()
                && wired_for(proto, mode)
        })
        .map(|(_, opcode, proto)| (opcode, proto))
        .unwrap_or((opcodes::FAST_READ, Protocol::Single))
}

/// Quad page program where possible, plain page program otherwise
fn select_write(chip: Features, features: SpiFeatures, mode: SpiMode) -> (u8, Protocol) {
    let quad = chip.contains(Features::WR_QPP)
        && check_protocol_supported(Protocol::QuadOutput, features).is_ok()
        && mode.contains(SpiMode::TX_QUAD);
    if quad {
        (opcodes::QPP, Protocol::QuadOutput)
    } else {
        (opcodes::PP, Protocol::Single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chip(features: Features) -> FlashChip {
        FlashChip::new("PART", 0xEF4018, 0, 64 * 1024, 256, features)
    }

    #[test]
    fn test_select_read_prefers_quad_io() {
        let all = SpiFeatures::DUAL | SpiFeatures::QUAD;
        let wired = SpiMode::MODE_3 | SpiMode::RX_QUAD | SpiMode::TX_QUAD;
        assert_eq!(
            select_read(Features::RD_FULL, all, wired),
            (opcodes::QIOR, Protocol::QuadIo)
        );
    }

    #[test]
    fn test_select_read_limited_by_wiring() {
        let all = SpiFeatures::DUAL | SpiFeatures::QUAD;
        // Four lanes in, one out: address cannot go out on four lanes
        let rx_only = SpiMode::MODE_3 | SpiMode::RX_QUAD;
        assert_eq!(
            select_read(Features::RD_FULL, all, rx_only),
            (opcodes::QOR, Protocol::QuadOutput)
        );
        assert_eq!(
            select_read(Features::RD_FULL, all, SpiMode::MODE_3),
            (opcodes::FAST_READ, Protocol::Single)
        );
    }

    #[test]
    fn test_select_read_limited_by_controller() {
        let wired = SpiMode::MODE_3 | SpiMode::RX_QUAD | SpiMode::TX_QUAD;
        assert_eq!(
            select_read(Features::RD_FULL, SpiFeatures::DUAL_IN, wired),
            (opcodes::DOR, Protocol::DualOutput)
        );
    }

    #[test]
    fn test_select_write() {
        let wired = SpiMode::MODE_3 | SpiMode::TX_QUAD;
        assert_eq!(
            select_write(Features::WR_QPP, SpiFeatures::QUAD, wired),
            (opcodes::QPP, Protocol::QuadOutput)
        );
        assert_eq!(
            select_write(Features::WR_QPP, SpiFeatures::empty(), wired),
            (opcodes::PP, Protocol::Single)
        );
    }

    #[test]
    fn test_geometry_single() {
        let info = geometry(&chip(Features::SECT_4K), DualFlash::Single).unwrap();
        assert_eq!(info.size, 16 * 1024 * 1024);
        assert_eq!(info.erase_size, 4096);
        assert_eq!(info.sector_size, 4096);
        assert_eq!(info.erase_cmd, opcodes::SE_20);
        assert_eq!(info.page_size, 256);
    }

    #[test]
    fn test_geometry_parallel_doubles_units() {
        let info = geometry(&chip(Features::empty()), DualFlash::Parallel).unwrap();
        assert_eq!(info.shift, 1);
        assert_eq!(info.size, 32 * 1024 * 1024);
        assert_eq!(info.page_size, 512);
        assert_eq!(info.erase_size, 128 * 1024);
        assert_eq!(info.erase_cmd, opcodes::BE_D8);
    }

    #[test]
    fn test_geometry_stacked_doubles_size_only() {
        let info = geometry(&chip(Features::SECT_32K), DualFlash::Stacked).unwrap();
        assert_eq!(info.shift, 0);
        assert_eq!(info.size, 32 * 1024 * 1024);
        assert_eq!(info.page_size, 256);
        assert_eq!(info.erase_size, 32 * 1024);
        assert_eq!(info.erase_cmd, opcodes::BE_52);
    }
}
