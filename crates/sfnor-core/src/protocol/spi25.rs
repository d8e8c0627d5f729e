//! SPI25 register command sequences
//!
//! Identification, status polling, status register writes, quad enable and
//! bank register access as defined by JEDEC plus the usual vendor variants.
//!
//! Every helper takes a [`RegAccess`] naming the lanes used for register
//! commands and the controller flags to attach. On a dual-stacked pair the
//! flags select which of the two chips answers.

use crate::chip::mfr;
use crate::error::{Error, Result};
use crate::spi::{opcodes, Protocol, SpiCommand, XferFlags};
use crate::transport::SpiSlave;

/// How register commands are framed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegAccess {
    /// Lane arrangement for register commands
    pub proto: Protocol,
    /// Controller flags attached to every transfer
    pub flags: XferFlags,
}

impl RegAccess {
    /// Same framing with different controller flags
    pub fn with_flags(self, flags: XferFlags) -> Self {
        Self { flags, ..self }
    }
}

fn run<S: SpiSlave + ?Sized>(slave: &mut S, reg: RegAccess, cmd: SpiCommand<'_>) -> Result<()> {
    let mut cmd = cmd.with_proto(reg.proto).with_flags(reg.flags);
    slave.execute(&mut cmd)
}

/// Read the five RDID bytes: manufacturer, device id and extended id
pub fn read_jedec_id<S: SpiSlave + ?Sized>(slave: &mut S, reg: RegAccess) -> Result<[u8; 5]> {
    let mut id = [0u8; 5];
    run(slave, reg, SpiCommand::read_reg(opcodes::RDID, &mut id))?;
    Ok(id)
}

/// Read a one-byte register
pub fn read_register<S: SpiSlave + ?Sized>(
    slave: &mut S,
    reg: RegAccess,
    opcode: u8,
) -> Result<u8> {
    let mut buf = [0u8; 1];
    run(slave, reg, SpiCommand::read_reg(opcode, &mut buf))?;
    Ok(buf[0])
}

/// Read the status register 1
pub fn read_status1<S: SpiSlave + ?Sized>(slave: &mut S, reg: RegAccess) -> Result<u8> {
    read_register(slave, reg, opcodes::RDSR)
}

/// Read the status register 2
pub fn read_status2<S: SpiSlave + ?Sized>(slave: &mut S, reg: RegAccess) -> Result<u8> {
    read_register(slave, reg, opcodes::RDSR2)
}

/// Read the flag status register
pub fn read_flag_status<S: SpiSlave + ?Sized>(slave: &mut S, reg: RegAccess) -> Result<u8> {
    read_register(slave, reg, opcodes::RDFSR)
}

/// Send the Write Enable command
pub fn write_enable<S: SpiSlave + ?Sized>(slave: &mut S, reg: RegAccess) -> Result<()> {
    run(slave, reg, SpiCommand::simple(opcodes::WREN))
}

/// Poll until the chip reports ready
///
/// Ready means WIP clear in status register 1 and, when `check_fsr` is
/// set, the ready bit set in the flag status register.
///
/// # Arguments
/// * `poll_delay_us` - Delay in microseconds between polls
/// * `timeout_us` - Maximum time to wait before returning Error::Timeout
pub fn wait_ready<S: SpiSlave + ?Sized>(
    slave: &mut S,
    reg: RegAccess,
    check_fsr: bool,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let max_polls = if poll_delay_us > 0 {
        (timeout_us / poll_delay_us).max(1)
    } else {
        timeout_us.max(1)
    };

    for _ in 0..max_polls {
        let status = read_status1(slave, reg)?;
        let mut ready = status & opcodes::SR1_WIP == 0;
        if ready && check_fsr {
            ready = read_flag_status(slave, reg)? & opcodes::FSR_READY != 0;
        }
        if ready {
            return Ok(());
        }
        if poll_delay_us > 0 {
            slave.delay_us(poll_delay_us);
        }
    }

    log::warn!("flash still busy after {} us", timeout_us);
    Err(Error::Timeout)
}

/// Write a register that needs WREN first and completes like a write
///
/// Sends WREN, the register write, then waits for ready.
pub fn write_register<S: SpiSlave + ?Sized>(
    slave: &mut S,
    reg: RegAccess,
    opcode: u8,
    data: &[u8],
    timeout_us: u32,
) -> Result<()> {
    write_enable(slave, reg)?;
    run(slave, reg, SpiCommand::write_reg(opcode, data))?;
    // Register writes take 5-200ms, poll every 10ms
    wait_ready(slave, reg, false, 10_000, timeout_us)
}

/// Write the status register 1
pub fn write_status1<S: SpiSlave + ?Sized>(
    slave: &mut S,
    reg: RegAccess,
    value: u8,
    timeout_us: u32,
) -> Result<()> {
    write_register(slave, reg, opcodes::WRSR, &[value], timeout_us)
}

/// Write status registers 1 and 2 in one WRSR
pub fn write_status12<S: SpiSlave + ?Sized>(
    slave: &mut S,
    reg: RegAccess,
    sr1: u8,
    sr2: u8,
    timeout_us: u32,
) -> Result<()> {
    write_register(slave, reg, opcodes::WRSR, &[sr1, sr2], timeout_us)
}

/// Set the quad-enable bit the manufacturer's parts use
///
/// Macronix and ISSI keep QE in status register 1, Winbond, Spansion and
/// GigaDevice in status register 2. Micron parts answer quad commands
/// without a QE bit. The bit is read back after writing.
///
/// # Errors
/// * `QuadEnableFailed` - Unknown manufacturer, or QE did not stick
pub fn set_quad_mode<S: SpiSlave + ?Sized>(
    slave: &mut S,
    reg: RegAccess,
    manufacturer: u8,
    timeout_us: u32,
) -> Result<()> {
    match manufacturer {
        mfr::MACRONIX | mfr::ISSI => {
            let sr1 = read_status1(slave, reg)?;
            if sr1 & opcodes::SR1_QE_MX != 0 {
                return Ok(());
            }
            write_status1(slave, reg, sr1 | opcodes::SR1_QE_MX, timeout_us)?;
            if read_status1(slave, reg)? & opcodes::SR1_QE_MX == 0 {
                return Err(Error::QuadEnableFailed);
            }
            Ok(())
        }
        mfr::WINBOND | mfr::SPANSION | mfr::GIGADEVICE => {
            let sr2 = read_status2(slave, reg)?;
            if sr2 & opcodes::SR2_QE != 0 {
                return Ok(());
            }
            let sr1 = read_status1(slave, reg)?;
            write_status12(slave, reg, sr1, sr2 | opcodes::SR2_QE, timeout_us)?;
            if read_status2(slave, reg)? & opcodes::SR2_QE == 0 {
                return Err(Error::QuadEnableFailed);
            }
            Ok(())
        }
        mfr::STMICRO => Ok(()),
        _ => {
            log::warn!("no quad enable sequence for manufacturer {:02X}", manufacturer);
            Err(Error::QuadEnableFailed)
        }
    }
}

/// Opcodes (read, write) of the bank register for this manufacturer
pub const fn bank_opcodes(manufacturer: u8) -> (u8, u8) {
    match manufacturer {
        mfr::SPANSION => (opcodes::BRRD, opcodes::BRWR),
        _ => (opcodes::RDEAR, opcodes::WREAR),
    }
}

/// Read the bank register
pub fn read_bank<S: SpiSlave + ?Sized>(
    slave: &mut S,
    reg: RegAccess,
    manufacturer: u8,
) -> Result<u8> {
    let (rd, _) = bank_opcodes(manufacturer);
    read_register(slave, reg, rd)
}

/// Write the bank register
pub fn write_bank<S: SpiSlave + ?Sized>(
    slave: &mut S,
    reg: RegAccess,
    manufacturer: u8,
    bank: u8,
    timeout_us: u32,
) -> Result<()> {
    let (_, wr) = bank_opcodes(manufacturer);
    write_register(slave, reg, wr, &[bank], timeout_us)
}
