//! Transport trait definitions
//!
//! The flash layer never drives a SPI controller directly. It hands framed
//! [`SpiCommand`]s to a [`SpiSlave`], which a [`SpiHost`] hands out for a
//! given bus and chip-select.

use bitflags::bitflags;

use super::{MemoryMap, SlaveConfig};
use crate::error::Result;
use crate::spi::SpiCommand;

bitflags! {
    /// SPI controller feature flags
    ///
    /// These flags indicate which lane arrangements a controller can frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiFeatures: u32 {
        /// Supports 4-byte addressing commands
        const FOUR_BYTE_ADDR = 1 << 0;
        /// Can read two bits at once (1-1-2)
        const DUAL_IN        = 1 << 2;
        /// Can transfer address and data two bits at once (1-2-2)
        const DUAL_IO        = 1 << 3;
        /// Can read four bits at once (1-1-4), also used for quad program
        const QUAD_IN        = 1 << 4;
        /// Can transfer address and data four bits at once (1-4-4)
        const QUAD_IO        = 1 << 5;
        /// Can send commands on two lines (2-2-2)
        const DPI            = 1 << 6;
        /// Can send commands on four lines (4-4-4)
        const QPI            = 1 << 7;

        /// Shorthand for dual mode (both DUAL_IN and DUAL_IO)
        const DUAL = Self::DUAL_IN.bits() | Self::DUAL_IO.bits();
        /// Shorthand for quad mode (both QUAD_IN and QUAD_IO)
        const QUAD = Self::QUAD_IN.bits() | Self::QUAD_IO.bits();
    }
}

impl Default for SpiFeatures {
    fn default() -> Self {
        SpiFeatures::empty()
    }
}

/// A SPI slave bound to one chip-select of one controller
///
/// ## Multi-I/O Support
///
/// Each [`SpiCommand`] carries a [`Protocol`](crate::spi::Protocol) naming
/// the lane count for its command, address and data phases. Implementations
/// should report what they can frame via `features()` and reject anything
/// else from `execute()` with `ProtocolNotSupported`
/// (see [`check_protocol_supported`](crate::spi::check_protocol_supported)).
///
/// ## Bus ownership
///
/// The flash layer calls `claim_bus()` before the first transfer of a logical
/// operation and `release_bus()` after the last one, even when a transfer in
/// between failed. Chip-select is asserted per `execute()` call.
///
/// ## Example
///
/// ```ignore
/// impl SpiSlave for QspiController {
///     fn features(&self) -> SpiFeatures {
///         SpiFeatures::FOUR_BYTE_ADDR | SpiFeatures::DUAL | SpiFeatures::QUAD
///     }
///
///     fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
///         check_protocol_supported(cmd.proto, self.features())?;
///         self.program_lanes(cmd.proto.lanes());
///         self.run(cmd)
///     }
///     // ...
/// }
/// ```
pub trait SpiSlave {
    /// Get the lane arrangements supported by this controller
    fn features(&self) -> SpiFeatures;

    /// Get the maximum number of bytes that can be read in a single transfer
    fn max_read_len(&self) -> usize;

    /// Get the maximum number of bytes that can be written in a single transfer
    fn max_write_len(&self) -> usize;

    /// Claim the bus for a logical operation
    fn claim_bus(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the bus after a logical operation
    fn release_bus(&mut self) {}

    /// Execute a single framed transfer
    ///
    /// The command contains all the information needed for the transfer:
    /// - `opcode`: The SPI command opcode
    /// - `address`: Optional wire address (with width)
    /// - `proto`: Lane counts for the command, address and data phases
    /// - `dummy_cycles`: Number of dummy clock cycles after the address
    /// - `flags`: Controller flags such as the dual-stacked upper page
    /// - `write_data`: Data to write after the header
    /// - `read_buf`: Buffer to read data into
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Read-only memory-mapped window over the flash, if the controller has one
    fn memory_map(&self) -> Option<MemoryMap> {
        None
    }

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// A SPI controller that hands out slaves by bus and chip-select
pub trait SpiHost {
    /// The slave type produced by this host
    type Slave: SpiSlave;

    /// Set up the slave at `config.bus`/`config.cs` with the given clock
    /// ceiling and mode
    ///
    /// # Errors
    /// * `SlaveUnavailable` - If nothing answers at those coordinates
    fn setup_slave(&mut self, config: &SlaveConfig) -> Result<Self::Slave>;
}

// Blanket impl for boxed slaves to allow trait objects
impl SpiSlave for alloc::boxed::Box<dyn SpiSlave> {
    fn features(&self) -> SpiFeatures {
        (**self).features()
    }

    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn max_write_len(&self) -> usize {
        (**self).max_write_len()
    }

    fn claim_bus(&mut self) -> Result<()> {
        (**self).claim_bus()
    }

    fn release_bus(&mut self) {
        (**self).release_bus()
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        (**self).execute(cmd)
    }

    fn memory_map(&self) -> Option<MemoryMap> {
        (**self).memory_map()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
