//! Slave configuration and defaults

use alloc::string::String;

use bitflags::bitflags;

/// Default SPI bus number
pub const DEFAULT_BUS: u32 = 0;
/// Default chip-select
pub const DEFAULT_CS: u32 = 0;
/// Default clock ceiling in Hz (1 MHz)
pub const DEFAULT_SPEED_HZ: u32 = 1_000_000;
/// Default SPI mode (mode 3)
pub const DEFAULT_MODE: SpiMode = SpiMode::MODE_3;

/// Compatible string served by the generic SPI NOR driver
pub const JEDEC_SPI_NOR: &str = "jedec,spi-nor";

bitflags! {
    /// SPI clock mode plus the lane widths wired between controller and chip
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiMode: u32 {
        /// Clock phase
        const CPHA    = 1 << 0;
        /// Clock polarity
        const CPOL    = 1 << 1;
        /// Two lanes wired for transmit
        const TX_DUAL = 1 << 8;
        /// Four lanes wired for transmit
        const TX_QUAD = 1 << 9;
        /// Two lanes wired for receive
        const RX_DUAL = 1 << 10;
        /// Four lanes wired for receive
        const RX_QUAD = 1 << 11;

        /// CPOL=0, CPHA=0
        const MODE_0 = 0;
        /// CPOL=0, CPHA=1
        const MODE_1 = Self::CPHA.bits();
        /// CPOL=1, CPHA=0
        const MODE_2 = Self::CPOL.bits();
        /// CPOL=1, CPHA=1
        const MODE_3 = Self::CPOL.bits() | Self::CPHA.bits();
    }
}

impl Default for SpiMode {
    fn default() -> Self {
        DEFAULT_MODE
    }
}

/// Topology of the chips behind one chip-select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
pub enum DualFlash {
    /// One chip
    #[default]
    Single,
    /// Two chips whose address ranges are concatenated
    Stacked,
    /// Two chips sharing the bus, each holding alternate bytes
    Parallel,
}

/// Coordinates and electrical parameters of a SPI flash slave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Bus number
    pub bus: u32,
    /// Chip-select
    pub cs: u32,
    /// Clock ceiling in Hz
    pub max_hz: u32,
    /// Clock mode and wired lane widths
    pub mode: SpiMode,
    /// Topology behind this chip-select
    pub dual_flash: DualFlash,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            bus: DEFAULT_BUS,
            cs: DEFAULT_CS,
            max_hz: DEFAULT_SPEED_HZ,
            mode: DEFAULT_MODE,
            dual_flash: DualFlash::Single,
        }
    }
}

impl SlaveConfig {
    /// Configuration for the given coordinates, clock and mode
    pub fn new(bus: u32, cs: u32, max_hz: u32, mode: SpiMode) -> Self {
        Self {
            bus,
            cs,
            max_hz,
            mode,
            dual_flash: DualFlash::Single,
        }
    }

    /// Override the topology
    pub fn with_dual_flash(mut self, dual_flash: DualFlash) -> Self {
        self.dual_flash = dual_flash;
        self
    }

    /// Override the mode
    pub fn with_mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Device-tree style description of a flash slave node
///
/// With the `std` feature this can be read from RON using the property
/// names of the device-tree binding, with dashes written as underscores:
///
/// ```text
/// (
///     compatible: "jedec,spi-nor",
///     bus: 1,
///     reg: 0,
///     spi_max_frequency: 50000000,
///     spi_cpol: true,
///     spi_cpha: true,
///     spi_rx_bus_width: 4,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct SlaveNode {
    /// Driver selector
    pub compatible: String,
    /// Bus the node sits on
    pub bus: u32,
    /// Chip-select
    pub reg: u32,
    /// Clock ceiling in Hz
    pub spi_max_frequency: u32,
    /// Clock polarity
    pub spi_cpol: bool,
    /// Clock phase
    pub spi_cpha: bool,
    /// Lanes wired for receive (1, 2 or 4)
    pub spi_rx_bus_width: u8,
    /// Lanes wired for transmit (1, 2 or 4)
    pub spi_tx_bus_width: u8,
    /// Topology behind this chip-select
    pub dual_flash: DualFlash,
}

impl Default for SlaveNode {
    fn default() -> Self {
        Self {
            compatible: String::from(JEDEC_SPI_NOR),
            bus: DEFAULT_BUS,
            reg: DEFAULT_CS,
            spi_max_frequency: DEFAULT_SPEED_HZ,
            spi_cpol: false,
            spi_cpha: false,
            spi_rx_bus_width: 1,
            spi_tx_bus_width: 1,
            dual_flash: DualFlash::Single,
        }
    }
}

impl SlaveNode {
    /// Parse a node description from RON
    #[cfg(feature = "std")]
    pub fn from_ron(s: &str) -> core::result::Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Slave configuration described by this node
    pub fn slave_config(&self) -> SlaveConfig {
        let mut mode = SpiMode::MODE_0;
        if self.spi_cpol {
            mode |= SpiMode::CPOL;
        }
        if self.spi_cpha {
            mode |= SpiMode::CPHA;
        }
        match self.spi_rx_bus_width {
            4 => mode |= SpiMode::RX_QUAD,
            2 => mode |= SpiMode::RX_DUAL,
            _ => {}
        }
        match self.spi_tx_bus_width {
            4 => mode |= SpiMode::TX_QUAD,
            2 => mode |= SpiMode::TX_DUAL,
            _ => {}
        }

        SlaveConfig {
            bus: self.bus,
            cs: self.reg,
            max_hz: self.spi_max_frequency,
            mode,
            dual_flash: self.dual_flash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SlaveConfig::default();
        assert_eq!(config.bus, 0);
        assert_eq!(config.cs, 0);
        assert_eq!(config.max_hz, 1_000_000);
        assert_eq!(config.mode, SpiMode::MODE_3);
        assert_eq!(config.dual_flash, DualFlash::Single);
    }

    #[test]
    fn test_node_to_config() {
        let node = SlaveNode {
            bus: 1,
            reg: 2,
            spi_max_frequency: 50_000_000,
            spi_cpol: true,
            spi_cpha: true,
            spi_rx_bus_width: 4,
            ..SlaveNode::default()
        };

        let config = node.slave_config();
        assert_eq!(config.bus, 1);
        assert_eq!(config.cs, 2);
        assert_eq!(config.max_hz, 50_000_000);
        assert!(config.mode.contains(SpiMode::MODE_3));
        assert!(config.mode.contains(SpiMode::RX_QUAD));
        assert!(!config.mode.contains(SpiMode::TX_QUAD));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_node_from_ron() {
        let node = SlaveNode::from_ron(
            r#"(
                compatible: "jedec,spi-nor",
                bus: 1,
                reg: 0,
                spi_max_frequency: 25000000,
                spi_cpha: true,
                spi_tx_bus_width: 2,
                dual_flash: Stacked,
            )"#,
        )
        .unwrap();

        assert_eq!(node.compatible, JEDEC_SPI_NOR);
        assert_eq!(node.spi_max_frequency, 25_000_000);
        assert!(!node.spi_cpol);
        assert_eq!(node.spi_rx_bus_width, 1);
        assert_eq!(node.dual_flash, DualFlash::Stacked);
        assert_eq!(node.slave_config().mode, SpiMode::MODE_1 | SpiMode::TX_DUAL);
    }
}
