//! Flash descriptor and operations
//!
//! - [`FlashInfo`] records identity, geometry and wire parameters
//! - [`FlashOps`] / [`FlashLocking`] are the capabilities a bound flash has
//! - [`SpiNorOps`] implements them for JEDEC NOR parts on a [`SpiSlave`](crate::transport::SpiSlave)
//! - [`SpiFlash`] is the descriptor callers hold
//! - [`probe`], [`probe_node`] and [`DriverRegistry`] produce descriptors

mod bank;
mod descriptor;
mod info;
pub mod lock;
mod ops;
mod probe;
mod registry;
mod spi_nor;

pub use bank::Bank;
pub use descriptor::SpiFlash;
pub use info::{BankCmds, FlashInfo, BANK_SIZE};
pub use ops::{FlashLocking, FlashOps};
pub use probe::{probe, probe_node, probe_slave};
pub use registry::{DriverRegistry, FlashDriver, SpiNorDriver};
pub use spi_nor::{SpiNorOps, Timeouts, ERASE_TIMEOUT_US, PROG_TIMEOUT_US, STATUS_WRITE_TIMEOUT_US};
