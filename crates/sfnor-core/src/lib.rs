//! sfnor-core - SPI NOR flash access layer
//!
//! This crate lets bootloader and firmware code read, program and erase
//! serial NOR flash attached to a SPI controller without knowing the chip's
//! command set, address width, dual-chip topology or the number of I/O lanes
//! used for each transfer phase. It is `no_std` and only needs `alloc`.
//!
//! # Features
//!
//! - `std` - RON chip tables, RON slave node descriptions and
//!   `std::error::Error` implementations
//!
//! # Example
//!
//! ```ignore
//! use sfnor_core::chip::ChipDatabase;
//! use sfnor_core::flash;
//! use sfnor_core::transport::{SlaveConfig, SpiHost};
//!
//! fn dump_boot_sector<H: SpiHost>(host: &mut H) -> sfnor_core::Result<()> {
//!     let mut flash = flash::probe(host, &SlaveConfig::default(), ChipDatabase::builtin())?;
//!     let mut buf = [0u8; 4096];
//!     flash.read(0, &mut buf)?;
//!     flash.free();
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod spi;
pub mod transport;

pub use error::{Error, ErrorKind, Result};
pub use flash::{FlashInfo, SpiFlash};
pub use spi::Protocol;
