//! Transport traits and slave configuration
//!
//! This module defines what the flash layer needs from a SPI controller:
//! a slave that executes framed transfers, and a host that hands slaves out.

mod config;
mod mmap;
mod traits;

pub use config::*;
pub use mmap::MemoryMap;
pub use traits::*;
