//! Protocol implementations
//!
//! This module contains the SPI25 register command sequences shared by
//! probing and the generic NOR operations.

mod spi25;

pub use spi25::*;
