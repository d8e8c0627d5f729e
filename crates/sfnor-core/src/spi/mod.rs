//! SPI types and command structures
//!
//! This module provides the transfer protocol encoding, types for
//! representing framed SPI transfers, and standard JEDEC opcodes.

mod address;
mod command;
pub mod opcodes;
mod proto;

pub use address::AddressWidth;
pub use command::{SpiCommand, XferFlags};
pub use proto::{
    check_protocol_supported, encode, project_adr, project_cmd, project_dat, Protocol,
    PROTO_ADR_MASK, PROTO_ADR_SHIFT, PROTO_CMD_MASK, PROTO_CMD_SHIFT, PROTO_DAT_MASK,
    PROTO_DAT_SHIFT,
};
