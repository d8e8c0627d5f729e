//! SPI command structure

use bitflags::bitflags;

use super::{AddressWidth, Protocol};

bitflags! {
    /// Per-transfer flags passed down to the controller
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct XferFlags: u8 {
        /// Route the transfer to the upper chip of a dual-stacked pair
        const UPPER_PAGE = 1 << 0;
    }
}

/// A single framed SPI flash transfer
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any), already translated to the chip's wire address
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Lane arrangement for command, address and data phases
    pub proto: Protocol,

    /// Number of dummy clock cycles after the address
    pub dummy_cycles: u8,

    /// Controller flags
    pub flags: XferFlags,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            proto: Protocol::Single,
            dummy_cycles: 0,
            flags: XferFlags::empty(),
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Create a write register command with no address (e.g., WRSR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed read command
    pub fn read(opcode: u8, addr: u32, width: AddressWidth, buf: &'a mut [u8]) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed program command
    pub fn program(opcode: u8, addr: u32, width: AddressWidth, data: &'a [u8]) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            write_data: data,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed erase command
    pub fn erase(opcode: u8, addr: u32, width: AddressWidth) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            ..Self::simple(opcode)
        }
    }

    /// Set the protocol for this command
    pub fn with_proto(mut self, proto: Protocol) -> Self {
        self.proto = proto;
        self
    }

    /// Set the number of dummy cycles
    pub fn with_dummy_cycles(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    /// Set controller flags
    pub fn with_flags(mut self, flags: XferFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Number of dummy bytes clocked at the address-phase lane width
    pub fn dummy_bytes(&self) -> usize {
        (self.dummy_cycles as usize * self.proto.addr_lanes() as usize) / 8
    }

    /// Length of opcode + address + dummy bytes
    pub fn header_len(&self) -> usize {
        let addr_len = if self.has_address() {
            self.address_width.bytes() as usize
        } else {
            0
        };
        1 + addr_len + self.dummy_bytes()
    }

    /// Write opcode, address and dummy bytes into `buf`
    ///
    /// `buf` must hold at least `header_len()` bytes. Dummy bytes are 0xFF.
    pub fn encode_header(&self, buf: &mut [u8]) {
        buf[0] = self.opcode;
        let mut pos = 1;
        if let Some(addr) = self.address {
            let width = self.address_width.bytes() as usize;
            self.address_width.encode(addr, &mut buf[pos..pos + width]);
            pos += width;
        }
        for byte in &mut buf[pos..pos + self.dummy_bytes()] {
            *byte = 0xFF;
        }
    }

    /// Calculate the total number of bytes to transfer
    pub fn total_bytes(&self) -> usize {
        self.header_len() + self.write_data.len() + self.read_buf.len()
    }
}
