//! SPI flash transfer protocols
//!
//! A protocol names how many I/O lanes carry each of the three phases of a
//! transfer: command, address and data. The value is packed into a 12-bit
//! positional encoding, one nibble per phase, which is what controllers and
//! some hardware registers consume directly.

use core::fmt;

use crate::error::{Error, Result};
use crate::transport::SpiFeatures;

/// Bit offset of the command-phase nibble
pub const PROTO_CMD_SHIFT: u16 = 8;
/// Mask of the command-phase nibble (bits 11:8)
pub const PROTO_CMD_MASK: u16 = 0x0F00;
/// Bit offset of the address-phase nibble
pub const PROTO_ADR_SHIFT: u16 = 4;
/// Mask of the address-phase nibble (bits 7:4)
pub const PROTO_ADR_MASK: u16 = 0x00F0;
/// Bit offset of the data-phase nibble
pub const PROTO_DAT_SHIFT: u16 = 0;
/// Mask of the data-phase nibble (bits 3:0)
pub const PROTO_DAT_MASK: u16 = 0x000F;

/// Pack three lane counts into the positional encoding
///
/// Each count is truncated to its nibble; no validation happens here.
pub const fn encode(cmd: u8, adr: u8, dat: u8) -> u16 {
    (((cmd as u16) << PROTO_CMD_SHIFT) & PROTO_CMD_MASK)
        | (((adr as u16) << PROTO_ADR_SHIFT) & PROTO_ADR_MASK)
        | (((dat as u16) << PROTO_DAT_SHIFT) & PROTO_DAT_MASK)
}

/// Extract the command-phase lane count from a raw encoding
pub const fn project_cmd(raw: u16) -> u8 {
    ((raw & PROTO_CMD_MASK) >> PROTO_CMD_SHIFT) as u8
}

/// Extract the address-phase lane count from a raw encoding
pub const fn project_adr(raw: u16) -> u8 {
    ((raw & PROTO_ADR_MASK) >> PROTO_ADR_SHIFT) as u8
}

/// Extract the data-phase lane count from a raw encoding
pub const fn project_dat(raw: u16) -> u8 {
    ((raw & PROTO_DAT_MASK) >> PROTO_DAT_SHIFT) as u8
}

/// Lane arrangement of one SPI flash transfer
///
/// The discriminant of each variant is its positional encoding, so
/// `proto as u16` yields the value a controller register expects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Protocol {
    /// Standard SPI: 1-1-1
    #[default]
    Single = encode(1, 1, 1),
    /// Dual Output: 1-1-2 (data phase on 2 lines)
    DualOutput = encode(1, 1, 2),
    /// Quad Output: 1-1-4 (data phase on 4 lines)
    QuadOutput = encode(1, 1, 4),
    /// Dual I/O: 1-2-2 (address and data on 2 lines)
    DualIo = encode(1, 2, 2),
    /// Quad I/O: 1-4-4 (address and data on 4 lines)
    QuadIo = encode(1, 4, 4),
    /// Dual command: 2-2-2 (everything on 2 lines)
    Dpi = encode(2, 2, 2),
    /// Quad command: 4-4-4 (everything on 4 lines)
    Qpi = encode(4, 4, 4),
}

impl Protocol {
    /// Every defined protocol
    pub const ALL: [Protocol; 7] = [
        Self::Single,
        Self::DualOutput,
        Self::QuadOutput,
        Self::DualIo,
        Self::QuadIo,
        Self::Dpi,
        Self::Qpi,
    ];

    /// Build a protocol from per-phase lane counts
    ///
    /// Returns `None` for combinations that are not defined protocols.
    pub fn compose(cmd: u8, adr: u8, dat: u8) -> Option<Self> {
        if cmd > 0x0F || adr > 0x0F || dat > 0x0F {
            return None;
        }
        Self::from_raw(encode(cmd, adr, dat))
    }

    /// Look up a protocol by its raw positional encoding
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.raw() == raw)
    }

    /// The raw positional encoding
    pub const fn raw(self) -> u16 {
        self as u16
    }

    /// Number of lanes used for the command phase
    pub const fn cmd_lanes(self) -> u8 {
        project_cmd(self.raw())
    }

    /// Number of lanes used for the address phase
    pub const fn addr_lanes(self) -> u8 {
        project_adr(self.raw())
    }

    /// Number of lanes used for the data phase
    pub const fn data_lanes(self) -> u8 {
        project_dat(self.raw())
    }

    /// Lane counts as a (command, address, data) triple
    pub const fn lanes(self) -> (u8, u8, u8) {
        (self.cmd_lanes(), self.addr_lanes(), self.data_lanes())
    }

    /// Returns true if this protocol needs quad-lane capability
    pub const fn requires_quad(self) -> bool {
        matches!(self, Self::QuadOutput | Self::QuadIo | Self::Qpi)
    }
}

impl TryFrom<u16> for Protocol {
    type Error = Error;

    fn try_from(raw: u16) -> Result<Self> {
        Self::from_raw(raw).ok_or(Error::InvalidProtocol)
    }
}

impl From<Protocol> for u16 {
    fn from(proto: Protocol) -> u16 {
        proto.raw()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (cmd, adr, dat) = self.lanes();
        write!(f, "{}-{}-{}", cmd, adr, dat)
    }
}

/// Check if a controller supports the requested protocol
///
/// Returns `Ok(())` if the protocol is supported, or
/// `Err(ProtocolNotSupported)` if not.
///
/// # Example
///
/// ```ignore
/// fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
///     check_protocol_supported(cmd.proto, self.features())?;
///     // ... frame the transfer
/// }
/// ```
pub fn check_protocol_supported(proto: Protocol, features: SpiFeatures) -> Result<()> {
    let needed = match proto {
        Protocol::Single => return Ok(()),
        Protocol::DualOutput => SpiFeatures::DUAL_IN,
        Protocol::DualIo => SpiFeatures::DUAL_IO,
        Protocol::QuadOutput => SpiFeatures::QUAD_IN,
        Protocol::QuadIo => SpiFeatures::QUAD_IO,
        Protocol::Dpi => SpiFeatures::DPI,
        Protocol::Qpi => SpiFeatures::QPI,
    };

    if features.contains(needed) {
        Ok(())
    } else {
        Err(Error::ProtocolNotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values_are_positional() {
        assert_eq!(Protocol::Single.raw(), 0x111);
        assert_eq!(Protocol::DualOutput.raw(), 0x112);
        assert_eq!(Protocol::QuadOutput.raw(), 0x114);
        assert_eq!(Protocol::DualIo.raw(), 0x122);
        assert_eq!(Protocol::QuadIo.raw(), 0x144);
        assert_eq!(Protocol::Dpi.raw(), 0x222);
        assert_eq!(Protocol::Qpi.raw(), 0x444);
    }

    #[test]
    fn test_compose_then_project_is_identity() {
        for proto in Protocol::ALL {
            let (cmd, adr, dat) = proto.lanes();
            assert_eq!(Protocol::compose(cmd, adr, dat), Some(proto));
        }

        let lanes = [1u8, 2, 4];
        for &cmd in &lanes {
            for &adr in &lanes {
                for &dat in &lanes {
                    if let Some(proto) = Protocol::compose(cmd, adr, dat) {
                        assert_eq!(proto.lanes(), (cmd, adr, dat));
                    }
                }
            }
        }
    }

    #[test]
    fn test_undefined_combinations_rejected() {
        assert_eq!(Protocol::compose(2, 1, 1), None);
        assert_eq!(Protocol::compose(1, 4, 1), None);
        assert_eq!(Protocol::compose(1, 1, 8), None);
        assert_eq!(Protocol::compose(0, 0, 0), None);
        assert_eq!(Protocol::compose(0x11, 1, 1), None);
        assert_eq!(Protocol::try_from(0x113), Err(Error::InvalidProtocol));
    }

    #[test]
    fn test_projection_ignores_other_nibbles() {
        // Garbage in the neighbouring nibbles never leaks into a projection
        assert_eq!(project_cmd(0x4FF), 4);
        assert_eq!(project_adr(0xF2F), 2);
        assert_eq!(project_dat(0xFF1), 1);
        assert_eq!(project_cmd(0xF0FF & 0x0FFF), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(alloc::format!("{}", Protocol::QuadIo), "1-4-4");
        assert_eq!(alloc::format!("{}", Protocol::Dpi), "2-2-2");
    }

    #[test]
    fn test_check_supported() {
        let features = SpiFeatures::DUAL_IN | SpiFeatures::QUAD_IN;
        assert!(check_protocol_supported(Protocol::Single, SpiFeatures::empty()).is_ok());
        assert!(check_protocol_supported(Protocol::QuadOutput, features).is_ok());
        assert_eq!(
            check_protocol_supported(Protocol::QuadIo, features),
            Err(Error::ProtocolNotSupported)
        );
        assert_eq!(
            check_protocol_supported(Protocol::Qpi, features),
            Err(Error::ProtocolNotSupported)
        );
    }
}
