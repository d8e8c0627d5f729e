//! Address width types

/// Address width for SPI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    None,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    #[default]
    ThreeByte,
    /// 4-byte (32-bit) address - supports up to 4 GiB
    FourByte,
}

impl AddressWidth {
    /// Width from a byte count (0, 3 or 4)
    pub const fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            0 => Some(Self::None),
            3 => Some(Self::ThreeByte),
            4 => Some(Self::FourByte),
            _ => None,
        }
    }

    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Returns the maximum addressable size in bytes
    pub const fn max_size(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 16 * 1024 * 1024,
            Self::FourByte => 1 << 32,
        }
    }

    /// Encode an address into bytes, most significant first
    ///
    /// Bits above the width are dropped.
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        match self {
            Self::None => {}
            Self::ThreeByte => {
                buf[0] = (address >> 16) as u8;
                buf[1] = (address >> 8) as u8;
                buf[2] = address as u8;
            }
            Self::FourByte => {
                buf[..4].copy_from_slice(&address.to_be_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_three_byte_drops_high_bits() {
        let mut buf = [0u8; 3];
        AddressWidth::ThreeByte.encode(0x0100_1000, &mut buf);
        assert_eq!(buf, [0x00, 0x10, 0x00]);
    }

    #[test]
    fn test_encode_four_byte() {
        let mut buf = [0u8; 4];
        AddressWidth::FourByte.encode(0x0123_4567, &mut buf);
        assert_eq!(buf, [0x01, 0x23, 0x45, 0x67]);
    }

    #[test]
    fn test_from_bytes() {
        assert_eq!(AddressWidth::from_bytes(3), Some(AddressWidth::ThreeByte));
        assert_eq!(AddressWidth::from_bytes(4), Some(AddressWidth::FourByte));
        assert_eq!(AddressWidth::from_bytes(2), None);
    }
}
