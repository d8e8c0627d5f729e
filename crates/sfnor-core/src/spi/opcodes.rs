//! Standard JEDEC SPI flash opcodes
//!
//! Command opcodes and status bits shared by most SPI NOR parts, plus the
//! vendor bank-register commands used for >16 MiB parts on 3-byte addressing.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Configuration Register / Status Register 2
pub const RDSR2: u8 = 0x35;
/// Write Status Register 1 (optionally followed by SR2)
pub const WRSR: u8 = 0x01;
/// Read Flag Status Register (Micron)
pub const RDFSR: u8 = 0x70;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID + extended ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Read commands - 3-byte address
// ============================================================================

/// Read Data (no dummy cycles)
pub const READ: u8 = 0x03;
/// Fast Read (with dummy byte)
pub const FAST_READ: u8 = 0x0B;
/// Dual Output Read (1-1-2)
pub const DOR: u8 = 0x3B;
/// Dual I/O Read (1-2-2)
pub const DIOR: u8 = 0xBB;
/// Quad Output Read (1-1-4)
pub const QOR: u8 = 0x6B;
/// Quad I/O Read (1-4-4)
pub const QIOR: u8 = 0xEB;

// ============================================================================
// Read commands - 4-byte address
// ============================================================================

/// Read Data with 4-byte address
pub const READ_4B: u8 = 0x13;
/// Fast Read with 4-byte address
pub const FAST_READ_4B: u8 = 0x0C;
/// Dual Output Read with 4-byte address
pub const DOR_4B: u8 = 0x3C;
/// Dual I/O Read with 4-byte address
pub const DIOR_4B: u8 = 0xBC;
/// Quad Output Read with 4-byte address
pub const QOR_4B: u8 = 0x6C;
/// Quad I/O Read with 4-byte address
pub const QIOR_4B: u8 = 0xEC;

// ============================================================================
// Page Program
// ============================================================================

/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;
/// Quad Page Program (1-1-4) with 3-byte address
pub const QPP: u8 = 0x32;
/// Quad Page Program (1-1-4) with 4-byte address
pub const QPP_4B: u8 = 0x34;

// ============================================================================
// Erase commands
// ============================================================================

/// Sector Erase 4KB with 3-byte address
pub const SE_20: u8 = 0x20;
/// Block Erase 32KB with 3-byte address
pub const BE_52: u8 = 0x52;
/// Block Erase 64KB with 3-byte address
pub const BE_D8: u8 = 0xD8;
/// Sector Erase 4KB with 4-byte address
pub const SE_21: u8 = 0x21;
/// Block Erase 32KB with 4-byte address
pub const BE_5C: u8 = 0x5C;
/// Block Erase 64KB with 4-byte address
pub const BE_DC: u8 = 0xDC;

// ============================================================================
// Bank / extended address register
// ============================================================================

/// Bank Register Read (Spansion)
pub const BRRD: u8 = 0x16;
/// Bank Register Write (Spansion)
pub const BRWR: u8 = 0x17;
/// Read Extended Address Register (Micron, Winbond, Macronix)
pub const RDEAR: u8 = 0xC8;
/// Write Extended Address Register (Micron, Winbond, Macronix)
pub const WREAR: u8 = 0xC5;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
/// Status Register 1: Block Protect bit 0
pub const SR1_BP0: u8 = 0x04;
/// Status Register 1: Block Protect bit 1
pub const SR1_BP1: u8 = 0x08;
/// Status Register 1: Block Protect bit 2
pub const SR1_BP2: u8 = 0x10;
/// Status Register 1: Quad Enable (Macronix)
pub const SR1_QE_MX: u8 = 0x40;
/// Status Register 2: Quad Enable (Winbond, Spansion, GigaDevice)
pub const SR2_QE: u8 = 0x02;
/// Flag Status Register: program/erase controller ready
pub const FSR_READY: u8 = 0x80;

/// Map a 3-byte-address opcode to its native 4-byte-address counterpart
///
/// Opcodes without a 4-byte variant are returned unchanged.
pub const fn to_4byte(opcode: u8) -> u8 {
    match opcode {
        READ => READ_4B,
        FAST_READ => FAST_READ_4B,
        DOR => DOR_4B,
        DIOR => DIOR_4B,
        QOR => QOR_4B,
        QIOR => QIOR_4B,
        PP => PP_4B,
        QPP => QPP_4B,
        SE_20 => SE_21,
        BE_52 => BE_5C,
        BE_D8 => BE_DC,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_4byte() {
        assert_eq!(to_4byte(READ), READ_4B);
        assert_eq!(to_4byte(QOR), QOR_4B);
        assert_eq!(to_4byte(SE_20), SE_21);
        assert_eq!(to_4byte(WREN), WREN);
    }
}
