//! Flash chip feature flags

use bitflags::bitflags;

bitflags! {
    /// Feature flags for flash chips
    ///
    /// These flags describe erase granularities, multi-lane commands and
    /// quirks of a part. The descriptor carries them as opaque `flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u16 {
        // Erase granularity
        /// Has 4KB sector erase (0x20)
        const SECT_4K   = 1 << 0;
        /// Has 32KB block erase (0x52)
        const SECT_32K  = 1 << 1;

        // Status polling
        /// Ready must also be read from the flag status register
        const E_FSR     = 1 << 2;

        // Program commands
        /// Supports Quad Page Program (0x32)
        const WR_QPP    = 1 << 3;

        // Read commands
        /// Supports Dual Output read (0x3B)
        const RD_DUAL   = 1 << 4;
        /// Supports Quad Output read (0x6B)
        const RD_QUAD   = 1 << 5;
        /// Supports Dual I/O read (0xBB)
        const RD_DUALIO = 1 << 6;
        /// Supports Quad I/O read (0xEB)
        const RD_QUADIO = 1 << 7;

        // Addressing and protection
        /// Has native 4-byte address opcodes (0x13, 0x12, 0x21, ...)
        const ADDR_4B   = 1 << 8;
        /// BP0..BP2 in status register 1 protect a top-aligned region
        const LOCK_BP   = 1 << 9;

        /// Every read command
        const RD_FULL = Self::RD_DUAL.bits()
            | Self::RD_QUAD.bits()
            | Self::RD_DUALIO.bits()
            | Self::RD_QUADIO.bits();
    }
}
