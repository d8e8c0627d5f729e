//! Flash chip type definitions

use super::features::Features;

/// Maximum length of a chip name
pub const CHIP_NAME_LEN: usize = 32;

/// Chip name storage
pub type ChipName = heapless::String<CHIP_NAME_LEN>;

/// JEDEC manufacturer ids the flash layer treats specially
pub mod mfr {
    /// Spansion / Cypress / Infineon
    pub const SPANSION: u8 = 0x01;
    /// STMicro / Numonyx / Micron
    pub const STMICRO: u8 = 0x20;
    /// Atmel / Adesto
    pub const ATMEL: u8 = 0x1F;
    /// ISSI
    pub const ISSI: u8 = 0x9D;
    /// SST / Microchip
    pub const SST: u8 = 0xBF;
    /// Macronix
    pub const MACRONIX: u8 = 0xC2;
    /// GigaDevice
    pub const GIGADEVICE: u8 = 0xC8;
    /// Winbond
    pub const WINBOND: u8 = 0xEF;
}

/// Flash chip definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashChip {
    /// Chip name
    pub name: ChipName,
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID (memory type and capacity bytes)
    pub device_id: u16,
    /// Extended device ID (bytes 4 and 5 of RDID), 0 if not checked
    pub ext_id: u16,
    /// Sector size in bytes (the largest uniform erase unit)
    pub sector_size: u32,
    /// Number of sectors
    pub n_sectors: u32,
    /// Page size in bytes
    pub page_size: u32,
    /// Feature flags
    pub features: Features,
}

/// Build a chip name, truncating at [`CHIP_NAME_LEN`] bytes
pub fn chip_name(name: &str) -> ChipName {
    let mut out = ChipName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl FlashChip {
    /// Create a chip definition with a 256-byte page
    ///
    /// Names longer than [`CHIP_NAME_LEN`] are truncated.
    pub fn new(
        name: &str,
        jedec: u32,
        ext_id: u16,
        sector_size: u32,
        n_sectors: u32,
        features: Features,
    ) -> Self {
        Self {
            name: chip_name(name),
            manufacturer_id: (jedec >> 16) as u8,
            device_id: jedec as u16,
            ext_id,
            sector_size,
            n_sectors,
            page_size: 256,
            features,
        }
    }

    /// Get the total size of one chip in bytes
    pub fn total_size(&self) -> u64 {
        self.sector_size as u64 * self.n_sectors as u64
    }

    /// Check if a 5-byte JEDEC ID response matches this chip
    pub fn matches(&self, id: &[u8; 5]) -> bool {
        let device = u16::from_be_bytes([id[1], id[2]]);
        let ext = u16::from_be_bytes([id[3], id[4]]);
        self.manufacturer_id == id[0]
            && self.device_id == device
            && (self.ext_id == 0 || self.ext_id == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_with_and_without_ext_id() {
        let plain = FlashChip::new("W25Q128", 0xEF4018, 0, 64 * 1024, 256, Features::SECT_4K);
        assert!(plain.matches(&[0xEF, 0x40, 0x18, 0x12, 0x34]));
        assert!(!plain.matches(&[0xEF, 0x40, 0x17, 0x00, 0x00]));

        let ext = FlashChip::new("S25FL256S_64K", 0x010219, 0x4D01, 64 * 1024, 512, Features::empty());
        assert!(ext.matches(&[0x01, 0x02, 0x19, 0x4D, 0x01]));
        assert!(!ext.matches(&[0x01, 0x02, 0x19, 0x4D, 0x00]));
    }

    #[test]
    fn test_name_truncated() {
        let chip = FlashChip::new(
            "A-VERY-LONG-CHIP-NAME-THAT-DOES-NOT-FIT",
            0xEF4018,
            0,
            4096,
            1,
            Features::empty(),
        );
        assert_eq!(chip.name.len(), CHIP_NAME_LEN);
        assert_eq!(chip.total_size(), 4096);
    }
}
