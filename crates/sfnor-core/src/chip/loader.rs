//! Runtime loading of chip tables from RON
//!
//! A table file describes one vendor:
//!
//! ```text
//! (
//!     vendor: "Winbond",
//!     manufacturer_id: 0xEF,
//!     chips: [
//!         (
//!             name: "W25Q128FV",
//!             device_id: 0x4018,
//!             sector_size: KiB(64),
//!             n_sectors: 256,
//!             features: (sect_4k: true, rd_full: true, wr_qpp: true),
//!         ),
//!     ],
//! )
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::string::String;
use std::vec::Vec;

use super::database::ChipDatabase;
use super::features::Features;
use super::types::{chip_name, FlashChip, CHIP_NAME_LEN};

/// Error type for chip database operations
#[derive(Debug, thiserror::Error)]
pub enum ChipDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A definition was parsed but is unusable
    #[error("invalid chip {name}: {reason}")]
    Validation {
        /// Chip name as written in the table
        name: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Size with human-readable units
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
    /// Size in mebibytes (1024 * 1024 bytes)
    MiB(u32),
}

impl Size {
    /// Convert to bytes
    pub fn to_bytes(self) -> u32 {
        match self {
            Size::B(n) => n,
            Size::KiB(n) => n * 1024,
            Size::MiB(n) => n * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(default)]
struct FeaturesDef {
    sect_4k: bool,
    sect_32k: bool,
    e_fsr: bool,
    wr_qpp: bool,
    rd_dual: bool,
    rd_quad: bool,
    rd_dualio: bool,
    rd_quadio: bool,
    rd_full: bool,
    addr_4b: bool,
    lock_bp: bool,
}

impl From<FeaturesDef> for Features {
    fn from(def: FeaturesDef) -> Self {
        let mut f = Features::empty();
        f.set(Features::SECT_4K, def.sect_4k);
        f.set(Features::SECT_32K, def.sect_32k);
        f.set(Features::E_FSR, def.e_fsr);
        f.set(Features::WR_QPP, def.wr_qpp);
        f.set(Features::RD_DUAL, def.rd_dual);
        f.set(Features::RD_QUAD, def.rd_quad);
        f.set(Features::RD_DUALIO, def.rd_dualio);
        f.set(Features::RD_QUADIO, def.rd_quadio);
        f.set(Features::ADDR_4B, def.addr_4b);
        f.set(Features::LOCK_BP, def.lock_bp);
        if def.rd_full {
            f |= Features::RD_FULL;
        }
        f
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct ChipDef {
    name: String,
    device_id: u16,
    #[serde(default)]
    ext_id: u16,
    sector_size: Size,
    n_sectors: u32,
    #[serde(default = "default_page_size")]
    page_size: Size,
    #[serde(default)]
    features: FeaturesDef,
}

fn default_page_size() -> Size {
    Size::B(256)
}

#[derive(Debug, Clone, serde::Deserialize)]
struct VendorDef {
    #[allow(dead_code)]
    vendor: String,
    manufacturer_id: u8,
    chips: Vec<ChipDef>,
}

impl ChipDef {
    fn into_chip(self, manufacturer_id: u8) -> Result<FlashChip, ChipDbError> {
        let invalid = |reason| ChipDbError::Validation {
            name: self.name.clone(),
            reason,
        };

        if self.name.len() > CHIP_NAME_LEN {
            return Err(invalid("name too long"));
        }
        let sector_size = self.sector_size.to_bytes();
        let page_size = self.page_size.to_bytes();
        if !sector_size.is_power_of_two() || !page_size.is_power_of_two() {
            return Err(invalid("sizes must be powers of two"));
        }
        if page_size > sector_size {
            return Err(invalid("page larger than sector"));
        }
        if self.n_sectors == 0 {
            return Err(invalid("no sectors"));
        }

        Ok(FlashChip {
            name: chip_name(&self.name),
            manufacturer_id,
            device_id: self.device_id,
            ext_id: self.ext_id,
            sector_size,
            n_sectors: self.n_sectors,
            page_size,
            features: self.features.into(),
        })
    }
}

impl ChipDatabase {
    /// Load chip definitions from a RON string
    ///
    /// Returns the number of chips added. Nothing is added if any entry is
    /// rejected.
    pub fn load_ron(&mut self, content: &str) -> Result<usize, ChipDbError> {
        let vendor: VendorDef = ron::from_str(content)?;
        let chips = vendor
            .chips
            .into_iter()
            .map(|def| def.into_chip(vendor.manufacturer_id))
            .collect::<Result<Vec<_>, _>>()?;

        let count = chips.len();
        log::debug!(
            "loaded {} chip definitions for manufacturer {:02X}",
            count,
            vendor.manufacturer_id
        );
        self.chips.extend(chips);
        Ok(count)
    }

    /// Load chip definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ChipDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ChipDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_ron() {
        let ron = r#"
        (
            vendor: "Winbond",
            manufacturer_id: 0xEF,
            chips: [
                (
                    name: "W25Q32JV",
                    device_id: 0x4016,
                    sector_size: KiB(64),
                    n_sectors: 64,
                    features: (sect_4k: true, rd_full: true, wr_qpp: true),
                ),
                (
                    name: "W25X10",
                    device_id: 0x3011,
                    sector_size: KiB(64),
                    n_sectors: 2,
                ),
            ],
        )
        "#;

        let mut db = ChipDatabase::new();
        assert_eq!(db.load_ron(ron).unwrap(), 2);

        let chip = db.find_by_id(&[0xEF, 0x40, 0x16, 0x00, 0x00]).unwrap();
        assert_eq!(chip.name, "W25Q32JV");
        assert_eq!(chip.total_size(), 4 * 1024 * 1024);
        assert_eq!(chip.page_size, 256);
        assert!(chip.features.contains(Features::RD_QUADIO | Features::WR_QPP));

        let chip = db.find_by_id(&[0xEF, 0x30, 0x11, 0x00, 0x00]).unwrap();
        assert!(chip.features.is_empty());
    }

    #[test]
    fn test_reject_bad_geometry() {
        let ron = r#"
        (
            vendor: "Nobody",
            manufacturer_id: 0x42,
            chips: [
                (name: "OK", device_id: 0x0001, sector_size: KiB(4), n_sectors: 1),
                (name: "ODD", device_id: 0x0002, sector_size: B(3000), n_sectors: 1),
            ],
        )
        "#;

        let mut db = ChipDatabase::new();
        let err = db.load_ron(ron).unwrap_err();
        assert!(matches!(err, ChipDbError::Validation { ref name, .. } if name == "ODD"));
        assert!(db.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let mut db = ChipDatabase::new();
        assert!(matches!(db.load_ron("(vendor: 1"), Err(ChipDbError::Parse(_))));
    }

    #[test]
    fn test_load_dir_reads_only_ron_files() {
        let dir = std::env::temp_dir().join(std::format!("sfnor-chips-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("macronix.ron"),
            r#"(vendor: "Macronix", manufacturer_id: 0xC2, chips: [
                (name: "MX25L3205D", device_id: 0x2016, sector_size: KiB(64), n_sectors: 64),
            ])"#,
        )
        .unwrap();
        fs::write(
            dir.join("gigadevice.ron"),
            r#"(vendor: "GigaDevice", manufacturer_id: 0xC8, chips: [
                (name: "GD25Q16", device_id: 0x4015, sector_size: KiB(64), n_sectors: 32),
                (name: "GD25Q32", device_id: 0x4016, sector_size: KiB(64), n_sectors: 64),
            ])"#,
        )
        .unwrap();
        fs::write(dir.join("README.txt"), "not a table").unwrap();

        let mut db = ChipDatabase::new();
        let loaded = db.load_dir(&dir);
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(loaded.unwrap(), 3);
        assert!(db.find_by_name("MX25L3205D").is_some());
        assert_eq!(db.find_by_name("GD25Q32").unwrap().total_size(), 4 * 1024 * 1024);
    }

    #[test]
    fn test_size_conversion() {
        assert_eq!(Size::B(256).to_bytes(), 256);
        assert_eq!(Size::KiB(4).to_bytes(), 4096);
        assert_eq!(Size::MiB(16).to_bytes(), 16777216);
    }
}
