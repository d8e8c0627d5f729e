//! Built-in chip table

use alloc::vec::Vec;

use super::features::Features;
use super::types::FlashChip;

const K64: u32 = 64 * 1024;
const K256: u32 = 256 * 1024;

const RD_QUAD_PARTS: Features = Features::RD_FULL.union(Features::WR_QPP);

/// Parts known without loading any table
pub(crate) fn chips() -> Vec<FlashChip> {
    let mut chips = Vec::with_capacity(16);

    // Atmel
    chips.push(FlashChip::new("AT25DF321", 0x1F4701, 0, K64, 64, Features::SECT_4K));
    chips.push(FlashChip::new("AT25DF641", 0x1F4800, 0, K64, 128, Features::SECT_4K));

    // GigaDevice
    chips.push(FlashChip::new(
        "GD25Q64B",
        0xC84017,
        0,
        K64,
        128,
        Features::SECT_4K.union(Features::RD_FULL),
    ));
    chips.push(FlashChip::new(
        "GD25LQ128",
        0xC86018,
        0,
        K64,
        256,
        Features::SECT_4K.union(Features::RD_FULL),
    ));

    // ISSI
    chips.push(FlashChip::new(
        "IS25LP128",
        0x9D6018,
        0,
        K64,
        256,
        Features::SECT_4K.union(Features::RD_FULL),
    ));

    // Macronix
    chips.push(FlashChip::new("MX25L6405D", 0xC22017, 0, K64, 128, Features::SECT_4K));
    chips.push(FlashChip::new("MX25L12805", 0xC22018, 0, K64, 256, RD_QUAD_PARTS));
    chips.push(FlashChip::new("MX25L25635F", 0xC22019, 0, K64, 512, RD_QUAD_PARTS));

    // Spansion
    chips.push(FlashChip::new("S25FL116K", 0x014015, 0, K64, 32, Features::SECT_4K));
    chips.push(FlashChip::new("S25FL128S_64K", 0x012018, 0x4D01, K64, 256, RD_QUAD_PARTS));
    chips.push(FlashChip::new("S25FL256S_256K", 0x010219, 0x4D00, K256, 128, RD_QUAD_PARTS));
    chips.push(FlashChip::new("S25FL256S_64K", 0x010219, 0x4D01, K64, 512, RD_QUAD_PARTS));

    // STMicro / Micron
    chips.push(FlashChip::new("M25P80", 0x202014, 0, K64, 16, Features::LOCK_BP));
    chips.push(FlashChip::new("M25P128", 0x202018, 0, K256, 64, Features::LOCK_BP));
    chips.push(FlashChip::new(
        "N25Q128",
        0x20BA18,
        0,
        K64,
        256,
        Features::SECT_4K.union(RD_QUAD_PARTS),
    ));
    chips.push(FlashChip::new(
        "N25Q256",
        0x20BA19,
        0,
        K64,
        512,
        Features::SECT_4K
            .union(RD_QUAD_PARTS)
            .union(Features::E_FSR),
    ));

    // SST
    chips.push(FlashChip::new("SST25VF016B", 0xBF2541, 0, K64, 32, Features::SECT_4K));

    // Winbond
    chips.push(FlashChip::new(
        "W25Q64FV",
        0xEF4017,
        0,
        K64,
        128,
        Features::SECT_4K.union(RD_QUAD_PARTS),
    ));
    chips.push(FlashChip::new(
        "W25Q128FV",
        0xEF4018,
        0,
        K64,
        256,
        Features::SECT_4K.union(RD_QUAD_PARTS),
    ));
    chips.push(FlashChip::new(
        "W25Q256JV",
        0xEF4019,
        0,
        K64,
        512,
        Features::SECT_4K
            .union(RD_QUAD_PARTS)
            .union(Features::ADDR_4B),
    ));

    chips
}
