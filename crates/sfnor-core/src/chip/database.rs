//! Chip lookup
//!
//! A [`ChipDatabase`] maps the five RDID bytes a chip returns onto its
//! geometry and features. The built-in table is shared process-wide; tables
//! loaded at runtime (see `load_ron` under the `std` feature) live in their
//! own database.

use alloc::boxed::Box;
use alloc::vec::Vec;

use once_cell::race::OnceBox;

use super::builtin;
use super::types::FlashChip;

static BUILTIN: OnceBox<ChipDatabase> = OnceBox::new();

/// Collection of known flash chips
#[derive(Debug, Clone, Default)]
pub struct ChipDatabase {
    pub(super) chips: Vec<FlashChip>,
}

impl ChipDatabase {
    /// Create an empty chip database
    pub fn new() -> Self {
        Self { chips: Vec::new() }
    }

    /// The table of parts compiled into this crate
    pub fn builtin() -> &'static ChipDatabase {
        BUILTIN.get_or_init(|| {
            Box::new(ChipDatabase {
                chips: builtin::chips(),
            })
        })
    }

    /// Database holding a copy of the built-in table, ready to be extended
    pub fn with_builtin() -> Self {
        Self::builtin().clone()
    }

    /// Add a chip definition
    pub fn add(&mut self, chip: FlashChip) {
        self.chips.push(chip);
    }

    /// Get all chips in the database
    pub fn chips(&self) -> &[FlashChip] {
        &self.chips
    }

    /// Get the number of chips in the database
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// Find the chip answering with the given RDID bytes
    ///
    /// Entries that check the extended id win over entries that don't.
    pub fn find_by_id(&self, id: &[u8; 5]) -> Option<&FlashChip> {
        let mut fallback = None;
        for chip in self.chips.iter().filter(|c| c.matches(id)) {
            if chip.ext_id != 0 {
                return Some(chip);
            }
            fallback.get_or_insert(chip);
        }
        fallback
    }

    /// Find a chip by exact name (ASCII case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&FlashChip> {
        self.chips
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Iterate over all chips
    pub fn iter(&self) -> impl Iterator<Item = &FlashChip> {
        self.chips.iter()
    }
}
