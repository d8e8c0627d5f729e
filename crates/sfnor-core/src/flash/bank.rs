//! Bank register state
//!
//! Parts above 16 MiB driven with 3-byte addresses select the upper address
//! bits through a bank register. [`Bank`] remembers what each die currently
//! has selected so a switch is only sent when an access leaves that bank.

use super::info::{BankCmds, BANK_SIZE};

/// Bank selection state for one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bank {
    cmds: BankCmds,
    shift: u8,
    curr: [u8; 2],
}

impl Bank {
    /// Banking state with `initial` selected on both dies
    pub fn new(cmds: BankCmds, shift: u8, initial: [u8; 2]) -> Self {
        Self {
            cmds,
            shift,
            curr: initial,
        }
    }

    /// Bank register opcodes
    pub fn cmds(&self) -> BankCmds {
        self.cmds
    }

    /// Bytes of logical address space covered by one bank
    fn span(&self) -> u64 {
        (BANK_SIZE as u64) << self.shift
    }

    /// Bank holding the die-local logical address `addr`
    pub fn bank_of(&self, addr: u32) -> u8 {
        (addr as u64 / self.span()) as u8
    }

    /// Bytes from `addr` to the end of its bank
    pub fn remaining(&self, addr: u32) -> u32 {
        let end = self.span() * (self.bank_of(addr) as u64 + 1);
        (end - addr as u64).min(u32::MAX as u64) as u32
    }

    /// Bank currently selected on a die
    pub fn current(&self, upper: bool) -> u8 {
        self.curr[upper as usize]
    }

    /// Bank to write before accessing `addr`, or None if already selected
    pub fn switch_for(&self, addr: u32, upper: bool) -> Option<u8> {
        let bank = self.bank_of(addr);
        (bank != self.current(upper)).then_some(bank)
    }

    /// Record a completed bank register write
    pub fn set(&mut self, upper: bool, bank: u8) {
        self.curr[upper as usize] = bank;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    const CMDS: BankCmds = BankCmds {
        read_cmd: opcodes::BRRD,
        write_cmd: opcodes::BRWR,
    };

    #[test]
    fn test_bank_boundaries() {
        let bank = Bank::new(CMDS, 0, [0, 0]);
        assert_eq!(bank.bank_of(0), 0);
        assert_eq!(bank.bank_of(0x00FF_FFFF), 0);
        assert_eq!(bank.bank_of(0x0100_0000), 1);
        assert_eq!(bank.remaining(0x00FF_FFF0), 0x10);
        assert_eq!(bank.remaining(0x0100_0000), 0x0100_0000);
    }

    #[test]
    fn test_parallel_bank_span_doubles() {
        let bank = Bank::new(CMDS, 1, [0, 0]);
        assert_eq!(bank.bank_of(0x0100_0000), 0);
        assert_eq!(bank.bank_of(0x0200_0000), 1);
        assert_eq!(bank.remaining(0x01FF_FF00), 0x100);
    }

    #[test]
    fn test_switch_only_when_leaving_bank() {
        let mut bank = Bank::new(CMDS, 0, [0, 0]);
        assert_eq!(bank.switch_for(0x10, false), None);
        assert_eq!(bank.switch_for(0x0100_0010, false), Some(1));

        bank.set(false, 1);
        assert_eq!(bank.current(false), 1);
        assert_eq!(bank.switch_for(0x0100_0010, false), None);
        // Dies keep their own selection
        assert_eq!(bank.switch_for(0x0100_0010, true), Some(1));
    }
}
