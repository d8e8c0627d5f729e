//! One emulated NOR chip
//!
//! Cells are kept in a shared `Rc<[Cell<u8>]>` so a memory-mapped window can
//! point at them while transfers keep programming and erasing.

use alloc::rc::Rc;
use core::cell::Cell;
use core::ptr::NonNull;

use sfnor_core::chip::mfr;
use sfnor_core::flash::lock;
use sfnor_core::spi::opcodes;
use sfnor_core::transport::MemoryMap;

pub(crate) struct Die {
    mem: Rc<[Cell<u8>]>,
    pub(crate) sr1: u8,
    pub(crate) sr2: u8,
    pub(crate) bank: u8,
    pub(crate) wel: bool,
    busy: u32,
    fsr_busy: u32,
}

impl Die {
    pub(crate) fn new(len: usize, sr1: u8) -> Self {
        let mem = core::iter::repeat_with(|| Cell::new(0xFF)).take(len).collect();
        Self {
            mem,
            sr1: sr1 & !(opcodes::SR1_WIP | opcodes::SR1_WEL),
            sr2: 0,
            bank: 0,
            wel: false,
            busy: 0,
            fsr_busy: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.mem.len()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy > 0
    }

    /// Mark an internal operation as started; it completes after `polls` status reads
    pub(crate) fn start_busy(&mut self, polls: u32) {
        self.wel = false;
        self.busy = polls;
        self.fsr_busy = polls;
    }

    /// SR1 as the chip reports it, counting down the busy time
    pub(crate) fn poll_status1(&mut self, stuck: bool) -> u8 {
        let mut sr = self.sr1;
        if self.wel {
            sr |= opcodes::SR1_WEL;
        }
        if stuck || self.busy > 0 {
            sr |= opcodes::SR1_WIP;
            self.busy = self.busy.saturating_sub(1);
        }
        sr
    }

    pub(crate) fn poll_flag_status(&mut self) -> u8 {
        if self.fsr_busy > 0 {
            self.fsr_busy -= 1;
            0
        } else {
            opcodes::FSR_READY
        }
    }

    /// Write SR1 (and SR2 when given); WIP and WEL are not writable
    pub(crate) fn write_status(&mut self, data: &[u8]) {
        if let Some(&sr1) = data.first() {
            self.sr1 = sr1 & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
        }
        if let Some(&sr2) = data.get(1) {
            self.sr2 = sr2;
        }
    }

    pub(crate) fn quad_enabled(&self, manufacturer: u8) -> bool {
        match manufacturer {
            mfr::MACRONIX | mfr::ISSI => self.sr1 & opcodes::SR1_QE_MX != 0,
            mfr::WINBOND | mfr::SPANSION | mfr::GIGADEVICE => self.sr2 & opcodes::SR2_QE != 0,
            _ => true,
        }
    }

    /// Returns true if any byte of `[start, start + len)` is block-protected
    pub(crate) fn overlaps_protected(&self, start: usize, len: usize) -> bool {
        let (ofs, locked) = lock::locked_range(self.mem.len() as u32, self.sr1);
        let (ofs, locked) = (ofs as usize, locked as usize);
        locked > 0 && start < ofs + locked && ofs < start + len
    }

    pub(crate) fn read(&self, start: usize, buf: &mut [u8]) {
        for (dst, cell) in buf.iter_mut().zip(&self.mem[start..]) {
            *dst = cell.get();
        }
    }

    /// Page program: bits only go from 1 to 0, and the address wraps inside the page
    pub(crate) fn program(&self, start: usize, data: &[u8], page: usize) {
        let base = start - start % page;
        for (i, &b) in data.iter().enumerate() {
            let cell = &self.mem[base + (start - base + i) % page];
            cell.set(cell.get() & b);
        }
    }

    /// Erase the `unit`-sized block containing `addr`
    pub(crate) fn erase(&self, addr: usize, unit: usize) {
        let base = addr - addr % unit;
        let end = (base + unit).min(self.mem.len());
        for cell in &self.mem[base..end] {
            cell.set(0xFF);
        }
    }

    /// Overwrite cells directly, bypassing the command set
    pub(crate) fn load(&self, start: usize, data: &[u8]) {
        for (cell, &b) in self.mem[start..].iter().zip(data) {
            cell.set(b);
        }
    }

    pub(crate) fn memory_map(&self) -> MemoryMap {
        let base = NonNull::from(&*self.mem).cast::<u8>();
        // SAFETY: the cells live as long as any clone of the owning handle,
        // which the bound slave holds; Cell<u8> has the layout of u8.
        unsafe { MemoryMap::new(base, self.mem.len()) }
    }
}
