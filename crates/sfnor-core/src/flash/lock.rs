//! Block-protect range arithmetic
//!
//! STMicro style parts protect a power-of-two sized region at the top of
//! the flash. BP2..BP0 in status register 1 hold `7 - log2(size / len)`, so
//! all ones protect everything and zero protects nothing.
//!
//! The functions here are pure: they take the current status register and
//! return the value to write, leaving the bus traffic to the caller.

use crate::error::{Error, Result};
use crate::spi::opcodes::{SR1_BP0, SR1_BP1, SR1_BP2};

/// Status register bits holding the protected-region size
pub const BP_MASK: u8 = SR1_BP2 | SR1_BP1 | SR1_BP0;
const BP_SHIFT: u32 = BP_MASK.trailing_zeros();

/// ceil(log2(v)) for v >= 1
fn order_base_2(v: u32) -> u32 {
    if v <= 1 {
        0
    } else {
        u32::BITS - (v - 1).leading_zeros()
    }
}

/// Region protected by `sr` as (offset, len); len 0 if nothing is
pub fn locked_range(size: u32, sr: u8) -> (u32, u32) {
    let bp = sr & BP_MASK;
    if bp == 0 {
        return (0, 0);
    }
    let pow = ((bp ^ BP_MASK) >> BP_SHIFT) as u32;
    let len = size >> pow;
    (size - len, len)
}

/// Returns true if `[ofs, ofs + len)` lies entirely in the region `sr` protects
pub fn is_locked_sr(size: u32, ofs: u32, len: u32, sr: u8) -> bool {
    let (lock_ofs, lock_len) = locked_range(size, sr);
    ofs as u64 + len as u64 <= lock_ofs as u64 + lock_len as u64 && ofs >= lock_ofs
}

/// Status register value protecting `[ofs, ofs + len)`
///
/// Returns `None` when the range is already protected. Protection always
/// extends to the end of the flash, so a range below the top is accepted
/// only if everything above it is already protected. The result never
/// protects less than `sr` did.
pub fn lock_sr(size: u32, ofs: u32, len: u32, sr: u8) -> Result<Option<u8>> {
    if is_locked_sr(size, ofs, len, sr) {
        return Ok(None);
    }

    let mut len = len;
    let end = ofs as u64 + len as u64;
    if end != size as u64 {
        // The rest up to the top must already be protected
        if end > size as u64 || !is_locked_sr(size, end as u32, size - end as u32, sr) {
            return Err(Error::LockRangeUnsupported);
        }
        len = size - ofs;
    }
    if len == 0 {
        return Err(Error::LockRangeUnsupported);
    }

    let pow = size.ilog2() - len.ilog2();
    let val = (BP_MASK as u32)
        .checked_sub(pow << BP_SHIFT)
        .ok_or(Error::LockRangeUnsupported)?;
    if val & !(BP_MASK as u32) != 0 || val == 0 {
        return Err(Error::LockRangeUnsupported);
    }

    let new = (sr & !BP_MASK) | val as u8;
    if new & BP_MASK <= sr & BP_MASK {
        return Err(Error::LockRangeUnsupported);
    }
    Ok(Some(new))
}

/// Returns true if no byte of `[ofs, ofs + len)` is protected by `sr`
pub fn is_unlocked_sr(size: u32, ofs: u32, len: u32, sr: u8) -> bool {
    let (lock_ofs, lock_len) = locked_range(size, sr);
    ofs as u64 >= lock_ofs as u64 + lock_len as u64 || ofs as u64 + len as u64 <= lock_ofs as u64
}

/// Status register value unprotecting `[ofs, ofs + len)`
///
/// Returns `None` when nothing in the range is protected. Refuses when the
/// erase unit just below `ofs` is protected: the protected region only
/// shrinks from the bottom. The result never protects more than `sr` did.
pub fn unlock_sr(size: u32, erase_size: u32, ofs: u32, len: u32, sr: u8) -> Result<Option<u8>> {
    if is_unlocked_sr(size, ofs, len, sr) {
        return Ok(None);
    }
    if let Some(below) = ofs.checked_sub(erase_size) {
        if is_locked_sr(size, below, erase_size, sr) {
            return Err(Error::LockRangeUnsupported);
        }
    }

    let end = ofs as u64 + len as u64;
    if end > size as u64 {
        return Err(Error::LockRangeUnsupported);
    }

    let val = if end == size as u64 {
        0
    } else {
        let pow = size
            .ilog2()
            .checked_sub(order_base_2(size - end as u32))
            .ok_or(Error::LockRangeUnsupported)?;
        let val = (BP_MASK as u32)
            .checked_sub(pow << BP_SHIFT)
            .ok_or(Error::LockRangeUnsupported)?;
        if val & !(BP_MASK as u32) != 0 {
            return Err(Error::LockRangeUnsupported);
        }
        val
    };

    let new = (sr & !BP_MASK) | val as u8;
    if new & BP_MASK >= sr & BP_MASK {
        return Err(Error::LockRangeUnsupported);
    }
    Ok(Some(new))
}
