//! Error types for sfnor-core
//!
//! A single `Copy` error type is shared by every layer. Each variant maps
//! onto one of five coarse [`ErrorKind`]s so callers can react to the class
//! of failure without matching on every detail.

use core::fmt;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The underlying SPI transfer failed
    Transport,
    /// Status polling did not observe completion in time
    Timeout,
    /// Offset, length, alignment or parameter rejected before touching the device
    BadArgument,
    /// Optional operation not bound, or region protected against modification
    NotSupported,
    /// Chip identity unknown, parameters unusable or transport unavailable
    Probe,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// SPI transfer failed
    SpiTransferFailed,
    /// The SPI bus could not be claimed
    BusClaimFailed,
    /// The controller cannot frame the requested lane arrangement
    ProtocolNotSupported,

    /// Status polling timed out
    Timeout,

    // Argument errors
    /// Offset or length is beyond flash size
    AddressOutOfBounds,
    /// Operation requires aligned offset or length
    InvalidAlignment,
    /// Raw value is not one of the defined protocol encodings
    InvalidProtocol,
    /// Descriptor geometry violates its invariants
    InvalidGeometry,
    /// The chip's protection scheme cannot express the requested range
    LockRangeUnsupported,

    // Unsupported operations
    /// Optional operation is not bound on this descriptor
    OperationNotSupported,
    /// Region is protected and cannot be modified
    RegionProtected,

    // Probe errors
    /// JEDEC ID did not match any known chip
    ChipNotFound {
        /// Manufacturer byte read from the chip
        manufacturer: u8,
        /// Device id read from the chip
        device: u16,
    },
    /// No SPI slave answers at the given coordinates
    SlaveUnavailable {
        /// Bus number
        bus: u32,
        /// Chip-select
        cs: u32,
    },
    /// The slave did not answer while it was being identified
    TransportUnavailable,
    /// A quad protocol was selected but quad mode could not be enabled
    QuadEnableFailed,
    /// No registered driver matches the slave description
    NoDriver,
}

impl Error {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SpiTransferFailed | Self::BusClaimFailed | Self::ProtocolNotSupported => {
                ErrorKind::Transport
            }
            Self::Timeout => ErrorKind::Timeout,
            Self::AddressOutOfBounds
            | Self::InvalidAlignment
            | Self::InvalidProtocol
            | Self::InvalidGeometry
            | Self::LockRangeUnsupported => ErrorKind::BadArgument,
            Self::OperationNotSupported | Self::RegionProtected => ErrorKind::NotSupported,
            Self::ChipNotFound { .. }
            | Self::SlaveUnavailable { .. }
            | Self::TransportUnavailable
            | Self::QuadEnableFailed
            | Self::NoDriver => ErrorKind::Probe,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport failure"),
            Self::Timeout => write!(f, "timeout"),
            Self::BadArgument => write!(f, "bad argument"),
            Self::NotSupported => write!(f, "not supported"),
            Self::Probe => write!(f, "probe failure"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::BusClaimFailed => write!(f, "failed to claim SPI bus"),
            Self::ProtocolNotSupported => write!(f, "SPI protocol not supported by controller"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::InvalidProtocol => write!(f, "invalid SPI protocol encoding"),
            Self::InvalidGeometry => write!(f, "invalid flash geometry"),
            Self::LockRangeUnsupported => write!(f, "range cannot be locked or unlocked"),
            Self::OperationNotSupported => write!(f, "operation not supported"),
            Self::RegionProtected => write!(f, "region is protected"),
            Self::ChipNotFound {
                manufacturer,
                device,
            } => write!(
                f,
                "unrecognized JEDEC id {:02X}:{:04X}",
                manufacturer, device
            ),
            Self::SlaveUnavailable { bus, cs } => {
                write!(f, "no SPI slave at bus {} cs {}", bus, cs)
            }
            Self::TransportUnavailable => write!(f, "SPI slave did not respond to probe"),
            Self::QuadEnableFailed => write!(f, "failed to enable quad mode"),
            Self::NoDriver => write!(f, "no driver for SPI flash node"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(Error::SpiTransferFailed.kind(), ErrorKind::Transport);
        assert_eq!(Error::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(Error::InvalidAlignment.kind(), ErrorKind::BadArgument);
        assert_eq!(Error::RegionProtected.kind(), ErrorKind::NotSupported);
        assert_eq!(Error::OperationNotSupported.kind(), ErrorKind::NotSupported);
        assert_eq!(
            Error::ChipNotFound {
                manufacturer: 0xEF,
                device: 0x4018
            }
            .kind(),
            ErrorKind::Probe
        );
        assert_eq!(Error::TransportUnavailable.kind(), ErrorKind::Probe);
    }

    #[test]
    fn test_lock_rejection_is_not_unsupported() {
        assert_ne!(
            Error::LockRangeUnsupported.kind(),
            Error::OperationNotSupported.kind()
        );
    }
}
