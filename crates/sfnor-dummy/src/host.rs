//! Emulated SPI controller handing out [`DummyFlash`] slaves

use alloc::vec::Vec;

use sfnor_core::error::{Error, Result};
use sfnor_core::transport::{SlaveConfig, SpiHost};

use crate::DummyFlash;

/// A controller with emulated chips on some bus/chip-select pairs
#[derive(Default)]
pub struct DummyHost {
    slaves: Vec<(u32, u32, DummyFlash)>,
}

impl DummyHost {
    /// Create a host with nothing attached
    pub fn new() -> Self {
        Self { slaves: Vec::new() }
    }

    /// Attach `flash` at `bus`/`cs`, replacing whatever was there
    pub fn attach(&mut self, bus: u32, cs: u32, flash: DummyFlash) {
        self.slaves.retain(|&(b, c, _)| (b, c) != (bus, cs));
        self.slaves.push((bus, cs, flash));
    }

    /// Builder form of [`attach`](Self::attach)
    pub fn with_slave(mut self, bus: u32, cs: u32, flash: DummyFlash) -> Self {
        self.attach(bus, cs, flash);
        self
    }
}

impl SpiHost for DummyHost {
    type Slave = DummyFlash;

    fn setup_slave(&mut self, config: &SlaveConfig) -> Result<DummyFlash> {
        let (_, _, flash) = self
            .slaves
            .iter()
            .find(|&&(bus, cs, _)| bus == config.bus && cs == config.cs)
            .ok_or(Error::SlaveUnavailable {
                bus: config.bus,
                cs: config.cs,
            })?;
        log::trace!(
            "dummy slave at bus {} cs {}, {} Hz, mode {:?}",
            config.bus,
            config.cs,
            config.max_hz,
            config.mode
        );
        flash.set_slave_config(*config);
        Ok(flash.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DummyConfig;

    #[test]
    fn test_setup_known_and_unknown_slave() {
        let flash = DummyFlash::new(DummyConfig::default());
        let mut host = DummyHost::new().with_slave(1, 2, flash.clone());

        let config = SlaveConfig::new(1, 2, 25_000_000, Default::default());
        host.setup_slave(&config).unwrap();
        assert_eq!(flash.slave_config(), Some(config));

        let missing = SlaveConfig::new(1, 0, 25_000_000, Default::default());
        assert_eq!(
            host.setup_slave(&missing).err(),
            Some(Error::SlaveUnavailable { bus: 1, cs: 0 })
        );
    }
}
