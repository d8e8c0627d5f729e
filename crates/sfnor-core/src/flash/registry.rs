//! Driver registry
//!
//! Binds device-tree style slave nodes to flash drivers by their
//! `compatible` string. The generic [`SpiNorDriver`] serves
//! `"jedec,spi-nor"`; boards can register their own drivers next to it.

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::descriptor::SpiFlash;
use super::ops::FlashOps;
use super::probe::probe_slave;
use crate::chip::ChipDatabase;
use crate::error::{Error, Result};
use crate::transport::{SlaveConfig, SlaveNode, SpiHost, SpiSlave, JEDEC_SPI_NOR};

/// A flash driver that can bind to a slave
pub trait FlashDriver {
    /// Driver name, for logging
    fn name(&self) -> &'static str;

    /// Compatible strings this driver serves
    fn compatible(&self) -> &'static [&'static str];

    /// Bind to a slave, returning the operations for it
    fn bind(
        &self,
        slave: Box<dyn SpiSlave>,
        config: &SlaveConfig,
        db: &ChipDatabase,
    ) -> Result<Box<dyn FlashOps>>;
}

/// Generic JEDEC SPI NOR driver
#[derive(Debug, Clone, Copy, Default)]
pub struct SpiNorDriver;

impl FlashDriver for SpiNorDriver {
    fn name(&self) -> &'static str {
        "spi-nor"
    }

    fn compatible(&self) -> &'static [&'static str] {
        &[JEDEC_SPI_NOR]
    }

    fn bind(
        &self,
        slave: Box<dyn SpiSlave>,
        config: &SlaveConfig,
        db: &ChipDatabase,
    ) -> Result<Box<dyn FlashOps>> {
        Ok(Box::new(probe_slave(slave, config, db)?))
    }
}

/// Registered flash drivers
#[derive(Default)]
pub struct DriverRegistry {
    drivers: Vec<Box<dyn FlashDriver>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }

    /// Registry holding the built-in drivers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SpiNorDriver));
        registry
    }

    /// Add a driver; later registrations win for the same compatible string
    pub fn register(&mut self, driver: Box<dyn FlashDriver>) {
        self.drivers.push(driver);
    }

    /// Find the driver serving `compatible`
    pub fn find(&self, compatible: &str) -> Option<&dyn FlashDriver> {
        self.drivers
            .iter()
            .rev()
            .find(|d| d.compatible().iter().any(|c| *c == compatible))
            .map(|d| d.as_ref())
    }

    /// Set up the slave `node` describes and bind the matching driver
    ///
    /// # Errors
    /// * `NoDriver` - If no registered driver serves `node.compatible`
    /// * Any error from setting up the slave or from the driver
    pub fn probe_node<H: SpiHost>(
        &self,
        host: &mut H,
        node: &SlaveNode,
        db: &ChipDatabase,
    ) -> Result<SpiFlash>
    where
        H::Slave: 'static,
    {
        let driver = self.find(&node.compatible).ok_or_else(|| {
            log::warn!("no driver for compatible \"{}\"", node.compatible);
            Error::NoDriver
        })?;

        let config = node.slave_config();
        let slave = host.setup_slave(&config)?;
        log::debug!(
            "binding {} to bus {} cs {}",
            driver.name(),
            config.bus,
            config.cs
        );
        let ops = driver.bind(Box::new(slave), &config, db)?;
        SpiFlash::bind(ops)
    }
}

impl core::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.drivers.iter().map(|d| d.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refusing;

    impl FlashDriver for Refusing {
        fn name(&self) -> &'static str {
            "refusing"
        }

        fn compatible(&self) -> &'static [&'static str] {
            &["acme,refusing", JEDEC_SPI_NOR]
        }

        fn bind(
            &self,
            _slave: Box<dyn SpiSlave>,
            _config: &SlaveConfig,
            _db: &ChipDatabase,
        ) -> Result<Box<dyn FlashOps>> {
            Err(Error::OperationNotSupported)
        }
    }

    #[test]
    fn test_find_builtin() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(registry.find("jedec,spi-nor").unwrap().name(), "spi-nor");
        assert!(registry.find("acme,other").is_none());
        assert!(DriverRegistry::new().find("jedec,spi-nor").is_none());
    }

    #[test]
    fn test_later_registration_wins() {
        let mut registry = DriverRegistry::with_defaults();
        registry.register(Box::new(Refusing));
        assert_eq!(registry.find("jedec,spi-nor").unwrap().name(), "refusing");
        assert_eq!(registry.find("acme,refusing").unwrap().name(), "refusing");
    }
}
