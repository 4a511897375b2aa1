//! Device driver framework.
//!
//! A driver turns one device node of the platform description into a
//! device object, registering the device's resources in the context as a
//! side effect. Devices are initialized once the whole platform has been
//! registered.

use crate::config::DeviceConfig;
use crate::context::SdiContext;
use crate::error::{SdiError, SdiResult};
use crate::transport::{I2cBus, IndexedIoBus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Bus a device node is wired to.
#[derive(Debug, Clone)]
pub enum BusHandle {
    I2c(Arc<I2cBus>),
    Io(Arc<IndexedIoBus>),
}

impl BusHandle {
    pub fn name(&self) -> &str {
        match self {
            BusHandle::I2c(bus) => bus.name(),
            BusHandle::Io(bus) => bus.name(),
        }
    }

    /// The I2C bus, or `InvalidConfig` naming `driver`.
    pub fn i2c(&self, driver: &str) -> SdiResult<Arc<I2cBus>> {
        match self {
            BusHandle::I2c(bus) => Ok(bus.clone()),
            BusHandle::Io(bus) => Err(SdiError::invalid_config(
                format!("{}.bus", driver),
                format!("{} is not an I2C bus", bus.name()),
            )),
        }
    }

    pub fn io(&self, driver: &str) -> SdiResult<Arc<IndexedIoBus>> {
        match self {
            BusHandle::Io(bus) => Ok(bus.clone()),
            BusHandle::I2c(bus) => Err(SdiError::invalid_config(
                format!("{}.bus", driver),
                format!("{} is not an I/O bus", bus.name()),
            )),
        }
    }
}

/// A probed device.
pub trait Device: Send + Sync {
    fn alias(&self) -> &str;

    /// Brings the chip into its operating configuration.
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }
}

/// A chip family driver.
pub trait DeviceDriver: Send + Sync {
    /// Name device nodes refer to in their `driver` field.
    fn name(&self) -> &'static str;

    /// Creates the device for `node` and registers its resources in `ctx`.
    fn register(
        &self,
        node: &DeviceConfig,
        bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>>;
}

/// Returns the bus of `node` or an `InvalidConfig` error.
pub fn require_bus<'b>(node: &DeviceConfig, bus: Option<&'b BusHandle>) -> SdiResult<&'b BusHandle> {
    bus.ok_or_else(|| {
        SdiError::invalid_config(format!("{}.bus", node.driver), "device requires a bus")
    })
}

/// Drivers available to a platform, by name.
#[derive(Default, Clone)]
pub struct DriverTable {
    drivers: HashMap<&'static str, Arc<dyn DeviceDriver>>,
}

impl DriverTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a driver, replacing any previous driver of the same name.
    pub fn add(&mut self, driver: Arc<dyn DeviceDriver>) -> &mut Self {
        debug!(driver = driver.name(), "driver added");
        self.drivers.insert(driver.name(), driver);
        self
    }

    /// Merges every driver of `other` into this table.
    pub fn extend(&mut self, other: &DriverTable) -> &mut Self {
        for driver in other.drivers.values() {
            self.add(driver.clone());
        }
        self
    }

    pub fn find(&self, name: &str) -> SdiResult<Arc<dyn DeviceDriver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| SdiError::not_found(format!("driver {}", name)))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.drivers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for DriverTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
