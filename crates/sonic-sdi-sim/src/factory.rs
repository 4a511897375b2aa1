//! Bus factory and presence probes for running a platform description
//! without hardware.

use crate::bus::{SimI2cBus, SimIo};
use crate::store::{KvStore, StoreExt};
use dashmap::DashMap;
use sonic_sdi::{
    BusConfig, BusFactory, BusHandle, BusKind, I2cBus, IndexedIoBus, PresenceProbe, SdiResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Opens simulated buses and keeps a clone of each for inspection.
#[derive(Debug, Default)]
pub struct SimBusFactory {
    pointer_devices: HashSet<(String, u16)>,
    i2c: DashMap<String, SimI2cBus>,
    io: DashMap<String, SimIo>,
}

impl SimBusFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `addr` on bus `bus` a 16-bit pointer slave.
    pub fn pointer_device(mut self, bus: impl Into<String>, addr: u16) -> Self {
        self.pointer_devices.insert((bus.into(), addr));
        self
    }

    /// The simulated I2C bus opened for `name`.
    pub fn i2c(&self, name: &str) -> Option<SimI2cBus> {
        self.i2c.get(name).map(|b| b.value().clone())
    }

    pub fn io(&self, name: &str) -> Option<SimIo> {
        self.io.get(name).map(|b| b.value().clone())
    }
}

impl BusFactory for SimBusFactory {
    fn open(&self, config: &BusConfig) -> SdiResult<BusHandle> {
        debug!(bus = %config.name, kind = ?config.kind, "opening simulated bus");
        match config.kind {
            BusKind::I2c => {
                let sim = SimI2cBus::new(config.name.clone()).with_block_max(config.block_max);
                for (bus, addr) in &self.pointer_devices {
                    if *bus == config.name {
                        sim.add_pointer_device(*addr);
                    }
                }
                self.i2c.insert(config.name.clone(), sim.clone());
                Ok(BusHandle::I2c(Arc::new(I2cBus::new(Box::new(sim)))))
            }
            BusKind::Io => {
                let sim = SimIo::with_ports(config.name.clone(), config.ports());
                self.io.insert(config.name.clone(), sim.clone());
                Ok(BusHandle::Io(Arc::new(IndexedIoBus::new(
                    Box::new(sim),
                    config.ports(),
                ))))
            }
        }
    }
}

/// Presence from `<entity>.present` and `<entity>.power_good`, both
/// defaulting to true.
pub struct SimPresence {
    store: Arc<dyn KvStore>,
    entity: String,
}

impl SimPresence {
    pub fn new(store: Arc<dyn KvStore>, entity: impl Into<String>) -> Self {
        Self {
            store,
            entity: entity.into(),
        }
    }
}

impl PresenceProbe for SimPresence {
    fn present(&self) -> SdiResult<bool> {
        self.store.get_or(&format!("{}.present", self.entity), true)
    }

    fn power_good(&self) -> SdiResult<bool> {
        self.store.get_or(&format!("{}.power_good", self.entity), true)
    }
}
