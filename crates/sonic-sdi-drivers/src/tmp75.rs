//! TMP75 digital temperature sensor.

use parking_lot::Mutex;
use sonic_sdi::driver::require_bus;
use sonic_sdi::types::ThresholdKind;
use sonic_sdi::{
    BusHandle, Device, DeviceConfig, DeviceDriver, I2cBus, ResourceOps, SdiContext, SdiError,
    SdiResult, TemperatureSensor,
};
use std::sync::Arc;
use tracing::{debug, error};

const TEMP_REG: u8 = 0x00;
const TLOW_REG: u8 = 0x02;
const THIGH_REG: u8 = 0x03;

pub const DEFAULT_THIGH: i32 = 80;
pub const DEFAULT_TLOW: i32 = 70;

#[derive(Debug, Clone, Copy)]
struct Thresholds {
    low: i32,
    high: i32,
}

/// One TMP75 chip. Thresholds are cached after they are written.
#[derive(Debug)]
pub struct Tmp75 {
    bus: Arc<I2cBus>,
    addr: u16,
    defaults: Thresholds,
    thresholds: Mutex<Thresholds>,
}

impl Tmp75 {
    pub fn new(bus: Arc<I2cBus>, addr: u16, low: i32, high: i32) -> Self {
        let defaults = Thresholds { low, high };
        Self {
            bus,
            addr,
            defaults,
            thresholds: Mutex::new(defaults),
        }
    }

    fn register_for(kind: ThresholdKind) -> SdiResult<u8> {
        match kind {
            ThresholdKind::Low => Ok(TLOW_REG),
            ThresholdKind::High => Ok(THIGH_REG),
            ThresholdKind::Critical => Err(SdiError::unsupported("threshold_set")),
        }
    }

    fn write_threshold(&self, kind: ThresholdKind, value: i32) -> SdiResult<()> {
        let reg = Self::register_for(kind)?;
        let raw = i8::try_from(value).map_err(|_| {
            SdiError::out_of_range(format!("threshold {} outside the 8-bit register range", value))
        })?;
        self.bus
            .write_byte_data(self.addr, reg, raw as u8)
            .inspect_err(|e| error!(addr = self.addr, reg, error = %e, "tmp75 write failed"))?;
        let mut cached = self.thresholds.lock();
        match kind {
            ThresholdKind::Low => cached.low = value,
            _ => cached.high = value,
        }
        Ok(())
    }
}

impl TemperatureSensor for Tmp75 {
    /// Programs the configured default thresholds.
    fn init(&self) -> SdiResult<()> {
        self.write_threshold(ThresholdKind::Low, self.defaults.low)?;
        self.write_threshold(ThresholdKind::High, self.defaults.high)?;
        debug!(addr = self.addr, low = self.defaults.low, high = self.defaults.high, "tmp75 initialized");
        Ok(())
    }

    fn temperature(&self) -> SdiResult<i32> {
        let raw = self
            .bus
            .read_byte_data(self.addr, TEMP_REG)
            .inspect_err(|e| error!(addr = self.addr, error = %e, "tmp75 read failed"))?;
        Ok(i32::from(raw as i8))
    }

    fn threshold(&self, kind: ThresholdKind) -> SdiResult<i32> {
        let cached = self.thresholds.lock();
        match kind {
            ThresholdKind::Low => Ok(cached.low),
            ThresholdKind::High => Ok(cached.high),
            ThresholdKind::Critical => Err(SdiError::unsupported("threshold_get")),
        }
    }

    fn set_threshold(&self, kind: ThresholdKind, value: i32) -> SdiResult<()> {
        self.write_threshold(kind, value)
    }

    fn status(&self) -> SdiResult<bool> {
        let temp = self.temperature()?;
        let t = *self.thresholds.lock();
        Ok(temp >= t.high || temp <= t.low)
    }
}

struct Tmp75Device {
    alias: String,
}

impl Device for Tmp75Device {
    fn alias(&self) -> &str {
        &self.alias
    }
}

/// Driver `tmp75`. Attributes: `low_threshold`, `high_threshold`.
#[derive(Debug, Default)]
pub struct Tmp75Driver;

impl DeviceDriver for Tmp75Driver {
    fn name(&self) -> &'static str {
        "tmp75"
    }

    fn register(
        &self,
        node: &DeviceConfig,
        bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>> {
        let bus = require_bus(node, bus)?.i2c(self.name())?;
        let addr = node.required_address()?;
        let low = node.attr_i64("low_threshold")?.map_or(DEFAULT_TLOW, |v| v as i32);
        let high = node.attr_i64("high_threshold")?.map_or(DEFAULT_THIGH, |v| v as i32);
        let alias = node.alias_or("tmp75");
        ctx.registry().register(
            alias.clone(),
            alias.clone(),
            ResourceOps::Temperature(Arc::new(Tmp75::new(bus, addr, low, high))),
        );
        Ok(Box::new(Tmp75Device { alias }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_sdi_sim::SimI2cBus;

    fn chip() -> (SimI2cBus, Tmp75) {
        let sim = SimI2cBus::new("i2c-2");
        let bus = Arc::new(I2cBus::new(Box::new(sim.clone())));
        (sim, Tmp75::new(bus, 0x48, DEFAULT_TLOW, DEFAULT_THIGH))
    }

    #[test]
    fn test_init_programs_defaults() {
        let (sim, tmp) = chip();
        tmp.init().unwrap();
        assert_eq!(sim.regs(0x48, u16::from(TLOW_REG), 2), vec![70, 80]);
        assert_eq!(tmp.threshold(ThresholdKind::High).unwrap(), 80);
    }

    #[test]
    fn test_negative_temperature() {
        let (sim, tmp) = chip();
        sim.set_regs(0x48, u16::from(TEMP_REG), &[(-20i8) as u8]);
        assert_eq!(tmp.temperature().unwrap(), -20);
    }

    #[test]
    fn test_threshold_range() {
        let (_sim, tmp) = chip();
        assert!(matches!(
            tmp.set_threshold(ThresholdKind::High, 200),
            Err(SdiError::OutOfRange { .. })
        ));
        assert!(tmp.set_threshold(ThresholdKind::Critical, 90).unwrap_err().is_unsupported());
        tmp.set_threshold(ThresholdKind::Low, -10).unwrap();
        assert_eq!(tmp.threshold(ThresholdKind::Low).unwrap(), -10);
    }

    #[test]
    fn test_status_reports_fault_outside_window() {
        let (sim, tmp) = chip();
        tmp.set_threshold(ThresholdKind::Low, 10).unwrap();
        sim.set_regs(0x48, u16::from(TEMP_REG), &[45]);
        assert!(!tmp.status().unwrap());
        sim.set_regs(0x48, u16::from(TEMP_REG), &[80]);
        assert!(tmp.status().unwrap());
        sim.set_regs(0x48, u16::from(TEMP_REG), &[10]);
        assert!(tmp.status().unwrap());
    }
}
