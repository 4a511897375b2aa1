//! EMC2305 five channel fan controller.
//!
//! Each fan channel is registered as its own Fan resource. Speeds are set
//! either through the drive setting register (direct PWM control) or by
//! programming a tach target for the chip's closed loop RPM control.

use parking_lot::Mutex;
use sonic_sdi::driver::require_bus;
use sonic_sdi::{
    BusHandle, Device, DeviceConfig, DeviceDriver, FanController, I2cBus, ResourceOps, SdiContext,
    SdiError, SdiResult,
};
use std::sync::Arc;
use tracing::{debug, error, trace};

pub const MAX_FANS: u8 = 5;

const STATUS_REG: u8 = 0x24;
const STALL_STATUS_REG: u8 = 0x25;
const SPIN_STATUS_REG: u8 = 0x26;
const DRIVE_FAIL_STATUS_REG: u8 = 0x27;
const WATCHDOG_STATUS_MASK: u8 = 0x80;

const FAN_REG_STRIDE: u8 = 0x10;
const SETTING_REG: u8 = 0x30;
const CFG1_REG: u8 = 0x32;
const MIN_DRIVE_REG: u8 = 0x38;
const TACH_LTARG_REG: u8 = 0x3c;
const TACH_TARG_REG: u8 = 0x3d;
const TACH_REG: u8 = 0x3e;
const TACH_LBYTE_REG: u8 = 0x3f;

const MIN_DRIVE_VALUE: u8 = 0x50;
const SETTING_MAX: u32 = 0xff;
const TACH_FREQ: u32 = 32_768;
const RPM_CONST: u32 = 60;
const LTACH_SHIFT: u32 = 3;
const TACH_COUNT_MAX: u32 = 0x1fff;
const POLE_MASK: u8 = 0x18;
const POLE_SHIFT: u8 = 3;
const POLE_EDGES: [u32; 4] = [3, 5, 7, 9];
const DEFAULT_RANGE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Drive setting written directly.
    Direct,
    /// Closed loop on a tach target.
    Rpm,
}

impl ControlMode {
    fn cfg1_value(self) -> u8 {
        match self {
            ControlMode::Direct => 0x2b,
            ControlMode::Rpm => 0xab,
        }
    }
}

fn fan_reg(base: u8, fan_id: u8) -> u8 {
    base + FAN_REG_STRIDE * fan_id
}

/// Fixed electrical parameters of one fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanGeometry {
    pub poles: u32,
    pub edges: u32,
    pub range: u32,
}

impl FanGeometry {
    pub fn from_poles(poles: u32) -> Option<Self> {
        let edges = *POLE_EDGES.get(poles.checked_sub(1)? as usize)?;
        Some(Self {
            poles,
            edges,
            range: DEFAULT_RANGE,
        })
    }

    /// RPM for a raw tach reading (both bytes, count in the upper 13 bits).
    pub fn tach_to_rpm(&self, raw: u16) -> u32 {
        let count = u32::from(raw) >> LTACH_SHIFT;
        if count == 0 {
            return 0;
        }
        (self.edges - 1) * TACH_FREQ * self.range * RPM_CONST / (count * self.poles)
    }

    /// Raw tach target for `rpm`.
    pub fn rpm_to_tach(&self, rpm: u32) -> u16 {
        let count = if rpm == 0 {
            TACH_COUNT_MAX
        } else {
            let scaled = (self.edges - 1) * TACH_FREQ * RPM_CONST / self.poles * self.poles;
            (scaled / rpm).min(TACH_COUNT_MAX)
        };
        (count << LTACH_SHIFT) as u16
    }
}

/// One fan channel.
#[derive(Debug)]
pub struct Emc2305Fan {
    bus: Arc<I2cBus>,
    addr: u16,
    fan_id: u8,
    mode: ControlMode,
    geometry: FanGeometry,
    max_speed: Mutex<u32>,
}

impl Emc2305Fan {
    fn read(&self, reg: u8) -> SdiResult<u8> {
        self.bus
            .read_byte_data(self.addr, reg)
            .inspect_err(|e| error!(addr = self.addr, reg, error = %e, "emc2305 read failed"))
    }

    fn write(&self, reg: u8, value: u8) -> SdiResult<()> {
        self.bus
            .write_byte_data(self.addr, reg, value)
            .inspect_err(|e| error!(addr = self.addr, reg, error = %e, "emc2305 write failed"))
    }

    pub fn max_speed(&self) -> u32 {
        *self.max_speed.lock()
    }
}

impl FanController for Emc2305Fan {
    /// Lowers the minimum drive so slow platforms can reach their floor,
    /// then runs the fan at full speed.
    fn init(&self, max_rpm: u32) -> SdiResult<()> {
        self.write(fan_reg(MIN_DRIVE_REG, self.fan_id), MIN_DRIVE_VALUE)?;
        let max = {
            let mut max = self.max_speed.lock();
            if *max == 0 && max_rpm != 0 {
                *max = max_rpm;
            }
            *max
        };
        self.set_speed(max)
    }

    fn speed(&self) -> SdiResult<u32> {
        let hi = self.read(fan_reg(TACH_REG, self.fan_id))?;
        let lo = self.read(fan_reg(TACH_LBYTE_REG, self.fan_id))?;
        let rpm = self.geometry.tach_to_rpm(u16::from_be_bytes([hi, lo]));
        trace!(fan = self.fan_id, hi, lo, rpm, "tach read");
        Ok(rpm)
    }

    /// Speeds above the fan's maximum are clamped.
    fn set_speed(&self, rpm: u32) -> SdiResult<()> {
        let max = self.max_speed();
        if max == 0 {
            return Err(SdiError::out_of_range(format!(
                "fan {} has no maximum speed configured",
                self.fan_id
            )));
        }
        let rpm = rpm.min(max);
        match self.mode {
            ControlMode::Rpm => {
                let [hi, lo] = self.geometry.rpm_to_tach(rpm).to_be_bytes();
                self.write(fan_reg(TACH_TARG_REG, self.fan_id), hi)?;
                self.write(fan_reg(TACH_LTARG_REG, self.fan_id), lo)?;
                self.write(fan_reg(CFG1_REG, self.fan_id), self.mode.cfg1_value())?;
            }
            ControlMode::Direct => {
                let percent = rpm * 100 / max;
                let setting = (percent * SETTING_MAX / 100) as u8;
                self.write(fan_reg(SETTING_REG, self.fan_id), setting)?;
            }
        }
        debug!(fan = self.fan_id, rpm, mode = ?self.mode, "fan speed set");
        Ok(())
    }

    /// Stall, spin-up and drive failures of this channel, then the chip
    /// watchdog.
    fn status(&self) -> SdiResult<bool> {
        let bit = 1u8 << self.fan_id;
        for reg in [STALL_STATUS_REG, SPIN_STATUS_REG, DRIVE_FAIL_STATUS_REG] {
            let value = self.read(reg)?;
            if value & bit != 0 {
                debug!(fan = self.fan_id, reg, value, "fan fault");
                return Ok(true);
            }
        }
        let status = self.read(STATUS_REG)?;
        Ok(status & WATCHDOG_STATUS_MASK != 0)
    }
}

struct Emc2305Device {
    alias: String,
    bus: Arc<I2cBus>,
    addr: u16,
}

impl Device for Emc2305Device {
    fn alias(&self) -> &str {
        &self.alias
    }

    /// Status registers clear on read.
    fn init(&self) -> SdiResult<()> {
        for reg in [STATUS_REG, STALL_STATUS_REG, SPIN_STATUS_REG, DRIVE_FAIL_STATUS_REG] {
            self.bus.read_byte_data(self.addr, reg)?;
        }
        Ok(())
    }
}

/// Driver `emc2305`.
///
/// Attributes: `control_type` (`"RPM"` or direct), and per fan channel
/// `fan<N>_speed` (maximum RPM, marks the channel as populated),
/// `fan<N>_poles` (read from the chip when absent) and `fan<N>_alias`
/// (default `emc2305-<instance>-<N>`).
#[derive(Debug, Default)]
pub struct Emc2305Driver;

impl DeviceDriver for Emc2305Driver {
    fn name(&self) -> &'static str {
        "emc2305"
    }

    fn register(
        &self,
        node: &DeviceConfig,
        bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>> {
        let bus = require_bus(node, bus)?.i2c(self.name())?;
        let addr = node.required_address()?;
        let mode = match node.attr_str("control_type").as_deref() {
            Some("RPM") => ControlMode::Rpm,
            _ => ControlMode::Direct,
        };

        for fan_id in 0..MAX_FANS {
            let Some(max_speed) = node.attr_u32(&format!("fan{}_speed", fan_id))? else {
                continue;
            };
            let poles = match node.attr_u32(&format!("fan{}_poles", fan_id))? {
                Some(poles) => poles,
                None => {
                    let cfg1 = bus.read_byte_data(addr, fan_reg(CFG1_REG, fan_id))?;
                    u32::from((cfg1 & POLE_MASK) >> POLE_SHIFT) + 1
                }
            };
            let geometry = FanGeometry::from_poles(poles).ok_or_else(|| {
                SdiError::invalid_config(
                    format!("emc2305.fan{}_poles", fan_id),
                    format!("{} poles is not supported", poles),
                )
            })?;
            let alias = node
                .attr_str(&format!("fan{}_alias", fan_id))
                .unwrap_or_else(|| format!("emc2305-{}-{}", node.instance, fan_id));
            let fan = Emc2305Fan {
                bus: bus.clone(),
                addr,
                fan_id,
                mode,
                geometry,
                max_speed: Mutex::new(max_speed),
            };
            ctx.registry()
                .register(alias.clone(), alias, ResourceOps::Fan(Arc::new(fan)));
        }

        Ok(Box::new(Emc2305Device {
            alias: node.alias_or("emc2305"),
            bus,
            addr,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_sdi_sim::SimI2cBus;

    const ADDR: u16 = 0x2c;

    fn fan(mode: ControlMode, fan_id: u8) -> (SimI2cBus, Emc2305Fan) {
        let sim = SimI2cBus::new("i2c-3");
        let bus = Arc::new(I2cBus::new(Box::new(sim.clone())));
        let fan = Emc2305Fan {
            bus,
            addr: ADDR,
            fan_id,
            mode,
            geometry: FanGeometry::from_poles(2).unwrap(),
            max_speed: Mutex::new(18_000),
        };
        (sim, fan)
    }

    #[test]
    fn test_geometry() {
        assert_eq!(FanGeometry::from_poles(1).unwrap().edges, 3);
        assert_eq!(FanGeometry::from_poles(4).unwrap().edges, 9);
        assert!(FanGeometry::from_poles(0).is_none());
        assert!(FanGeometry::from_poles(5).is_none());
    }

    #[test]
    fn test_tach_to_rpm() {
        let g = FanGeometry::from_poles(2).unwrap();
        // count = 0x100: 4 * 32768 * 2 * 60 / (256 * 2)
        assert_eq!(g.tach_to_rpm(0x100 << 3), 30_720);
        assert_eq!(g.tach_to_rpm(0), 0);
    }

    #[test]
    fn test_speed_reads_tach_pair() {
        let (sim, fan) = fan(ControlMode::Direct, 1);
        sim.set_regs(ADDR, u16::from(fan_reg(TACH_REG, 1)), &[0x08, 0x00]);
        assert_eq!(fan.speed().unwrap(), 30_720);
    }

    #[test]
    fn test_direct_mode_writes_drive_setting() {
        let (sim, fan) = fan(ControlMode::Direct, 0);
        fan.set_speed(9_000).unwrap();
        assert_eq!(sim.regs(ADDR, u16::from(SETTING_REG), 1), vec![127]);
        fan.set_speed(40_000).unwrap();
        assert_eq!(sim.regs(ADDR, u16::from(SETTING_REG), 1), vec![255]);
    }

    #[test]
    fn test_rpm_mode_programs_tach_target() {
        let (sim, fan) = fan(ControlMode::Rpm, 2);
        fan.set_speed(7_680).unwrap();
        let target = FanGeometry::from_poles(2).unwrap().rpm_to_tach(7_680);
        assert_eq!(target, 1024 << 3);
        let base = u16::from(fan_reg(TACH_LTARG_REG, 2));
        assert_eq!(sim.regs(ADDR, base, 2), vec![target as u8, (target >> 8) as u8]);
        assert_eq!(sim.regs(ADDR, u16::from(fan_reg(CFG1_REG, 2)), 1), vec![0xab]);
    }

    #[test]
    fn test_status_checks_channel_bit_then_watchdog() {
        let (sim, fan) = fan(ControlMode::Direct, 3);
        sim.set_regs(ADDR, u16::from(STALL_STATUS_REG), &[0x01]);
        assert!(!fan.status().unwrap());
        sim.set_regs(ADDR, u16::from(SPIN_STATUS_REG), &[0x08]);
        assert!(fan.status().unwrap());
        sim.set_regs(ADDR, u16::from(SPIN_STATUS_REG), &[0x00]);
        sim.set_regs(ADDR, u16::from(STATUS_REG), &[WATCHDOG_STATUS_MASK]);
        assert!(fan.status().unwrap());
    }

    #[test]
    fn test_init_takes_max_from_entity_when_unset() {
        let (sim, fan) = fan(ControlMode::Direct, 0);
        *fan.max_speed.lock() = 0;
        fan.init(12_000).unwrap();
        assert_eq!(fan.max_speed(), 12_000);
        assert_eq!(sim.regs(ADDR, u16::from(MIN_DRIVE_REG), 1), vec![MIN_DRIVE_VALUE]);
        assert_eq!(sim.regs(ADDR, u16::from(SETTING_REG), 1), vec![255]);
    }
}
