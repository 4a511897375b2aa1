//! Simulated resources. State lives in a [`KvStore`] under
//! `<resource>.<field>` keys.

use crate::store::{KvStore, StoreExt};
use sonic_sdi::types::{
    AirFlow, EntityInfo, PlatformInfo, PowerType, TelemetrySensor, ThresholdKind,
};
use sonic_sdi::{
    CommDevice, DigitalDisplay, EntityInfoSource, ExtControl, FanController, HostSystem,
    LedController, MediaDevice, NvramDevice, PowerMonitor, SdiError, SdiResult, TemperatureSensor,
};
use std::sync::Arc;
use tracing::debug;

/// Store slot of one simulated resource.
#[derive(Clone)]
pub struct SimState {
    store: Arc<dyn KvStore>,
    name: String,
}

impl SimState {
    pub fn new(store: Arc<dyn KvStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self, field: &str) -> String {
        format!("{}.{}", self.name, field)
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    fn flag(&self, field: &str) -> SdiResult<bool> {
        self.store.get_or(&self.key(field), false)
    }

    fn set_flag(&self, field: &str, value: bool) {
        self.store.set_value(&self.key(field), value);
    }

    fn text(&self, field: &str) -> String {
        self.store.get(&self.key(field)).unwrap_or_default()
    }

    fn bytes(&self, field: &str, size: usize) -> SdiResult<Vec<u8>> {
        let mut data: Vec<u8> = self.store.get_json(&self.key(field))?.unwrap_or_default();
        data.resize(size, 0);
        Ok(data)
    }

    fn read_window(&self, field: &str, size: usize, offset: u32, len: usize) -> SdiResult<Vec<u8>> {
        let start = offset as usize;
        if start + len > size {
            return Err(SdiError::out_of_range(format!(
                "{} bytes at {} exceed {} of {}",
                len, offset, size, self.name
            )));
        }
        Ok(self.bytes(field, size)?[start..start + len].to_vec())
    }

    fn write_window(&self, field: &str, size: usize, offset: u32, data: &[u8]) -> SdiResult<()> {
        let start = offset as usize;
        if start + data.len() > size {
            return Err(SdiError::out_of_range(format!(
                "{} bytes at {} exceed {} of {}",
                data.len(),
                offset,
                size,
                self.name
            )));
        }
        let mut image = self.bytes(field, size)?;
        image[start..start + data.len()].copy_from_slice(data);
        self.store.set_json(&self.key(field), &image)
    }
}

impl std::fmt::Debug for SimState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimState").field("name", &self.name).finish()
    }
}

fn threshold_field(kind: ThresholdKind) -> &'static str {
    match kind {
        ThresholdKind::Low => "low_threshold",
        ThresholdKind::High => "high_threshold",
        ThresholdKind::Critical => "critical_threshold",
    }
}

/// Fields: `temperature`, `low_threshold`, `high_threshold`,
/// `critical_threshold`, `fault`.
#[derive(Debug)]
pub struct SimTemperature(pub SimState);

impl TemperatureSensor for SimTemperature {
    fn temperature(&self) -> SdiResult<i32> {
        self.0.store().get_or(&self.0.key("temperature"), 25)
    }

    fn threshold(&self, kind: ThresholdKind) -> SdiResult<i32> {
        self.0
            .store()
            .get_parsed(&self.0.key(threshold_field(kind)))?
            .ok_or_else(|| SdiError::unsupported("threshold_get"))
    }

    fn set_threshold(&self, kind: ThresholdKind, value: i32) -> SdiResult<()> {
        self.0.store().set_value(&self.0.key(threshold_field(kind)), value);
        Ok(())
    }

    /// Faulted when forced, or outside the low/high window when both are set.
    fn status(&self) -> SdiResult<bool> {
        if self.0.flag("fault")? {
            return Ok(true);
        }
        let temp = self.temperature()?;
        let low = self.0.store().get_parsed::<i32>(&self.0.key("low_threshold"))?;
        let high = self.0.store().get_parsed::<i32>(&self.0.key("high_threshold"))?;
        Ok(matches!((low, high), (Some(lo), Some(hi)) if temp <= lo || temp >= hi))
    }
}

/// Fields: `speed`, `max_speed`, `fault`. Percent conversions are left to
/// the owning entity's info.
#[derive(Debug)]
pub struct SimFan(pub SimState);

impl FanController for SimFan {
    fn init(&self, max_rpm: u32) -> SdiResult<()> {
        let key = self.0.key("max_speed");
        if self.0.store().get_parsed::<u32>(&key)?.is_none() && max_rpm != 0 {
            self.0.store().set_value(&key, max_rpm);
        }
        Ok(())
    }

    fn speed(&self) -> SdiResult<u32> {
        self.0.store().get_or(&self.0.key("speed"), 0)
    }

    fn set_speed(&self, rpm: u32) -> SdiResult<()> {
        let max = self.0.store().get_parsed::<u32>(&self.0.key("max_speed"))?;
        let rpm = max.map_or(rpm, |m| rpm.min(m));
        self.0.store().set_value(&self.0.key("speed"), rpm);
        debug!(fan = %self.0.name(), rpm, "sim fan speed set");
        Ok(())
    }

    fn status(&self) -> SdiResult<bool> {
        self.0.flag("fault")
    }
}

/// Field: `on`.
#[derive(Debug)]
pub struct SimLed(pub SimState);

impl LedController for SimLed {
    fn on(&self) -> SdiResult<()> {
        self.0.set_flag("on", true);
        Ok(())
    }

    fn off(&self) -> SdiResult<()> {
        self.0.set_flag("on", false);
        Ok(())
    }
}

/// Fields: `on`, `text`.
#[derive(Debug)]
pub struct SimDigitDisplay(pub SimState);

impl DigitalDisplay for SimDigitDisplay {
    fn on(&self) -> SdiResult<()> {
        self.0.set_flag("on", true);
        Ok(())
    }

    fn off(&self) -> SdiResult<()> {
        self.0.set_flag("on", false);
        Ok(())
    }

    fn set_display(&self, text: &str) -> SdiResult<()> {
        self.0.store().set(&self.0.key("text"), text.to_string());
        Ok(())
    }
}

/// Pluggable module with a 256 byte EEPROM. Fields: `present`, `eeprom`.
#[derive(Debug)]
pub struct SimMedia(pub SimState);

const MEDIA_EEPROM_SIZE: usize = 256;

impl MediaDevice for SimMedia {
    fn presence(&self) -> SdiResult<bool> {
        self.0.flag("present")
    }

    fn read(&self, offset: u32, len: usize) -> SdiResult<Vec<u8>> {
        if !self.presence()? {
            return Err(SdiError::not_found(format!("module in {}", self.0.name())));
        }
        self.0.read_window("eeprom", MEDIA_EEPROM_SIZE, offset, len)
    }

    fn write(&self, offset: u32, data: &[u8]) -> SdiResult<()> {
        if !self.presence()? {
            return Err(SdiError::not_found(format!("module in {}", self.0.name())));
        }
        self.0.write_window("eeprom", MEDIA_EEPROM_SIZE, offset, data)
    }
}

/// Fields: `size` (default 1024), `data`.
#[derive(Debug)]
pub struct SimNvram(pub SimState);

impl NvramDevice for SimNvram {
    fn size(&self) -> SdiResult<usize> {
        self.0.store().get_or(&self.0.key("size"), 1024)
    }

    fn read(&self, offset: u32, len: usize) -> SdiResult<Vec<u8>> {
        self.0.read_window("data", self.size()?, offset, len)
    }

    fn write(&self, offset: u32, data: &[u8]) -> SdiResult<()> {
        self.0.write_window("data", self.size()?, offset, data)
    }
}

/// Controller without framing: messages are stored whole.
///
/// Fields: `northbound`, `southbound` (JSON byte arrays), `nb_pending`,
/// `service_tag`, `fw_version`, `slot_occupation`, `iom_fw_rev`,
/// `enabled`, `telemetry.<sensor>`.
#[derive(Debug)]
pub struct SimCommDev(pub SimState);

impl SimCommDev {
    /// Places a southbound message, as the controller would.
    pub fn inject_southbound(&self, message: &[u8]) -> SdiResult<()> {
        self.0.store().set_json(&self.0.key("southbound"), &message.to_vec())
    }

    pub fn northbound(&self) -> SdiResult<Option<Vec<u8>>> {
        self.0.store().get_json(&self.0.key("northbound"))
    }

    fn telemetry_field(sensor: TelemetrySensor) -> &'static str {
        match sensor {
            TelemetrySensor::Host => "telemetry.host",
            TelemetrySensor::Npu => "telemetry.npu",
            TelemetrySensor::Ambient => "telemetry.ambient",
        }
    }
}

impl CommDevice for SimCommDev {
    fn read_mailbox(&self) -> SdiResult<Vec<u8>> {
        self.0
            .store()
            .get_json(&self.0.key("southbound"))?
            .ok_or_else(|| SdiError::invalid_message("southbound mailbox is empty"))
    }

    fn write_mailbox(&self, message: &[u8]) -> SdiResult<()> {
        if message.contains(&0) {
            return Err(SdiError::invalid_message("message contains a NUL byte"));
        }
        self.0.store().set_json(&self.0.key("northbound"), &message.to_vec())
    }

    fn mark_package_verified(&self) -> SdiResult<()> {
        self.0.store().remove(&self.0.key("southbound"));
        Ok(())
    }

    fn mark_download_complete(&self) -> SdiResult<()> {
        self.0.set_flag("nb_pending", true);
        Ok(())
    }

    fn platform_info(&self) -> SdiResult<PlatformInfo> {
        Ok(PlatformInfo {
            service_tag: self.0.text("service_tag"),
            comm_dev_fw_version: self.0.text("fw_version"),
            slot_occupation: self.0.store().get_or(&self.0.key("slot_occupation"), 0)?,
        })
    }

    fn iom_firmware_revision(&self) -> SdiResult<String> {
        Ok(self.0.text("iom_fw_rev"))
    }

    fn set_iom_firmware_revision(&self, revision: &str) -> SdiResult<()> {
        self.0.store().set(&self.0.key("iom_fw_rev"), revision.to_string());
        Ok(())
    }

    fn write_telemetry(&self, sensor: TelemetrySensor, celsius: i32) -> SdiResult<()> {
        self.0
            .store()
            .set_value(&self.0.key(Self::telemetry_field(sensor)), celsius);
        Ok(())
    }

    fn read_telemetry(&self, sensor: TelemetrySensor) -> SdiResult<i32> {
        self.0
            .store()
            .get_or(&self.0.key(Self::telemetry_field(sensor)), 0)
    }

    fn flush(&self) -> SdiResult<()> {
        self.0.store().remove(&self.0.key("northbound"));
        self.0.set_flag("nb_pending", false);
        Ok(())
    }

    fn enable_messaging(&self, enable: bool) -> SdiResult<()> {
        self.0.set_flag("enabled", enable);
        Ok(())
    }

    fn buffer_ready(&self) -> SdiResult<bool> {
        Ok(!self.0.flag("nb_pending")?)
    }

    fn message_present(&self) -> SdiResult<bool> {
        Ok(self.0.store().get(&self.0.key("southbound")).is_some())
    }

    fn refresh(&self) -> SdiResult<()> {
        self.0.set_flag("enabled", true);
        Ok(())
    }
}

/// Fields: `slot`, `package_notify`, `booted`.
#[derive(Debug)]
pub struct SimHostSystem(pub SimState);

impl HostSystem for SimHostSystem {
    fn slot(&self) -> SdiResult<u8> {
        self.0.store().get_or(&self.0.key("slot"), 0)
    }

    fn package_notify(&self) -> SdiResult<bool> {
        self.0.flag("package_notify")
    }

    fn set_booted(&self, booted: bool) -> SdiResult<()> {
        self.0.set_flag("booted", booted);
        Ok(())
    }
}

/// Fields: `values` (JSON array), `count` (default 1).
#[derive(Debug)]
pub struct SimExtCtrl(pub SimState);

impl SimExtCtrl {
    fn count(&self) -> SdiResult<usize> {
        self.0.store().get_or(&self.0.key("count"), 1)
    }

    fn check(&self, n: usize) -> SdiResult<usize> {
        let count = self.count()?;
        if n == 0 || n > count {
            return Err(SdiError::out_of_range(format!(
                "{} values requested, {} holds {}",
                n,
                self.0.name(),
                count
            )));
        }
        Ok(count)
    }
}

impl ExtControl for SimExtCtrl {
    fn get(&self, count: usize) -> SdiResult<Vec<i32>> {
        let total = self.check(count)?;
        let mut values: Vec<i32> = self.0.store().get_json(&self.0.key("values"))?.unwrap_or_default();
        values.resize(total, 0);
        values.truncate(count);
        Ok(values)
    }

    fn set(&self, values: &[i32]) -> SdiResult<()> {
        let total = self.check(values.len())?;
        let mut stored: Vec<i32> = self.0.store().get_json(&self.0.key("values"))?.unwrap_or_default();
        stored.resize(total, 0);
        stored[..values.len()].copy_from_slice(values);
        self.0.store().set_json(&self.0.key("values"), &stored)
    }
}

/// Entity info assembled from individual fields, so a test can change one
/// field and watch the entity cache refresh.
#[derive(Debug)]
pub struct SimEntityInfo(pub SimState);

impl EntityInfoSource for SimEntityInfo {
    fn read(&self) -> SdiResult<EntityInfo> {
        let s = &self.0;
        let number = |field: &str| -> SdiResult<u32> { s.store().get_or(&s.key(field), 0) };
        Ok(EntityInfo {
            prod_name: s.text("prod_name"),
            ppid: s.text("ppid"),
            hw_revision: s.text("hw_revision"),
            platform_name: s.text("platform_name"),
            vendor_name: s.text("vendor_name"),
            service_tag: s.text("service_tag"),
            mac_size: number("mac_size")?,
            num_fans: number("num_fans")?,
            max_speed: number("max_speed")?,
            air_flow: if s.text("air_flow") == "reverse" {
                AirFlow::Reverse
            } else {
                AirFlow::Normal
            },
            power_rating: number("power_rating")?,
            power_type: if s.text("power_type") == "dc" {
                PowerType::Dc
            } else {
                PowerType::Ac
            },
        })
    }
}

/// Fields: `voltage`, `current`; power is their product unless `power`
/// is set.
#[derive(Debug)]
pub struct SimPowerMonitor(pub SimState);

impl PowerMonitor for SimPowerMonitor {
    fn voltage(&self) -> SdiResult<f64> {
        self.0.store().get_or(&self.0.key("voltage"), 0.0)
    }

    fn current(&self) -> SdiResult<f64> {
        self.0.store().get_or(&self.0.key("current"), 0.0)
    }

    fn power(&self) -> SdiResult<f64> {
        match self.0.store().get_parsed(&self.0.key("power"))? {
            Some(p) => Ok(p),
            None => Ok(self.voltage()? * self.current()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn state(name: &str) -> (Arc<MemoryStore>, SimState) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), SimState::new(store, name))
    }

    #[test]
    fn test_temperature_window() {
        let (store, s) = state("cpu");
        let t = SimTemperature(s);
        assert!(!t.status().unwrap());
        assert!(t.threshold(ThresholdKind::Critical).unwrap_err().is_unsupported());
        t.set_threshold(ThresholdKind::Low, 5).unwrap();
        t.set_threshold(ThresholdKind::High, 60).unwrap();
        store.set_value("cpu.temperature", 61);
        assert!(t.status().unwrap());
    }

    #[test]
    fn test_fan_clamps_to_max() {
        let (_store, s) = state("fan1");
        let fan = SimFan(s);
        fan.init(10_000).unwrap();
        fan.set_speed(12_000).unwrap();
        assert_eq!(fan.speed().unwrap(), 10_000);
    }

    #[test]
    fn test_comm_dev_mailboxes() {
        let (_store, s) = state("comm_dev");
        let dev = SimCommDev(s);
        assert!(!dev.message_present().unwrap());
        dev.inject_southbound(b"PKG").unwrap();
        assert_eq!(dev.receive_message().unwrap(), b"PKG".to_vec());
        assert!(!dev.message_present().unwrap());

        dev.send_message(b"ACK").unwrap();
        assert_eq!(dev.northbound().unwrap(), Some(b"ACK".to_vec()));
        assert!(!dev.buffer_ready().unwrap());
        dev.flush().unwrap();
        assert!(dev.buffer_ready().unwrap());
    }

    #[test]
    fn test_nvram_window() {
        let (store, s) = state("nv");
        store.set_value("nv.size", 16);
        let nv = SimNvram(s);
        nv.write(14, &[1, 2]).unwrap();
        assert_eq!(nv.read(12, 4).unwrap(), vec![0, 0, 1, 2]);
        assert!(nv.write(15, &[1, 2]).is_err());
    }

    #[test]
    fn test_ext_ctrl_partial_set() {
        let (store, s) = state("thermal");
        store.set_value("thermal.count", 3);
        let ctl = SimExtCtrl(s);
        ctl.set(&[40, 50]).unwrap();
        assert_eq!(ctl.get(3).unwrap(), vec![40, 50, 0]);
        assert!(ctl.get(4).is_err());
    }

    #[test]
    fn test_power_defaults_to_product() {
        let (store, s) = state("psu");
        store.set_value("psu.voltage", 12.0);
        store.set_value("psu.current", 2.5);
        assert_eq!(SimPowerMonitor(s).power().unwrap(), 30.0);
    }
}
