//! Core SDI value types shared by the registry, the entity model and drivers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource families a driver can register.
///
/// The family of a resource is fixed at registration time and selects which
/// typed API may operate on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Temperature,
    Fan,
    Led,
    DigitDisplayLed,
    Media,
    NvRam,
    CommDev,
    HostSystem,
    ExtControl,
    EntityInfo,
    PowerMonitor,
}

impl ResourceType {
    /// All resource families, in declaration order.
    pub const ALL: [ResourceType; 11] = [
        ResourceType::Temperature,
        ResourceType::Fan,
        ResourceType::Led,
        ResourceType::DigitDisplayLed,
        ResourceType::Media,
        ResourceType::NvRam,
        ResourceType::CommDev,
        ResourceType::HostSystem,
        ResourceType::ExtControl,
        ResourceType::EntityInfo,
        ResourceType::PowerMonitor,
    ];

    /// Returns the canonical lower-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Temperature => "temperature",
            ResourceType::Fan => "fan",
            ResourceType::Led => "led",
            ResourceType::DigitDisplayLed => "digit_display_led",
            ResourceType::Media => "media",
            ResourceType::NvRam => "nvram",
            ResourceType::CommDev => "comm_dev",
            ResourceType::HostSystem => "host_system",
            ResourceType::ExtControl => "ext_ctrl",
            ResourceType::EntityInfo => "entity_info",
            ResourceType::PowerMonitor => "power_monitor",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    SystemBoard,
    FanTray,
    PsuTray,
    IoModule,
    Chassis,
}

impl EntityType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::SystemBoard => "system_board",
            EntityType::FanTray => "fan_tray",
            EntityType::PsuTray => "psu_tray",
            EntityType::IoModule => "io_module",
            EntityType::Chassis => "chassis",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temperature threshold selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    Low,
    High,
    Critical,
}

impl fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThresholdKind::Low => "low",
            ThresholdKind::High => "high",
            ThresholdKind::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Fan air flow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirFlow {
    #[default]
    Normal,
    Reverse,
}

/// Power supply input type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerType {
    #[default]
    Ac,
    Dc,
}

/// Descriptive data of an entity, served by its info resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityInfo {
    pub prod_name: String,
    pub ppid: String,
    pub hw_revision: String,
    pub platform_name: String,
    pub vendor_name: String,
    pub service_tag: String,
    /// Number of MAC addresses assigned to the entity
    pub mac_size: u32,
    pub num_fans: u32,
    /// Maximum fan speed in RPM, used for percent conversions
    pub max_speed: u32,
    pub air_flow: AirFlow,
    /// Power rating in watts
    pub power_rating: u32,
    pub power_type: PowerType,
}

/// Chassis data served by the comm-dev fixed registers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub service_tag: String,
    pub comm_dev_fw_version: String,
    pub slot_occupation: u8,
}

/// Telemetry registers the host reports to the chassis controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetrySensor {
    /// Host board temperature
    Host,
    /// Switching ASIC temperature
    Npu,
    /// Ambient temperature
    Ambient,
}

impl fmt::Display for TelemetrySensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TelemetrySensor::Host => "host",
            TelemetrySensor::Npu => "npu",
            TelemetrySensor::Ambient => "ambient",
        };
        f.write_str(s)
    }
}

/// Arguments handed to a resource's init entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitArgs {
    /// Maximum fan speed; zero when unknown
    pub max_rpm: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_display() {
        assert_eq!(ResourceType::CommDev.to_string(), "comm_dev");
        assert_eq!(ResourceType::ExtControl.to_string(), "ext_ctrl");
        assert_eq!(ResourceType::ALL.len(), 11);
    }

    #[test]
    fn test_entity_type_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: EntityType,
        }
        let w: Wrapper = toml::from_str("kind = \"fan_tray\"").unwrap();
        assert_eq!(w.kind, EntityType::FanTray);
    }

    #[test]
    fn test_entity_info_defaults() {
        let info = EntityInfo::default();
        assert_eq!(info.max_speed, 0);
        assert_eq!(info.air_flow, AirFlow::Normal);
        assert_eq!(info.power_type, PowerType::Ac);
    }
}
