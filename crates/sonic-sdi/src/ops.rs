//! Capability traits implemented by drivers, and the tagged dispatch table.
//!
//! Each resource family has one trait. Every operation has a default body
//! returning [`SdiError::Unsupported`], so a driver implements exactly the
//! operations its hardware has and callers see "not supported" for the
//! rest. `init` entries default to success: a resource without an init
//! routine needs no initialization.

use crate::error::{SdiError, SdiResult};
use crate::transport::RegisterAccess;
use crate::types::{EntityInfo, InitArgs, PlatformInfo, ResourceType, TelemetrySensor, ThresholdKind};
use std::fmt;
use std::sync::Arc;

/// Temperature sensor operations. Temperatures are whole degrees Celsius.
pub trait TemperatureSensor: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    fn temperature(&self) -> SdiResult<i32> {
        Err(SdiError::unsupported("temperature_get"))
    }

    fn threshold(&self, _kind: ThresholdKind) -> SdiResult<i32> {
        Err(SdiError::unsupported("threshold_get"))
    }

    fn set_threshold(&self, _kind: ThresholdKind, _value: i32) -> SdiResult<()> {
        Err(SdiError::unsupported("threshold_set"))
    }

    /// Returns true when the sensor reports a fault.
    fn status(&self) -> SdiResult<bool> {
        Err(SdiError::unsupported("status_get"))
    }
}

/// Fan controller operations. Speeds are RPM.
pub trait FanController: Send + Sync {
    fn init(&self, _max_rpm: u32) -> SdiResult<()> {
        Ok(())
    }

    fn speed(&self) -> SdiResult<u32> {
        Err(SdiError::unsupported("speed_get"))
    }

    fn set_speed(&self, _rpm: u32) -> SdiResult<()> {
        Err(SdiError::unsupported("speed_set"))
    }

    /// Returns true when the fan reports a fault.
    fn status(&self) -> SdiResult<bool> {
        Err(SdiError::unsupported("status_get"))
    }

    /// Converts an RPM value into percent of full speed.
    ///
    /// Controllers without their own curve leave this unsupported and the
    /// dispatch layer falls back to the owning entity's maximum speed.
    fn rpm_to_pct(&self, _rpm: u32) -> SdiResult<u32> {
        Err(SdiError::unsupported("rpm_to_pct"))
    }

    fn pct_to_rpm(&self, _pct: u32) -> SdiResult<u32> {
        Err(SdiError::unsupported("pct_to_rpm"))
    }
}

/// LED operations.
pub trait LedController: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    fn on(&self) -> SdiResult<()> {
        Err(SdiError::unsupported("led_on"))
    }

    fn off(&self) -> SdiResult<()> {
        Err(SdiError::unsupported("led_off"))
    }
}

/// Seven-segment style display operations.
pub trait DigitalDisplay: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    fn on(&self) -> SdiResult<()> {
        Err(SdiError::unsupported("display_on"))
    }

    fn off(&self) -> SdiResult<()> {
        Err(SdiError::unsupported("display_off"))
    }

    fn set_display(&self, _text: &str) -> SdiResult<()> {
        Err(SdiError::unsupported("display_string_set"))
    }
}

/// Pluggable optics operations.
pub trait MediaDevice: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    fn presence(&self) -> SdiResult<bool> {
        Err(SdiError::unsupported("presence_get"))
    }

    fn read(&self, _offset: u32, _len: usize) -> SdiResult<Vec<u8>> {
        Err(SdiError::unsupported("media_read"))
    }

    fn write(&self, _offset: u32, _data: &[u8]) -> SdiResult<()> {
        Err(SdiError::unsupported("media_write"))
    }
}

/// Non-volatile memory operations.
pub trait NvramDevice: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    fn size(&self) -> SdiResult<usize> {
        Err(SdiError::unsupported("nvram_size"))
    }

    fn read(&self, _offset: u32, _len: usize) -> SdiResult<Vec<u8>> {
        Err(SdiError::unsupported("nvram_read"))
    }

    fn write(&self, _offset: u32, _data: &[u8]) -> SdiResult<()> {
        Err(SdiError::unsupported("nvram_write"))
    }
}

/// Chassis management controller operations.
///
/// `read_mailbox`/`write_mailbox` move one framed message; the flow control
/// bits (`mark_package_verified`, `mark_download_complete`) are separate so
/// the dispatch layer decides when to signal the controller.
pub trait CommDevice: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    /// Reads and verifies the southbound message, without its terminator.
    fn read_mailbox(&self) -> SdiResult<Vec<u8>> {
        Err(SdiError::unsupported("read_mbox"))
    }

    /// Frames and writes a northbound message.
    fn write_mailbox(&self, _message: &[u8]) -> SdiResult<()> {
        Err(SdiError::unsupported("write_mbox"))
    }

    /// Writes a message and signals download complete.
    ///
    /// Drivers that serialize writers override this so the whole sequence
    /// runs inside their write critical section.
    fn send_message(&self, message: &[u8]) -> SdiResult<()> {
        self.write_mailbox(message)?;
        self.mark_download_complete()
    }

    /// Reads a message and acknowledges it to the controller.
    fn receive_message(&self) -> SdiResult<Vec<u8>> {
        let message = self.read_mailbox()?;
        self.mark_package_verified()?;
        Ok(message)
    }

    fn mark_package_verified(&self) -> SdiResult<()> {
        Err(SdiError::unsupported("write_pckg_read_verif"))
    }

    fn mark_download_complete(&self) -> SdiResult<()> {
        Err(SdiError::unsupported("write_pckg_downl_compl"))
    }

    fn platform_info(&self) -> SdiResult<PlatformInfo> {
        Err(SdiError::unsupported("read_platform_info"))
    }

    fn iom_firmware_revision(&self) -> SdiResult<String> {
        Err(SdiError::unsupported("access_fw_rev"))
    }

    fn set_iom_firmware_revision(&self, _revision: &str) -> SdiResult<()> {
        Err(SdiError::unsupported("access_fw_rev"))
    }

    /// Reports a temperature in whole degrees.
    fn write_telemetry(&self, _sensor: TelemetrySensor, _celsius: i32) -> SdiResult<()> {
        Err(SdiError::unsupported("write_temp_sensor"))
    }

    fn read_telemetry(&self, _sensor: TelemetrySensor) -> SdiResult<i32> {
        Err(SdiError::unsupported("read_temp_sensor"))
    }

    /// Discards any pending northbound message.
    fn flush(&self) -> SdiResult<()> {
        Err(SdiError::unsupported("flush_msg_buffer"))
    }

    fn enable_messaging(&self, _enable: bool) -> SdiResult<()> {
        Err(SdiError::unsupported("messaging_enable"))
    }

    /// True when the controller consumed the last northbound message.
    fn buffer_ready(&self) -> SdiResult<bool> {
        Err(SdiError::unsupported("get_buffer_ready"))
    }

    /// True when a southbound message is waiting.
    fn message_present(&self) -> SdiResult<bool> {
        Err(SdiError::unsupported("get_msg_present"))
    }

    /// Re-enables messaging after a controller reset and clears the status
    /// register, without flushing the northbound mailbox.
    fn refresh(&self) -> SdiResult<()> {
        Err(SdiError::unsupported("reset_refresh"))
    }

    /// Raw register window of the controller, for resources layered on it.
    fn registers(&self) -> Option<&dyn RegisterAccess> {
        None
    }
}

/// Host-side board signals.
pub trait HostSystem: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    fn slot(&self) -> SdiResult<u8> {
        Err(SdiError::unsupported("get_slot"))
    }

    /// True when the controller signalled a package for the host.
    fn package_notify(&self) -> SdiResult<bool> {
        Err(SdiError::unsupported("get_pkg_notify"))
    }

    fn set_booted(&self, _booted: bool) -> SdiResult<()> {
        Err(SdiError::unsupported("set_booted"))
    }
}

/// A vector of integers backed by registers.
pub trait ExtControl: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    fn get(&self, _count: usize) -> SdiResult<Vec<i32>> {
        Err(SdiError::unsupported("ext_ctrl_get"))
    }

    fn set(&self, _values: &[i32]) -> SdiResult<()> {
        Err(SdiError::unsupported("ext_ctrl_set"))
    }
}

/// Source of an entity's descriptive data.
pub trait EntityInfoSource: Send + Sync {
    fn read(&self) -> SdiResult<EntityInfo> {
        Err(SdiError::unsupported("entity_info_read"))
    }
}

/// Power rail monitor operations.
pub trait PowerMonitor: Send + Sync {
    fn init(&self) -> SdiResult<()> {
        Ok(())
    }

    fn voltage(&self) -> SdiResult<f64> {
        Err(SdiError::unsupported("voltage_get"))
    }

    fn current(&self) -> SdiResult<f64> {
        Err(SdiError::unsupported("current_get"))
    }

    fn power(&self) -> SdiResult<f64> {
        Err(SdiError::unsupported("power_get"))
    }
}

/// Dispatch table of one resource: the family tag and the driver object
/// that serves it.
///
/// The driver object owns the device context, so a resource can never be
/// registered without one.
#[derive(Clone)]
pub enum ResourceOps {
    Temperature(Arc<dyn TemperatureSensor>),
    Fan(Arc<dyn FanController>),
    Led(Arc<dyn LedController>),
    DigitDisplayLed(Arc<dyn DigitalDisplay>),
    Media(Arc<dyn MediaDevice>),
    NvRam(Arc<dyn NvramDevice>),
    CommDev(Arc<dyn CommDevice>),
    HostSystem(Arc<dyn HostSystem>),
    ExtControl(Arc<dyn ExtControl>),
    EntityInfo(Arc<dyn EntityInfoSource>),
    PowerMonitor(Arc<dyn PowerMonitor>),
}

impl ResourceOps {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceOps::Temperature(_) => ResourceType::Temperature,
            ResourceOps::Fan(_) => ResourceType::Fan,
            ResourceOps::Led(_) => ResourceType::Led,
            ResourceOps::DigitDisplayLed(_) => ResourceType::DigitDisplayLed,
            ResourceOps::Media(_) => ResourceType::Media,
            ResourceOps::NvRam(_) => ResourceType::NvRam,
            ResourceOps::CommDev(_) => ResourceType::CommDev,
            ResourceOps::HostSystem(_) => ResourceType::HostSystem,
            ResourceOps::ExtControl(_) => ResourceType::ExtControl,
            ResourceOps::EntityInfo(_) => ResourceType::EntityInfo,
            ResourceOps::PowerMonitor(_) => ResourceType::PowerMonitor,
        }
    }

    /// Runs the family's init entry.
    pub fn init(&self, args: InitArgs) -> SdiResult<()> {
        match self {
            ResourceOps::Temperature(ops) => ops.init(),
            ResourceOps::Fan(ops) => ops.init(args.max_rpm),
            ResourceOps::Led(ops) => ops.init(),
            ResourceOps::DigitDisplayLed(ops) => ops.init(),
            ResourceOps::Media(ops) => ops.init(),
            ResourceOps::NvRam(ops) => ops.init(),
            ResourceOps::CommDev(ops) => ops.init(),
            ResourceOps::HostSystem(ops) => ops.init(),
            ResourceOps::ExtControl(ops) => ops.init(),
            ResourceOps::EntityInfo(_) => Ok(()),
            ResourceOps::PowerMonitor(ops) => ops.init(),
        }
    }

    pub fn as_temperature(&self) -> Option<&Arc<dyn TemperatureSensor>> {
        match self {
            ResourceOps::Temperature(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_fan(&self) -> Option<&Arc<dyn FanController>> {
        match self {
            ResourceOps::Fan(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_led(&self) -> Option<&Arc<dyn LedController>> {
        match self {
            ResourceOps::Led(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_digital_display(&self) -> Option<&Arc<dyn DigitalDisplay>> {
        match self {
            ResourceOps::DigitDisplayLed(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&Arc<dyn MediaDevice>> {
        match self {
            ResourceOps::Media(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_nvram(&self) -> Option<&Arc<dyn NvramDevice>> {
        match self {
            ResourceOps::NvRam(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_comm_dev(&self) -> Option<&Arc<dyn CommDevice>> {
        match self {
            ResourceOps::CommDev(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_host_system(&self) -> Option<&Arc<dyn HostSystem>> {
        match self {
            ResourceOps::HostSystem(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_ext_control(&self) -> Option<&Arc<dyn ExtControl>> {
        match self {
            ResourceOps::ExtControl(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_entity_info(&self) -> Option<&Arc<dyn EntityInfoSource>> {
        match self {
            ResourceOps::EntityInfo(ops) => Some(ops),
            _ => None,
        }
    }

    pub fn as_power_monitor(&self) -> Option<&Arc<dyn PowerMonitor>> {
        match self {
            ResourceOps::PowerMonitor(ops) => Some(ops),
            _ => None,
        }
    }
}

impl fmt::Debug for ResourceOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceOps::{}", self.resource_type())
    }
}
