use super::mailbox::CommDevLink;
use super::regs::COMM_DEV_I2C_ADDR;
use sonic_sdi::driver::require_bus;
use sonic_sdi::types::{PlatformInfo, TelemetrySensor};
use sonic_sdi::{
    BusHandle, CommDevice, Device, DeviceConfig, DeviceDriver, RegisterAccess, ResourceOps,
    SdiContext, SdiResult,
};
use std::sync::Arc;
use tracing::info;

/// Name the comm-dev resource is registered under. Layered resources find
/// the controller by this name.
pub const COMM_DEV_RESOURCE_NAME: &str = "comm_dev";

/// The CommDev resource backed by a [`CommDevLink`].
#[derive(Debug)]
pub struct CommDevResource {
    link: Arc<CommDevLink>,
}

impl CommDevResource {
    pub fn new(link: Arc<CommDevLink>) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &Arc<CommDevLink> {
        &self.link
    }
}

impl CommDevice for CommDevResource {
    fn read_mailbox(&self) -> SdiResult<Vec<u8>> {
        self.link.read_mailbox()
    }

    fn write_mailbox(&self, message: &[u8]) -> SdiResult<()> {
        self.link.write_mailbox(message)
    }

    fn send_message(&self, message: &[u8]) -> SdiResult<()> {
        self.link.send_message(message)
    }

    fn receive_message(&self) -> SdiResult<Vec<u8>> {
        self.link.receive_message()
    }

    fn mark_package_verified(&self) -> SdiResult<()> {
        self.link.mark_read_verified()
    }

    fn mark_download_complete(&self) -> SdiResult<()> {
        self.link.mark_download_complete()
    }

    fn platform_info(&self) -> SdiResult<PlatformInfo> {
        self.link.platform_info()
    }

    fn iom_firmware_revision(&self) -> SdiResult<String> {
        self.link.iom_firmware_revision()
    }

    fn set_iom_firmware_revision(&self, revision: &str) -> SdiResult<()> {
        self.link.set_iom_firmware_revision(revision)
    }

    fn write_telemetry(&self, sensor: TelemetrySensor, celsius: i32) -> SdiResult<()> {
        self.link.write_telemetry(sensor, celsius)
    }

    fn read_telemetry(&self, sensor: TelemetrySensor) -> SdiResult<i32> {
        self.link.read_telemetry(sensor)
    }

    fn flush(&self) -> SdiResult<()> {
        self.link.flush()
    }

    fn enable_messaging(&self, enable: bool) -> SdiResult<()> {
        self.link.enable_messaging(enable)
    }

    fn buffer_ready(&self) -> SdiResult<bool> {
        self.link.buffer_ready()
    }

    fn message_present(&self) -> SdiResult<bool> {
        self.link.message_present()
    }

    fn refresh(&self) -> SdiResult<()> {
        self.link.refresh().map(|_| ())
    }

    fn registers(&self) -> Option<&dyn RegisterAccess> {
        Some(self.link.as_ref())
    }
}

struct CommDevDevice {
    alias: String,
}

impl Device for CommDevDevice {
    fn alias(&self) -> &str {
        &self.alias
    }
}

/// Driver `comm_dev`: one controller on an I2C bus.
#[derive(Debug, Default)]
pub struct CommDevDriver;

impl DeviceDriver for CommDevDriver {
    fn name(&self) -> &'static str {
        "comm_dev"
    }

    fn register(
        &self,
        node: &DeviceConfig,
        bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>> {
        let bus = require_bus(node, bus)?.i2c(self.name())?;
        let addr = node.address()?.unwrap_or(COMM_DEV_I2C_ADDR);
        let alias = node.alias_or(COMM_DEV_RESOURCE_NAME);
        info!(bus = %bus.name(), addr, alias = %alias, "comm-dev registered");
        let link = Arc::new(CommDevLink::new(bus, addr));
        ctx.registry().register(
            COMM_DEV_RESOURCE_NAME,
            alias.clone(),
            ResourceOps::CommDev(Arc::new(CommDevResource::new(link))),
        );
        Ok(Box::new(CommDevDevice { alias }))
    }
}
