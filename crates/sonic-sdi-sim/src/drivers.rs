//! `sim_*` drivers creating simulated resources from device nodes.
//!
//! Every attribute of a node seeds the matching store field, unless the
//! field already holds a value, so state survives re-registration against
//! a shared store.

use crate::resources::*;
use crate::store::KvStore;
use sonic_sdi::types::ResourceType;
use sonic_sdi::{
    BusHandle, Device, DeviceConfig, DeviceDriver, DriverTable, ResourceOps, SdiContext, SdiResult,
};
use std::sync::Arc;
use tracing::debug;

pub struct SimDriver {
    name: &'static str,
    resource_type: ResourceType,
    store: Arc<dyn KvStore>,
}

impl SimDriver {
    pub fn new(name: &'static str, resource_type: ResourceType, store: Arc<dyn KvStore>) -> Self {
        Self {
            name,
            resource_type,
            store,
        }
    }

    fn ops(&self, state: SimState) -> ResourceOps {
        match self.resource_type {
            ResourceType::Temperature => ResourceOps::Temperature(Arc::new(SimTemperature(state))),
            ResourceType::Fan => ResourceOps::Fan(Arc::new(SimFan(state))),
            ResourceType::Led => ResourceOps::Led(Arc::new(SimLed(state))),
            ResourceType::DigitDisplayLed => {
                ResourceOps::DigitDisplayLed(Arc::new(SimDigitDisplay(state)))
            }
            ResourceType::Media => ResourceOps::Media(Arc::new(SimMedia(state))),
            ResourceType::NvRam => ResourceOps::NvRam(Arc::new(SimNvram(state))),
            ResourceType::CommDev => ResourceOps::CommDev(Arc::new(SimCommDev(state))),
            ResourceType::HostSystem => ResourceOps::HostSystem(Arc::new(SimHostSystem(state))),
            ResourceType::ExtControl => ResourceOps::ExtControl(Arc::new(SimExtCtrl(state))),
            ResourceType::EntityInfo => ResourceOps::EntityInfo(Arc::new(SimEntityInfo(state))),
            ResourceType::PowerMonitor => {
                ResourceOps::PowerMonitor(Arc::new(SimPowerMonitor(state)))
            }
        }
    }
}

struct SimDevice {
    alias: String,
}

impl Device for SimDevice {
    fn alias(&self) -> &str {
        &self.alias
    }
}

impl DeviceDriver for SimDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    /// The resource is named after the alias; the simulated comm-dev keeps
    /// the fixed `comm_dev` name so layered resources find it.
    fn register(
        &self,
        node: &DeviceConfig,
        _bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>> {
        let alias = node.alias_or(self.resource_type.as_str());
        let name = match self.resource_type {
            ResourceType::CommDev => ResourceType::CommDev.as_str().to_string(),
            _ => alias.clone(),
        };
        let state = SimState::new(self.store.clone(), alias.clone());
        for key in node.attrs.keys() {
            let field = state.key(key);
            if self.store.get(&field).is_none() {
                if let Some(value) = node.attr_str(key) {
                    self.store.set(&field, value);
                }
            }
        }
        debug!(driver = self.name, alias = %alias, "sim resource seeded");
        ctx.registry().register(name, alias.clone(), self.ops(state));
        Ok(Box::new(SimDevice { alias }))
    }
}

/// One `sim_<type>` driver per resource type, all sharing `store`.
pub fn sim_drivers(store: Arc<dyn KvStore>) -> DriverTable {
    const DRIVERS: [(&str, ResourceType); 11] = [
        ("sim_temperature", ResourceType::Temperature),
        ("sim_fan", ResourceType::Fan),
        ("sim_led", ResourceType::Led),
        ("sim_digit_display_led", ResourceType::DigitDisplayLed),
        ("sim_media", ResourceType::Media),
        ("sim_nvram", ResourceType::NvRam),
        ("sim_comm_dev", ResourceType::CommDev),
        ("sim_host_system", ResourceType::HostSystem),
        ("sim_ext_ctrl", ResourceType::ExtControl),
        ("sim_entity_info", ResourceType::EntityInfo),
        ("sim_power_monitor", ResourceType::PowerMonitor),
    ];
    let mut table = DriverTable::new();
    for (name, resource_type) in DRIVERS {
        table.add(Arc::new(SimDriver::new(name, resource_type, store.clone())));
    }
    table
}
