//! The SDI context: one registry and one entity table.
//!
//! Upper layers hold a context instead of reaching for process globals,
//! which lets tests build as many independent platforms as they need.

use crate::api::{
    CommDevApi, DigitDisplayApi, EntityApi, ExtCtrlApi, FanApi, HostSystemApi, LedApi, MediaApi,
    NvramApi, PowerMonitorApi, TemperatureApi,
};
use crate::entity::EntityTable;
use crate::registry::ResourceRegistry;

#[derive(Debug, Default)]
pub struct SdiContext {
    registry: ResourceRegistry,
    entities: EntityTable,
}

impl SdiContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn temperature(&self) -> TemperatureApi<'_> {
        TemperatureApi::new(self)
    }

    pub fn fan(&self) -> FanApi<'_> {
        FanApi::new(self)
    }

    pub fn led(&self) -> LedApi<'_> {
        LedApi::new(self)
    }

    pub fn digit_display(&self) -> DigitDisplayApi<'_> {
        DigitDisplayApi::new(self)
    }

    pub fn media(&self) -> MediaApi<'_> {
        MediaApi::new(self)
    }

    pub fn nvram(&self) -> NvramApi<'_> {
        NvramApi::new(self)
    }

    pub fn comm_dev(&self) -> CommDevApi<'_> {
        CommDevApi::new(self)
    }

    pub fn host_system(&self) -> HostSystemApi<'_> {
        HostSystemApi::new(self)
    }

    pub fn ext_ctrl(&self) -> ExtCtrlApi<'_> {
        ExtCtrlApi::new(self)
    }

    pub fn power_monitor(&self) -> PowerMonitorApi<'_> {
        PowerMonitorApi::new(self)
    }

    pub fn entity(&self) -> EntityApi<'_> {
        EntityApi::new(self)
    }
}
