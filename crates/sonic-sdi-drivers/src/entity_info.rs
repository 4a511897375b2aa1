//! Entity info served from the platform description.

use sonic_sdi::types::{AirFlow, EntityInfo, PowerType};
use sonic_sdi::{
    BusHandle, Device, DeviceConfig, DeviceDriver, EntityInfoSource, ResourceOps, SdiContext,
    SdiError, SdiResult,
};
use std::sync::Arc;

#[derive(Debug)]
pub struct StaticEntityInfo {
    info: EntityInfo,
}

impl StaticEntityInfo {
    pub fn new(info: EntityInfo) -> Self {
        Self { info }
    }
}

impl EntityInfoSource for StaticEntityInfo {
    fn read(&self) -> SdiResult<EntityInfo> {
        Ok(self.info.clone())
    }
}

fn parse_info(node: &DeviceConfig) -> SdiResult<EntityInfo> {
    let text = |key: &str| node.attr_str(key).unwrap_or_default();
    let number = |key: &str| -> SdiResult<u32> { Ok(node.attr_u32(key)?.unwrap_or(0)) };

    let air_flow = match node.attr_str("air_flow").as_deref() {
        None | Some("normal") => AirFlow::Normal,
        Some("reverse") => AirFlow::Reverse,
        Some(other) => {
            return Err(SdiError::invalid_config(
                "entity_info.air_flow",
                format!("unknown air flow {}", other),
            ))
        }
    };
    let power_type = match node.attr_str("power_type").as_deref() {
        None | Some("ac") => PowerType::Ac,
        Some("dc") => PowerType::Dc,
        Some(other) => {
            return Err(SdiError::invalid_config(
                "entity_info.power_type",
                format!("unknown power type {}", other),
            ))
        }
    };

    Ok(EntityInfo {
        prod_name: text("prod_name"),
        ppid: text("ppid"),
        hw_revision: text("hw_revision"),
        platform_name: text("platform_name"),
        vendor_name: text("vendor_name"),
        service_tag: text("service_tag"),
        mac_size: number("mac_size")?,
        num_fans: number("num_fans")?,
        max_speed: number("max_speed")?,
        air_flow,
        power_rating: number("power_rating")?,
        power_type,
    })
}

struct EntityInfoDevice {
    alias: String,
}

impl Device for EntityInfoDevice {
    fn alias(&self) -> &str {
        &self.alias
    }
}

/// Driver `entity_info`: a virtual device, no bus.
#[derive(Debug, Default)]
pub struct EntityInfoDriver;

impl DeviceDriver for EntityInfoDriver {
    fn name(&self) -> &'static str {
        "entity_info"
    }

    fn register(
        &self,
        node: &DeviceConfig,
        _bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>> {
        let info = parse_info(node)?;
        let alias = node.alias_or("entity_info");
        ctx.registry().register(
            alias.clone(),
            alias.clone(),
            ResourceOps::EntityInfo(Arc::new(StaticEntityInfo::new(info))),
        );
        Ok(Box::new(EntityInfoDevice { alias }))
    }
}
