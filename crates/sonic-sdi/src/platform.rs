//! Platform assembly: buses, devices and entities from a description.

use crate::config::{BusConfig, PlatformConfig};
use crate::context::SdiContext;
use crate::driver::{BusHandle, Device, DriverTable};
use crate::error::{SdiError, SdiResult};
use crate::handle::ResourceHandle;
use crate::types::InitArgs;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Opens the physical (or simulated) bus behind a bus declaration.
pub trait BusFactory {
    fn open(&self, config: &BusConfig) -> SdiResult<BusHandle>;
}

/// A fully registered platform.
pub struct Platform {
    ctx: SdiContext,
    buses: HashMap<String, BusHandle>,
    devices: Vec<Box<dyn Device>>,
}

impl Platform {
    /// Opens every bus, registers every device node in declaration order
    /// and builds the entity table.
    ///
    /// Devices may look up resources registered by earlier nodes, so nodes
    /// that depend on another device must be declared after it.
    pub fn build(
        config: &PlatformConfig,
        drivers: &DriverTable,
        factory: &dyn BusFactory,
    ) -> SdiResult<Self> {
        config.validate()?;
        let ctx = SdiContext::new();

        let mut buses = HashMap::new();
        for bus in &config.buses {
            buses.insert(bus.name.clone(), factory.open(bus)?);
        }

        let mut devices = Vec::with_capacity(config.devices.len());
        for node in &config.devices {
            let driver = drivers.find(&node.driver)?;
            let bus = match &node.bus {
                Some(name) => Some(
                    buses
                        .get(name)
                        .ok_or_else(|| SdiError::not_found(format!("bus {}", name)))?,
                ),
                None => None,
            };
            devices.push(driver.register(node, bus, &ctx)?);
        }

        for ent in &config.entities {
            let info = match &ent.info {
                Some(alias) => Some(resource_by_alias(&ctx, alias)?),
                None => None,
            };
            let handle = ctx
                .entities()
                .create(ent.entity_type, ent.instance, ent.name.clone(), info)?;
            for alias in &ent.resources {
                ctx.entities().attach(handle, resource_by_alias(&ctx, alias)?)?;
            }
        }

        info!(
            resources = ctx.registry().len(),
            entities = ctx.entities().len(),
            devices = devices.len(),
            "platform registered"
        );
        Ok(Self {
            ctx,
            buses,
            devices,
        })
    }

    /// Initializes devices, then the resources of every entity, then any
    /// resource not owned by an entity.
    pub fn init(&self) -> SdiResult<()> {
        for device in &self.devices {
            device.init()?;
        }

        let mut owned = HashSet::new();
        for (handle, entity) in self.ctx.entities().iter() {
            self.ctx.entity().init(handle)?;
            owned.extend(entity.resources());
        }
        for (handle, _) in self.ctx.registry().iter() {
            if !owned.contains(&handle) {
                self.ctx.registry().init(handle, InitArgs::default())?;
            }
        }
        Ok(())
    }

    pub fn ctx(&self) -> &SdiContext {
        &self.ctx
    }

    pub fn bus(&self, name: &str) -> Option<&BusHandle> {
        self.buses.get(name)
    }

    pub fn devices(&self) -> impl Iterator<Item = &dyn Device> {
        self.devices.iter().map(|d| d.as_ref())
    }
}

fn resource_by_alias(ctx: &SdiContext, alias: &str) -> SdiResult<ResourceHandle> {
    ctx.registry()
        .find_by_alias(alias)
        .ok_or_else(|| SdiError::not_found(format!("resource alias {}", alias)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::driver::DeviceDriver;
    use crate::ops::{LedController, ResourceOps};
    use crate::types::{EntityType, ResourceType};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NoBuses;

    impl BusFactory for NoBuses {
        fn open(&self, config: &BusConfig) -> SdiResult<BusHandle> {
            Err(SdiError::not_found(format!("bus {}", config.name)))
        }
    }

    struct Led;
    impl LedController for Led {}

    struct LedDevice {
        alias: String,
        inits: Arc<AtomicUsize>,
    }

    impl Device for LedDevice {
        fn alias(&self) -> &str {
            &self.alias
        }

        fn init(&self) -> SdiResult<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct LedDriver {
        inits: Arc<AtomicUsize>,
    }

    impl DeviceDriver for LedDriver {
        fn name(&self) -> &'static str {
            "test_led"
        }

        fn register(
            &self,
            node: &DeviceConfig,
            _bus: Option<&BusHandle>,
            ctx: &SdiContext,
        ) -> SdiResult<Box<dyn Device>> {
            let alias = node.alias_or("led");
            ctx.registry()
                .register(format!("led{}", node.instance), alias.clone(), ResourceOps::Led(Arc::new(Led)));
            Ok(Box::new(LedDevice {
                alias,
                inits: self.inits.clone(),
            }))
        }
    }

    const CONFIG: &str = r#"
[[devices]]
driver = "test_led"
instance = 1
alias = "status"

[[devices]]
driver = "test_led"
instance = 2

[[entities]]
type = "system_board"
name = "board"
resources = ["status"]
"#;

    fn drivers(inits: Arc<AtomicUsize>) -> DriverTable {
        let mut table = DriverTable::new();
        table.add(Arc::new(LedDriver { inits }));
        table
    }

    #[test]
    fn test_build_registers_devices_and_entities() {
        let inits = Arc::new(AtomicUsize::new(0));
        let config = PlatformConfig::from_toml_str(CONFIG).unwrap();
        let platform = Platform::build(&config, &drivers(inits.clone()), &NoBuses).unwrap();
        let ctx = platform.ctx();

        assert_eq!(ctx.registry().count_of_type(ResourceType::Led), 2);
        let board = ctx.entity().lookup(EntityType::SystemBoard, 1).unwrap();
        assert_eq!(ctx.entity().resource_count(board).unwrap(), 1);
        assert!(ctx.registry().find_by_alias("led-2").is_some());

        platform.init().unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 2);
        let aliases: Vec<_> = platform.devices().map(|d| d.alias().to_string()).collect();
        assert_eq!(aliases, vec!["status", "led-2"]);
    }

    #[test]
    fn test_unknown_driver() {
        let config = PlatformConfig::from_toml_str("[[devices]]\ndriver = \"nope\"\n").unwrap();
        let err = Platform::build(&config, &DriverTable::new(), &NoBuses)
            .err()
            .unwrap();
        assert!(matches!(err, SdiError::NotFound { .. }));
    }

    #[test]
    fn test_entity_with_unknown_resource_alias() {
        let config = PlatformConfig::from_toml_str(
            "[[entities]]\ntype = \"fan_tray\"\nname = \"t\"\nresources = [\"ghost\"]\n",
        )
        .unwrap();
        let err = Platform::build(&config, &DriverTable::new(), &NoBuses)
            .err()
            .unwrap();
        assert!(err.to_string().contains("ghost"));
    }
}
