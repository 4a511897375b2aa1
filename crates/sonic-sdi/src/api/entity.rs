//! Entity API: enumeration, resource lookup, presence and info caching.

use super::dispatch;
use crate::context::SdiContext;
use crate::entity::Entity;
use crate::error::{SdiError, SdiResult};
use crate::handle::{EntityHandle, ResourceHandle};
use crate::ops::ResourceOps;
use crate::registry::Resource;
use crate::types::{EntityInfo, EntityType, InitArgs, ResourceType};
use tracing::{debug, info, warn};

pub struct EntityApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> EntityApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    pub fn count(&self, entity_type: EntityType) -> usize {
        self.ctx.entities().count(entity_type)
    }

    pub fn lookup(&self, entity_type: EntityType, instance: u32) -> Option<EntityHandle> {
        self.ctx.entities().lookup(entity_type, instance)
    }

    pub fn first(&self) -> Option<EntityHandle> {
        self.ctx.entities().first()
    }

    pub fn next(&self, after: EntityHandle) -> Option<EntityHandle> {
        self.ctx.entities().next(after)
    }

    pub fn name(&self, entity: EntityHandle) -> SdiResult<String> {
        Ok(self.ctx.entities().get(entity)?.name().to_string())
    }

    pub fn resource_count(&self, entity: EntityHandle) -> SdiResult<usize> {
        Ok(self.ctx.entities().get(entity)?.resources().len())
    }

    /// Finds a resource of `entity` by alias.
    pub fn resource_lookup(
        &self,
        entity: EntityHandle,
        alias: &str,
    ) -> SdiResult<Option<ResourceHandle>> {
        let e = self.ctx.entities().get(entity)?;
        for r in e.resources() {
            if self.ctx.registry().get(r)?.alias() == alias {
                return Ok(Some(r));
            }
        }
        Ok(None)
    }

    /// First resource of `resource_type` attached to `entity`.
    pub fn first_resource(
        &self,
        entity: EntityHandle,
        resource_type: ResourceType,
    ) -> SdiResult<Option<ResourceHandle>> {
        let e = self.ctx.entities().get(entity)?;
        self.find_of_type(&e.resources(), resource_type)
    }

    /// Next resource of `resource_type` strictly after `resource` within
    /// its owning entity.
    ///
    /// # Errors
    ///
    /// `NotFound` when `resource` is not attached to any entity.
    pub fn next_resource(
        &self,
        resource: ResourceHandle,
        resource_type: ResourceType,
    ) -> SdiResult<Option<ResourceHandle>> {
        let parent = self
            .ctx
            .entities()
            .parent_of(resource)
            .ok_or_else(|| SdiError::not_found(format!("parent entity of {}", resource)))?;
        let resources = self.ctx.entities().get(parent)?.resources();
        let start = resources
            .iter()
            .position(|r| *r == resource)
            .map_or(resources.len(), |p| p + 1);
        self.find_of_type(&resources[start..], resource_type)
    }

    fn find_of_type(
        &self,
        resources: &[ResourceHandle],
        resource_type: ResourceType,
    ) -> SdiResult<Option<ResourceHandle>> {
        for r in resources {
            if self.ctx.registry().get(*r)?.resource_type() == resource_type {
                return Ok(Some(*r));
            }
        }
        Ok(None)
    }

    /// Calls `f` for every resource of `entity`, in attach order.
    pub fn for_each_resource(
        &self,
        entity: EntityHandle,
        mut f: impl FnMut(ResourceHandle, &Resource),
    ) -> SdiResult<()> {
        let e = self.ctx.entities().get(entity)?;
        for r in e.resources() {
            let resource = self.ctx.registry().get(r)?;
            f(r, &resource);
        }
        Ok(())
    }

    /// Reads an info resource directly, bypassing any entity cache.
    pub fn read_info_resource(&self, resource: ResourceHandle) -> SdiResult<EntityInfo> {
        dispatch(
            self.ctx,
            resource,
            ResourceType::EntityInfo,
            ResourceOps::as_entity_info,
            |i| i.read(),
        )
    }

    fn refresh_info(&self, e: &Entity) -> SdiResult<EntityInfo> {
        let resource = e
            .info_resource()
            .ok_or_else(|| SdiError::not_found(format!("info resource of {}", e.name())))?;
        let info = self.read_info_resource(resource)?;
        debug!(entity = %e.name(), "cached entity info");
        e.cache_info(Some(info.clone()));
        Ok(info)
    }

    /// Descriptive data of `entity`, served from cache when valid.
    pub fn info(&self, entity: EntityHandle) -> SdiResult<EntityInfo> {
        let e = self.ctx.entities().get(entity)?;
        match e.cached_info() {
            Some(info) => Ok(info),
            None => self.refresh_info(&e),
        }
    }

    /// Probes presence of `entity`.
    ///
    /// An insertion (or a present entity whose info is not cached yet,
    /// once power is good) refreshes the info cache; a removal invalidates
    /// it. Entities without a probe are fixed and always present.
    pub fn presence(&self, entity: EntityHandle) -> SdiResult<bool> {
        let e = self.ctx.entities().get(entity)?;
        let Some(probe) = e.probe() else {
            return Ok(true);
        };
        let present = probe.present()?;
        let was_present = e.set_present(present);
        if present {
            let inserted = !was_present;
            if inserted {
                info!(entity = %e.name(), "entity inserted");
            }
            if (inserted || e.cached_info().is_none()) && probe.power_good()? {
                if let Err(err) = self.refresh_info(&e) {
                    warn!(entity = %e.name(), error = %err, "failed to read entity info");
                }
            }
        } else if was_present {
            info!(entity = %e.name(), "entity removed");
            e.cache_info(None);
        }
        Ok(present)
    }

    /// True when any sensor or fan of `entity` reports a fault.
    ///
    /// Resources that cannot report status are skipped.
    pub fn fault_status(&self, entity: EntityHandle) -> SdiResult<bool> {
        let e = self.ctx.entities().get(entity)?;
        let mut fault = false;
        for r in e.resources() {
            let status = match self.ctx.registry().get(r)?.resource_type() {
                ResourceType::Temperature => self.ctx.temperature().status(r),
                ResourceType::Fan => self.ctx.fan().status(r),
                _ => continue,
            };
            match status {
                Ok(true) => fault = true,
                Ok(false) => {}
                Err(err) if err.is_unsupported() => {}
                Err(err) => return Err(err),
            }
        }
        e.set_fault(fault);
        Ok(fault)
    }

    /// Initializes every resource of `entity`.
    ///
    /// Fans receive the entity's maximum speed when info is available.
    pub fn init(&self, entity: EntityHandle) -> SdiResult<()> {
        let e = self.ctx.entities().get(entity)?;
        let max_rpm = if e.info_resource().is_some() {
            match self.info(entity) {
                Ok(info) => info.max_speed,
                Err(err) => {
                    warn!(entity = %e.name(), error = %err, "initializing without entity info");
                    0
                }
            }
        } else {
            0
        };
        for r in e.resources() {
            self.ctx.registry().init(r, InitArgs { max_rpm })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PresenceProbe;
    use crate::ops::{EntityInfoSource, FanController, LedController, TemperatureSensor};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Info {
        reads: AtomicUsize,
    }

    impl EntityInfoSource for Info {
        fn read(&self) -> SdiResult<EntityInfo> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(EntityInfo {
                prod_name: "FAN-TRAY".into(),
                max_speed: 16000,
                ..EntityInfo::default()
            })
        }
    }

    struct Probe(AtomicBool);

    impl PresenceProbe for Probe {
        fn present(&self) -> SdiResult<bool> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    struct Hot(bool);

    impl TemperatureSensor for Hot {
        fn status(&self) -> SdiResult<bool> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct Fan {
        max: AtomicU32,
    }

    impl FanController for Fan {
        fn init(&self, max_rpm: u32) -> SdiResult<()> {
            self.max.store(max_rpm, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Led;
    impl LedController for Led {}

    struct Setup {
        ctx: SdiContext,
        tray: EntityHandle,
        info: Arc<Info>,
    }

    fn setup() -> Setup {
        let ctx = SdiContext::new();
        let info = Arc::new(Info {
            reads: AtomicUsize::new(0),
        });
        let ih = ctx
            .registry()
            .register("tray-info", "tray-info", ResourceOps::EntityInfo(info.clone()));
        let tray = ctx
            .entities()
            .create(EntityType::FanTray, 1, "tray1", Some(ih))
            .unwrap();
        Setup { ctx, tray, info }
    }

    #[test]
    fn test_resource_enumeration_within_entity() {
        let s = setup();
        let reg = s.ctx.registry();
        let f1 = reg.register("fan1", "fan-a", ResourceOps::Fan(Arc::new(Fan::default())));
        let led = reg.register("led1", "led", ResourceOps::Led(Arc::new(Led)));
        let f2 = reg.register("fan2", "fan-b", ResourceOps::Fan(Arc::new(Fan::default())));
        for r in [f1, led, f2] {
            s.ctx.entities().attach(s.tray, r).unwrap();
        }

        let api = s.ctx.entity();
        assert_eq!(api.resource_count(s.tray).unwrap(), 3);
        assert_eq!(api.first_resource(s.tray, ResourceType::Fan).unwrap(), Some(f1));
        assert_eq!(api.next_resource(f1, ResourceType::Fan).unwrap(), Some(f2));
        assert_eq!(api.next_resource(f2, ResourceType::Fan).unwrap(), None);
        assert_eq!(api.resource_lookup(s.tray, "led").unwrap(), Some(led));
        assert_eq!(api.resource_lookup(s.tray, "nope").unwrap(), None);

        // Stable across calls.
        assert_eq!(api.next_resource(f1, ResourceType::Fan).unwrap(), Some(f2));

        let mut seen = Vec::new();
        api.for_each_resource(s.tray, |_, r| seen.push(r.name().to_string()))
            .unwrap();
        assert_eq!(seen, vec!["fan1", "led1", "fan2"]);
    }

    #[test]
    fn test_next_resource_of_unattached_resource() {
        let s = setup();
        let loose = s
            .ctx
            .registry()
            .register("fan9", "fan9", ResourceOps::Fan(Arc::new(Fan::default())));
        assert!(matches!(
            s.ctx.entity().next_resource(loose, ResourceType::Fan),
            Err(SdiError::NotFound { .. })
        ));
    }

    #[test]
    fn test_info_is_cached() {
        let s = setup();
        let api = s.ctx.entity();
        assert_eq!(api.info(s.tray).unwrap().prod_name, "FAN-TRAY");
        assert_eq!(api.info(s.tray).unwrap().max_speed, 16000);
        assert_eq!(s.info.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_presence_transitions_manage_cache() {
        let s = setup();
        let probe = Arc::new(Probe(AtomicBool::new(false)));
        s.ctx
            .entities()
            .set_presence_probe(s.tray, probe.clone())
            .unwrap();
        let api = s.ctx.entity();

        assert!(!api.presence(s.tray).unwrap());
        assert_eq!(s.info.reads.load(Ordering::SeqCst), 0);

        probe.0.store(true, Ordering::SeqCst);
        assert!(api.presence(s.tray).unwrap());
        assert_eq!(s.info.reads.load(Ordering::SeqCst), 1);

        // No transition, info still cached.
        assert!(api.presence(s.tray).unwrap());
        assert_eq!(s.info.reads.load(Ordering::SeqCst), 1);

        probe.0.store(false, Ordering::SeqCst);
        assert!(!api.presence(s.tray).unwrap());
        probe.0.store(true, Ordering::SeqCst);
        assert!(api.presence(s.tray).unwrap());
        assert_eq!(s.info.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fixed_entity_is_present() {
        let s = setup();
        assert!(s.ctx.entity().presence(s.tray).unwrap());
    }

    #[test]
    fn test_fault_status_aggregates() {
        let s = setup();
        let reg = s.ctx.registry();
        let ok = reg.register("t1", "t1", ResourceOps::Temperature(Arc::new(Hot(false))));
        let led = reg.register("led", "led", ResourceOps::Led(Arc::new(Led)));
        s.ctx.entities().attach(s.tray, ok).unwrap();
        s.ctx.entities().attach(s.tray, led).unwrap();
        assert!(!s.ctx.entity().fault_status(s.tray).unwrap());

        let hot = reg.register("t2", "t2", ResourceOps::Temperature(Arc::new(Hot(true))));
        s.ctx.entities().attach(s.tray, hot).unwrap();
        assert!(s.ctx.entity().fault_status(s.tray).unwrap());
        assert!(s.ctx.entities().get(s.tray).unwrap().last_fault());
    }

    #[test]
    fn test_init_passes_entity_max_speed_to_fans() {
        let s = setup();
        let fan = Arc::new(Fan::default());
        let h = s
            .ctx
            .registry()
            .register("fan1", "fan1", ResourceOps::Fan(fan.clone()));
        s.ctx.entities().attach(s.tray, h).unwrap();
        s.ctx.entity().init(s.tray).unwrap();
        assert_eq!(fan.max.load(Ordering::SeqCst), 16000);
    }
}
