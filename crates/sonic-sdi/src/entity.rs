//! The entity model.
//!
//! Entities group resources: a fan tray owns its fans, a PSU owns its
//! sensors, the system board owns the comm-dev. The table keeps entities in
//! creation order and each entity keeps its resources in attach order, so
//! first/next enumeration is stable for the lifetime of a context.

use crate::error::{SdiError, SdiResult};
use crate::handle::{next_generation, EntityHandle, ResourceHandle};
use crate::types::{EntityInfo, EntityType};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Detects whether a field replaceable entity is physically present.
pub trait PresenceProbe: Send + Sync {
    fn present(&self) -> SdiResult<bool>;

    /// Power-good signal; entities without one are always powered.
    fn power_good(&self) -> SdiResult<bool> {
        Ok(true)
    }
}

#[derive(Debug, Default)]
struct EntityState {
    present: bool,
    fault: bool,
    info: Option<EntityInfo>,
}

/// A physical chassis component.
pub struct Entity {
    entity_type: EntityType,
    instance: u32,
    name: String,
    info_resource: Option<ResourceHandle>,
    resources: RwLock<Vec<ResourceHandle>>,
    probe: RwLock<Option<Arc<dyn PresenceProbe>>>,
    state: Mutex<EntityState>,
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// 1-based instance number within the entity type.
    pub fn instance(&self) -> u32 {
        self.instance
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info_resource(&self) -> Option<ResourceHandle> {
        self.info_resource
    }

    /// Resources in attach order.
    pub fn resources(&self) -> Vec<ResourceHandle> {
        self.resources.read().clone()
    }

    pub fn probe(&self) -> Option<Arc<dyn PresenceProbe>> {
        self.probe.read().clone()
    }

    /// Last presence observed by a probe.
    pub fn last_present(&self) -> bool {
        self.state.lock().present
    }

    pub fn last_fault(&self) -> bool {
        self.state.lock().fault
    }

    pub(crate) fn set_present(&self, present: bool) -> bool {
        let mut state = self.state.lock();
        let previous = state.present;
        state.present = present;
        previous
    }

    pub(crate) fn set_fault(&self, fault: bool) {
        self.state.lock().fault = fault;
    }

    pub(crate) fn cached_info(&self) -> Option<EntityInfo> {
        self.state.lock().info.clone()
    }

    pub(crate) fn cache_info(&self, info: Option<EntityInfo>) {
        self.state.lock().info = info;
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("entity_type", &self.entity_type)
            .field("instance", &self.instance)
            .field("name", &self.name)
            .field("resources", &self.resources.read().len())
            .finish()
    }
}

/// Ordered entity arena with the resource to entity index.
pub struct EntityTable {
    generation: u32,
    entities: RwLock<Vec<Arc<Entity>>>,
    parents: RwLock<HashMap<ResourceHandle, EntityHandle>>,
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTable {
    pub fn new() -> Self {
        Self {
            generation: next_generation(),
            entities: RwLock::new(Vec::new()),
            parents: RwLock::new(HashMap::new()),
        }
    }

    fn handle_at(&self, index: usize) -> EntityHandle {
        EntityHandle::new(index as u32, self.generation)
    }

    /// Creates an entity.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `instance` is zero or the (type, instance) pair
    /// already exists.
    pub fn create(
        &self,
        entity_type: EntityType,
        instance: u32,
        name: impl Into<String>,
        info_resource: Option<ResourceHandle>,
    ) -> SdiResult<EntityHandle> {
        let name = name.into();
        if instance == 0 {
            return Err(SdiError::invalid_config(
                format!("entity {}", name),
                "instance numbers start at 1",
            ));
        }
        let mut entities = self.entities.write();
        if entities
            .iter()
            .any(|e| e.entity_type == entity_type && e.instance == instance)
        {
            return Err(SdiError::invalid_config(
                format!("entity {}", name),
                format!("duplicate {} instance {}", entity_type, instance),
            ));
        }
        debug!(%entity_type, instance, name = %name, "created entity");
        entities.push(Arc::new(Entity {
            entity_type,
            instance,
            name,
            info_resource,
            resources: RwLock::new(Vec::new()),
            probe: RwLock::new(None),
            state: Mutex::new(EntityState {
                present: true,
                ..EntityState::default()
            }),
        }));
        Ok(self.handle_at(entities.len() - 1))
    }

    pub fn get(&self, handle: EntityHandle) -> SdiResult<Arc<Entity>> {
        if handle.generation() != self.generation {
            return Err(SdiError::stale_handle(format!("{:?}", handle)));
        }
        self.entities
            .read()
            .get(handle.index() as usize)
            .cloned()
            .ok_or_else(|| SdiError::stale_handle(format!("{:?}", handle)))
    }

    /// Attaches a resource to an entity and records the parent link.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the resource is already attached, to this
    /// entity or another one.
    pub fn attach(&self, entity: EntityHandle, resource: ResourceHandle) -> SdiResult<()> {
        let e = self.get(entity)?;
        let mut parents = self.parents.write();
        if let Some(owner) = parents.get(&resource) {
            let owner = self.get(*owner).map(|o| o.name.clone()).unwrap_or_default();
            return Err(SdiError::invalid_config(
                format!("entities.{}.resources", e.name),
                format!("resource {:?} already belongs to entity {}", resource, owner),
            ));
        }
        parents.insert(resource, entity);
        e.resources.write().push(resource);
        Ok(())
    }

    pub fn set_presence_probe(
        &self,
        entity: EntityHandle,
        probe: Arc<dyn PresenceProbe>,
    ) -> SdiResult<()> {
        *self.get(entity)?.probe.write() = Some(probe);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, entity_type: EntityType) -> usize {
        self.entities
            .read()
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .count()
    }

    pub fn lookup(&self, entity_type: EntityType, instance: u32) -> Option<EntityHandle> {
        self.entities
            .read()
            .iter()
            .position(|e| e.entity_type == entity_type && e.instance == instance)
            .map(|i| self.handle_at(i))
    }

    pub fn first(&self) -> Option<EntityHandle> {
        (!self.is_empty()).then(|| self.handle_at(0))
    }

    /// Entity created right after `after`.
    pub fn next(&self, after: EntityHandle) -> Option<EntityHandle> {
        if after.generation() != self.generation {
            return None;
        }
        let next = after.index() as usize + 1;
        (next < self.len()).then(|| self.handle_at(next))
    }

    /// Snapshot of every entity in creation order.
    pub fn iter(&self) -> Vec<(EntityHandle, Arc<Entity>)> {
        self.entities
            .read()
            .iter()
            .enumerate()
            .map(|(i, e)| (self.handle_at(i), e.clone()))
            .collect()
    }

    /// Entity the resource is attached to.
    pub fn parent_of(&self, resource: ResourceHandle) -> Option<EntityHandle> {
        self.parents.read().get(&resource).copied()
    }
}

impl std::fmt::Debug for EntityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityTable")
            .field("generation", &self.generation)
            .field("entities", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_and_lookup() {
        let table = EntityTable::new();
        let board = table.create(EntityType::SystemBoard, 1, "board", None).unwrap();
        let tray1 = table.create(EntityType::FanTray, 1, "tray1", None).unwrap();
        let tray2 = table.create(EntityType::FanTray, 2, "tray2", None).unwrap();

        assert_eq!(table.count(EntityType::FanTray), 2);
        assert_eq!(table.lookup(EntityType::FanTray, 2), Some(tray2));
        assert_eq!(table.lookup(EntityType::PsuTray, 1), None);

        assert_eq!(table.first(), Some(board));
        assert_eq!(table.next(board), Some(tray1));
        assert_eq!(table.next(tray1), Some(tray2));
        assert_eq!(table.next(tray2), None);
    }

    #[test]
    fn test_rejects_zero_and_duplicate_instances() {
        let table = EntityTable::new();
        assert!(table.create(EntityType::FanTray, 0, "tray0", None).is_err());
        table.create(EntityType::FanTray, 1, "tray1", None).unwrap();
        let err = table.create(EntityType::FanTray, 1, "again", None).unwrap_err();
        assert!(matches!(err, SdiError::InvalidConfig { .. }));
    }

    #[test]
    fn test_attach_records_parent() {
        let table = EntityTable::new();
        let tray = table.create(EntityType::FanTray, 1, "tray1", None).unwrap();
        let r = ResourceHandle::new(4, 99);
        table.attach(tray, r).unwrap();
        assert_eq!(table.parent_of(r), Some(tray));
        assert_eq!(table.get(tray).unwrap().resources(), vec![r]);
    }

    #[test]
    fn test_resource_has_a_single_parent() {
        let table = EntityTable::new();
        let tray = table.create(EntityType::FanTray, 1, "tray1", None).unwrap();
        let psu = table.create(EntityType::PsuTray, 1, "psu1", None).unwrap();
        let r = ResourceHandle::new(2, 99);
        table.attach(tray, r).unwrap();

        let err = table.attach(psu, r).unwrap_err();
        assert!(matches!(err, SdiError::InvalidConfig { .. }), "{}", err);
        assert!(table.attach(tray, r).is_err());
        assert_eq!(table.parent_of(r), Some(tray));
        assert_eq!(table.get(tray).unwrap().resources(), vec![r]);
        assert!(table.get(psu).unwrap().resources().is_empty());
    }

    #[test]
    fn test_empty_table_has_no_first() {
        let table = EntityTable::new();
        assert!(table.first().is_none());
        assert!(table.is_empty());
    }
}
