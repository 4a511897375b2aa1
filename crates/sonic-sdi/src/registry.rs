//! The resource registry.
//!
//! An append-only arena of resources in registration order. Registrations
//! happen once during platform assembly; afterwards the registry is
//! read-mostly and lookups only take a shared lock.

use crate::error::{SdiError, SdiResult};
use crate::handle::{next_generation, ResourceHandle};
use crate::ops::ResourceOps;
use crate::types::{InitArgs, ResourceType};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// A registered resource.
#[derive(Debug)]
pub struct Resource {
    name: String,
    alias: String,
    ops: ResourceOps,
}

impl Resource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn resource_type(&self) -> ResourceType {
        self.ops.resource_type()
    }

    pub fn ops(&self) -> &ResourceOps {
        &self.ops
    }
}

/// Insertion-ordered collection of resources.
#[derive(Debug)]
pub struct ResourceRegistry {
    generation: u32,
    resources: RwLock<Vec<Arc<Resource>>>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            generation: next_generation(),
            resources: RwLock::new(Vec::new()),
        }
    }

    /// Appends a resource and returns its handle.
    ///
    /// Names are not checked for uniqueness; [`find_by_name`] resolves
    /// duplicates to the most recent registration.
    ///
    /// [`find_by_name`]: ResourceRegistry::find_by_name
    pub fn register(
        &self,
        name: impl Into<String>,
        alias: impl Into<String>,
        ops: ResourceOps,
    ) -> ResourceHandle {
        let resource = Resource {
            name: name.into(),
            alias: alias.into(),
            ops,
        };
        let mut resources = self.resources.write();
        let handle = ResourceHandle::new(resources.len() as u32, self.generation);
        info!(
            name = %resource.name,
            alias = %resource.alias,
            resource_type = %resource.resource_type(),
            "registered resource"
        );
        resources.push(Arc::new(resource));
        handle
    }

    /// Resolves a handle.
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` for handles issued by another registry.
    pub fn get(&self, handle: ResourceHandle) -> SdiResult<Arc<Resource>> {
        if handle.generation() != self.generation {
            return Err(SdiError::stale_handle(format!("{:?}", handle)));
        }
        self.resources
            .read()
            .get(handle.index() as usize)
            .cloned()
            .ok_or_else(|| SdiError::stale_handle(format!("{:?}", handle)))
    }

    fn handle_at(&self, index: usize) -> ResourceHandle {
        ResourceHandle::new(index as u32, self.generation)
    }

    /// Returns the most recently registered resource named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<ResourceHandle> {
        let resources = self.resources.read();
        resources
            .iter()
            .rposition(|r| r.name == name)
            .map(|i| self.handle_at(i))
    }

    /// Returns the first resource whose alias is `alias`.
    pub fn find_by_alias(&self, alias: &str) -> Option<ResourceHandle> {
        let resources = self.resources.read();
        resources
            .iter()
            .position(|r| r.alias == alias)
            .map(|i| self.handle_at(i))
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every resource in registration order.
    pub fn iter(&self) -> Vec<(ResourceHandle, Arc<Resource>)> {
        self.resources
            .read()
            .iter()
            .enumerate()
            .map(|(i, r)| (self.handle_at(i), r.clone()))
            .collect()
    }

    /// First resource of the given type in registration order.
    pub fn first_of_type(&self, resource_type: ResourceType) -> Option<ResourceHandle> {
        self.next_index_of_type(0, resource_type)
    }

    /// Next resource of the given type strictly after `after`.
    pub fn next_of_type(
        &self,
        after: ResourceHandle,
        resource_type: ResourceType,
    ) -> Option<ResourceHandle> {
        if after.generation() != self.generation {
            return None;
        }
        self.next_index_of_type(after.index() as usize + 1, resource_type)
    }

    fn next_index_of_type(&self, start: usize, resource_type: ResourceType) -> Option<ResourceHandle> {
        let resources = self.resources.read();
        resources
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, r)| r.resource_type() == resource_type)
            .map(|(i, _)| self.handle_at(i))
    }

    pub fn count_of_type(&self, resource_type: ResourceType) -> usize {
        self.resources
            .read()
            .iter()
            .filter(|r| r.resource_type() == resource_type)
            .count()
    }

    /// Runs a resource's init entry.
    pub fn init(&self, handle: ResourceHandle, args: InitArgs) -> SdiResult<()> {
        let resource = self.get(handle)?;
        debug!(name = %resource.name, "initializing resource");
        resource
            .ops
            .init(args)
            .map_err(|e| e.with_resource(&resource.name))
    }

    /// Human readable listing of every resource, one per line.
    pub fn dump(&self) -> String {
        let resources = self.resources.read();
        let mut out = String::new();
        for r in resources.iter() {
            out.push_str(&format!(
                "name: {:<24} type: {:<18} alias: {}\n",
                r.name,
                r.resource_type(),
                r.alias
            ));
        }
        out
    }
}
