//! Host system API.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::SdiResult;
use crate::handle::ResourceHandle;
use crate::ops::{HostSystem, ResourceOps};
use crate::types::ResourceType;
use std::sync::Arc;

pub struct HostSystemApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> HostSystemApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn HostSystem>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(
            self.ctx,
            handle,
            ResourceType::HostSystem,
            ResourceOps::as_host_system,
            op,
        )
    }

    /// Slot the host board is seated in.
    pub fn slot(&self, handle: ResourceHandle) -> SdiResult<u8> {
        self.call(handle, |h| h.slot())
    }

    /// True when the controller notified the host of a waiting package.
    pub fn package_notify(&self, handle: ResourceHandle) -> SdiResult<bool> {
        self.call(handle, |h| h.package_notify())
    }

    pub fn set_booted(&self, handle: ResourceHandle, booted: bool) -> SdiResult<()> {
        self.call(handle, |h| h.set_booted(booted))
    }
}
