//! Pluggable media API.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::SdiResult;
use crate::handle::ResourceHandle;
use crate::ops::{MediaDevice, ResourceOps};
use crate::types::ResourceType;
use std::sync::Arc;

pub struct MediaApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> MediaApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn MediaDevice>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(self.ctx, handle, ResourceType::Media, ResourceOps::as_media, op)
    }

    pub fn presence(&self, handle: ResourceHandle) -> SdiResult<bool> {
        self.call(handle, |m| m.presence())
    }

    pub fn read(&self, handle: ResourceHandle, offset: u32, len: usize) -> SdiResult<Vec<u8>> {
        self.call(handle, |m| m.read(offset, len))
    }

    pub fn write(&self, handle: ResourceHandle, offset: u32, data: &[u8]) -> SdiResult<()> {
        self.call(handle, |m| m.write(offset, data))
    }
}
