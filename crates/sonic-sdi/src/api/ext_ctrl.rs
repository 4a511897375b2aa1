//! External control API.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::SdiResult;
use crate::handle::ResourceHandle;
use crate::ops::{ExtControl, ResourceOps};
use crate::types::ResourceType;
use std::sync::Arc;

pub struct ExtCtrlApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> ExtCtrlApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn ExtControl>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(
            self.ctx,
            handle,
            ResourceType::ExtControl,
            ResourceOps::as_ext_control,
            op,
        )
    }

    /// Reads `count` values.
    pub fn get(&self, handle: ResourceHandle, count: usize) -> SdiResult<Vec<i32>> {
        self.call(handle, |c| c.get(count))
    }

    /// Writes `values`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` when a value does not fit the register width, or the
    /// number of values differs from the resource's register count.
    pub fn set(&self, handle: ResourceHandle, values: &[i32]) -> SdiResult<()> {
        self.call(handle, |c| c.set(values))
    }
}
