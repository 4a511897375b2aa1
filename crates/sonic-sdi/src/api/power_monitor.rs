//! Power monitor API.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::SdiResult;
use crate::handle::ResourceHandle;
use crate::ops::{PowerMonitor, ResourceOps};
use crate::types::ResourceType;
use std::sync::Arc;

pub struct PowerMonitorApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> PowerMonitorApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn PowerMonitor>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(
            self.ctx,
            handle,
            ResourceType::PowerMonitor,
            ResourceOps::as_power_monitor,
            op,
        )
    }

    /// Rail voltage in volts.
    pub fn voltage(&self, handle: ResourceHandle) -> SdiResult<f64> {
        self.call(handle, |p| p.voltage())
    }

    /// Rail current in amperes.
    pub fn current(&self, handle: ResourceHandle) -> SdiResult<f64> {
        self.call(handle, |p| p.current())
    }

    /// Power in watts.
    pub fn power(&self, handle: ResourceHandle) -> SdiResult<f64> {
        self.call(handle, |p| p.power())
    }
}
