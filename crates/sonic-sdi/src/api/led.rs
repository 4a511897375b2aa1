//! LED and digit display API.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::SdiResult;
use crate::handle::ResourceHandle;
use crate::ops::{DigitalDisplay, LedController, ResourceOps};
use crate::types::ResourceType;
use std::sync::Arc;

pub struct LedApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> LedApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn LedController>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(self.ctx, handle, ResourceType::Led, ResourceOps::as_led, op)
    }

    pub fn on(&self, handle: ResourceHandle) -> SdiResult<()> {
        self.call(handle, |l| l.on())
    }

    pub fn off(&self, handle: ResourceHandle) -> SdiResult<()> {
        self.call(handle, |l| l.off())
    }
}

pub struct DigitDisplayApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> DigitDisplayApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn DigitalDisplay>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(
            self.ctx,
            handle,
            ResourceType::DigitDisplayLed,
            ResourceOps::as_digital_display,
            op,
        )
    }

    pub fn on(&self, handle: ResourceHandle) -> SdiResult<()> {
        self.call(handle, |d| d.on())
    }

    pub fn off(&self, handle: ResourceHandle) -> SdiResult<()> {
        self.call(handle, |d| d.off())
    }

    pub fn set_display(&self, handle: ResourceHandle, text: &str) -> SdiResult<()> {
        self.call(handle, |d| d.set_display(text))
    }
}
