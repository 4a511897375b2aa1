//! Temperature sensor API.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::SdiResult;
use crate::handle::ResourceHandle;
use crate::ops::{ResourceOps, TemperatureSensor};
use crate::types::{ResourceType, ThresholdKind};
use std::sync::Arc;

pub struct TemperatureApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> TemperatureApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn TemperatureSensor>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(
            self.ctx,
            handle,
            ResourceType::Temperature,
            ResourceOps::as_temperature,
            op,
        )
    }

    /// Current temperature in degrees Celsius.
    ///
    /// # Errors
    ///
    /// `WrongResourceType` if `handle` is not a temperature sensor, otherwise
    /// whatever the driver reports.
    pub fn temperature(&self, handle: ResourceHandle) -> SdiResult<i32> {
        self.call(handle, |s| s.temperature())
    }

    pub fn threshold(&self, handle: ResourceHandle, kind: ThresholdKind) -> SdiResult<i32> {
        self.call(handle, |s| s.threshold(kind))
    }

    pub fn set_threshold(
        &self,
        handle: ResourceHandle,
        kind: ThresholdKind,
        value: i32,
    ) -> SdiResult<()> {
        self.call(handle, |s| s.set_threshold(kind, value))
    }

    /// True when the sensor is in fault.
    pub fn status(&self, handle: ResourceHandle) -> SdiResult<bool> {
        self.call(handle, |s| s.status())
    }
}
