//! Typed API over the resource registry.
//!
//! Each family gets a thin wrapper borrowing the context. Every call
//! resolves the handle, checks that the resource belongs to the family
//! (returning `WrongResourceType` before touching the driver), then
//! forwards to the driver and tags `Unsupported` errors with the resource
//! name.

mod comm_dev;
mod entity;
mod ext_ctrl;
mod fan;
mod host_system;
mod led;
mod media;
mod nvram;
mod power_monitor;
mod temperature;

pub use comm_dev::CommDevApi;
pub use entity::EntityApi;
pub use ext_ctrl::ExtCtrlApi;
pub use fan::FanApi;
pub use host_system::HostSystemApi;
pub use led::{DigitDisplayApi, LedApi};
pub use media::MediaApi;
pub use nvram::NvramApi;
pub use power_monitor::PowerMonitorApi;
pub use temperature::TemperatureApi;

use crate::context::SdiContext;
use crate::error::{SdiError, SdiResult};
use crate::handle::ResourceHandle;
use crate::ops::ResourceOps;
use crate::types::ResourceType;
use std::sync::Arc;

/// Resolves `handle`, selects the family's driver object and runs `op`.
pub(crate) fn dispatch<T: ?Sized, R>(
    ctx: &SdiContext,
    handle: ResourceHandle,
    expected: ResourceType,
    select: fn(&ResourceOps) -> Option<&Arc<T>>,
    op: impl FnOnce(&Arc<T>) -> SdiResult<R>,
) -> SdiResult<R> {
    let resource = ctx.registry().get(handle)?;
    let ops = select(resource.ops()).ok_or_else(|| {
        SdiError::wrong_type(resource.name(), expected, resource.resource_type())
    })?;
    op(ops).map_err(|e| e.with_resource(resource.name()))
}
