//! NVRAM API.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::{SdiError, SdiResult};
use crate::handle::ResourceHandle;
use crate::ops::{NvramDevice, ResourceOps};
use crate::types::ResourceType;
use std::sync::Arc;

pub struct NvramApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> NvramApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn NvramDevice>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(self.ctx, handle, ResourceType::NvRam, ResourceOps::as_nvram, op)
    }

    /// Capacity in bytes.
    pub fn size(&self, handle: ResourceHandle) -> SdiResult<usize> {
        self.call(handle, |n| n.size())
    }

    /// Reads `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` when the range extends past the device size.
    pub fn read(&self, handle: ResourceHandle, offset: u32, len: usize) -> SdiResult<Vec<u8>> {
        self.call(handle, |n| {
            check_range(n.as_ref(), offset, len)?;
            n.read(offset, len)
        })
    }

    pub fn write(&self, handle: ResourceHandle, offset: u32, data: &[u8]) -> SdiResult<()> {
        self.call(handle, |n| {
            check_range(n.as_ref(), offset, data.len())?;
            n.write(offset, data)
        })
    }
}

fn check_range(dev: &dyn NvramDevice, offset: u32, len: usize) -> SdiResult<()> {
    let size = match dev.size() {
        Ok(size) => size,
        // Devices that cannot report a size validate ranges themselves.
        Err(e) if e.is_unsupported() => return Ok(()),
        Err(e) => return Err(e),
    };
    let end = offset as usize + len;
    if end > size {
        return Err(SdiError::out_of_range(format!(
            "nvram range {}..{} exceeds size {}",
            offset, end, size
        )));
    }
    Ok(())
}
