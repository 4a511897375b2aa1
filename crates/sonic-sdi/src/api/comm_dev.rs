//! Comm-dev API: mailbox messaging and chassis controller registers.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::SdiResult;
use crate::handle::ResourceHandle;
use crate::ops::{CommDevice, ResourceOps};
use crate::types::{PlatformInfo, ResourceType, TelemetrySensor};
use std::sync::Arc;
use tracing::debug;

pub struct CommDevApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> CommDevApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn CommDevice>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(
            self.ctx,
            handle,
            ResourceType::CommDev,
            ResourceOps::as_comm_dev,
            op,
        )
    }

    /// Sends a northbound message and tells the controller it is complete.
    ///
    /// # Errors
    ///
    /// `InvalidMessage` if the message cannot be framed, `Transport` if any
    /// bus step fails. A failed send must be restarted from the beginning.
    pub fn msg_write(&self, handle: ResourceHandle, message: &[u8]) -> SdiResult<()> {
        debug!(len = message.len(), "comm-dev message write");
        self.call(handle, |c| c.send_message(message))
    }

    /// Receives the southbound message and acknowledges it.
    ///
    /// # Errors
    ///
    /// `InvalidMessage` on a checksum mismatch or oversized header; the
    /// message is not acknowledged in that case.
    pub fn msg_read(&self, handle: ResourceHandle) -> SdiResult<Vec<u8>> {
        self.call(handle, |c| c.receive_message())
    }

    /// Reads the southbound mailbox without acknowledging it.
    pub fn read_mailbox(&self, handle: ResourceHandle) -> SdiResult<Vec<u8>> {
        self.call(handle, |c| c.read_mailbox())
    }

    /// Writes the northbound mailbox without signalling completion.
    pub fn write_mailbox(&self, handle: ResourceHandle, message: &[u8]) -> SdiResult<()> {
        self.call(handle, |c| c.write_mailbox(message))
    }

    pub fn mark_package_verified(&self, handle: ResourceHandle) -> SdiResult<()> {
        self.call(handle, |c| c.mark_package_verified())
    }

    pub fn mark_download_complete(&self, handle: ResourceHandle) -> SdiResult<()> {
        self.call(handle, |c| c.mark_download_complete())
    }

    /// True when the controller has a message waiting for the host.
    pub fn is_msg_present(&self, handle: ResourceHandle) -> SdiResult<bool> {
        self.call(handle, |c| c.message_present())
    }

    /// True when the northbound mailbox can take a new message.
    pub fn is_write_buffer_ready(&self, handle: ResourceHandle) -> SdiResult<bool> {
        self.call(handle, |c| c.buffer_ready())
    }

    pub fn flush(&self, handle: ResourceHandle) -> SdiResult<()> {
        self.call(handle, |c| c.flush())
    }

    pub fn enable_messaging(&self, handle: ResourceHandle, enable: bool) -> SdiResult<()> {
        self.call(handle, |c| c.enable_messaging(enable))
    }

    pub fn platform_info(&self, handle: ResourceHandle) -> SdiResult<PlatformInfo> {
        self.call(handle, |c| c.platform_info())
    }

    pub fn iom_firmware_revision(&self, handle: ResourceHandle) -> SdiResult<String> {
        self.call(handle, |c| c.iom_firmware_revision())
    }

    pub fn set_iom_firmware_revision(
        &self,
        handle: ResourceHandle,
        revision: &str,
    ) -> SdiResult<()> {
        self.call(handle, |c| c.set_iom_firmware_revision(revision))
    }

    pub fn host_temperature_set(&self, handle: ResourceHandle, celsius: i32) -> SdiResult<()> {
        self.call(handle, |c| c.write_telemetry(TelemetrySensor::Host, celsius))
    }

    pub fn npu_temperature_set(&self, handle: ResourceHandle, celsius: i32) -> SdiResult<()> {
        self.call(handle, |c| c.write_telemetry(TelemetrySensor::Npu, celsius))
    }

    pub fn ambient_temperature_set(&self, handle: ResourceHandle, celsius: i32) -> SdiResult<()> {
        self.call(handle, |c| c.write_telemetry(TelemetrySensor::Ambient, celsius))
    }

    pub fn telemetry(&self, handle: ResourceHandle, sensor: TelemetrySensor) -> SdiResult<i32> {
        self.call(handle, |c| c.read_telemetry(sensor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl CommDevice for Recorder {
        fn read_mailbox(&self) -> SdiResult<Vec<u8>> {
            self.events.lock().push("read".into());
            Ok(b"PONG".to_vec())
        }

        fn write_mailbox(&self, message: &[u8]) -> SdiResult<()> {
            self.events
                .lock()
                .push(format!("write {}", String::from_utf8_lossy(message)));
            Ok(())
        }

        fn mark_package_verified(&self) -> SdiResult<()> {
            self.events.lock().push("verified".into());
            Ok(())
        }

        fn mark_download_complete(&self) -> SdiResult<()> {
            self.events.lock().push("complete".into());
            Ok(())
        }
    }

    #[test]
    fn test_msg_write_signals_completion() {
        let ctx = SdiContext::new();
        let dev = Arc::new(Recorder::default());
        let h = ctx
            .registry()
            .register("comm_dev", "cd", ResourceOps::CommDev(dev.clone()));
        ctx.comm_dev().msg_write(h, b"PING").unwrap();
        assert_eq!(*dev.events.lock(), vec!["write PING", "complete"]);
    }

    #[test]
    fn test_msg_read_acknowledges() {
        let ctx = SdiContext::new();
        let dev = Arc::new(Recorder::default());
        let h = ctx
            .registry()
            .register("comm_dev", "cd", ResourceOps::CommDev(dev.clone()));
        assert_eq!(ctx.comm_dev().msg_read(h).unwrap(), b"PONG".to_vec());
        assert_eq!(*dev.events.lock(), vec!["read", "verified"]);
    }

    #[test]
    fn test_unimplemented_registers_are_unsupported() {
        let ctx = SdiContext::new();
        let h = ctx.registry().register(
            "comm_dev",
            "cd",
            ResourceOps::CommDev(Arc::new(Recorder::default())),
        );
        assert!(ctx.comm_dev().platform_info(h).unwrap_err().is_unsupported());
        assert!(ctx.comm_dev().npu_temperature_set(h, 40).unwrap_err().is_unsupported());
    }
}
