//! Comm-dev link: the mailbox protocol and fixed-offset fields over a
//! 16-bit pointer I2C slave.

use super::framing::{self, MailboxHeader, HEADER_SIZE};
use super::regs::*;
use crate::pointer::PointerDevice;
use parking_lot::Mutex;
use sonic_sdi::types::{PlatformInfo, TelemetrySensor};
use sonic_sdi::{I2cBus, RegisterAccess, SdiError, SdiResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Alarms decoded from the status register. All bits are active low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusAlarms {
    pub controller_reset: bool,
    pub port_notify: bool,
    pub nb_timeout: bool,
}

impl StatusAlarms {
    pub fn from_status(status: u16) -> Self {
        Self {
            controller_reset: status & STATUS_BIT_RESET == 0,
            port_notify: status & STATUS_BIT_PORT_NOTIFY == 0,
            nb_timeout: status & STATUS_BIT_NB_TIMEOUT == 0,
        }
    }
}

/// Connection to one chassis management controller.
///
/// Writers serialize on `write_lock` for the whole recovery, frame and
/// completion sequence, and so do the standalone refresh, flush and enable
/// calls. Readers only take the bus lock.
#[derive(Debug)]
pub struct CommDevLink {
    dev: PointerDevice,
    write_lock: Mutex<()>,
}

impl CommDevLink {
    pub fn new(bus: Arc<I2cBus>, addr: u16) -> Self {
        Self {
            dev: PointerDevice::new(bus, addr),
            write_lock: Mutex::new(()),
        }
    }

    pub fn device(&self) -> &PointerDevice {
        &self.dev
    }

    /// Re-enables the mailbox if the controller reset, then clears the
    /// status register. Returns the status read before clearing.
    pub fn refresh(&self) -> SdiResult<u16> {
        let _guard = self.write_lock.lock();
        self.refresh_locked()
    }

    fn refresh_locked(&self) -> SdiResult<u16> {
        let status = self.dev.read_u16(STATUS)?;
        if status & STATUS_BIT_RESET == 0 {
            info!(status, "controller reset, re-enabling mailbox");
            self.dev.write_u16(MAILBOX_ENABLE, MAILBOX_ENABLE_VALUE)?;
        }
        self.dev.write_u16(STATUS, STATUS_CLEAR)?;
        Ok(status)
    }

    /// Full recovery run before every mailbox write: refresh, report the
    /// alarms that were raised and flush the northbound mailbox.
    pub fn recover(&self) -> SdiResult<StatusAlarms> {
        let _guard = self.write_lock.lock();
        self.recover_locked()
    }

    fn recover_locked(&self) -> SdiResult<StatusAlarms> {
        let status = self.refresh_locked()?;
        let alarms = StatusAlarms::from_status(status);
        if alarms.controller_reset {
            warn!(status, "comm-dev alarm: controller reset");
        }
        if alarms.port_notify {
            warn!(status, "comm-dev alarm: port notify");
        }
        if alarms.nb_timeout {
            warn!(status, "comm-dev alarm: northbound timeout");
        }
        self.set_control_bits(CONTROL_BIT_NB_FLUSH)?;
        Ok(alarms)
    }

    /// Sets `bits` in the control register. The read and the write run
    /// under one bus lock, so concurrent updates of other bits survive.
    fn set_control_bits(&self, bits: u16) -> SdiResult<u16> {
        self.dev.modify_u16(MAILBOX_CONTROL, |control| control | bits)
    }

    pub fn flush(&self) -> SdiResult<()> {
        let _guard = self.write_lock.lock();
        self.set_control_bits(CONTROL_BIT_NB_FLUSH).map(|_| ())
    }

    /// Acknowledges the southbound package. Readers do not take the write
    /// lock; the control update is atomic on the bus.
    pub fn mark_read_verified(&self) -> SdiResult<()> {
        self.set_control_bits(CONTROL_BIT_SB_READ_VERIFIED).map(|_| ())
    }

    /// Sets the download complete bit and the northbound time threshold in
    /// one write spanning both registers.
    pub fn mark_download_complete(&self) -> SdiResult<()> {
        let _guard = self.write_lock.lock();
        self.signal_download_complete()
    }

    fn signal_download_complete(&self) -> SdiResult<()> {
        self.dev
            .modify(MAILBOX_CONTROL, 4, |b| {
                let control = u16::from_le_bytes([b[0], b[1]]) | CONTROL_BIT_NB_DOWNLOAD_COMPLETE;
                b[..2].copy_from_slice(&control.to_le_bytes());
                b[2..].copy_from_slice(&NB_TIME_THRESHOLD_VALUE.to_le_bytes());
            })
            .map(|_| ())
    }

    /// Frames `message` into the northbound mailbox, without signaling.
    pub fn write_mailbox(&self, message: &[u8]) -> SdiResult<()> {
        let _guard = self.write_lock.lock();
        self.write_locked(message)
    }

    /// Frames `message` and signals download complete in one critical
    /// section.
    pub fn send_message(&self, message: &[u8]) -> SdiResult<()> {
        let _guard = self.write_lock.lock();
        self.write_locked(message)?;
        self.signal_download_complete()
    }

    fn write_locked(&self, message: &[u8]) -> SdiResult<()> {
        let payload = framing::terminate(message)?;
        let header = MailboxHeader::for_payload(&payload)?;
        self.recover_locked()?;
        self.dev.write(NB_MAILBOX, &header.encode())?;
        self.dev.write(NB_MAILBOX + HEADER_SIZE as u16, &payload)?;
        debug!(size = header.size, checksum = header.checksum, "northbound message written");
        Ok(())
    }

    /// Reads and verifies the southbound message, without its terminator.
    pub fn read_mailbox(&self) -> SdiResult<Vec<u8>> {
        let raw = self.dev.read(SB_MAILBOX, HEADER_SIZE)?;
        let header = MailboxHeader::decode([raw[0], raw[1], raw[2], raw[3]]);
        let len = header.payload_len()?;
        let payload = self.dev.read(SB_MAILBOX + HEADER_SIZE as u16, len)?;
        if !header.verify(&payload) {
            warn!(size = header.size, checksum = header.checksum, "southbound checksum mismatch");
            return Err(SdiError::invalid_message(format!(
                "checksum mismatch for {} byte message",
                len
            )));
        }
        debug!(size = header.size, "southbound message verified");
        Ok(framing::strip_terminator(payload))
    }

    pub fn receive_message(&self) -> SdiResult<Vec<u8>> {
        let message = self.read_mailbox()?;
        self.mark_read_verified()?;
        Ok(message)
    }

    pub fn message_present(&self) -> SdiResult<bool> {
        Ok(self.dev.read_u8(SB_MAILBOX_STATUS)? & SB_STATUS_BIT_PACKAGE_PRESENT != 0)
    }

    /// The controller clears the pending bit once it picked up the last
    /// northbound package.
    pub fn buffer_ready(&self) -> SdiResult<bool> {
        Ok(self.dev.read_u8(NB_MAILBOX_STATUS)? & NB_STATUS_BIT_PACKAGE_IN_MAILBOX == 0)
    }

    pub fn enable_messaging(&self, enable: bool) -> SdiResult<()> {
        let _guard = self.write_lock.lock();
        let value = if enable {
            MAILBOX_ENABLE_VALUE
        } else {
            MAILBOX_DISABLE_VALUE
        };
        self.dev.write_u16(MAILBOX_ENABLE, value)
    }

    fn read_string(&self, offset: u16, len: usize) -> SdiResult<String> {
        let bytes = self.dev.read(offset, len)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).trim_end().to_string())
    }

    pub fn platform_info(&self) -> SdiResult<PlatformInfo> {
        Ok(PlatformInfo {
            service_tag: self.read_string(CHASSIS_SERVICE_TAG, CHASSIS_SERVICE_TAG_SIZE)?,
            comm_dev_fw_version: self.read_string(FW_REVS, FW_REVS_SIZE)?,
            slot_occupation: self.slot_occupation()?,
        })
    }

    pub fn slot_occupation(&self) -> SdiResult<u8> {
        Ok(self.dev.read_u8(IOM_SLOT_OCCUPATION)? & IOM_SLOT_MASK)
    }

    pub fn iom_firmware_revision(&self) -> SdiResult<String> {
        self.read_string(IOM_FW_REV, IOM_FW_REV_SIZE)
    }

    pub fn set_iom_firmware_revision(&self, revision: &str) -> SdiResult<()> {
        let bytes = revision.as_bytes();
        if bytes.len() > IOM_FW_REV_SIZE {
            return Err(SdiError::out_of_range(format!(
                "firmware revision of {} bytes exceeds {}",
                bytes.len(),
                IOM_FW_REV_SIZE
            )));
        }
        let mut field = [0u8; IOM_FW_REV_SIZE];
        field[..bytes.len()].copy_from_slice(bytes);
        self.dev.write(IOM_FW_REV, &field)
    }

    fn telemetry_register(sensor: TelemetrySensor) -> u16 {
        match sensor {
            TelemetrySensor::Host | TelemetrySensor::Npu => SENSOR_06_TELEMETRY,
            TelemetrySensor::Ambient => SENSOR_07_TELEMETRY,
        }
    }

    /// Writes a temperature in tenths of a degree. Sensor #6 refreshes the
    /// controller status first.
    pub fn write_telemetry(&self, sensor: TelemetrySensor, celsius: i32) -> SdiResult<()> {
        let tenths = celsius
            .checked_mul(10)
            .and_then(|v| i16::try_from(v).ok())
            .ok_or_else(|| {
                SdiError::out_of_range(format!("{} C does not fit the telemetry register", celsius))
            })?;
        let register = Self::telemetry_register(sensor);
        let _guard = self.write_lock.lock();
        if register == SENSOR_06_TELEMETRY {
            self.refresh_locked()?;
        }
        self.dev.write(register, &tenths.to_le_bytes())
    }

    pub fn read_telemetry(&self, sensor: TelemetrySensor) -> SdiResult<i32> {
        let raw = self.dev.read(Self::telemetry_register(sensor), TELEMETRY_SIZE)?;
        Ok(i32::from(i16::from_le_bytes([raw[0], raw[1]])) / 10)
    }
}

impl RegisterAccess for CommDevLink {
    fn read_reg(&self, offset: u16, len: usize) -> SdiResult<Vec<u8>> {
        self.dev.read(offset, len)
    }

    fn write_reg(&self, offset: u16, data: &[u8]) -> SdiResult<()> {
        self.dev.write(offset, data)
    }
}
