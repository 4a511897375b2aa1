//! Register access to slaves with a 16-bit internal address pointer.
//!
//! Reads load the pointer with an SMBus "write byte data" (low byte as the
//! command, high byte as the data) and then clock bytes out with "receive
//! byte", the slave auto-incrementing its pointer. Writes are block writes
//! split to half the bus block maximum.

use crate::comm_dev::framing::{chunk_size, segments};
use sonic_sdi::{I2cBus, I2cTransport, RegisterAccess, SdiError, SdiResult};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct PointerDevice {
    bus: Arc<I2cBus>,
    addr: u16,
}

impl PointerDevice {
    pub fn new(bus: Arc<I2cBus>, addr: u16) -> Self {
        Self { bus, addr }
    }

    pub fn bus(&self) -> &Arc<I2cBus> {
        &self.bus
    }

    pub fn addr(&self) -> u16 {
        self.addr
    }

    /// Largest chunk a single write transaction carries.
    pub fn chunk(&self) -> usize {
        chunk_size(self.bus.block_max())
    }

    fn check_span(&self, offset: u16, len: usize) -> SdiResult<()> {
        if u32::from(offset) + len as u32 > 0x1_0000 {
            return Err(SdiError::out_of_range(format!(
                "{} bytes at {:#06x} run past the 16-bit register space of {:#04x}",
                len, offset, self.addr
            )));
        }
        Ok(())
    }

    fn load_and_receive(&self, bus: &mut dyn I2cTransport, offset: u16, len: usize) -> SdiResult<Vec<u8>> {
        bus.write_byte_data(self.addr, (offset & 0xff) as u8, (offset >> 8) as u8)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(bus.recv_byte(self.addr)?);
        }
        Ok(data)
    }

    fn write_segments(&self, bus: &mut dyn I2cTransport, offset: u16, data: &[u8]) -> SdiResult<()> {
        for seg in segments(data.len(), self.chunk()) {
            let at = offset + seg.start as u16;
            if let Err(e) = bus.write_block(self.addr, at, &data[seg.range()]) {
                error!(
                    bus = %self.bus.name(),
                    addr = self.addr,
                    offset = at,
                    len = seg.len,
                    error = %e,
                    "segment write failed"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Reads `len` bytes starting at `offset` under one bus lock.
    pub fn read(&self, offset: u16, len: usize) -> SdiResult<Vec<u8>> {
        self.check_span(offset, len)?;
        let mut bus = self.bus.lock();
        let data = self.load_and_receive(&mut **bus, offset, len)?;
        debug!(bus = %self.bus.name(), addr = self.addr, offset, len, "pointer read");
        Ok(data)
    }

    /// Writes `data` at `offset`, segmented to the bus limit.
    ///
    /// Stops at the first failing chunk and returns its error; bytes already
    /// written stay in place.
    pub fn write(&self, offset: u16, data: &[u8]) -> SdiResult<()> {
        self.check_span(offset, data.len())?;
        let mut bus = self.bus.lock();
        self.write_segments(&mut **bus, offset, data)?;
        debug!(bus = %self.bus.name(), addr = self.addr, offset, len = data.len(), "segmented write");
        Ok(())
    }

    /// Reads `len` bytes at `offset`, lets `f` edit them and writes the
    /// result back, all under one bus lock.
    pub fn modify<F>(&self, offset: u16, len: usize, f: F) -> SdiResult<Vec<u8>>
    where
        F: FnOnce(&mut [u8]),
    {
        self.check_span(offset, len)?;
        let mut bus = self.bus.lock();
        let mut data = self.load_and_receive(&mut **bus, offset, len)?;
        f(&mut data);
        self.write_segments(&mut **bus, offset, &data)?;
        debug!(bus = %self.bus.name(), addr = self.addr, offset, len, "read-modify-write");
        Ok(data)
    }

    /// Atomic read-modify-write of a little endian 16-bit register.
    /// Returns the value written.
    pub fn modify_u16<F>(&self, offset: u16, f: F) -> SdiResult<u16>
    where
        F: FnOnce(u16) -> u16,
    {
        let data = self.modify(offset, 2, |b| {
            let value = f(u16::from_le_bytes([b[0], b[1]]));
            b.copy_from_slice(&value.to_le_bytes());
        })?;
        Ok(u16::from_le_bytes([data[0], data[1]]))
    }

    pub fn read_u16(&self, offset: u16) -> SdiResult<u16> {
        let b = self.read(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn write_u16(&self, offset: u16, value: u16) -> SdiResult<()> {
        self.write(offset, &value.to_le_bytes())
    }

    pub fn read_u8(&self, offset: u16) -> SdiResult<u8> {
        Ok(self.read(offset, 1)?[0])
    }
}

impl RegisterAccess for PointerDevice {
    fn read_reg(&self, offset: u16, len: usize) -> SdiResult<Vec<u8>> {
        self.read(offset, len)
    }

    fn write_reg(&self, offset: u16, data: &[u8]) -> SdiResult<()> {
        self.write(offset, data)
    }

    fn read_scattered(&self, offsets: &[u16]) -> SdiResult<Vec<u8>> {
        let mut bus = self.bus.lock();
        let mut out = Vec::with_capacity(offsets.len());
        for offset in offsets {
            out.extend(self.load_and_receive(&mut **bus, *offset, 1)?);
        }
        Ok(out)
    }

    fn write_scattered(&self, writes: &[(u16, u8)]) -> SdiResult<()> {
        let mut bus = self.bus.lock();
        for (offset, value) in writes {
            self.write_segments(&mut **bus, *offset, &[*value])?;
        }
        Ok(())
    }
}
