//! Bus transports consumed by SDI drivers.
//!
//! The framework does not drive hardware itself. It consumes byte-level
//! primitives through [`I2cTransport`] and [`IoTransport`], and wraps each
//! physical bus in a lock so that a multi-step register sequence issued by
//! one caller is never interleaved with another caller's transactions.

use crate::error::SdiResult;
use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

/// Largest SMBus block transfer, in bytes.
pub const I2C_SMBUS_BLOCK_MAX: usize = 32;

/// Byte-level I2C/SMBus primitives of one physical bus.
pub trait I2cTransport: Send {
    /// Bus name used in logs and errors.
    fn name(&self) -> &str;

    /// Largest block the bus accepts in a single transaction.
    fn block_max(&self) -> usize {
        I2C_SMBUS_BLOCK_MAX
    }

    /// SMBus "read byte data": reads register `cmd` of slave `addr`.
    fn read_byte_data(&mut self, addr: u16, cmd: u8) -> SdiResult<u8>;

    /// SMBus "write byte data".
    fn write_byte_data(&mut self, addr: u16, cmd: u8, value: u8) -> SdiResult<()>;

    /// SMBus "receive byte": reads the byte at the slave's current pointer.
    fn recv_byte(&mut self, addr: u16) -> SdiResult<u8>;

    /// I2C block write of `data` starting at 16-bit register `offset`.
    ///
    /// `data` never exceeds [`I2cTransport::block_max`].
    fn write_block(&mut self, addr: u16, offset: u16, data: &[u8]) -> SdiResult<()>;
}

/// Guard holding exclusive access to an I2C bus.
pub type I2cBusGuard<'a> = MutexGuard<'a, Box<dyn I2cTransport>>;

/// A lock-protected I2C bus shared by every device wired to it.
pub struct I2cBus {
    name: String,
    block_max: usize,
    transport: Mutex<Box<dyn I2cTransport>>,
}

impl I2cBus {
    pub fn new(transport: Box<dyn I2cTransport>) -> Self {
        Self {
            name: transport.name().to_string(),
            block_max: transport.block_max(),
            transport: Mutex::new(transport),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block_max(&self) -> usize {
        self.block_max
    }

    /// Acquires the bus for a multi-step sequence.
    ///
    /// The lock is released when the guard drops.
    pub fn lock(&self) -> I2cBusGuard<'_> {
        self.transport.lock()
    }

    pub fn read_byte_data(&self, addr: u16, cmd: u8) -> SdiResult<u8> {
        self.lock().read_byte_data(addr, cmd)
    }

    pub fn write_byte_data(&self, addr: u16, cmd: u8, value: u8) -> SdiResult<()> {
        self.lock().write_byte_data(addr, cmd, value)
    }

    pub fn recv_byte(&self, addr: u16) -> SdiResult<u8> {
        self.lock().recv_byte(addr)
    }

    pub fn write_block(&self, addr: u16, offset: u16, data: &[u8]) -> SdiResult<()> {
        self.lock().write_block(addr, offset, data)
    }
}

impl std::fmt::Debug for I2cBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cBus")
            .field("name", &self.name)
            .field("block_max", &self.block_max)
            .finish()
    }
}

/// Port I/O primitives of a secondary bus.
pub trait IoTransport: Send {
    fn name(&self) -> &str;
    fn inb(&mut self, port: u16) -> SdiResult<u8>;
    fn outb(&mut self, port: u16, value: u8) -> SdiResult<()>;
}

/// Port numbers of an indexed register window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedPorts {
    pub addr_hi: u16,
    pub addr_lo: u16,
    pub data: u16,
}

/// A register space reached through an address-high / address-low / data
/// port triple.
///
/// Every register access is three dependent transactions, so the whole
/// triple runs under the bus lock.
pub struct IndexedIoBus {
    name: String,
    ports: IndexedPorts,
    transport: Mutex<Box<dyn IoTransport>>,
}

impl IndexedIoBus {
    pub fn new(transport: Box<dyn IoTransport>, ports: IndexedPorts) -> Self {
        Self {
            name: transport.name().to_string(),
            ports,
            transport: Mutex::new(transport),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> IndexedPorts {
        self.ports
    }

    fn select(&self, io: &mut dyn IoTransport, offset: u16) -> SdiResult<()> {
        io.outb(self.ports.addr_hi, (offset >> 8) as u8)?;
        io.outb(self.ports.addr_lo, (offset & 0xff) as u8)
    }

    /// Reads one register.
    pub fn read(&self, offset: u16) -> SdiResult<u8> {
        let mut io = self.transport.lock();
        self.select(io.as_mut(), offset)?;
        let value = io.inb(self.ports.data)?;
        trace!(bus = %self.name, offset, value, "indexed read");
        Ok(value)
    }

    /// Writes one register.
    pub fn write(&self, offset: u16, value: u8) -> SdiResult<()> {
        let mut io = self.transport.lock();
        self.select(io.as_mut(), offset)?;
        io.outb(self.ports.data, value)?;
        trace!(bus = %self.name, offset, value, "indexed write");
        Ok(())
    }
}

impl std::fmt::Debug for IndexedIoBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedIoBus")
            .field("name", &self.name())
            .field("ports", &self.ports())
            .finish()
    }
}

/// Byte-addressed register space of a device.
pub trait RegisterAccess: Send + Sync {
    /// Reads `len` consecutive registers starting at `offset`.
    fn read_reg(&self, offset: u16, len: usize) -> SdiResult<Vec<u8>>;

    /// Writes `data` to consecutive registers starting at `offset`.
    fn write_reg(&self, offset: u16, data: &[u8]) -> SdiResult<()>;

    /// Reads one byte from each of `offsets`, in order.
    ///
    /// Backends with a bus lock override this to run the whole sequence
    /// under one acquisition.
    fn read_scattered(&self, offsets: &[u16]) -> SdiResult<Vec<u8>> {
        let mut out = Vec::with_capacity(offsets.len());
        for offset in offsets {
            out.extend(self.read_reg(*offset, 1)?);
        }
        Ok(out)
    }

    /// Writes each `(offset, value)` pair, in order.
    fn write_scattered(&self, writes: &[(u16, u8)]) -> SdiResult<()> {
        for (offset, value) in writes {
            self.write_reg(*offset, &[*value])?;
        }
        Ok(())
    }
}

impl RegisterAccess for IndexedIoBus {
    fn read_reg(&self, offset: u16, len: usize) -> SdiResult<Vec<u8>> {
        let mut io = self.transport.lock();
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            self.select(io.as_mut(), offset.wrapping_add(i as u16))?;
            out.push(io.inb(self.ports.data)?);
        }
        Ok(out)
    }

    fn write_reg(&self, offset: u16, data: &[u8]) -> SdiResult<()> {
        let mut io = self.transport.lock();
        for (i, byte) in data.iter().enumerate() {
            self.select(io.as_mut(), offset.wrapping_add(i as u16))?;
            io.outb(self.ports.data, *byte)?;
        }
        Ok(())
    }

    fn read_scattered(&self, offsets: &[u16]) -> SdiResult<Vec<u8>> {
        let mut io = self.transport.lock();
        let mut out = Vec::with_capacity(offsets.len());
        for offset in offsets {
            self.select(io.as_mut(), *offset)?;
            out.push(io.inb(self.ports.data)?);
        }
        Ok(out)
    }

    fn write_scattered(&self, writes: &[(u16, u8)]) -> SdiResult<()> {
        let mut io = self.transport.lock();
        for (offset, value) in writes {
            self.select(io.as_mut(), *offset)?;
            io.outb(self.ports.data, *value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdiError;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Out(u16, u8),
        In(u16),
    }

    /// Emulates a CPLD behind an indexed window and records every port access.
    struct FakeIo {
        log: Arc<Mutex<Vec<Op>>>,
        regs: HashMap<u16, u8>,
        hi: u8,
        lo: u8,
    }

    impl IoTransport for FakeIo {
        fn name(&self) -> &str {
            "lpc"
        }

        fn inb(&mut self, port: u16) -> SdiResult<u8> {
            self.log.lock().push(Op::In(port));
            let offset = (u16::from(self.hi) << 8) | u16::from(self.lo);
            Ok(*self.regs.get(&offset).unwrap_or(&0))
        }

        fn outb(&mut self, port: u16, value: u8) -> SdiResult<()> {
            self.log.lock().push(Op::Out(port, value));
            match port {
                0x210 => self.hi = value,
                0x211 => self.lo = value,
                0x212 => {
                    let offset = (u16::from(self.hi) << 8) | u16::from(self.lo);
                    self.regs.insert(offset, value);
                }
                _ => return Err(SdiError::transport("lpc", port, libc::EINVAL)),
            }
            Ok(())
        }
    }

    fn ports() -> IndexedPorts {
        IndexedPorts {
            addr_hi: 0x210,
            addr_lo: 0x211,
            data: 0x212,
        }
    }

    #[test]
    fn test_indexed_access_sequence() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let io = FakeIo {
            log: log.clone(),
            regs: HashMap::new(),
            hi: 0,
            lo: 0,
        };
        let bus = IndexedIoBus::new(Box::new(io), ports());

        bus.write(0x1234, 0xab).unwrap();
        assert_eq!(bus.read(0x1234).unwrap(), 0xab);

        assert_eq!(
            *log.lock(),
            vec![
                Op::Out(0x210, 0x12),
                Op::Out(0x211, 0x34),
                Op::Out(0x212, 0xab),
                Op::Out(0x210, 0x12),
                Op::Out(0x211, 0x34),
                Op::In(0x212),
            ]
        );
    }

    #[test]
    fn test_register_access_multi_byte() {
        let io = FakeIo {
            log: Arc::new(Mutex::new(Vec::new())),
            regs: HashMap::new(),
            hi: 0,
            lo: 0,
        };
        let bus = IndexedIoBus::new(Box::new(io), ports());
        bus.write_reg(0x00ff, &[1, 2, 3]).unwrap();
        assert_eq!(bus.read_reg(0x00ff, 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(bus.read(0x0100).unwrap(), 2);
    }

    #[test]
    fn test_scattered_access_skips_gaps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let io = FakeIo {
            log: log.clone(),
            regs: HashMap::new(),
            hi: 0,
            lo: 0,
        };
        let bus = IndexedIoBus::new(Box::new(io), ports());
        bus.write_reg(0x41, &[0x55]).unwrap();
        bus.write_scattered(&[(0x40, 0x01), (0x42, 0x2c)]).unwrap();
        assert_eq!(bus.read_reg(0x40, 3).unwrap(), vec![0x01, 0x55, 0x2c]);
        assert_eq!(bus.read_scattered(&[0x42, 0x40]).unwrap(), vec![0x2c, 0x01]);
    }
}
