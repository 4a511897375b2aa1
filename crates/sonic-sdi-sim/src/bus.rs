//! Simulated buses.
//!
//! [`SimI2cBus`] emulates a set of slaves, each with a 64 KiB register
//! file. A slave is either byte addressed (the SMBus command selects the
//! register) or a 16-bit pointer device (a "write byte data" loads the
//! pointer from command and data, and "receive byte" reads at the pointer,
//! auto-incrementing). Every transaction is logged, and faults can be
//! injected to exercise error paths.
//!
//! Clones share state, so a test keeps one clone for inspection and hands
//! another to the bus lock.

use parking_lot::Mutex;
use sonic_sdi::{I2cTransport, IndexedPorts, IoTransport, SdiError, SdiResult, I2C_SMBUS_BLOCK_MAX};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

const REG_SPACE: usize = 0x1_0000;

/// One logged transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    ReadByteData { addr: u16, cmd: u8 },
    WriteByteData { addr: u16, cmd: u8, value: u8 },
    /// `offset` is the slave pointer the byte was read from.
    RecvByte { addr: u16, offset: u16 },
    WriteBlock { addr: u16, offset: u16, len: usize },
}

impl BusOp {
    pub fn addr(&self) -> u16 {
        match self {
            BusOp::ReadByteData { addr, .. }
            | BusOp::WriteByteData { addr, .. }
            | BusOp::RecvByte { addr, .. }
            | BusOp::WriteBlock { addr, .. } => *addr,
        }
    }
}

struct SimSlave {
    pointer_mode: bool,
    pointer: u16,
    regs: Vec<u8>,
}

impl SimSlave {
    fn new(pointer_mode: bool) -> Self {
        Self {
            pointer_mode,
            pointer: 0,
            regs: vec![0; REG_SPACE],
        }
    }
}

#[derive(Default)]
struct Faults {
    /// Transactions left before every transaction fails.
    fail_after: Option<usize>,
    offsets: HashSet<(u16, u16)>,
}

struct SimI2cState {
    slaves: HashMap<u16, SimSlave>,
    log: Vec<BusOp>,
    faults: Faults,
}

impl SimI2cState {
    fn slave(&mut self, addr: u16) -> &mut SimSlave {
        self.slaves.entry(addr).or_insert_with(|| SimSlave::new(false))
    }

    /// Logs `op` and decides whether it fails.
    fn begin(&mut self, op: BusOp, touched: std::ops::Range<u32>) -> bool {
        let addr = op.addr();
        self.log.push(op);
        if let Some(left) = self.faults.fail_after.as_mut() {
            if *left == 0 {
                return false;
            }
            *left -= 1;
        }
        !self
            .faults
            .offsets
            .iter()
            .any(|(a, off)| *a == addr && touched.contains(&u32::from(*off)))
    }
}

#[derive(Clone)]
pub struct SimI2cBus {
    name: String,
    block_max: usize,
    state: Arc<Mutex<SimI2cState>>,
}

impl SimI2cBus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            block_max: I2C_SMBUS_BLOCK_MAX,
            state: Arc::new(Mutex::new(SimI2cState {
                slaves: HashMap::new(),
                log: Vec::new(),
                faults: Faults::default(),
            })),
        }
    }

    pub fn with_block_max(mut self, block_max: usize) -> Self {
        self.block_max = block_max;
        self
    }

    /// Makes `addr` a 16-bit pointer device.
    pub fn add_pointer_device(&self, addr: u16) {
        self.state.lock().slave(addr).pointer_mode = true;
    }

    /// Presets registers without logging.
    pub fn set_regs(&self, addr: u16, offset: u16, data: &[u8]) {
        let mut state = self.state.lock();
        let start = usize::from(offset);
        let end = (start + data.len()).min(REG_SPACE);
        state.slave(addr).regs[start..end].copy_from_slice(&data[..end - start]);
    }

    pub fn regs(&self, addr: u16, offset: u16, len: usize) -> Vec<u8> {
        let mut state = self.state.lock();
        let start = usize::from(offset);
        let end = (start + len).min(REG_SPACE);
        state.slave(addr).regs[start..end].to_vec()
    }

    pub fn log(&self) -> Vec<BusOp> {
        self.state.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    /// Lets `n` more transactions through, then fails all of them.
    pub fn fail_after(&self, n: usize) {
        self.state.lock().faults.fail_after = Some(n);
    }

    /// Fails every transaction touching register `offset` of `addr`.
    pub fn fail_at(&self, addr: u16, offset: u16) {
        self.state.lock().faults.offsets.insert((addr, offset));
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    fn nack(&self, addr: u16) -> SdiError {
        SdiError::transport(self.name.clone(), addr, libc::EIO)
    }
}

impl std::fmt::Debug for SimI2cBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimI2cBus")
            .field("name", &self.name)
            .field("block_max", &self.block_max)
            .finish()
    }
}

impl I2cTransport for SimI2cBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_max(&self) -> usize {
        self.block_max
    }

    fn read_byte_data(&mut self, addr: u16, cmd: u8) -> SdiResult<u8> {
        let mut state = self.state.lock();
        let reg = u32::from(cmd);
        if !state.begin(BusOp::ReadByteData { addr, cmd }, reg..reg + 1) {
            return Err(self.nack(addr));
        }
        let value = state.slave(addr).regs[usize::from(cmd)];
        trace!(bus = %self.name, addr, cmd, value, "sim read byte data");
        Ok(value)
    }

    fn write_byte_data(&mut self, addr: u16, cmd: u8, value: u8) -> SdiResult<()> {
        let mut state = self.state.lock();
        let pointer_mode = state.slave(addr).pointer_mode;
        let touched = if pointer_mode {
            0..0
        } else {
            u32::from(cmd)..u32::from(cmd) + 1
        };
        if !state.begin(BusOp::WriteByteData { addr, cmd, value }, touched) {
            return Err(self.nack(addr));
        }
        let slave = state.slave(addr);
        if pointer_mode {
            slave.pointer = u16::from_le_bytes([cmd, value]);
        } else {
            slave.regs[usize::from(cmd)] = value;
        }
        Ok(())
    }

    fn recv_byte(&mut self, addr: u16) -> SdiResult<u8> {
        let mut state = self.state.lock();
        let offset = state.slave(addr).pointer;
        let reg = u32::from(offset);
        if !state.begin(BusOp::RecvByte { addr, offset }, reg..reg + 1) {
            return Err(self.nack(addr));
        }
        let slave = state.slave(addr);
        let value = slave.regs[usize::from(offset)];
        slave.pointer = offset.wrapping_add(1);
        Ok(value)
    }

    fn write_block(&mut self, addr: u16, offset: u16, data: &[u8]) -> SdiResult<()> {
        if data.len() > self.block_max || usize::from(offset) + data.len() > REG_SPACE {
            return Err(SdiError::transport(self.name.clone(), addr, libc::EINVAL));
        }
        let mut state = self.state.lock();
        let start = u32::from(offset);
        let op = BusOp::WriteBlock {
            addr,
            offset,
            len: data.len(),
        };
        if !state.begin(op, start..start + data.len() as u32) {
            return Err(self.nack(addr));
        }
        let start = usize::from(offset);
        state.slave(addr).regs[start..start + data.len()].copy_from_slice(data);
        trace!(bus = %self.name, addr, offset, len = data.len(), "sim block write");
        Ok(())
    }
}

struct SimIoState {
    addr_hi: u8,
    addr_lo: u8,
    mem: Vec<u8>,
}

/// Indexed I/O window: address-high, address-low and data ports in front
/// of a 64 KiB register file.
#[derive(Clone)]
pub struct SimIo {
    name: String,
    ports: IndexedPorts,
    state: Arc<Mutex<SimIoState>>,
}

impl SimIo {
    /// Uses the default port triple 0x210/0x211/0x212.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_ports(
            name,
            IndexedPorts {
                addr_hi: 0x210,
                addr_lo: 0x211,
                data: 0x212,
            },
        )
    }

    pub fn with_ports(name: impl Into<String>, ports: IndexedPorts) -> Self {
        Self {
            name: name.into(),
            ports,
            state: Arc::new(Mutex::new(SimIoState {
                addr_hi: 0,
                addr_lo: 0,
                mem: vec![0; REG_SPACE],
            })),
        }
    }

    pub fn mem(&self, offset: u16, len: usize) -> Vec<u8> {
        let state = self.state.lock();
        let start = usize::from(offset);
        state.mem[start..(start + len).min(REG_SPACE)].to_vec()
    }

    pub fn set_mem(&self, offset: u16, data: &[u8]) {
        let mut state = self.state.lock();
        let start = usize::from(offset);
        let end = (start + data.len()).min(REG_SPACE);
        state.mem[start..end].copy_from_slice(&data[..end - start]);
    }
}

impl std::fmt::Debug for SimIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimIo")
            .field("name", &self.name)
            .field("ports", &self.ports)
            .finish()
    }
}

impl IoTransport for SimIo {
    fn name(&self) -> &str {
        &self.name
    }

    fn inb(&mut self, port: u16) -> SdiResult<u8> {
        let state = self.state.lock();
        if port == self.ports.data {
            let index = usize::from(u16::from_be_bytes([state.addr_hi, state.addr_lo]));
            Ok(state.mem[index])
        } else if port == self.ports.addr_hi {
            Ok(state.addr_hi)
        } else if port == self.ports.addr_lo {
            Ok(state.addr_lo)
        } else {
            Err(SdiError::transport(self.name.clone(), port, libc::ENXIO))
        }
    }

    fn outb(&mut self, port: u16, value: u8) -> SdiResult<()> {
        let mut state = self.state.lock();
        if port == self.ports.data {
            let index = usize::from(u16::from_be_bytes([state.addr_hi, state.addr_lo]));
            state.mem[index] = value;
        } else if port == self.ports.addr_hi {
            state.addr_hi = value;
        } else if port == self.ports.addr_lo {
            state.addr_lo = value;
        } else {
            return Err(SdiError::transport(self.name.clone(), port, libc::ENXIO));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_byte_mode_registers() {
        let mut bus = SimI2cBus::new("sim");
        bus.write_byte_data(0x48, 0x03, 80).unwrap();
        assert_eq!(bus.read_byte_data(0x48, 0x03).unwrap(), 80);
        assert_eq!(bus.regs(0x48, 0x03, 1), vec![80]);
    }

    #[test]
    fn test_pointer_mode_auto_increments() {
        let mut bus = SimI2cBus::new("sim");
        bus.add_pointer_device(0x32);
        bus.set_regs(0x32, 0x7c90, &[0xaa, 0xbb]);
        bus.write_byte_data(0x32, 0x90, 0x7c).unwrap();
        assert_eq!(bus.recv_byte(0x32).unwrap(), 0xaa);
        assert_eq!(bus.recv_byte(0x32).unwrap(), 0xbb);
        // Loading the pointer does not touch the register file.
        assert_eq!(bus.regs(0x32, 0x90, 1), vec![0]);
        assert_eq!(
            bus.log()[2],
            BusOp::RecvByte { addr: 0x32, offset: 0x7c91 }
        );
    }

    #[test]
    fn test_block_limit_and_faults() {
        let mut bus = SimI2cBus::new("sim").with_block_max(8);
        assert!(bus.write_block(0x50, 0, &[0; 9]).is_err());
        bus.fail_after(1);
        bus.write_block(0x50, 0, &[1; 8]).unwrap();
        let err = bus.write_block(0x50, 8, &[1; 8]).unwrap_err();
        assert_eq!(err.errno(), libc::EIO);
        bus.clear_faults();
        bus.fail_at(0x50, 0x20);
        assert!(bus.write_block(0x50, 0x1c, &[0; 8]).is_err());
        assert!(bus.write_block(0x50, 0x21, &[0; 8]).is_ok());
    }

    #[test]
    fn test_indexed_io() {
        let mut io = SimIo::new("io");
        io.outb(0x210, 0x12).unwrap();
        io.outb(0x211, 0x34).unwrap();
        io.outb(0x212, 0x5a).unwrap();
        assert_eq!(io.mem(0x1234, 1), vec![0x5a]);
        assert_eq!(io.inb(0x212).unwrap(), 0x5a);
        assert!(io.inb(0x300).is_err());
    }
}
