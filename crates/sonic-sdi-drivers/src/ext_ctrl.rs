//! External-control register layouts and the plain register ext-ctrl
//! resource.
//!
//! An ext-ctrl resource reads and writes a small vector of integers living
//! in registers of some backing device. The layout says where the first
//! register byte sits (`offset`), how many bytes make one value (`width`,
//! 1 or 2, signed), the address distance between consecutive register
//! bytes (`step`), the byte order of two-byte values and how values scale
//! into register units (`scale`, tenths by default).

use crate::pointer::PointerDevice;
use sonic_sdi::{
    BusHandle, Device, DeviceConfig, DeviceDriver, ExtControl, RegisterAccess, ResourceOps,
    SdiContext, SdiError, SdiResult,
};
use sonic_sdi::driver::require_bus;
use std::sync::Arc;
use tracing::{debug, warn};

/// Register units per value unit unless a node says otherwise.
pub const DEFAULT_SCALE: i32 = 10;

/// A register byte reading back as this has not been latched yet.
pub const NOT_READY: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn parse(field: String, text: &str) -> SdiResult<Self> {
        match text {
            "little" => Ok(ByteOrder::Little),
            "big" => Ok(ByteOrder::Big),
            other => Err(SdiError::invalid_config(
                field,
                format!("byte order {} is neither big nor little", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtCtrlLayout {
    pub offset: u16,
    pub width: u8,
    pub step: u16,
    pub scale: i32,
    pub count: usize,
    pub byte_order: ByteOrder,
}

impl Default for ExtCtrlLayout {
    fn default() -> Self {
        Self {
            offset: 0,
            width: 1,
            step: 1,
            scale: DEFAULT_SCALE,
            count: 1,
            byte_order: ByteOrder::Little,
        }
    }
}

impl ExtCtrlLayout {
    /// Reads `offset`, `width`, `step`, `scale`, `count` and `byte_order`
    /// attributes of a node. `byte_order` falls back to `order`.
    pub fn from_node(node: &DeviceConfig, order: ByteOrder) -> SdiResult<Self> {
        let field = |key: &str| format!("{}.{}", node.driver, key);
        let mut layout = Self {
            byte_order: order,
            ..Self::default()
        };
        if let Some(offset) = node.attr_i64("offset")? {
            layout.offset = u16::try_from(offset)
                .map_err(|_| SdiError::invalid_config(field("offset"), "offset exceeds 16 bits"))?;
        }
        if let Some(width) = node.attr_i64("width")? {
            layout.width = match width {
                1 => 1,
                2 => 2,
                _ => return Err(SdiError::invalid_config(field("width"), "width must be 1 or 2")),
            };
        }
        if let Some(step) = node.attr_i64("step")? {
            layout.step = u16::try_from(step)
                .ok()
                .filter(|s| *s >= 1)
                .ok_or_else(|| SdiError::invalid_config(field("step"), "step must be at least 1"))?;
        }
        if let Some(scale) = node.attr_i64("scale")? {
            layout.scale = i32::try_from(scale)
                .ok()
                .filter(|s| *s >= 1)
                .ok_or_else(|| SdiError::invalid_config(field("scale"), "scale must be at least 1"))?;
        }
        if let Some(count) = node.attr_u32("count")? {
            if count == 0 {
                return Err(SdiError::invalid_config(field("count"), "count must be at least 1"));
            }
            layout.count = count as usize;
        }
        if let Some(order) = node.attr_str("byte_order") {
            layout.byte_order = ByteOrder::parse(field("byte_order"), &order)?;
        }
        let last = u64::from(layout.offset)
            + (layout.byte_len(layout.count) as u64 - 1) * u64::from(layout.step);
        if last > 0xffff {
            return Err(SdiError::invalid_config(
                field("count"),
                "registers run past the 16-bit register space",
            ));
        }
        Ok(layout)
    }

    fn check_count(&self, n: usize) -> SdiResult<()> {
        if n == 0 || n > self.count {
            return Err(SdiError::out_of_range(format!(
                "{} values requested, layout holds {}",
                n, self.count
            )));
        }
        Ok(())
    }

    pub fn byte_len(&self, n: usize) -> usize {
        n * usize::from(self.width)
    }

    /// Register addresses of the first `n` values, one per byte.
    pub fn addresses(&self, n: usize) -> Vec<u16> {
        (0..self.byte_len(n))
            .map(|i| self.offset + i as u16 * self.step)
            .collect()
    }

    /// Register image of `values`, in address order.
    pub fn encode(&self, values: &[i32]) -> SdiResult<Vec<u8>> {
        self.check_count(values.len())?;
        let mut out = Vec::with_capacity(self.byte_len(values.len()));
        for value in values {
            let raw = value.checked_mul(self.scale).ok_or_else(|| self.overflow(*value))?;
            if self.width == 1 {
                out.push(i8::try_from(raw).map_err(|_| self.overflow(*value))? as u8);
                continue;
            }
            let raw = i16::try_from(raw).map_err(|_| self.overflow(*value))?;
            match self.byte_order {
                ByteOrder::Little => out.extend_from_slice(&raw.to_le_bytes()),
                ByteOrder::Big => out.extend_from_slice(&raw.to_be_bytes()),
            }
        }
        Ok(out)
    }

    /// Values held in a register image.
    pub fn decode(&self, bytes: &[u8]) -> Vec<i32> {
        match self.width {
            1 => bytes.iter().map(|b| i32::from(*b as i8) / self.scale).collect(),
            _ => bytes
                .chunks_exact(2)
                .map(|c| {
                    let raw = match self.byte_order {
                        ByteOrder::Little => i16::from_le_bytes([c[0], c[1]]),
                        ByteOrder::Big => i16::from_be_bytes([c[0], c[1]]),
                    };
                    i32::from(raw) / self.scale
                })
                .collect(),
        }
    }

    /// Fails with `NotReady` when the low byte of any value reads 0xff.
    pub fn check_ready(&self, bytes: &[u8]) -> SdiResult<()> {
        let width = usize::from(self.width);
        for (i, value) in bytes.chunks_exact(width).enumerate() {
            let low = match self.byte_order {
                ByteOrder::Little => value[0],
                ByteOrder::Big => value[width - 1],
            };
            if low == NOT_READY {
                warn!(offset = self.offset, index = i, "ext-ctrl data not ready");
                return Err(SdiError::not_ready(format!(
                    "value {} at {:#06x} reads {:#04x}",
                    i, self.offset, NOT_READY
                )));
            }
        }
        Ok(())
    }

    fn overflow(&self, value: i32) -> SdiError {
        SdiError::out_of_range(format!(
            "{} does not fit a {} byte register with scale {}",
            value, self.width, self.scale
        ))
    }

    /// Raw register bytes of the first `n` values.
    pub fn read_raw(&self, regs: &dyn RegisterAccess, n: usize) -> SdiResult<Vec<u8>> {
        self.check_count(n)?;
        if self.step == 1 {
            regs.read_reg(self.offset, self.byte_len(n))
        } else {
            regs.read_scattered(&self.addresses(n))
        }
    }

    /// Reads `n` values through `regs`.
    pub fn get(&self, regs: &dyn RegisterAccess, n: usize) -> SdiResult<Vec<i32>> {
        Ok(self.decode(&self.read_raw(regs, n)?))
    }

    /// Writes `values` through `regs`.
    pub fn set(&self, regs: &dyn RegisterAccess, values: &[i32]) -> SdiResult<()> {
        let bytes = self.encode(values)?;
        debug!(offset = self.offset, step = self.step, count = values.len(), "ext-ctrl write");
        if self.step == 1 {
            return regs.write_reg(self.offset, &bytes);
        }
        let writes: Vec<(u16, u8)> = self.addresses(values.len()).into_iter().zip(bytes).collect();
        regs.write_scattered(&writes)
    }
}

/// Ext-ctrl directly over a register backend.
pub struct RegExtCtrl {
    regs: Arc<dyn RegisterAccess>,
    layout: ExtCtrlLayout,
}

impl RegExtCtrl {
    pub fn new(regs: Arc<dyn RegisterAccess>, layout: ExtCtrlLayout) -> Self {
        Self { regs, layout }
    }
}

impl ExtControl for RegExtCtrl {
    /// Values whose low byte reads 0xff are not latched yet.
    fn get(&self, count: usize) -> SdiResult<Vec<i32>> {
        let bytes = self.layout.read_raw(self.regs.as_ref(), count)?;
        self.layout.check_ready(&bytes)?;
        Ok(self.layout.decode(&bytes))
    }

    fn set(&self, values: &[i32]) -> SdiResult<()> {
        self.layout.set(self.regs.as_ref(), values)
    }
}

pub(crate) struct AliasDevice {
    pub(crate) alias: String,
}

impl Device for AliasDevice {
    fn alias(&self) -> &str {
        &self.alias
    }
}

/// Driver `reg_ext_ctrl`: registers on an indexed I/O bus, or on a 16-bit
/// pointer I2C slave when the node sits on an I2C bus. Two-byte values are
/// big endian on indexed I/O and little endian on I2C unless `byte_order`
/// says otherwise.
#[derive(Debug, Default)]
pub struct RegExtCtrlDriver;

impl DeviceDriver for RegExtCtrlDriver {
    fn name(&self) -> &'static str {
        "reg_ext_ctrl"
    }

    fn register(
        &self,
        node: &DeviceConfig,
        bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>> {
        let (regs, order): (Arc<dyn RegisterAccess>, ByteOrder) = match require_bus(node, bus)? {
            BusHandle::Io(io) => (io.clone(), ByteOrder::Big),
            BusHandle::I2c(i2c) => (
                Arc::new(PointerDevice::new(i2c.clone(), node.required_address()?)),
                ByteOrder::Little,
            ),
        };
        let layout = ExtCtrlLayout::from_node(node, order)?;
        let alias = node.alias_or("reg_ext_ctrl");
        ctx.registry().register(
            alias.clone(),
            alias.clone(),
            ResourceOps::ExtControl(Arc::new(RegExtCtrl::new(regs, layout))),
        );
        Ok(Box::new(AliasDevice { alias }))
    }
}
