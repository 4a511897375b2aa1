//! NVRAM window on an I2C EEPROM or on a device file.

use crate::pointer::PointerDevice;
use sonic_sdi::{
    BusHandle, Device, DeviceConfig, DeviceDriver, NvramDevice, ResourceOps, SdiContext, SdiError,
    SdiResult,
};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

#[derive(Debug)]
enum Backend {
    I2c {
        dev: PointerDevice,
        /// Writes never straddle a page boundary when set.
        page_size: Option<usize>,
    },
    File(PathBuf),
}

/// A `size` byte window starting at `base` in the backing store.
#[derive(Debug)]
pub struct Nvram {
    alias: String,
    backend: Backend,
    base: u64,
    size: usize,
}

impl Nvram {
    fn check(&self, offset: u32, len: usize, op: &str) -> SdiResult<()> {
        if offset as usize + len > self.size {
            error!(alias = %self.alias, offset, len, "attempt to {} past end of NVRAM", op);
            return Err(SdiError::out_of_range(format!(
                "{} bytes at {} exceed NVRAM size {}",
                len, offset, self.size
            )));
        }
        Ok(())
    }

    fn i2c_offset(&self, offset: u32) -> SdiResult<u16> {
        u16::try_from(self.base + u64::from(offset))
            .map_err(|_| SdiError::out_of_range("offset exceeds the EEPROM address space"))
    }
}

/// Splits a write at `start` into pieces that stay inside one page.
fn page_pieces(start: usize, len: usize, page: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut done = 0;
    while done < len {
        let at = start + done;
        let n = (page - at % page).min(len - done);
        pieces.push((done, n));
        done += n;
    }
    pieces
}

impl NvramDevice for Nvram {
    fn size(&self) -> SdiResult<usize> {
        Ok(self.size)
    }

    fn read(&self, offset: u32, len: usize) -> SdiResult<Vec<u8>> {
        self.check(offset, len, "read")?;
        match &self.backend {
            Backend::I2c { dev, .. } => dev.read(self.i2c_offset(offset)?, len),
            Backend::File(path) => {
                let mut file = OpenOptions::new().read(true).open(path)?;
                file.seek(SeekFrom::Start(self.base + u64::from(offset)))?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf)?;
                Ok(buf)
            }
        }
    }

    fn write(&self, offset: u32, data: &[u8]) -> SdiResult<()> {
        self.check(offset, data.len(), "write")?;
        match &self.backend {
            Backend::I2c { dev, page_size } => {
                let start = self.i2c_offset(offset)?;
                match page_size {
                    Some(page) => {
                        for (at, n) in page_pieces(usize::from(start), data.len(), *page) {
                            dev.write(start + at as u16, &data[at..at + n])?;
                        }
                        Ok(())
                    }
                    None => dev.write(start, data),
                }
            }
            Backend::File(path) => {
                let mut file = OpenOptions::new().write(true).open(path)?;
                file.seek(SeekFrom::Start(self.base + u64::from(offset)))?;
                file.write_all(data)?;
                Ok(())
            }
        }
    }
}

struct NvramDeviceNode {
    alias: String,
}

impl Device for NvramDeviceNode {
    fn alias(&self) -> &str {
        &self.alias
    }
}

/// Driver `nvram`.
///
/// Attributes: `size` (required), `offset` (window start, default 0),
/// `dev` (device file path, used instead of an I2C address) and
/// `page_size` for EEPROMs with page-limited writes.
#[derive(Debug, Default)]
pub struct NvramDriver;

impl DeviceDriver for NvramDriver {
    fn name(&self) -> &'static str {
        "nvram"
    }

    fn register(
        &self,
        node: &DeviceConfig,
        bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>> {
        let size = node
            .attr_u32("size")?
            .ok_or_else(|| SdiError::invalid_config("nvram.size", "size is required"))?
            as usize;
        let base = node.attr_u32("offset")?.unwrap_or(0);
        let backend = match node.attr_str("dev") {
            Some(path) => Backend::File(PathBuf::from(path)),
            None => {
                let bus = bus
                    .ok_or_else(|| {
                        SdiError::invalid_config("nvram.bus", "either a bus or a dev path is required")
                    })?
                    .i2c(self.name())?;
                let page_size = match node.attr_u32("page_size")? {
                    Some(0) => {
                        return Err(SdiError::invalid_config("nvram.page_size", "page size must be positive"))
                    }
                    other => other.map(|p| p as usize),
                };
                Backend::I2c {
                    dev: PointerDevice::new(bus, node.required_address()?),
                    page_size,
                }
            }
        };
        let alias = node.alias_or("nvram");
        let nvram = Nvram {
            alias: alias.clone(),
            backend,
            base: u64::from(base),
            size,
        };
        ctx.registry()
            .register(alias.clone(), alias.clone(), ResourceOps::NvRam(Arc::new(nvram)));
        Ok(Box::new(NvramDeviceNode { alias }))
    }
}
