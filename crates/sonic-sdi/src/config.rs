//! Platform description file.
//!
//! A TOML document declaring the buses of a platform, the device nodes
//! wired to them and the entities grouping the resulting resources:
//!
//! ```toml
//! [[buses]]
//! name = "i2c-1"
//! block_max = 32
//!
//! [[devices]]
//! driver = "comm_dev"
//! bus = "i2c-1"
//! address = "0x32"
//! alias = "cmc"
//!
//! [[entities]]
//! type = "system_board"
//! instance = 1
//! name = "board"
//! resources = ["cmc"]
//! ```

use crate::error::{SdiError, SdiResult};
use crate::transport::{IndexedPorts, I2C_SMBUS_BLOCK_MAX};
use crate::types::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

/// Kind of physical bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    I2c,
    Io,
}

/// A bus declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    pub name: String,

    #[serde(default)]
    pub kind: BusKind,

    /// Largest SMBus block the adapter accepts
    #[serde(default = "default_block_max")]
    pub block_max: usize,

    /// Address-high port of an indexed I/O window
    #[serde(default = "default_addr_hi_port")]
    pub addr_hi_port: u16,

    /// Address-low port of an indexed I/O window
    #[serde(default = "default_addr_lo_port")]
    pub addr_lo_port: u16,

    /// Data port of an indexed I/O window
    #[serde(default = "default_data_port")]
    pub data_port: u16,
}

impl BusConfig {
    pub fn ports(&self) -> IndexedPorts {
        IndexedPorts {
            addr_hi: self.addr_hi_port,
            addr_lo: self.addr_lo_port,
            data: self.data_port,
        }
    }
}

/// Attribute value of a device node.
///
/// Integers may be written as TOML integers or as `"0x"` prefixed strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Integer(i64),
    Bool(bool),
    Text(String),
}

impl AttrValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(v) => Some(*v),
            AttrValue::Bool(b) => Some(i64::from(*b)),
            AttrValue::Text(s) => parse_int(s),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Integer(v) => Some(*v != 0),
            AttrValue::Text(s) => match s.as_str() {
                "true" | "yes" | "on" => Some(true),
                "false" | "no" | "off" => Some(false),
                other => parse_int(other).map(|v| v != 0),
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// A device node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Driver name, looked up in the driver table
    pub driver: String,

    /// Bus the device sits on; virtual devices have none
    #[serde(default)]
    pub bus: Option<String>,

    #[serde(default = "default_instance")]
    pub instance: u32,

    #[serde(default)]
    pub address: Option<AttrValue>,

    #[serde(default)]
    pub alias: Option<String>,

    /// Driver specific attributes
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl DeviceConfig {
    /// Device address, if declared.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the address is not an integer in 0..=0xffff.
    pub fn address(&self) -> SdiResult<Option<u16>> {
        let Some(raw) = &self.address else {
            return Ok(None);
        };
        raw.as_i64()
            .and_then(|v| u16::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| {
                SdiError::invalid_config(
                    format!("{}.address", self.driver),
                    format!("{:?} is not a valid address", raw),
                )
            })
    }

    /// Address that must be present.
    pub fn required_address(&self) -> SdiResult<u16> {
        self.address()?.ok_or_else(|| {
            SdiError::invalid_config(format!("{}.address", self.driver), "address is required")
        })
    }

    /// Declared alias or `<prefix>-<instance>`.
    pub fn alias_or(&self, prefix: &str) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| format!("{}-{}", prefix, self.instance))
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Integer attribute.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the attribute exists but is not an integer.
    pub fn attr_i64(&self, key: &str) -> SdiResult<Option<i64>> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| {
                SdiError::invalid_config(
                    format!("{}.{}", self.driver, key),
                    format!("{:?} is not an integer", v),
                )
            }),
        }
    }

    pub fn attr_u32(&self, key: &str) -> SdiResult<Option<u32>> {
        match self.attr_i64(key)? {
            None => Ok(None),
            Some(v) => u32::try_from(v).map(Some).map_err(|_| {
                SdiError::invalid_config(
                    format!("{}.{}", self.driver, key),
                    format!("{} does not fit in 32 bits", v),
                )
            }),
        }
    }

    pub fn attr_bool(&self, key: &str) -> SdiResult<Option<bool>> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(v) => v.as_bool().map(Some).ok_or_else(|| {
                SdiError::invalid_config(
                    format!("{}.{}", self.driver, key),
                    format!("{:?} is not a boolean", v),
                )
            }),
        }
    }

    pub fn attr_str(&self, key: &str) -> Option<String> {
        self.attrs.get(key).map(|v| match v {
            AttrValue::Text(s) => s.clone(),
            AttrValue::Integer(i) => i.to_string(),
            AttrValue::Bool(b) => b.to_string(),
        })
    }
}

/// An entity declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    #[serde(default = "default_instance")]
    pub instance: u32,

    pub name: String,

    /// Alias of the entity-info resource
    #[serde(default)]
    pub info: Option<String>,

    /// Aliases of the resources the entity owns
    #[serde(default)]
    pub resources: Vec<String>,
}

/// Complete platform description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub buses: Vec<BusConfig>,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

fn default_block_max() -> usize {
    I2C_SMBUS_BLOCK_MAX
}

fn default_addr_hi_port() -> u16 {
    0x210
}

fn default_addr_lo_port() -> u16 {
    0x211
}

fn default_data_port() -> u16 {
    0x212
}

fn default_instance() -> u32 {
    1
}

impl PlatformConfig {
    /// Parses a TOML platform description.
    pub fn from_toml_str(content: &str) -> SdiResult<Self> {
        toml::from_str(content)
            .map_err(|e| SdiError::invalid_config("platform", format!("parse error: {}", e)))
    }

    /// Loads and validates a platform description file.
    pub fn load(path: impl AsRef<Path>) -> SdiResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        info!(
            path = %path.display(),
            buses = config.buses.len(),
            devices = config.devices.len(),
            entities = config.entities.len(),
            "loaded platform description"
        );
        Ok(config)
    }

    /// Serializes the description back to TOML.
    pub fn to_toml_string(&self) -> SdiResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SdiError::internal(format!("failed to serialize config: {}", e)))
    }

    pub fn bus(&self, name: &str) -> Option<&BusConfig> {
        self.buses.iter().find(|b| b.name == name)
    }

    /// Checks cross references and value domains.
    pub fn validate(&self) -> SdiResult<()> {
        let mut names = HashSet::new();
        for bus in &self.buses {
            if !names.insert(bus.name.as_str()) {
                return Err(SdiError::invalid_config(
                    format!("buses.{}", bus.name),
                    "duplicate bus name",
                ));
            }
            if bus.kind == BusKind::I2c && bus.block_max < 2 {
                return Err(SdiError::invalid_config(
                    format!("buses.{}.block_max", bus.name),
                    "block_max must be at least 2",
                ));
            }
        }

        for dev in &self.devices {
            if let Some(bus_name) = &dev.bus {
                let bus = self.bus(bus_name).ok_or_else(|| {
                    SdiError::invalid_config(
                        format!("{}.bus", dev.driver),
                        format!("unknown bus {}", bus_name),
                    )
                })?;
                if bus.kind == BusKind::I2c {
                    if let Some(addr) = dev.address()? {
                        if addr > 0x7f {
                            return Err(SdiError::invalid_config(
                                format!("{}.address", dev.driver),
                                format!("0x{:x} is not a 7-bit I2C address", addr),
                            ));
                        }
                    }
                }
            }
            if let Some(width) = dev.attr_i64("width")? {
                if width != 1 && width != 2 {
                    return Err(SdiError::invalid_config(
                        format!("{}.width", dev.driver),
                        format!("width must be 1 or 2, got {}", width),
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for ent in &self.entities {
            if ent.instance == 0 {
                return Err(SdiError::invalid_config(
                    format!("entities.{}", ent.name),
                    "instance numbers start at 1",
                ));
            }
            if !seen.insert((ent.entity_type, ent.instance)) {
                return Err(SdiError::invalid_config(
                    format!("entities.{}", ent.name),
                    format!("duplicate {} instance {}", ent.entity_type, ent.instance),
                ));
            }
        }
        Ok(())
    }
}
