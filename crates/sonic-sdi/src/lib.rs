//! SONiC platform system device interface (SDI).
//!
//! A hardware abstraction layer for network appliance chassis. Upper layers
//! enumerate entities (system board, fan trays, PSUs, I/O modules) and
//! operate on their resources (sensors, fans, NVRAM, LEDs, the chassis
//! management comm-dev) without knowing which chip sits behind them.
//!
//! # Architecture
//!
//! - [`transport`]: lock-protected I2C and indexed I/O buses
//! - [`registry`]: append-only resource registry with typed handles
//! - [`ops`]: capability traits drivers implement, and the tagged dispatch table
//! - [`entity`]: entities grouping resources, presence and info caching
//! - [`api`]: type-checked per-family operation wrappers
//! - [`driver`], [`config`], [`platform`]: platform assembly from a TOML description
//!
//! # Example
//!
//! ```ignore
//! use sonic_sdi::{SdiContext, ResourceType, SdiResult};
//!
//! fn report_temperatures(ctx: &SdiContext) -> SdiResult<()> {
//!     let mut next = ctx.registry().first_of_type(ResourceType::Temperature);
//!     while let Some(h) = next {
//!         println!("{}", ctx.temperature().temperature(h)?);
//!         next = ctx.registry().next_of_type(h, ResourceType::Temperature);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod driver;
pub mod entity;
pub mod error;
pub mod handle;
pub mod ops;
pub mod platform;
pub mod registry;
pub mod transport;
pub mod types;

pub use config::{AttrValue, BusConfig, BusKind, DeviceConfig, EntityConfig, PlatformConfig};
pub use context::SdiContext;
pub use driver::{BusHandle, Device, DeviceDriver, DriverTable};
pub use entity::{Entity, EntityTable, PresenceProbe};
pub use error::{SdiError, SdiResult};
pub use handle::{EntityHandle, Handle, HandleKind, ResourceHandle};
pub use ops::{
    CommDevice, DigitalDisplay, EntityInfoSource, ExtControl, FanController, HostSystem,
    LedController, MediaDevice, NvramDevice, PowerMonitor, ResourceOps, TemperatureSensor,
};
pub use platform::{BusFactory, Platform};
pub use registry::{Resource, ResourceRegistry};
pub use transport::{
    I2cBus, I2cTransport, IndexedIoBus, IndexedPorts, IoTransport, RegisterAccess,
    I2C_SMBUS_BLOCK_MAX,
};
pub use types::{
    AirFlow, EntityInfo, EntityType, InitArgs, PlatformInfo, PowerType, ResourceType,
    TelemetrySensor, ThresholdKind,
};
