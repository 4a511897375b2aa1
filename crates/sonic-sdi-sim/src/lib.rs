//! Simulation backend for the SONiC platform SDI.
//!
//! Two levels of simulation are provided:
//!
//! - [`SimI2cBus`] and [`SimIo`] emulate buses at the transaction level,
//!   so the real drivers run unchanged against register files;
//! - [`sim_drivers`] register resources whose state lives in a
//!   [`KvStore`], for exercising upper layers without any register map.
//!
//! [`SimBusFactory`] plugs the simulated buses into
//! [`sonic_sdi::Platform::build`].

pub mod bus;
pub mod drivers;
pub mod factory;
pub mod resources;
pub mod store;

pub use bus::{BusOp, SimI2cBus, SimIo};
pub use drivers::{sim_drivers, SimDriver};
pub use factory::{SimBusFactory, SimPresence};
pub use resources::SimState;
pub use store::{KvStore, MemoryStore, StoreExt};
