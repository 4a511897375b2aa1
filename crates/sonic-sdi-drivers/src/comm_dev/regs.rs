//! Comm-dev register map.
//!
//! Offsets are into the controller's 16-bit register space, reached at a
//! fixed I2C slave address. Multi-byte registers are little endian.

/// Slave address of the chassis management controller.
pub const COMM_DEV_I2C_ADDR: u16 = 0x32;

pub const CHASSIS_SERVICE_TAG: u16 = 0x7402;
pub const CHASSIS_SERVICE_TAG_SIZE: usize = 34;

pub const IOM_FW_REV: u16 = 0x7800;
pub const IOM_FW_REV_SIZE: usize = 32;

pub const MAILBOX_ENABLE: u16 = 0x7B7E;
pub const MAILBOX_ENABLE_VALUE: u16 = 0x0003;
pub const MAILBOX_DISABLE_VALUE: u16 = 0x0000;

pub const SENSOR_06_TELEMETRY: u16 = 0x7C7A;
pub const SENSOR_07_TELEMETRY: u16 = 0x7C7C;
pub const TELEMETRY_SIZE: usize = 2;

/// Status/alarm register. Alarm bits are active low.
pub const STATUS: u16 = 0x7C90;
pub const STATUS_BIT_RESET: u16 = 1 << 0;
pub const STATUS_BIT_PORT_NOTIFY: u16 = 1 << 1;
pub const STATUS_BIT_NB_TIMEOUT: u16 = 1 << 2;
pub const STATUS_CLEAR: u16 = 0x0000;

pub const MAILBOX_CONTROL: u16 = 0x7C92;
pub const CONTROL_BIT_NB_FLUSH: u16 = 1 << 0;
pub const CONTROL_BIT_SB_READ_VERIFIED: u16 = 1 << 1;
pub const CONTROL_BIT_NB_DOWNLOAD_COMPLETE: u16 = 1 << 2;

/// Directly follows the control register.
pub const NB_TIME_THRESHOLD: u16 = 0x7C94;
pub const NB_TIME_THRESHOLD_VALUE: u16 = 3;

pub const FW_REVS: u16 = 0x7C96;
pub const FW_REVS_SIZE: usize = 64;

pub const IOM_SLOT_OCCUPATION: u16 = 0x7CD6;
pub const IOM_SLOT_MASK: u8 = 0x2F;

pub const NB_MAILBOX_STATUS: u16 = 0x7CD8;
pub const NB_STATUS_BIT_PACKAGE_IN_MAILBOX: u8 = 1 << 0;

pub const SB_MAILBOX_STATUS: u16 = 0x8405;
pub const SB_STATUS_BIT_PACKAGE_PRESENT: u8 = 1 << 0;

pub const NB_MAILBOX: u16 = 0x8500;
pub const SB_MAILBOX: u16 = 0x9504;
