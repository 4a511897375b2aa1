//! Chassis management controller ("comm-dev").
//!
//! The controller exchanges framed messages with the host through two
//! mailboxes in its register space: northbound (host to controller) and
//! southbound (controller to host). Alongside the mailboxes it exposes a
//! handful of fixed-offset fields: service tag, firmware revisions, slot
//! occupation and temperature telemetry.

mod driver;
pub mod ext_ctrl;
pub mod framing;
pub mod mailbox;
pub mod regs;

pub use driver::{CommDevDriver, CommDevResource, COMM_DEV_RESOURCE_NAME};
pub use ext_ctrl::{CommDevExtCtrl, CommDevExtCtrlDriver};
pub use mailbox::{CommDevLink, StatusAlarms};
