//! Device drivers for the SONiC platform SDI.
//!
//! [`builtin_drivers`] returns the driver table a platform description is
//! assembled with. The comm-dev driver and its mailbox protocol live in
//! [`comm_dev`]; the rest are small chip drivers.

pub mod comm_dev;
pub mod emc2305;
pub mod entity_info;
pub mod ext_ctrl;
pub mod nvram;
pub mod pointer;
pub mod tmp75;

use sonic_sdi::DriverTable;
use std::sync::Arc;

pub use comm_dev::{CommDevDriver, CommDevExtCtrlDriver, CommDevLink, CommDevResource};
pub use emc2305::Emc2305Driver;
pub use entity_info::EntityInfoDriver;
pub use ext_ctrl::{ByteOrder, ExtCtrlLayout, RegExtCtrlDriver};
pub use nvram::NvramDriver;
pub use pointer::PointerDevice;
pub use tmp75::Tmp75Driver;

/// Every hardware driver in this crate.
pub fn builtin_drivers() -> DriverTable {
    let mut table = DriverTable::new();
    table
        .add(Arc::new(CommDevDriver))
        .add(Arc::new(CommDevExtCtrlDriver))
        .add(Arc::new(RegExtCtrlDriver))
        .add(Arc::new(Tmp75Driver))
        .add(Arc::new(Emc2305Driver))
        .add(Arc::new(NvramDriver))
        .add(Arc::new(EntityInfoDriver));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_driver_names() {
        let table = builtin_drivers();
        for name in [
            "comm_dev",
            "comm_dev_ext_ctrl",
            "reg_ext_ctrl",
            "tmp75",
            "emc2305",
            "nvram",
            "entity_info",
        ] {
            assert!(table.find(name).is_ok(), "{} missing", name);
        }
    }
}
