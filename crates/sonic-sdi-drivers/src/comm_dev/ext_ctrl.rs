//! Ext-ctrl resources living in the comm-dev register space, such as the
//! thermal thresholds the controller reads back from the host. Values are
//! little endian tenths of a degree unless the node says otherwise.

use super::driver::COMM_DEV_RESOURCE_NAME;
use crate::ext_ctrl::{AliasDevice, ByteOrder, ExtCtrlLayout};
use sonic_sdi::{
    BusHandle, CommDevice, Device, DeviceConfig, DeviceDriver, ExtControl, RegisterAccess,
    ResourceOps, SdiContext, SdiError, SdiResult,
};
use std::sync::Arc;
use tracing::error;

pub struct CommDevExtCtrl {
    comm_dev: Arc<dyn CommDevice>,
    layout: ExtCtrlLayout,
    refresh: bool,
}

impl CommDevExtCtrl {
    pub fn new(comm_dev: Arc<dyn CommDevice>, layout: ExtCtrlLayout, refresh: bool) -> Self {
        Self {
            comm_dev,
            layout,
            refresh,
        }
    }

    fn regs(&self) -> SdiResult<&dyn RegisterAccess> {
        self.comm_dev
            .registers()
            .ok_or_else(|| SdiError::unsupported("ext_ctrl_registers"))
    }
}

impl ExtControl for CommDevExtCtrl {
    fn get(&self, count: usize) -> SdiResult<Vec<i32>> {
        self.layout.get(self.regs()?, count)
    }

    /// Refreshes the controller first when configured to, so values are not
    /// written into a mailbox the controller has disabled after a reset.
    fn set(&self, values: &[i32]) -> SdiResult<()> {
        let regs = self.regs()?;
        if self.refresh {
            self.comm_dev.refresh()?;
        }
        self.layout.set(regs, values).inspect_err(|e| {
            error!(offset = self.layout.offset, refresh = self.refresh, error = %e, "ext-ctrl write failed");
        })
    }
}

/// Driver `comm_dev_ext_ctrl`. The `comm_dev` device must be declared
/// earlier in the platform description.
#[derive(Debug, Default)]
pub struct CommDevExtCtrlDriver;

impl DeviceDriver for CommDevExtCtrlDriver {
    fn name(&self) -> &'static str {
        "comm_dev_ext_ctrl"
    }

    fn register(
        &self,
        node: &DeviceConfig,
        _bus: Option<&BusHandle>,
        ctx: &SdiContext,
    ) -> SdiResult<Box<dyn Device>> {
        let handle = ctx
            .registry()
            .find_by_name(COMM_DEV_RESOURCE_NAME)
            .ok_or_else(|| SdiError::not_found(format!("resource {}", COMM_DEV_RESOURCE_NAME)))?;
        let resource = ctx.registry().get(handle)?;
        let comm_dev = resource.ops().as_comm_dev().cloned().ok_or_else(|| {
            SdiError::wrong_type(
                resource.name(),
                sonic_sdi::types::ResourceType::CommDev,
                resource.resource_type(),
            )
        })?;

        let layout = ExtCtrlLayout::from_node(node, ByteOrder::Little)?;
        let refresh = node.attr_bool("refresh")?.unwrap_or(false);
        let alias = node.alias_or("comm_dev_ext_ctrl");
        ctx.registry().register(
            alias.clone(),
            alias.clone(),
            ResourceOps::ExtControl(Arc::new(CommDevExtCtrl::new(comm_dev, layout, refresh))),
        );
        Ok(Box::new(AliasDevice { alias }))
    }
}
