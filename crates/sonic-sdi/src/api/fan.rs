//! Fan API, including RPM/percent conversion.

use super::dispatch;
use crate::context::SdiContext;
use crate::error::{SdiError, SdiResult};
use crate::handle::ResourceHandle;
use crate::ops::{FanController, ResourceOps};
use crate::types::ResourceType;
use std::sync::Arc;
use tracing::debug;

const PERCENT_MAX: u32 = 100;

pub struct FanApi<'a> {
    ctx: &'a SdiContext,
}

impl<'a> FanApi<'a> {
    pub(crate) fn new(ctx: &'a SdiContext) -> Self {
        Self { ctx }
    }

    fn call<R>(
        &self,
        handle: ResourceHandle,
        op: impl FnOnce(&Arc<dyn FanController>) -> SdiResult<R>,
    ) -> SdiResult<R> {
        dispatch(self.ctx, handle, ResourceType::Fan, ResourceOps::as_fan, op)
    }

    /// Current speed in RPM.
    pub fn speed(&self, handle: ResourceHandle) -> SdiResult<u32> {
        self.call(handle, |f| f.speed())
    }

    /// Requests a speed in RPM.
    pub fn set_speed(&self, handle: ResourceHandle, rpm: u32) -> SdiResult<()> {
        self.call(handle, |f| f.set_speed(rpm))
    }

    /// True when the fan is in fault.
    pub fn status(&self, handle: ResourceHandle) -> SdiResult<bool> {
        self.call(handle, |f| f.status())
    }

    /// Maximum speed advertised by the entity owning the fan.
    fn entity_max_speed(&self, handle: ResourceHandle) -> Option<u32> {
        let parent = self.ctx.entities().parent_of(handle)?;
        match self.ctx.entity().info(parent) {
            Ok(info) if info.max_speed > 0 => Some(info.max_speed),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "no entity info for fan speed conversion");
                None
            }
        }
    }

    /// Converts RPM to percent of full speed.
    ///
    /// Uses the driver's curve when it has one, otherwise scales by the
    /// owning entity's maximum speed. Without entity info the fan is
    /// reported at 100%.
    pub fn rpm_to_pct(&self, handle: ResourceHandle, rpm: u32) -> SdiResult<u32> {
        match self.call(handle, |f| f.rpm_to_pct(rpm)) {
            Err(e) if e.is_unsupported() => match self.entity_max_speed(handle) {
                Some(max) => scaled(rpm, PERCENT_MAX, max),
                None => Ok(PERCENT_MAX),
            },
            other => other,
        }
    }

    /// Converts percent of full speed to RPM; 0 without entity info.
    ///
    /// # Errors
    ///
    /// `OutOfRange` when `pct` exceeds 100.
    pub fn pct_to_rpm(&self, handle: ResourceHandle, pct: u32) -> SdiResult<u32> {
        check_pct(pct)?;
        match self.call(handle, |f| f.pct_to_rpm(pct)) {
            Err(e) if e.is_unsupported() => match self.entity_max_speed(handle) {
                Some(max) => scaled(pct, max, PERCENT_MAX),
                None => Ok(0),
            },
            other => other,
        }
    }

    pub fn speed_pct(&self, handle: ResourceHandle) -> SdiResult<u32> {
        let rpm = self.speed(handle)?;
        self.rpm_to_pct(handle, rpm)
    }

    /// Sets the speed as a percentage of full speed.
    ///
    /// # Errors
    ///
    /// `OutOfRange` when `pct` exceeds 100.
    pub fn set_speed_pct(&self, handle: ResourceHandle, pct: u32) -> SdiResult<()> {
        let rpm = self.pct_to_rpm(handle, pct)?;
        self.set_speed(handle, rpm)
    }
}

fn check_pct(pct: u32) -> SdiResult<()> {
    if pct > PERCENT_MAX {
        return Err(SdiError::out_of_range(format!(
            "fan speed {}% exceeds {}%",
            pct, PERCENT_MAX
        )));
    }
    Ok(())
}

/// `value * num / den` without intermediate overflow.
fn scaled(value: u32, num: u32, den: u32) -> SdiResult<u32> {
    let wide = u64::from(value) * u64::from(num) / u64::from(den);
    u32::try_from(wide)
        .map_err(|_| SdiError::out_of_range(format!("{} * {} / {} overflows", value, num, den)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::EntityInfoSource;
    use crate::types::{EntityInfo, EntityType};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Fan {
        rpm: AtomicU32,
    }

    impl FanController for Fan {
        fn speed(&self) -> SdiResult<u32> {
            Ok(self.rpm.load(Ordering::SeqCst))
        }

        fn set_speed(&self, rpm: u32) -> SdiResult<()> {
            self.rpm.store(rpm, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CurveFan;

    impl FanController for CurveFan {
        fn rpm_to_pct(&self, rpm: u32) -> SdiResult<u32> {
            Ok(rpm / 200)
        }
    }

    struct TrayInfo(u32);

    impl EntityInfoSource for TrayInfo {
        fn read(&self) -> SdiResult<EntityInfo> {
            Ok(EntityInfo {
                max_speed: self.0,
                num_fans: 2,
                ..EntityInfo::default()
            })
        }
    }

    fn tray_with_fan(ctx: &SdiContext, max_speed: u32) -> (ResourceHandle, Arc<Fan>) {
        let info = ctx.registry().register(
            "tray1-info",
            "tray1-info",
            ResourceOps::EntityInfo(Arc::new(TrayInfo(max_speed))),
        );
        let tray = ctx
            .entities()
            .create(EntityType::FanTray, 1, "tray1", Some(info))
            .unwrap();
        let fan = Arc::new(Fan::default());
        let h = ctx.registry().register("fan1", "fan1", ResourceOps::Fan(fan.clone()));
        ctx.entities().attach(tray, h).unwrap();
        (h, fan)
    }

    #[test]
    fn test_pct_falls_back_to_entity_max_speed() {
        let ctx = SdiContext::new();
        let (h, _) = tray_with_fan(&ctx, 20000);
        assert_eq!(ctx.fan().rpm_to_pct(h, 10000).unwrap(), 50);
        assert_eq!(ctx.fan().pct_to_rpm(h, 25).unwrap(), 5000);
    }

    #[test]
    fn test_pct_without_entity_info() {
        let ctx = SdiContext::new();
        let h = ctx
            .registry()
            .register("fan9", "fan9", ResourceOps::Fan(Arc::new(Fan::default())));
        assert_eq!(ctx.fan().rpm_to_pct(h, 1234).unwrap(), 100);
        assert_eq!(ctx.fan().pct_to_rpm(h, 50).unwrap(), 0);
    }

    #[test]
    fn test_driver_curve_wins() {
        let ctx = SdiContext::new();
        let h = ctx
            .registry()
            .register("fan2", "fan2", ResourceOps::Fan(Arc::new(CurveFan)));
        assert_eq!(ctx.fan().rpm_to_pct(h, 10000).unwrap(), 50);
    }

    #[test]
    fn test_set_speed_pct() {
        let ctx = SdiContext::new();
        let (h, fan) = tray_with_fan(&ctx, 18000);
        ctx.fan().set_speed_pct(h, 50).unwrap();
        assert_eq!(fan.rpm.load(Ordering::SeqCst), 9000);
        assert_eq!(ctx.fan().speed_pct(h).unwrap(), 50);
        assert!(matches!(
            ctx.fan().set_speed_pct(h, 101),
            Err(SdiError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_pct_conversion_rejects_overflow() {
        let ctx = SdiContext::new();
        let (h, _) = tray_with_fan(&ctx, 18000);
        assert!(matches!(
            ctx.fan().pct_to_rpm(h, u32::MAX / 1000),
            Err(SdiError::OutOfRange { .. })
        ));
        assert_eq!(ctx.fan().pct_to_rpm(h, 100).unwrap(), 18000);

        let ctx = SdiContext::new();
        let (slow, _) = tray_with_fan(&ctx, 1);
        assert!(matches!(
            ctx.fan().rpm_to_pct(slow, u32::MAX),
            Err(SdiError::OutOfRange { .. })
        ));
    }
}
