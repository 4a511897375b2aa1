//! Platform assembly with the hardware drivers on simulated buses, mixed
//! with store-backed simulated resources.

use pretty_assertions::assert_eq;
use sonic_sdi::types::{AirFlow, EntityType, ResourceType, TelemetrySensor, ThresholdKind};
use sonic_sdi::{DriverTable, EntityTable, Platform, PlatformConfig, SdiError};
use sonic_sdi_drivers::builtin_drivers;
use sonic_sdi_drivers::comm_dev::regs::*;
use sonic_sdi_sim::{
    sim_drivers, BusOp, KvStore, MemoryStore, SimBusFactory, SimI2cBus, SimPresence, StoreExt,
};
use std::sync::Arc;

const CHASSIS: &str = r#"
[[buses]]
name = "i2c-1"
kind = "i2c"

[[buses]]
name = "lpc"
kind = "io"

[[devices]]
driver = "comm_dev"
bus = "i2c-1"
address = "0x32"

[[devices]]
driver = "comm_dev_ext_ctrl"
alias = "thermal-thresholds"
attrs = { offset = "0x7c7c", width = 2, count = 1, refresh = true }

[[devices]]
driver = "comm_dev_ext_ctrl"
alias = "host-thermal"
attrs = { offset = "0x7c7a", width = 2 }

[[devices]]
driver = "reg_ext_ctrl"
bus = "lpc"
alias = "cpld-fan-ctrl"
attrs = { offset = "0x40", count = 2, scale = 1 }

[[devices]]
driver = "tmp75"
bus = "i2c-1"
address = "0x48"
alias = "inlet"
attrs = { low_threshold = 10, high_threshold = 60 }

[[devices]]
driver = "nvram"
bus = "i2c-1"
address = "0x50"
alias = "board-eeprom"
attrs = { size = 256, page_size = 16 }

[[devices]]
driver = "entity_info"
alias = "fan-tray-1-info"
attrs = { prod_name = "FT-1", num_fans = 2, max_speed = 18000, air_flow = "reverse" }

[[devices]]
driver = "sim_fan"
instance = 1
alias = "fan-tray-1-fan-1"

[[devices]]
driver = "sim_fan"
instance = 2
alias = "fan-tray-1-fan-2"

[[entities]]
type = "system_board"
name = "board"
resources = ["comm_dev-1", "inlet", "board-eeprom", "thermal-thresholds"]

[[entities]]
type = "fan_tray"
name = "fan-tray-1"
info = "fan-tray-1-info"
resources = ["fan-tray-1-fan-1", "fan-tray-1-fan-2"]
"#;

fn drivers(store: Arc<dyn KvStore>) -> DriverTable {
    let mut table = builtin_drivers();
    table.extend(&sim_drivers(store));
    table
}

/// Offsets of the block writes the controller received, in order.
fn controller_writes(i2c: &SimI2cBus) -> Vec<u16> {
    i2c.log()
        .into_iter()
        .filter_map(|op| match op {
            BusOp::WriteBlock { addr, offset, .. } if addr == COMM_DEV_I2C_ADDR => Some(offset),
            _ => None,
        })
        .collect()
}

fn chassis() -> (Platform, SimBusFactory, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let factory = SimBusFactory::new()
        .pointer_device("i2c-1", COMM_DEV_I2C_ADDR)
        .pointer_device("i2c-1", 0x50);
    let config = PlatformConfig::from_toml_str(CHASSIS).unwrap();
    let platform = Platform::build(&config, &drivers(store.clone()), &factory).unwrap();
    (platform, factory, store)
}

#[test]
fn test_chassis_registers_every_device() {
    let (platform, _, _) = chassis();
    let registry = platform.ctx().registry();

    assert_eq!(registry.count_of_type(ResourceType::CommDev), 1);
    assert_eq!(registry.count_of_type(ResourceType::ExtControl), 3);
    assert_eq!(registry.count_of_type(ResourceType::Fan), 2);
    assert!(registry.find_by_alias("inlet").is_some());
    assert!(registry.find_by_name("comm_dev").is_some());

    let entities = platform.ctx().entity();
    assert_eq!(entities.count(EntityType::FanTray), 1);
    let tray = entities.lookup(EntityType::FanTray, 1).unwrap();
    assert_eq!(entities.resource_count(tray).unwrap(), 2);
}

#[test]
fn test_init_programs_hardware_and_fans() {
    let (platform, factory, _) = chassis();
    platform.init().unwrap();

    let i2c = factory.i2c("i2c-1").unwrap();
    // tmp75 THIGH register
    assert_eq!(i2c.regs(0x48, 3, 1), vec![60]);

    let ctx = platform.ctx();
    let tray = ctx.entity().lookup(EntityType::FanTray, 1).unwrap();
    let info = ctx.entity().info(tray).unwrap();
    assert_eq!(info.air_flow, AirFlow::Reverse);
    let fan = ctx.registry().find_by_alias("fan-tray-1-fan-1").unwrap();
    ctx.fan().set_speed_pct(fan, 50).unwrap();
    assert_eq!(ctx.fan().speed(fan).unwrap(), 9000);
}

#[test]
fn test_comm_dev_through_the_api() {
    let (platform, factory, _) = chassis();
    let i2c = factory.i2c("i2c-1").unwrap();
    i2c.set_regs(COMM_DEV_I2C_ADDR, STATUS, &0x0007u16.to_le_bytes());
    i2c.set_regs(COMM_DEV_I2C_ADDR, CHASSIS_SERVICE_TAG, b"ABC1234\0");
    i2c.set_regs(COMM_DEV_I2C_ADDR, IOM_SLOT_OCCUPATION, &[0xff]);

    let ctx = platform.ctx();
    let comm_dev = ctx.registry().find_by_name("comm_dev").unwrap();
    ctx.comm_dev().msg_write(comm_dev, b"HELLO").unwrap();
    assert_eq!(
        i2c.regs(COMM_DEV_I2C_ADDR, NB_MAILBOX, 4),
        vec![0x86, 0xfe, 0x06, 0x00]
    );

    let info = ctx.comm_dev().platform_info(comm_dev).unwrap();
    assert_eq!(info.service_tag, "ABC1234");
    assert_eq!(info.slot_occupation, 0x2f);

    ctx.comm_dev().ambient_temperature_set(comm_dev, 41).unwrap();
    assert_eq!(ctx.comm_dev().telemetry(comm_dev, TelemetrySensor::Ambient).unwrap(), 41);
}

#[test]
fn test_ext_ctrl_resources() {
    let (platform, factory, _) = chassis();
    let ctx = platform.ctx();

    let thresholds = ctx.registry().find_by_alias("thermal-thresholds").unwrap();
    ctx.ext_ctrl().set(thresholds, &[35]).unwrap();
    let i2c = factory.i2c("i2c-1").unwrap();
    assert_eq!(
        i2c.regs(COMM_DEV_I2C_ADDR, SENSOR_07_TELEMETRY, 2),
        350i16.to_le_bytes().to_vec()
    );
    assert_eq!(ctx.ext_ctrl().get(thresholds, 1).unwrap(), vec![35]);
    assert!(matches!(
        ctx.ext_ctrl().set(thresholds, &[1, 2]),
        Err(SdiError::OutOfRange { .. })
    ));

    let cpld = ctx.registry().find_by_alias("cpld-fan-ctrl").unwrap();
    ctx.ext_ctrl().set(cpld, &[7, -1]).unwrap();
    assert_eq!(factory.io("lpc").unwrap().mem(0x40, 2), vec![7, 0xff]);
}

/// Controller that reset and disabled its mailbox.
fn reset_controller(i2c: &SimI2cBus) {
    i2c.set_regs(COMM_DEV_I2C_ADDR, STATUS, &0x0006u16.to_le_bytes());
    i2c.set_regs(COMM_DEV_I2C_ADDR, MAILBOX_ENABLE, &[0, 0]);
    i2c.clear_log();
}

#[test]
fn test_refreshing_ext_ctrl_recovers_before_write() {
    let (platform, factory, _) = chassis();
    let i2c = factory.i2c("i2c-1").unwrap();
    reset_controller(&i2c);

    let ctx = platform.ctx();
    let thresholds = ctx.registry().find_by_alias("thermal-thresholds").unwrap();
    ctx.ext_ctrl().set(thresholds, &[35]).unwrap();

    // Re-enable, clear status, then the value. No flush.
    assert_eq!(
        controller_writes(&i2c),
        vec![MAILBOX_ENABLE, STATUS, SENSOR_07_TELEMETRY]
    );
    assert_eq!(
        i2c.regs(COMM_DEV_I2C_ADDR, MAILBOX_ENABLE, 2),
        MAILBOX_ENABLE_VALUE.to_le_bytes().to_vec()
    );
    assert_eq!(i2c.regs(COMM_DEV_I2C_ADDR, STATUS, 2), vec![0, 0]);
}

#[test]
fn test_plain_ext_ctrl_writes_only_the_value() {
    let (platform, factory, _) = chassis();
    let i2c = factory.i2c("i2c-1").unwrap();
    reset_controller(&i2c);

    let ctx = platform.ctx();
    let host = ctx.registry().find_by_alias("host-thermal").unwrap();
    ctx.ext_ctrl().set(host, &[40]).unwrap();

    assert_eq!(controller_writes(&i2c), vec![SENSOR_06_TELEMETRY]);
    assert_eq!(
        i2c.regs(COMM_DEV_I2C_ADDR, SENSOR_06_TELEMETRY, 2),
        400i16.to_le_bytes().to_vec()
    );
    assert_eq!(i2c.regs(COMM_DEV_I2C_ADDR, MAILBOX_ENABLE, 2), vec![0, 0]);
    assert_eq!(
        i2c.regs(COMM_DEV_I2C_ADDR, STATUS, 2),
        0x0006u16.to_le_bytes().to_vec()
    );
}

#[test]
fn test_nvram_on_pointer_eeprom() {
    let (platform, factory, _) = chassis();
    let ctx = platform.ctx();
    let eeprom = ctx.registry().find_by_alias("board-eeprom").unwrap();

    assert_eq!(ctx.nvram().size(eeprom).unwrap(), 256);
    ctx.nvram().write(eeprom, 10, b"chassis-mac").unwrap();
    assert_eq!(ctx.nvram().read(eeprom, 10, 11).unwrap(), b"chassis-mac".to_vec());
    assert_eq!(factory.i2c("i2c-1").unwrap().regs(0x50, 10, 3), b"cha".to_vec());
    assert!(ctx.nvram().read(eeprom, 250, 10).is_err());
}

#[test]
fn test_wrong_family_is_rejected_without_io() {
    let (platform, factory, _) = chassis();
    let i2c = factory.i2c("i2c-1").unwrap();
    i2c.clear_log();

    let ctx = platform.ctx();
    let inlet = ctx.registry().find_by_alias("inlet").unwrap();
    let err = ctx.fan().speed(inlet).unwrap_err();
    assert!(matches!(
        err,
        SdiError::WrongResourceType {
            expected: ResourceType::Fan,
            actual: ResourceType::Temperature,
            ..
        }
    ));
    assert!(ctx.comm_dev().msg_write(inlet, b"x").is_err());
    assert!(i2c.log().is_empty());
}

#[test]
fn test_temperature_thresholds() {
    let (platform, factory, _) = chassis();
    platform.init().unwrap();
    let ctx = platform.ctx();
    let inlet = ctx.registry().find_by_alias("inlet").unwrap();

    factory.i2c("i2c-1").unwrap().set_regs(0x48, 0, &[75]);
    assert_eq!(ctx.temperature().temperature(inlet).unwrap(), 75);
    assert!(ctx.temperature().status(inlet).unwrap());
    assert!(ctx.temperature().threshold(inlet, ThresholdKind::Critical).is_err());
}

#[test]
fn test_duplicate_names_resolve_to_latest() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let config = PlatformConfig::from_toml_str(
        r#"
[[devices]]
driver = "sim_fan"
alias = "fan1"

[[devices]]
driver = "sim_temperature"
alias = "fan1"
"#,
    )
    .unwrap();
    let platform = Platform::build(&config, &drivers(store), &SimBusFactory::new()).unwrap();
    let registry = platform.ctx().registry();

    let handle = registry.find_by_name("fan1").unwrap();
    assert_eq!(
        registry.get(handle).unwrap().resource_type(),
        ResourceType::Temperature
    );
}

#[test]
fn test_presence_refreshes_entity_info() {
    let (platform, _, store) = chassis();
    let ctx = platform.ctx();
    let entities: &EntityTable = ctx.entities();
    let tray = ctx.entity().lookup(EntityType::FanTray, 1).unwrap();
    entities
        .set_presence_probe(tray, Arc::new(SimPresence::new(store.clone(), "fan-tray-1")))
        .unwrap();

    store.set_value("fan-tray-1.present", false);
    assert!(!ctx.entity().presence(tray).unwrap());

    store.set_value("fan-tray-1.present", true);
    assert!(ctx.entity().presence(tray).unwrap());
    assert_eq!(ctx.entity().info(tray).unwrap().prod_name, "FT-1");
}
