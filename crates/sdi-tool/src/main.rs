//! sdi-tool: loads a platform description and exercises the SDI API.
//!
//! Buses are simulated, so the tool runs anywhere: the hardware drivers
//! talk to register files and `sim_*` devices keep their state in memory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sonic_sdi::types::ThresholdKind;
use sonic_sdi::{BusKind, Platform, PlatformConfig, ResourceHandle};
use sonic_sdi_drivers::builtin_drivers;
use sonic_sdi_drivers::comm_dev::regs::COMM_DEV_I2C_ADDR;
use sonic_sdi_drivers::comm_dev::COMM_DEV_RESOURCE_NAME;
use sonic_sdi_sim::{sim_drivers, MemoryStore, SimBusFactory};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Drivers whose I2C slaves use a 16-bit register pointer.
const POINTER_DRIVERS: [&str; 3] = ["comm_dev", "nvram", "reg_ext_ctrl"];

/// SONiC platform SDI tool
#[derive(Parser, Debug)]
#[command(name = "sdi-tool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Platform description file
    #[arg(short = 'c', long, default_value = "configs/sim-chassis.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every registered resource
    Dump,
    /// List entities with presence, fault state and resources
    Entities,
    /// Read a temperature sensor
    Temp { alias: String },
    /// Read a fan, optionally setting its speed first
    Fan {
        alias: String,
        /// Target speed in RPM
        #[arg(long)]
        set: Option<u32>,
    },
    /// Send a northbound message to the chassis controller
    MboxWrite { text: String },
    /// Read and acknowledge the southbound message
    MboxRead,
    /// Show the chassis data held by the controller
    PlatformInfo,
    /// Read an external control resource, optionally writing it first
    ExtCtrl {
        alias: String,
        /// Values to write
        #[arg(long, num_args = 1.., allow_negative_numbers = true)]
        set: Option<Vec<i32>>,
        /// Number of values to read
        #[arg(long, default_value = "1")]
        count: usize,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("sdi-tool: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "command failed");
            eprintln!("sdi-tool: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {}", level))?,
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set logger")?;
    Ok(())
}

/// `(bus, address)` of every I2C node served by a pointer-mode slave.
fn pointer_devices(config: &PlatformConfig) -> Result<Vec<(String, u16)>> {
    let mut out = Vec::new();
    for dev in &config.devices {
        if !POINTER_DRIVERS.contains(&dev.driver.as_str()) {
            continue;
        }
        let Some(bus) = dev.bus.as_deref().and_then(|name| config.bus(name)) else {
            continue;
        };
        if bus.kind != BusKind::I2c {
            continue;
        }
        let addr = match dev.address()? {
            Some(addr) => addr,
            None if dev.driver == "comm_dev" => COMM_DEV_I2C_ADDR,
            None => continue,
        };
        out.push((bus.name.clone(), addr));
    }
    Ok(out)
}

fn open_platform(path: &Path) -> Result<Platform> {
    let config = PlatformConfig::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let mut drivers = builtin_drivers();
    drivers.extend(&sim_drivers(Arc::new(MemoryStore::new())));

    let mut factory = SimBusFactory::new();
    for (bus, addr) in pointer_devices(&config)? {
        debug!(bus = %bus, addr, "pointer-mode slave");
        factory = factory.pointer_device(bus, addr);
    }

    let platform =
        Platform::build(&config, &drivers, &factory).context("failed to register platform")?;
    platform.init().context("failed to initialize platform")?;
    info!(path = %path.display(), "platform ready");
    Ok(platform)
}

fn resource(platform: &Platform, alias: &str) -> Result<ResourceHandle> {
    platform
        .ctx()
        .registry()
        .find_by_alias(alias)
        .with_context(|| format!("no resource with alias {}", alias))
}

fn comm_dev(platform: &Platform) -> Result<ResourceHandle> {
    platform
        .ctx()
        .registry()
        .find_by_name(COMM_DEV_RESOURCE_NAME)
        .context("platform has no comm-dev")
}

fn run(args: &Args) -> Result<()> {
    let platform = open_platform(&args.config)?;
    let ctx = platform.ctx();

    match &args.command {
        Command::Dump => print!("{}", ctx.registry().dump()),
        Command::Entities => {
            for (handle, entity) in ctx.entities().iter() {
                let present = ctx.entity().presence(handle)?;
                let fault = ctx.entity().fault_status(handle)?;
                println!(
                    "{} {}-{} present={} fault={}",
                    entity.name(),
                    entity.entity_type().as_str(),
                    entity.instance(),
                    present,
                    fault
                );
                for r in entity.resources() {
                    let res = ctx.registry().get(r)?;
                    println!("  {:<24} {}", res.alias(), res.resource_type());
                }
            }
        }
        Command::Temp { alias } => {
            let h = resource(&platform, alias)?;
            let temp = ctx.temperature();
            println!("temperature: {} C", temp.temperature(h)?);
            for kind in [ThresholdKind::Low, ThresholdKind::High, ThresholdKind::Critical] {
                match temp.threshold(h, kind) {
                    Ok(v) => println!("{} threshold: {} C", kind, v),
                    Err(e) if e.is_unsupported() => {}
                    Err(e) => return Err(e.into()),
                }
            }
            println!("fault: {}", temp.status(h)?);
        }
        Command::Fan { alias, set } => {
            let h = resource(&platform, alias)?;
            let fan = ctx.fan();
            if let Some(rpm) = set {
                fan.set_speed(h, *rpm)
                    .with_context(|| format!("failed to set {} to {} rpm", alias, rpm))?;
            }
            println!("speed: {} rpm ({}%)", fan.speed(h)?, fan.speed_pct(h)?);
            println!("fault: {}", fan.status(h)?);
        }
        Command::MboxWrite { text } => {
            let h = comm_dev(&platform)?;
            ctx.comm_dev()
                .msg_write(h, text.as_bytes())
                .context("northbound write failed")?;
            println!("sent {} bytes", text.len());
        }
        Command::MboxRead => {
            let h = comm_dev(&platform)?;
            let message = ctx.comm_dev().msg_read(h).context("southbound read failed")?;
            println!("{}", String::from_utf8_lossy(&message));
        }
        Command::PlatformInfo => {
            let h = comm_dev(&platform)?;
            let info = ctx.comm_dev().platform_info(h)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            println!("iom firmware: {}", ctx.comm_dev().iom_firmware_revision(h)?);
        }
        Command::ExtCtrl { alias, set, count } => {
            let h = resource(&platform, alias)?;
            if let Some(values) = set {
                ctx.ext_ctrl().set(h, values)?;
            }
            let n = set.as_ref().map_or(*count, |v| v.len());
            println!("{:?}", ctx.ext_ctrl().get(h, n)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
        let args = Args::parse_from(["sdi-tool", "ext-ctrl", "fan-ctrl", "--set", "-5", "10"]);
        match args.command {
            Command::ExtCtrl { set, .. } => assert_eq!(set, Some(vec![-5, 10])),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pointer_devices() {
        let config = PlatformConfig::from_toml_str(
            r#"
[[buses]]
name = "i2c-1"

[[buses]]
name = "lpc"
kind = "io"

[[devices]]
driver = "comm_dev"
bus = "i2c-1"

[[devices]]
driver = "nvram"
bus = "i2c-1"
address = "0x50"
attrs = { size = 64 }

[[devices]]
driver = "reg_ext_ctrl"
bus = "lpc"

[[devices]]
driver = "tmp75"
bus = "i2c-1"
address = "0x48"
"#,
        )
        .unwrap();
        assert_eq!(
            pointer_devices(&config).unwrap(),
            vec![("i2c-1".to_string(), 0x32), ("i2c-1".to_string(), 0x50)]
        );
    }

    #[test]
    fn test_sample_config_opens() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/sim-chassis.toml");
        let platform = open_platform(&path).unwrap();
        assert!(comm_dev(&platform).is_ok());
        assert!(platform.ctx().registry().len() > 5);
    }

    #[test]
    fn test_missing_alias_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[devices]]\ndriver = \"sim_led\"\nalias = \"status\"").unwrap();
        let platform = open_platform(file.path()).unwrap();
        assert!(resource(&platform, "status").is_ok());
        let err = resource(&platform, "missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
