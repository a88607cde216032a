//! CLI entry point for inspecting adapter modules.
//!
//! ```bash
//! daq-adapters --config adapters.toml modules
//! daq-adapters devices demo
//! daq-adapters inspect demo DWheel --label Emission
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daq_adapters::config::AdapterConfig;
use daq_adapters::devices::{Device, TypedDevice};
use daq_adapters::logging::{self, TracingConfig};
use daq_adapters::prelude::*;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "daq-adapters")]
#[command(about = "Inspect device adapter modules and their devices", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Additional module search directory
    #[arg(long = "search-path", global = true)]
    search_paths: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List adapter modules found on the search paths
    Modules,

    /// List the devices a module advertises
    Devices {
        /// Module name (without platform prefix/suffix)
        module: String,
    },

    /// Create a device, initialize it and print its properties
    Inspect {
        /// Module name
        module: String,
        /// Advertised device name
        device: String,
        /// Label to give the device
        #[arg(long)]
        label: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AdapterConfig::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AdapterConfig::load()?,
    };
    config.search_paths.extend(cli.search_paths.iter().cloned());

    let tracing_config = if cli.verbose {
        TracingConfig::new(Level::DEBUG)
    } else {
        TracingConfig::from_config(&config).map_err(anyhow::Error::msg)?
    };
    logging::init(tracing_config).map_err(anyhow::Error::msg)?;

    let registry = ModuleRegistry::from_config(&config);

    match cli.command {
        Commands::Modules => list_modules(&registry),
        Commands::Devices { module } => list_devices(&registry, &module),
        Commands::Inspect {
            module,
            device,
            label,
        } => inspect(&registry, &module, &device, label.as_deref()),
    }
}

fn list_modules(registry: &ModuleRegistry) -> Result<()> {
    let modules = registry.available_modules();
    if modules.is_empty() {
        println!("No adapter modules found");
    }
    for name in modules {
        println!("{}", name);
    }
    Ok(())
}

fn list_devices(registry: &ModuleRegistry, module_name: &str) -> Result<()> {
    let module = registry.get_or_load(module_name)?;
    if let Some(path) = module.path() {
        println!("Module {} ({})", module.name(), path.display());
    }
    for device in module.advertised_devices() {
        println!(
            "  {:<24} {:<16} {}",
            device.name, device.category, device.description
        );
    }
    Ok(())
}

fn inspect(
    registry: &ModuleRegistry,
    module_name: &str,
    device_name: &str,
    label: Option<&str>,
) -> Result<()> {
    let module = registry.get_or_load(module_name)?;
    let label = label.unwrap_or(device_name);
    let device = module
        .create_device(
            ControllerRef::detached(),
            device_name,
            label,
            DeviceLoggers::for_label(label),
        )
        .with_context(|| format!("Failed to create {}:{}", module_name, device_name))?;

    device.initialize()?;
    let report = print_device(&device);
    let shutdown = device.shutdown();
    report?;
    shutdown?;
    Ok(())
}

fn print_device(device: &TypedDevice) -> Result<()> {
    println!("{} [{}]", device.label(), device.category());
    for name in device.property_names()? {
        let value = device.get_property(&name)?;
        let read_only = if device.instance().is_property_read_only(&name)? {
            " (read-only)"
        } else {
            ""
        };
        println!("  {} = {}{}", name, value, read_only);

        let allowed = device.instance().allowed_property_values(&name)?;
        if !allowed.is_empty() {
            println!("    allowed: {}", allowed.join(", "));
        }
    }

    match device {
        TypedDevice::State(wheel) => {
            println!(
                "  position {} of {}",
                wheel.get_position()?,
                wheel.number_of_positions()
            );
        }
        TypedDevice::Shutter(shutter) => println!("  open: {}", shutter.is_open()?),
        TypedDevice::Stage(stage) => println!("  position: {} um", stage.position_um()?),
        TypedDevice::XyStage(stage) => {
            let (x, y) = stage.position_um()?;
            println!("  position: ({}, {}) um", x, y);
        }
        TypedDevice::Camera(camera) => println!(
            "  {}x{} px, {} B/px, exposure {} ms",
            camera.image_width(),
            camera.image_height(),
            camera.bytes_per_pixel(),
            camera.exposure_ms()
        ),
        TypedDevice::Hub(hub) => {
            hub.detect_installed_devices()?;
            println!("  installed: {}", hub.installed_devices()?.join(", "));
        }
        TypedDevice::Magnifier(magnifier) => {
            println!("  magnification: {}x", magnifier.magnification());
        }
        _ => {}
    }
    Ok(())
}
