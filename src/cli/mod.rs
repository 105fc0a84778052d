/*
* Placement CLI
* -------------
*
* cpi-placement
* ├── place --request <file> [--inventory <file>] [--json]
* │     Resolve the cluster and per-disk datastores for one create_vm request
* └── init [--force]
*       Write the default configuration to <config>/default.json
*
* The request file carries the manifest keys (stemcell, agent_id, agent_env,
* networks_spec, vm_type, disk_configurations). Every cluster of the inventory
* snapshot is a global candidate.
*/

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use parking_lot::Mutex;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::cluster::{CachingClusterProvider, StaticInventory};
use crate::config::{generate_default_config, settings::DEFAULT_CONFIG_PATH, Settings};
use crate::core::{ManifestParams, SharedPicker, SharedProvider, VmConfig};
use crate::scheduler::CapacityPicker;

#[derive(Parser)]
#[command(name = "cpi-placement")]
#[command(about = "Cluster and datastore placement for VM creation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration directory (overrides CONFIG_PATH)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the placement of one VM
    Place {
        /// Manifest JSON of the create_vm request
        #[arg(short, long)]
        request: PathBuf,

        /// Inventory snapshot, defaults to inventory.path from the settings
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Print the placement as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate default configuration
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    pub fn load_settings(&self) -> Result<Settings> {
        let settings = match &self.config {
            Some(dir) => Settings::from_path(dir),
            None => Settings::new(),
        };
        settings.context("failed to load settings")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| {
            std::env::var("CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
        })
    }
}

pub fn run(cli: Cli, settings: Settings) -> Result<()> {
    match &cli.command {
        Commands::Place {
            request,
            inventory,
            json,
        } => {
            let inventory_path = inventory
                .as_deref()
                .unwrap_or(settings.inventory.path.as_path());
            place(&settings, request, inventory_path, *json)
        }
        Commands::Init { force } => init(&cli.config_dir(), *force),
    }
}

fn place(settings: &Settings, request: &Path, inventory_path: &Path, as_json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(request)
        .with_context(|| format!("failed to read request {}", request.display()))?;
    let inventory = StaticInventory::load(inventory_path)
        .with_context(|| format!("failed to load inventory {}", inventory_path.display()))?;

    let global_clusters = inventory.clusters().iter().cloned().map(Arc::new).collect();
    let manifest = ManifestParams::from_json(&raw)?.with_global_clusters(global_clusters);

    let picker: SharedPicker = Arc::new(Mutex::new(CapacityPicker::new(
        settings.picker.mem_headroom,
        settings.picker.disk_headroom,
    )));
    let provider: SharedProvider = Arc::new(CachingClusterProvider::new(inventory));
    let vm_config = VmConfig::new(manifest, picker, Some(provider));

    vm_config.validate()?;
    let placement = vm_config.placement()?;
    let drs_rule = vm_config.drs_rule()?;
    let config_spec = vm_config.config_spec_params();

    if as_json {
        let disks: Vec<_> = placement
            .disk_placements()
            .iter()
            .map(|p| {
                json!({
                    "cid": p.disk.cid(),
                    "size": p.disk.size(),
                    "ephemeral": p.disk.is_ephemeral(),
                    "datastore": p.datastore,
                })
            })
            .collect();
        let output = json!({
            "name": vm_config.name(),
            "cluster": placement.cluster().name(),
            "ephemeral_datastore": placement.ephemeral_datastore_name(),
            "disks": disks,
            "drs_rule": drs_rule,
            "config_spec": config_spec,
            "networks": vm_config.vsphere_networks(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} {}", "VM:".bold(), vm_config.name());
    println!("{} {}", "Cluster:".bold(), placement.cluster().name().green());
    if let Some(ds) = placement.ephemeral_datastore_name() {
        println!("{} {}", "Ephemeral datastore:".bold(), ds.green());
    }
    for p in placement.disk_placements() {
        println!(
            "  {} {}MB -> {}",
            p.disk.cid().unwrap_or("ephemeral"),
            p.disk.size(),
            p.datastore.cyan()
        );
    }
    match drs_rule {
        Some(rule) => println!("{} {} ({})", "DRS rule:".bold(), rule.name, rule.rule_type),
        None => println!("{} {}", "DRS rule:".bold(), "none".dimmed()),
    }
    println!("{} {}", "Config spec:".bold(), serde_json::to_string(&config_spec)?);

    Ok(())
}

fn init(config_dir: &Path, force: bool) -> Result<()> {
    let target = config_dir.join("default.json");
    if target.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite",
            target.display()
        );
    }

    std::fs::create_dir_all(config_dir)?;
    let defaults = serde_json::to_string_pretty(&generate_default_config())?;
    std::fs::write(&target, defaults)?;

    info!("Wrote default configuration to {}", target.display());
    println!("{} {}", "Created".green(), target.display());
    Ok(())
}
