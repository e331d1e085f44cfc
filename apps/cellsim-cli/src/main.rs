mod config;

use anyhow::Context;
use cellsim_kernel::{Simulator, native_physics_provider};
use cellsim_plugin::{PluginContext, PluginRegistry};
use cellsim_tools::WorldInspector;
use clap::{Parser, Subcommand};
use config::{CliConfig, parse_param};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cellsim-cli", about = "Run cell population simulations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Build a world from a scenario file and step it
    Run {
        /// Scenario file (.json, .yaml, .yml, .cells)
        scenario: PathBuf,
        /// Number of steps to run
        #[arg(short, long, default_value = "10")]
        steps: u64,
        /// Seconds per step, overriding the config file
        #[arg(long)]
        dt: Option<f32>,
        /// Step on the simulator's background thread instead of this one
        #[arg(short, long)]
        background: bool,
        /// Extra plugin search directory, searched before configured ones
        #[arg(long = "plugins-dir")]
        plugin_dirs: Vec<PathBuf>,
        /// Scenario parameter substituted for `${name}`
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// YAML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List built-in and discovered plugins
    Plugins {
        #[arg(long = "plugins-dir")]
        plugin_dirs: Vec<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("cellsim-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("physics: {}", cellsim_physics::crate_info());
            println!("kernel: {}", cellsim_kernel::crate_info());
            println!("loader: {}", cellsim_loader::crate_info());
            println!("plugin: {}", cellsim_plugin::crate_info());
            println!("tools: {}", cellsim_tools::crate_info());
        }
        Commands::Run {
            scenario,
            steps,
            dt,
            background,
            plugin_dirs,
            params,
            config,
        } => {
            let mut config = load_config(config.as_deref(), &plugin_dirs, &params)?;
            if let Some(dt) = dt {
                config.simulator.time_step = dt;
            }
            run(&scenario, steps, background, config)?;
        }
        Commands::Plugins { plugin_dirs, config } => {
            let config = load_config(config.as_deref(), &plugin_dirs, &[])?;
            let registry = PluginRegistry::new(config.plugin_dirs);
            println!("Built-in:");
            for name in registry.builtin_names() {
                println!("  {name}");
            }
            match registry.primary_directory() {
                Some(dir) => println!("Discovered (primary directory {}):", dir.display()),
                None => println!("Discovered (no search directories):"),
            }
            for name in registry.names() {
                let location = registry.location(name).map(|p| p.display().to_string()).unwrap_or_default();
                println!("  {name}  {location}");
            }
        }
    }

    Ok(())
}

fn load_config(
    path: Option<&Path>,
    plugin_dirs: &[PathBuf],
    params: &[(String, String)],
) -> anyhow::Result<CliConfig> {
    let mut config = match path {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    config.merge(plugin_dirs, params);
    Ok(config)
}

fn run(scenario: &Path, steps: u64, background: bool, config: CliConfig) -> anyhow::Result<()> {
    let mut plugins = PluginContext::new(PluginRegistry::new(config.plugin_dirs.clone()));
    plugins.import_all().context("importing plugins")?;
    let loader = plugins
        .loader(native_physics_provider(config.physics))
        .with_parameters(config.parameters.clone());
    let (world, recipe) = loader
        .load_file(scenario)
        .with_context(|| format!("building world from {}", scenario.display()))?;

    let mut sim_config = config.simulator.clone();
    if background {
        sim_config.max_steps = Some(steps);
    }
    let mut sim = Simulator::new(sim_config);
    sim.set_world_with_recipe(world, recipe);

    if background {
        sim.start()?;
        while sim.is_running() {
            std::thread::sleep(Duration::from_millis(10));
        }
        sim.stop()?;
        if let Some(err) = sim.last_error() {
            return Err(err).context("simulation halted");
        }
    } else {
        for _ in 0..steps {
            if !sim.step()? {
                break;
            }
        }
    }

    sim.with_world(|world| {
        println!("{}", WorldInspector::summary(world));
        for object in WorldInspector::objects(world) {
            println!("  {object}");
        }
    });
    Ok(())
}
