//! fimo-cli: a thin host program demonstrating module loading from a TOML
//! manifest.
//!
//! ```bash
//! fimo-cli load manifest.toml
//! fimo-cli load manifest.toml --json
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fimo::context::Context;
use fimo::module::{ModuleExport, ModuleExportBuilder};
use fimo::version::Version;
use fimo::ContextOptions;

#[derive(Parser, Debug)]
#[command(name = "fimo-cli", version, about = "Loads a demo module graph from a TOML manifest")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the modules named in `manifest` and print the resulting graph.
    Load(LoadArgs),
    /// List the built-in demo modules this binary knows how to load.
    ListAvailable,
}

#[derive(clap::Args, Debug)]
struct LoadArgs {
    /// Path to a TOML manifest; see [`Manifest`].
    manifest: PathBuf,
}

/// `manifest.toml` shape: `modules = ["greeter", "logger"]`.
#[derive(serde::Deserialize)]
struct Manifest {
    modules: Vec<String>,
}

fn noop_ctor(_ctx: &fimo::module::ConstructionContext) -> Result<fimo::module::ModuleState, String> {
    Ok(Box::new(()))
}
fn noop_dtor(_state: fimo::module::ModuleState) {}

/// The fixed catalog of demo modules this binary can load; a real host
/// would instead assemble this slice from its own compiled-in modules
/// (see [`fimo::module::export`] for why this crate never scans linker
/// sections to discover it automatically).
fn demo_catalog() -> Vec<&'static ModuleExport> {
    vec![
        Box::leak(Box::new(
            ModuleExportBuilder::new("logger")
                .description("writes formatted trace output")
                .version(Version::new(1, 0, 0))
                .constructor(noop_ctor)
                .destructor(noop_dtor)
                .build(),
        )),
        Box::leak(Box::new(
            ModuleExportBuilder::new("greeter")
                .description("depends on logger")
                .version(Version::new(1, 0, 0))
                .constructor(noop_ctor)
                .destructor(noop_dtor)
                .build(),
        )),
    ]
}

fn read_manifest(path: &PathBuf) -> Result<Manifest, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    toml::from_str(&text).map_err(|e| format!("failed to parse {}: {e}", path.display()))
}

fn cmd_list_available(json: bool) -> Result<(), String> {
    let names: Vec<&str> = demo_catalog().iter().map(|e| e.name).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&names).unwrap_or_default());
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

fn cmd_load(args: LoadArgs, json: bool) -> Result<(), String> {
    let manifest = read_manifest(&args.manifest)?;
    let catalog = demo_catalog();

    let ctx = Context::new(ContextOptions::new());
    let set = ctx.new_loading_set();
    set.append_modules(&catalog, |export| manifest.modules.iter().any(|m| m == export.name))
        .map_err(|e| e.to_string())?;
    let loaded = set.finish().map_err(|e| e.to_string())?;

    if json {
        let graph: BTreeMap<&str, &str> = loaded.iter().map(|info| (info.name(), "loaded")).collect();
        println!("{}", serde_json::to_string_pretty(&graph).unwrap_or_default());
    } else {
        for info in &loaded {
            println!("{} {}", info.name(), info.version());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Load(args) => cmd_load(args, cli.json),
        Command::ListAvailable => cmd_list_available(cli.json),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("Error: {msg}");
            ExitCode::FAILURE
        }
    }
}
