//! Symbolic Execution CLI
//!
//! # Usage
//!
//! ```bash
//! # Explore a function (community tier)
//! symex-cli run --ir classify.json --pretty
//!
//! # Tier preset plus YAML overrides, command-line limits win
//! symex-cli run --ir classify.json --config symex.yaml --max-paths 200
//!
//! # Equivalence against a second function
//! symex-cli run --ir f.json --compare g.json --tier pro
//!
//! # Print the tier presets
//! symex-cli tiers
//! ```
//!
//! Exit code is 0 when the result reports `success`, 1 otherwise.

use clap::{Parser, Subcommand};
use codegraph_symex::config::{SymbolicConfig, Tier, Validatable};
use codegraph_symex::{
    FunctionIr, SymbolicExecutionResult, SymbolicExecutionUseCase, SymbolicExecutionUseCaseImpl,
    SymexRequest,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "symex-cli")]
#[command(about = "Symbolic execution over front-end function IR", long_about = None)]
struct Cli {
    /// Log verbosity (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore every path of a function and print the result JSON
    Run {
        /// Function IR (JSON)
        #[arg(long)]
        ir: PathBuf,

        /// YAML configuration (v1 schema)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tier preset (ignored when --config names a tier)
        #[arg(short, long)]
        tier: Option<String>,

        /// Path budget
        #[arg(long)]
        max_paths: Option<usize>,

        /// Loop unroll bound
        #[arg(long)]
        max_depth: Option<usize>,

        /// Second function IR to prove equivalent
        #[arg(long)]
        compare: Option<PathBuf>,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Print the tier presets as YAML
    Tiers,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            ir,
            config,
            tier,
            max_paths,
            max_depth,
            compare,
            pretty,
        } => {
            let started = Instant::now();
            let result = match build_request(ir, config, tier, max_paths, max_depth, compare) {
                Ok(request) => SymbolicExecutionUseCaseImpl::new().execute(&request),
                Err(e) => SymbolicExecutionResult::failure(e, started.elapsed().as_millis() as u64),
            };
            match result.to_json(pretty) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("failed to serialize result: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Tiers => match print_tiers() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn build_request(
    ir: PathBuf,
    config_path: Option<PathBuf>,
    tier: Option<String>,
    max_paths: Option<usize>,
    max_depth: Option<usize>,
    compare: Option<PathBuf>,
) -> Result<SymexRequest, String> {
    let function = load_ir(&ir)?;

    let mut config = match (config_path, tier) {
        (Some(path), _) => SymbolicConfig::from_yaml_file(&path)
            .map_err(|e| format!("{}: {}", path.display(), e))?,
        (None, Some(name)) => SymbolicConfig::from_tier(Tier::parse(&name).map_err(|e| e.to_string())?),
        (None, None) => SymbolicConfig::default(),
    };
    if let Some(n) = max_paths {
        config = config.max_paths(n);
    }
    if let Some(n) = max_depth {
        config = config.max_depth(Some(n));
    }
    config.validate().map_err(|e| e.to_string())?;

    let mut request = SymexRequest::new(function, config);
    if let Some(path) = compare {
        request = request.prove_equivalence(load_ir(&path)?);
    }
    Ok(request)
}

fn load_ir(path: &PathBuf) -> Result<FunctionIr, String> {
    let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    FunctionIr::from_json(&json).map_err(|e| format!("{}: {}", path.display(), e))
}

fn print_tiers() -> Result<(), String> {
    let presets: BTreeMap<String, SymbolicConfig> = [Tier::Community, Tier::Pro, Tier::Enterprise]
        .into_iter()
        .map(|tier| (tier.to_string(), SymbolicConfig::from_tier(tier)))
        .collect();
    let yaml = serde_yaml::to_string(&presets).map_err(|e| e.to_string())?;
    print!("{}", yaml);
    Ok(())
}
