//! geokg CLI - run a YAML mapping document over a dataset of GeoJSON layers
//!
//! Writes one result file per mapping to the output directory.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use geokg::{
    Engine, EngineConfig, GeoJsonDirSource, JsonDirWriter, NdjsonDirWriter, ResultWriter,
    TransformRegistry,
};

const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Parser)]
#[command(name = "geokg")]
#[command(version, about = "Declarative transformation of geospatial layers into graph entities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every mapping in a configuration file and write the results
    Run {
        /// Path to the YAML mapping document
        #[arg(short, long, default_value = "mapping.yaml")]
        config: PathBuf,

        /// Dataset directory (default: global_config.database_path)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory (default: global_config.output_dir, then ./output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Check a configuration file without reading any data
    Validate {
        /// Path to the YAML mapping document
        #[arg(short, long, default_value = "mapping.yaml")]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One pretty-printed JSON document per mapping
    Json,
    /// One entity per line
    Ndjson,
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            source,
            output,
            format,
        } => run(config, source, output, format),
        Commands::Validate { config } => validate(config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Load the configuration, run all mappings and write the results
fn run(
    config_path: PathBuf,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<(), String> {
    let config = EngineConfig::load_from_file(&config_path).map_err(|e| e.to_string())?;

    let dataset = source
        .or_else(|| config.global.database_path.clone())
        .ok_or_else(|| {
            "No dataset given: pass --source or set global_config.database_path".to_string()
        })?;
    let output_dir = output
        .or_else(|| config.global.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    tracing::info!(
        "Running {} mappings from {} over {}",
        config.mapping_names().len(),
        config_path.display(),
        dataset.display()
    );

    let engine = Engine::new(config);
    let run = engine.run(GeoJsonDirSource::new(&dataset));

    let mut writer: Box<dyn ResultWriter> = match format {
        OutputFormat::Json => Box::new(JsonDirWriter::new(&output_dir)),
        OutputFormat::Ndjson => Box::new(NdjsonDirWriter::new(&output_dir)),
    };
    let written = writer.write(&run.result).map_err(|e| e.to_string())?;

    println!(
        "✓ {} entities in {} files written to {}",
        run.entity_count(),
        written.len(),
        output_dir.display()
    );

    if !run.is_complete() {
        for (name, err) in &run.failures {
            eprintln!("  ✗ {}: {}", name, err);
        }
        return Err(format!("{} mapping(s) failed", run.failures.len()));
    }

    Ok(())
}

/// Report every configuration problem
fn validate(config_path: PathBuf) -> Result<(), String> {
    let config = EngineConfig::load_from_file(&config_path).map_err(|e| e.to_string())?;
    let errors = config.validate(&TransformRegistry::new());

    for name in config.mapping_names() {
        if let Some(mapping) = config.get_mapping(name) {
            println!(
                "  ✓ {} ({} -> {}, {} attributes, {} relationships)",
                name,
                mapping.source_layer,
                mapping.entity_type,
                mapping.attributes.len(),
                mapping.relationships.len()
            );
        }
    }

    if errors.is_empty() {
        println!("✓ {} is valid", config_path.display());
        return Ok(());
    }

    for err in &errors {
        eprintln!("  ✗ {}", err);
    }
    Err(format!("{} configuration problem(s) found", errors.len()))
}
