//! Event schema generator entry point
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use abi_schema_core::{ContractSource, GeneratorConfig};
use abi_schema_ethereum::codegen::columns::map_column;
use abi_schema_ethereum::codegen::generator::ENTITIES_MOD_FILE;
use abi_schema_ethereum::{classify, SchemaCodegen};
use abi_schema_storage::{MigrationSynthesizer, SchemaTarget, SqliteEngineProvider};

mod output;

use output::OutputWriter;

#[derive(Parser)]
#[command(name = "abi-schema")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate entities, the topic registry and a migration from contract ABIs
    Generate {
        /// Config file path (.toml, .json, .yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Contract ABI as NAME=PATH, may be repeated
        #[arg(long = "abi", value_parser = parse_contract)]
        contracts: Vec<ContractSource>,

        /// Target schema name
        #[arg(long)]
        schema: Option<String>,

        /// Treat the schema name as an environment variable
        #[arg(long)]
        variable_schema: bool,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Migration name
        #[arg(long)]
        migration_name: Option<String>,

        /// Print artifacts instead of writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how a single ABI type is stored
    Classify {
        /// Raw ABI type, e.g. uint256 or tuple[3]
        abi_type: String,
    },
}

fn parse_contract(value: &str) -> std::result::Result<ContractSource, String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{}'", value))?;
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected NAME=PATH, got '{}'", value));
    }
    Ok(ContractSource {
        name: name.to_string(),
        abi_path: PathBuf::from(path),
    })
}

/// Log filter used while the configuration is still being read
const BOOTSTRAP_LOG_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .init();
}

/// Read the file and environment layers of the configuration
///
/// The configured log level is not known yet, so loading logs through a
/// scoped subscriber filtered by `RUST_LOG` alone.
fn load_config(path: Option<&Path>) -> abi_schema_core::Result<GeneratorConfig> {
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter(BOOTSTRAP_LOG_LEVEL))
        .with_target(false)
        .finish();

    tracing::subscriber::with_default(bootstrap, || {
        let mut config = match path {
            Some(path) => GeneratorConfig::load_from_file(path)?,
            None => GeneratorConfig::default(),
        };
        config.apply_environment_overrides()?;
        Ok(config)
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            contracts,
            schema,
            variable_schema,
            output_dir,
            migration_name,
            dry_run,
        } => {
            let mut config = load_config(config.as_deref())?;

            // Command line flags take precedence over file and environment
            config.contracts.extend(contracts);
            if let Some(schema) = schema {
                config.schema_name = schema;
            }
            config.variable_schema |= variable_schema;
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if let Some(migration_name) = migration_name {
                config.migration_name = migration_name;
            }
            config.dry_run |= dry_run;

            init_tracing(&config.log_level);
            debug!("Effective configuration: {:?}", config);
            generate(config).await
        }
        Commands::Classify { abi_type } => {
            init_tracing("warn");
            classify_type(&abi_type)
        }
    }
}

async fn generate(config: GeneratorConfig) -> Result<()> {
    if config.contracts.is_empty() {
        return Err(anyhow!("No contracts given; pass --abi NAME=PATH or list them in the config file"));
    }

    let mut codegen = SchemaCodegen::new(config.clone());
    codegen.initialize()?;
    for contract in &config.contracts {
        codegen.process_file(contract)?;
    }
    let generated = codegen.finish()?;

    let synthesizer = MigrationSynthesizer::new(
        SqliteEngineProvider::new(),
        SchemaTarget::new(&config.schema_name, config.variable_schema),
    )
    .with_name(&config.migration_name);

    let script = tokio::time::timeout(
        Duration::from_secs(config.engine_timeout_secs),
        synthesizer.synthesize(&generated.forest),
    )
    .await
    .map_err(|_| anyhow!("Migration synthesis timed out after {}s", config.engine_timeout_secs))??;

    let writer = OutputWriter::new(&config.output_dir, config.dry_run);
    for entity in &generated.entities {
        writer
            .write(PathBuf::from("entities").join(&entity.file_name), &entity.source)
            .await?;
    }
    writer
        .write(PathBuf::from("entities").join(ENTITIES_MOD_FILE), &generated.entities_index)
        .await?;
    writer.write("topics.json", &generated.topics.to_json()?).await?;
    writer
        .write(PathBuf::from("migrations").join(script.file_name()), &script.render())
        .await?;

    info!(
        "Generated {} tables for {} events from {} contracts",
        generated.forest.len(),
        generated.topics.len(),
        config.contracts.len()
    );
    Ok(())
}

fn classify_type(raw: &str) -> Result<()> {
    let descriptor = classify(raw).with_context(|| format!("Unsupported type '{}'", raw))?;

    let mut report = serde_json::json!({
        "type": descriptor.to_string(),
        "kind": format!("{:?}", descriptor.kind),
        "array": format!("{:?}", descriptor.array),
    });

    match descriptor.relation_cardinality() {
        Some(cardinality) => {
            report["relation"] = serde_json::json!(cardinality.to_string());
        }
        None => {
            let spec = map_column(&descriptor)?;
            report["sql_type"] = serde_json::json!(spec.sql_type());
            report["rust_type"] = serde_json::json!(spec.rust_type());
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
