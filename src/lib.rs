//! hepref: HEPData references, resolved locally.
//!
//! hepref turns compact references such as `hepdata:12345/Table1:xsec` into
//! files in a versioned local record cache, downloading and extracting
//! records from the archive on first use, and builds a typed model of the
//! measurement tables they contain.
//!
//! # Modules
//!
//! - [`reference`]: Reference grammar and components
//! - [`cache`]: On-disk layout of the record cache
//! - [`fetch`]: Cache resolution and record download
//! - [`model`]: Typed measurement model and its builder
//! - [`config`]: Resolver configuration
//! - [`error`]: Error types for hepref operations

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod reference;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{expand_home, ArchiveEndpoints, ResolverConfig, DEFAULT_ARCHIVE_URL};
use fetch::{ResolvedResource, ResourceFetcher};
use model::qualifiers::VARIABLE_TYPE;
use model::raw::{read_table, RawDependentVariable, RawTable};
use model::{QualifierMap, RecordModelBuilder, VariableType};
use reference::{parse_reference, PartialReference, HEPDATA};

pub use error::HepRefError;
pub use fetch::Transport;
pub use model::MeasurementRecord;
pub use reference::ReferenceComponents;

/// The hepref CLI application.
#[derive(Parser)]
#[command(name = "hepref")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Root directory of the local record database.
    #[arg(long, env = "NUISANCEDB", global = true)]
    nuisancedb: Option<PathBuf>,

    /// Base URL of the HEPData archive.
    #[arg(long, env = "HEPREF_ARCHIVE_URL", default_value = DEFAULT_ARCHIVE_URL, global = true)]
    archive_url: String,

    /// Log every resolution step to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print one component of a parsed reference.
    GetRefComponent {
        reference: String,
        /// One of type, id, version, resource, qualifier.
        component: String,
    },

    /// Resolve a reference and print the local path of the resource.
    GetLocalPath { reference: String },

    /// Print the names of the measurement tables of a record.
    GetCrossSectionMeasurements { reference: String },

    /// Print the independent variable names of the referenced table.
    GetIndependentVars { reference: String },

    /// Print the dependent variable names of the referenced table.
    GetDependentVars { reference: String },

    /// Print the qualifiers of the referenced dependent variable.
    GetQualifiers {
        reference: String,
        /// Print only the value of this qualifier.
        key: Option<String>,
    },

    /// Resolve the references held in a qualifier and print their local paths.
    DereferenceToLocalPath { reference: String, key: String },

    /// Print the auxiliary resources of a record that exist locally.
    GetLocalAdditionalResources { reference: String },

    /// Build the record model and print it.
    Show(ShowArgs),
}

/// Arguments for the show subcommand.
#[derive(clap::Args)]
struct ShowArgs {
    reference: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Run the hepref CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), HepRefError> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let Some(command) = cli.command else {
        println!("hepref {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Resolve HEPData references to a local record cache.");
        println!();
        println!("Run 'hepref --help' for usage information.");
        return Ok(());
    };

    let context = PartialReference::with_reftype(HEPDATA);
    let nuisancedb = cli.nuisancedb;
    let archive_url = cli.archive_url;
    let open_fetcher = || load_config(nuisancedb.clone(), &archive_url).map(ResourceFetcher::new);

    match command {
        Commands::GetRefComponent {
            reference,
            component,
        } => {
            let components = parse_reference(&reference, &context)?;
            println!("{}", components.component(&component)?);
            Ok(())
        }
        Commands::GetLocalPath { reference } => {
            let fetcher = open_fetcher()?;
            let resolved = fetcher.resolve_reference(&reference, &context)?;
            println!("{}", resolved.resource_path.display());
            Ok(())
        }
        Commands::GetCrossSectionMeasurements { reference } => {
            let fetcher = open_fetcher()?;
            let record = RecordModelBuilder::new(&fetcher).build_reference(&reference, &context)?;
            for name in record.table_names() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::GetIndependentVars { reference } => {
            let fetcher = open_fetcher()?;
            let (_, table) = resolve_table(&fetcher, &reference, &context)?;
            for variable in &table.independent_variables {
                println!("{}", variable.header.name);
            }
            Ok(())
        }
        Commands::GetDependentVars { reference } => {
            let fetcher = open_fetcher()?;
            let (_, table) = resolve_table(&fetcher, &reference, &context)?;
            for variable in &table.dependent_variables {
                println!("{}", variable.header.name);
            }
            Ok(())
        }
        Commands::GetQualifiers { reference, key } => {
            let fetcher = open_fetcher()?;
            let (resolved, table) = resolve_table(&fetcher, &reference, &context)?;
            let qualifiers = selected_qualifiers(&resolved, &table)?;
            match key {
                Some(key) => println!("{}", qualifier_value(&resolved, &qualifiers, &key)?),
                None => {
                    for (key, value) in qualifiers.iter() {
                        println!("{key}: {value}");
                    }
                }
            }
            Ok(())
        }
        Commands::DereferenceToLocalPath { reference, key } => {
            let fetcher = open_fetcher()?;
            let (resolved, table) = resolve_table(&fetcher, &reference, &context)?;
            let qualifiers = selected_qualifiers(&resolved, &table)?;
            let value = qualifier_value(&resolved, &qualifiers, &key)?;
            let nested = resolved.components.record_context();
            for target in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let target = fetcher.resolve_reference(target, &nested)?;
                println!("{}", target.resource_path.display());
            }
            Ok(())
        }
        Commands::GetLocalAdditionalResources { reference } => {
            let fetcher = open_fetcher()?;
            let record = RecordModelBuilder::new(&fetcher).build_reference(&reference, &context)?;
            for path in record.existing_additional_resources() {
                if let Some(name) = path.file_name() {
                    println!("{}", name.to_string_lossy());
                }
            }
            Ok(())
        }
        Commands::Show(args) => {
            let fetcher = open_fetcher()?;
            let record =
                RecordModelBuilder::new(&fetcher).build_reference(&args.reference, &context)?;
            match args.output {
                OutputFormat::Text => print!("{record}"),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&record).map_err(HepRefError::JsonWrite)?
                ),
            }
            Ok(())
        }
    }
}

/// Install a stderr subscriber; `RUST_LOG` applies unless `--debug` is given.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("hepref=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when running under a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(
    nuisancedb: Option<PathBuf>,
    archive_url: &str,
) -> Result<ResolverConfig, HepRefError> {
    let cache_root = nuisancedb.ok_or(HepRefError::CacheRootUnset)?;
    let config = ResolverConfig::new(expand_home(&cache_root))
        .with_endpoints(ArchiveEndpoints::new(archive_url)?);
    config.validate()?;
    debug!(cache_root = %config.cache_root().display(), archive = %config.endpoints.base(), "configured");
    Ok(config)
}

/// Resolve a reference to a data file and parse its table.
fn resolve_table(
    fetcher: &ResourceFetcher,
    reference: &str,
    context: &PartialReference,
) -> Result<(ResolvedResource, RawTable), HepRefError> {
    let resolved = fetcher.resolve_reference(reference, context)?;
    let table = read_table(&resolved.resource_path)?;
    Ok((resolved, table))
}

/// Qualifiers of the dependent variable a reference selects: the one named
/// by its qualifier, else the first measurement, else the first variable.
fn selected_qualifiers(
    resolved: &ResolvedResource,
    table: &RawTable,
) -> Result<QualifierMap, HepRefError> {
    let variables = &table.dependent_variables;
    let variable: Option<&RawDependentVariable> = match resolved.components.qualifier.as_deref() {
        Some(name) => variables.iter().find(|v| v.header.name == name),
        None => variables
            .iter()
            .find(|v| {
                v.qualifier(VARIABLE_TYPE)
                    .and_then(|name| VariableType::from_name(&name))
                    .is_some_and(VariableType::is_measurement)
            })
            .or_else(|| variables.first()),
    };
    variable
        .map(|v| QualifierMap::from_raw(&v.qualifiers))
        .ok_or_else(|| HepRefError::MalformedTable {
            source_path: resolved.resource_path.clone(),
            message: match resolved.components.qualifier.as_deref() {
                Some(name) => format!("no dependent variable named '{name}'"),
                None => "table has no dependent variables".to_string(),
            },
        })
}

fn qualifier_value(
    resolved: &ResolvedResource,
    qualifiers: &QualifierMap,
    key: &str,
) -> Result<String, HepRefError> {
    qualifiers
        .get(key)
        .map(str::to_string)
        .ok_or_else(|| HepRefError::QualifierNotFound {
            reference: resolved.components.to_string(),
            key: key.to_string(),
        })
}
