//! pg-schema-manifest CLI - PostgreSQL catalog snapshots, drift and schema transforms.

use chrono::Utc;
use clap::{Parser, Subcommand};
use pg_schema_manifest::core::CatalogSource;
use pg_schema_manifest::drift::report;
use pg_schema_manifest::transform::graph;
use pg_schema_manifest::{
    Config, DocumentSchema, DriftDetector, DriftReport, InMemoryCatalog, Introspector, Manifest,
    ManifestError, PostgresCatalog, TypeMapper, EXIT_FAILURE,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pg-schema-manifest")]
#[command(about = "PostgreSQL catalog manifests, drift detection and schema transforms")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (defaults and DATABASE_URL when omitted)
    #[arg(short, long, env = "PG_SCHEMA_MANIFEST_CONFIG")]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Introspect the database catalog into a manifest
    Introspect {
        /// Manifest output path [default: output.manifest]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare the manifest with the database and write a drift report
    Drift {
        /// Manifest to check [default: output.manifest]
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Report output path [default: output.drift_report]
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Compare against another manifest instead of the database
        #[arg(long)]
        against: Option<PathBuf>,
    },

    /// Generate the document-collection schema from the manifest
    DocumentSchema {
        /// Manifest to read [default: output.manifest]
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Schema output path [default: output.document_schema]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate the typed-graph schema from the manifest
    GraphSchema {
        /// Manifest to read [default: output.manifest]
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Schema output path [default: output.graph_schema]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, ManifestError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    }
    .with_env_overrides();
    config.validate()?;

    match cli.command {
        Commands::Introspect { output } => {
            config.validate_for_database()?;
            let path = output.unwrap_or_else(|| config.output.manifest.clone());

            let catalog = PostgresCatalog::connect(&config.database).await?;
            let result = Introspector::new(&catalog)
                .with_scope(config.introspection.clone())
                .run()
                .await;
            catalog.close().await;
            let manifest = result?;

            manifest.save(&path)?;
            info!("Manifest written to {:?}", path);

            if cli.output_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "manifest": path,
                        "database": manifest.database,
                        "schemas": manifest.schemas.len(),
                        "tables": manifest.table_count(),
                        "views": manifest.view_count(),
                        "functions": manifest.function_count(),
                    }))?
                );
            } else {
                println!("Introspection completed!");
                println!("  Manifest: {}", path.display());
                println!("  Schemas: {}", manifest.schemas.len());
                println!("  Tables: {}", manifest.table_count());
                println!("  Views: {}", manifest.view_count());
                println!("  Functions: {}", manifest.function_count());
            }
        }

        Commands::Drift {
            manifest,
            report: report_path,
            against,
        } => {
            let manifest_path = manifest.unwrap_or_else(|| config.output.manifest.clone());
            let report_path = report_path.unwrap_or_else(|| config.output.drift_report.clone());
            if against.is_none() {
                config.validate_for_database()?;
            }

            let manifest = Manifest::load(&manifest_path)?;
            let drift = match against {
                Some(live_path) => {
                    info!("Comparing {:?} against manifest {:?}", manifest_path, live_path);
                    let catalog = InMemoryCatalog::new(Manifest::load(&live_path)?);
                    detect(&catalog, &config, &manifest).await
                }
                None => {
                    let catalog = PostgresCatalog::connect(&config.database).await?;
                    let result = detect(&catalog, &config, &manifest).await;
                    catalog.close().await;
                    result
                }
            }?;

            report::save(&drift, &report_path)?;
            info!("Drift report written to {:?}", report_path);

            if cli.output_json {
                println!("{}", drift.to_json()?);
            } else {
                print_drift_summary(&drift, &report_path);
            }

            if !drift.is_drift_free() {
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
        }

        Commands::DocumentSchema { manifest, output } => {
            let manifest_path = manifest.unwrap_or_else(|| config.output.manifest.clone());
            let path = output.unwrap_or_else(|| config.output.document_schema.clone());

            let manifest = Manifest::load(&manifest_path)?;
            let schema = DocumentSchema::build(&manifest, &TypeMapper::default(), Utc::now());
            schema.save(&path)?;
            info!("Document-collection schema written to {:?}", path);

            if cli.output_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "output": path,
                        "collections": schema.collections.len(),
                    }))?
                );
            } else {
                println!("Document-collection schema generated!");
                println!("  Output: {}", path.display());
                println!("  Collections: {}", schema.collections.len());
            }
        }

        Commands::GraphSchema { manifest, output } => {
            let manifest_path = manifest.unwrap_or_else(|| config.output.manifest.clone());
            let path = output.unwrap_or_else(|| config.output.graph_schema.clone());

            let manifest = Manifest::load(&manifest_path)?;
            let mapper = TypeMapper::default();
            let types = graph::graph_types(&manifest, &mapper).len();
            graph::save(&manifest, &mapper, Utc::now(), &path)?;
            info!("Typed-graph schema written to {:?}", path);

            if cli.output_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "output": path,
                        "types": types,
                    }))?
                );
            } else {
                println!("Typed-graph schema generated!");
                println!("  Output: {}", path.display());
                println!("  Types: {}", types);
            }
        }

        Commands::HealthCheck => {
            config.validate_for_database()?;
            let catalog = PostgresCatalog::connect(&config.database).await?;
            let result = health_check(&catalog).await;
            catalog.close().await;
            let (database, latency_ms) = result?;

            if cli.output_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "healthy": true,
                        "target": config.database.display_target(),
                        "database": database,
                        "latency_ms": latency_ms,
                    }))?
                );
            } else {
                println!("Health Check Results:");
                println!("  Target: {}", config.database.display_target());
                println!("  Database: {} as {}", database.name, database.user);
                println!("  Server: {}", database.version);
                println!("  Latency: {}ms", latency_ms);
                println!("\n  Overall: HEALTHY");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn detect<C: CatalogSource + ?Sized>(
    catalog: &C,
    config: &Config,
    manifest: &Manifest,
) -> Result<DriftReport, ManifestError> {
    DriftDetector::new(catalog)
        .with_scope(config.introspection.clone())
        .detect(manifest)
        .await
}

async fn health_check(
    catalog: &PostgresCatalog,
) -> Result<(pg_schema_manifest::core::DatabaseInfo, u128), ManifestError> {
    let latency = catalog.ping().await?;
    let database = catalog.database_info().await?;
    Ok((database, latency.as_millis()))
}

fn print_drift_summary(drift: &DriftReport, report_path: &Path) {
    let summary = &drift.summary;
    if drift.is_drift_free() {
        println!("No drift detected.");
    } else {
        println!("Drift detected!");
    }
    println!("  Report: {}", report_path.display());
    println!("  Total drifts: {}", summary.total_drifts);
    println!("  Schemas with drift: {}", summary.schemas_with_drift);
    if !summary.missing_schemas.is_empty() {
        println!("  Missing schemas: {:?}", summary.missing_schemas);
    }
    if !summary.extra_schemas.is_empty() {
        println!("  Extra schemas: {:?}", summary.extra_schemas);
    }
}

/// Logs go to stderr so `--output-json` stays parseable. `RUST_LOG`
/// overrides `--verbosity` when set.
fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
