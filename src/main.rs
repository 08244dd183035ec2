//! # EXTCTL
//!
//! Command-line driver for the extension controller.
//!
//! Desired extensions live in a manifest; the last platform-confirmed
//! snapshot of each one lives in a state file next to it.
//!
//! ## Usage
//!
//! ```bash
//! # Check that every manifest block decodes
//! extctl validate --manifest extensions.yaml
//!
//! # Show what apply would change
//! extctl plan
//!
//! # Converge the platform to the manifest
//! extctl apply
//!
//! # Delete everything recorded in the state file
//! extctl destroy
//!
//! # Show the recorded attributes of one extension
//! extctl show order-validation
//! ```
//!
//! Platform credentials are read from `CTP_PROJECT_KEY`, `CTP_CLIENT_ID`,
//! `CTP_CLIENT_SECRET` and optionally `CTP_SCOPES`, `CTP_API_URL`,
//! `CTP_AUTH_URL`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extension_controller::config::{ApiCredentials, ControllerConfig};
use extension_controller::constants::{DEFAULT_MANIFEST_PATH, DEFAULT_STATE_PATH};
use extension_controller::controller::{self, Plan, Reconciler, RetryPolicy};
use extension_controller::manifest::Manifest;
use extension_controller::observability::metrics;
use extension_controller::provider::rest::ExtensionsREST;
use extension_controller::resource::{observed_attributes, Attributes};
use extension_controller::state::StateStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Extension Controller CLI
#[derive(Parser)]
#[command(name = "extctl", version = VERSION)]
#[command(
    about = "Reconcile API extensions against the platform",
    long_about = None,
    after_help = "\
Examples:
  extctl validate --manifest extensions.yaml
  extctl plan --state prod.state.json
  extctl apply --metrics-file /var/lib/node_exporter/extctl.prom
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Manifest declaring the desired extensions (YAML, or JSON by extension)
    #[arg(short, long, global = true, default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,

    /// State file recording what the platform last confirmed
    #[arg(short, long, global = true, default_value = DEFAULT_STATE_PATH)]
    state: PathBuf,

    /// Write Prometheus metrics in text format to this file on exit
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode the manifest without contacting the platform
    Validate,
    /// Refresh the state and show what apply would change
    Plan,
    /// Create, update and delete extensions until the platform matches the manifest
    Apply,
    /// Delete every extension recorded in the state file
    Destroy,
    /// Show the recorded attributes of one or all extensions
    Show {
        /// Manifest name of the extension
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must happen before any TLS client is built
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = ControllerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_directive().into()),
        )
        .init();

    if config.enable_metrics {
        metrics::register_metrics()?;
    }

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Validate => validate_command(&cli.manifest),
        Commands::Plan => plan_command(&config, &cli.manifest, &cli.state).await,
        Commands::Apply => apply_command(&config, &cli.manifest, &cli.state).await,
        Commands::Destroy => destroy_command(&config, &cli.state).await,
        Commands::Show { name } => show_command(&cli.state, name.as_deref()),
    };

    if let Some(path) = &cli.metrics_file {
        if config.enable_metrics {
            metrics::write_metrics_file(path)?;
        } else {
            warn!("--metrics-file ignored because ENABLE_METRICS is false");
        }
    }

    result
}

fn validate_command(manifest_path: &Path) -> Result<()> {
    let manifest = Manifest::from_path(manifest_path)?;
    let specs = manifest.decode()?;

    for (name, spec) in &specs {
        println!(
            "✅ {name}: {} destination, {} trigger(s)",
            spec.destination.type_name(),
            spec.triggers.len()
        );
    }
    println!("{} extension(s) valid", specs.len());
    Ok(())
}

async fn plan_command(
    config: &ControllerConfig,
    manifest_path: &Path,
    state_path: &Path,
) -> Result<()> {
    let manifest = Manifest::from_path(manifest_path)?;
    let state = StateStore::load(state_path)?;
    let reconciler = connect(config).await?;
    let policy = RetryPolicy::from_config(config);

    let plan = controller::plan(&reconciler, &policy, &manifest, &state).await?;
    print_plan(&plan);
    Ok(())
}

async fn apply_command(
    config: &ControllerConfig,
    manifest_path: &Path,
    state_path: &Path,
) -> Result<()> {
    let manifest = Manifest::from_path(manifest_path)?;
    let mut state = StateStore::load(state_path)?;
    let reconciler = connect(config).await?;
    let policy = RetryPolicy::from_config(config);

    let plan = controller::plan(&reconciler, &policy, &manifest, &state).await?;
    print_plan(&plan);
    let changed = plan.has_changes();

    // Unchanged entries still record their refreshed versions
    let summary = controller::apply(&reconciler, &policy, plan, &mut state)
        .await
        .with_context(|| format!("Apply stopped; state saved to {}", state.path().display()))?;
    if changed {
        println!(
            "Apply complete: {} created, {} updated, {} deleted",
            summary.created, summary.updated, summary.deleted
        );
    }
    Ok(())
}

async fn destroy_command(config: &ControllerConfig, state_path: &Path) -> Result<()> {
    let mut state = StateStore::load(state_path)?;
    if state.is_empty() {
        println!("Nothing to destroy");
        return Ok(());
    }

    let reconciler = connect(config).await?;
    let plan = controller::plan_destroy(&state);
    print_plan(&plan);

    let policy = RetryPolicy::from_config(config);
    let summary = controller::apply(&reconciler, &policy, plan, &mut state)
        .await
        .with_context(|| format!("Destroy stopped; state saved to {}", state.path().display()))?;
    println!("Destroy complete: {} deleted", summary.deleted);
    Ok(())
}

fn show_command(state_path: &Path, name: Option<&str>) -> Result<()> {
    let state = StateStore::load(state_path)?;

    if let Some(name) = name {
        let remote = state
            .get(name)
            .with_context(|| format!("No extension named '{name}' in {}", state_path.display()))?;
        print_attributes(name, &observed_attributes(remote));
        return Ok(());
    }

    if state.is_empty() {
        println!("No extensions recorded in {}", state_path.display());
    }
    for (name, remote) in state.iter() {
        print_attributes(name, &observed_attributes(remote));
    }
    Ok(())
}

/// Build a reconciler talking to the platform
async fn connect(config: &ControllerConfig) -> Result<Reconciler> {
    let credentials = ApiCredentials::from_env().context(
        "Platform credentials are required. Set CTP_PROJECT_KEY, CTP_CLIENT_ID and CTP_CLIENT_SECRET.",
    )?;
    let client = ExtensionsREST::new(&credentials).await?;
    info!(
        "Connected to {} (project {})",
        credentials.api_url, credentials.project_key
    );

    Ok(Reconciler::new(Arc::new(client)).with_operation_timeout(config.operation_timeout()))
}

fn print_plan(plan: &Plan) {
    for entry in &plan.entries {
        println!("{entry}");
    }

    let (create, update, delete) = plan.change_counts();
    if plan.has_changes() {
        println!();
        println!("Plan: {create} to create, {update} to update, {delete} to delete");
    } else {
        println!("No changes. The platform matches the manifest.");
    }
}

fn print_attributes(name: &str, attributes: &Attributes) {
    println!("{name}:");
    for (attribute, value) in attributes {
        println!("  {attribute} = {value}");
    }
}
