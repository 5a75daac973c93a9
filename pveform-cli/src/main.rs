use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use pveform_core::diagnostics::{Diagnostics, Severity};
use pveform_core::host::Host;
use pveform_core::provider::{Provider, ReadRequest};
use pveform_core::resource::Value;
use pveform_core::schema::Schema;
use pveform_provider_proxmox::ProxmoxProvider;
use pveform_state::{BackendConfig, DataSourceState, StateBackend, StateFile, create_backend};

#[derive(Parser)]
#[command(name = "pveform")]
#[command(about = "Read Proxmox VE cluster state through provider data sources", long_about = None)]
struct Cli {
    /// Proxmox VE API endpoint (defaults to $PROXMOX_VE_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// API token USER@REALM!TOKENID=SECRET (defaults to $PROXMOX_VE_API_TOKEN)
    #[arg(long, global = true)]
    api_token: Option<String>,

    /// Skip TLS certificate verification; `--insecure=false` overrides $PROXMOX_VE_INSECURE
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    insecure: Option<bool>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<i64>,

    /// Path to the state file
    #[arg(long, global = true, default_value = "pveform.state.json")]
    state: PathBuf,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the data sources offered by the provider
    Providers,
    /// Show the schema of a data source
    Schema {
        /// Data source type name (e.g., proxmox_virtual_environment_hagroups)
        data_source: String,
    },
    /// Read a data source and save its state
    Read {
        /// Data source type name
        data_source: String,

        /// Configuration attribute as key=value (repeatable)
        #[arg(long = "attr", short = 'a', value_parser = parse_attribute)]
        attributes: Vec<(String, Value)>,

        /// Label under which the snapshot is saved
        #[arg(long, default_value = "main")]
        name: String,

        /// Print the state without saving it
        #[arg(long)]
        no_save: bool,
    },
    /// Show saved data source state
    Show {
        /// Only show snapshots of this data source type
        data_source: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match &cli.command {
        Commands::Providers => run_providers(),
        Commands::Schema { data_source } => run_schema(data_source),
        Commands::Read {
            data_source,
            attributes,
            name,
            no_save,
        } => run_read(&cli, data_source, attributes, name, *no_save).await,
        Commands::Show { data_source } => run_show(&cli.state, data_source.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Parse a `key=value` attribute; `true`/`false` and integers are typed
fn parse_attribute(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid attribute '{}': expected key=value", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid attribute '{}': empty key", raw));
    }

    let value = match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        v => match v.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::string(v),
        },
    };
    Ok((key.to_string(), value))
}

/// Provider configuration built from the global flags
fn provider_config(cli: &Cli) -> BTreeMap<String, Value> {
    let mut config = BTreeMap::new();
    if let Some(ref endpoint) = cli.endpoint {
        config.insert("endpoint".to_string(), Value::string(endpoint));
    }
    if let Some(ref token) = cli.api_token {
        config.insert("api_token".to_string(), Value::string(token));
    }
    if let Some(insecure) = cli.insecure {
        config.insert("insecure".to_string(), Value::Bool(insecure));
    }
    if let Some(timeout) = cli.timeout {
        config.insert("timeout".to_string(), Value::Int(timeout));
    }
    config
}

fn state_backend(path: &std::path::Path) -> Result<Box<dyn StateBackend>, String> {
    let config = BackendConfig::new("local")
        .with_attribute("path", Value::string(path.to_string_lossy()));
    create_backend(&config).map_err(|e| e.to_string())
}

fn run_providers() -> Result<(), String> {
    let host = Host::new(ProxmoxProvider::new());
    println!(
        "{}",
        format!("Provider: {}", host.provider().type_name()).cyan()
    );
    for name in host.data_source_types() {
        println!("  {}", name);
    }
    Ok(())
}

fn run_schema(data_source: &str) -> Result<(), String> {
    let host = Host::new(ProxmoxProvider::new());
    let schema = host
        .data_source_schema(data_source)
        .ok_or_else(|| format!("Unknown data source: {}", data_source))?;
    print_schema(data_source, &schema);
    Ok(())
}

async fn run_read(
    cli: &Cli,
    data_source: &str,
    attributes: &[(String, Value)],
    name: &str,
    no_save: bool,
) -> Result<(), String> {
    let mut host = Host::new(ProxmoxProvider::new());

    let diags = host.configure(provider_config(cli));
    print_diagnostics(&diags);
    if diags.has_error() {
        return Err("Provider configuration failed".to_string());
    }

    let ctx = CancellationToken::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling read");
            canceller.cancel();
        }
    });

    let req = ReadRequest {
        config: attributes.iter().cloned().collect(),
    };
    let resp = host.read_data_source(data_source, &ctx, req).await;

    print_diagnostics(&resp.diagnostics);
    if let Some(json) = resp.state.to_json() {
        let rendered = serde_json::to_string_pretty(&redact(resp.state.schema(), json))
            .map_err(|e| e.to_string())?;
        println!("{}", rendered);
    }

    if resp.diagnostics.has_error() {
        return Err(format!(
            "Reading {} failed with {} error(s)",
            data_source,
            resp.diagnostics.error_count()
        ));
    }

    if no_save {
        return Ok(());
    }

    let Some(snapshot) = DataSourceState::from_snapshot(
        data_source,
        name,
        host.provider().type_name(),
        &resp.state,
    ) else {
        return Err(format!("{} did not write any state", data_source));
    };

    let backend = state_backend(&cli.state)?;
    let mut state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    state.upsert(snapshot);
    state.increment_serial();
    backend.write_state(&state).await.map_err(|e| e.to_string())?;
    debug!("saved {}.{} (serial {})", data_source, name, state.serial);

    println!(
        "{}",
        format!("Saved {}.{} to {}", data_source, name, cli.state.display()).green()
    );
    Ok(())
}

async fn run_show(path: &std::path::Path, data_source: Option<&str>) -> Result<(), String> {
    let backend = state_backend(path)?;
    let Some(state) = backend.read_state().await.map_err(|e| e.to_string())? else {
        println!("{}", "No state saved yet.".yellow());
        return Ok(());
    };

    print!("{}", render_state(&state, data_source)?);
    Ok(())
}

fn render_state(state: &StateFile, data_source: Option<&str>) -> Result<String, String> {
    let mut out = format!(
        "{}\n",
        format!("State serial {} (lineage {})", state.serial, state.lineage).cyan()
    );

    let snapshots: Vec<&DataSourceState> = match data_source {
        Some(type_name) => state.find_all(type_name).collect(),
        None => state.data_sources.iter().collect(),
    };
    if snapshots.is_empty() {
        out.push_str(&format!("{}\n", "No matching data sources.".yellow()));
    }

    for snapshot in snapshots {
        let rendered =
            serde_json::to_string_pretty(&snapshot.attributes).map_err(|e| e.to_string())?;
        out.push_str(&format!(
            "\n{} {}\n{}\n",
            format!("{}.{}", snapshot.type_name, snapshot.name).bold(),
            format!("(read at {})", snapshot.read_at.to_rfc3339()).dimmed(),
            rendered
        ));
    }
    Ok(out)
}

fn print_schema(data_source: &str, schema: &Schema) {
    println!("{}", data_source.bold());
    if let Some(ref description) = schema.description {
        println!("{}", description);
    }
    println!();

    for (name, attr) in &schema.attributes {
        let mut flags = attr.mode().to_string();
        if attr.sensitive {
            flags.push_str(", sensitive");
        }
        println!(
            "  {} {} {}",
            name.green(),
            attr.attr_type.to_string().cyan(),
            format!("({})", flags).dimmed()
        );
        if let Some(ref description) = attr.description {
            println!("      {}", description);
        }
    }
}

fn print_diagnostics(diags: &Diagnostics) {
    for diag in diags {
        let label = match diag.severity {
            Severity::Error => "Error:".red().bold(),
            Severity::Warning => "Warning:".yellow().bold(),
        };
        match diag.attribute {
            Some(ref attribute) => eprintln!("{} {} ({})", label, diag.summary, attribute),
            None => eprintln!("{} {}", label, diag.summary),
        }
        if !diag.detail.is_empty() {
            eprintln!("  {}", diag.detail);
        }
    }
}

/// Replace sensitive attribute values in rendered state
fn redact(schema: &Schema, mut json: serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::Object(ref mut map) = json {
        for (name, value) in map.iter_mut() {
            if schema.attributes.get(name).is_some_and(|a| a.sensitive) && !value.is_null() {
                *value = serde_json::Value::String("(sensitive)".to_string());
            }
        }
    }
    json
}
