use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use scw_provider::config::Config;
use scw_provider::provider::{self, Provider};
use scw_provider::scw::http::format_scw_error;
use scw_provider::scw::{Region, ScwClient};
use scw_provider::{resources, sweep};

/// Environment variable holding a tracing filter (`scw_provider=debug`)
const ENV_LOG: &str = "SCW_PROVIDER_LOG";

/// Scaleway provider: manage bare-metal servers, load balancers,
/// private networks and cockpit tokens
#[derive(Parser, Debug)]
#[command(name = "scw-provider", version, about, long_about = None)]
struct Args {
    /// Profile of the Scaleway config file to use
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Log level, overridden by SCW_PROVIDER_LOG
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print resource schemas as JSON
    Schema {
        /// Only this resource type
        #[arg(value_name = "TYPE")]
        resource_type: Option<String>,
    },
    /// Delete resources leaked by acceptance tests
    Sweep {
        /// Region to sweep, defaults to the configured region
        #[arg(long)]
        region: Option<String>,
        /// Only this sweeper and its dependencies
        #[arg(long)]
        only: Option<String>,
    },
    /// Upgrade a state document written by an older schema version
    UpgradeState {
        #[arg(long = "type")]
        resource_type: String,
        /// Schema version the state was written with
        #[arg(long)]
        version: u32,
        file: PathBuf,
    },
    /// Create a resource, or bring an existing one in line with its config
    Apply {
        #[arg(long = "type")]
        resource_type: String,
        config: PathBuf,
        /// Prior state of the resource
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Refresh a resource from its state
    Read {
        #[arg(long = "type")]
        resource_type: String,
        state: PathBuf,
    },
    /// Adopt an existing resource by id
    Import {
        #[arg(long = "type")]
        resource_type: String,
        id: String,
    },
    /// Delete a resource
    Destroy {
        #[arg(long = "type")]
        resource_type: String,
        state: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
        return Ok(None);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("scw-provider {} logging to {:?}", scw_provider::VERSION, path);
    Ok(Some(guard))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_scw_error(&err));
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Schema { resource_type } => {
            let all = resources::all();
            let document = match resource_type {
                Some(name) => all
                    .iter()
                    .find(|r| r.type_name() == name)
                    .map(|r| r.schema().to_json())
                    .ok_or_else(|| anyhow!("unknown resource type: {name}"))?,
                None => Value::Object(
                    all.iter()
                        .map(|r| (r.type_name().to_string(), r.schema().to_json()))
                        .collect::<Map<_, _>>(),
                ),
            };
            print_json(&document)
        }
        Command::UpgradeState {
            resource_type,
            version,
            file,
        } => {
            let resource = resources::all()
                .into_iter()
                .find(|r| r.type_name() == resource_type)
                .ok_or_else(|| anyhow!("unknown resource type: {resource_type}"))?;
            let upgraded = provider::upgrade_state(resource.as_ref(), version, read_json(&file)?)?;
            print_json(&upgraded)
        }
        Command::Sweep { region, only } => {
            let client = connect(args.profile.as_deref())?;
            let region = match region {
                Some(region) => Region::parse(&region)?,
                None => client
                    .default_region()
                    .ok_or_else(|| anyhow!("no region given and no default region configured"))?,
            };
            let ran = sweep::run_sweepers(&sweep::all(), &client, &region, only.as_deref()).await?;
            tracing::info!("swept {} in {}", ran.join(", "), region);
            Ok(())
        }
        Command::Apply {
            resource_type,
            config,
            state,
        } => {
            let provider = Provider::new(connect(args.profile.as_deref())?);
            let config = read_json(&config)?;
            let state = match state {
                Some(path) => Some(read_json(&path)?),
                None => None,
            };
            let result = provider.apply(&resource_type, config, state).await?;
            print_json(&result)
        }
        Command::Read {
            resource_type,
            state,
        } => {
            let provider = Provider::new(connect(args.profile.as_deref())?);
            let state = provider.read(&resource_type, read_json(&state)?).await?;
            print_json(&state.unwrap_or(Value::Null))
        }
        Command::Import { resource_type, id } => {
            let provider = Provider::new(connect(args.profile.as_deref())?);
            let state = provider
                .import(&resource_type, &id)
                .await?
                .ok_or_else(|| anyhow!("{resource_type} {id} not found"))?;
            print_json(&state)
        }
        Command::Destroy {
            resource_type,
            state,
        } => {
            let provider = Provider::new(connect(args.profile.as_deref())?);
            provider.delete(&resource_type, read_json(&state)?).await
        }
    }
}

fn connect(profile: Option<&str>) -> Result<ScwClient> {
    let credentials = Config::load()?.credentials(profile)?;
    Ok(ScwClient::new(credentials)?)
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if !value.is_object() {
        bail!("{} must contain a JSON object", path.display());
    }
    Ok(value)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
