//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::info;

use catalogloader_core::LocationReaders;
use catalogloader_shared::{
    AppConfig, LocationSpec, ReadLocationResult, config_file_path, init_config, load_config,
    load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// catalogloader: read catalog entities from locations.
#[derive(Parser)]
#[command(
    name = "catalogloader",
    version,
    about = "Read catalog entities from files, source-control hosts, and directory servers.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.catalogloader/catalogloader.toml.
    #[arg(long, global = true, env = "CATALOGLOADER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Result output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Read a location and everything it references.
    Read {
        /// Location type: url, file, ldap-org, bootstrap, ...
        #[arg(value_name = "TYPE")]
        location_type: String,

        /// Location target: a URL, a path, a directory server, ...
        target: String,

        /// How to print the result.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
    /// Print the config file path.
    Path,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "catalogloader=warn",
        1 => "catalogloader=info",
        2 => "catalogloader=debug",
        _ => "catalogloader=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout carries only the result.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Read {
            location_type,
            target,
            format,
        } => cmd_read(cli.config.as_deref(), location_type, target, format).await,
        Command::Config { action } => {
            match action {
                ConfigAction::Init => cmd_config_init()?,
                ConfigAction::Show => cmd_config_show(cli.config.as_deref())?,
                ConfigAction::Path => cmd_config_path(cli.config.as_deref())?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_read(
    config_path: Option<&Path>,
    location_type: String,
    target: String,
    format: OutputFormat,
) -> Result<ExitCode> {
    let config = resolve_config(config_path)?;
    let readers = LocationReaders::from_config(&config)?;

    let location = LocationSpec::new(location_type, target);
    info!(%location, "reading");
    let output = readers.read(&location).await;

    match format {
        OutputFormat::Text => print!("{}", render_text(&output)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }

    Ok(if output.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn render_text(output: &ReadLocationResult) -> String {
    let mut text = String::new();

    text.push_str(&format!("Entities ({}):\n", output.entities.len()));
    for item in &output.entities {
        text.push_str(&format!(
            "  {:<40} {}\n",
            item.entity.ref_string(),
            item.location
        ));
    }

    if !output.errors.is_empty() {
        text.push_str(&format!("\nErrors ({}):\n", output.errors.len()));
        for item in &output.errors {
            text.push_str(&format!("  {}: {}\n", item.location, item.error));
        }
    }

    text
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn cmd_config_path(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogloader_shared::{CatalogError, Entity, LocationEntity, LocationError};

    #[test]
    fn parses_read_command() {
        let cli = Cli::try_parse_from([
            "catalogloader",
            "-vv",
            "read",
            "url",
            "https://github.com/o/r/blob/main/catalog-info.yaml",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Read {
                location_type,
                target,
                format,
            } => {
                assert_eq!(location_type, "url");
                assert_eq!(target, "https://github.com/o/r/blob/main/catalog-info.yaml");
                assert_eq!(format, OutputFormat::Json);
            }
            Command::Config { .. } => panic!("expected read"),
        }
    }

    #[test]
    fn parses_config_path_with_override() {
        let cli =
            Cli::try_parse_from(["catalogloader", "config", "path", "--config", "/tmp/c.toml"])
                .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/c.toml")));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Path
            }
        ));
    }

    #[test]
    fn text_rendering_lists_entities_and_errors() {
        let location = LocationSpec::new("file", "/srv/catalog.yaml");
        let output = ReadLocationResult {
            entities: vec![LocationEntity {
                entity: Entity::new("catalog/v1", "Component", "svc"),
                location: location.clone(),
            }],
            errors: vec![LocationError {
                location,
                error: CatalogError::NotFound("/srv/other.yaml does not exist".into()),
            }],
        };

        let text = render_text(&output);
        assert!(text.starts_with("Entities (1):\n  Component:default/svc"));
        assert!(text.contains("file:/srv/catalog.yaml\n"));
        assert!(text.contains(
            "Errors (1):\n  file:/srv/catalog.yaml: not found: /srv/other.yaml does not exist"
        ));
    }
}
