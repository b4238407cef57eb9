//! Command-line interface handling for the dedicated server.
//!
//! Uses the `clap` builder API. Every option except the config path is an
//! override applied on top of the loaded configuration file.

use clap::{Arg, ArgMatches, Command};
use server_manager::ServerEnvironment;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Environment preset to start with
    pub environment: ServerEnvironment,
    /// Optional override for the bind IP
    pub bind_ip: Option<String>,
    /// Optional override for the listen port
    pub port: Option<i32>,
    /// Optional override for the log filter (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            environment: matches
                .get_one::<ServerEnvironment>("env")
                .copied()
                .unwrap_or_default(),
            bind_ip: matches.get_one::<String>("bind").cloned(),
            port: matches.get_one::<u16>("port").map(|p| i32::from(*p)),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

const DEFAULT_CONFIG_PATH: &str = "server_config.json";

fn command() -> Command {
    Command::new("Dedicated Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Standalone dedicated server with session management and monitoring")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (created with defaults if missing)")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("env")
                .short('e')
                .long("env")
                .value_name("ENVIRONMENT")
                .help("Environment preset: development, staging, production, load-test")
                .value_parser(|s: &str| s.parse::<ServerEnvironment>())
                .default_value("development"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("IP")
                .help("Bind IP address (e.g., 127.0.0.1)"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Listen port")
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
}
