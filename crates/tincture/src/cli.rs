//! Command-line interface handling.

use clap::{Arg, ArgAction, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments. Each `Some` overrides the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Configuration file, `tincture.toml` unless `--config` is given.
    pub config_path: PathBuf,
    pub log_level: Option<String>,
    /// Emit JSON log lines instead of the compact format.
    pub json_logs: bool,
    /// Set by `--threaded-regions` or implied by `--regions`.
    pub threaded_regions: bool,
    pub regions: Option<usize>,
}

/// The clap command shared by [`CliArgs::parse`] and [`CliArgs::try_parse_from`].
fn command() -> Command {
    Command::new("tincture")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Chat formatting server with region-aware delivery")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("tincture.toml"),
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
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("threaded-regions")
                .long("threaded-regions")
                .help("Run one tick thread per region")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("regions")
                .short('r')
                .long("regions")
                .value_name("COUNT")
                .help("Number of region threads (implies --threaded-regions)")
                .value_parser(clap::value_parser!(usize)),
        )
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage text on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list.
    ///
    /// # Arguments
    ///
    /// * `args` - The full argument list, program name first.
    ///
    /// # Returns
    ///
    /// The parsed arguments, or the clap error describing the bad input.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        let regions = matches.get_one::<usize>("regions").copied();
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tincture.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            threaded_regions: matches.get_flag("threaded-regions") || regions.is_some(),
            regions,
        }
    }
}
