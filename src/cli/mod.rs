pub mod actions;
pub mod config;

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::path::Path;

use config::SpaceStatusConfig;

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    command().get_matches()
}

pub fn command() -> Command {
    Command::new("hms_spacestatus")
        .about("Keeps the HAUM open/closed space status in sync")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file (TOML)")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Also write logs to this file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("status-file")
                .long("status-file")
                .help("Override the status flag file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("bus-url")
                .long("bus-url")
                .help("Override the bus URL, e.g. mqtt://localhost:1883/haum")
                .value_name("URL"),
        )
        .arg(
            Arg::new("no-spaceapi")
                .long("no-spaceapi")
                .help("Do not mirror state changes to SpaceAPI")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("spaceapi-status")
                .long("spaceapi-status")
                .help("Print the state published on SpaceAPI and exit")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with_all(["spaceapi-toggle", "read-state"]),
        )
        .arg(
            Arg::new("spaceapi-toggle")
                .long("spaceapi-toggle")
                .help("Flip the state published on SpaceAPI and exit")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("read-state"),
        )
        .arg(
            Arg::new("read-state")
                .long("read-state")
                .help("Print the local status flag and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .short('j')
                .help("Output one-shot results in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Load the configuration file and apply command line overrides.
pub fn load_config(matches: &ArgMatches) -> Result<SpaceStatusConfig> {
    let path = matches.get_one::<String>("config").map(Path::new);
    let mut config = SpaceStatusConfig::load(path)?;
    apply_overrides(&mut config, matches);
    Ok(config)
}

fn apply_overrides(config: &mut SpaceStatusConfig, matches: &ArgMatches) {
    if let Some(file) = matches.get_one::<String>("status-file") {
        config.status.file = file.clone();
    }
    if let Some(url) = matches.get_one::<String>("bus-url") {
        config.bus.url = url.clone();
    }
    if matches.get_flag("no-spaceapi") {
        config.spaceapi.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_config() {
        let matches = command().get_matches_from([
            "hms_spacestatus",
            "--status-file",
            "/tmp/status",
            "--bus-url",
            "mqtt://bus:1884/lab",
            "--no-spaceapi",
        ]);
        let mut config = SpaceStatusConfig::default();
        apply_overrides(&mut config, &matches);

        assert_eq!(config.status.file, "/tmp/status");
        assert_eq!(config.bus.url, "mqtt://bus:1884/lab");
        assert!(!config.spaceapi.enabled);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let matches = command().get_matches_from(["hms_spacestatus"]);
        let mut config = SpaceStatusConfig::default();
        apply_overrides(&mut config, &matches);
        assert_eq!(config, SpaceStatusConfig::default());
    }

    #[test]
    fn test_one_shot_modes_conflict() {
        let result = command().try_get_matches_from([
            "hms_spacestatus",
            "--spaceapi-status",
            "--read-state",
        ]);
        assert!(result.is_err());
    }
}
