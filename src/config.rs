use clap::{Arg, ArgMatches, Command};
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::WalletError;
use crate::rpc::RpcConfig;
use crate::wallet::WalletConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub rpc: RpcConfig,
    pub wallet: WalletConfig,
}

/// Command-line surface shared by the binary and `Config::load`
pub fn cli() -> Command {
    Command::new("lbry-wallet")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Command-line client for an authenticated LBRY daemon")
        .arg(
            Arg::new("conf")
                .long("conf")
                .value_name("FILE")
                .help("Specify configuration file (default: <datadir>/lbrynet.conf)")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("datadir")
                .long("datadir")
                .value_name("DIR")
                .help("Specify data directory (default: ~/.lbrynet)")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("api-host")
                .long("api-host")
                .value_name("HOST")
                .help("Host of the daemon API")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("api-port")
                .long("api-port")
                .value_name("PORT")
                .help("Port of the daemon API (default: 5279)")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("api-key-name")
                .long("api-key-name")
                .value_name("NAME")
                .help("Name of the API key to authenticate with")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("api-keys")
                .long("api-keys")
                .value_name("FILE")
                .help("Path to the API key file")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("method")
                .value_name("METHOD")
                .help("API method to call, e.g. status or wallet.balance")
                .required(true),
        )
        .arg(
            Arg::new("params")
                .value_name("PARAMS")
                .help("Positional parameters, parsed as JSON where possible")
                .num_args(0..),
        )
}

/// `--datadir`, or `~/.lbrynet`
pub fn data_dir(matches: &ArgMatches) -> Result<PathBuf, WalletError> {
    if let Some(dir) = matches.get_one::<String>("datadir") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".lbrynet"))
        .ok_or_else(|| WalletError::ConfigError("Failed to determine home directory".to_string()))
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, WalletError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| WalletError::ConfigError(format!("Invalid value for {}: {} ({})", key, value, e)))
}

impl Config {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: &Path) -> Self {
        let mut rpc = RpcConfig::default();
        rpc.auth.keys_path = data_dir.join(".api_keys");

        let mut wallet = WalletConfig::default();
        wallet.database.path = data_dir.join("lbrynet.sqlite");

        Config {
            data_dir: data_dir.to_path_buf(),
            rpc,
            wallet,
        }
    }

    /// Load configuration from an ini-style file, then apply command line overrides
    pub fn load(conf_path: &Path, matches: &ArgMatches) -> Result<Self, WalletError> {
        let mut config = Config::with_data_dir(&data_dir(matches)?);

        if conf_path.exists() {
            log::debug!("Reading configuration from {}", conf_path.display());
            let file = fs::File::open(conf_path)
                .map_err(|e| WalletError::ConfigError(format!("Failed to open config file: {}", e)))?;
            config.apply_file(io::BufReader::new(file))?;
        }

        config.apply_command_line_args(matches)?;
        Ok(config)
    }

    fn apply_file(&mut self, reader: impl BufRead) -> Result<(), WalletError> {
        let mut section = String::new();

        for line in reader.lines() {
            let line = line.map_err(|e| WalletError::ConfigError(format!("Failed to read line: {}", e)))?;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }

            if let Some((key, value)) = trimmed.split_once('=') {
                self.apply_setting(&section, key.trim(), value.trim())?;
            }
        }
        Ok(())
    }

    fn apply_setting(&mut self, section: &str, key: &str, value: &str) -> Result<(), WalletError> {
        match (section, key) {
            ("", "apihost") | ("api", "host") => {
                self.rpc.host = value.to_string();
            }
            ("", "apiport") | ("api", "port") => {
                self.rpc.port = parse_number(key, value)?;
            }
            ("api", "address") => {
                self.rpc.address = value.trim_matches('/').to_string();
            }
            ("", "apikeyname") | ("api", "key_name") => {
                self.rpc.auth.key_name = value.to_string();
            }
            ("api", "keys_path") => {
                self.rpc.auth.keys_path = PathBuf::from(value);
            }
            ("api", "timeout") => {
                self.rpc.timeout = Duration::from_secs(parse_number(key, value)?);
            }

            ("wallet", "ledger_url") => {
                self.wallet.ledger_url = value.to_string();
            }
            ("wallet", "database") => {
                self.wallet.database.path = PathBuf::from(value);
            }
            ("wallet", "timeout") => {
                self.wallet.timeout = Duration::from_secs(parse_number(key, value)?);
            }

            _ => {
                log::debug!("Ignoring unknown config option: [{}] {}", section, key);
            }
        }
        Ok(())
    }

    fn apply_command_line_args(&mut self, matches: &ArgMatches) -> Result<(), WalletError> {
        if let Some(host) = matches.get_one::<String>("api-host") {
            self.rpc.host = host.clone();
        }
        if let Some(port) = matches.get_one::<String>("api-port") {
            self.rpc.port = parse_number("api-port", port)?;
        }
        if let Some(name) = matches.get_one::<String>("api-key-name") {
            self.rpc.auth.key_name = name.clone();
        }
        if let Some(path) = matches.get_one::<String>("api-keys") {
            self.rpc.auth.keys_path = PathBuf::from(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["lbry-wallet"];
        argv.extend_from_slice(args);
        argv.push("status");
        cli().get_matches_from(argv)
    }

    #[test]
    fn defaults_are_rooted_at_datadir() {
        let dir = tempfile::tempdir().unwrap();
        let datadir = dir.path().to_str().unwrap();
        let config = Config::load(&dir.path().join("missing.conf"), &matches(&["--datadir", datadir])).unwrap();

        assert_eq!(config.rpc.port, 5279);
        assert_eq!(config.rpc.host, "localhost");
        assert_eq!(config.rpc.auth.key_name, "api");
        assert_eq!(config.rpc.auth.keys_path, dir.path().join(".api_keys"));
        assert_eq!(config.wallet.database.path, dir.path().join("lbrynet.sqlite"));
        assert_eq!(config.rpc.service_url().unwrap().as_str(), "http://localhost:5279/lbryapi");
    }

    #[test]
    fn file_settings_then_command_line_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("lbrynet.conf");
        let mut file = fs::File::create(&conf).unwrap();
        writeln!(
            file,
            "# daemon settings\napihost = 10.0.0.2\napiport=5280\n\n[api]\naddress = /api/\ntimeout = 5\n\
             [wallet]\nledger_url = http://ledger:7777\nunknown = 1"
        )
        .unwrap();

        let datadir = dir.path().to_str().unwrap();
        let config = Config::load(&conf, &matches(&["--datadir", datadir, "--api-port", "6000"])).unwrap();

        assert_eq!(config.rpc.host, "10.0.0.2");
        assert_eq!(config.rpc.port, 6000);
        assert_eq!(config.rpc.address, "api");
        assert_eq!(config.rpc.timeout, Duration::from_secs(5));
        assert_eq!(config.wallet.ledger_url, "http://ledger:7777");
    }

    #[test]
    fn invalid_numbers_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let datadir = dir.path().to_str().unwrap();
        let err = Config::load(&dir.path().join("none.conf"), &matches(&["--datadir", datadir, "--api-port", "http"]))
            .unwrap_err();
        assert!(matches!(err, WalletError::ConfigError(_)));

        let mut config = Config::with_data_dir(dir.path());
        assert!(config.apply_setting("wallet", "timeout", "soon").is_err());
    }
}
