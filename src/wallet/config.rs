use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the ledger daemon
    pub ledger_url: String,
    pub timeout: Duration,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            ledger_url: "http://localhost:7777".to_string(),
            timeout: Duration::from_secs(30),
            database: DatabaseConfig {
                path: PathBuf::from("lbrynet.sqlite"),
            },
        }
    }
}
