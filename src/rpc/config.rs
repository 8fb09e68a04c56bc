use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::WalletError;

pub const DEFAULT_API_PORT: u16 = 5279;
pub const DEFAULT_KEY_NAME: &str = "api";

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    /// Path component of the daemon's API endpoint
    pub address: String,
    pub auth: RpcAuth,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RpcAuth {
    pub key_name: String,
    pub keys_path: PathBuf,
}

impl RpcConfig {
    pub fn service_url(&self) -> Result<Url, WalletError> {
        let raw = format!("http://{}:{}/{}", self.host, self.port, self.address);
        Url::parse(&raw).map_err(|e| WalletError::ConfigError(format!("Invalid API url {}: {}", raw, e)))
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_API_PORT,
            address: "lbryapi".to_string(),
            auth: RpcAuth {
                key_name: DEFAULT_KEY_NAME.to_string(),
                keys_path: PathBuf::from(".api_keys"),
            },
            timeout: Duration::from_secs(30),
        }
    }
}
