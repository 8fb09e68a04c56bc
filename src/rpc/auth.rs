//! API keys shared with the daemon and the HMAC tokens derived from them

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::WalletError;

type HmacSha256 = Hmac<Sha256>;

fn sha_b58(data: &[u8]) -> String {
    bs58::encode(Sha256::digest(data)).into_string()
}

/// A named, base58-encoded shared secret
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    name: String,
    secret: String,
    expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl ApiKey {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            expiration: None,
        }
    }

    /// Derive a key from `seed`, or from 256 random bytes when there is none.
    ///
    /// Without a `name` the key is named after the hash of its own secret.
    pub fn generate(seed: Option<&[u8]>, name: Option<&str>) -> Self {
        let secret = match seed {
            Some(seed) => sha_b58(seed),
            None => {
                let mut random = [0u8; 256];
                rand::thread_rng().fill_bytes(&mut random);
                sha_b58(&random)
            }
        };
        let name = match name {
            Some(name) => name.to_string(),
            None => sha_b58(secret.as_bytes()),
        };
        Self::new(name, secret)
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.map_or(false, |expiration| expiration <= now)
    }

    fn raw_key(&self) -> Result<Vec<u8>, WalletError> {
        bs58::decode(&self.secret)
            .into_vec()
            .map_err(|e| WalletError::AuthenticationError(format!("Secret for {} is not base58: {}", self.name, e)))
    }

    fn mac(&self) -> Result<HmacSha256, WalletError> {
        HmacSha256::new_from_slice(&self.raw_key()?)
            .map_err(|e| WalletError::AuthenticationError(format!("Unusable key {}: {}", self.name, e)))
    }

    /// base58 HMAC-SHA256 of `message` under the decoded secret
    pub fn get_hmac(&self, message: &[u8]) -> Result<String, WalletError> {
        let mut mac = self.mac()?;
        mac.update(message);
        Ok(bs58::encode(mac.finalize().into_bytes()).into_string())
    }

    pub fn verify_hmac(&self, message: &[u8], token: &str) -> Result<bool, WalletError> {
        let Ok(expected) = bs58::decode(token).into_vec() else {
            return Ok(false);
        };
        let mut mac = self.mac()?;
        mac.update(message);
        Ok(mac.verify_slice(&expected).is_ok())
    }
}

/// Bytes signed for a call: hex(method) followed by hex(id), decoded back to raw bytes
pub fn signing_message(method: &str, id: u64) -> Result<Vec<u8>, WalletError> {
    let to_auth = format!("{}{}", hex::encode(method), hex::encode(id.to_string()));
    hex::decode(to_auth).map_err(|e| WalletError::AuthenticationError(format!("Bad signing message: {}", e)))
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredKey {
    secret: String,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

/// Read `{ name: { secret, expiration } }` from a JSON key file
pub fn load_api_keys(path: &Path) -> Result<HashMap<String, ApiKey>, WalletError> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        WalletError::AuthenticationError(format!("Failed to read API keys from {}: {}", path.display(), e))
    })?;
    let stored: HashMap<String, StoredKey> = serde_json::from_str(&data).map_err(|e| {
        WalletError::AuthenticationError(format!("Malformed API key file {}: {}", path.display(), e))
    })?;

    Ok(stored
        .into_iter()
        .map(|(name, key)| {
            let api_key = ApiKey {
                name: name.clone(),
                secret: key.secret,
                expiration: key.expiration,
            };
            (name, api_key)
        })
        .collect())
}

/// The key named `name`, unless it is missing or expired at `now`
pub fn select_api_key<'a>(
    keys: &'a HashMap<String, ApiKey>,
    name: &str,
    now: DateTime<Utc>,
) -> Result<&'a ApiKey, WalletError> {
    let key = keys
        .get(name)
        .ok_or_else(|| WalletError::AuthenticationError(format!("No API key named {}", name)))?;
    if key.is_expired(now) {
        log::error!("API key {} expired", name);
        return Err(WalletError::AuthenticationError(format!("API key {} has expired", name)));
    }
    Ok(key)
}

/// Write keys in the format `load_api_keys` reads
pub fn save_api_keys<'a>(keys: impl IntoIterator<Item = &'a ApiKey>, path: &Path) -> Result<(), WalletError> {
    let stored: HashMap<&str, StoredKey> = keys
        .into_iter()
        .map(|key| {
            (
                key.name.as_str(),
                StoredKey {
                    secret: key.secret.clone(),
                    expiration: key.expiration,
                },
            )
        })
        .collect();
    let data = serde_json::to_string_pretty(&stored)
        .map_err(|e| WalletError::AuthenticationError(format!("Failed to encode API keys: {}", e)))?;
    std::fs::write(path, data)?;
    Ok(())
}
