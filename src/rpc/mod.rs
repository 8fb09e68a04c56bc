mod auth;
mod client;
mod config;
mod session;
mod types;

pub use auth::{load_api_keys, save_api_keys, select_api_key, signing_message, ApiKey};
pub use client::{ApiClient, ServiceProxy, CLIENT_USER_AGENT};
pub use config::{RpcAuth, RpcConfig, DEFAULT_API_PORT, DEFAULT_KEY_NAME};
pub use session::{CookieJar, Session, SECRET_HEADER, SESSION_COOKIE};
pub use types::*;
pub(crate) use types::deserialize_present;
