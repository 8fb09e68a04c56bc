use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, HOST, USER_AGENT};
use serde_json::Value;
use url::Url;

use super::auth::{signing_message, ApiKey};
use super::config::RpcConfig;
use super::session::{CookieJar, Session, SECRET_HEADER, SESSION_COOKIE};
use super::types::{RpcRequest, RpcResponse, JSONRPC_VERSION};
use crate::error::WalletError;

pub const CLIENT_USER_AGENT: &str = "AuthServiceProxy/0.1";

/// HTTP side of the authenticated daemon client.
///
/// Holds only what never changes after construction; everything that rotates
/// lives in the `Session` passed to each call.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    service_url: Url,
    host: String,
    auth_header: HeaderValue,
}

impl ApiClient {
    /// `key` is the long-term key used for HTTP basic auth on every request
    pub fn new(service_url: Url, key: &ApiKey, timeout: Duration) -> Result<Self, WalletError> {
        let host = service_url
            .host_str()
            .ok_or_else(|| WalletError::ConfigError(format!("No host in {}", service_url)))?
            .to_string();

        let token = general_purpose::STANDARD.encode(format!("{}:{}", key.name(), key.secret()));
        let auth_header = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|e| WalletError::AuthenticationError(format!("auth header encode: {}", e)))?;

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            service_url,
            host,
            auth_header,
        })
    }

    pub fn from_config(config: &RpcConfig, key: &ApiKey) -> Result<Self, WalletError> {
        Self::new(config.service_url()?, key, config.timeout)
    }

    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    fn headers(&self) -> Result<HeaderMap, WalletError> {
        let mut headers = HeaderMap::new();
        let host = HeaderValue::from_str(&self.host)
            .map_err(|e| WalletError::ConfigError(format!("Invalid host {}: {}", self.host, e)))?;
        headers.insert(HOST, host);
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(AUTHORIZATION, self.auth_header.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Unsigned login round trip; the returned session is keyed off the daemon's session id
    pub async fn login(&self) -> Result<Session, WalletError> {
        log::info!("Logging in to {}", self.service_url);
        let resp = self
            .http
            .post(self.service_url.clone())
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| WalletError::TransportError(format!("Login request failed: {}", e)))?;

        let cookies = CookieJar::from_headers(resp.headers());
        let uid = cookies.get(SESSION_COOKIE).ok_or_else(|| {
            log::error!("Login response from {} carried no session cookie", self.service_url);
            WalletError::AuthenticationError(format!("Missing {} cookie", SESSION_COOKIE))
        })?;

        let key = ApiKey::generate(Some(uid.as_bytes()), None);
        log::debug!("Session established, signing as {}", key.name());
        Ok(Session::new(key, cookies))
    }

    /// Start a dotted method path, e.g. `client.service("wallet").call(..., "balance", ...)`
    pub fn service(&self, name: &str) -> ServiceProxy<'_> {
        ServiceProxy {
            client: self,
            path: name.to_string(),
        }
    }

    /// Sign and send one call, rotating the session secret if the daemon hands out a new one
    pub async fn call(&self, session: &mut Session, method: &str, params: Vec<Value>) -> Result<Value, WalletError> {
        let id = session.next_id();
        let hmac = session.key().get_hmac(&signing_message(method, id)?)?;
        let request = RpcRequest {
            version: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id,
            hmac,
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| WalletError::ValidationError(format!("Unserializable params for {}: {}", method, e)))?;

        log::debug!("Calling {} (id {})", method, id);
        let mut builder = self
            .http
            .post(self.service_url.clone())
            .headers(self.headers()?)
            .body(body);
        if let Some(cookie) = session.cookies().header_value() {
            builder = builder.header(COOKIE, cookie);
        }

        let resp = builder.send().await.map_err(|e| {
            WalletError::TransportError(format!("missing HTTP response from server (code -342): {}", e))
        })?;

        let next_secret = resp
            .headers()
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|secret| !secret.is_empty())
            .map(str::to_string);
        if let Some(secret) = next_secret {
            log::debug!("Adopting rotated session secret after {}", method);
            session.rotate(secret, CookieJar::from_headers(resp.headers()));
        }

        if !resp.status().is_success() {
            log::error!("{} returned HTTP {}", method, resp.status());
            return Err(WalletError::TransportError(format!("{} HTTP {}", method, resp.status())));
        }

        let response: RpcResponse = serde_json::from_slice(&resp.bytes().await?)?;
        match response.error {
            Some(error) if !error.is_null() => {
                log::warn!("{} returned an error: {}", method, error);
                Err(WalletError::ProtocolError(error))
            }
            _ => response.result.ok_or(WalletError::MissingResult),
        }
    }
}

/// A client bound to a dotted service path. Extending the path is cheap and
/// every proxy shares the same `ApiClient`.
#[derive(Clone)]
pub struct ServiceProxy<'a> {
    client: &'a ApiClient,
    path: String,
}

impl<'a> ServiceProxy<'a> {
    pub fn service(&self, name: &str) -> ServiceProxy<'a> {
        ServiceProxy {
            client: self.client,
            path: format!("{}.{}", self.path, name),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method_name(&self, method: &str) -> String {
        format!("{}.{}", self.path, method)
    }

    pub async fn call(&self, session: &mut Session, method: &str, params: Vec<Value>) -> Result<Value, WalletError> {
        self.client.call(session, &self.method_name(method), params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        let url = Url::parse("http://localhost:5279/lbryapi").unwrap();
        ApiClient::new(url, &ApiKey::new("api", "secret"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn method_paths_compose_with_dots() {
        let client = client();
        let wallet = client.service("wallet");
        let nested = wallet.service("claims");

        assert_eq!(wallet.path(), "wallet");
        assert_eq!(nested.method_name("list"), "wallet.claims.list");
        assert_eq!(wallet.method_name("balance"), "wallet.balance");
    }

    #[test]
    fn fixed_headers_match_the_wire_format() {
        let headers = client().headers().unwrap();
        assert_eq!(headers[HOST], "localhost");
        assert_eq!(headers[USER_AGENT], CLIENT_USER_AGENT);
        assert_eq!(headers[AUTHORIZATION], "Basic YXBpOnNlY3JldA==");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }
}
