use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};

use super::auth::ApiKey;
use crate::error::WalletError;

/// Session cookie set by the daemon on login
pub const SESSION_COOKIE: &str = "TWISTED_SESSION";
/// Header (and cookie) carrying the next session secret
pub const SECRET_HEADER: &str = "LBRY_SECRET";

/// Cookies carried between calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cookies set by a response's `Set-Cookie` headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let pair = value.split(';').next().unwrap_or_default();
            if let Some((name, cookie)) = pair.split_once('=') {
                jar.insert(name.trim(), cookie.trim());
            }
        }
        jar
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn merge(&mut self, other: CookieJar) {
        self.cookies.extend(other.cookies);
    }

    /// Value for a `Cookie` request header, if there is anything to send
    pub fn header_value(&self) -> Option<HeaderValue> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }
}

/// Authenticated session state: the current signing key, cookies and request counter.
///
/// Callers own the session and lend it to each call, so calls on one session are
/// serialized by the borrow checker.
#[derive(Debug, Clone)]
pub struct Session {
    key: ApiKey,
    cookies: CookieJar,
    id_count: u64,
}

impl Session {
    pub fn new(key: ApiKey, cookies: CookieJar) -> Self {
        Self {
            key,
            cookies,
            id_count: 0,
        }
    }

    /// Pick up a session from a jar that already carries its secret
    pub fn resume(cookies: CookieJar, key_name: &str) -> Result<Self, WalletError> {
        let secret = cookies
            .get(SECRET_HEADER)
            .ok_or_else(|| WalletError::AuthenticationError(format!("Missing {} cookie", SECRET_HEADER)))?
            .to_string();
        Ok(Self::new(ApiKey::new(key_name, secret), cookies))
    }

    pub fn key(&self) -> &ApiKey {
        &self.key
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Number of calls issued so far, which is also the id of the last one
    pub fn request_count(&self) -> u64 {
        self.id_count
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        self.id_count += 1;
        self.id_count
    }

    /// Adopt the secret a response handed over, along with the cookies it set
    pub fn rotate(&mut self, secret: impl Into<String>, cookies: CookieJar) {
        self.key = ApiKey::new(self.key.name().to_string(), secret);
        self.cookies.merge(cookies);
    }
}
