use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{Amount, Txid};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use super::config::WalletConfig;
use super::payload::ClaimPayload;
use super::types::{
    format_amount, parse_amount, AbandonOut, ClaimOptions, ClaimOut, PaymentOut, RemoteOutcome,
    SupportOut,
};
use crate::error::WalletError;
use crate::rpc::deserialize_present;

/// Remote ledger operations the wallet drives.
///
/// Each call either fails at the transport layer (`Err`) or returns the remote's
/// verdict as a `RemoteOutcome`.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Confirmed balance as currently seen by the ledger
    async fn fetch_balance(&self) -> Result<Amount, WalletError>;

    async fn claim_name(
        &self,
        name: &str,
        amount: Amount,
        payload: &ClaimPayload,
        options: &ClaimOptions,
    ) -> Result<RemoteOutcome<ClaimOut>, WalletError>;

    async fn support_claim(
        &self,
        name: &str,
        claim_id: &str,
        amount: Amount,
    ) -> Result<RemoteOutcome<SupportOut>, WalletError>;

    async fn abandon_claim(
        &self,
        claim_id: &str,
        txid: Option<Txid>,
        nout: Option<u32>,
    ) -> Result<RemoteOutcome<AbandonOut>, WalletError>;

    /// Pay several addresses in a single transaction
    async fn send_to_many(
        &self,
        payments: &HashMap<String, Amount>,
    ) -> Result<RemoteOutcome<PaymentOut>, WalletError>;
}

/// Ledger backend talking JSON-RPC 2.0 to a wallet daemon over HTTP
#[derive(Clone)]
pub struct RpcLedgerBackend {
    url: Url,
    client: reqwest::Client,
}

impl RpcLedgerBackend {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, WalletError> {
        let url = Url::parse(url)
            .map_err(|e| WalletError::ConfigError(format!("Invalid ledger url {}: {}", url, e)))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { url, client })
    }

    pub fn from_config(config: &WalletConfig) -> Result<Self, WalletError> {
        Self::new(&config.ledger_url, config.timeout)
    }

    async fn json_rpc(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        #[derive(Serialize)]
        struct Request<'a> {
            jsonrpc: &'a str,
            id: u64,
            method: &'a str,
            params: Value,
        }

        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default, deserialize_with = "deserialize_present")]
            result: Option<Value>,
            #[serde(default)]
            error: Option<Value>,
        }

        log::debug!("Calling ledger method {}", method);
        let request = Request {
            jsonrpc: "2.0",
            id: 0,
            method,
            params,
        };
        let resp = self.client.post(self.url.clone()).json(&request).send().await?;
        if !resp.status().is_success() {
            log::error!("Ledger method {} returned HTTP {}", method, resp.status());
            return Err(WalletError::TransportError(format!(
                "{} HTTP {}",
                method,
                resp.status()
            )));
        }

        let envelope: Envelope = serde_json::from_slice(&resp.bytes().await?)?;
        match envelope.error {
            Some(error) if !error.is_null() => {
                log::error!("Ledger method {} returned an error", method);
                Err(WalletError::ProtocolError(error))
            }
            _ => envelope.result.ok_or(WalletError::MissingResult),
        }
    }
}

#[async_trait]
impl LedgerBackend for RpcLedgerBackend {
    async fn fetch_balance(&self) -> Result<Amount, WalletError> {
        let result = self.json_rpc("getbalance", json!([])).await?;
        let confirmed = result.get("confirmed").unwrap_or(&result);
        parse_amount(confirmed).map_err(WalletError::TransportError)
    }

    async fn claim_name(
        &self,
        name: &str,
        amount: Amount,
        payload: &ClaimPayload,
        options: &ClaimOptions,
    ) -> Result<RemoteOutcome<ClaimOut>, WalletError> {
        let params = json!([
            name,
            payload.to_hex()?,
            format_amount(amount),
            options.certificate_id,
            options.claim_address,
            options.change_address,
        ]);
        RemoteOutcome::from_value(self.json_rpc("claim", params).await?)
    }

    async fn support_claim(
        &self,
        name: &str,
        claim_id: &str,
        amount: Amount,
    ) -> Result<RemoteOutcome<SupportOut>, WalletError> {
        let params = json!([name, claim_id, format_amount(amount)]);
        RemoteOutcome::from_value(self.json_rpc("support", params).await?)
    }

    async fn abandon_claim(
        &self,
        claim_id: &str,
        txid: Option<Txid>,
        nout: Option<u32>,
    ) -> Result<RemoteOutcome<AbandonOut>, WalletError> {
        let params = json!([claim_id, txid.map(|t| t.to_string()), nout]);
        RemoteOutcome::from_value(self.json_rpc("abandon", params).await?)
    }

    async fn send_to_many(
        &self,
        payments: &HashMap<String, Amount>,
    ) -> Result<RemoteOutcome<PaymentOut>, WalletError> {
        let outputs: Vec<Value> = payments
            .iter()
            .map(|(address, amount)| json!([address, format_amount(*amount)]))
            .collect();
        RemoteOutcome::from_value(self.json_rpc("paytomany", json!([outputs])).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const TXID: &str = "11030a76521e5f552ca87ad70765d0cc52e6ea4c0dc0063335e6cf2a9a85085f";

    fn backend(server: &MockServer) -> RpcLedgerBackend {
        RpcLedgerBackend::new(&server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_balance_reads_confirmed() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("getbalance");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"jsonrpc": "2.0", "id": 0, "result": {"confirmed": "5.0", "unconfirmed": "1.5"}}));
            })
            .await;

        let balance = backend(&server).fetch_balance().await.unwrap();
        mock.assert_async().await;
        assert_eq!(balance, Amount::from_sat(500_000_000));
    }

    #[tokio::test]
    async fn support_failure_is_an_outcome_not_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("\"support\"");
                then.status(200)
                    .json_body(json!({"result": {"success": false, "reason": "Not enough funds"}}));
            })
            .await;

        let outcome = backend(&server)
            .support_claim("test", "f43dc06256a69988bdbea09a58c80493ba15dcfa", Amount::ONE_BTC)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RemoteOutcome::Failure {
                reason: "Not enough funds".to_string()
            }
        );
    }

    #[tokio::test]
    async fn abandon_success_is_typed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("\"abandon\"");
                then.status(200)
                    .json_body(json!({"result": {"success": true, "txid": TXID, "fee": "0.000096"}}));
            })
            .await;

        let outcome = backend(&server)
            .abandon_claim("f43dc06256a69988bdbea09a58c80493ba15dcfa", None, None)
            .await
            .unwrap();
        let out = outcome.into_result("abandon").unwrap();
        assert_eq!(out.txid.to_string(), TXID);
        assert_eq!(out.fee, Amount::from_sat(9_600));
    }

    #[tokio::test]
    async fn claim_sends_hex_payload_and_strips_success() {
        let server = MockServer::start_async().await;
        let payload = ClaimPayload::from_value(json!({"stream": {"metadata": {"title": "t"}}})).unwrap();
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .body_contains("\"claim\"")
                    .body_contains(payload.to_hex().unwrap())
                    .body_contains("\"channel\"");
                then.status(200).json_body(json!({"result": {
                    "success": true,
                    "claim_id": "f43dc06256a69988bdbea09a58c80493ba15dcfa",
                    "txid": TXID,
                    "nout": 1,
                    "fee": 0.0001
                }}));
            })
            .await;

        let options = ClaimOptions {
            certificate_id: Some("channel".to_string()),
            ..ClaimOptions::default()
        };
        let claim = backend(&server)
            .claim_name("test", Amount::ONE_BTC, &payload, &options)
            .await
            .unwrap()
            .into_result("claim")
            .unwrap();

        mock.assert_async().await;
        assert_eq!(claim.outpoint().to_string(), format!("{}:1", TXID));
        assert_eq!(claim.fee, Amount::from_sat(10_000));
        assert!(!serde_json::to_value(&claim).unwrap().as_object().unwrap().contains_key("success"));
    }

    #[tokio::test]
    async fn send_to_many_pays_every_address() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .body_contains("\"paytomany\"")
                    .body_contains("bFirstAddress")
                    .body_contains("bSecondAddress");
                then.status(200)
                    .json_body(json!({"result": {"success": true, "txid": TXID}}));
            })
            .await;

        let payments = HashMap::from([
            ("bFirstAddress".to_string(), Amount::ONE_BTC),
            ("bSecondAddress".to_string(), Amount::from_sat(50_000_000)),
        ]);
        let paid = backend(&server)
            .send_to_many(&payments)
            .await
            .unwrap()
            .into_result("paytomany")
            .unwrap();

        mock.assert_async().await;
        assert_eq!(paid.fee, Amount::ZERO);
    }

    #[tokio::test]
    async fn null_result_is_not_a_missing_result() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("\"nullish\"");
                then.status(200).json_body(json!({"jsonrpc": "2.0", "id": 0, "result": null}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("\"absent\"");
                then.status(200).json_body(json!({"jsonrpc": "2.0", "id": 0}));
            })
            .await;

        let backend = backend(&server);
        assert_eq!(backend.json_rpc("nullish", json!([])).await.unwrap(), Value::Null);
        assert!(matches!(
            backend.json_rpc("absent", json!([])).await,
            Err(WalletError::MissingResult)
        ));
    }

    #[tokio::test]
    async fn http_failure_is_a_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(500).body("boom");
            })
            .await;

        let err = backend(&server).fetch_balance().await.unwrap_err();
        match err {
            WalletError::TransportError(msg) => assert!(msg.contains("HTTP 500")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn rpc_error_is_a_protocol_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .json_body(json!({"result": null, "error": {"code": -32601, "message": "Method not found"}}));
            })
            .await;

        let err = backend(&server).fetch_balance().await.unwrap_err();
        match err {
            WalletError::ProtocolError(payload) => assert_eq!(payload["code"], -32601),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
