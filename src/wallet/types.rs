//! Common types used in the wallet module

use std::fmt;
use std::str::FromStr;

use bitcoin::{Amount, Denomination, OutPoint, Txid};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WalletError;

/// Funds provisionally held for one pending operation.
///
/// Only the ledger hands these out, and releasing or spending one consumes it,
/// so a hold can be settled at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation holds funds until it is cancelled or sent"]
pub struct Reservation {
    identifier: String,
    amount: Amount,
}

impl Reservation {
    pub(crate) fn new(identifier: String, amount: Amount) -> Self {
        Self { identifier, amount }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// `txid:nout` of a confirmed claim output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClaimOutpoint(OutPoint);

impl ClaimOutpoint {
    pub fn new(txid: Txid, nout: u32) -> Self {
        Self(OutPoint::new(txid, nout))
    }

    pub fn txid(&self) -> Txid {
        self.0.txid
    }

    pub fn nout(&self) -> u32 {
        self.0.vout
    }
}

impl fmt::Display for ClaimOutpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.txid, self.0.vout)
    }
}

impl FromStr for ClaimOutpoint {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, nout) = s
            .split_once(':')
            .ok_or_else(|| WalletError::ValidationError(format!("Invalid outpoint: {}", s)))?;
        let txid = Txid::from_str(txid)
            .map_err(|e| WalletError::ValidationError(format!("Invalid outpoint txid {}: {}", txid, e)))?;
        let nout = nout
            .parse::<u32>()
            .map_err(|e| WalletError::ValidationError(format!("Invalid outpoint index {}: {}", nout, e)))?;
        Ok(Self::new(txid, nout))
    }
}

/// Result of a successful name claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimOut {
    pub claim_id: String,
    pub txid: Txid,
    pub nout: u32,
    #[serde(deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub fee: Amount,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub claim_address: String,
    #[serde(default)]
    pub channel_claim_id: String,
    #[serde(default)]
    pub channel_name: String,
}

impl ClaimOut {
    pub fn outpoint(&self) -> ClaimOutpoint {
        ClaimOutpoint::new(self.txid, self.nout)
    }
}

/// Result of a successful support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportOut {
    pub txid: Txid,
    pub nout: u32,
    #[serde(deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub fee: Amount,
}

impl SupportOut {
    pub fn outpoint(&self) -> ClaimOutpoint {
        ClaimOutpoint::new(self.txid, self.nout)
    }
}

/// Result of a successful abandon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbandonOut {
    pub txid: Txid,
    #[serde(deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub fee: Amount,
}

/// Result of paying out the queued payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOut {
    pub txid: Txid,
    #[serde(
        default = "zero_amount",
        deserialize_with = "deserialize_amount",
        serialize_with = "serialize_amount"
    )]
    pub fee: Amount,
}

/// Remote results that spend funds carry the fee they paid
pub(crate) trait Spend {
    fn fee(&self) -> Amount;
}

impl Spend for ClaimOut {
    fn fee(&self) -> Amount {
        self.fee
    }
}

impl Spend for SupportOut {
    fn fee(&self) -> Amount {
        self.fee
    }
}

/// Outcome of a remote ledger operation that completed without a transport error.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome<T> {
    Success(T),
    Failure { reason: String },
}

impl<T: DeserializeOwned> RemoteOutcome<T> {
    /// Decide success or failure from a raw result object. The `success` flag
    /// is stripped here and never reaches the typed result.
    pub fn from_value(mut value: Value) -> Result<Self, WalletError> {
        let success = match value.as_object_mut() {
            Some(object) => object.remove("success"),
            None => {
                return Err(WalletError::TransportError(format!(
                    "Expected a result object, got {}",
                    value
                )))
            }
        };

        if success != Some(Value::Bool(true)) {
            let reason = value
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown reason")
                .to_string();
            return Ok(RemoteOutcome::Failure { reason });
        }

        serde_json::from_value(value)
            .map(RemoteOutcome::Success)
            .map_err(|e| WalletError::MalformedSuccess(e.to_string()))
    }
}

impl<T> RemoteOutcome<T> {
    /// Turn a failure into `RemoteOperationFailed` for `operation`
    pub fn into_result(self, operation: &str) -> Result<T, WalletError> {
        match self {
            RemoteOutcome::Success(out) => Ok(out),
            RemoteOutcome::Failure { reason } => Err(WalletError::remote_failure(operation, reason)),
        }
    }
}

/// Optional overrides for a name claim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimOptions {
    pub certificate_id: Option<String>,
    pub claim_address: Option<String>,
    pub change_address: Option<String>,
}

/// Parse a ledger amount given either as a decimal string or a JSON number
pub(crate) fn parse_amount(value: &Value) -> Result<Amount, String> {
    match value {
        Value::String(s) => Amount::from_str_in(s.trim(), Denomination::Bitcoin)
            .map_err(|e| format!("invalid amount {}: {}", s, e)),
        Value::Number(n) => {
            let btc = n
                .as_f64()
                .ok_or_else(|| format!("invalid amount {}", n))?;
            Amount::from_btc(btc).map_err(|e| format!("invalid amount {}: {}", n, e))
        }
        other => Err(format!("expected a decimal amount, got {}", other)),
    }
}

/// Sum that clamps at `Amount::MAX` instead of panicking; fees come from the remote side
pub(crate) fn add_amounts(a: Amount, b: Amount) -> Amount {
    a.checked_add(b).unwrap_or_else(|| {
        log::warn!("Amount overflow adding {} and {}; clamping", a, b);
        Amount::MAX
    })
}

/// Decimal string the ledger daemon expects for an amount
pub(crate) fn format_amount(amount: Amount) -> String {
    amount.to_string_in(Denomination::Bitcoin)
}

fn zero_amount() -> Amount {
    Amount::ZERO
}

fn deserialize_amount<'de, D>(deserializer: D) -> Result<Amount, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_amount(&value).map_err(de::Error::custom)
}

fn serialize_amount<S>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_amount(*amount))
}
