#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bitcoin::{Amount, Txid};
use serde_json::json;

use lbry_wallet::{
    AbandonOut, ClaimOptions, ClaimOut, ClaimPayload, LedgerBackend, PaymentOut, RemoteOutcome,
    SupportOut, WalletError, WalletInterface,
};

pub const TXID: &str = "6f8180002ef4d21f5b09ca7d9648a54d213c666daf8639dc283e2fd47450269e";
pub const CLAIM_ID: &str = "fbad4aa1a3e0d47fd8e4a2b8c4d1b4de84e6b3a1";

pub fn lbc(value: &str) -> Amount {
    Amount::from_str_in(value, bitcoin::Denomination::Bitcoin).unwrap()
}

pub fn txid() -> Txid {
    TXID.parse().unwrap()
}

/// How the fake answers the next remote call
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    Reject(String),
    /// `success: false` with no reason attached
    RejectWithoutReason,
    Transport,
    /// Reports success with a result that does not decode
    Garbled,
    /// Never answers; used to drop calls mid-flight
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedClaim {
    pub name: String,
    pub amount: Amount,
    pub payload: ClaimPayload,
    pub options: ClaimOptions,
}

/// In-process `LedgerBackend` with scripted answers and call counters
pub struct FakeLedger {
    balance: Mutex<Amount>,
    script: Mutex<Script>,
    pub fee: Amount,
    pub claims: Mutex<Vec<RecordedClaim>>,
    pub payments: Mutex<Vec<HashMap<String, Amount>>>,
    pub claim_calls: AtomicUsize,
    pub support_calls: AtomicUsize,
    pub abandon_calls: AtomicUsize,
    pub pay_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn new(balance: Amount) -> Arc<Self> {
        Self::with_fee(balance, Amount::ZERO)
    }

    pub fn with_fee(balance: Amount, fee: Amount) -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(balance),
            script: Mutex::new(Script::Succeed),
            fee,
            claims: Mutex::new(Vec::new()),
            payments: Mutex::new(Vec::new()),
            claim_calls: AtomicUsize::new(0),
            support_calls: AtomicUsize::new(0),
            abandon_calls: AtomicUsize::new(0),
            pay_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn set_balance(&self, balance: Amount) {
        *self.balance.lock().unwrap() = balance;
    }

    async fn answer<T>(&self, success: T) -> Result<RemoteOutcome<T>, WalletError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Succeed => Ok(RemoteOutcome::Success(success)),
            Script::Reject(reason) => Ok(RemoteOutcome::Failure { reason }),
            Script::RejectWithoutReason => RemoteOutcome::from_value(json!({ "success": false })),
            Script::Transport => Err(WalletError::TransportError("connection refused".to_string())),
            Script::Garbled => RemoteOutcome::from_value(json!({ "success": true, "fee": "0.1" })),
            Script::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl LedgerBackend for FakeLedger {
    async fn fetch_balance(&self) -> Result<Amount, WalletError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn claim_name(
        &self,
        name: &str,
        amount: Amount,
        payload: &ClaimPayload,
        options: &ClaimOptions,
    ) -> Result<RemoteOutcome<ClaimOut>, WalletError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        self.claims.lock().unwrap().push(RecordedClaim {
            name: name.to_string(),
            amount,
            payload: payload.clone(),
            options: options.clone(),
        });
        let out = ClaimOut {
            claim_id: CLAIM_ID.to_string(),
            txid: txid(),
            nout: 0,
            fee: self.fee,
            value: Some(payload.to_hex()?),
            claim_address: options.claim_address.clone().unwrap_or_default(),
            channel_claim_id: options.certificate_id.clone().unwrap_or_default(),
            channel_name: String::new(),
        };
        self.answer(out).await
    }

    async fn support_claim(
        &self,
        _name: &str,
        _claim_id: &str,
        _amount: Amount,
    ) -> Result<RemoteOutcome<SupportOut>, WalletError> {
        self.support_calls.fetch_add(1, Ordering::SeqCst);
        let out = SupportOut {
            txid: txid(),
            nout: 1,
            fee: self.fee,
        };
        self.answer(out).await
    }

    async fn abandon_claim(
        &self,
        _claim_id: &str,
        _txid: Option<Txid>,
        _nout: Option<u32>,
    ) -> Result<RemoteOutcome<AbandonOut>, WalletError> {
        self.abandon_calls.fetch_add(1, Ordering::SeqCst);
        let out = AbandonOut {
            txid: txid(),
            fee: self.fee,
        };
        self.answer(out).await
    }

    async fn send_to_many(
        &self,
        payments: &HashMap<String, Amount>,
    ) -> Result<RemoteOutcome<PaymentOut>, WalletError> {
        self.pay_calls.fetch_add(1, Ordering::SeqCst);
        self.payments.lock().unwrap().push(payments.clone());
        let out = PaymentOut {
            txid: txid(),
            fee: self.fee,
        };
        self.answer(out).await
    }
}

/// Wallet over a fake ledger whose balance has already been read
pub async fn wallet_with_balance(balance: &str) -> (Arc<WalletInterface>, Arc<FakeLedger>) {
    let fake = FakeLedger::new(lbc(balance));
    let wallet = WalletInterface::new(fake.clone());
    wallet.update_balance().await.unwrap();
    (Arc::new(wallet), fake)
}

pub fn stream_payload() -> ClaimPayload {
    ClaimPayload::from_value(json!({
        "version": "_0_0_1",
        "claimType": "streamType",
        "stream": {
            "metadata": { "title": "test", "license": "LBRY inc" }
        }
    }))
    .unwrap()
}
