//! # On-Chain Reads
//!
//! The [`RegistryReader`] trait is the read side of the registry: passport
//! bindings from the StateKeeper, certificate inclusion from the
//! certificates SMT, and transaction receipts. [`JsonRpcRegistryReader`]
//! implements it over EVM JSON-RPC (`eth_call`,
//! `eth_getTransactionReceipt`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use passid_core::{decode_hex, encode_hex, Hash32};
use serde::{Deserialize, Serialize};

use crate::abi::{b256, hash32, Address, PoseidonSMT, SolCall, StateKeeper};
use crate::error::RemoteError;
use crate::retry::{send_with_retry, RequestKind};

/// Transaction hash.
pub type TxHash = Hash32;

/// `activeIdentity` value the StateKeeper stores after a revocation:
/// `keccak256("REVOKED")`.
pub fn revoked_sentinel() -> Hash32 {
    passid_core::keccak256_str("REVOKED")
}

/// Passport binding as stored by the StateKeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PassportInfo {
    /// Identity key hash the passport is bound to; zero if never bound,
    /// [`revoked_sentinel`] after revocation.
    pub active_identity: Hash32,
    pub identity_reissue_counter: u64,
    /// Passport currently bound to `active_identity`.
    pub active_passport: Hash32,
    pub issue_timestamp: u64,
}

impl PassportInfo {
    pub fn is_unregistered(&self) -> bool {
        self.active_identity.is_zero()
    }

    pub fn is_revoked(&self) -> bool {
        self.active_identity == revoked_sentinel()
    }

    /// Decode `getPassportInfo` return data: two static structs, four words.
    pub fn decode(data: &[u8]) -> Result<Self, RemoteError> {
        let ret = StateKeeper::getPassportInfoCall::abi_decode_returns(data, true)
            .map_err(crate::abi::AbiError::from)?;
        Ok(Self {
            active_identity: hash32(&ret.passportInfo.activeIdentity),
            identity_reissue_counter: ret.passportInfo.identityReissueCounter,
            active_passport: hash32(&ret.identityInfo.activePassport),
            issue_timestamp: ret.identityInfo.issueTimestamp,
        })
    }
}

/// Sparse Merkle tree proof returned by the certificates SMT.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CertificateProof {
    pub root: Hash32,
    pub siblings: Vec<Hash32>,
    pub existence: bool,
    pub key: Hash32,
    pub value: Hash32,
    pub aux_existence: bool,
    pub aux_key: Hash32,
    pub aux_value: Hash32,
}

impl CertificateProof {
    /// Decode `getProof` return data (a single dynamic struct).
    pub fn decode(data: &[u8]) -> Result<Self, RemoteError> {
        let proof = PoseidonSMT::getProofCall::abi_decode_returns(data, true)
            .map_err(crate::abi::AbiError::from)?
            .proof;
        Ok(Self {
            root: hash32(&proof.root),
            siblings: proof.siblings.iter().map(hash32).collect(),
            existence: proof.existence,
            key: hash32(&proof.key),
            value: hash32(&proof.value),
            aux_existence: proof.auxExistence,
            aux_key: hash32(&proof.auxKey),
            aux_value: hash32(&proof.auxValue),
        })
    }
}

/// Final state of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Result of a bounded receipt wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptWait {
    Mined(ReceiptStatus),
    /// No receipt before the deadline. The transaction may still land.
    TimedOut,
}

/// Read access to the registry contracts.
#[async_trait]
pub trait RegistryReader: Send + Sync {
    /// `StateKeeper.getPassportInfo(key)`.
    async fn get_passport_info(&self, key: &Hash32) -> Result<PassportInfo, RemoteError>;

    /// `CertificatesSMT.getProof(index)`.
    async fn get_certificate_proof(&self, index: &Hash32)
        -> Result<CertificateProof, RemoteError>;

    /// Receipt status, or `None` while the transaction is pending.
    async fn transaction_receipt(&self, tx: &TxHash) -> Result<Option<ReceiptStatus>, RemoteError>;

    /// Poll [`transaction_receipt`](Self::transaction_receipt) every
    /// `poll` until it reports a status or `timeout` elapses.
    async fn wait_for_receipt(
        &self,
        tx: &TxHash,
        poll: Duration,
        timeout: Duration,
    ) -> Result<ReceiptWait, RemoteError> {
        let polling = async {
            loop {
                if let Some(status) = self.transaction_receipt(tx).await? {
                    return Ok::<_, RemoteError>(status);
                }
                tokio::time::sleep(poll).await;
            }
        };
        match tokio::time::timeout(timeout, polling).await {
            Ok(status) => status.map(ReceiptWait::Mined),
            Err(_) => Ok(ReceiptWait::TimedOut),
        }
    }
}

/// [`RegistryReader`] over EVM JSON-RPC.
#[derive(Debug)]
pub struct JsonRpcRegistryReader {
    client: reqwest::Client,
    rpc_url: String,
    state_keeper: Address,
    certificates_smt: Address,
    next_id: AtomicU64,
}

impl JsonRpcRegistryReader {
    pub fn new(
        rpc_url: &url::Url,
        state_keeper: Address,
        certificates_smt: Address,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let endpoint = rpc_url.to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| RemoteError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(Self {
            client,
            rpc_url: endpoint,
            state_keeper,
            certificates_smt,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RemoteError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        let resp = send_with_retry(RequestKind::Read, &self.rpc_url, || {
            self.client.post(&self.rpc_url).json(&body).send()
        })
        .await
        .map_err(|source| RemoteError::Transport {
            endpoint: self.rpc_url.clone(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                endpoint: self.rpc_url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| RemoteError::Malformed {
            endpoint: self.rpc_url.clone(),
            reason: e.to_string(),
        })?;

        if let Some(error) = json.get("error") {
            return Err(RemoteError::Rpc {
                code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown RPC error")
                    .to_string(),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| RemoteError::Malformed {
                endpoint: self.rpc_url.clone(),
                reason: format!("{method} response missing 'result'"),
            })
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, RemoteError> {
        let result = self
            .rpc_call(
                "eth_call",
                serde_json::json!([{ "to": encode_hex(to.as_slice()), "data": encode_hex(&data) }, "latest"]),
            )
            .await?;
        let hex = result.as_str().ok_or_else(|| RemoteError::Malformed {
            endpoint: self.rpc_url.clone(),
            reason: "eth_call returned non-string result".to_string(),
        })?;
        decode_hex(hex).map_err(|e| RemoteError::Malformed {
            endpoint: self.rpc_url.clone(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl RegistryReader for JsonRpcRegistryReader {
    async fn get_passport_info(&self, key: &Hash32) -> Result<PassportInfo, RemoteError> {
        let out = self
            .eth_call(
                self.state_keeper,
                StateKeeper::getPassportInfoCall { passportKey: b256(key) }.abi_encode(),
            )
            .await?;
        PassportInfo::decode(&out)
    }

    async fn get_certificate_proof(
        &self,
        index: &Hash32,
    ) -> Result<CertificateProof, RemoteError> {
        let out = self
            .eth_call(
                self.certificates_smt,
                PoseidonSMT::getProofCall { key: b256(index) }.abi_encode(),
            )
            .await?;
        CertificateProof::decode(&out)
    }

    async fn transaction_receipt(&self, tx: &TxHash) -> Result<Option<ReceiptStatus>, RemoteError> {
        let receipt = self
            .rpc_call("eth_getTransactionReceipt", serde_json::json!([tx.to_hex()]))
            .await?;

        // Null receipt means the transaction is still pending.
        if receipt.is_null() {
            return Ok(None);
        }

        match receipt.get("status").and_then(|s| s.as_str()) {
            Some("0x1") => Ok(Some(ReceiptStatus::Success)),
            Some("0x0") => Ok(Some(ReceiptStatus::Reverted)),
            other => Err(RemoteError::Malformed {
                endpoint: self.rpc_url.clone(),
                reason: format!("unexpected receipt status {other:?}"),
            }),
        }
    }
}
