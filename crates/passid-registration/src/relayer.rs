//! # Relayer Client
//!
//! Every Registration contract write goes through the registration relayer,
//! which signs and broadcasts the transaction and answers with its hash.
//!
//! ## Wire Format
//!
//! `POST {base}/integrations/registration-relayer/v1/register`
//!
//! ```json
//! { "data": { "tx_data": "0x…", "destination": "0x…" } }
//! ```
//!
//! The response carries `tx_hash` at the top level, under `data`, or under
//! `data.attributes` depending on the relayer version.
//!
//! A submission is sent once. It is resent only if the connection was
//! refused; a timeout surfaces as [`RemoteError::SubmissionTimedOut`] and
//! the transaction may or may not have been broadcast.

use std::time::Duration;

use async_trait::async_trait;
use passid_core::{encode_hex, Hash32};
use serde::Serialize;

use crate::abi::Address;
use crate::chain::TxHash;
use crate::error::RemoteError;
use crate::retry::{send_with_retry, Failure, RequestKind};

const REGISTER_PATH: &str = "integrations/registration-relayer/v1/register";

/// A transaction for the relayer to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub tx_data: Vec<u8>,
    pub destination: Address,
}

#[derive(Serialize)]
struct RegisterBody {
    data: RegisterData,
}

#[derive(Serialize)]
struct RegisterData {
    tx_data: String,
    destination: String,
}

/// Submission side of the registry.
#[async_trait]
pub trait Relayer: Send + Sync {
    async fn submit(&self, request: &TxRequest) -> Result<TxHash, RemoteError>;
}

/// HTTP relayer client.
#[derive(Debug, Clone)]
pub struct HttpRelayer {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpRelayer {
    pub fn new(
        base_url: &url::Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let endpoint = format!(
            "{}/{REGISTER_PATH}",
            base_url.as_str().trim_end_matches('/')
        );
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| RemoteError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Find `tx_hash` in any of the known response shapes.
fn extract_tx_hash(body: &serde_json::Value) -> Option<&str> {
    [
        body.get("tx_hash"),
        body.pointer("/data/tx_hash"),
        body.pointer("/data/attributes/tx_hash"),
    ]
    .into_iter()
    .flatten()
    .find_map(|v| v.as_str())
}

#[async_trait]
impl Relayer for HttpRelayer {
    async fn submit(&self, request: &TxRequest) -> Result<TxHash, RemoteError> {
        let body = RegisterBody {
            data: RegisterData {
                tx_data: encode_hex(&request.tx_data),
                destination: encode_hex(request.destination.as_slice()),
            },
        };
        tracing::debug!(
            endpoint = %self.endpoint,
            destination = %request.destination,
            bytes = request.tx_data.len(),
            "submitting transaction to relayer"
        );

        let resp = send_with_retry(RequestKind::Write, &self.endpoint, || {
            let mut req = self.http.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }
            req.send()
        })
        .await
        .map_err(|source| match Failure::classify(&source) {
            Failure::Timeout => {
                tracing::warn!(endpoint = %self.endpoint, "relayer did not answer before the deadline");
                RemoteError::SubmissionTimedOut {
                    endpoint: self.endpoint.clone(),
                }
            }
            _ => RemoteError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            },
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| RemoteError::Malformed {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        let raw = extract_tx_hash(&json).ok_or_else(|| RemoteError::Malformed {
            endpoint: self.endpoint.clone(),
            reason: "response has no tx_hash".to_string(),
        })?;
        Hash32::from_hex(raw).map_err(|e| RemoteError::Malformed {
            endpoint: self.endpoint.clone(),
            reason: format!("tx_hash {raw:?}: {e}"),
        })
    }
}
