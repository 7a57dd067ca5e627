// SPDX-License-Identifier: Apache-2.0
//! safe-rpc
//!
//! Minimal, blocking HTTP client for the safe transaction API.
//! Endpoints used:
//! - GET  /safe/outputs                 (unspent output listing)
//! - POST /safe/keys                    (ghost key requests)
//! - POST /safe/transaction/requests    (sequencer verify)
//! - POST /safe/transactions            (sequencer submit)
//!
//! Every response is the `{data, error}` envelope; this crate returns it
//! as-is and leaves entry-count and error-code policy to the caller.
//! Raw transactions travel hex-encoded and are never re-serialized here.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub mod auth;
pub mod context;

pub use auth::{request_digest, SessionSigner, TokenClaims};
pub use context::CallContext;

pub const PATH_OUTPUTS: &str = "/safe/outputs";
pub const PATH_GHOST_KEYS: &str = "/safe/keys";
pub const PATH_TRANSACTION_REQUESTS: &str = "/safe/transaction/requests";
pub const PATH_TRANSACTIONS: &str = "/safe/transactions";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("call cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl RpcError {
    /// Timeouts, connection failures and server-side 5xx/429 are safe to re-issue.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RpcError::Status { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            _ => false,
        }
    }
}

/// Error object carried inside a response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiError {
    pub status: u16,
    pub code: i64,
    pub description: String,
}

/// `{data: [...], error: {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "Option::default")]
    pub data: Option<Vec<T>>,
    #[serde(default = "Option::default")]
    pub error: Option<ApiError>,
}

impl<T> Envelope<T> {
    /// The error object, if it carries a non-zero code.
    pub fn api_error(&self) -> Option<&ApiError> {
        self.error.as_ref().filter(|e| e.code > 0)
    }

    pub fn into_entries(self) -> Vec<T> {
        self.data.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UnspentOutputEntry {
    pub output_id: String,
    pub transaction_hash: String,
    pub output_index: u32,
    /// Kernel asset hash (hex).
    pub asset: String,
    /// Decimal amount string.
    pub amount: String,
    pub sequence: u64,
    pub state: String,
}

/// Query for `GET /safe/outputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputsQuery {
    pub members_hash: String,
    pub threshold: u8,
    pub asset: String,
    pub offset: u64,
    pub limit: u32,
}

impl OutputsQuery {
    fn to_uri(&self) -> String {
        format!(
            "{PATH_OUTPUTS}?members={}&threshold={}&asset={}&state=unspent&offset={}&limit={}",
            self.members_hash, self.threshold, self.asset, self.offset, self.limit
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GhostKeyRequest {
    pub receivers: Vec<String>,
    pub index: u32,
    pub hint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GhostKeysEntry {
    pub mask: String,
    pub keys: Vec<String>,
}

/// One entry of a verify or submit request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub request_id: String,
    /// Hex-encoded raw transaction.
    pub raw: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SequencerEntry {
    pub request_id: String,
    pub raw_transaction: String,
    pub state: String,
    pub views: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL like "https://api.mixin.one".
    pub base_url: String,
    /// Upper bound for any single request; a call deadline may shorten it.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mixin.one".to_string(),
            timeout: Duration::from_secs(20),
            user_agent: concat!("safe-rpc/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SafeClient {
    base: Url,
    client: Client,
    timeout: Duration,
    session: Option<Arc<SessionSigner>>,
}

impl SafeClient {
    /// Create a new client. Without a session, requests go out unauthenticated.
    pub fn new(config: &ClientConfig, session: Option<SessionSigner>) -> Result<Self, RpcError> {
        let base = Url::parse(&config.base_url)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base,
            client,
            timeout: config.timeout,
            session: session.map(Arc::new),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn send<R: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: Method,
        uri: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Envelope<R>, RpcError> {
        let timeout = match ctx.remaining()? {
            Some(left) => left.min(self.timeout),
            None => self.timeout,
        };
        let url = self.base.join(uri)?;
        let mut request = self.client.request(method.clone(), url).timeout(timeout);
        if let Some(session) = &self.session {
            let token =
                session.sign_token(method.as_str(), uri, body.as_deref().unwrap_or_default())?;
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        tracing::debug!(%method, uri, "safe api request");
        let resp = request.send()?;
        let status = resp.status();
        let bytes = resp.bytes()?;
        let status_error = || RpcError::Status {
            path: uri.split('?').next().unwrap_or(uri).to_string(),
            status: status.as_u16(),
        };
        let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
        match serde_json::from_slice::<Envelope<R>>(&bytes) {
            // Gateway JSON bodies parse as empty envelopes.
            Ok(envelope) if retryable && envelope.api_error().is_none() => Err(status_error()),
            Ok(envelope) => Ok(envelope),
            Err(e) if status.is_success() => Err(RpcError::Decode(format!("{uri}: {e}"))),
            Err(_) => Err(status_error()),
        }
    }

    fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
        body: &B,
    ) -> Result<Envelope<R>, RpcError> {
        let body = serde_json::to_vec(body)
            .map_err(|e| RpcError::Decode(format!("{path} request encode: {e}")))?;
        self.send(ctx, Method::POST, path, Some(body))
    }

    /// GET /safe/outputs
    pub fn list_unspent_outputs(
        &self,
        ctx: &CallContext,
        query: &OutputsQuery,
    ) -> Result<Envelope<UnspentOutputEntry>, RpcError> {
        self.send(ctx, Method::GET, &query.to_uri(), None)
    }

    /// POST /safe/keys
    pub fn request_ghost_keys(
        &self,
        ctx: &CallContext,
        requests: &[GhostKeyRequest],
    ) -> Result<Envelope<GhostKeysEntry>, RpcError> {
        self.post(ctx, PATH_GHOST_KEYS, requests)
    }

    /// POST /safe/transaction/requests
    pub fn create_transaction_requests(
        &self,
        ctx: &CallContext,
        requests: &[TransactionRequest],
    ) -> Result<Envelope<SequencerEntry>, RpcError> {
        self.post(ctx, PATH_TRANSACTION_REQUESTS, requests)
    }

    /// POST /safe/transactions
    pub fn submit_transactions(
        &self,
        ctx: &CallContext,
        requests: &[TransactionRequest],
    ) -> Result<Envelope<SequencerEntry>, RpcError> {
        self.post(ctx, PATH_TRANSACTIONS, requests)
    }
}
