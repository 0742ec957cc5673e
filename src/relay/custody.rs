//! Wallet custody: resolving a wallet id to a signing identity
//!
//! The relay never holds key material it did not get from custody.
//! [`InMemoryCustody`] keeps [`LocalSigner`]s in process for demos and tests;
//! [`RemoteCustody`] talks to a custody service that signs digests on request:
//!
//! | Call | Request | Response |
//! |---|---|---|
//! | `GET /wallets/{id}` | | `SessionWallet` JSON, 404 when unknown |
//! | `POST /wallets/{id}/sign` | `{"digest": "0x.."}` | `{"signature": "0x.."}` |

use crate::crypto::CdpCredentials;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::signer::{LocalSigner, PaymentSigner};
use crate::types::SessionWallet;
use crate::{Result, X402Error};
use async_trait::async_trait;
use ethereum_types::H256;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Resolves wallet ids to signers
#[async_trait]
pub trait WalletCustody: Send + Sync {
    /// Fails with [`X402Error::WalletNotFound`] for unknown ids
    async fn resolve(&self, wallet_id: &str) -> Result<Arc<dyn PaymentSigner>>;
}

/// Session wallets held in process
#[derive(Clone, Default)]
pub struct InMemoryCustody {
    wallets: Arc<RwLock<HashMap<String, (SessionWallet, LocalSigner)>>>,
}

impl std::fmt::Debug for InMemoryCustody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCustody").finish_non_exhaustive()
    }
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh session wallet on `network`
    pub async fn create_wallet(&self, network: &str) -> SessionWallet {
        self.insert(uuid::Uuid::new_v4().to_string(), LocalSigner::random(network))
            .await
    }

    /// Register an existing signer under `wallet_id`
    pub async fn insert(&self, wallet_id: impl Into<String>, signer: LocalSigner) -> SessionWallet {
        let wallet = SessionWallet::new(wallet_id, signer.address(), signer.network());
        self.wallets
            .write()
            .await
            .insert(wallet.id.clone(), (wallet.clone(), signer));
        tracing::debug!(wallet_id = %wallet.id, address = %wallet.address, "Session wallet registered");
        wallet
    }

    pub async fn wallet(&self, wallet_id: &str) -> Option<SessionWallet> {
        self.wallets
            .read()
            .await
            .get(wallet_id)
            .map(|(wallet, _)| wallet.clone())
    }
}

#[async_trait]
impl WalletCustody for InMemoryCustody {
    async fn resolve(&self, wallet_id: &str) -> Result<Arc<dyn PaymentSigner>> {
        let wallets = self.wallets.read().await;
        let (_, signer) = wallets
            .get(wallet_id)
            .ok_or_else(|| X402Error::wallet_not_found(wallet_id))?;
        Ok(Arc::new(signer.clone()))
    }
}

/// Everything but RFC 3986 unreserved characters
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn path_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

#[derive(Serialize)]
struct SignRequest {
    digest: String,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

/// HTTP client for a wallet-custody service
#[derive(Clone)]
pub struct RemoteCustody {
    base_url: reqwest::Url,
    http: Client,
    credentials: Option<CdpCredentials>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for RemoteCustody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCustody")
            .field("base_url", &self.base_url.as_str())
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl RemoteCustody {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = reqwest::Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| X402Error::config(format!("Invalid custody URL {}: {}", base_url, e)))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http,
            credentials: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Authenticate calls with short-lived CDP bearer tokens
    pub fn with_credentials(mut self, credentials: CdpCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let base_path = self.base_url.path().trim_end_matches('/');
        let full_path = format!("{}{}", base_path, path);
        let mut url = self.base_url.clone();
        url.set_path(&full_path);

        let mut request = self.http.request(method.clone(), url);
        if let Some(credentials) = &self.credentials {
            let host = self.base_url.host_str().unwrap_or_default();
            request = request.header(
                reqwest::header::AUTHORIZATION,
                credentials.bearer(method.as_str(), host, &full_path)?,
            );
        }
        Ok(request)
    }

    async fn fetch_wallet(&self, wallet_id: &str) -> Result<SessionWallet> {
        let path = format!("/wallets/{}", path_segment(wallet_id));
        let response = self.request(Method::GET, &path)?.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(X402Error::wallet_not_found(wallet_id)),
            status if status.is_server_error() => Err(X402Error::custody_unavailable(
                format!("wallet lookup answered {}", status),
            )),
            status if !status.is_success() => Err(X402Error::custody_error(format!(
                "wallet lookup answered {} for {}",
                status, wallet_id
            ))),
            _ => Ok(response.json().await?),
        }
    }

    async fn sign(&self, wallet_id: &str, digest: H256) -> Result<String> {
        let path = format!("/wallets/{}/sign", path_segment(wallet_id));
        let body = SignRequest {
            digest: format!("{:#x}", digest),
        };
        let response = self.request(Method::POST, &path)?.json(&body).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(X402Error::wallet_not_found(wallet_id)),
            status if status.is_server_error() => Err(X402Error::custody_unavailable(
                format!("signing answered {}", status),
            )),
            status if !status.is_success() => Err(X402Error::custody_error(format!(
                "signing refused with {}",
                status
            ))),
            _ => Ok(response.json::<SignResponse>().await?.signature),
        }
    }
}

#[async_trait]
impl WalletCustody for RemoteCustody {
    async fn resolve(&self, wallet_id: &str) -> Result<Arc<dyn PaymentSigner>> {
        let wallet = retry_with_backoff(&self.retry, X402Error::is_retryable, || {
            self.fetch_wallet(wallet_id)
        })
        .await?;

        Ok(Arc::new(RemoteSigner {
            wallet: SessionWallet {
                address: wallet.address.to_lowercase(),
                ..wallet
            },
            custody: self.clone(),
        }))
    }
}

/// Signer whose key lives in a custody service
#[derive(Debug, Clone)]
pub struct RemoteSigner {
    wallet: SessionWallet,
    custody: RemoteCustody,
}

impl RemoteSigner {
    pub fn wallet(&self) -> &SessionWallet {
        &self.wallet
    }
}

#[async_trait]
impl PaymentSigner for RemoteSigner {
    fn address(&self) -> &str {
        &self.wallet.address
    }

    fn network(&self) -> &str {
        &self.wallet.network
    }

    async fn sign_digest(&self, digest: H256) -> Result<String> {
        retry_with_backoff(&self.custody.retry, X402Error::is_retryable, || {
            self.custody.sign(&self.wallet.id, digest)
        })
        .await
    }
}
